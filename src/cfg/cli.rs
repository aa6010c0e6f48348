// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Hand-rolled flag parsing. CLI help/version text and exit-code plumbing
//! are out of scope (spec §1); this only needs to recognize the handful of
//! flags the external interface promises (spec §6).

use anyhow::{Result, bail};

/// Parsed command-line flags, before defaults are applied.
#[derive(Debug, Default, Clone)]
pub struct Cli {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub serial: Option<u32>,
    pub session_id: Option<u16>,
    pub timeout: Option<u64>,
    pub verbose: u8,
}

impl Cli {
    /// Parses `--host HOST`, `--port N`, `--serial N`, `--session-id N`,
    /// `--timeout SECS`, and repeatable `-v`/`--verbose`.
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut cli = Cli::default();
        let mut it = args.into_iter();

        while let Some(arg) = it.next() {
            let arg = arg.as_ref();
            match arg {
                "--host" | "-h" => cli.host = Some(Self::value_of(arg, &mut it)?),
                "--port" | "-p" => cli.port = Some(Self::parse_of(arg, &mut it)?),
                "--serial" | "-s" => cli.serial = Some(Self::parse_of(arg, &mut it)?),
                "--session-id" | "-S" => {
                    cli.session_id = Some(Self::parse_of(arg, &mut it)?)
                },
                "--timeout" | "-t" => cli.timeout = Some(Self::parse_of(arg, &mut it)?),
                "--verbose" | "-v" => cli.verbose += 1,
                other => bail!("unrecognized argument: {other}"),
            }
        }

        Ok(cli)
    }

    fn value_of<I: Iterator<Item = S>, S: AsRef<str>>(
        flag: &str,
        it: &mut I,
    ) -> Result<String> {
        it.next()
            .map(|s| s.as_ref().to_string())
            .ok_or_else(|| anyhow::anyhow!("{flag} requires a value"))
    }

    fn parse_of<I, S, T>(flag: &str, it: &mut I) -> Result<T>
    where
        I: Iterator<Item = S>,
        S: AsRef<str>,
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = Self::value_of(flag, it)?;
        raw.parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid value for {flag}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_flags() {
        let cli = Cli::parse([
            "--host",
            "rtr.example.net",
            "--port",
            "8282",
            "--serial",
            "7",
            "--session-id",
            "42",
            "--timeout",
            "60",
            "-v",
            "-v",
        ])
        .expect("parse");

        assert_eq!(cli.host.as_deref(), Some("rtr.example.net"));
        assert_eq!(cli.port, Some(8282));
        assert_eq!(cli.serial, Some(7));
        assert_eq!(cli.session_id, Some(42));
        assert_eq!(cli.timeout, Some(60));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn rejects_unknown_flag() {
        assert!(Cli::parse(["--bogus"]).is_err());
    }

    #[test]
    fn defaults_are_empty() {
        let cli = Cli::parse(Vec::<String>::new()).expect("parse");
        assert!(cli.host.is_none());
        assert_eq!(cli.verbose, 0);
    }
}
