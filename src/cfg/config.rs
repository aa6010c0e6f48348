// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::{Result, ensure};

use crate::cfg::cli::Cli;

/// Default RTR cache, per spec §6.
pub const DEFAULT_HOST: &str = "rtr.rpki.cloudflare.com";
/// Clear-text RTR port. 8283 (ssh) and 8284 (tls) are out of scope.
pub const DEFAULT_PORT: u16 = 8282;
/// "five minutes for some random reason" — ported from the original.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(300);
/// Per-attempt TCP connect timeout (component E).
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Reconnect backoff schedule, replayed per round of candidate addresses.
pub const BACKOFF_SCHEDULE: &[u64] = &[1, 1, 2, 4, 8, 16, 32];
/// recv() buffer size (component F/E).
pub const RECV_BUFFER_LEN: usize = 64 * 1024;
/// Client-side override cap on the advertised refresh interval (spec §9).
pub const REFRESH_CAP: Duration = Duration::from_secs(60);
/// Fallback refresh armed once `timeRemaining()` observes an expired
/// deadline, so the driver doesn't spin (spec §4.B).
pub const FALLBACK_REFRESH: Duration = Duration::from_secs(15);
/// +/- fraction applied to the poll timeout to avoid fleet synchronization.
pub const POLL_JITTER: f64 = 0.2;

/// Assembled runtime configuration: CLI flags layered over defaults.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub host: String,
    pub port: u16,
    /// Starting serial. `None` (or 0) means "start from scratch": the
    /// driver issues a ResetQuery rather than a SerialQuery.
    pub serial: Option<u32>,
    /// Starting session id, paired with `serial` for the same reason.
    pub session_id: Option<u16>,
    pub poll_timeout: Duration,
    pub verbosity: u8,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            serial: None,
            session_id: None,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            verbosity: 0,
        }
    }
}

impl RuntimeConfig {
    /// Builds a config from parsed CLI flags, applying defaults for
    /// anything unset, then validates it.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let mut cfg = RuntimeConfig {
            host: cli.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.unwrap_or(DEFAULT_PORT),
            serial: cli.serial,
            session_id: cli.session_id,
            poll_timeout: cli
                .timeout
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_POLL_TIMEOUT),
            verbosity: cli.verbose,
        };
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Starting serial/session-id only count as "known" when both are
    /// present and the serial is non-zero (spec §4.F, mirroring the
    /// original's `serial is None or serial == 0` check).
    pub fn has_known_start_point(&self) -> bool {
        matches!((self.serial, self.session_id), (Some(s), Some(_)) if s != 0)
    }

    fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(!self.host.is_empty(), "host must not be empty");
        ensure!(self.port != 0, "port must be nonzero");
        ensure!(
            self.poll_timeout >= Duration::from_secs(1),
            "poll timeout must be at least 1 second"
        );
        Ok(())
    }
}

/// `duration * uniform(1 - POLL_JITTER, 1 + POLL_JITTER)`, floored at 1s
/// (spec §4.F, scenario 6).
pub fn jittered_poll_timeout(base: Duration) -> Duration {
    use rand::Rng;

    let secs = base.as_secs_f64();
    let lo = secs * (1.0 - POLL_JITTER);
    let hi = secs * (1.0 + POLL_JITTER);
    let picked = if hi > lo {
        rand::rng().random_range(lo..hi)
    } else {
        secs
    };
    Duration::from_secs_f64(picked.max(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.host, "rtr.rpki.cloudflare.com");
        assert_eq!(cfg.port, 8282);
        assert_eq!(cfg.poll_timeout, Duration::from_secs(300));
        assert!(!cfg.has_known_start_point());
    }

    #[test]
    fn known_start_point_requires_nonzero_serial() {
        let mut cfg = RuntimeConfig {
            serial: Some(0),
            session_id: Some(7),
            ..RuntimeConfig::default()
        };
        assert!(!cfg.has_known_start_point());
        cfg.serial = Some(5);
        assert!(cfg.has_known_start_point());
    }

    #[test]
    fn jitter_stays_in_expected_band_with_floor() {
        for _ in 0..200 {
            let d = jittered_poll_timeout(Duration::from_secs(300));
            let s = d.as_secs_f64();
            assert!((240.0..=360.0).contains(&s), "{s} out of band");
        }
        // floor: a tiny base never goes below one second.
        let d = jittered_poll_timeout(Duration::from_millis(100));
        assert!(d >= Duration::from_secs(1));
    }
}
