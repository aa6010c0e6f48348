// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A single outbound TCP connection to the RTR cache, with the original's
//! resolve-then-retry-every-candidate-with-backoff connect behavior
//! (`rtr_client.py`'s `Connect` class), adapted to `tokio`.
//!
//! DNS failure is fatal (there is nothing to retry against); a connect
//! failure against a resolved address is transient and retried using the
//! backoff schedule, cycling through every candidate address each round.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::cfg::config::{BACKOFF_SCHEDULE, CONNECT_TIMEOUT, RECV_BUFFER_LEN};
use crate::error::RtrError;

pub struct Connection {
    stream: TcpStream,
}

impl Connection {
    /// Resolves `host:port` and connects, retrying resolved candidates
    /// with the schedule in [`BACKOFF_SCHEDULE`] until one accepts.
    ///
    /// Returns [`RtrError::FatalNetwork`] only when DNS resolution itself
    /// fails — a host that resolves but refuses every connection attempt
    /// keeps retrying forever, matching the original client's behavior of
    /// never giving up on a known-good hostname.
    pub async fn connect(host: &str, port: u16) -> Result<Self, RtrError> {
        let candidates = resolve(host, port).await?;

        let mut attempt = 0usize;
        loop {
            for addr in &candidates {
                match timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await {
                    Ok(Ok(stream)) => {
                        info!(%addr, "connected");
                        return Ok(Connection { stream });
                    },
                    Ok(Err(e)) => warn!(%addr, error = %e, "connect failed"),
                    Err(_) => warn!(%addr, "connect timed out"),
                }
            }

            let backoff = BACKOFF_SCHEDULE[attempt.min(BACKOFF_SCHEDULE.len() - 1)];
            debug!(backoff, "all candidates failed, backing off");
            tokio::time::sleep(Duration::from_secs(backoff)).await;
            attempt += 1;
        }
    }

    /// Writes the whole buffer, classifying a broken pipe as a transient
    /// error the driver should reconnect on.
    pub async fn send(&mut self, buf: &[u8]) -> Result<(), RtrError> {
        self.stream.write_all(buf).await.map_err(classify_io_error)
    }

    /// Reads with a timeout, used by the driver's poll loop (spec §4.F).
    pub async fn recv_timeout<'a>(
        &mut self,
        buf: &'a mut [u8; RECV_BUFFER_LEN],
        d: Duration,
    ) -> Result<Option<&'a [u8]>, RtrError> {
        match timeout(d, self.stream.read(buf)).await {
            Ok(Ok(0)) => Err(RtrError::TransientNetwork(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "peer closed connection",
            ))),
            Ok(Ok(n)) => Ok(Some(&buf[..n])),
            Ok(Err(e)) => Err(classify_io_error(e)),
            Err(_) => Ok(None),
        }
    }
}

async fn resolve(host: &str, port: u16) -> Result<Vec<std::net::SocketAddr>, RtrError> {
    let addrs: Vec<_> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| {
            RtrError::FatalNetwork(io::Error::new(
                e.kind(),
                format!("DNS resolution failed for {host}:{port}: {e}"),
            ))
        })?
        .collect();
    if addrs.is_empty() {
        return Err(RtrError::FatalNetwork(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses found for {host}:{port}"),
        )));
    }
    Ok(addrs)
}

/// All post-connect socket errors (broken pipe, reset, timeout, ...) are
/// transient: the driver reconnects and resumes from the last known
/// serial rather than treating any of them as fatal.
fn classify_io_error(e: io::Error) -> RtrError {
    RtrError::TransientNetwork(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_rejects_unresolvable_host() {
        let err = resolve("this-host-does-not-resolve.invalid.example", 1234).await;
        assert!(err.is_err());
    }
}
