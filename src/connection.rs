// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! One keep-alive HTTP connection to a shuffle host (§4.2).
//!
//! Reads and writes race a [`CancellationToken`] the way the teacher's
//! `client::common::io_with_timeout` races socket I/O against its own
//! cancellation token, so an external `shut_down()` call preempts an
//! in-flight read instead of waiting for it.

use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use bytes::BytesMut;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::Mutex,
    time::timeout,
};
use tokio_util::sync::CancellationToken;

use crate::model::host::MapHost;

/// Supplies the `Authorization`-style header the remote shuffle service
/// expects. Token generation itself is an external collaborator (§1
/// Non-goals); the fetcher only consumes whatever header value this
/// returns.
pub trait CredentialsProvider: Send + Sync {
    fn auth_header(&self) -> Option<String>;
}

/// Outcome of [`ConnectionSession::connect`] (§4.2). Kept as a typed enum
/// rather than `Result<bool>` so callers can tell a TCP-connect failure
/// (bumps `connectionErrs`) apart from a failure after the socket was
/// already open (protocol/validation failure) without inspecting error
/// text.
pub enum ConnectOutcome {
    Connected,
    /// `cancel` fired before or during the attempt; not an error, the
    /// caller must not emit `copyFailed`.
    Stopped,
    /// The TCP connect itself did not succeed.
    TcpFailed(anyhow::Error),
    /// Connected, but the request/response exchange failed.
    ProtocolFailed(anyhow::Error),
}

/// No credentials at all — used by loopback test servers and by deployments
/// that put authentication at a layer below this crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCredentials;

impl CredentialsProvider for NoCredentials {
    fn auth_header(&self) -> Option<String> {
        None
    }
}

async fn io_with_timeout<F, T>(
    label: &'static str,
    fut: F,
    io_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<T>
where F: Future<Output = std::io::Result<T>> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(anyhow!("{label} cancelled")),
        res = timeout(io_timeout, fut) => {
            match res {
                Ok(Ok(v)) => Ok(v),
                Ok(Err(e)) => Err(e.into()),
                // Surfaced as `io::ErrorKind::TimedOut` rather than a bare
                // anyhow string: `retry::IoFailureKind::classify` downcasts
                // to `std::io::Error` to recognize a read timeout (§4.3),
                // and a plain anyhow error would never match.
                Err(_) => Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("{label} timeout: {io_timeout:?}"),
                )
                .into()),
            }
        }
    }
}

/// One keep-alive TCP/HTTP connection, plus the plumbing needed to tear it
/// down safely from another task.
pub struct ConnectionSession {
    reader: Mutex<Option<BufReader<OwnedReadHalf>>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    /// Dedicated mutex serializing `cleanup` against itself. Deliberately
    /// not used by the read/write path (§4.2, §5): shutdown must be able
    /// to preempt an in-flight read without waiting on this lock.
    cleanup_lock: Mutex<()>,
}

impl ConnectionSession {
    pub fn empty() -> Self {
        Self {
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            cleanup_lock: Mutex::new(()),
        }
    }

    pub async fn is_open(&self) -> bool {
        self.reader.lock().await.is_some()
    }

    /// Opens the TCP connection, sends the multi-output fetch request, and
    /// validates the response status line (§4.2).
    ///
    /// The TCP-connect step and everything after it fail differently for
    /// counter/`copyFailed` purposes (§4.2: `connectionErrs` is only
    /// incremented "if the TCP connect itself did not succeed"), so
    /// [`ConnectOutcome`] distinguishes the two instead of collapsing them
    /// into one `Err`.
    pub async fn connect(
        &self,
        host: &MapHost,
        url: &str,
        connect_timeout: Duration,
        read_timeout: Duration,
        creds: &dyn CredentialsProvider,
        cancel: &CancellationToken,
    ) -> ConnectOutcome {
        if cancel.is_cancelled() {
            return ConnectOutcome::Stopped;
        }

        let authority = host.identifier().to_string();
        let stream = match timeout(connect_timeout, TcpStream::connect(&authority)).await {
            Ok(Ok(s)) => s,
            Ok(Err(e)) => return ConnectOutcome::TcpFailed(e.into()),
            Err(_) => return ConnectOutcome::TcpFailed(anyhow!("connect timeout after {connect_timeout:?}")),
        };
        if let Err(e) = stream.set_nodelay(true) {
            return ConnectOutcome::TcpFailed(e.into());
        }

        if cancel.is_cancelled() {
            return ConnectOutcome::Stopped;
        }

        let (r, mut w) = stream.into_split();
        let request = build_request(url, &authority, creds);
        if let Err(e) = io_with_timeout(
            "write request",
            w.write_all(request.as_bytes()),
            read_timeout,
            cancel,
        )
        .await
        {
            return ConnectOutcome::ProtocolFailed(e);
        }

        let mut reader = BufReader::new(r);
        let status_line = match io_with_timeout(
            "read status line",
            read_line(&mut reader),
            read_timeout,
            cancel,
        )
        .await
        {
            Ok(line) => line,
            Err(e) => return ConnectOutcome::ProtocolFailed(e),
        };

        if cancel.is_cancelled() {
            return ConnectOutcome::Stopped;
        }

        if let Err(e) = validate_status_line(&status_line) {
            return ConnectOutcome::ProtocolFailed(e);
        }

        // Drain response headers up to the blank line; the body is the
        // stream of ShuffleHeader + payload frames (§6.2).
        loop {
            let line = match io_with_timeout(
                "read response header",
                read_line(&mut reader),
                read_timeout,
                cancel,
            )
            .await
            {
                Ok(line) => line,
                Err(e) => return ConnectOutcome::ProtocolFailed(e),
            };
            if line.is_empty() {
                break;
            }
        }

        *self.reader.lock().await = Some(reader);
        *self.writer.lock().await = Some(w);
        ConnectOutcome::Connected
    }

    /// Reads exactly `n` bytes from the response body, racing `cancel`.
    pub async fn read_exact(
        &self,
        n: usize,
        read_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<BytesMut> {
        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or_else(|| anyhow!("no open connection"))?;
        let mut buf = BytesMut::zeroed(n);
        io_with_timeout("read body", reader.read_exact(&mut buf), read_timeout, cancel).await?;
        Ok(buf)
    }

    /// Idempotent teardown. `disconnect=true` forcibly drops the socket
    /// (mid-session abort); `disconnect=false` is a graceful close between
    /// sessions. Safe to call concurrently from any task; at most one
    /// cleanup body runs at a time (§4.2).
    pub async fn cleanup(&self, disconnect: bool) {
        let _guard = self.cleanup_lock.lock().await;
        let mut w = self.writer.lock().await;
        if let Some(mut writer) = w.take() {
            if !disconnect {
                let _ = writer.shutdown().await;
            }
            drop(writer);
        }
        drop(w);
        *self.reader.lock().await = None;
    }
}

fn build_request(url: &str, authority: &str, creds: &dyn CredentialsProvider) -> String {
    let (path, _host) = split_request_target(url);
    let mut req = format!(
        "GET {path} HTTP/1.1\r\nHost: {authority}\r\nConnection: keep-alive\r\n"
    );
    if let Some(auth) = creds.auth_header() {
        req.push_str(&format!("Authorization: {auth}\r\n"));
    }
    req.push_str("\r\n");
    req
}

/// Splits a full URL into `(path?query, authority)`. `authority` is unused
/// today (the TCP connect target is `host.identifier()`) but kept for
/// symmetry with a real HTTP client's URL parsing.
fn split_request_target(url: &str) -> (String, String) {
    if let Some(rest) = url.strip_prefix("http://") {
        if let Some(idx) = rest.find('/') {
            (rest[idx..].to_string(), rest[..idx].to_string())
        } else {
            ("/".to_string(), rest.to_string())
        }
    } else {
        (url.to_string(), String::new())
    }
}

async fn read_line<R: tokio::io::AsyncBufRead + Unpin>(r: &mut R) -> std::io::Result<String> {
    use tokio::io::AsyncBufReadExt;
    let mut line = String::new();
    r.read_line(&mut line).await?;
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

fn validate_status_line(line: &str) -> Result<()> {
    let mut parts = line.split_whitespace();
    let _version = parts.next().ok_or_else(|| anyhow!("empty status line"))?;
    let code = parts
        .next()
        .ok_or_else(|| anyhow!("malformed status line: {line:?}"))?;
    if code == "200" {
        Ok(())
    } else {
        bail!("shuffle host replied with status {code}: {line:?}")
    }
}
