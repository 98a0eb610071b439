// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Retry controller (§4.3): decides whether a read timeout warrants a
//! reconnect within the per-host retry budget.

use std::time::{Duration, Instant};

/// Classifies an I/O failure the way the driver needs to dispatch it.
/// `std::io::ErrorKind::TimedOut` from a socket read maps to
/// `ReadTimeout`; everything else is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoFailureKind {
    ReadTimeout,
    Other,
}

impl IoFailureKind {
    pub fn classify(err: &std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::TimedOut {
            IoFailureKind::ReadTimeout
        } else {
            IoFailureKind::Other
        }
    }
}

/// Owns the "per-host retry start timestamp" from §3. `None` means "no
/// retry yet", matching the spec's `0` sentinel.
#[derive(Debug, Default)]
pub struct RetryController {
    retry_start: Option<Instant>,
}

impl RetryController {
    pub fn new() -> Self {
        Self { retry_start: None }
    }

    /// Reset at the start of every new host session, and after every
    /// successful transfer (§4.3).
    pub fn reset(&mut self) {
        self.retry_start = None;
    }

    /// `true` means: reconnect and retry the current output; `false` means
    /// give up and fail it.
    pub fn should_retry(&mut self, kind: IoFailureKind, read_timeout_budget: Duration) -> bool {
        if kind != IoFailureKind::ReadTimeout {
            return false;
        }
        let now = Instant::now();
        let start = *self.retry_start.get_or_insert(now);
        now.duration_since(start) < read_timeout_budget
    }
}
