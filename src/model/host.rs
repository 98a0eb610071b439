// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use crate::model::identifier::InputAttemptIdentifier;

/// One host-side fetch assignment, lent by the scheduler to exactly one
/// fetcher at a time and returned via `Scheduler::free_host`.
#[derive(Debug, Clone)]
pub struct MapHost {
    /// `host:port`, compared against `FetcherConfig::local_host_port` to
    /// decide whether the local-disk bypass applies.
    identifier: Arc<str>,
    /// Base URL the HTTP path fetches against.
    base_url: Arc<str>,
    /// Target partition id this assignment is for.
    partition: i64,
    /// Pending output identifiers at assignment time.
    pending: Vec<InputAttemptIdentifier>,
}

impl MapHost {
    pub fn new(
        identifier: impl Into<Arc<str>>,
        base_url: impl Into<Arc<str>>,
        partition: i64,
        pending: Vec<InputAttemptIdentifier>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            base_url: base_url.into(),
            partition,
            pending,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn partition(&self) -> i64 {
        self.partition
    }

    pub fn pending(&self) -> &[InputAttemptIdentifier] {
        &self.pending
    }
}
