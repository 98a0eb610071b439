// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The allocator interface consumed by the fetcher (§6.4). Eviction,
//! merging and the memory/disk admission policy all live outside this
//! crate; the fetcher only ever calls `reserve`.

use std::future::Future;

use crate::model::{MapOutput, identifier::InputAttemptIdentifier};

pub trait Allocator: Send + Sync {
    /// Reserves a destination sink for `id`. Returns
    /// [`MapOutput::Wait`] when the allocator is back-pressuring; any I/O
    /// failure preparing the sink (e.g. opening a spill file) is surfaced
    /// as an `Err` and routed to `Scheduler::report_local_error`, never to
    /// `copy_failed` (§4.4 step 4).
    fn reserve(
        &self,
        id: InputAttemptIdentifier,
        decompressed_len: i64,
        compressed_len: i64,
        fetcher_id: u64,
    ) -> impl Future<Output = std::io::Result<MapOutput>> + Send;
}
