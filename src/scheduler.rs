// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The Shuffle Scheduler interface consumed by the fetcher (§6.3). The
//! scheduler itself — global assignment policy, retry escalation — is an
//! external collaborator out of scope for this crate; only the surface the
//! fetcher calls lives here.
//!
//! Mirrors the teacher's `StateMachine` trait (`state_machine/common.rs`):
//! async methods return `impl Future<..> + Send` directly rather than
//! pulling in an `async_trait` dependency the teacher never needed.

use std::future::Future;

use crate::model::{MapHost, MapOutput, identifier::InputAttemptIdentifier};

/// One-way handle the fetcher holds on the scheduler. The scheduler never
/// holds a handle back to the fetcher (§9 "Cyclic references").
pub trait Scheduler: Send + Sync {
    /// Current pending output list for `host` (§4.1 step 1).
    fn get_maps_for_host(
        &self,
        host: &MapHost,
    ) -> impl Future<Output = Vec<InputAttemptIdentifier>> + Send;

    /// Resolves the full identifier for a freshly parsed header
    /// (`mapId`, `forReduce`) pair (§4.4 step 2). `None` means the
    /// scheduler does not recognize this output at all.
    fn identifier_for_fetched_output(
        &self,
        map_id: &str,
        partition: i64,
    ) -> impl Future<Output = Option<InputAttemptIdentifier>> + Send;

    /// Reports a successful transfer; ownership of `map_output` passes to
    /// the scheduler (§3 MapOutput lifecycle).
    fn copy_succeeded(
        &self,
        id: &InputAttemptIdentifier,
        host: &MapHost,
        compressed_len: i64,
        decompressed_len: i64,
        elapsed_ms: u64,
        map_output: MapOutput,
    ) -> impl Future<Output = ()> + Send;

    /// Reports a failed transfer (§7 error table).
    fn copy_failed(
        &self,
        id: &InputAttemptIdentifier,
        host: &MapHost,
        connect_failed: bool,
        read_error: bool,
    ) -> impl Future<Output = ()> + Send;

    /// A local resource failure that is not the remote host's fault
    /// (§4.4 step 4).
    fn report_local_error(&self, err: &anyhow::Error) -> impl Future<Output = ()> + Send;

    /// Returns `id` to the scheduler's known-pending pool for `host`
    /// (§4.1.1).
    fn put_back_known_map_output(
        &self,
        host: &MapHost,
        id: InputAttemptIdentifier,
    ) -> impl Future<Output = ()> + Send;

    /// Releases this fetcher's claim on `host` (§4.1 step 4).
    fn free_host(&self, host: &MapHost) -> impl Future<Output = ()> + Send;
}
