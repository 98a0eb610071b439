// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Output transfer (§4.4, §4.5): for one pending output, read the header,
//! sanity-check it, reserve a destination from the allocator, stream the
//! payload, and report success.

use std::time::{Duration, Instant};

use bytes::BytesMut;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    allocator::Allocator,
    codec::PayloadCodec,
    connection::ConnectionSession,
    counters::FetchCounters,
    error::SanityError,
    model::{MapHost, MapOutput, ShuffleHeader, identifier::InputAttemptIdentifier},
    retry::{IoFailureKind, RetryController},
    scheduler::Scheduler,
};

/// Result of one `transfer_one` call (§4.4, §9 "Exceptions for control
/// flow"). `Success` and `Yielded` both carry zero ids to fail, but differ
/// in whether `remaining` advanced — see the host session driver for how
/// they are told apart by the caller.
pub enum TransferOutcome {
    /// The output was delivered; the caller removes this id from
    /// `remaining`.
    Success(InputAttemptIdentifier),
    /// First/continuing read timeout within budget: reconnect and retry
    /// `remaining` unchanged.
    ReadTimeoutRetry,
    /// One or more ids are now known-failed; the caller reports
    /// `copy_failed` for each and ends the session.
    Failed(Vec<InputAttemptIdentifier>),
    /// The allocator is back-pressuring, or a local resource error was
    /// already reported to the scheduler; `remaining` is unchanged and the
    /// session ends without any `copy_failed` call (§4.4 step 4, §7).
    Yielded,
    /// `stopped` was observed mid-transfer; caller closes the connection
    /// and lets the outer driver put back whatever remains.
    Stopped,
}

/// Checks the freshly parsed header against the session's invariants
/// (§4.5). Returns the offending id to fail, alongside the specific
/// sanity violation, for counter bookkeeping by the caller.
pub fn verify_sanity(
    compressed_len: i64,
    decompressed_len: i64,
    for_reduce: i64,
    current_partition: i64,
    remaining: &[InputAttemptIdentifier],
    src_id: Option<&InputAttemptIdentifier>,
) -> Result<(), SanityError> {
    if compressed_len < 0 || decompressed_len < 0 {
        return Err(SanityError::WrongLength);
    }
    if for_reduce != current_partition {
        return Err(SanityError::WrongReduce { got: for_reduce, want: current_partition });
    }
    match src_id {
        Some(id) if remaining.iter().any(|r| r == id) => Ok(()),
        _ => Err(SanityError::WrongMap),
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn transfer_one<S: Scheduler, A: Allocator>(
    host: &MapHost,
    remaining: &[InputAttemptIdentifier],
    conn: &ConnectionSession,
    scheduler: &S,
    allocator: &A,
    codec: &dyn PayloadCodec,
    counters: &FetchCounters,
    retry: &mut RetryController,
    map_id_prefix: &str,
    read_timeout: Duration,
    read_timeout_budget: Duration,
    fetcher_id: u64,
    cancel: &CancellationToken,
) -> TransferOutcome {
    let started = Instant::now();

    // 1. Header read.
    let header_bytes = match conn.read_exact(2, read_timeout, cancel).await {
        Ok(b) => b,
        Err(e) => return classify_pre_resolve_failure(e, remaining, retry, read_timeout_budget, cancel, counters),
    };
    if cancel.is_cancelled() {
        return TransferOutcome::Stopped;
    }

    let map_id_len = u16::from_be_bytes([header_bytes[0], header_bytes[1]]) as usize;
    let tail_len = map_id_len + 8 + 8 + 4;
    let tail = match conn.read_exact(tail_len, read_timeout, cancel).await {
        Ok(b) => b,
        Err(e) => return classify_pre_resolve_failure(e, remaining, retry, read_timeout_budget, cancel, counters),
    };

    let mut full = BytesMut::with_capacity(2 + tail_len);
    full.extend_from_slice(&header_bytes);
    full.extend_from_slice(&tail);
    let header = match ShuffleHeader::try_parse(&mut full) {
        Ok(Some(h)) => h,
        Ok(None) => {
            counters.inc_bad_id_errs();
            return TransferOutcome::Failed(head_of(remaining));
        },
        Err(e) => {
            debug!("header parse failed: {e}");
            counters.inc_bad_id_errs();
            return TransferOutcome::Failed(head_of(remaining));
        },
    };
    if header.check_prefix(map_id_prefix).is_err() {
        counters.inc_bad_id_errs();
        return TransferOutcome::Failed(head_of(remaining));
    }

    if cancel.is_cancelled() {
        return TransferOutcome::Stopped;
    }

    // 2. Resolve identifier.
    let src_id = scheduler
        .identifier_for_fetched_output(&header.map_id, header.for_reduce as i64)
        .await;

    // 3. Sanity check.
    if let Err(sanity_err) = verify_sanity(
        header.compressed_length,
        header.uncompressed_length,
        header.for_reduce as i64,
        host.partition(),
        remaining,
        src_id.as_ref(),
    ) {
        match sanity_err {
            SanityError::WrongLength => counters.inc_wrong_length_errs(),
            SanityError::WrongReduce { .. } => counters.inc_wrong_reduce_errs(),
            SanityError::WrongMap => counters.inc_wrong_map_errs(),
        }
        let fail_id = src_id
            .map(|id| vec![id])
            .unwrap_or_else(|| head_of(remaining));
        return TransferOutcome::Failed(fail_id);
    }
    let src_id = src_id.expect("verify_sanity accepted only Some(src_id)");

    if cancel.is_cancelled() {
        return TransferOutcome::Stopped;
    }

    // 4. Reserve destination.
    let map_output = match allocator
        .reserve(
            src_id.clone(),
            header.uncompressed_length,
            header.compressed_length,
            fetcher_id,
        )
        .await
    {
        Ok(MapOutput::Wait) => return TransferOutcome::Yielded,
        Ok(mo) => mo,
        Err(e) => {
            scheduler.report_local_error(&anyhow::anyhow!(e)).await;
            return TransferOutcome::Yielded;
        },
    };

    if cancel.is_cancelled() {
        map_output.abort().await;
        return TransferOutcome::Stopped;
    }

    // 5. Copy payload.
    let compressed_len = header.compressed_length as usize;
    let raw = match conn.read_exact(compressed_len, read_timeout, cancel).await {
        Ok(b) => b,
        Err(e) => {
            return handle_payload_io_failure(e, map_output, src_id, retry, read_timeout_budget, cancel, counters)
                .await;
        },
    };

    let copy_result = match map_output {
        MapOutput::Memory { id, mut buffer } => {
            match codec.decompress(&raw, header.uncompressed_length as usize, true) {
                Ok(decompressed) => {
                    buffer.extend_from_slice(&decompressed);
                    Ok(MapOutput::Memory { id, buffer })
                },
                Err(e) => Err((MapOutput::Memory { id, buffer }, e)),
            }
        },
        MapOutput::Disk { id, mut file, path } => {
            use tokio::io::AsyncWriteExt;
            match file.write_all(&raw).await {
                Ok(()) => Ok(MapOutput::Disk { id, file, path }),
                Err(e) => Err((MapOutput::Disk { id, file, path }, e)),
            }
        },
        MapOutput::DiskRef { .. } | MapOutput::Wait => {
            warn!("allocator.reserve() returned a non-writable sink for the HTTP path; treating as fatal");
            return TransferOutcome::Failed(vec![src_id]);
        },
    };

    let map_output = match copy_result {
        Ok(mo) => mo,
        Err((mo, e)) => {
            warn!("payload copy failed: {e}");
            mo.abort().await;
            counters.inc_io_errs();
            counters.inc_failed_fetches();
            return TransferOutcome::Failed(vec![src_id]);
        },
    };

    // 6. Commit.
    retry.reset();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    scheduler
        .copy_succeeded(
            &src_id,
            host,
            header.compressed_length,
            header.uncompressed_length,
            elapsed_ms,
            map_output,
        )
        .await;
    counters.inc_successful_fetches();
    TransferOutcome::Success(src_id)
}

fn head_of(remaining: &[InputAttemptIdentifier]) -> Vec<InputAttemptIdentifier> {
    remaining.first().cloned().into_iter().collect()
}

fn classify_pre_resolve_failure(
    e: anyhow::Error,
    remaining: &[InputAttemptIdentifier],
    retry: &mut RetryController,
    read_timeout_budget: Duration,
    cancel: &CancellationToken,
    counters: &FetchCounters,
) -> TransferOutcome {
    if cancel.is_cancelled() {
        return TransferOutcome::Stopped;
    }
    if let Some(io_err) = e.downcast_ref::<std::io::Error>() {
        let kind = IoFailureKind::classify(io_err);
        if retry.should_retry(kind, read_timeout_budget) {
            return TransferOutcome::ReadTimeoutRetry;
        }
    }
    // No identifier resolved yet: we've lost stream alignment for
    // everything still outstanding (§4.4 failure handling, final bullet).
    counters.inc_io_errs();
    TransferOutcome::Failed(remaining.to_vec())
}

async fn handle_payload_io_failure(
    e: anyhow::Error,
    map_output: MapOutput,
    src_id: InputAttemptIdentifier,
    retry: &mut RetryController,
    read_timeout_budget: Duration,
    cancel: &CancellationToken,
    counters: &FetchCounters,
) -> TransferOutcome {
    if cancel.is_cancelled() {
        map_output.abort().await;
        return TransferOutcome::Stopped;
    }
    if let Some(io_err) = e.downcast_ref::<std::io::Error>() {
        let kind = IoFailureKind::classify(io_err);
        if retry.should_retry(kind, read_timeout_budget) {
            map_output.abort().await;
            return TransferOutcome::ReadTimeoutRetry;
        }
    }
    map_output.abort().await;
    counters.inc_io_errs();
    counters.inc_failed_fetches();
    TransferOutcome::Failed(vec![src_id])
}
