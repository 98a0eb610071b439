// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::PathBuf;

use bytes::BytesMut;
use tokio::fs::File;

use crate::model::identifier::InputAttemptIdentifier;

/// Allocator-owned sink for one output (§3, §4.4 step 4, §9 "Dynamic
/// dispatch on MapOutput type").
///
/// Modeled as a tagged variant rather than a trait object: the single copy
/// site in `transfer::copy_payload` pattern-matches on it directly, the way
/// the teacher's `PduResponse`/`PduRequest` layer switches on a known,
/// closed set of PDU shapes instead of going through `dyn`.
#[derive(Debug)]
pub enum MapOutput {
    /// In-memory sink: payload is decompressed directly into `buffer`.
    Memory {
        id: InputAttemptIdentifier,
        buffer: BytesMut,
    },
    /// Disk-backed sink: compressed payload is streamed verbatim to `file`,
    /// which this variant owns (created fresh by the allocator for this
    /// reservation).
    Disk {
        id: InputAttemptIdentifier,
        file: File,
        path: PathBuf,
    },
    /// Zero-copy reference into a producer's existing spill data file
    /// (§4.6 step 4): `offset`/`length` locate the partition's bytes, but
    /// nothing is written through this handle and nothing is deleted on
    /// abort — the file belongs to the producer, not this fetcher.
    DiskRef {
        id: InputAttemptIdentifier,
        path: PathBuf,
        offset: u64,
        length: u64,
    },
    /// The allocator is back-pressuring; no sink is available yet.
    Wait,
}

impl MapOutput {
    pub fn id(&self) -> Option<&InputAttemptIdentifier> {
        match self {
            MapOutput::Memory { id, .. } | MapOutput::Disk { id, .. } | MapOutput::DiskRef { id, .. } => Some(id),
            MapOutput::Wait => None,
        }
    }

    /// Releases whatever resources this sink is holding. Safe to call
    /// exactly once per reservation, on every abort path (§4.4, §4.7).
    pub async fn abort(self) {
        match self {
            MapOutput::Disk { file, path, .. } => {
                drop(file);
                let _ = tokio::fs::remove_file(&path).await;
            },
            MapOutput::Memory { .. } | MapOutput::DiskRef { .. } | MapOutput::Wait => {},
        }
    }
}
