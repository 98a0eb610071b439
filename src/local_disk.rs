// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Local-disk bypass (§4.6): for a co-located producer, read its on-disk
//! spill index + data files directly instead of going through HTTP.
//!
//! The index record layout is a small fixed-size, big-endian struct —
//! zerocopy's typed byte-order wrappers give a deterministic on-disk format
//! the same way the teacher leans on `zerocopy` for the fixed portion of
//! its PDU headers (`models/opcode.rs`) instead of hand-rolled bit-shifts.

use std::path::{Path, PathBuf};

use tokio::{
    fs::{File, OpenOptions},
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout,
    byteorder::{BigEndian, I64},
};

use crate::cfg::config::FetcherConfig;

pub const INDEX_RECORD_LEN: usize = 24;

/// One partition's offset/length triple inside a producer's spill index
/// file (§6.5).
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct RawIndexRecord {
    start_offset: I64<BigEndian>,
    raw_length: I64<BigEndian>,
    part_length: I64<BigEndian>,
}

/// Owned, host-endian view of a [`RawIndexRecord`] (§3 `IndexRecord`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    pub start_offset: i64,
    pub raw_length: i64,
    pub part_length: i64,
}

impl From<RawIndexRecord> for IndexRecord {
    fn from(r: RawIndexRecord) -> Self {
        Self {
            start_offset: r.start_offset.get(),
            raw_length: r.raw_length.get(),
            part_length: r.part_length.get(),
        }
    }
}

impl From<IndexRecord> for RawIndexRecord {
    fn from(r: IndexRecord) -> Self {
        Self {
            start_offset: I64::new(r.start_offset),
            raw_length: I64::new(r.raw_length),
            part_length: I64::new(r.part_length),
        }
    }
}

/// Resolves `path_component` against the configured local directory search
/// list (§4.6 step 2).
pub fn resolve_output_dir(cfg: &FetcherConfig, path_component: &str) -> Option<PathBuf> {
    cfg.local_dirs
        .iter()
        .map(|dir| dir.join(path_component))
        .find(|p| p.is_dir())
        .or_else(|| cfg.local_dirs.first().map(|dir| dir.join(path_component)))
}

pub fn data_file_path(cfg: &FetcherConfig, path_component: &str) -> Option<PathBuf> {
    resolve_output_dir(cfg, path_component).map(|dir| dir.join(&cfg.output_file_name))
}

pub fn index_file_path(cfg: &FetcherConfig, path_component: &str) -> Option<PathBuf> {
    data_file_path(cfg, path_component)
        .map(|data| PathBuf::from(format!("{}{}", data.display(), cfg.index_file_suffix)))
}

/// Reads the `IndexRecord` for `partition` out of a producer's spill index
/// file (§4.6 step 3). Index records are stored back-to-back, one per
/// partition, in partition order.
pub async fn read_index_record(index_path: &Path, partition: i64) -> std::io::Result<IndexRecord> {
    let mut file = File::open(index_path).await?;
    let offset = partition
        .checked_mul(INDEX_RECORD_LEN as i64)
        .ok_or_else(|| std::io::Error::other("partition index overflow"))?;
    file.seek(std::io::SeekFrom::Start(offset as u64)).await?;

    let mut buf = [0u8; INDEX_RECORD_LEN];
    file.read_exact(&mut buf).await?;
    let raw = RawIndexRecord::read_from_bytes(&buf)
        .map_err(|_| std::io::Error::other("malformed index record"))?;
    Ok(raw.into())
}

/// Writes a spill index file containing `records` in partition order —
/// used by tests to build fixtures without hand-assembling bytes.
pub async fn write_spill_index(path: &Path, records: &[IndexRecord]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .await?;
    for r in records {
        let raw: RawIndexRecord = (*r).into();
        file.write_all(raw.as_bytes()).await?;
    }
    Ok(())
}
