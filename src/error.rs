// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Narrow, `thiserror`-derived leaf errors for the wire codec and sanity
//! layer. Everything above the connection/driver boundary speaks
//! `anyhow::Result`; see `SPEC_FULL.md` §10.3 for the rationale.

use thiserror::Error;

/// Returned when a [`crate::model::header::ShuffleHeader`] cannot be parsed
/// off the wire, or parses but fails the `mapId` prefix check.
#[derive(Debug, Error)]
pub enum HeaderParseError {
    #[error("mapId {0:?} is not valid UTF-8")]
    InvalidUtf8(#[source] std::string::FromUtf8Error),

    #[error("mapId {map_id:?} does not start with required prefix {prefix:?}")]
    BadPrefix { map_id: String, prefix: String },
}

/// Returned by [`crate::transfer::verify_sanity`] when a freshly parsed
/// header fails one of the three sanity checks.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SanityError {
    #[error("negative length in shuffle header")]
    WrongLength,
    #[error("header addressed to partition {got}, expected {want}")]
    WrongReduce { got: i64, want: i64 },
    #[error("resolved id is not in the current remaining set")]
    WrongMap,
}
