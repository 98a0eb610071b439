// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! On-wire framing for one output header (§6.2) and URL construction for
//! the multi-output fetch request (§6.1).
//!
//! Each header is `[mapId_len: u16 BE][mapId bytes][uncompressedLength: u64
//! BE][compressedLength: u64 BE][forReduce: i32 BE]`. The spec leaves the
//! exact varint scheme to the implementer; fixed-width big-endian integers
//! are used here for a deterministic, allocation-free parse.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::HeaderParseError;

/// Per-output wire header, read once before each output's payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShuffleHeader {
    pub map_id: String,
    pub uncompressed_length: i64,
    pub compressed_length: i64,
    pub for_reduce: i32,
}

impl ShuffleHeader {
    /// Attempts to parse one header from the front of `buf`, leaving
    /// `buf` untouched if there are not yet enough bytes buffered.
    ///
    /// Returns `Ok(None)` on short input so callers reading from a socket
    /// can top up the buffer and retry; returns `Err` only for malformed
    /// (as opposed to merely incomplete) input.
    pub fn try_parse(buf: &mut BytesMut) -> Result<Option<Self>, HeaderParseError> {
        if buf.len() < 2 {
            return Ok(None);
        }
        let map_id_len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
        let fixed_tail = 8 + 8 + 4;
        let need = 2 + map_id_len + fixed_tail;
        if buf.len() < need {
            return Ok(None);
        }

        let mut cursor = buf.split_to(need);
        cursor.advance(2);
        let map_id_bytes = cursor.split_to(map_id_len);
        let map_id = String::from_utf8(map_id_bytes.to_vec())
            .map_err(HeaderParseError::InvalidUtf8)?;
        let uncompressed_length = cursor.get_i64();
        let compressed_length = cursor.get_i64();
        let for_reduce = cursor.get_i32();

        Ok(Some(Self {
            map_id,
            uncompressed_length,
            compressed_length,
            for_reduce,
        }))
    }

    /// Validates that `map_id` carries the configured prefix. Called
    /// immediately after a successful parse (§4.4 step 1).
    pub fn check_prefix(&self, prefix: &str) -> Result<(), HeaderParseError> {
        if self.map_id.starts_with(prefix) {
            Ok(())
        } else {
            Err(HeaderParseError::BadPrefix {
                map_id: self.map_id.clone(),
                prefix: prefix.to_string(),
            })
        }
    }

    /// Serializes this header the way a test double's shuffle server would,
    /// used by fixtures and the round-trip property test.
    pub fn write(&self, out: &mut BytesMut) {
        let map_id_bytes = self.map_id.as_bytes();
        out.put_u16(map_id_bytes.len() as u16);
        out.put_slice(map_id_bytes);
        out.put_i64(self.uncompressed_length);
        out.put_i64(self.compressed_length);
        out.put_i32(self.for_reduce);
    }
}

/// Builds the `GET <base_url>?map=...&reduce=...&keepAlive=...` fetch URL
/// for one batch of path components (§6.1). Pure function of its inputs:
/// identical arguments always produce byte-identical output.
pub fn build_fetch_url(base_url: &str, path_components: &[&str], reduce: i64, keep_alive: bool) -> String {
    let map_param = path_components.join(",");
    let sep = if base_url.contains('?') { '&' } else { '?' };
    format!(
        "{base_url}{sep}map={map_param}&reduce={reduce}&keepAlive={}",
        keep_alive
    )
}
