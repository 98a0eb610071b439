// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Payload decompression is explicitly out of scope for this crate (§1
//! Non-goals): the fetcher only knows it must hand the compressed bytes to
//! *something* that produces exactly `decompressed_len` bytes, honoring the
//! ifile read-ahead hint (§4.4 step 5). Real codecs plug in through this
//! trait; [`IdentityCodec`] is the uncompressed stand-in used by tests and
//! by deployments that disable map-output compression.

use bytes::Bytes;

pub trait PayloadCodec: Send + Sync {
    /// Decompresses `compressed` into exactly `decompressed_len` bytes.
    /// `read_ahead_hint` mirrors the ifile read-ahead prefetch flag; real
    /// codecs may use it to size an internal buffer.
    fn decompress(
        &self,
        compressed: &[u8],
        decompressed_len: usize,
        read_ahead_hint: bool,
    ) -> std::io::Result<Bytes>;
}

/// Treats the wire bytes as already uncompressed. Requires
/// `compressed_len == decompressed_len`, matching an upstream configured
/// with no map-output compression.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityCodec;

impl PayloadCodec for IdentityCodec {
    fn decompress(
        &self,
        compressed: &[u8],
        decompressed_len: usize,
        _read_ahead_hint: bool,
    ) -> std::io::Result<Bytes> {
        if compressed.len() != decompressed_len {
            return Err(std::io::Error::other(format!(
                "identity codec requires equal lengths: compressed={} decompressed={}",
                compressed.len(),
                decompressed_len
            )));
        }
        Ok(Bytes::copy_from_slice(compressed))
    }
}
