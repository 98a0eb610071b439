// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fs;

use anyhow::Result;
use bytes::BytesMut;
use hex::FromHex;
use shuffle_fetcher::model::ShuffleHeader;

// Helper to load a hex fixture and decode it to a byte vector.
fn load_fixture(path: &str) -> Result<Vec<u8>> {
    let s = fs::read_to_string(path)?;
    let cleaned = s.trim().replace(|c: char| c.is_whitespace(), "");
    Ok(Vec::from_hex(&cleaned)?)
}

#[test]
fn parses_a_well_formed_header_fixture() -> Result<()> {
    let bytes = load_fixture("tests/unit_tests/fixtures/header/basic.hex")?;
    let mut buf = BytesMut::from(&bytes[..]);

    let header = ShuffleHeader::try_parse(&mut buf)?.expect("fixture carries a full header");
    assert_eq!(header.map_id, "attempt_20260101_0001_m_000003_0");
    assert_eq!(header.uncompressed_length, 12345);
    assert_eq!(header.compressed_length, 6789);
    assert_eq!(header.for_reduce, 7);
    assert!(buf.is_empty(), "fixture contains exactly one header, nothing trailing");

    Ok(())
}

#[test]
fn parses_a_zero_length_header_fixture() -> Result<()> {
    let bytes = load_fixture("tests/unit_tests/fixtures/header/zero_length.hex")?;
    let mut buf = BytesMut::from(&bytes[..]);

    let header = ShuffleHeader::try_parse(&mut buf)?.expect("fixture carries a full header");
    assert_eq!(header.uncompressed_length, 0);
    assert_eq!(header.compressed_length, 0);
    assert_eq!(header.for_reduce, 3);

    Ok(())
}

#[test]
fn rejects_a_prefix_mismatch_on_the_basic_fixture() -> Result<()> {
    let bytes = load_fixture("tests/unit_tests/fixtures/header/basic.hex")?;
    let mut buf = BytesMut::from(&bytes[..]);
    let header = ShuffleHeader::try_parse(&mut buf)?.expect("fixture carries a full header");

    assert!(header.check_prefix("attempt_").is_ok());
    assert!(header.check_prefix("task_").is_err());

    Ok(())
}
