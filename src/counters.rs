// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Process-wide monotonic counters (§6.6, §9 "Global counters").
//!
//! Passed into each `Fetcher` as a shared handle rather than read through a
//! process-wide singleton, so tests can construct a fresh set per case.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct FetchCounters {
    pub connection_errs: AtomicU64,
    pub io_errs: AtomicU64,
    pub wrong_length_errs: AtomicU64,
    pub bad_id_errs: AtomicU64,
    pub wrong_map_errs: AtomicU64,
    pub wrong_reduce_errs: AtomicU64,
    pub successful_fetches: AtomicU64,
    pub failed_fetches: AtomicU64,
}

impl FetchCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_errs(&self) -> u64 {
        self.connection_errs.load(Ordering::Relaxed)
    }

    pub fn io_errs(&self) -> u64 {
        self.io_errs.load(Ordering::Relaxed)
    }

    pub fn wrong_length_errs(&self) -> u64 {
        self.wrong_length_errs.load(Ordering::Relaxed)
    }

    pub fn bad_id_errs(&self) -> u64 {
        self.bad_id_errs.load(Ordering::Relaxed)
    }

    pub fn wrong_map_errs(&self) -> u64 {
        self.wrong_map_errs.load(Ordering::Relaxed)
    }

    pub fn wrong_reduce_errs(&self) -> u64 {
        self.wrong_reduce_errs.load(Ordering::Relaxed)
    }

    pub fn successful_fetches(&self) -> u64 {
        self.successful_fetches.load(Ordering::Relaxed)
    }

    pub fn failed_fetches(&self) -> u64 {
        self.failed_fetches.load(Ordering::Relaxed)
    }

    pub(crate) fn inc_connection_errs(&self) {
        self.connection_errs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_io_errs(&self) {
        self.io_errs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_wrong_length_errs(&self) {
        self.wrong_length_errs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_bad_id_errs(&self) {
        self.bad_id_errs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_wrong_map_errs(&self) {
        self.wrong_map_errs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_wrong_reduce_errs(&self) {
        self.wrong_reduce_errs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_successful_fetches(&self) {
        self.successful_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_failed_fetches(&self) {
        self.failed_fetches.fetch_add(1, Ordering::Relaxed);
    }
}
