// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! §8 boundary case: a read timeout that recurs beyond the retry budget.
//! The host never answers past the 200 status line, so every header read
//! times out; the driver reconnects once (within budget) and then gives up
//! on the second timeout, failing every still-unresolved output (§4.4,
//! final failure-handling bullet: no identifier was resolved yet, so the
//! whole `remaining` set is lost, not just the head).

use std::{sync::Arc, time::Duration};

use shuffle_fetcher::{cfg::config::FetcherConfig, codec::IdentityCodec, connection::NoCredentials, fetcher::Fetcher};

use crate::integration_tests::common::{
    SchedulerCall, TestAllocator, TestScheduler, host_for, spawn_stalling_server, test_config,
};

#[tokio::test]
async fn second_read_timeout_beyond_budget_fails_remaining_outputs() {
    let addr = spawn_stalling_server().await.expect("server");
    let host = host_for(&addr, 7, vec!["attempt_a", "attempt_b"]);

    let scheduler = Arc::new(TestScheduler::new(&host));
    let allocator = Arc::new(TestAllocator::new());
    let config = Arc::new(FetcherConfig {
        read_timeout: Duration::from_millis(80),
        connect_timeout: Duration::from_millis(300),
        ..test_config()
    });

    let mut fetcher = Fetcher::new(
        1,
        config,
        scheduler.clone(),
        allocator,
        Arc::new(IdentityCodec),
        Arc::new(NoCredentials),
    );

    fetcher.run_once(&host).await.expect("run_once ok");

    let calls = scheduler.calls();
    assert_eq!(
        calls,
        vec![
            SchedulerCall::CopyFailed { id: "attempt_a".to_string(), connect_failed: true, read_error: false },
            SchedulerCall::CopyFailed { id: "attempt_b".to_string(), connect_failed: true, read_error: false },
            SchedulerCall::FreeHost,
        ]
    );
    assert_eq!(fetcher.counters().io_errs(), 1);
}
