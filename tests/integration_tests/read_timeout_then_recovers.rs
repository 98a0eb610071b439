// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! §8 end-to-end scenario 5: a read timeout within the retry budget
//! reconnects and the session completes normally, as opposed to
//! `read_timeout_gives_up`'s case where a second timeout exhausts the
//! budget.

use std::{sync::Arc, time::Duration};

use shuffle_fetcher::{cfg::config::FetcherConfig, codec::IdentityCodec, connection::NoCredentials, fetcher::Fetcher};

use crate::integration_tests::common::{
    ScriptedOutput, SchedulerCall, TestAllocator, TestScheduler, host_for, spawn_timeout_once_then_serve_server,
    test_config,
};

#[tokio::test]
async fn first_read_timeout_retries_and_session_completes() {
    let outputs = vec![ScriptedOutput::new("attempt_a", b"payload-a", 7)];
    let addr = spawn_timeout_once_then_serve_server(outputs).await.expect("server");
    let host = host_for(&addr, 7, vec!["attempt_a"]);

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

    assert_eq!(
        scheduler.calls(),
        vec![
            SchedulerCall::CopySucceeded {
                id: "attempt_a".to_string(),
                compressed_len: 9,
                decompressed_len: 9,
                payload: b"payload-a".to_vec(),
            },
            SchedulerCall::FreeHost,
        ]
    );
    assert_eq!(fetcher.counters().io_errs(), 0);
    assert_eq!(fetcher.counters().successful_fetches(), 1);
}
