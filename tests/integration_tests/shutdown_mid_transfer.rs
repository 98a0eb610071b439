// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! §8 end-to-end scenario 6: `shut_down()` is called from another task
//! while the second output's payload read is in flight. No `copyFailed`
//! is emitted for it; it is put back instead, and `freeHost` still runs.

use std::{sync::Arc, time::Duration};

use shuffle_fetcher::{cfg::config::FetcherConfig, codec::IdentityCodec, connection::NoCredentials, fetcher::Fetcher};

use crate::integration_tests::common::{
    ScriptedOutput, SchedulerCall, TestAllocator, TestScheduler, host_for, spawn_header_then_stall_server,
    test_config,
};

#[tokio::test]
async fn shutdown_during_payload_read_puts_back_without_copy_failed() {
    let outputs = vec![ScriptedOutput::new("attempt_a", b"aaa", 7), ScriptedOutput::new("attempt_b", b"bb", 7)];
    let addr = spawn_header_then_stall_server(outputs).await.expect("server");
    let host = host_for(&addr, 7, vec!["attempt_a", "attempt_b"]);

    let scheduler = Arc::new(TestScheduler::new(&host));
    let allocator = Arc::new(TestAllocator::new());
    let config = Arc::new(FetcherConfig { read_timeout: Duration::from_secs(10), ..test_config() });

    let mut fetcher = Fetcher::new(
        1,
        config,
        scheduler.clone(),
        allocator,
        Arc::new(IdentityCodec),
        Arc::new(NoCredentials),
    );

    let handle = fetcher.handle();
    let shutdown_task = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.shut_down().await;
    });

    fetcher.run_once(&host).await.expect("run_once ok");
    shutdown_task.await.expect("shutdown task");

    assert!(fetcher.is_stopped());
    assert_eq!(
        scheduler.calls(),
        vec![
            SchedulerCall::CopySucceeded {
                id: "attempt_a".to_string(),
                compressed_len: 3,
                decompressed_len: 3,
                payload: b"aaa".to_vec(),
            },
            SchedulerCall::FreeHost,
            SchedulerCall::PutBack { id: "attempt_b".to_string() },
        ]
    );
}
