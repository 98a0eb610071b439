// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! §8 end-to-end scenario 2: server corrupts the second output's
//! `forReduce` field; the session ends with the third output put back.

use std::sync::Arc;

use shuffle_fetcher::{codec::IdentityCodec, connection::NoCredentials, fetcher::Fetcher};

use crate::integration_tests::common::{
    ScriptedOutput, SchedulerCall, TestAllocator, TestScheduler, host_for, spawn_scripted_server, test_config,
};

#[tokio::test]
async fn wrong_partition_on_second_output_ends_session_and_puts_back_the_rest() {
    let outputs = vec![
        ScriptedOutput::new("attempt_a", b"aaa", 7),
        // Routed for partition 9 instead of the requested partition 7.
        ScriptedOutput::new("attempt_b", b"bb", 9),
        ScriptedOutput::new("attempt_c", b"c", 7),
    ];
    let addr = spawn_scripted_server(outputs).await.expect("server");
    let host = host_for(&addr, 7, vec!["attempt_a", "attempt_b", "attempt_c"]);

    let scheduler = Arc::new(TestScheduler::new(&host));
    let allocator = Arc::new(TestAllocator::new());
    let config = Arc::new(test_config());

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
                compressed_len: 3,
                decompressed_len: 3,
                payload: b"aaa".to_vec(),
            },
            SchedulerCall::CopyFailed { id: "attempt_b".to_string(), connect_failed: true, read_error: false },
            SchedulerCall::FreeHost,
            SchedulerCall::PutBack { id: "attempt_c".to_string() },
        ]
    );
    assert_eq!(fetcher.counters().wrong_reduce_errs(), 1);
}
