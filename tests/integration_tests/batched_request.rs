// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! §10.1 `MaxOutputsPerRequest`: a host with more pending outputs than the
//! configured batch size is fetched over several keep-alive requests
//! instead of truncating the fetch URL and losing track of the outputs
//! past the first batch.

use std::sync::Arc;

use shuffle_fetcher::{cfg::config::FetcherConfig, codec::IdentityCodec, connection::NoCredentials, fetcher::Fetcher};

use crate::integration_tests::common::{
    ScriptedOutput, SchedulerCall, TestAllocator, TestScheduler, host_for, spawn_scripted_server_batches, test_config,
};

#[tokio::test]
async fn pending_list_longer_than_batch_size_spans_several_requests() {
    let batches = vec![
        vec![ScriptedOutput::new("attempt_a", b"aaa", 7), ScriptedOutput::new("attempt_b", b"bbb", 7)],
        vec![ScriptedOutput::new("attempt_c", b"ccc", 7)],
    ];
    let addr = spawn_scripted_server_batches(batches).await.expect("server");
    let host = host_for(&addr, 7, vec!["attempt_a", "attempt_b", "attempt_c"]);

    let scheduler = Arc::new(TestScheduler::new(&host));
    let allocator = Arc::new(TestAllocator::new());
    let config = Arc::new(FetcherConfig { max_outputs_per_request: 2, ..test_config() });

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
            SchedulerCall::CopySucceeded {
                id: "attempt_b".to_string(),
                compressed_len: 3,
                decompressed_len: 3,
                payload: b"bbb".to_vec(),
            },
            SchedulerCall::CopySucceeded {
                id: "attempt_c".to_string(),
                compressed_len: 3,
                decompressed_len: 3,
                payload: b"ccc".to_vec(),
            },
            SchedulerCall::FreeHost,
        ]
    );
    assert_eq!(fetcher.counters().io_errs(), 0);
}
