// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! §8 end-to-end scenario 4: the allocator back-pressures on the only
//! pending output. The session yields without reporting success or
//! failure, and the output is put back for a later attempt.

use std::sync::{Arc, atomic::Ordering};

use shuffle_fetcher::{codec::IdentityCodec, connection::NoCredentials, fetcher::Fetcher};

use crate::integration_tests::common::{
    ScriptedOutput, SchedulerCall, TestAllocator, TestScheduler, host_for, spawn_scripted_server, test_config,
};

#[tokio::test]
async fn allocator_wait_yields_and_puts_back_without_any_copy_failed() {
    let outputs = vec![ScriptedOutput::new("attempt_a", b"aaa", 7)];
    let addr = spawn_scripted_server(outputs).await.expect("server");
    let host = host_for(&addr, 7, vec!["attempt_a"]);

    let scheduler = Arc::new(TestScheduler::new(&host));
    let allocator = Arc::new(TestAllocator::new());
    allocator.force_wait.store(true, Ordering::SeqCst);
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
        vec![SchedulerCall::FreeHost, SchedulerCall::PutBack { id: "attempt_a".to_string() }]
    );
}
