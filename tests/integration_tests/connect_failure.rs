// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! §8 end-to-end scenario 3: nothing is listening on the assigned host.
//! Every pending output is reported `copyFailed(connectFailed=true,
//! readError=false)` and the session ends.

use std::sync::Arc;

use shuffle_fetcher::{codec::IdentityCodec, connection::NoCredentials, fetcher::Fetcher};

use crate::integration_tests::common::{
    SchedulerCall, TestAllocator, TestScheduler, host_for, test_config, unreachable_addr,
};

#[tokio::test]
async fn tcp_connect_failure_fails_every_pending_output() {
    let addr = unreachable_addr().await.expect("unreachable addr");
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
            SchedulerCall::CopyFailed { id: "attempt_a".to_string(), connect_failed: true, read_error: false },
            SchedulerCall::CopyFailed { id: "attempt_b".to_string(), connect_failed: true, read_error: false },
            SchedulerCall::CopyFailed { id: "attempt_c".to_string(), connect_failed: true, read_error: false },
            SchedulerCall::FreeHost,
        ]
    );
    assert_eq!(fetcher.counters().io_errs(), 1);
    assert_eq!(fetcher.counters().connection_errs(), 1);
}
