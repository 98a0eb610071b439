// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Host session driver (§4.1) and lifecycle (§4.7): the top-level
//! per-assignment routine that composes the connection, retry, transfer
//! and local-disk layers and owns the put-back / free-host guarantees.

use std::{sync::Arc, time::Instant};

use anyhow::Result;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info_span, warn};

use crate::{
    allocator::Allocator,
    cfg::config::FetcherConfig,
    codec::PayloadCodec,
    connection::{ConnectOutcome, ConnectionSession, CredentialsProvider},
    counters::FetchCounters,
    local_disk,
    model::{MapHost, MapOutput, header::build_fetch_url, identifier::InputAttemptIdentifier},
    retry::RetryController,
    scheduler::Scheduler,
    transfer::{TransferOutcome, transfer_one},
};

/// One worker's persistent identity and collaborators (§3 `Fetcher`).
///
/// `run_once` takes `&mut self`: per §5, a fetcher is single-threaded
/// internally except for `shut_down`, which is the only method callable
/// concurrently from another task and therefore the only state
/// (`cancel`, `current_conn`) shared behind interior mutability.
pub struct Fetcher<S: Scheduler, A: Allocator> {
    id: u64,
    cancel: CancellationToken,
    counters: Arc<FetchCounters>,
    config: Arc<FetcherConfig>,
    scheduler: Arc<S>,
    allocator: Arc<A>,
    codec: Arc<dyn PayloadCodec>,
    credentials: Arc<dyn CredentialsProvider>,
    current_conn: Arc<Mutex<Option<Arc<ConnectionSession>>>>,
    retry: RetryController,
}

/// Clonable, `&mut`-free handle onto the two pieces of state `shut_down`
/// touches (§5 "Current connection handle"). `run_once` holds `&mut
/// Fetcher` for its whole duration, so the concurrent "another thread
/// calls `shut_down` mid-session" contract can only be exercised through a
/// handle taken *before* `run_once` starts, never through `Fetcher` itself.
#[derive(Clone)]
pub struct FetcherHandle {
    cancel: CancellationToken,
    current_conn: Arc<Mutex<Option<Arc<ConnectionSession>>>>,
}

impl FetcherHandle {
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Idempotent (§4.7): sets the stop flag and closes whatever connection
    /// is currently open with a graceful (non-disconnecting) shutdown, so
    /// an in-flight read observes EOF instead of blocking forever.
    pub async fn shut_down(&self) {
        self.cancel.cancel();
        if let Some(conn) = self.current_conn.lock().await.clone() {
            conn.cleanup(false).await;
        }
    }
}

impl<S: Scheduler, A: Allocator> Fetcher<S, A> {
    pub fn new(
        id: u64,
        config: Arc<FetcherConfig>,
        scheduler: Arc<S>,
        allocator: Arc<A>,
        codec: Arc<dyn PayloadCodec>,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Self {
        Self {
            id,
            cancel: CancellationToken::new(),
            counters: Arc::new(FetchCounters::new()),
            config,
            scheduler,
            allocator,
            codec,
            credentials,
            current_conn: Arc::new(Mutex::new(None)),
            retry: RetryController::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn counters(&self) -> &FetchCounters {
        &self.counters
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Clones out a handle that can call `shut_down` from another task
    /// while `run_once` is mid-flight (§5). Take this *before* calling
    /// `run_once`, since `run_once` borrows `&mut self` for its duration.
    pub fn handle(&self) -> FetcherHandle {
        FetcherHandle {
            cancel: self.cancel.clone(),
            current_conn: self.current_conn.clone(),
        }
    }

    /// Idempotent (§4.7): sets the stop flag and closes whatever connection
    /// is currently open with a graceful (non-disconnecting) shutdown, so
    /// an in-flight read observes EOF instead of blocking forever.
    pub async fn shut_down(&self) {
        self.handle().shut_down().await;
    }

    /// Executes one full assignment (§4.1) and returns. Never propagates a
    /// per-output or per-host failure as `Err` — those are reported to the
    /// scheduler. `Err` here is reserved for the "fatal protocol gap" case
    /// (§7) and is expected to be routed to the caller's exception
    /// reporter, fatal-to-task rather than fatal-to-process.
    pub async fn run_once(&mut self, host: &MapHost) -> Result<()> {
        let span = info_span!("run_once", host = host.identifier(), partition = host.partition());
        self.run_once_inner(host).instrument(span).await
    }

    async fn run_once_inner(&mut self, host: &MapHost) -> Result<()> {
        let mut remaining = self.scheduler.get_maps_for_host(host).await;
        if remaining.is_empty() {
            // §8 boundary case: no freeHost call on the early-return path.
            return Ok(());
        }
        self.retry.reset();

        let result = if self.config.local_disk_fetch_enabled && host.identifier() == self.config.local_host_port {
            self.run_local_disk(host, &mut remaining).await
        } else {
            self.run_http(host, &mut remaining).await
        };

        if let Some(conn) = self.current_conn.lock().await.take() {
            conn.cleanup(false).await;
        }
        self.scheduler.free_host(host).await;
        self.put_back_remaining(host, remaining).await;

        result
    }

    /// §4.1.1: the head of `remaining` is put back last, preserving the
    /// legacy ordering the scheduler's fairness depends on.
    async fn put_back_remaining(&self, host: &MapHost, remaining: Vec<InputAttemptIdentifier>) {
        let mut iter = remaining.into_iter();
        let Some(head) = iter.next() else {
            return;
        };
        for id in iter {
            self.scheduler.put_back_known_map_output(host, id).await;
        }
        self.scheduler.put_back_known_map_output(host, head).await;
    }

    /// §4.1.2 HTTP session flow.
    async fn run_http(&mut self, host: &MapHost, remaining: &mut Vec<InputAttemptIdentifier>) -> Result<()> {
        let conn = Arc::new(ConnectionSession::empty());
        *self.current_conn.lock().await = Some(conn.clone());

        if !self.setup_connection(host, &conn, remaining).await {
            return Ok(());
        }
        // §10.1 MaxOutputsPerRequest: the URL just sent only asked the
        // server for this many of `remaining`; once they're accounted for,
        // reconnect and request the next batch rather than keep reading
        // from a connection the server never promised more output on.
        let mut batch_quota = remaining.len().min(self.config.max_outputs_per_request);

        let mut failure_recorded = false;

        while !remaining.is_empty() {
            if self.cancel.is_cancelled() {
                failure_recorded = true;
                break;
            }

            if batch_quota == 0 {
                if !self.reconnect_for_more_output(host, &conn, remaining).await {
                    failure_recorded = true;
                    break;
                }
                batch_quota = remaining.len().min(self.config.max_outputs_per_request);
                continue;
            }

            let outcome = transfer_one(
                host,
                remaining,
                &conn,
                self.scheduler.as_ref(),
                self.allocator.as_ref(),
                self.codec.as_ref(),
                &self.counters,
                &mut self.retry,
                &self.config.map_id_prefix,
                self.config.read_timeout,
                self.config.read_timeout,
                self.id,
                &self.cancel,
            )
            .await;

            match outcome {
                TransferOutcome::Success(id) => {
                    remaining.retain(|r| r != &id);
                    batch_quota = batch_quota.saturating_sub(1);
                },
                TransferOutcome::ReadTimeoutRetry => {
                    if !self.reconnect_for_more_output(host, &conn, remaining).await {
                        failure_recorded = true;
                        break;
                    }
                    batch_quota = remaining.len().min(self.config.max_outputs_per_request);
                },
                TransferOutcome::Failed(ids) => {
                    for id in &ids {
                        self.scheduler.copy_failed(id, host, true, false).await;
                    }
                    remaining.retain(|r| !ids.contains(r));
                    failure_recorded = true;
                    break;
                },
                TransferOutcome::Yielded | TransferOutcome::Stopped => {
                    failure_recorded = true;
                    break;
                },
            }
        }

        conn.cleanup(false).await;

        if !failure_recorded && !remaining.is_empty() {
            // §7 "Fatal protocol gap": the loop exited with neither a
            // failure nor an empty remaining set, which should be
            // unreachable given the match above. `run_once`'s contract
            // reserves `Err` for exactly this case so it reaches the
            // caller's generic fetch-failure reporter rather than the
            // scheduler's local-resource-error channel.
            return Err(anyhow::anyhow!(
                "server didn't return all expected outputs for host {}",
                host.identifier()
            ));
        }

        Ok(())
    }

    /// Reconnects mid-session, either because a read timeout needs a fresh
    /// socket (§4.3) or because the current batch of
    /// `MaxOutputsPerRequest` outputs is exhausted and more of `remaining`
    /// is still pending (§10.1). On failure, only the head of `remaining`
    /// is failed (§9 Open Question — the head may have been partially
    /// consumed already; this is the documented trade-off, not a bug).
    async fn reconnect_for_more_output(
        &self,
        host: &MapHost,
        conn: &ConnectionSession,
        remaining: &mut Vec<InputAttemptIdentifier>,
    ) -> bool {
        conn.cleanup(true).await;
        if self.cancel.is_cancelled() {
            return false;
        }
        if !self.setup_connection(host, conn, remaining).await {
            if let Some(head) = remaining.first().cloned() {
                self.scheduler.copy_failed(&head, host, true, false).await;
                remaining.retain(|r| r != &head);
            }
            return false;
        }
        true
    }

    /// §4.2. Returns `true` on a connection ready to read output headers
    /// from, `false` otherwise (either cooperative stop, or a reported
    /// whole-host failure — the caller must not treat `false` as an error
    /// to propagate).
    async fn setup_connection(
        &self,
        host: &MapHost,
        conn: &ConnectionSession,
        remaining: &[InputAttemptIdentifier],
    ) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        let components: Vec<&str> = remaining
            .iter()
            .take(self.config.max_outputs_per_request)
            .map(InputAttemptIdentifier::path_component)
            .collect();
        let url = build_fetch_url(host.base_url(), &components, host.partition(), self.config.keep_alive);

        match conn
            .connect(
                host,
                &url,
                self.config.connect_timeout,
                self.config.read_timeout,
                self.credentials.as_ref(),
                &self.cancel,
            )
            .await
        {
            ConnectOutcome::Connected => true,
            ConnectOutcome::Stopped => false,
            ConnectOutcome::TcpFailed(e) => {
                warn!("connect to {} failed: {e}", host.identifier());
                self.counters.inc_io_errs();
                self.counters.inc_connection_errs();
                if !self.cancel.is_cancelled() {
                    for id in remaining {
                        self.scheduler.copy_failed(id, host, true, false).await;
                    }
                }
                false
            },
            ConnectOutcome::ProtocolFailed(e) => {
                warn!("fetch session with {} failed: {e}", host.identifier());
                self.counters.inc_io_errs();
                if !self.cancel.is_cancelled() {
                    for id in remaining {
                        self.scheduler.copy_failed(id, host, false, true).await;
                    }
                }
                false
            },
        }
    }

    /// §4.6 Local-Disk Bypass: per-output success/failure, unlike the
    /// whole-host HTTP failure model.
    async fn run_local_disk(&mut self, host: &MapHost, remaining: &mut Vec<InputAttemptIdentifier>) -> Result<()> {
        let mut done = Vec::new();
        for id in remaining.iter() {
            if self.cancel.is_cancelled() {
                break;
            }
            let started = Instant::now();
            match self.fetch_one_local(host, id).await {
                Ok((map_output, part_length, raw_length)) => {
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    self.scheduler
                        .copy_succeeded(id, host, part_length, raw_length, elapsed_ms, map_output)
                        .await;
                    done.push(id.clone());
                },
                Err(e) => {
                    warn!("local-disk fetch of {id} failed: {e}");
                    self.counters.inc_io_errs();
                    self.scheduler.copy_failed(id, host, true, false).await;
                    done.push(id.clone());
                },
            }
        }
        remaining.retain(|r| !done.contains(r));
        Ok(())
    }

    async fn fetch_one_local(
        &self,
        host: &MapHost,
        id: &InputAttemptIdentifier,
    ) -> Result<(MapOutput, i64, i64)> {
        let data_path = local_disk::data_file_path(&self.config, id.path_component())
            .ok_or_else(|| anyhow::anyhow!("no local directory configured for {}", id.path_component()))?;
        let index_path = local_disk::index_file_path(&self.config, id.path_component())
            .ok_or_else(|| anyhow::anyhow!("no local directory configured for {}", id.path_component()))?;

        let record = local_disk::read_index_record(&index_path, host.partition()).await?;

        let map_output = MapOutput::DiskRef {
            id: id.clone(),
            path: data_path,
            offset: record.start_offset as u64,
            length: record.part_length as u64,
        };
        Ok((map_output, record.part_length, record.raw_length))
    }
}
