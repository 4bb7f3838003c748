//! Harvest orchestrator
//!
//! Composes the planner, request executor, dedup index, and checkpoint
//! store into the main harvest loop:
//! 1. Restores checkpoint state (unless starting fresh)
//! 2. Runs a bounded pool of workers, each draining one task end-to-end
//!    (search, dedup-filtered detail fetches, threshold accept)
//! 3. Saves a checkpoint every K accepted records and once on shutdown
//! 4. Suspends (rather than fails) when every credential is out of quota
//! 5. Gives failed tasks a single retry pass at the end of the run

use crate::api::{build_http_client, DirectoryClient, ExecError, RequestExecutor};
use crate::checkpoint::{CheckpointStore, RunCheckpoint};
use crate::config::Config;
use crate::crawler::progress::ProgressTracker;
use crate::output::write_csv;
use crate::plan::{CrawlPlanner, SearchTask};
use crate::quota::{CredentialPool, RateLimiter};
use crate::records::{engagement_rate, ChannelRecord, DedupIndex};
use crate::AtlasError;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

/// Final statistics for one run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub accepted: usize,
    pub tasks_done: usize,
    pub tasks_failed: usize,
    pub searches: usize,
    pub interrupted: bool,
}

/// Result state shared by all workers
struct HarvestState {
    records: Vec<ChannelRecord>,
    dedup: DedupIndex,
}

/// Everything one worker needs, cheap to clone
#[derive(Clone)]
struct WorkerCtx {
    config: Arc<Config>,
    config_hash: String,
    planner: Arc<Mutex<CrawlPlanner>>,
    executor: Arc<RequestExecutor>,
    state: Arc<Mutex<HarvestState>>,
    store: Arc<Mutex<CheckpointStore>>,
    progress: Arc<ProgressTracker>,
    /// Completed-task ids from the loaded checkpoint that name no task in
    /// the current plan; carried into every save so they are never dropped
    carried_completed: Arc<Vec<String>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown: watch::Receiver<bool>,
}

/// Why a worker abandoned the task it was processing
enum TaskAbort {
    /// Stop signal received; task goes back to Pending
    Shutdown,

    /// Retry budget exhausted; task is marked Failed
    Failed(String),

    /// Every credential is invalid; the whole run must stop
    Fatal,
}

/// Main harvest driver
pub struct Orchestrator {
    config: Arc<Config>,
    config_hash: String,
    planner: Arc<Mutex<CrawlPlanner>>,
    executor: Arc<RequestExecutor>,
    state: Arc<Mutex<HarvestState>>,
    store: Arc<Mutex<CheckpointStore>>,
    progress: Arc<ProgressTracker>,
    carried_completed: Arc<Vec<String>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    worker_count: usize,
}

impl Orchestrator {
    /// Creates an orchestrator, restoring checkpoint state unless `fresh`
    ///
    /// # Errors
    ///
    /// Fails if the checkpoint file exists but is unreadable or corrupt:
    /// silently proceeding would lose resumability and re-bill quota.
    pub fn new(config: Config, config_hash: String, fresh: bool) -> Result<Self, AtlasError> {
        let mut store = CheckpointStore::new(&config.output.checkpoint_path);

        let checkpoint = if fresh {
            if Path::new(&config.output.checkpoint_path).exists() {
                tracing::warn!("Starting fresh: existing checkpoint will be overwritten");
            }
            None
        } else {
            store.load()?
        };

        let mut planner = CrawlPlanner::new(&config);
        let mut records = Vec::new();
        let mut dedup = DedupIndex::new();
        let mut carried_completed = Vec::new();

        if let Some(checkpoint) = &checkpoint {
            if !checkpoint.config_hash.is_empty() && checkpoint.config_hash != config_hash {
                tracing::warn!(
                    "Configuration changed since the checkpoint was written; \
                     completed tasks from the old plan are preserved but no longer scheduled"
                );
            }
            let completed: HashSet<String> = checkpoint.completed_tasks.iter().cloned().collect();
            carried_completed = planner.prime_completed(&completed);
            if !carried_completed.is_empty() {
                tracing::info!(
                    "{} completed tasks from the checkpoint are not in the current plan; \
                     carrying them forward",
                    carried_completed.len()
                );
            }
            records = checkpoint.records.clone();
            dedup = DedupIndex::from_ids(checkpoint.seen_ids.iter().cloned());
        }

        let pool = CredentialPool::new(&config.credential, &config.quota);
        if pool.is_empty() {
            return Err(AtlasError::NoUsableCredentials(
                "configuration supplies no credentials".to_string(),
            ));
        }

        let limiter = RateLimiter::new(Duration::from_millis(config.quota.rate_limit_ms));
        let http = build_http_client(config.api.timeout_secs)?;
        let client = DirectoryClient::new(http, &config.api.base_url);
        let executor = RequestExecutor::new(
            Arc::new(Mutex::new(pool)),
            Arc::new(limiter),
            Arc::new(client),
            config.quota.clone(),
        );

        // One worker per credential is enough to keep the pool busy
        let worker_count = (config.harvest.workers as usize).min(config.credential.len()).max(1);

        let progress = ProgressTracker::new(config.harvest.target_count, records.len());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config: Arc::new(config),
            config_hash,
            planner: Arc::new(Mutex::new(planner)),
            executor: Arc::new(executor),
            state: Arc::new(Mutex::new(HarvestState { records, dedup })),
            store: Arc::new(Mutex::new(store)),
            progress: Arc::new(progress),
            carried_completed: Arc::new(carried_completed),
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            worker_count,
        })
    }

    /// Handle that triggers a graceful stop, as the interrupt signal does
    pub fn shutdown_handle(&self) -> Arc<watch::Sender<bool>> {
        Arc::clone(&self.shutdown_tx)
    }

    /// Runs the harvest to completion, interrupt, or fatal credential failure
    pub async fn run(self) -> Result<RunSummary, AtlasError> {
        let signal_tx = Arc::clone(&self.shutdown_tx);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received: finishing in-flight fetches, then saving");
                let _ = signal_tx.send(true);
            }
        });

        {
            let planner = self.planner.lock().unwrap();
            tracing::info!(
                "Starting harvest: {} tasks ({} already done), {} workers, target {} records",
                planner.total(),
                planner.done_count(),
                self.worker_count,
                self.config.harvest.target_count
            );
        }

        let mut result = self.run_pass().await;

        // Single re-attempt pass for tasks that exhausted their retries
        if result.is_ok() && !*self.shutdown_rx.borrow() {
            let reset = self.planner.lock().unwrap().reset_failed();
            if reset > 0 {
                tracing::info!("Re-attempting {} failed tasks", reset);
                result = self.run_pass().await;
            }
        }

        let still_failed = self.planner.lock().unwrap().failed_ids();
        if !still_failed.is_empty() {
            tracing::warn!(
                "{} tasks failed and were skipped: {:?}",
                still_failed.len(),
                still_failed
            );
        }

        // Final checkpoint and export happen even after a fatal error, so
        // nothing already collected is lost
        let ctx = self.worker_ctx();
        save_checkpoint(&ctx);

        let records = self.state.lock().unwrap().records.clone();
        write_csv(&records, Path::new(&self.config.output.csv_path))?;

        result?;

        let interrupted = *self.shutdown_rx.borrow();
        let (tasks_done, tasks_failed) = {
            let planner = self.planner.lock().unwrap();
            (planner.done_count(), planner.failed_ids().len())
        };
        let summary = RunSummary {
            accepted: records.len(),
            tasks_done,
            tasks_failed,
            searches: self.progress.searches(),
            interrupted,
        };

        tracing::info!(
            "Harvest {}: {} records accepted, {} tasks done, {} searches, {:.1} records/hour",
            if interrupted { "interrupted" } else { "complete" },
            summary.accepted,
            summary.tasks_done,
            summary.searches,
            self.progress.rate_per_hour()
        );

        Ok(summary)
    }

    /// Spawns the worker pool and waits for it to drain the plan
    async fn run_pass(&self) -> Result<(), AtlasError> {
        let mut handles = Vec::with_capacity(self.worker_count);
        for worker_id in 0..self.worker_count {
            let ctx = self.worker_ctx();
            handles.push(tokio::spawn(worker_loop(ctx, worker_id)));
        }

        let mut fatal = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => fatal = Some(e),
                Err(e) => return Err(AtlasError::WorkerPanic(e.to_string())),
            }
        }

        match fatal {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn worker_ctx(&self) -> WorkerCtx {
        WorkerCtx {
            config: Arc::clone(&self.config),
            config_hash: self.config_hash.clone(),
            planner: Arc::clone(&self.planner),
            executor: Arc::clone(&self.executor),
            state: Arc::clone(&self.state),
            store: Arc::clone(&self.store),
            progress: Arc::clone(&self.progress),
            carried_completed: Arc::clone(&self.carried_completed),
            shutdown_tx: Arc::clone(&self.shutdown_tx),
            shutdown: self.shutdown_rx.clone(),
        }
    }
}

/// One worker: pull a task, process it end-to-end, repeat
async fn worker_loop(mut ctx: WorkerCtx, worker_id: usize) -> Result<(), AtlasError> {
    loop {
        if *ctx.shutdown.borrow() || target_reached(&ctx) {
            break;
        }

        let task = match ctx.planner.lock().unwrap().next_pending() {
            Some(task) => task,
            None => break,
        };
        let task_id = task.id();
        tracing::info!("[worker {}] Searching '{}'", worker_id, task.query);

        let outcome = process_task(&mut ctx, &task).await;
        match outcome {
            Ok(()) => {
                ctx.planner.lock().unwrap().mark_done(&task_id);
                let searches = ctx.progress.record_search();
                if searches % 10 == 0 {
                    ctx.progress
                        .report(ctx.executor.active_credentials(), ctx.config.credential.len());
                }
            }
            Err(TaskAbort::Failed(message)) => {
                tracing::warn!("[worker {}] Task {} failed: {}", worker_id, task_id, message);
                ctx.planner.lock().unwrap().mark_failed(&task_id);
            }
            Err(TaskAbort::Shutdown) => {
                ctx.planner.lock().unwrap().release(&task_id);
                break;
            }
            Err(TaskAbort::Fatal) => {
                ctx.planner.lock().unwrap().release(&task_id);
                let _ = ctx.shutdown_tx.send(true);
                return Err(AtlasError::NoUsableCredentials(
                    "every credential failed authentication".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// Processes one search task: search, then enrich and accept each candidate
async fn process_task(ctx: &mut WorkerCtx, task: &SearchTask) -> Result<(), TaskAbort> {
    let harvest = &ctx.config.harvest;

    // Global quota exhaustion suspends the task rather than failing it; the
    // same search is retried once a window resets
    let candidates = loop {
        match ctx
            .executor
            .search(
                &task.query,
                harvest.max_results_per_search,
                harvest.published_after.as_deref(),
            )
            .await
        {
            Ok(candidates) => break candidates,
            Err(ExecError::QuotaExhaustedGlobal { retry_after }) => {
                tracing::warn!(
                    "All credentials out of quota; suspending for {:?}",
                    retry_after
                );
                wait_or_shutdown(&mut ctx.shutdown, retry_after).await?;
            }
            Err(ExecError::AllCredentialsInvalid) => return Err(TaskAbort::Fatal),
            Err(e @ ExecError::Transient { .. }) => return Err(TaskAbort::Failed(e.to_string())),
        }
    };

    if candidates.is_empty() {
        tracing::debug!("No channels found for '{}'", task.query);
        return Ok(());
    }
    tracing::debug!("Found {} candidates for '{}'", candidates.len(), task.query);

    'candidates: for candidate in candidates {
        // A stop signal lets the current fetch finish but starts no new one
        if *ctx.shutdown.borrow() {
            return Err(TaskAbort::Shutdown);
        }
        if target_reached(ctx) {
            break;
        }

        // Already enriched by an overlapping search; skip the detail spend
        if ctx.state.lock().unwrap().dedup.seen(&candidate.channel_id) {
            continue;
        }

        let detail = loop {
            match ctx.executor.detail(&candidate.channel_id).await {
                Ok(Some(detail)) => break detail,
                Ok(None) => {
                    // Vanished between search and fetch; remember it so no
                    // later search re-spends a detail call on it
                    ctx.state.lock().unwrap().dedup.mark(&candidate.channel_id);
                    continue 'candidates;
                }
                Err(ExecError::QuotaExhaustedGlobal { retry_after }) => {
                    tracing::warn!(
                        "All credentials out of quota; suspending for {:?}",
                        retry_after
                    );
                    wait_or_shutdown(&mut ctx.shutdown, retry_after).await?;
                }
                Err(ExecError::AllCredentialsInvalid) => return Err(TaskAbort::Fatal),
                Err(e @ ExecError::Transient { .. }) => {
                    // One bad candidate does not fail the task. Left unseen
                    // so an overlapping search can retry the fetch later.
                    tracing::warn!("Skipping candidate {}: {}", candidate.channel_id, e);
                    continue 'candidates;
                }
            }
        };

        let accepted_at = {
            let mut state = ctx.state.lock().unwrap();

            // Re-check under the lock: another worker may have enriched the
            // same channel from an overlapping search
            if !state.dedup.mark(&candidate.channel_id) {
                continue;
            }

            if detail.subscribers < harvest.min_subscribers {
                tracing::debug!(
                    "Rejected {} ({} subscribers below threshold)",
                    detail.title,
                    detail.subscribers
                );
                None
            } else if state.records.len() >= harvest.target_count {
                None
            } else {
                let record = build_record(ctx.config.as_ref(), task, detail);
                tracing::info!(
                    "Accepted: {} ({} subscribers)",
                    record.title,
                    record.subscriber_count
                );
                state.records.push(record);
                Some(state.records.len())
            }
        };

        if let Some(count) = accepted_at {
            ctx.progress.record_accepted();
            if count % harvest.checkpoint_interval == 0 {
                save_checkpoint(ctx);
            }
        }
    }

    Ok(())
}

/// Builds the final record from an enriched detail response
fn build_record(config: &Config, task: &SearchTask, detail: crate::api::ChannelDetail) -> ChannelRecord {
    let description: String = detail
        .description
        .chars()
        .take(config.harvest.max_description_length)
        .collect();

    ChannelRecord {
        channel_id: detail.id,
        title: detail.title,
        description,
        subscriber_count: detail.subscribers,
        view_count: detail.views,
        video_count: detail.videos,
        created_at: detail.created_at,
        engagement_rate: engagement_rate(detail.views, detail.subscribers),
        category: task.display_category.clone(),
        niche: task.niche.clone(),
        city: task.city.clone(),
        country: task.country.clone(),
        source_query: task.query.clone(),
        collected_at: chrono::Utc::now().to_rfc3339(),
    }
}

/// Builds and writes a checkpoint snapshot
///
/// The planner snapshot is taken before the result snapshot so the
/// completed-task set can never name a task whose records are missing.
/// Completed ids carried from a prior plan are appended to every snapshot,
/// keeping the on-disk completed set a superset of every earlier one.
/// Save failures are logged, not fatal; the next trigger retries.
fn save_checkpoint(ctx: &WorkerCtx) {
    let (mut completed_tasks, failed_tasks) = {
        let planner = ctx.planner.lock().unwrap();
        (planner.completed_ids(), planner.failed_ids())
    };
    completed_tasks.extend(ctx.carried_completed.iter().cloned());
    let (records, seen_ids) = {
        let state = ctx.state.lock().unwrap();
        (state.records.clone(), state.dedup.ids())
    };

    let mut checkpoint = RunCheckpoint {
        accepted_count: records.len(),
        completed_tasks,
        failed_tasks,
        seen_ids,
        records,
        config_hash: ctx.config_hash.clone(),
        ..Default::default()
    };

    if let Err(e) = ctx.store.lock().unwrap().save(&mut checkpoint) {
        tracing::error!("Checkpoint save failed: {}", e);
    }
}

fn target_reached(ctx: &WorkerCtx) -> bool {
    ctx.state.lock().unwrap().records.len() >= ctx.config.harvest.target_count
}

/// Sleeps for the given duration unless the stop signal arrives first
async fn wait_or_shutdown(
    shutdown: &mut watch::Receiver<bool>,
    wait: Duration,
) -> Result<(), TaskAbort> {
    if *shutdown.borrow() {
        return Err(TaskAbort::Shutdown);
    }
    tokio::select! {
        _ = tokio::time::sleep(wait) => Ok(()),
        _ = shutdown.changed() => Err(TaskAbort::Shutdown),
    }
}
