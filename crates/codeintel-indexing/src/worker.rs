//! The embedding job worker.
//!
//! A single-stage claim/process/retry loop: one claim pulls a batch of
//! already-locked `Processing` jobs, and each job resolves to `Completed`,
//! re-queued `Pending` with backoff, or `Blocked` before the next claim.
//! Shutdown is cooperative via an `Arc<AtomicBool>` signal checked between
//! claims.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use codeintel_config::EmbeddingJobsConfig;
use codeintel_embeddings::EmbeddingProvider;
use codeintel_storage::{EmbeddingJob, MetadataRepository, NewEmbedding, StorageResult};
use tokio::time::sleep;
use tracing::{info, warn};

const CHUNK_MISSING: &str = "chunk_missing";
const MAX_ATTEMPTS_EXCEEDED: &str = "max_attempts_exceeded";

/// Worker-instance tuning, orthogonal to the job-queue semantics carried in
/// `EmbeddingJobsConfig`. Workers are identified by a stable string id.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub poll_interval_ms: u64,
}

impl WorkerConfig {
    #[must_use]
    pub fn new(worker_id: impl Into<String>, poll_interval_ms: u64) -> Self {
        Self {
            worker_id: worker_id.into(),
            poll_interval_ms,
        }
    }
}

/// Runs the claim/process/retry loop plus its periodic stale-sweep and
/// purge passes.
pub struct EmbeddingJobWorker {
    repository: Arc<dyn MetadataRepository>,
    provider: Arc<dyn EmbeddingProvider>,
    jobs_config: EmbeddingJobsConfig,
    worker_config: WorkerConfig,
    shutdown_signal: Arc<AtomicBool>,
}

impl EmbeddingJobWorker {
    #[must_use]
    pub fn new(
        repository: Arc<dyn MetadataRepository>,
        provider: Arc<dyn EmbeddingProvider>,
        jobs_config: EmbeddingJobsConfig,
        worker_config: WorkerConfig,
    ) -> Self {
        Self {
            repository,
            provider,
            jobs_config,
            worker_config,
            shutdown_signal: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a handle for graceful shutdown.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown_signal)
    }

    /// Main worker loop: claim, process, sleep when idle, and run the
    /// stale-sweep/purge passes on an interval bounded by `stale_minutes`.
    pub async fn run(&self) {
        info!(worker_id = %self.worker_config.worker_id, "embedding job worker started");

        let sweep_every_ticks = self.sweep_interval_ticks();
        let mut ticks_since_sweep = 0u64;

        loop {
            if self.shutdown_signal.load(Ordering::Relaxed) {
                break;
            }

            match self.process_one_batch().await {
                Ok(0) => sleep(Duration::from_millis(self.worker_config.poll_interval_ms)).await,
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "embedding job batch claim failed");
                    sleep(Duration::from_millis(self.worker_config.poll_interval_ms)).await;
                }
            }

            ticks_since_sweep += 1;
            if ticks_since_sweep >= sweep_every_ticks {
                ticks_since_sweep = 0;
                self.sweep_and_purge().await;
            }
        }

        info!(worker_id = %self.worker_config.worker_id, "embedding job worker stopped gracefully");
    }

    fn sweep_interval_ticks(&self) -> u64 {
        let poll_ms = self.worker_config.poll_interval_ms.max(1);
        let stale_ms = self.jobs_config.stale_minutes.max(1) as u64 * 60_000;
        (stale_ms / poll_ms).max(1)
    }

    /// Claims and processes one batch; returns the number of jobs claimed.
    /// Exposed as a test seam for driving the worker deterministically
    /// without the poll loop.
    pub async fn process_one_batch(&self) -> StorageResult<usize> {
        let jobs = self
            .repository
            .claim_embedding_jobs(&self.worker_config.worker_id, self.jobs_config.batch_size as i64)
            .await?;
        if jobs.is_empty() {
            return Ok(0);
        }

        let count = jobs.len();
        for job in jobs {
            self.process_job(job).await;
        }
        Ok(count)
    }

    async fn process_job(&self, job: EmbeddingJob) {
        let chunk = match self.repository.get_chunk(job.target_id).await {
            Ok(chunk) => chunk,
            Err(err) => {
                warn!(job_id = %job.id, error = %err, "failed to fetch chunk for embedding job");
                self.requeue_or_block(&job, "storage_error").await;
                return;
            }
        };

        let Some(chunk) = chunk else {
            if let Err(err) = self
                .repository
                .complete_embedding_job(job.id, Some(CHUNK_MISSING))
                .await
            {
                warn!(job_id = %job.id, error = %err, "failed to mark chunk_missing job completed");
            }
            return;
        };

        let outcome = self
            .provider
            .try_generate_embeddings(std::slice::from_ref(&chunk.content))
            .await;

        if !outcome.success {
            let error_code = outcome.error_code.as_deref().unwrap_or("provider_error");
            self.requeue_or_block(&job, error_code).await;
            return;
        }

        let Some(generated) = outcome.embeddings.into_iter().next() else {
            warn!(job_id = %job.id, "provider reported success with no embeddings");
            self.requeue_or_block(&job, "provider_empty_success").await;
            return;
        };

        let new_embedding = NewEmbedding {
            chunk_id: job.target_id,
            repo: job.repo.clone(),
            branch: job.branch.clone(),
            commit: job.commit.clone(),
            vector: generated.vector,
            model: job.model.clone(),
        };

        if let Err(err) = self.repository.upsert_embeddings(vec![new_embedding]).await {
            warn!(job_id = %job.id, error = %err, "failed to persist embedding");
            self.requeue_or_block(&job, "storage_error").await;
            return;
        }

        if let Err(err) = self.repository.complete_embedding_job(job.id, None).await {
            warn!(job_id = %job.id, error = %err, "failed to mark embedding job completed");
        }
    }

    async fn requeue_or_block(&self, job: &EmbeddingJob, error_code: &str) {
        let max_attempts = i32::try_from(self.jobs_config.max_attempts).unwrap_or(i32::MAX);
        if job.attempts >= max_attempts {
            if let Err(err) = self
                .repository
                .block_embedding_job(job.id, MAX_ATTEMPTS_EXCEEDED)
                .await
            {
                warn!(job_id = %job.id, error = %err, "failed to block exhausted job");
            }
            return;
        }

        let next_attempt_at = Utc::now() + backoff(job.attempts);
        if let Err(err) = self
            .repository
            .requeue_embedding_job(job.id, next_attempt_at, error_code)
            .await
        {
            warn!(job_id = %job.id, error = %err, "failed to requeue job");
        }
    }

    async fn sweep_and_purge(&self) {
        match self.repository.sweep_stale_jobs(self.jobs_config.stale_minutes).await {
            Ok(swept) if swept > 0 => info!(swept, "stale embedding jobs swept back to pending"),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "stale sweep failed"),
        }
        match self.repository.purge_completed_jobs(self.jobs_config.purge_days).await {
            Ok(purged) if purged > 0 => info!(purged, "completed embedding jobs purged"),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "purge failed"),
        }
    }
}

/// Exponential backoff with a cap: `min(3600s, 30s · 2^(attempts-1))`.
fn backoff(attempts: i32) -> chrono::Duration {
    let attempts = attempts.max(1);
    let exponent = (attempts - 1).min(20);
    let seconds = 30u64.saturating_mul(1u64 << exponent).min(3600);
    chrono::Duration::seconds(i64::try_from(seconds).unwrap_or(3600))
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeintel_storage::{CodeChunk, FileIndexBatch, JobStatus, MockMetadataRepository, NewEmbeddingJob, SymbolKind};
    use codeintel_embeddings::{EmbeddingBatchOutcome, StubEmbeddingProvider};
    use uuid::Uuid;

    fn jobs_config() -> EmbeddingJobsConfig {
        EmbeddingJobsConfig {
            enabled: true,
            model: "model-a".to_string(),
            batch_size: 64,
            max_attempts: 3,
            stale_minutes: 10,
            purge_days: 7,
        }
    }

    fn worker_config() -> WorkerConfig {
        WorkerConfig::new("test-worker", 50)
    }

    async fn seed_chunk(repo: &MockMetadataRepository, chunk_id: Uuid) {
        let chunk = CodeChunk {
            id: chunk_id,
            repo: "r".to_string(),
            branch: "main".to_string(),
            commit: "c1".to_string(),
            file_path: "src/lib.rs".to_string(),
            symbol_id: Uuid::new_v4(),
            symbol_name: "widget".to_string(),
            symbol_kind: SymbolKind::Function,
            start_line: 1,
            end_line: 3,
            chunk_start_line: 1,
            chunk_end_line: 3,
            content: "fn widget() {}".to_string(),
            language: "rust".to_string(),
            token_count: 4,
            parent_symbol_name: None,
            signature: Some("fn widget()".to_string()),
            documentation: None,
            content_hash: "hash".to_string(),
        };
        repo.replace_file_symbols(
            "r",
            "main",
            "src/lib.rs",
            FileIndexBatch {
                chunks: vec![chunk],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    async fn seed_job(repo: &MockMetadataRepository, chunk_id: Uuid, model: &str) {
        repo.enqueue_embedding_jobs(vec![NewEmbeddingJob {
            repo: "r".to_string(),
            branch: "main".to_string(),
            commit: "c1".to_string(),
            target_kind: "code_chunk".to_string(),
            target_id: chunk_id,
            model: model.to_string(),
            status: JobStatus::Pending,
        }])
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn success_path_persists_embedding_and_completes_job() {
        let repo = Arc::new(MockMetadataRepository::new());
        let chunk_id = Uuid::new_v4();
        seed_chunk(&repo, chunk_id).await;
        seed_job(&repo, chunk_id, "model-a").await;

        let provider = Arc::new(StubEmbeddingProvider::new("model-a", 8));
        let worker = EmbeddingJobWorker::new(
            repo.clone() as Arc<dyn MetadataRepository>,
            provider,
            jobs_config(),
            worker_config(),
        );

        let claimed = worker.process_one_batch().await.unwrap();
        assert_eq!(claimed, 1);

        let job = repo
            .jobs_snapshot()
            .into_iter()
            .find(|j| j.target_id == chunk_id)
            .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.last_error.is_none());

        let embeddings = repo.get_embeddings_by_chunk_ids(&[chunk_id], "model-a").await.unwrap();
        assert_eq!(embeddings.len(), 1);
        assert_eq!(embeddings[0].vector.len(), 8);
    }

    #[tokio::test]
    async fn missing_chunk_completes_with_chunk_missing_sentinel() {
        let repo = Arc::new(MockMetadataRepository::new());
        let chunk_id = Uuid::new_v4();
        seed_job(&repo, chunk_id, "model-a").await;

        let provider = Arc::new(StubEmbeddingProvider::new("model-a", 8));
        let worker = EmbeddingJobWorker::new(
            repo.clone() as Arc<dyn MetadataRepository>,
            provider,
            jobs_config(),
            worker_config(),
        );

        worker.process_one_batch().await.unwrap();

        let job = repo
            .jobs_snapshot()
            .into_iter()
            .find(|j| j.target_id == chunk_id)
            .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.last_error.as_deref(), Some("chunk_missing"));
    }

    #[tokio::test]
    async fn transient_failure_requeues_with_backoff_until_attempts_exhausted() {
        let repo = Arc::new(MockMetadataRepository::new());
        let chunk_id = Uuid::new_v4();
        seed_chunk(&repo, chunk_id).await;
        seed_job(&repo, chunk_id, "model-a").await;

        let provider = Arc::new(StubEmbeddingProvider::new("model-a", 8));
        for _ in 0..3 {
            provider.push_outcome(EmbeddingBatchOutcome::transient("provider_timeout", "deadline exceeded"));
        }

        let worker = EmbeddingJobWorker::new(
            repo.clone() as Arc<dyn MetadataRepository>,
            provider,
            jobs_config(),
            worker_config(),
        );

        worker.process_one_batch().await.unwrap();
        let job = repo.jobs_snapshot().into_iter().find(|j| j.target_id == chunk_id).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 1);
        assert!(job.next_attempt_at.is_some());

        // Force the job eligible again for the next two claims (mock claim
        // gates on next_attempt_at, the worker doesn't control wall-clock).
        for _ in 0..2 {
            let job = repo.jobs_snapshot().into_iter().find(|j| j.target_id == chunk_id).unwrap();
            repo.requeue_embedding_job(job.id, Utc::now() - chrono::Duration::seconds(1), "retry-setup")
                .await
                .unwrap();
            worker.process_one_batch().await.unwrap();
        }

        let job = repo.jobs_snapshot().into_iter().find(|j| j.target_id == chunk_id).unwrap();
        assert_eq!(job.status, JobStatus::Blocked);
        assert_eq!(job.last_error.as_deref(), Some("max_attempts_exceeded"));
    }

    #[tokio::test]
    async fn empty_queue_claims_nothing() {
        let repo = Arc::new(MockMetadataRepository::new());
        let provider = Arc::new(StubEmbeddingProvider::new("model-a", 8));
        let worker = EmbeddingJobWorker::new(
            repo as Arc<dyn MetadataRepository>,
            provider,
            jobs_config(),
            worker_config(),
        );
        assert_eq!(worker.process_one_batch().await.unwrap(), 0);
    }

    #[test]
    fn backoff_caps_at_one_hour() {
        assert_eq!(backoff(1), chrono::Duration::seconds(30));
        assert_eq!(backoff(2), chrono::Duration::seconds(60));
        assert_eq!(backoff(20), chrono::Duration::seconds(3600));
        assert_eq!(backoff(1000), chrono::Duration::seconds(3600));
    }

    #[test]
    fn shutdown_handle_stops_the_run_loop() {
        let repo = Arc::new(MockMetadataRepository::new());
        let provider = Arc::new(StubEmbeddingProvider::new("model-a", 8));
        let worker = EmbeddingJobWorker::new(
            repo as Arc<dyn MetadataRepository>,
            provider,
            jobs_config(),
            worker_config(),
        );
        let handle = worker.shutdown_handle();
        assert!(!handle.load(Ordering::Relaxed));
        handle.store(true, Ordering::Relaxed);
        assert!(handle.load(Ordering::Relaxed));
    }

}
