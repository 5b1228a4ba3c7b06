//! Embedding job enqueuer.
//!
//! Turns a batch of freshly-persisted chunk ids into durable
//! `embedding_jobs` rows. The enqueuer never calls a provider and never
//! writes an embedding itself — it only decides, per chunk, whether a job
//! should exist and in what starting state.

use codeintel_config::EmbeddingJobsConfig;
use codeintel_storage::{JobStatus, MetadataRepository, NewEmbeddingJob};
use uuid::Uuid;

use crate::error::IndexingResult;

const TARGET_KIND_CODE_CHUNK: &str = "code_chunk";

/// Enqueues one embedding job per chunk id.
///
/// No-op when `config.enabled` is false. When the configured model is
/// blank or whitespace-only, jobs are still created so the pipeline stays
/// idempotent, but with `model="__missing__"` and `status=Blocked` —
/// they become `Pending` automatically the next time this file is
/// reindexed after a model is configured, since the upsert on the unique
/// key overwrites status.
pub async fn enqueue_embedding_jobs(
    repository: &dyn MetadataRepository,
    config: &EmbeddingJobsConfig,
    repo: &str,
    branch: &str,
    commit: &str,
    chunk_ids: &[Uuid],
) -> IndexingResult<()> {
    if !config.enabled || chunk_ids.is_empty() {
        return Ok(());
    }

    let model = config.normalized_model();
    let status = if model == "__missing__" {
        JobStatus::Blocked
    } else {
        JobStatus::Pending
    };

    let jobs = chunk_ids
        .iter()
        .map(|&target_id| NewEmbeddingJob {
            repo: repo.to_string(),
            branch: branch.to_string(),
            commit: commit.to_string(),
            target_kind: TARGET_KIND_CODE_CHUNK.to_string(),
            target_id,
            model: model.clone(),
            status,
        })
        .collect();

    repository.enqueue_embedding_jobs(jobs).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeintel_storage::MockMetadataRepository;

    fn config(enabled: bool, model: &str) -> EmbeddingJobsConfig {
        EmbeddingJobsConfig {
            enabled,
            model: model.to_string(),
            batch_size: 64,
            max_attempts: 10,
            stale_minutes: 10,
            purge_days: 7,
        }
    }

    fn jobs_for(repo: &MockMetadataRepository, chunk_id: Uuid) -> Vec<codeintel_storage::EmbeddingJob> {
        repo.jobs_snapshot()
            .into_iter()
            .filter(|j| j.target_id == chunk_id)
            .collect()
    }

    #[tokio::test]
    async fn disabled_is_a_no_op() {
        let repo = MockMetadataRepository::new();
        let ids = vec![Uuid::new_v4()];
        enqueue_embedding_jobs(&repo, &config(false, "model-a"), "r", "main", "c1", &ids)
            .await
            .unwrap();
        assert!(repo.jobs_snapshot().is_empty());
    }

    #[tokio::test]
    async fn blank_model_enqueues_blocked_sentinel() {
        let repo = MockMetadataRepository::new();
        let ids = vec![Uuid::new_v4()];
        enqueue_embedding_jobs(&repo, &config(true, "   "), "r", "main", "c1", &ids)
            .await
            .unwrap();
        let job = jobs_for(&repo, ids[0]).pop().unwrap();
        assert_eq!(job.model, "__missing__");
        assert_eq!(job.status, JobStatus::Blocked);
    }

    #[tokio::test]
    async fn configured_model_enqueues_pending_lowercased() {
        let repo = MockMetadataRepository::new();
        let ids = vec![Uuid::new_v4()];
        enqueue_embedding_jobs(&repo, &config(true, "Model-A"), "r", "main", "c1", &ids)
            .await
            .unwrap();
        let job = jobs_for(&repo, ids[0]).pop().unwrap();
        assert_eq!(job.model, "model-a");
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn re_enqueue_upserts_not_duplicates() {
        let repo = MockMetadataRepository::new();
        let ids = vec![Uuid::new_v4()];
        enqueue_embedding_jobs(&repo, &config(true, "   "), "r", "main", "c1", &ids)
            .await
            .unwrap();
        enqueue_embedding_jobs(&repo, &config(true, "model-a"), "r", "main", "c2", &ids)
            .await
            .unwrap();
        let jobs = jobs_for(&repo, ids[0]);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Pending);
        assert_eq!(jobs[0].model, "model-a");
    }
}
