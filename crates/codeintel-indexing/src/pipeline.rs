//! The indexing pipeline: `FileChange` stream → `ParseFile` → chunk/tokenize/
//! fingerprint → persistence batches → embedding job enqueue.
//!
//! A branch reindex is serialised by `try_begin_indexing`: a run that
//! finds another one already `InProgress` is rejected rather than queued
//! or run concurrently.

use std::sync::Arc;

use codeintel_analysis::ChunkerConfig;
use codeintel_config::{ChunkConfig, EmbeddingJobsConfig};
use codeintel_storage::{IndexState, MetadataRepository};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::blob::{BlobReader, ChangeType, FileChange};
use crate::convert::build_batch;
use crate::error::IndexingResult;

impl From<&ChunkConfig> for ChunkerConfig {
    fn from(config: &ChunkConfig) -> Self {
        Self {
            #[allow(clippy::cast_possible_wrap)]
            context_lines_before: config.context_lines_before as i32,
            #[allow(clippy::cast_possible_wrap)]
            context_lines_after: config.context_lines_after as i32,
            max_chunk_chars: config.max_chunk_chars,
        }
    }
}

/// Outcome of one file within a run: logged and accounted for, never fatal
/// to the run as a whole — the pipeline logs and continues on per-file
/// errors.
#[derive(Debug)]
pub struct FileOutcome {
    pub file_path: String,
    pub symbols_written: usize,
    pub chunks_written: usize,
    pub error: Option<String>,
}

/// Summary of one `index_branch` call.
#[derive(Debug, Default)]
pub struct IndexSummary {
    pub files_indexed: usize,
    pub files_failed: usize,
    pub files: Vec<FileOutcome>,
}

/// Indexes one commit's worth of file changes into `(repo, branch)`.
///
/// # Errors
/// Returns an error if the branch is already `InProgress`, or if a storage
/// write fails in a way that aborts the whole transaction (a per-file parse
/// or blob-read failure does not abort the run; it is recorded in the
/// returned summary instead).
#[allow(clippy::too_many_arguments)]
pub async fn index_branch<P, B>(
    repository: Arc<dyn MetadataRepository>,
    parser: Arc<P>,
    blob_reader: Arc<B>,
    repo: &str,
    branch: &str,
    commit: &str,
    changes: Vec<FileChange>,
    chunk_config: &ChunkConfig,
    embedding_jobs_config: &EmbeddingJobsConfig,
    concurrency_limit: usize,
) -> IndexingResult<IndexSummary>
where
    P: codeintel_analysis::ParseFile + 'static,
    B: BlobReader + 'static,
{
    repository.try_begin_indexing(repo, branch).await?;

    let chunker_config: ChunkerConfig = chunk_config.into();
    let concurrency = concurrency_limit.max(1);

    let outcomes = stream::iter(changes.into_iter())
        .map(|change| {
            let repository = Arc::clone(&repository);
            let parser = Arc::clone(&parser);
            let blob_reader = Arc::clone(&blob_reader);
            let chunker_config = chunker_config;
            let embedding_jobs_config = embedding_jobs_config.clone();
            let repo = repo.to_string();
            let branch = branch.to_string();
            let commit = commit.to_string();
            async move {
                index_one_file(
                    repository.as_ref(),
                    parser.as_ref(),
                    blob_reader.as_ref(),
                    &repo,
                    &branch,
                    &commit,
                    &change,
                    &chunker_config,
                    &embedding_jobs_config,
                )
                .await
            }
        })
        .buffer_unordered(concurrency)
        .collect::<Vec<_>>()
        .await;

    let files_failed = outcomes.iter().filter(|o| o.error.is_some()).count();
    let summary = IndexSummary {
        files_indexed: outcomes.len() - files_failed,
        files_failed,
        files: outcomes,
    };

    let final_state = if summary.files_failed == 0 {
        IndexState::Completed
    } else {
        IndexState::Failed
    };
    repository
        .finish_indexing(repo, branch, final_state, Some(commit))
        .await?;

    Ok(summary)
}

#[allow(clippy::too_many_arguments)]
async fn index_one_file<P, B>(
    repository: &dyn MetadataRepository,
    parser: &P,
    blob_reader: &B,
    repo: &str,
    branch: &str,
    commit: &str,
    change: &FileChange,
    chunker_config: &ChunkerConfig,
    embedding_jobs_config: &EmbeddingJobsConfig,
) -> FileOutcome
where
    P: codeintel_analysis::ParseFile,
    B: BlobReader,
{
    if change.change_type == ChangeType::Deleted {
        return match repository
            .replace_file_symbols(repo, branch, &change.file_path, Default::default())
            .await
        {
            Ok(()) => FileOutcome {
                file_path: change.file_path.clone(),
                symbols_written: 0,
                chunks_written: 0,
                error: None,
            },
            Err(err) => {
                warn!(file = %change.file_path, error = %err, "failed to clear deleted file");
                FileOutcome {
                    file_path: change.file_path.clone(),
                    symbols_written: 0,
                    chunks_written: 0,
                    error: Some(err.to_string()),
                }
            }
        };
    }

    let source = match blob_reader.read_blob(&change.file_path).await {
        Ok(source) => source,
        Err(err) => {
            warn!(file = %change.file_path, error = %err, "blob read failed, skipping file");
            return FileOutcome {
                file_path: change.file_path.clone(),
                symbols_written: 0,
                chunks_written: 0,
                error: Some(err.to_string()),
            };
        }
    };

    let parsed = match parser
        .parse_file(&change.file_path, &change.language, &source)
        .await
    {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(file = %change.file_path, error = %err, "parse failed, skipping file");
            return FileOutcome {
                file_path: change.file_path.clone(),
                symbols_written: 0,
                chunks_written: 0,
                error: Some(err.to_string()),
            };
        }
    };

    let (batch, chunk_error) = build_batch(repo, branch, commit, &change.file_path, &parsed, chunker_config);
    if let Some(ref err) = chunk_error {
        warn!(file = %change.file_path, error = %err, "chunker reported a failure; file indexed without chunks");
    }

    let symbols_written = batch.symbols.len();
    let chunk_ids: Vec<_> = batch.chunks.iter().map(|c| c.id).collect();
    let chunks_written = chunk_ids.len();

    if let Err(err) = repository
        .replace_file_symbols(repo, branch, &change.file_path, batch)
        .await
    {
        warn!(file = %change.file_path, error = %err, "failed to persist file index batch");
        return FileOutcome {
            file_path: change.file_path.clone(),
            symbols_written: 0,
            chunks_written: 0,
            error: Some(err.to_string()),
        };
    }

    if !chunk_ids.is_empty() {
        if let Err(err) = crate::enqueuer::enqueue_embedding_jobs(
            repository,
            embedding_jobs_config,
            repo,
            branch,
            commit,
            &chunk_ids,
        )
        .await
        {
            warn!(file = %change.file_path, error = %err, "failed to enqueue embedding jobs");
        }
    }

    info!(file = %change.file_path, symbols_written, chunks_written, "file indexed");

    FileOutcome {
        file_path: change.file_path.clone(),
        symbols_written,
        chunks_written,
        error: chunk_error,
    }
}
