//! The ingest pipeline and embedding job worker.
//!
//! This crate owns everything between a version-control collaborator's
//! `FileChange` stream and the durably persisted `symbols`/`chunks`/
//! `search`/`fingerprints`/`embedding_jobs` rows, plus the worker that
//! drains that job queue into `embeddings`.

pub mod blob;
pub mod convert;
pub mod enqueuer;
pub mod error;
pub mod pipeline;
pub mod worker;

pub use blob::{BlobReader, ChangeType, FileChange};
pub use convert::build_batch;
pub use enqueuer::enqueue_embedding_jobs;
pub use error::{IndexingError, IndexingResult};
pub use pipeline::{index_branch, FileOutcome, IndexSummary};
pub use worker::{EmbeddingJobWorker, WorkerConfig};
