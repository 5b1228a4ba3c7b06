//! The ingest boundary: a `(repo, branch, commit, path, change-type)` tuple
//! stream plus a blob reader. Version control itself — clone, fetch,
//! diff — is an external collaborator; the pipeline only consumes what it
//! produces.

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
}

/// One entry in the `FileChange` stream driving a single indexing run.
#[derive(Debug, Clone)]
pub struct FileChange {
    pub file_path: String,
    pub language: String,
    pub change_type: ChangeType,
}

/// External collaborator that resolves a file path at a given commit to its
/// source text. Never called for `ChangeType::Deleted` entries.
#[async_trait]
pub trait BlobReader: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn read_blob(&self, file_path: &str) -> Result<String, Self::Error>;
}
