//! Error type for the indexing pipeline and embedding job worker.

use thiserror::Error;

pub type IndexingResult<T> = Result<T, IndexingError>;

#[derive(Error, Debug)]
pub enum IndexingError {
    #[error(transparent)]
    Storage(#[from] codeintel_storage::StorageError),

    #[error("parse failed for {file_path}: {source}")]
    Parse {
        file_path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("blob read failed for {file_path}: {source}")]
    BlobRead {
        file_path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
