//! Relational and vector storage for the metadata catalogue: symbols,
//! edges, code chunks, the sparse search index, fingerprints, and durable
//! embedding jobs, all in `PostgreSQL` via `pgvector` for the embedding
//! column rather than a separate vector store.

pub mod chunk_id;
pub mod error;
pub mod migrations;
pub mod mock;
pub mod models;
pub mod pool;
pub mod repository;
pub mod traits;

pub use chunk_id::{generate_chunk_id, generate_symbol_id, hash_content};
pub use error::{StorageError, StorageResult};
pub use migrations::{run_migrations, wait_for_migrations};
pub use mock::MockMetadataRepository;
pub use models::*;
pub use pool::{create_pool, initialize_database};
pub use repository::PostgresRepository;
pub use traits::{MetadataRepository, NewEmbedding};
pub use uuid::Uuid;
