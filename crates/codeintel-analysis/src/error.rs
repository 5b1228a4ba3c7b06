//! Error types for the analysis crate (tokenizer, fingerprint, chunker,
//! symbol search builder).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("source text missing for {file_path}")]
    SourceMissing { file_path: String },

    #[error("language not supported: {0}")]
    LanguageUnsupported(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
