use thiserror::Error;

/// Errors raised while reading corpora, building models or moving them to and from disk.
#[derive(Error, Debug)]
pub enum Word2VecError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("word '{0}' is not in the vocabulary")]
    UnknownWord(String),

    #[error("vocabulary is empty, nothing to train")]
    EmptyVocabulary,
}

impl Word2VecError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse { line, message: message.into() }
    }

    pub fn invalid_model(message: impl Into<String>) -> Self {
        Self::InvalidModel(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Word2VecError>;
