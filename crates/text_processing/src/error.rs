//! Text processing errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TextProcessingError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TextProcessingError {
    #[error("Invalid pattern '{rule}': {message}")]
    InvalidPattern { rule: String, message: String },

    #[error("Unknown prompt template: {0}")]
    UnknownTemplate(String),

    #[error("Template '{key}' needs parameter '{param}'")]
    MissingParam { key: String, param: String },

    #[error("Malformed template '{key}': {message}")]
    MalformedTemplate { key: String, message: String },
}
