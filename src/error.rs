use thiserror::Error;

#[derive(Error, Debug)]
pub enum NoteError {
    #[error("XML error at position {position}: {message}")]
    Xml { position: usize, message: String },

    #[error("Note not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, NoteError>;
