use thiserror::Error;

/// Errors from reading binary buffers.
#[derive(Debug, Error)]
pub enum Error {
    #[error("buffer too short: wanted {needed} bytes, {available} left")]
    UnexpectedEof { needed: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
