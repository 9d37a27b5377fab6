//! Shared building blocks for the pakdump crates.
//!
//! Currently this is [`BinaryReader`], the bounds-checked slice cursor used
//! to parse record headers and test file signatures, and its [`Error`].

mod error;
mod reader;

pub use error::{Error, Result};
pub use reader::BinaryReader;
