//! Common types and error handling for mergesql.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod error;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use types::{DataType, Value};
