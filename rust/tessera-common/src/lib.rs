//! Error taxonomy and validation macros shared by the tessera crates.

pub mod error;
pub mod result;

pub use error::{Error, ErrorKind};
pub use result::Result;
