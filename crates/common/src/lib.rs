//! Common types for the Nest heating boost workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
