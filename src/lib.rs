//! Tag management for a gitlet repository: annotated and lightweight tags,
//! the canonical tag object format, and iteration over tag references.

#[macro_use]
mod macros;

pub mod error;
pub mod handles;
pub mod objects;
pub mod oid;
pub mod repository;
pub mod signature;
pub mod store;
pub mod tag;
pub mod tags;
pub mod utils;

pub use error::TagError;
pub use objects::{Fmt, Object};
pub use oid::Oid;
pub use repository::Repository;
pub use signature::Signature;
pub use tag::Tag;
pub use tags::TagsCollection;
