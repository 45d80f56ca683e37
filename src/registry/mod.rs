//! A lifecycle manager owning one [Mapper](crate::mapper::Mapper) per
//! configured resource type.
//!
//! The embedding system supplies a static table of
//! [MapperEntry](crate::mapper::MapperEntry) descriptors at startup; the
//! registry builds one mapper per entry and addresses them by tag through a
//! checked lookup, so an unknown or duplicated tag fails loudly instead of
//! landing in the wrong slot. [Registry::reset] clears every mapper without
//! releasing it, [Registry::shutdown] clears everything and consumes the
//! registry, and [Registry::dump] renders the current associations of every
//! type as a diagnostic table.
//!
//! # Example
//!
//! ```rust
//! use resmap::mapper::{KeyRange, MapperEntry};
//! use resmap::registry::Registry;
//!
//! const TYPES: &[MapperEntry] = &[
//!     MapperEntry {
//!         tag: 0,
//!         name: "flow",
//!         id_range: KeyRange::new(0, 0xFFFF),
//!         index_range: KeyRange::new(0, 255),
//!     },
//!     MapperEntry {
//!         tag: 1,
//!         name: "queue",
//!         id_range: KeyRange::new(0, 64),
//!         index_range: KeyRange::new(0, 7),
//!     },
//! ];
//!
//! let mut registry = Registry::init(TYPES).unwrap();
//! let index = registry.mapper_mut(0).unwrap().assign_index(1024).unwrap();
//! assert_eq!(index, 0);
//! registry.shutdown().unwrap();
//! ```

use crate::mapper;
use thiserror::Error;

mod storage;
pub use storage::Registry;

/// Errors that can occur when interacting with the registry.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A mapper operation failed.
    #[error("mapper: {0}")]
    Mapper(#[from] mapper::Error),
    /// No mapper is configured for the tag.
    #[error("unknown resource type tag {0}")]
    UnknownTag(u32),
    /// Two descriptors in the configuration table carry the same tag.
    #[error("duplicate resource type tag {0}")]
    DuplicateTag(u32),
}
