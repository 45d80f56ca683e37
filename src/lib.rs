//! Range-checked, bidirectional mapping between management-assigned
//! identifiers and bounded resource table slots.
//!
//! A management plane hands out long-lived identifiers; a driver consumes
//! compact, bounded slot numbers. [mapper::Mapper] is the one place that
//! performs and remembers the translation between the two key spaces, and
//! [registry::Registry] owns one mapper per configured resource type.

pub mod mapper;
pub mod registry;
