//! Core data model shared by the journal and both index structures.

pub mod id;
pub mod meta;
pub mod tag;
