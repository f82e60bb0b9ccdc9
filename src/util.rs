//! Shared utility modules used across silene components.

pub mod hash;
pub mod varint;
