//! CLI command implementations.

pub mod inspect;
pub mod send;
pub mod serve;
pub mod verify;
