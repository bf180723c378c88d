//! CLI Commands

pub mod diff;
pub mod hash;
pub mod verify;
