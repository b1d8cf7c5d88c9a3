// ABOUTME: Library root for scpe - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod error;
pub mod picker;
pub mod runtime;
pub mod scp;
pub mod ssh;
