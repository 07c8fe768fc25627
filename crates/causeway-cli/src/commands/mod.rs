//! CLI command implementations.

pub mod init;
pub mod repl;
pub mod version;
