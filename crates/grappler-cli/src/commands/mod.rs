//! CLI command implementations.

pub mod ask;
pub mod chat;
pub mod ingest;
pub mod init;
pub mod stats;
