pub mod cache;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod files;
pub mod indexer;
pub mod ingest;
pub mod intent;
pub mod llm;
pub mod rag;
pub mod search;
pub mod server;
pub mod sidecar;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use error::{RagchatError, Result};
pub use rag::{ChatReply, RagEngine};
