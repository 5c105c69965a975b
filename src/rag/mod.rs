//! Question answering: intent routing, retrieval, prompt assembly and the
//! index lifecycle behind it.

pub mod engine;
pub mod prompt;

pub use engine::{
    ChatMode, ChatReply, Collaborators, FailedFile, IntentCapabilities, RagEngine, RagStats, ReindexReport, SystemInfo,
};
