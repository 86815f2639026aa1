// Chat module
// Prompts, conversation history, the retrieval chain and its debug output

pub mod chain;
pub mod debug;
pub mod history;
pub mod prompts;

pub use chain::{ChainOutput, RagChain, Retriever, VectorStoreRetriever};
pub use debug::{DebugObserver, debug_chat_history};
pub use history::ChatHistory;
