pub mod chat;
pub mod classifier;
pub mod constants;
pub mod conversation;
pub mod llm_interaction;
pub mod prompt;
pub mod session;
pub mod speech;
pub mod summary;
pub mod web_server;

pub use classifier::{classify, RenderMode};
pub use conversation::{Conversation, Sender, Turn};
pub use llm_interaction::{ChatClient, ChatMessage, ChatRole, GatewayConfig, GatewayError};
pub use session::{IgnoreReason, SendOutcome, SessionController, SessionView};
pub use speech::SpeechCapabilities;
pub use summary::{parse_summary, SummaryRecord, SummaryView};
