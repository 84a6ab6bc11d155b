//! Provider adapter abstraction, retry policy, and the cost-aware registry
//! that routes calls across registered adapters (§4.1–§4.3).

pub mod adapter;
pub mod http;
pub mod registry;
pub mod retry;
pub mod scripted;

pub use adapter::{
    AdapterResponse, FinishReason, Message, MessageRole, ProviderAdapter, SendOptions,
    StreamChunk, ToolCallRequest, Usage,
};
pub use http::{HttpAdapterConfig, HttpChatAdapter};
pub use registry::{ProviderRegistry, SelectionRole};
pub use retry::RetryPolicy;
pub use scripted::{Scripted, ScriptedAdapter};
