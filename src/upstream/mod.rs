mod client;
mod types;

#[cfg(test)]
pub use client::MockChatCoreClient;
pub use client::{ChatCoreClient, HttpChatCoreClient, UpstreamResult};
pub use types::*;
