use super::types::*;
use crate::{Error, Result, config::UpstreamConfig, error::UpstreamError};
use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

pub type UpstreamResult<T> = std::result::Result<T, UpstreamError>;

/// Operations offered by the chat-core service.
///
/// Every call is exactly one round trip with no retry; callers decide what a
/// failure means for them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatCoreClient: Send + Sync {
    async fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
    ) -> UpstreamResult<ChatExchange>;

    async fn list_conversations(&self) -> UpstreamResult<Vec<ConversationRecord>>;

    async fn create_conversation(
        &self,
        request: CreateConversationRequest,
    ) -> UpstreamResult<ConversationRecord>;

    async fn get_conversation(&self, id: &str) -> UpstreamResult<ConversationRecord>;

    async fn delete_conversation(&self, id: &str) -> UpstreamResult<()>;
}

pub struct HttpChatCoreClient {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpChatCoreClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            Error::config(format!("Invalid chat-core URL '{}': {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(Error::config(format!(
                "chat-core URL cannot be used as a base: {}",
                config.base_url
            )));
        }

        let timeout = config.timeout();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// Joins path segments onto the base URL, escaping each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
        accepted: &[StatusCode],
    ) -> UpstreamResult<String> {
        debug!("chat-core request: {} {}", method, url);

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if status == StatusCode::NOT_FOUND {
            return Err(UpstreamError::NotFound);
        }
        if !accepted.contains(&status) {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }

    fn transport_error(&self, error: reqwest::Error) -> UpstreamError {
        if error.is_timeout() {
            UpstreamError::Timeout(self.timeout)
        } else {
            UpstreamError::Transport(error)
        }
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> UpstreamResult<T> {
    serde_json::from_str(body).map_err(|e| UpstreamError::Decode(e.to_string()))
}

fn to_body<T: serde::Serialize>(value: &T) -> UpstreamResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| UpstreamError::Decode(e.to_string()))
}

#[async_trait]
impl ChatCoreClient for HttpChatCoreClient {
    async fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
    ) -> UpstreamResult<ChatExchange> {
        let url = self.endpoint(&["conversations", conversation_id, "messages", "chat"]);
        let body = to_body(&ChatRequest { content })?;
        let text = self
            .execute(
                Method::POST,
                url,
                Some(body),
                &[StatusCode::OK, StatusCode::CREATED],
            )
            .await?;
        decode(&text)
    }

    async fn list_conversations(&self) -> UpstreamResult<Vec<ConversationRecord>> {
        let url = self.endpoint(&["conversations"]);
        let text = self
            .execute(Method::GET, url, None, &[StatusCode::OK])
            .await?;
        decode(&text)
    }

    async fn create_conversation(
        &self,
        request: CreateConversationRequest,
    ) -> UpstreamResult<ConversationRecord> {
        let url = self.endpoint(&["conversations"]);
        let body = to_body(&request)?;
        let text = self
            .execute(
                Method::POST,
                url,
                Some(body),
                &[StatusCode::OK, StatusCode::CREATED],
            )
            .await?;
        decode(&text)
    }

    async fn get_conversation(&self, id: &str) -> UpstreamResult<ConversationRecord> {
        let url = self.endpoint(&["conversations", id]);
        let text = self
            .execute(Method::GET, url, None, &[StatusCode::OK])
            .await?;
        decode(&text)
    }

    async fn delete_conversation(&self, id: &str) -> UpstreamResult<()> {
        let url = self.endpoint(&["conversations", id]);
        self.execute(
            Method::DELETE,
            url,
            None,
            &[StatusCode::OK, StatusCode::NO_CONTENT],
        )
        .await?;
        Ok(())
    }
}
