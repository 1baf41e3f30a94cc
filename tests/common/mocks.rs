use async_trait::async_trait;
use chat_gateway::{
    error::UpstreamError,
    upstream::{
        ChatCoreClient, ChatExchange, ConversationRecord, CreateConversationRequest,
        MessageRecord, Role, UpstreamResult,
    },
};
use chrono::Utc;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

/// Secret text that must never reach a client.
pub const UPSTREAM_FAILURE_DETAIL: &str = "pg: connection pool exhausted at 10.0.0.7";

#[derive(Debug, Clone)]
pub enum ChatBehavior {
    /// Reply with the content echoed back after `delay`.
    Echo { delay: Duration },
    /// Reply after a delay derived from the content, so completions reorder.
    Staggered,
    /// Fail with an internal status carrying [`UPSTREAM_FAILURE_DETAIL`].
    Fail,
    /// Never answer.
    Hang,
}

/// Mock chat-core service for testing
pub struct MockChatCore {
    pub behavior: ChatBehavior,
    pub requests: Arc<Mutex<Vec<(String, String)>>>,
    pub conversations: Arc<Mutex<Vec<ConversationRecord>>>,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    pub crud_error: Option<u16>,
}

impl MockChatCore {
    pub fn new(behavior: ChatBehavior) -> Self {
        Self {
            behavior,
            requests: Arc::new(Mutex::new(Vec::new())),
            conversations: Arc::new(Mutex::new(Vec::new())),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            crud_error: None,
        }
    }

    pub fn echo() -> Self {
        Self::new(ChatBehavior::Echo {
            delay: Duration::ZERO,
        })
    }

    pub fn with_conversations(self, conversations: Vec<ConversationRecord>) -> Self {
        *self.conversations.lock().unwrap() = conversations;
        self
    }

    pub fn with_crud_error(mut self, status: u16) -> Self {
        self.crud_error = Some(status);
        self
    }

    pub fn get_requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }

    fn check_crud(&self) -> UpstreamResult<()> {
        match self.crud_error {
            // Same mapping as the HTTP client.
            Some(404) => Err(UpstreamError::NotFound),
            Some(status) => Err(UpstreamError::Status {
                status,
                body: UPSTREAM_FAILURE_DETAIL.to_string(),
            }),
            None => Ok(()),
        }
    }
}

fn staggered_delay(content: &str) -> Duration {
    let spread: u64 = content.bytes().map(u64::from).sum::<u64>() % 25;
    Duration::from_millis(5 + spread * 3)
}

#[async_trait]
impl ChatCoreClient for MockChatCore {
    async fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
    ) -> UpstreamResult<ChatExchange> {
        self.requests
            .lock()
            .unwrap()
            .push((conversation_id.to_string(), content.to_string()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = match &self.behavior {
            ChatBehavior::Echo { delay } => {
                tokio::time::sleep(*delay).await;
                Ok(create_exchange(conversation_id, content))
            }
            ChatBehavior::Staggered => {
                tokio::time::sleep(staggered_delay(content)).await;
                Ok(create_exchange(conversation_id, content))
            }
            ChatBehavior::Fail => Err(UpstreamError::Status {
                status: 500,
                body: UPSTREAM_FAILURE_DETAIL.to_string(),
            }),
            ChatBehavior::Hang => std::future::pending().await,
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn list_conversations(&self) -> UpstreamResult<Vec<ConversationRecord>> {
        self.check_crud()?;
        Ok(self.conversations.lock().unwrap().clone())
    }

    async fn create_conversation(
        &self,
        request: CreateConversationRequest,
    ) -> UpstreamResult<ConversationRecord> {
        self.check_crud()?;
        let mut conversations = self.conversations.lock().unwrap();
        let mut record = create_conversation_record(
            &format!("conv-{}", conversations.len() + 1),
            &request.title,
        );
        record.model_name = request.model_name;
        conversations.push(record.clone());
        Ok(record)
    }

    async fn get_conversation(&self, id: &str) -> UpstreamResult<ConversationRecord> {
        self.check_crud()?;
        self.conversations
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(UpstreamError::NotFound)
    }

    async fn delete_conversation(&self, id: &str) -> UpstreamResult<()> {
        self.check_crud()?;
        let mut conversations = self.conversations.lock().unwrap();
        let before = conversations.len();
        conversations.retain(|c| c.id != id);
        if conversations.len() == before {
            return Err(UpstreamError::NotFound);
        }
        Ok(())
    }
}

pub fn create_message_record(conversation_id: &str, role: Role, content: &str) -> MessageRecord {
    MessageRecord {
        id: uuid::Uuid::new_v4().to_string(),
        conversation_id: conversation_id.to_string(),
        role,
        content: content.to_string(),
        response_time_ms: (role == Role::Assistant).then_some(120),
        created_at: Utc::now(),
    }
}

pub fn create_exchange(conversation_id: &str, content: &str) -> ChatExchange {
    ChatExchange {
        user_message: create_message_record(conversation_id, Role::User, content),
        assistant_message: create_message_record(
            conversation_id,
            Role::Assistant,
            &format!("echo: {content}"),
        ),
    }
}

pub fn create_conversation_record(id: &str, title: &str) -> ConversationRecord {
    let now = Utc::now();
    ConversationRecord {
        id: id.to_string(),
        title: title.to_string(),
        model_name: "llama3".to_string(),
        created_at: now,
        updated_at: now,
        messages: None,
    }
}
