use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Connection error: {0}")]
    Connection(#[from] axum::Error),

    #[error("Connection already released")]
    ConnectionClosed,

    #[error("Write to connection stalled for {0:?}")]
    WriteTimeout(Duration),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Address parse error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    #[error("Invalid state transition: {current} -> {requested}")]
    InvalidTransition { current: String, requested: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Failure of a single call to the chat-core service.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("failed to reach chat-core service: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("chat-core call timed out after {0:?}")]
    Timeout(Duration),

    #[error("chat-core resource not found")]
    NotFound,

    #[error("chat-core service returned status code {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode chat-core response: {0}")]
    Decode(String),
}

impl UpstreamError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Rejection of one inbound frame. Recovered at the frame boundary.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0} is required")]
    MissingField(&'static str),
}

impl FrameError {
    /// Text sent back to the client. Never contains parser internals.
    pub fn client_message(&self) -> String {
        match self {
            Self::Decode(_) => "Invalid message format".to_string(),
            Self::MissingField(field) => format!("{field} is required"),
        }
    }
}
