use super::{
    codec::{self, InboundCommand},
    fsm::{ConnectionEvent, ConnectionState, ConnectionStateMachine},
    gate::WriteGate,
};
use crate::{Error, Result, config::BridgeConfig, upstream::ChatCoreClient};
use axum::extract::ws::Message;
use futures::{Sink, Stream, StreamExt};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::{
    sync::{OwnedSemaphorePermit, Semaphore},
    task::JoinSet,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Bridges one client connection to the chat-core service.
///
/// The read loop never waits on chat-core: every valid command runs in its
/// own task and writes its reply through the connection's [`WriteGate`].
/// Replies may therefore arrive in a different order than the commands.
pub struct Bridge {
    upstream: Arc<dyn ChatCoreClient>,
    config: BridgeConfig,
    connection_id: String,
}

impl Bridge {
    pub fn new(upstream: Arc<dyn ChatCoreClient>, config: BridgeConfig) -> Self {
        Self {
            upstream,
            config,
            connection_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Serves the connection until the peer goes away or `shutdown` resolves,
    /// then drains in-flight units and releases the sink.
    pub async fn run<R, W, F>(self, mut reader: R, writer: W, shutdown: F) -> Result<ConnectionState>
    where
        R: Stream<Item = std::result::Result<Message, axum::Error>> + Unpin + Send,
        W: Sink<Message, Error = axum::Error> + Unpin + Send + 'static,
        F: Future<Output = ()> + Send,
    {
        let gate = Arc::new(WriteGate::new(writer, self.config.write_timeout()));
        let limiter = Arc::new(Semaphore::new(self.config.max_in_flight));
        let mut units = JoinSet::new();
        let mut fsm = ConnectionStateMachine::new(self.connection_id.clone());
        tokio::pin!(shutdown);

        info!(connection_id = %self.connection_id, "Client connected to WebSocket");

        let event = loop {
            let next = tokio::select! {
                frame = reader.next() => frame,
                _ = &mut shutdown => break ConnectionEvent::Shutdown,
            };

            match next {
                Some(Ok(Message::Text(text))) => {
                    self.handle_frame(text.as_bytes(), &gate, &limiter, &mut units)
                        .await;
                }
                Some(Ok(Message::Binary(bytes))) => {
                    self.handle_frame(&bytes, &gate, &limiter, &mut units).await;
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    debug!(connection_id = %self.connection_id, "Close frame received: {:?}", frame);
                    break ConnectionEvent::PeerClosed;
                }
                Some(Err(e)) => {
                    warn!(connection_id = %self.connection_id, "Read error: {}", e);
                    break ConnectionEvent::ReadFailed;
                }
                None => break ConnectionEvent::PeerClosed,
            }

            while let Some(joined) = units.try_join_next() {
                self.log_join(joined);
            }
        };

        fsm.transition(event)?;

        let pending = units.len();
        if pending > 0 {
            debug!(connection_id = %self.connection_id, "Draining {} in-flight messages", pending);
        }
        while let Some(joined) = units.join_next().await {
            self.log_join(joined);
        }

        gate.release().await;
        let state = fsm.transition(ConnectionEvent::Released)?;

        info!(connection_id = %self.connection_id, "Client disconnected from WebSocket");
        Ok(state)
    }

    async fn handle_frame<W>(
        &self,
        raw: &[u8],
        gate: &Arc<WriteGate<W>>,
        limiter: &Arc<Semaphore>,
        units: &mut JoinSet<()>,
    ) where
        W: Sink<Message, Error = axum::Error> + Unpin + Send + 'static,
    {
        let command = match codec::decode(raw).and_then(|command| {
            codec::validate(&command)?;
            Ok(command)
        }) {
            Ok(command) => command,
            Err(e) => {
                debug!(connection_id = %self.connection_id, "Rejected frame: {}", e);
                self.write(gate, codec::encode_failure(&e.client_message()))
                    .await;
                return;
            }
        };

        let Ok(permit) = limiter.clone().try_acquire_owned() else {
            warn!(
                connection_id = %self.connection_id,
                "In-flight limit of {} reached, rejecting message",
                self.config.max_in_flight
            );
            self.write(gate, codec::encode_failure(codec::TOO_MANY_IN_FLIGHT))
                .await;
            return;
        };

        debug!(
            connection_id = %self.connection_id,
            conversation_id = %command.conversation_id,
            "Dispatching message"
        );

        units.spawn(dispatch(
            Arc::clone(&self.upstream),
            Arc::clone(gate),
            command,
            self.config.unit_timeout(),
            self.connection_id.clone(),
            permit,
        ));
    }

    async fn write<W>(&self, gate: &WriteGate<W>, frame: String)
    where
        W: Sink<Message, Error = axum::Error> + Unpin + Send,
    {
        if let Err(e) = gate.send(frame).await {
            warn!(connection_id = %self.connection_id, "Error sending error message: {}", e);
        }
    }

    fn log_join(&self, joined: std::result::Result<(), tokio::task::JoinError>) {
        if let Err(e) = joined {
            error!(connection_id = %self.connection_id, "Message task failed: {}", e);
        }
    }
}

/// One unit of work: a single chat-core call followed by a single write-back.
async fn dispatch<W>(
    upstream: Arc<dyn ChatCoreClient>,
    gate: Arc<WriteGate<W>>,
    command: InboundCommand,
    timeout: Duration,
    connection_id: String,
    _permit: OwnedSemaphorePermit,
) where
    W: Sink<Message, Error = axum::Error> + Unpin + Send,
{
    let InboundCommand {
        conversation_id,
        content,
    } = command;

    let call = upstream.send_message(&conversation_id, &content);
    let frame = match tokio::time::timeout(timeout, call).await {
        Ok(Ok(exchange)) => codec::encode_success(
            &conversation_id,
            &exchange.user_message,
            &exchange.assistant_message,
        )
        .unwrap_or_else(|e| {
            error!(%connection_id, "Error marshaling response: {}", e);
            codec::encode_failure(codec::PROCESSING_FAILED)
        }),
        Ok(Err(e)) => {
            error!(%connection_id, %conversation_id, "Error calling chat-core service: {}", e);
            codec::encode_failure(codec::PROCESSING_FAILED)
        }
        Err(_) => {
            error!(%connection_id, %conversation_id, "chat-core call exceeded {:?}", timeout);
            codec::encode_failure(codec::PROCESSING_FAILED)
        }
    };

    match gate.send(frame).await {
        Ok(()) => debug!(%connection_id, %conversation_id, "Reply sent"),
        Err(Error::ConnectionClosed) => {
            debug!(%connection_id, %conversation_id, "Connection released before reply")
        }
        Err(Error::WriteTimeout(waited)) => {
            warn!(%connection_id, %conversation_id, "Reply dropped, peer not reading for {:?}", waited)
        }
        Err(e) => warn!(%connection_id, %conversation_id, "Error sending response: {}", e),
    }
}
