use crate::{Error, Result};
use axum::extract::ws::Message;
use futures::{Sink, SinkExt};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Exclusive write path of one connection.
///
/// Holding the lock for the whole `send` keeps each frame atomic on the wire.
/// The sink is taken out on release, after which every write fails with
/// [`Error::ConnectionClosed`]. A write that stays pending longer than the
/// write timeout drops the sink the same way, so a peer that stops reading
/// cannot pin the connection open.
pub struct WriteGate<W> {
    sink: Mutex<Option<W>>,
    write_timeout: Duration,
}

impl<W> WriteGate<W>
where
    W: Sink<Message, Error = axum::Error> + Unpin + Send,
{
    pub fn new(sink: W, write_timeout: Duration) -> Self {
        Self {
            sink: Mutex::new(Some(sink)),
            write_timeout,
        }
    }

    pub async fn send(&self, frame: String) -> Result<()> {
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(Error::ConnectionClosed)?;

        match tokio::time::timeout(self.write_timeout, sink.send(Message::Text(frame))).await {
            Ok(sent) => Ok(sent?),
            Err(_) => {
                warn!("Write stalled for {:?}, dropping connection sink", self.write_timeout);
                guard.take();
                Err(Error::WriteTimeout(self.write_timeout))
            }
        }
    }

    /// Closes the sink. Returns `false` if it had already been released.
    pub async fn release(&self) -> bool {
        let Some(mut sink) = self.sink.lock().await.take() else {
            debug!("Write gate already released");
            return false;
        };

        match tokio::time::timeout(self.write_timeout, sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Error while closing connection sink: {}", e),
            Err(_) => warn!("Closing connection sink timed out"),
        }
        true
    }

    #[cfg(test)]
    async fn is_released(&self) -> bool {
        self.sink.lock().await.is_none()
    }
}
