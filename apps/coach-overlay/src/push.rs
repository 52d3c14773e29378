//! WebSocket push source: one socket per topic, one payload per frame.

use async_trait::async_trait;
use bytes::Bytes;
use coach_bus::{BusError, BusMessage, BusResult, PushSource, TOPIC_CAPACITY};
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct WsPushSource {
    base_url: String,
}

impl WsPushSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    pub fn topic_url(&self, topic: &str) -> String {
        format!("{}/events/{}", self.base_url, topic)
    }
}

#[async_trait]
impl PushSource for WsPushSource {
    async fn listen(&self, topic: &str) -> BusResult<broadcast::Receiver<BusMessage>> {
        let url = self.topic_url(topic);
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|err| BusError::Transport(format!("{url}: {err}")))?;
        let (tx, rx) = broadcast::channel(TOPIC_CAPACITY);
        tokio::spawn(pump_frames(stream, tx, topic.to_string()));
        Ok(rx)
    }
}

/// Forwards frames until the socket closes or nobody is listening anymore.
async fn pump_frames<S>(mut stream: S, tx: broadcast::Sender<BusMessage>, topic: String)
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        let payload = match frame {
            Ok(Message::Text(text)) => Bytes::from(text),
            Ok(Message::Binary(bytes)) => Bytes::from(bytes),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => {
                warn!(target = "coach.push", topic = %topic, error = %err, "push socket failed");
                break;
            }
        };
        let message = BusMessage {
            topic: topic.clone(),
            payload,
        };
        if tx.send(message).is_err() {
            break;
        }
    }
    debug!(target = "coach.push", topic = %topic, "push socket pump finished");
}
