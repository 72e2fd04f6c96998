//! Dead-letter forwarding
//!
//! The payload goes out on the channel the failed message arrived on; if
//! that publish fails, the same declare + publish is retried once on the
//! worker's long-lived channel.

use serde_json::{Map, Value};
use shared::message::DLQ_FIELD;
use std::sync::Arc;

use super::{BrokerError, QueueChannel};

pub struct DeadLetterForwarder {
    fallback: Arc<dyn QueueChannel>,
}

impl DeadLetterForwarder {
    pub fn new(fallback: Arc<dyn QueueChannel>) -> Self {
        Self { fallback }
    }

    pub async fn send_to_dlq(
        &self,
        active: &dyn QueueChannel,
        queue: &str,
        payload: &[u8],
    ) -> Result<(), BrokerError> {
        match publish_durable(active, queue, payload).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(queue = %queue, error = %e, "Dead-letter publish failed, retrying on fallback channel");
                publish_durable(self.fallback.as_ref(), queue, payload).await
            }
        }
    }
}

async fn publish_durable(
    channel: &dyn QueueChannel,
    queue: &str,
    payload: &[u8],
) -> Result<(), BrokerError> {
    channel.assert_queue(queue).await?;
    channel.publish_persistent(queue, payload).await
}

/// Payload to dead-letter for a failed message
///
/// With a correlation id and a JSON object body, the id is written to
/// `_dlq.correlationId` (other `_dlq` keys are kept). Anything else is
/// forwarded byte for byte.
pub fn dead_letter_payload(raw: &[u8], correlation_id: Option<&str>) -> Vec<u8> {
    let Some(correlation_id) = correlation_id else {
        return raw.to_vec();
    };

    let Ok(Value::Object(mut body)) = serde_json::from_slice::<Value>(raw) else {
        return raw.to_vec();
    };

    let dlq = body
        .entry(DLQ_FIELD)
        .or_insert_with(|| Value::Object(Map::new()));
    if !dlq.is_object() {
        *dlq = Value::Object(Map::new());
    }
    if let Value::Object(dlq) = dlq {
        dlq.insert(
            "correlationId".to_string(),
            Value::String(correlation_id.to_string()),
        );
    }

    serde_json::to_vec(&body).unwrap_or_else(|_| raw.to_vec())
}
