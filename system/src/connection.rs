use crate::{ConnectionId, DeliveryError, Session};

/// Transport-side view of one live connection, as seen by the coordinator.
///
/// Implementations must not block: `send_text` and `close` only enqueue work for the
/// transport. The attachment is a small envelope stored next to the connection by
/// whoever hosts it, so that it outlives the coordinator that wrote it.
pub trait Connection {
    fn connection_id(&self) -> ConnectionId;

    fn send_text(&self, text: &str) -> Result<(), DeliveryError>;

    fn close(&self);

    fn serialize_attachment(&self, session: &Session);

    fn deserialize_attachment(&self) -> Option<Session>;
}
