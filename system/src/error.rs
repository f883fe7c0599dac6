use thiserror::Error;

use crate::ConnectionId;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("cannot serialize frame: {0}")]
    Unserializable(#[source] serde_json::Error),
}

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    /// The connection request did not carry a usable session id.
    #[error("missing session id")]
    MissingId,
    #[error("connection {0} is not registered")]
    NotFound(ConnectionId),
}

/// Failure to hand a frame to a single recipient. Never fatal for the room.
#[derive(Debug, Error, PartialEq)]
pub enum DeliveryError {
    #[error("connection {0} is closed")]
    Closed(ConnectionId),
    #[error("connection {0} cannot take more frames")]
    Full(ConnectionId),
}
