//! Administrative control over the room.
//!
//! Callers go through `SessionsControl` and never care whether the room host is held
//! directly or has to be looked up by its well-known name first.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use actix::{Addr, MailboxError};
use async_trait::async_trait;
use thiserror::Error;

use crate::config::AdminTransport;
use crate::host::{CloseSessions, RoomHost};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("no room is published as {0:?}")]
    RoomNotFound(String),
    #[error("room host unavailable: {0}")]
    Mailbox(#[from] MailboxError),
}

#[async_trait(?Send)]
pub trait SessionsControl: Send + Sync {
    /// Force-closes every connection of the room. Returns the number of sessions closed.
    async fn close_sessions(&self) -> Result<usize, AdminError>;
}

/// Talks to a room host the caller already holds.
pub struct LocalSessions {
    host: Addr<RoomHost>,
}

impl LocalSessions {
    pub fn new(host: Addr<RoomHost>) -> Self {
        Self { host }
    }
}

#[async_trait(?Send)]
impl SessionsControl for LocalSessions {
    async fn close_sessions(&self) -> Result<usize, AdminError> {
        Ok(self.host.send(CloseSessions).await?)
    }
}

/// Room hosts published by name.
#[derive(Clone, Default)]
pub struct RoomDirectory {
    rooms: Arc<RwLock<HashMap<String, Addr<RoomHost>>>>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, name: &str, host: Addr<RoomHost>) {
        match self.rooms.write() {
            Ok(mut rooms) => {
                rooms.insert(name.to_owned(), host);
            }
            Err(_) => log::error!("Room directory is poisoned, {} not published", name),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Addr<RoomHost>> {
        let rooms = self.rooms.read().ok()?;
        let host = rooms.get(name).cloned();
        host
    }
}

/// Resolves the room host by name on every call, then asks it directly.
pub struct RelaySessions {
    directory: RoomDirectory,
    name: String,
}

impl RelaySessions {
    pub fn new(directory: RoomDirectory, name: String) -> Self {
        Self { directory, name }
    }
}

#[async_trait(?Send)]
impl SessionsControl for RelaySessions {
    async fn close_sessions(&self) -> Result<usize, AdminError> {
        let host = self
            .directory
            .lookup(&self.name)
            .ok_or_else(|| AdminError::RoomNotFound(self.name.clone()))?;
        log::debug!("Relaying close-sessions to {}", self.name);
        LocalSessions::new(host).close_sessions().await
    }
}

pub fn sessions_control(
    transport: AdminTransport,
    host: Addr<RoomHost>,
    directory: RoomDirectory,
    name: &str,
) -> Arc<dyn SessionsControl> {
    match transport {
        AdminTransport::Local => Arc::new(LocalSessions::new(host)),
        AdminTransport::Relay => Arc::new(RelaySessions::new(directory, name.to_owned())),
    }
}
