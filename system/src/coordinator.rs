use crate::broadcast::{broadcast, Delivery};
use crate::{Connection, ConnectionId, RegistryError, Session, SessionRegistry, WsMessage};

/// How `message` frames are fanned out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessagePolicy {
    /// Whether the author receives its own message.
    pub include_sender: bool,
    /// Whether the text gets a " to N clients" suffix.
    pub annotate_count: bool,
}

impl Default for MessagePolicy {
    fn default() -> Self {
        Self {
            include_sender: true,
            annotate_count: true,
        }
    }
}

/// Owner of the room: the registry of live sessions and everything that mutates it.
///
/// All calls are expected to come from a single logical actor, one event at a time.
/// Every mutation of a session is written through to its connection's attachment so
/// that a later `Coordinator::recover` can rebuild the registry.
pub struct Coordinator<C> {
    registry: SessionRegistry<C>,
    policy: MessagePolicy,
}

impl<C: Connection> Coordinator<C> {
    pub fn new(policy: MessagePolicy) -> Self {
        Self {
            registry: SessionRegistry::new(),
            policy,
        }
    }

    /// Rebuilds the registry from connections that outlived a previous coordinator.
    ///
    /// Connections without an attachment stay untracked until they close.
    pub fn recover<I>(surviving: I, policy: MessagePolicy) -> Self
    where
        I: IntoIterator<Item = C>,
    {
        let mut coordinator = Self::new(policy);
        let mut positioned = 0;
        for connection in surviving {
            match connection.deserialize_attachment() {
                Some(session) => {
                    if session.has_position() {
                        positioned += 1;
                    }
                    coordinator.registry.insert(connection, session);
                }
                None => log::warn!(
                    "Connection {} survived without attachment, leaving it inert",
                    connection.connection_id()
                ),
            }
        }
        log::info!(
            "Recovered {} sessions, {} with a known position",
            coordinator.registry.count(),
            positioned
        );
        coordinator
    }

    pub fn accept(&mut self, connection: C, id: &str) -> Result<Session, RegistryError> {
        let connection_id = connection.connection_id();
        let session = self.registry.register(connection, id)?;
        if let Some(tracked) = self.registry.get(connection_id) {
            tracked.connection.serialize_attachment(&session);
        }

        let delivery = broadcast(
            &self.registry,
            &WsMessage::Join {
                id: session.id.clone(),
            },
            Some(session.id.as_str()),
        );
        log::info!(
            "Connection {} joined as {} (announced to {}, {} failed)",
            connection_id,
            session.id,
            delivery.delivered,
            delivery.failed
        );
        Ok(session)
    }

    /// Interprets one inbound text frame. Malformed frames are logged and dropped.
    pub fn handle_frame(&mut self, from: ConnectionId, frame: &str) {
        match WsMessage::from_frame(frame) {
            Ok(message) => self.handle_message(from, message),
            Err(err) => log::warn!("Ignoring frame from connection {}: {}", from, err),
        }
    }

    pub fn handle_message(&mut self, from: ConnectionId, message: WsMessage) {
        let sender = match self.registry.get(from) {
            Some(tracked) => tracked.session.id.clone(),
            None => {
                log::debug!(
                    "Ignoring {} from untracked connection {}",
                    message.kind(),
                    from
                );
                return;
            }
        };

        let kind = message.kind();
        let delivery = match message {
            WsMessage::Move { x, y, .. } => self.move_cursor(from, x, y),
            WsMessage::Message { text } => self.relay_message(&sender, text),
            WsMessage::GetCursors => {
                self.reply_cursors(from);
                return;
            }
            other => {
                log::debug!("Ignoring inbound {} from {}", other.kind(), sender);
                return;
            }
        };
        if delivery.failed > 0 {
            log::warn!(
                "{} from {} reached {} connections, {} failed",
                kind,
                sender,
                delivery.delivered,
                delivery.failed
            );
        }
    }

    fn move_cursor(&mut self, from: ConnectionId, x: f64, y: f64) -> Delivery {
        let id = match self.registry.update_position(from, x, y) {
            Ok(tracked) => {
                tracked.connection.serialize_attachment(&tracked.session);
                tracked.session.id.clone()
            }
            Err(err) => {
                log::debug!("Dropping move: {}", err);
                return Delivery::default();
            }
        };

        let message = WsMessage::Move {
            id: id.clone(),
            x,
            y,
        };
        broadcast(&self.registry, &message, Some(id.as_str()))
    }

    fn reply_cursors(&self, from: ConnectionId) {
        let tracked = match self.registry.get(from) {
            Some(tracked) => tracked,
            None => return,
        };
        let response = WsMessage::GetCursorsResponse {
            sessions: self.snapshot(),
        };
        match response.to_frame() {
            Ok(frame) => {
                if let Err(err) = tracked.connection.send_text(&frame) {
                    log::debug!("Cursor snapshot not delivered: {}", err);
                }
            }
            Err(err) => log::error!("Cannot encode cursor snapshot: {}", err),
        }
    }

    fn relay_message(&self, sender: &str, text: String) -> Delivery {
        let text = if self.policy.annotate_count {
            format!("{} to {} clients", text, self.registry.count())
        } else {
            text
        };
        let without = if self.policy.include_sender {
            None
        } else {
            Some(sender)
        };
        broadcast(&self.registry, &WsMessage::Message { text }, without)
    }

    /// Transitions a connection to closed. Safe to call more than once: only the first
    /// call for a tracked connection announces the departure.
    pub fn handle_close(&mut self, from: ConnectionId) -> Option<Session> {
        let tracked = self.registry.remove(from).ok()?;
        let delivery = broadcast(
            &self.registry,
            &WsMessage::Quit {
                id: tracked.session.id.clone(),
            },
            None,
        );
        log::info!(
            "Connection {} ({}) left, {} remaining, announced to {}, {} failed",
            from,
            tracked.session.id,
            self.registry.count(),
            delivery.delivered,
            delivery.failed
        );
        Some(tracked.session)
    }

    /// Closes every tracked connection, running the normal close path for each one.
    pub fn close_sessions(&mut self) -> usize {
        let connection_ids = self.registry.connection_ids();
        for connection_id in &connection_ids {
            if let Some(tracked) = self.registry.get(*connection_id) {
                tracked.connection.close();
            }
            self.handle_close(*connection_id);
        }
        log::info!("Closed {} sessions", connection_ids.len());
        connection_ids.len()
    }

    pub fn is_tracked(&self, connection_id: ConnectionId) -> bool {
        self.registry.get(connection_id).is_some()
    }

    pub fn count(&self) -> usize {
        self.registry.count()
    }

    pub fn snapshot(&self) -> Vec<Session> {
        self.registry.snapshot()
    }
}
