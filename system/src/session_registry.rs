use std::collections::HashMap;

use crate::{Connection, ConnectionId, RegistryError, Session};

pub struct Tracked<C> {
    pub connection: C,
    pub session: Session,
}

/// Who is in the room and where their pointer is.
///
/// A `Session` exists here if and only if its connection is tracked.
pub struct SessionRegistry<C> {
    entries: HashMap<ConnectionId, Tracked<C>>,
}

impl<C: Connection> SessionRegistry<C> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn register(&mut self, connection: C, id: &str) -> Result<Session, RegistryError> {
        if id.is_empty() {
            return Err(RegistryError::MissingId);
        }
        let session = Session::new(id.to_owned());
        self.insert(connection, session.clone());
        Ok(session)
    }

    /// Tracks a connection with an already known record, e.g. one read back from its
    /// attachment.
    pub fn insert(&mut self, connection: C, session: Session) {
        let connection_id = connection.connection_id();
        log::debug!("Tracking connection {} as {}", connection_id, session.id);
        self.entries.insert(
            connection_id,
            Tracked {
                connection,
                session,
            },
        );
    }

    pub fn update_position(
        &mut self,
        connection_id: ConnectionId,
        x: f64,
        y: f64,
    ) -> Result<&Tracked<C>, RegistryError> {
        let tracked = self
            .entries
            .get_mut(&connection_id)
            .ok_or(RegistryError::NotFound(connection_id))?;
        tracked.session.x = x;
        tracked.session.y = y;
        Ok(tracked)
    }

    pub fn remove(&mut self, connection_id: ConnectionId) -> Result<Tracked<C>, RegistryError> {
        self.entries
            .remove(&connection_id)
            .ok_or(RegistryError::NotFound(connection_id))
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<&Tracked<C>> {
        self.entries.get(&connection_id)
    }

    pub fn snapshot(&self) -> Vec<Session> {
        self.entries.values().map(|t| t.session.clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tracked<C>> {
        self.entries.values()
    }
}

impl<C: Connection> Default for SessionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}
