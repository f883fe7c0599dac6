use crate::{Connection, SessionRegistry, WsMessage};

/// Outcome of one fan-out. Failed recipients are only counted, never retried.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub failed: usize,
}

/// Sends `message` to every tracked connection whose session id differs from `without`.
pub fn broadcast<C: Connection>(
    registry: &SessionRegistry<C>,
    message: &WsMessage,
    without: Option<&str>,
) -> Delivery {
    let mut delivery = Delivery::default();

    let frame = match message.to_frame() {
        Ok(frame) => frame,
        Err(err) => {
            log::error!("Dropping {} broadcast: {}", message.kind(), err);
            return delivery;
        }
    };

    for tracked in registry.iter() {
        if without.map_or(false, |id| id == tracked.session.id) {
            continue;
        }
        match tracked.connection.send_text(&frame) {
            Ok(()) => delivery.delivered += 1,
            Err(err) => {
                log::debug!("Broadcast of {} skipped a recipient: {}", message.kind(), err);
                delivery.failed += 1;
            }
        }
    }

    delivery
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConnectionId, DeliveryError, Session};

    struct Flaky {
        id: ConnectionId,
        broken: bool,
    }

    impl Connection for Flaky {
        fn connection_id(&self) -> ConnectionId {
            self.id
        }
        fn send_text(&self, _: &str) -> Result<(), DeliveryError> {
            if self.broken {
                Err(DeliveryError::Full(self.id))
            } else {
                Ok(())
            }
        }
        fn close(&self) {}
        fn serialize_attachment(&self, _: &Session) {}
        fn deserialize_attachment(&self) -> Option<Session> {
            None
        }
    }

    #[test]
    fn it_counts_failed_recipients_separately() {
        let mut registry = SessionRegistry::new();
        registry.register(Flaky { id: 1, broken: false }, "a").expect("");
        registry.register(Flaky { id: 2, broken: true }, "b").expect("");
        registry.register(Flaky { id: 3, broken: false }, "c").expect("");

        let delivery = broadcast(&registry, &WsMessage::Join { id: "d".into() }, None);
        assert_eq!(
            delivery,
            Delivery {
                delivered: 2,
                failed: 1
            }
        );

        let delivery = broadcast(&registry, &WsMessage::Quit { id: "c".into() }, Some("c"));
        assert_eq!(
            delivery,
            Delivery {
                delivered: 1,
                failed: 1
            }
        );
    }
}
