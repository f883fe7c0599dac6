use std::collections::HashMap;
use std::time::Duration;

use actix::{Actor, AsyncContext, Context, Handler, Message, MessageResult, SpawnHandle};

use system::{Connection, ConnectionId, Coordinator, MessagePolicy, SessionId};

use crate::connection::ConnectionHandle;

/// Name under which the single room is published.
pub const GLOBAL_ROOM: &str = "globalRoom";

#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub handle: ConnectionHandle,
    pub session_id: SessionId,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Inbound {
    pub from: ConnectionId,
    pub text: String,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub from: ConnectionId,
}

/// Closes every connection of the room. Replies with the number of sessions closed.
#[derive(Message)]
#[rtype(result = "usize")]
pub struct CloseSessions;

/// Drops the coordinator while keeping connections open, as an idle host would.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Hibernate;

#[derive(Message)]
#[rtype(result = "RoomStats")]
pub struct GetStats;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomStats {
    pub room: String,
    pub participants: usize,
    pub connections: usize,
    pub awake: bool,
    pub generation: u32,
}

/// Hosts the transport connections of one room and the coordinator serving them.
///
/// Connections belong to the host and survive the coordinator; the coordinator is built
/// on demand and rebuilt from connection attachments after each hibernation.
pub struct RoomHost {
    name: String,
    policy: MessagePolicy,
    hibernate_after: Option<Duration>,
    connections: HashMap<ConnectionId, ConnectionHandle>,
    coordinator: Option<Coordinator<ConnectionHandle>>,
    idle_timer: Option<SpawnHandle>,
    generation: u32,
}

impl RoomHost {
    pub fn new(name: String, policy: MessagePolicy, hibernate_after: Option<Duration>) -> Self {
        Self {
            name,
            policy,
            hibernate_after,
            connections: HashMap::new(),
            coordinator: None,
            idle_timer: None,
            generation: 0,
        }
    }

    fn wake(&mut self) -> &mut Coordinator<ConnectionHandle> {
        if self.coordinator.is_none() {
            self.generation += 1;
            log::info!(
                "Starting coordinator #{} of {} with {} live connections",
                self.generation,
                self.name,
                self.connections.len()
            );
        }
        let connections = &self.connections;
        let policy = self.policy;
        self.coordinator
            .get_or_insert_with(|| Coordinator::recover(connections.values().cloned(), policy))
    }

    fn hibernate(&mut self) {
        if let Some(coordinator) = self.coordinator.take() {
            log::info!(
                "Coordinator of {} hibernated with {} sessions",
                self.name,
                coordinator.count()
            );
        }
    }

    fn touch(&mut self, ctx: &mut Context<Self>) {
        if let Some(timer) = self.idle_timer.take() {
            ctx.cancel_future(timer);
        }
        if let Some(after) = self.hibernate_after {
            self.idle_timer = Some(ctx.run_later(after, |act, _| {
                act.idle_timer = None;
                act.hibernate();
            }));
        }
    }

    fn is_tracked(&self, connection_id: ConnectionId) -> bool {
        self.coordinator
            .as_ref()
            .map_or(false, |c| c.is_tracked(connection_id))
    }
}

impl Actor for RoomHost {
    type Context = Context<Self>;

    fn started(&mut self, _: &mut Self::Context) {
        log::info!("Room {} is up", self.name);
    }
}

impl Handler<Connect> for RoomHost {
    type Result = ();

    fn handle(&mut self, msg: Connect, ctx: &mut Self::Context) -> Self::Result {
        self.touch(ctx);
        let connection_id = msg.handle.connection_id();
        let accepted = self.wake().accept(msg.handle.clone(), &msg.session_id);
        match accepted {
            Ok(_) => {
                self.connections.insert(connection_id, msg.handle);
            }
            Err(err) => {
                log::warn!("Rejecting connection {}: {}", connection_id, err);
                msg.handle.close();
            }
        }
    }
}

impl Handler<Inbound> for RoomHost {
    type Result = ();

    fn handle(&mut self, msg: Inbound, ctx: &mut Self::Context) -> Self::Result {
        self.touch(ctx);
        self.wake().handle_frame(msg.from, &msg.text);
    }
}

impl Handler<Disconnect> for RoomHost {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, ctx: &mut Self::Context) -> Self::Result {
        self.touch(ctx);
        self.wake().handle_close(msg.from);
        self.connections.remove(&msg.from);
    }
}

impl Handler<CloseSessions> for RoomHost {
    type Result = usize;

    fn handle(&mut self, _: CloseSessions, ctx: &mut Self::Context) -> Self::Result {
        self.touch(ctx);
        self.wake();
        let inert: Vec<ConnectionHandle> = self
            .connections
            .values()
            .filter(|handle| !self.is_tracked(handle.connection_id()))
            .cloned()
            .collect();

        let closed = self.wake().close_sessions();
        for handle in &inert {
            handle.close();
        }
        if !inert.is_empty() {
            log::info!("Closed {} inert connections of {}", inert.len(), self.name);
        }
        // Closed handles must not be recovered before their transport reports back.
        self.connections.clear();
        closed
    }
}

impl Handler<Hibernate> for RoomHost {
    type Result = ();

    fn handle(&mut self, _: Hibernate, _: &mut Self::Context) -> Self::Result {
        self.hibernate();
    }
}

impl Handler<GetStats> for RoomHost {
    type Result = MessageResult<GetStats>;

    fn handle(&mut self, _: GetStats, _: &mut Self::Context) -> Self::Result {
        MessageResult(RoomStats {
            room: self.name.clone(),
            participants: self.coordinator.as_ref().map_or_else(
                || {
                    self.connections
                        .values()
                        .filter(|handle| handle.deserialize_attachment().is_some())
                        .count()
                },
                |c| c.count(),
            ),
            connections: self.connections.len(),
            awake: self.coordinator.is_some(),
            generation: self.generation,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::connection::{Attachment, ConnectionEgress};
    use actix::Addr;
    use system::{Session, WsMessage};

    /// Stands in for a websocket actor and records what the room sends it.
    #[derive(Default)]
    pub struct Peer {
        received: Vec<ConnectionEgress>,
    }

    impl Actor for Peer {
        type Context = Context<Self>;
    }

    impl Handler<ConnectionEgress> for Peer {
        type Result = ();

        fn handle(&mut self, msg: ConnectionEgress, _: &mut Self::Context) {
            self.received.push(msg);
        }
    }

    #[derive(Message)]
    #[rtype(result = "Vec<ConnectionEgress>")]
    pub struct Drain;

    impl Handler<Drain> for Peer {
        type Result = MessageResult<Drain>;

        fn handle(&mut self, _: Drain, _: &mut Self::Context) -> Self::Result {
            MessageResult(std::mem::take(&mut self.received))
        }
    }

    /// Hands out the host's handle of one live connection.
    #[derive(Message)]
    #[rtype(result = "Option<ConnectionHandle>")]
    pub struct HandleOf(pub ConnectionId);

    impl Handler<HandleOf> for RoomHost {
        type Result = MessageResult<HandleOf>;

        fn handle(&mut self, msg: HandleOf, _: &mut Self::Context) -> Self::Result {
            MessageResult(self.connections.get(&msg.0).cloned())
        }
    }

    pub fn peer(id: ConnectionId) -> (Addr<Peer>, ConnectionHandle) {
        let addr = Peer::default().start();
        let handle = ConnectionHandle::new(id, addr.clone().recipient(), Attachment::default());
        (addr, handle)
    }

    pub async fn join(host: &Addr<RoomHost>, id: ConnectionId, session_id: &str) -> Addr<Peer> {
        let (addr, handle) = peer(id);
        host.send(Connect {
            handle,
            session_id: session_id.into(),
        })
        .await
        .expect("");
        addr
    }

    pub async fn messages(peer: &Addr<Peer>) -> Vec<WsMessage> {
        peer
            .send(Drain)
            .await
            .expect("")
            .into_iter()
            .filter_map(|egress| match egress {
                ConnectionEgress::Text(text) => WsMessage::from_frame(&text).ok(),
                ConnectionEgress::Close => None,
            })
            .collect()
    }

    fn room(hibernate_after: Option<Duration>) -> Addr<RoomHost> {
        RoomHost::new("test".into(), MessagePolicy::default(), hibernate_after).start()
    }

    #[actix_rt::test]
    async fn it_recovers_positions_after_hibernation() {
        let host = room(None);
        let a = join(&host, 1, "a").await;
        let b = join(&host, 2, "b").await;
        host.send(Inbound {
            from: 1,
            text: r#"{"type":"move","x":0.2,"y":0.3}"#.into(),
        })
        .await
        .expect("");
        host.send(Inbound {
            from: 2,
            text: r#"{"type":"move","x":0.5,"y":0.5}"#.into(),
        })
        .await
        .expect("");
        messages(&a).await;
        messages(&b).await;

        host.send(Hibernate).await.expect("");
        let stats = host.send(GetStats).await.expect("");
        assert!(!stats.awake);
        assert_eq!(stats.connections, 2);
        assert_eq!(stats.participants, 2);

        host.send(Inbound {
            from: 1,
            text: r#"{"type":"get-cursors"}"#.into(),
        })
        .await
        .expect("");

        match messages(&a).await.as_slice() {
            [WsMessage::GetCursorsResponse { sessions }] => {
                let mut sessions = sessions.clone();
                sessions.sort_by(|l, r| l.id.cmp(&r.id));
                assert_eq!(
                    sessions,
                    vec![
                        Session {
                            id: "a".into(),
                            x: 0.2,
                            y: 0.3
                        },
                        Session {
                            id: "b".into(),
                            x: 0.5,
                            y: 0.5
                        },
                    ]
                );
            }
            other => panic!("unexpected frames {:?}", other),
        }
        assert!(messages(&b).await.is_empty());

        let stats = host.send(GetStats).await.expect("");
        assert!(stats.awake);
        assert_eq!(stats.generation, 2);
    }

    #[actix_rt::test]
    async fn it_announces_departure_after_hibernation() {
        let host = room(None);
        let a = join(&host, 1, "a").await;
        let b = join(&host, 2, "b").await;
        messages(&a).await;

        host.send(Hibernate).await.expect("");
        host.send(Disconnect { from: 1 }).await.expect("");
        host.send(Disconnect { from: 1 }).await.expect("");

        assert_eq!(messages(&b).await, vec![WsMessage::Quit { id: "a".into() }]);
        let stats = host.send(GetStats).await.expect("");
        assert_eq!(stats.participants, 1);
        assert_eq!(stats.connections, 1);
    }

    #[actix_rt::test]
    async fn it_closes_every_session() {
        let host = room(None);
        let peers = vec![
            join(&host, 1, "a").await,
            join(&host, 2, "b").await,
            join(&host, 3, "c").await,
        ];

        assert_eq!(host.send(CloseSessions).await.expect(""), 3);

        for peer in &peers {
            let received = peer.send(Drain).await.expect("");
            assert_eq!(received.last(), Some(&ConnectionEgress::Close));
        }
        let stats = host.send(GetStats).await.expect("");
        assert_eq!(stats.participants, 0);

        for from in 1..=3 {
            host.send(Disconnect { from }).await.expect("");
        }
        for peer in &peers {
            assert!(messages(peer).await.is_empty());
        }
        assert_eq!(host.send(GetStats).await.expect("").connections, 0);
    }

    #[actix_rt::test]
    async fn it_forgets_closed_sessions_across_hibernation() {
        let host = room(None);
        let a = join(&host, 1, "a").await;
        let b = join(&host, 2, "b").await;
        assert_eq!(host.send(CloseSessions).await.expect(""), 2);

        host.send(Hibernate).await.expect("");
        let stats = host.send(GetStats).await.expect("");
        assert_eq!(stats.participants, 0);
        assert_eq!(stats.connections, 0);

        let c = join(&host, 3, "c").await;
        host.send(Inbound {
            from: 3,
            text: r#"{"type":"get-cursors"}"#.into(),
        })
        .await
        .expect("");
        assert_eq!(
            messages(&c).await,
            vec![WsMessage::GetCursorsResponse {
                sessions: vec![Session::new("c".into())]
            }]
        );

        messages(&a).await;
        messages(&b).await;
        host.send(Disconnect { from: 1 }).await.expect("");
        host.send(Disconnect { from: 2 }).await.expect("");
        assert!(messages(&a).await.is_empty());
        assert!(messages(&b).await.is_empty());
        assert!(messages(&c).await.is_empty());

        let stats = host.send(GetStats).await.expect("");
        assert_eq!(stats.participants, 1);
        assert_eq!(stats.connections, 1);
    }

    #[actix_rt::test]
    async fn it_rejects_empty_session_id() {
        let host = room(None);
        let peer = join(&host, 1, "").await;

        assert_eq!(
            peer.send(Drain).await.expect(""),
            vec![ConnectionEgress::Close]
        );
        let stats = host.send(GetStats).await.expect("");
        assert_eq!(stats.participants, 0);
        assert_eq!(stats.connections, 0);
    }

    #[actix_rt::test]
    async fn it_hibernates_when_idle() {
        let host = room(Some(Duration::from_millis(20)));
        let _a = join(&host, 1, "a").await;
        assert!(host.send(GetStats).await.expect("").awake);

        actix_rt::time::delay_for(Duration::from_millis(100)).await;

        let stats = host.send(GetStats).await.expect("");
        assert!(!stats.awake);
        assert_eq!(stats.participants, 1);
    }
}
