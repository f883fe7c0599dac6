use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use actix::prelude::SendError;
use actix::{Actor, ActorContext, Addr, AsyncContext, Handler, Message, Recipient, Running, StreamHandler};
use actix_web::http::{header, StatusCode};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use actix_web_actors::ws::{CloseCode, CloseReason};
use serde::Deserialize;

use system::{serde_json, Connection, ConnectionId, DeliveryError, Session, SessionId};

use crate::host::{Connect, Disconnect, Inbound, RoomHost};

/// Ping cadence and how long a client may stay silent before it is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(10),
        }
    }
}

impl Heartbeat {
    pub fn is_expired(&self, last_seen: Instant, now: Instant) -> bool {
        now.duration_since(last_seen) > self.timeout
    }
}

/// What the room wants a connection to do.
#[derive(Debug, Clone, PartialEq, Message)]
#[rtype(result = "()")]
pub enum ConnectionEgress {
    Text(String),
    Close,
}

/// Metadata kept next to a connection for as long as the connection lives, no matter how
/// many times the coordinator is restarted in between.
#[derive(Debug, Clone, Default)]
pub struct Attachment(Arc<Mutex<Option<String>>>);

impl Attachment {
    pub fn store(&self, session: &Session) {
        let serialized = match serde_json::to_string(session) {
            Ok(serialized) => serialized,
            Err(err) => {
                log::error!("Cannot serialize attachment for {}: {}", session.id, err);
                return;
            }
        };
        match self.0.lock() {
            Ok(mut slot) => *slot = Some(serialized),
            Err(_) => log::error!("Attachment of {} is poisoned", session.id),
        }
    }

    pub fn load(&self) -> Option<Session> {
        let slot = self.0.lock().ok()?;
        let session = slot
            .as_ref()
            .and_then(|serialized| serde_json::from_str(serialized).ok());
        session
    }
}

/// The coordinator's grip on a connection actor.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    recipient: Recipient<ConnectionEgress>,
    attachment: Attachment,
}

impl ConnectionHandle {
    pub fn new(
        id: ConnectionId,
        recipient: Recipient<ConnectionEgress>,
        attachment: Attachment,
    ) -> Self {
        Self {
            id,
            recipient,
            attachment,
        }
    }
}

impl Connection for ConnectionHandle {
    fn connection_id(&self) -> ConnectionId {
        self.id
    }

    fn send_text(&self, text: &str) -> Result<(), DeliveryError> {
        self.recipient
            .do_send(ConnectionEgress::Text(text.to_owned()))
            .map_err(|err| match err {
                SendError::Full(_) => DeliveryError::Full(self.id),
                SendError::Closed(_) => DeliveryError::Closed(self.id),
            })
    }

    fn close(&self) {
        if self.recipient.do_send(ConnectionEgress::Close).is_err() {
            log::debug!("Connection {} is already gone", self.id);
        }
    }

    fn serialize_attachment(&self, session: &Session) {
        self.attachment.store(session);
    }

    fn deserialize_attachment(&self) -> Option<Session> {
        self.attachment.load()
    }
}

/// Source of host-side connection ids.
#[derive(Debug, Default)]
pub struct ConnectionIdSource(AtomicU32);

impl ConnectionIdSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> ConnectionId {
        self.0.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Connecting,
    Active,
    Closed,
}

struct ConnectionActor {
    id: ConnectionId,
    session_id: SessionId,
    state: ConnectionState,
    host: Addr<RoomHost>,
    attachment: Attachment,
    heartbeat: Heartbeat,
    last_seen: Instant,
}

impl ConnectionActor {
    fn new(
        id: ConnectionId,
        session_id: SessionId,
        host: Addr<RoomHost>,
        heartbeat: Heartbeat,
    ) -> Self {
        Self {
            id,
            session_id,
            state: ConnectionState::Connecting,
            host,
            attachment: Attachment::default(),
            heartbeat,
            last_seen: Instant::now(),
        }
    }

    /// Moves to `Closed`, telling the host only on the first call.
    fn close(&mut self) {
        if self.state == ConnectionState::Active {
            self.host.do_send(Disconnect { from: self.id });
        }
        self.state = ConnectionState::Closed;
    }

    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(self.heartbeat.interval, |act, ctx| {
            if act.heartbeat.is_expired(act.last_seen, Instant::now()) {
                log::info!("Connection {} timed out", act.id);
                act.close();
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.start_heartbeat(ctx);

        let handle = ConnectionHandle::new(
            self.id,
            ctx.address().recipient(),
            self.attachment.clone(),
        );
        self.host.do_send(Connect {
            handle,
            session_id: self.session_id.clone(),
        });
        self.state = ConnectionState::Active;
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        self.close();
        Running::Stop
    }
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.last_seen = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_seen = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.last_seen = Instant::now();
                if self.state == ConnectionState::Active {
                    self.host.do_send(Inbound {
                        from: self.id,
                        text,
                    });
                }
            }
            Ok(ws::Message::Binary(bin)) => {
                log::debug!("Ignoring {} binary bytes from {}", bin.len(), self.id);
            }
            Ok(ws::Message::Close(reason)) => {
                self.close();
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => (),
            Err(err) => {
                log::warn!("Protocol error on connection {}: {}", self.id, err);
                self.close();
                ctx.stop();
            }
        }
    }
}

/// Egress
impl Handler<ConnectionEgress> for ConnectionActor {
    type Result = ();

    fn handle(&mut self, msg: ConnectionEgress, ctx: &mut Self::Context) -> Self::Result {
        match msg {
            ConnectionEgress::Text(text) => ctx.text(text),
            ConnectionEgress::Close => {
                ctx.close(Some(CloseReason {
                    code: CloseCode::Normal,
                    description: None,
                }));
                ctx.stop();
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    #[serde(default)]
    id: Option<String>,
}

fn is_websocket_upgrade(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .map_or(false, |value| value.eq_ignore_ascii_case("websocket"))
}

/// Upgrades `/ws?id=<session id>`. A plain request is refused with 426 whatever its
/// query says; an upgrade without a usable id gets 400.
pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    host: web::Data<Addr<RoomHost>>,
    connection_ids: web::Data<ConnectionIdSource>,
) -> Result<HttpResponse, Error> {
    if !is_websocket_upgrade(&req) {
        return Ok(HttpResponse::build(StatusCode::UPGRADE_REQUIRED)
            .body("Expected Upgrade: websocket"));
    }

    let session_id = match web::Query::<ConnectQuery>::from_query(req.query_string()) {
        Ok(query) => query.into_inner().id.filter(|id| !id.is_empty()),
        Err(err) => {
            log::debug!("Unreadable connect query: {}", err);
            None
        }
    };
    let session_id = match session_id {
        Some(id) => id,
        None => return Ok(HttpResponse::BadRequest().body("Missing id")),
    };

    let heartbeat = req
        .app_data::<web::Data<Heartbeat>>()
        .map_or_else(Heartbeat::default, |heartbeat| *heartbeat.get_ref());

    ws::start(
        ConnectionActor::new(
            connection_ids.next(),
            session_id,
            host.get_ref().clone(),
            heartbeat,
        ),
        &req,
        stream,
    )
}
