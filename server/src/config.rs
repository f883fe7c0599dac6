use std::time::Duration;

use clap::{Parser, ValueEnum};

use system::MessagePolicy;

use crate::connection::Heartbeat;
use crate::host::GLOBAL_ROOM;

/// How the admin surface reaches the room host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AdminTransport {
    /// Call the host through the address held by the HTTP app.
    Local,
    /// Look the host up by room name before every call.
    Relay,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "presence-server", version, about = "Single room live cursor relay")]
pub struct Config {
    #[arg(long, env = "PRESENCE_BIND", default_value = "127.0.0.1:8080")]
    pub bind: String,

    #[arg(long, env = "PRESENCE_ROOM", default_value = GLOBAL_ROOM)]
    pub room: String,

    /// Seconds without traffic before the coordinator hibernates, 0 keeps it awake
    #[arg(long, env = "PRESENCE_HIBERNATE_AFTER_SECS", default_value_t = 60)]
    pub hibernate_after_secs: u64,

    #[arg(
        long,
        env = "PRESENCE_ADMIN_TRANSPORT",
        value_enum,
        default_value = "local"
    )]
    pub admin_transport: AdminTransport,

    /// Do not echo chat messages back to their author
    #[arg(long, env = "PRESENCE_EXCLUDE_MESSAGE_SENDER")]
    pub exclude_message_sender: bool,

    /// Relay chat messages without the recipient count suffix
    #[arg(long, env = "PRESENCE_PLAIN_MESSAGES")]
    pub plain_messages: bool,

    /// Seconds between pings sent to each client
    #[arg(long, env = "PRESENCE_HEARTBEAT_INTERVAL_SECS", default_value_t = 5)]
    pub heartbeat_interval_secs: u64,

    /// Seconds of client silence before its connection is dropped
    #[arg(long, env = "PRESENCE_CLIENT_TIMEOUT_SECS", default_value_t = 10)]
    pub client_timeout_secs: u64,

    /// Allow any origin, for front-ends served from elsewhere
    #[arg(long, env = "PRESENCE_PERMISSIVE_CORS")]
    pub permissive_cors: bool,
}

impl Config {
    pub fn message_policy(&self) -> MessagePolicy {
        MessagePolicy {
            include_sender: !self.exclude_message_sender,
            annotate_count: !self.plain_messages,
        }
    }

    pub fn hibernate_after(&self) -> Option<Duration> {
        match self.hibernate_after_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn heartbeat(&self) -> Heartbeat {
        Heartbeat {
            interval: Duration::from_secs(self.heartbeat_interval_secs),
            timeout: Duration::from_secs(self.client_timeout_secs),
        }
    }
}
