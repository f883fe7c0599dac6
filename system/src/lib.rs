pub extern crate serde;
pub extern crate serde_json;

mod broadcast;
mod connection;
mod coordinator;
mod error;
mod message;
mod session_registry;

pub use broadcast::*;
pub use connection::*;
pub use coordinator::*;
pub use error::*;
pub use message::*;
pub use session_registry::*;
