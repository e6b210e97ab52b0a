//! Pooled, auto-reconnecting MQTT facade (spec §4.1): one
//! subscribe/unsubscribe/publish/connection-listener surface over a pool of
//! broker sessions, with wildcard-subsumption dedup and session-keyed
//! dispatch.

pub mod error;
pub mod filter;
pub mod multiplexer;
pub mod session;

pub use error::MqttError;
pub use multiplexer::{Callback, ConnectionCallback, IncomingMessage, Multiplexer, SessionOptionsFactory, StaticSessionOptionsFactory, SubscriptionToken};
pub use session::{Session, SessionId, SessionState};
