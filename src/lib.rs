#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(clippy::too_many_arguments)]

//! Real-time matchmaking and lobby coordinator for 1-vs-1 game sessions.
//!
//! [`registry`] owns the lobby state machine, [`matchmaking`] owns the FIFO
//! pairing queue, [`broadcast`] fans events out to subscribed sockets,
//! [`countdown`] drives the cancellable pre-game timer, and
//! [`connection_hub`] bridges live sockets into the registry's disconnect
//! path. [`server`] adapts all of the above to HTTP and WebSocket.

pub mod broadcast;
pub mod config;
pub mod connection_hub;
pub mod countdown;
pub mod logging;
pub mod matchmaking;
pub mod protocol;
pub mod registry;
pub mod server;
