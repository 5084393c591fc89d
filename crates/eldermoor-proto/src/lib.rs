//! The game protocol session: inbound decoding, outbound encoding, the
//! per-client view of the world, and the login/kick/reconnect lifecycle.
//!
//! One [`GameEngine`] runs on the game thread and owns every session plus
//! the capability handles into the simulation, account storage, and chat.
//! Connection tasks feed it [`GameTask`] values through the dispatch queue
//! and receive encoded frames back through their [`FrameSink`].

pub mod engine;
pub mod inbound;
pub mod known;
pub mod login;
pub mod map_view;
pub mod outbound;
pub mod policy;
pub mod session;
pub mod sink;
pub mod waitlist;

mod broadcast;

#[cfg(test)]
mod engine_tests;
#[cfg(test)]
pub(crate) mod fixtures;

pub use engine::{GameEngine, GameTask};
pub use inbound::{Decoded, DecodeError, FirstPacket, SessionCommand, decode};
pub use known::{KNOWN_CREATURE_LIMIT, KnownCreatures, Reference};
pub use map_view::ViewEncoder;
pub use policy::{OutfitPolicy, SessionPolicy};
pub use session::{ClientSession, FrameSizeWatch, SessionId, SessionState};
pub use sink::{FrameSink, LoginGate, SinkClosed};
pub use waitlist::WaitingList;
