//! # frontman
//!
//! Control server for a physically instrumented elimination game: a
//! persistent roster of numbered players, flipped alive/dead by operators
//! over a websocket channel, with every liveness change pushed to all
//! connected viewers and translated into compact ASCII command frames for
//! effector boards on a serial link.
//!
//! ```text
//!  operators/viewers                         effector boards
//!        │  websocket (JSON)                      ▲  serial (ASCII frames)
//!        ▼                                        │
//!   ┌─────────┐    ┌─────────────┐    ┌───────────┴──┐
//!   │ Server  │───►│ RosterStore │───►│  DeviceLink  │◄── reply monitor
//!   │ sessions│    │ + snapshot  │    │ (one writer) │    (log only)
//!   └────┬────┘    └─────────────┘    └──────────────┘
//!        │                ▲                   ▲
//!        ▼                │ dead ids          │ #DET frame
//!   ┌──────────────┐      └─── re-send task ──┘  every second
//!   │ BroadcastHub │
//!   └──────────────┘
//! ```
//!
//! The roster is owned by [`roster::RosterStore`] and persisted after every
//! accepted change; the kill set is always re-derived from it, never stored
//! separately. The serial channel has a single guarded writer, and the
//! unacknowledged detonate frame is re-sent on a fixed interval to cover
//! frames the boards missed.

pub mod device;
pub mod error;
pub mod hub;
pub mod protocol;
pub mod roster;
pub mod server;

pub use error::{Error, Result};
pub use server::{Server, ServerConfig};
