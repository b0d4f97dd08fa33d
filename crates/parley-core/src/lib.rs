//! Parley core: the state behind the broadcast relay.
//!
//! Everything in this crate is Sans-IO. Methods take the current time as an
//! argument and return values describing what happened; they never sleep,
//! spawn or touch the network. The server driver composes these pieces and
//! turns their results into network actions.
//!
//! # Components
//!
//! - [`IdentityRegistry`]: display name to owning connection, one live owner
//!   per name
//! - [`InactivityMonitor`]: one deadline per registered name, reset on
//!   activity
//! - [`Session`]: per-connection `Anonymous -> Named -> Terminated` machine
//! - [`format_line`]: human-readable rendering of line events
//! - [`env::Environment`]: time and randomness, swappable for simulation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod env;
pub mod error;
pub mod format;
pub mod identity;
pub mod inactivity;
pub mod session;

pub use error::{IdentityError, MonitorError, SessionError};
pub use format::format_line;
pub use identity::IdentityRegistry;
pub use inactivity::{Expiry, InactivityMonitor};
pub use session::{Session, SessionState};
