//! Deterministic simulation harness for the Parley relay.
//!
//! Turmoil-backed server and client wrappers plus a seeded [`SimEnv`] for
//! reproducible runs under virtual time.
//!
//! # Model-Based Testing
//!
//! The `model` module is a reference implementation of the relay's
//! observable behaviour. Operations are applied to both the model and a real
//! `ServerDriver`, and their outcomes are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod sim_client;
pub mod sim_env;
pub mod sim_server;

pub use model::{ModelRelay, Operation, Outcome};
pub use sim_client::SimClient;
pub use sim_env::SimEnv;
pub use sim_server::SimServer;
