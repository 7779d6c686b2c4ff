//! `demand-forecast` library crate.
//!
//! The binary (`demand`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the scoring boundary can be embedded behind other front-ends
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod models;
pub mod plot;
pub mod report;
pub mod scoring;
pub mod server;
pub mod split;
