//! Scoring boundary.
//!
//! - typed service configuration (`config`)
//! - request decoding (`request`)
//! - forecast realignment (`reconcile`)
//! - the JSON in / JSON out entry point (`service`)

pub mod config;
pub mod reconcile;
pub mod request;
pub mod service;

pub use config::ServiceConfig;
pub use reconcile::{Reconciled, reconcile};
pub use request::{ScoringRequest, decode_request};
pub use service::{ScoreResponse, ScoringContext};
