//! Upload proxy in front of a remote species classifier.
//!
//! `POST /api/bugsubmit` rate-limits per client, resizes the uploaded photo and
//! forwards it to the classifier's `/predict`; `GET /api/species` relays the
//! classifier's species list.

pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod normalizer;
pub mod rate_limit;
pub mod state;
pub mod upstream;
