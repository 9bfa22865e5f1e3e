//! Live air-quality monitoring for Turkish cities.
//!
//! Polls the WAQI feed for each configured location, memoizes responses for
//! a short interval, keeps a per-session reading history, classifies the
//! index into EPA-style severity bands, and builds dashboard panels.

pub mod alert;
pub mod cache;
pub mod config;
pub mod credentials;
pub mod dashboard;
pub mod dev_mode;
pub mod history;
pub mod ingest;
pub mod locations;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod verify;
