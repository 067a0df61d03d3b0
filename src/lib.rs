//! Lookup service core library, exposed for integration testing.

pub mod cache;
pub mod catalog_watch;
pub mod config;
pub mod discogs;
pub mod error;
pub mod fuzzy;
pub mod handlers;
pub mod library;
pub mod metadata_service;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod persistent_cache;
pub mod state;
pub mod strategies;
pub mod telemetry;
