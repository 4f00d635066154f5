//! # Provider Registry Library
//!
//! Ingests signed provider releases from upstream source hosts and serves
//! them through the provider registry protocol.

pub mod artifacts;
pub mod audit;
pub mod auth;
pub mod config;
pub mod credentials;
pub mod db;
pub mod discovery;
pub mod docs;
pub mod error;
pub mod extractor;
pub mod gpg;
pub mod handlers;
pub mod models;
pub mod protocol;
pub mod repositories;
pub mod server;
pub mod signature;
pub mod sources;
pub mod telemetry;
pub mod version;
pub use migration;
