//! # nearby
//!
//! A location-aware content service: authenticated clients post a message,
//! a coordinate and an optional media file, and find posts again by
//! geographic radius or by score threshold.
//!
//! ## Layout
//!
//! - [`ingest`]: media to the object store, optional scoring, record to the
//!   document store
//! - [`search`]: radius and threshold queries, decoded into [`record::Record`]s
//! - [`blob`], [`scoring`], [`store`]: pluggable adapters chosen by
//!   [`config::ServiceConfig`]
//! - [`auth`], [`server`], [`cli`]: tokens and accounts, the HTTP surface and
//!   the command line

pub mod auth;
pub mod blob;
pub mod cli;
pub mod config;
pub mod error;
pub mod geo;
pub mod ingest;
pub mod query;
pub mod record;
pub mod scoring;
pub mod search;
pub mod server;
pub mod store;
pub mod util;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
