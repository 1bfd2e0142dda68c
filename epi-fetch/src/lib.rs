#![allow(clippy::type_complexity)]
#![warn(missing_docs)]
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

pub mod adapters;
mod cache;
mod config;
mod debounce;
mod http;
pub mod ids;
/// Opt-in `tracing` subscriber setup for binaries and tests.
#[cfg(feature = "logging")]
pub mod logging;
#[allow(missing_docs)]
pub mod models;
mod page;
mod params;
mod store;
mod store_options;
mod subscriptions;
#[cfg(test)]
mod test_utils;
mod utils;

pub use adapters::{AdapterError, Adapters, ResourceAdapter, Validate};
pub use config::*;
pub use http::*;
pub use page::*;
pub use params::*;
pub use store::*;
pub use store_options::*;
pub use subscriptions::Subscription;
