//! Pagesnap Core - content identity rules shared by every tier.
//!
//! The edge dispatcher, the snapshot service, the origin application and the
//! CLI all link this crate. Nothing here is re-implemented elsewhere:
//! - [`classifier`] - crawler detection from a `User-Agent`
//! - [`hosts`] - the exact allow-list of system hostnames
//! - [`route`] and [`resolver`] - `(hostname, path)` to [`ContentRef`]
//! - [`urls`] and [`sitemap`] - the inverse direction, content to public URLs
//! - [`hydration`] - the descriptor handed from the snapshot tier to the origin
//!
//! # Architecture
//!
//! The crate performs no I/O of its own. Persistent data is reached through
//! the [`Directory`] and [`SnapshotStore`] traits; `pagesnap-store`
//! implements them over `PostgreSQL`; the `test-support` feature adds
//! in-memory implementations for tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod classifier;
pub mod directory;
pub mod error;
pub mod hosts;
pub mod hydration;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod resolver;
pub mod route;
pub mod sitemap;
pub mod snapshot_store;
pub mod types;
pub mod urls;

pub use classifier::{ClientClass, classify, is_crawler};
pub use directory::{Directory, DirectoryError, find_verified_domain};
pub use error::ErrorKind;
pub use hosts::{HostKind, SystemDomains};
pub use resolver::{ResolveError, Resolver};
pub use route::Route;
pub use snapshot_store::{SnapshotStore, SnapshotStoreError};
pub use types::*;
