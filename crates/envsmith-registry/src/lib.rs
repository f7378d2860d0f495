//! Package-manager port for Envsmith.
//!
//! Exposes an abstract capability over external package managers
//! (npm, pip, ...): query available versions, fetch metadata, resolve a
//! constraint against the catalogue. Every operation carries a deadline
//! and degrades to "no data" on timeout; metadata is cached for an hour.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod backends;
mod cache;
mod port;
mod types;

pub use backends::{NpmBackend, PipBackend};
pub use cache::{DEFAULT_CAPACITY, DEFAULT_TTL, PackageCache};
pub use port::{DEFAULT_DEADLINE, PackageManagerPort, Registry};
pub use types::{ConflictReport, Manager, PackageInfo, ResolvedDependency, ResolvedTree};
