//! Storage location discovery and registry for jsonloc.
//!
//! This module finds the per-module document directories offered by a host
//! (plugins, the active theme and its parent, user-defined paths) and keeps
//! them in a registry addressed by stable location keys.
//!
//! # Design Principles
//! - Host isolation: all host data arrives through [`HostEnvironment`]
//! - Pure discovery: scanning never writes and never fails hard
//! - Snapshot reads: registry readers always see one complete discovery pass

pub mod discovery;
pub mod host;
pub mod location;
pub mod registry;

pub use discovery::{Discovery, DiscoveryHook, UserLocation, UserLocations};
pub use host::{HostEnvironment, ModuleRoot, ParentTheme, StaticHost, ThemeInfo};
pub use location::Location;
pub use registry::{LocationRegistry, RegistrySnapshot};
