//! Hookvault core: privileged hook-assignment and settings store.
//!
//! A single [`Service`] owns three persistent concerns: a catalog of hook
//! definitions (the [`registry`]), per-identity assignments of hooks to
//! applications with usage tracking, and a generic per-user settings table
//! (both in the SQLite-backed [`store`]). Unprivileged clients reach it
//! through one synchronous call endpoint, [`Service::call`]; the transport
//! that carries requests is out of scope and only needs to deliver an
//! operation name, a flat JSON payload, and a verified calling identity.
//!
//! # Example
//!
//! ```rust,ignore
//! use hookvault_core::{Service, ServiceConfig};
//! use serde_json::json;
//!
//! let config = ServiceConfig::new("/var/lib/hookvault", "/opt/hookvault/hooks.json",
//!     "org.hookvault.service");
//! let service = Service::bootstrap(config, directory, notifier)?;
//!
//! let result = service.call(caller_uid, "getVersion", json!({}))?;
//! println!("version {}", result["version"]);
//! ```

pub mod config;
pub mod directory;
pub mod error;
pub mod identity;
pub mod model;
pub mod policy;
pub mod registry;
pub mod service;
pub mod settings;
pub mod store;

// Re-export commonly used types
pub use config::{ServiceConfig, StoreConfig};
pub use directory::{AppDirectory, AppInfo, Notifier};
pub use error::{Error, Result};
pub use identity::{CallContext, Uid, UserId, SYSTEM_UID};
pub use model::{App, Assignment, Hook};
pub use registry::HookRegistry;
pub use service::{ops, Service};
pub use settings::Settings;
pub use store::Store;
