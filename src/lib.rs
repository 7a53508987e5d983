//! resource-store
//!
//! Client-side stores for server-backed resources: paginated lists, edit
//! drafts and one-shot mutations, all speaking to the server through a
//! shared [`RequestGateway`] that unwraps the `{code, message, data}`
//! envelope and classifies failures.
//!
//! Overlapping requests for the same concern resolve last-call-wins: a new
//! call cancels the one in flight and only the newest may commit.

pub mod config;
pub mod gateway;
pub mod notification;
pub mod registry;
pub mod resource;

/// Version injected at compile time via RESOURCE_STORE_VERSION env var,
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("RESOURCE_STORE_VERSION") {
    Some(v) => v,
    None => "dev",
};

pub use config::Config;
pub use gateway::{GatewayConfig, Params, RequestConfig, RequestError, RequestGateway};
pub use notification::{NotificationCenter, Notifier, NotifyLevel};
pub use registry::{with_injection, Injectable, InjectionKey, Registry, RegistryError};
pub use resource::{
    EditOptions, EditResource, ListOptions, ListResource, MutationOptions, MutationResource,
    RemoveResource, Settled,
};
