//! Resource stores
//!
//! Stateful stores that sit between a UI and the [`RequestGateway`]. Each
//! store keeps its observable state in [`StateCell`]s and guards every
//! request with a [`TokenSlot`], so only the most recent call for a given
//! concern may commit results.
//!
//! # Architecture
//!
//! - [`list`] - Paginated collections with search
//! - [`edit`] - Single-record create/update drafts
//! - [`modal`] - Dialog visibility and an edit store bound to it
//! - [`mutation`] - One-shot mutations, including delete
//! - [`page`] - Pagination query and page payload types
//! - [`value`] - Options that may be literals or functions
//! - [`cell`] - Observable state cells
//! - [`token`] - Last-call-wins cancellation tokens
//!
//! # Example
//!
//! ```ignore
//! use resource_store::gateway::{GatewayConfig, RequestGateway};
//! use resource_store::resource::{ListOptions, ListResource};
//!
//! async fn users(gateway: RequestGateway) {
//!     let list: ListResource<serde_json::Value> =
//!         ListResource::create(gateway, ListOptions::new("/users")).await;
//!     println!("{} users", list.data().total);
//! }
//! ```
//!
//! [`RequestGateway`]: crate::gateway::RequestGateway

pub mod cell;
pub mod edit;
pub mod list;
pub mod modal;
pub mod mutation;
pub mod page;
pub mod token;
pub mod value;

pub use cell::StateCell;
pub use edit::{EditOptions, EditResource, EditState, EditStatus, FormContext, SubmitContext};
pub use list::{FetchState, ListOptions, ListResource, ListState, ListStatus};
pub use modal::{EditModalResource, ModalState};
pub use mutation::{MutationOptions, MutationResource, MutationState, RemoveResource};
pub use page::{PageData, PaginationPatch, PaginationQuery, DEFAULT_PAGE_SIZE};
pub use token::{RequestToken, Settled, TokenSlot};
pub use value::{AsyncValuable, Valuable};
