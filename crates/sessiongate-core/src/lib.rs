//! Sessiongate core - session and request layer for a mobile client.
//!
//! The crate keeps a persisted bearer credential, routes every backend call
//! through one gateway that holds requests back while a login is running,
//! drives the login/logout workflows against an external identity provider
//! and decides which pages a user may open.
//!
//! Hosts plug their UI, navigation stack and identity provider in through
//! the traits in [`host`], then talk to an [`App`].

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod host;
pub mod nav;
pub mod storage;
pub mod utils;

#[cfg(test)]
mod testing;

pub use api::{ApiError, RequestSpec, ReqwestTransport, Transport};
pub use app::App;
pub use auth::{Credential, IdentityProfile, LoginOutcome, SessionError, SessionState};
pub use config::Config;
pub use host::{ConfirmDialog, Host, IdentityError, IdentityProvider, Navigator, Prompter};
pub use nav::{Decision, Navigation, NavigationKind};
pub use storage::{FileStorage, KeyringStorage, MemoryStorage, Storage};
