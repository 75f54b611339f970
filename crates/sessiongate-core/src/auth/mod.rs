//! Authentication module for managing credentials and login workflows.
//!
//! This module provides:
//! - `CredentialStore`: durable access token, refresh token and expiry
//! - `LoginFlight`: the single-login-at-a-time handle
//! - `SessionOrchestrator`: login with retry, re-authentication, logout
//! - `IdentityProfile`: identity attributes saved alongside the credential
//!
//! Session state (`Anonymous`, `Active`, `Expired`) is always derived from
//! the stored credential, never cached.

pub mod credentials;
pub mod error;
pub mod flight;
pub mod profile;
pub mod session;

pub use credentials::{Credential, CredentialStore, SessionState};
pub use error::{LoginFailureKind, SessionError, INVALID_IDENTITY_CODE};
pub use flight::{FlightGuard, FlightStatus, LoginFlight, LoginFlow};
pub use profile::IdentityProfile;
pub use session::{LoginOutcome, SessionOrchestrator, SessionSettings};
