//! Session state for the client
//!
//! This module handles:
//! - Session model (messages, active turn, permission state)
//! - Session store owned by the engine
//! - Permission modes and denial tracking

mod permission;
#[allow(clippy::module_inception)]
mod session;
mod store;

pub use permission::PermissionMode;
pub use session::Session;
pub use store::SessionStore;
