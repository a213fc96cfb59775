//! Account authentication and recovery.
//!
//! The flows are explicit pipelines over two seams: [`store::AccountStore`]
//! for persistence and [`crate::api::email::EmailSender`] for delivery.
//! Handlers receive both as `Arc<dyn _>` extensions.

pub mod login;
pub mod password;
pub mod recovery;
pub mod register;
pub mod session;
pub mod state;
pub mod store;
pub mod types;
pub(crate) mod utils;

pub use state::AuthConfig;
pub use store::{DynAccountStore, MemoryAccountStore, PgAccountStore};
