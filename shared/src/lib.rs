//! Shared library for the account update function.
//!
//! This crate provides the payload resolution, identifier derivation, Appwrite
//! client and update orchestration used by every runtime entry point.

pub mod appwrite;
pub mod config;
pub mod error;
pub mod http;
pub mod identifier;
pub mod models;
pub mod orchestrator;
pub mod payload;

pub use appwrite::AppwriteClient;
pub use config::Config;
pub use error::{Error, Result};
pub use identifier::{login_identifier, phone_digits, PHONE_LOGIN_SUFFIX};
pub use models::{AccountPatch, ProfilePatch, UpdateRequest, UpdateResult};
pub use orchestrator::{AccountUpdater, Backend};
pub use payload::{EnvVarSource, EventSource, FnSource, PayloadResolver, PayloadSource, StreamSource};
