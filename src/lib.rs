//! Photo and video sharing for a single event.
//!
//! Guests upload through [`client::UploadSession`]; the axum service in
//! [`server`] stores each file in a [`storage::BlobStore`] and records it in a
//! [`database::MetadataStore`].

pub mod auth;
pub mod client;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod server;
pub mod state;
pub mod storage;
pub mod utils;

pub use config::Config;
pub use models::{MediaType, PhotoRecord};
pub use server::build_router;
pub use state::AppState;
