// community-api: Async Rust client for the Community services platform API

pub mod client;
pub mod error;
mod resources;
pub mod transport;
pub mod types;

pub use client::ApiClient;
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
