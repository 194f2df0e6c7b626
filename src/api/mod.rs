pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;
pub mod websocket;

pub use server::{start_api_server, ApiServer};
pub use types::ApiContext;
