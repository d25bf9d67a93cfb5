pub mod config;
mod http_layers;
pub mod metrics;
pub mod server;
mod similarity_routes;
pub mod state;

pub use config::ServerConfig;
pub use http_layers::*;
pub use server::{make_app, run_server};
