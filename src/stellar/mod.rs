pub mod client;
pub mod config;
pub mod envelope;
pub mod types;

pub use client::{Horizon, StellarClient};
pub use config::NetworkConfig;
