//! Penguin Workshop - local image backend, API client and theme icons

pub mod api;
pub mod config;
pub mod constants;
pub mod error;
pub mod icons;
pub mod migrate;
pub mod server;
pub mod store;
pub mod types;
pub mod utils;
