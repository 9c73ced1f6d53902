pub mod constants;
pub mod engine;
pub mod error;
pub mod ranking_store;
pub mod registry;
pub mod rng;
pub mod server_protocol;
pub mod server_utils;
pub mod types;
pub mod world;
