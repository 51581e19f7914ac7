// Library crate shared by the binary and the integration tests.

pub mod activity;
pub mod assembler;
pub mod config;
pub mod credits;
pub mod engine;
pub mod error;
pub mod export;
pub mod model;
pub mod progress;
pub mod result;
pub mod routes;
pub mod server;
pub mod settings;
pub mod state;
pub mod store;
pub mod submission;
