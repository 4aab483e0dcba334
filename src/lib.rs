pub mod actions;
pub mod assembler;
pub mod config;
pub mod errors;
pub mod http;
pub mod models;
pub mod seed;
pub mod server;
pub mod store;
