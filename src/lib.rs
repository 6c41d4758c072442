pub mod allocator;
pub mod cleanup;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod ratelimit;
pub mod routes;
pub mod services;
pub mod store;
pub mod tcp;
pub mod validation;

#[cfg(feature = "reqwest")]
pub mod client;
