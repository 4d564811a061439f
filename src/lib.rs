//! Document upload service for the admin panel and the client-side registry
//! that mirrors it.

pub mod client;
pub mod config;
pub mod errors;
pub mod models;
pub mod routes;
pub mod storage;
