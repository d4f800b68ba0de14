//! HTTP surface: the `/api/ask` endpoint and its supporting routes

mod routes;
mod server;

pub use routes::{ErrorBody, HealthResponse, router};
pub use server::{AppState, run};
