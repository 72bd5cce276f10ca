//! HTTP API.
//!
//! ## Endpoints
//!
//! - `POST /chat` - Send `{"message": ..., "model"?: ...}`, receive the agent's answer as a JSON string
//! - `GET /api/health` - Health check

mod routes;
pub mod types;

pub use routes::{router, serve, ApiError, AppState};
