//! HTTP surface of the scheduler orchestrator.

pub mod auth;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;
