//! Request and Response models for the cache server API
//!
//! DTOs shared by the server handlers and the HTTP client for
//! serializing/deserializing request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::SetRequest;
pub use responses::{
    ClearResponse, DeleteResponse, ErrorResponse, GetResponse, HealthResponse, SetResponse,
    StatsResponse,
};
