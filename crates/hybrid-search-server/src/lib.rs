//! HTTP surface for the hybrid code search service: wires
//! [`hybrid_search_core`] into an axum [`axum::Router`].

pub mod context;
pub mod error;
pub mod routes;
pub mod telemetry;
