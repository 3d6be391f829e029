// Rubyan - social-networking backend over a property-graph store.

// Graph store: nodes, typed directed edges, filtered lookups, traversal.
pub mod graph;

// Domain model and read-side view assembly.
pub mod models;
pub mod views;

// Services: identity, social graph, content.
pub mod services;

// Auth gate and credential primitives.
pub mod auth;
pub mod security;

// HTTP surface.
pub mod routes;

// Common utilities
pub mod app_state;
pub mod cache;
pub mod config;
pub mod error;

// Re-exports for convenience
pub use error::{AppError, AppResult};
