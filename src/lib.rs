// basics - profile pages with like counters, admin list views and delete signals

// Model metadata and storage
pub mod schema;
pub mod models;
pub mod database;
pub mod orm;

// Lifecycle signals and admin registrations
pub mod signals;
pub mod admin;

// HTTP surface
pub mod extract;
pub mod routes;
pub mod app_state;
pub mod config;

// Common utilities
pub mod error;

// Re-exports for convenience
pub use error::{AppError, AppResult};
