// Public API for integration tests and the server binary

pub mod api;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod store;
pub mod types;
pub mod util;
