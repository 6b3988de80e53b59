pub mod routes;

// Re-export route handlers for convenience
pub use routes::app;
pub use routes::subscriptions;
pub use routes::transactions;
pub use routes::upload;
