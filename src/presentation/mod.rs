// Presentation layer - HTTP surface over one editing session
pub mod app_state;
pub mod handlers;
