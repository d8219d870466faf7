// Application layer - Editing use cases and the collaborators they depend on
pub mod config_store;
pub mod dashboard_editor;
pub mod data_source;
