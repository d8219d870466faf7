// Domain layer - Widget configuration model, pure and I/O free
pub mod dashboard;
pub mod error;
pub mod geometry;
pub mod path_mutator;
pub mod reference;
pub mod registry;
pub mod widget;
