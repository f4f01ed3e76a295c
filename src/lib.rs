pub mod app;
pub mod catalog;
pub mod collaborators;
pub mod config;
pub mod env_flags;
pub mod favorites;
pub mod materialize;
pub mod model;
pub mod orchestrator;
pub mod probe;
pub mod progress;
pub mod surface;
pub mod terminal;
