//! Command implementations for the Quill CLI.

pub mod event_renderer;
pub mod models;
pub mod research;
