//! Request extractors shared by handlers.

pub mod agent;
pub mod json;
