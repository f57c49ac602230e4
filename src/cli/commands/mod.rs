//! Command implementations

pub mod completions;
pub mod fill;
pub mod schema;
pub mod submit;
pub mod template;
pub mod validate;
