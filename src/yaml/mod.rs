//! YAML handling: syntax diagnostics for input and store documents

pub mod diagnostics;

pub use diagnostics::YamlSyntaxError;
