//! sform: school management forms
//!
//! Declarative field schemas for school entities (teachers, students,
//! classes, lessons, ...), a validation engine that reports every problem at
//! once, a form session state machine that guards submission, and a
//! submission adapter in front of a pluggable persistence collaborator.

pub mod cli;
pub mod core;
pub mod schema;
pub mod yaml;
