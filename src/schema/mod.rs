//! Schema system - field descriptors, registry, validation, templates and prompts

pub mod field;
pub mod registry;
pub mod template;
pub mod validator;
pub mod wizard;

pub use field::{FieldDescriptor, FieldKind, FieldMessages};
pub use registry::{
    CrossFieldRule, CustomRule, EntitySchema, RuleCheck, SchemaError, SchemaRegistry,
};
pub use template::{TemplateContext, TemplateError, TemplateGenerator};
pub use validator::{check_field, validate, FieldErrors, RelationCandidates, Validator, FORM_KEY};
pub use wizard::{FormWizard, WizardOutcome};
