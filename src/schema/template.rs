//! Input skeletons for form documents, rendered with Tera

use rust_embed::Embed;
use serde::Serialize;
use std::collections::BTreeMap;
use tera::Tera;
use thiserror::Error;

use crate::core::identity::EntityId;
use crate::core::value::{FormMode, RawValue};
use crate::schema::registry::EntitySchema;

#[derive(Embed)]
#[folder = "templates/"]
struct EmbeddedTemplates;

const FORM_TEMPLATE: &str = "form.yaml.tera";

/// What a skeleton is being generated for
#[derive(Debug, Clone)]
pub struct TemplateContext {
    pub mode: FormMode,
    pub entity_id: Option<EntityId>,
    /// Values to pre-fill, e.g. the stored record for an update
    pub values: BTreeMap<String, RawValue>,
}

impl TemplateContext {
    pub fn create() -> Self {
        Self {
            mode: FormMode::Create,
            entity_id: None,
            values: BTreeMap::new(),
        }
    }

    pub fn update(entity_id: EntityId) -> Self {
        Self {
            mode: FormMode::Update,
            entity_id: Some(entity_id),
            values: BTreeMap::new(),
        }
    }

    pub fn with_values<I>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (String, RawValue)>,
    {
        self.values.extend(values);
        self
    }
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Template rendering error: {0}")]
    RenderError(String),
}

#[derive(Serialize)]
struct FieldSlot {
    name: String,
    label: String,
    required: bool,
    hint: String,
    /// YAML-quoted pre-filled value, empty when none
    value: String,
}

/// Template generator using Tera
pub struct TemplateGenerator {
    tera: Tera,
}

impl TemplateGenerator {
    /// Create a generator with the embedded templates
    pub fn new() -> Result<Self, TemplateError> {
        let mut tera = Tera::default();

        for file in EmbeddedTemplates::iter() {
            let filename = file.as_ref();
            if let Some(content) = EmbeddedTemplates::get(filename) {
                if let Ok(template_str) = std::str::from_utf8(&content.data) {
                    tera.add_raw_template(filename, template_str)
                        .map_err(|e| TemplateError::RenderError(e.to_string()))?;
                }
            }
        }

        Ok(Self { tera })
    }

    /// Render a form document skeleton for a schema
    pub fn render(
        &self,
        schema: &EntitySchema,
        ctx: &TemplateContext,
    ) -> Result<String, TemplateError> {
        if !self.tera.get_template_names().any(|n| n == FORM_TEMPLATE) {
            return Err(TemplateError::NotFound(FORM_TEMPLATE.to_string()));
        }

        let fields: Vec<FieldSlot> = schema
            .fields
            .iter()
            .map(|field| {
                let value = match ctx.values.get(&field.name) {
                    // Stored assets are kept unless replaced, so never echo them
                    Some(_) if field.is_file() => String::new(),
                    Some(raw) if !raw.is_blank() => quote(&raw.display_text()),
                    _ => String::new(),
                };
                FieldSlot {
                    name: field.name.clone(),
                    label: field.label(),
                    required: field.required
                        && !(field.is_file() && ctx.mode == FormMode::Update),
                    hint: field.hint(),
                    value,
                }
            })
            .collect();

        let command = match &ctx.entity_id {
            Some(id) => format!("update {} {} <file>", schema.entity, id),
            None => format!("create {} <file>", schema.entity),
        };

        let mut context = tera::Context::new();
        context.insert("title", &schema.title());
        context.insert("mode", &ctx.mode.to_string());
        context.insert(
            "entity_id",
            &ctx.entity_id.as_ref().map(ToString::to_string).unwrap_or_default(),
        );
        context.insert("command", &command);
        context.insert("fields", &fields);
        context.insert(
            "rules",
            &schema.rules.iter().map(|r| r.message.clone()).collect::<Vec<_>>(),
        );

        self.tera
            .render(FORM_TEMPLATE, &context)
            .map_err(|e| TemplateError::RenderError(e.to_string()))
    }
}

/// Double-quoted scalar; JSON string syntax is valid YAML
fn quote(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("'{}'", value.replace('\'', "''")))
}
