//! Interactive form driver
//!
//! Prompts for each field of a [`FormSession`], re-asking while a field is in
//! error, then submits and walks the user through any remaining problems.

use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Password, Select};
use miette::{IntoDiagnostic, Result};
use std::path::Path;

use crate::core::input::{attach_file, InputError};
use crate::core::session::{FormSession, SessionState};
use crate::core::submission::{Persistence, SubmissionAdapter, SubmitReceipt};
use crate::core::value::RawValue;
use crate::schema::field::{FieldDescriptor, FieldKind};
use crate::schema::validator::{self, FORM_KEY};

const LEAVE_EMPTY: &str = "(leave empty)";

/// How an interactive session ended
#[derive(Debug)]
pub enum WizardOutcome {
    Submitted(SubmitReceipt),
    Aborted,
}

/// Dialoguer front end for a form session
pub struct FormWizard {
    theme: ColorfulTheme,
}

impl FormWizard {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }

    /// Fill and submit a session until it is submitted or the user gives up
    pub fn run<P: Persistence>(
        &self,
        session: &mut FormSession,
        adapter: &SubmissionAdapter<P>,
    ) -> Result<WizardOutcome> {
        println!();
        println!(
            "{} {} {}",
            style("◆").cyan(),
            style(session.mode()).bold(),
            style(session.schema().title()).bold()
        );
        if let Some(id) = session.entity_id() {
            println!("  {}", style(id).dim());
        }
        println!("{}", style("─".repeat(50)).dim());

        let all: Vec<String> = session.schema().field_names().map(String::from).collect();
        let mut pending = all.clone();

        loop {
            for name in &pending {
                self.prompt_until_clean(session, name)?;
            }

            match session.submit(adapter)? {
                SessionState::Submitted => {
                    let receipt = session
                        .receipt()
                        .cloned()
                        .ok_or_else(|| miette::miette!("submission finished without a receipt"))?;
                    println!();
                    println!(
                        "{} Saved {}",
                        style("✓").green(),
                        style(&receipt.entity_id).cyan()
                    );
                    return Ok(WizardOutcome::Submitted(receipt));
                }
                SessionState::Invalid => {
                    print_errors(session);
                    let in_error: Vec<String> = session
                        .errors()
                        .fields()
                        .filter(|f| *f != FORM_KEY)
                        .map(String::from)
                        .collect();
                    // Rule failures name no single field, so revisit the whole form
                    pending = if in_error.is_empty() {
                        all.clone()
                    } else {
                        in_error
                    };
                }
                SessionState::SubmitFailed => {
                    println!(
                        "{} {}",
                        style("✗").red(),
                        session.submit_error().unwrap_or("submission failed")
                    );
                    let retry = Confirm::with_theme(&self.theme)
                        .with_prompt("Try again?")
                        .default(true)
                        .interact()
                        .into_diagnostic()?;
                    if !retry {
                        session.abort()?;
                        return Ok(WizardOutcome::Aborted);
                    }
                    pending = Vec::new();
                }
                state => {
                    return Err(miette::miette!("unexpected form state: {}", state));
                }
            }
        }
    }

    fn prompt_until_clean(&self, session: &mut FormSession, name: &str) -> Result<()> {
        let Some(field) = session.schema().field(name).cloned() else {
            return Ok(());
        };
        loop {
            let current = session.value(name).map(RawValue::display_text);
            match self.prompt_field(session, &field, current)? {
                Some(raw) => session.set_field(name, raw)?,
                None => session.clear_field(name)?,
            }
            let value = session.value(name);
            let Err(messages) =
                validator::check_field(&field, value, session.mode(), session.candidates())
            else {
                return Ok(());
            };
            for message in &messages {
                println!("  {} {}", style("✗").red(), style(message).red());
            }
        }
    }

    fn prompt_field(
        &self,
        session: &FormSession,
        field: &FieldDescriptor,
        current: Option<String>,
    ) -> Result<Option<RawValue>> {
        let prompt = format_prompt(field);
        let optional = !field.required || (field.is_file() && session.entity_id().is_some());

        let choices: Option<Vec<String>> = match &field.kind {
            FieldKind::Enum { values } => Some(values.clone()),
            FieldKind::Relation { .. } => session
                .candidates()
                .for_field(&field.name)
                .filter(|ids| !ids.is_empty())
                .map(|ids| ids.iter().cloned().collect()),
            _ => None,
        };

        if let Some(mut items) = choices {
            if optional {
                items.insert(0, LEAVE_EMPTY.to_string());
            }
            let default = current
                .as_deref()
                .and_then(|c| items.iter().position(|i| i == c))
                .unwrap_or(0);
            let selection = Select::with_theme(&self.theme)
                .with_prompt(&prompt)
                .items(&items)
                .default(default)
                .interact()
                .into_diagnostic()?;
            return Ok(answer_to_raw(field, &items[selection], Path::new("."))?);
        }

        let answer = if matches!(field.kind, FieldKind::Password) {
            let keep_current = current.is_some();
            let answer = Password::with_theme(&self.theme)
                .with_prompt(&prompt)
                .allow_empty_password(optional || keep_current)
                .interact()
                .into_diagnostic()?;
            // An empty answer keeps the stored password
            if answer.is_empty() {
                return Ok(current.map(RawValue::Text));
            }
            answer
        } else {
            let current = current.filter(|c| !c.is_empty());
            loop {
                let mut input = Input::<String>::with_theme(&self.theme)
                    .with_prompt(&prompt)
                    .allow_empty(true);
                if let Some(current) = &current {
                    input = input.with_initial_text(current);
                }
                let answer = input.interact_text().into_diagnostic()?;
                match answer_to_raw(field, &answer, Path::new(".")) {
                    Ok(raw) => return Ok(raw),
                    // Unreadable upload paths are asked again
                    Err(e) => println!("  {} {}", style("✗").red(), style(e).red()),
                }
            }
        };

        Ok(answer_to_raw(field, &answer, Path::new("."))?)
    }
}

impl Default for FormWizard {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn a typed answer into a raw value; blank means "clear"
fn answer_to_raw(
    field: &FieldDescriptor,
    answer: &str,
    base_dir: &Path,
) -> Result<Option<RawValue>, InputError> {
    if answer == LEAVE_EMPTY || answer.trim().is_empty() {
        return Ok(None);
    }
    if field.is_file() {
        return attach_file(&field.name, &base_dir.join(answer.trim())).map(Some);
    }
    Ok(Some(RawValue::Text(answer.to_string())))
}

fn format_prompt(field: &FieldDescriptor) -> String {
    let hint = field.hint();
    let mut prompt = field.label();
    if !hint.is_empty() {
        prompt = format!("{} ({})", prompt, style(hint).dim());
    }
    if !field.required {
        prompt = format!("{} {}", prompt, style("[optional]").dim());
    }
    prompt
}

fn print_errors(session: &FormSession) {
    println!();
    println!(
        "{} {} field(s) need attention",
        style("!").yellow(),
        session.errors().len()
    );
    for (field, messages) in session.errors().iter() {
        let label = session
            .schema()
            .field(field)
            .map(FieldDescriptor::label)
            .unwrap_or_else(|| "Form".to_string());
        for message in messages {
            println!("  {}: {}", style(&label).bold(), message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::EntityKind;

    #[test]
    fn test_blank_answers_clear_the_field() {
        let field = FieldDescriptor::text("address");
        assert_eq!(answer_to_raw(&field, "   ", Path::new(".")).unwrap(), None);
        assert_eq!(answer_to_raw(&field, LEAVE_EMPTY, Path::new(".")).unwrap(), None);
        assert_eq!(
            answer_to_raw(&field, " 5 Elm St ", Path::new(".")).unwrap(),
            Some(RawValue::text(" 5 Elm St "))
        );
    }

    #[test]
    fn test_file_answers_become_handles() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("photos")).unwrap();
        std::fs::write(tmp.path().join("photos/me.jpg"), [0u8; 4]).unwrap();

        let field = FieldDescriptor::file("img");
        let Ok(Some(RawValue::File(handle))) = answer_to_raw(&field, "photos/me.jpg", tmp.path())
        else {
            panic!("expected a file handle");
        };
        assert_eq!(handle.name, "me.jpg");
        assert_eq!(handle.content_type, "image/jpeg");
        assert_eq!(handle.size, Some(4));
    }

    #[test]
    fn test_missing_file_answer_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let field = FieldDescriptor::file("img");
        assert!(matches!(
            answer_to_raw(&field, "nope.png", tmp.path()),
            Err(InputError::MissingFile { .. })
        ));
    }

    #[test]
    fn test_prompt_mentions_constraints() {
        let field = FieldDescriptor::relation("grade", EntityKind::Grade).optional();
        let prompt = format_prompt(&field);
        assert!(prompt.contains("Grade"));
        assert!(prompt.contains("GRD-"));
        assert!(prompt.contains("[optional]"));
    }
}
