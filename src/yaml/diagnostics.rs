//! Source-annotated diagnostics for malformed YAML documents

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// YAML syntax error pointing at the offending location
#[derive(Debug, Error, Diagnostic)]
#[error("YAML syntax error: {message}")]
#[diagnostic(code(sform::yaml::syntax))]
pub struct YamlSyntaxError {
    #[source_code]
    src: NamedSource<String>,

    #[label("here")]
    span: SourceSpan,

    #[help]
    help: Option<String>,

    message: String,
}

impl YamlSyntaxError {
    pub fn from_serde_error(err: &serde_yml::Error, source: &str, filename: &str) -> Self {
        let (line, column) = err
            .location()
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((1, 1));
        let message = err.to_string();
        Self::at(message, source, filename, line, column)
    }

    /// Error at a 1-based line and column
    pub fn at(
        message: impl Into<String>,
        source: &str,
        filename: &str,
        line: usize,
        column: usize,
    ) -> Self {
        let message = message.into();
        let offset = offset_of(source, line, column);
        Self {
            src: NamedSource::new(filename, source.to_string()),
            span: SourceSpan::from(offset..offset.saturating_add(1).min(source.len().max(1))),
            help: suggest(&message),
            message,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Byte offset of a 1-based line/column, clamped to the source
fn offset_of(source: &str, line: usize, column: usize) -> usize {
    let line_start = source
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum::<usize>();
    let Some(rest) = source.get(line_start..) else {
        return source.len();
    };
    let line_text = rest.split('\n').next().unwrap_or_default();
    let within = line_text
        .char_indices()
        .nth(column.saturating_sub(1))
        .map_or(line_text.len(), |(i, _)| i);
    line_start + within
}

fn suggest(message: &str) -> Option<String> {
    let lower = message.to_lowercase();

    let hint = if lower.contains("tab") {
        "indent with spaces; YAML does not allow tabs"
    } else if lower.contains("duplicate") {
        "each field may only appear once in a form document"
    } else if lower.contains("mapping values are not allowed") {
        "add a space after ':' or quote the value"
    } else if lower.contains("found unexpected ':'") {
        "values containing ':' must be quoted"
    } else if lower.contains("did not find expected") || lower.contains("block end") {
        "check that nested keys share the same indentation"
    } else if lower.contains('@') || lower.contains('`') {
        "quote values that start with special characters"
    } else {
        return None;
    };
    Some(hint.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_of() {
        let source = "name: a\nemail: b\nphone: c";
        assert_eq!(offset_of(source, 1, 1), 0);
        assert_eq!(offset_of(source, 2, 1), 8);
        assert_eq!(offset_of(source, 2, 8), 15);
        assert_eq!(offset_of(source, 9, 1), source.len());
    }

    #[test]
    fn test_suggestions() {
        assert!(suggest("found a tab character").is_some());
        assert!(suggest("duplicate entry with key \"email\"").is_some());
        assert!(suggest("something else").is_none());
    }

    #[test]
    fn test_from_serde_error_keeps_message() {
        let source = "username: [jd\nemail: x\n";
        let err = serde_yml::from_str::<serde_yml::Value>(source).unwrap_err();
        let diag = YamlSyntaxError::from_serde_error(&err, source, "teacher.yaml");
        assert!(!diag.message().is_empty());
    }
}
