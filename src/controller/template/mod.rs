//! # Template Resolver
//!
//! Renders text patterns against an [`ObjectRecord`]. Used for the target file
//! path, the content selector, the property path and the callback body.
//!
//! ## Syntax
//!
//! Actions sit between `{{` and `}}` and are evaluated against the record:
//!
//! - Field chains: `.Name`, `.Namespace`, `.Labels.team`, `.Annotations.x`,
//!   `.Data.key`, `.StringData.key`, also reachable below `.ObjectMeta`
//! - Literals: `"text"`, `` `raw` ``, `42`
//! - Calls: `split`, `splitN`, `index`, `len`, `lower`, `upper`, `trim`,
//!   `eq`, `ne`, `not`
//! - Parentheses and `|` pipelines; the piped value becomes the last argument
//! - Variables: `$x := pipeline`, `$x = pipeline`, `$x`, `$.Name`
//! - Blocks: `if`, `with` and `range`, each with an optional `else` and closed
//!   by `end`; `with` and `range` move dot to the selected value
//! - `{{-` and `-}}` trim the surrounding whitespace
//!
//! A pattern without `{{` is returned verbatim. A key that a map does not
//! contain is an execution error, never an empty string.

mod exec;
mod functions;
mod parse;

use crate::controller::record::ObjectRecord;
use parse::Segment;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("failed to parse template {pattern:?}: {message}")]
    Parse { pattern: String, message: String },

    #[error("failed to execute template {pattern:?} against {object}: {message}")]
    Execute {
        pattern: String,
        object: String,
        message: String,
    },
}

/// A parsed pattern, reusable across records.
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
    reads_data: bool,
}

impl Template {
    pub fn parse(pattern: &str) -> Result<Self, TemplateError> {
        let segments = parse::parse(pattern).map_err(|message| TemplateError::Parse {
            pattern: pattern.to_string(),
            message,
        })?;
        let reads_data = parse::references_data(&segments);
        Ok(Self {
            source: pattern.to_string(),
            segments,
            reads_data,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn execute(&self, record: &ObjectRecord) -> Result<String, TemplateError> {
        exec::Scope::new(record, self.reads_data)
            .render(&self.segments)
            .map_err(|message| TemplateError::Execute {
                pattern: self.source.clone(),
                object: record.key(),
                message,
            })
    }
}

/// Whether `pattern` would be interpreted as a template.
pub fn is_template(pattern: &str) -> bool {
    pattern.contains("{{")
}

/// Parse and execute in one step.
pub fn render(pattern: &str, record: &ObjectRecord) -> Result<String, TemplateError> {
    if !is_template(pattern) {
        return Ok(pattern.to_string());
    }
    Template::parse(pattern)?.execute(record)
}

/// For non-critical text such as the callback body: failures log a warning and
/// render as an empty string.
pub fn render_or_empty(pattern: &str, record: &ObjectRecord) -> String {
    render(pattern, record).unwrap_or_else(|e| {
        warn!(secret = %record.key(), error = %e, "Template rendering failed, using empty value");
        String::new()
    })
}
