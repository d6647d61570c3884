//! Minimal line templates in the `{{.Field}}` style.
//!
//! A template is literal text interleaved with actions. Supported actions:
//!
//! - `{{.Name}}` inserts the value of field `Name`
//! - `{{/* ... */}}` is a comment and renders nothing
//! - `{{- ` and ` -}}` trim whitespace from the text before/after the action
//!
//! Only bare field references are accepted. Pipelines, functions and
//! control actions (`{{.TimeSpend | printf "%5d"}}`, `{{if ...}}`) are
//! rejected at parse time with [`TemplateError::UnsupportedAction`], so a
//! format written for a full Go template engine must drop them first.
//!
//! Parsing happens once; rendering walks the compiled segments and resolves
//! fields against a [`FieldSource`]. Field names are resolved at render
//! time, so an unknown name only fails when a line is rendered.

use thiserror::Error;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template: access:{line}: unclosed action")]
    UnclosedAction { line: usize },

    #[error("template: access:{line}: unclosed comment")]
    UnclosedComment { line: usize },

    #[error("template: access:{line}: missing value for command")]
    EmptyAction { line: usize },

    #[error("template: access:{line}: unsupported action {action:?}, expected a field reference like .Status")]
    UnsupportedAction { line: usize, action: String },

    #[error("template: access: can't evaluate field {name}")]
    UnknownField { name: String },
}

/// A value a template field resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value<'a> {
    Str(&'a str),
    Uint(u64),
}

/// Anything a template can pull named fields from.
pub trait FieldSource {
    fn field(&self, name: &str) -> Option<Value<'_>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Field(String),
}

/// Compiled template. Immutable once parsed, safe to share across threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;
        let mut trim_next_text = false;

        while let Some(open) = rest.find(OPEN) {
            let action_start = offset + open;
            let mut body = &rest[open + OPEN.len()..];

            // `{{- ` trims whitespace to the left.
            let mut trim_left = false;
            if let Some(after) = body.strip_prefix('-')
                && after.starts_with(|c: char| c.is_ascii_whitespace())
            {
                trim_left = true;
                body = after;
            }
            push_text(&mut segments, &rest[..open], trim_next_text, trim_left);

            let line = line_of(source, action_start);
            let (action, consumed, trim_right) = if body.trim_start().starts_with("/*") {
                split_comment(body).ok_or(TemplateError::UnclosedComment { line })?
            } else {
                split_action(body).ok_or(TemplateError::UnclosedAction { line })?
            };

            if let Some(action) = action {
                segments.push(Segment::Field(parse_field(action, line)?));
            }

            let used = rest.len() - body.len() + consumed;
            offset += used;
            rest = &rest[used..];
            trim_next_text = trim_right;
        }
        push_text(&mut segments, rest, trim_next_text, false);

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The text this template was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Field names referenced by the template, in order of appearance.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field(name) => Some(name.as_str()),
            Segment::Text(_) => None,
        })
    }

    /// Render into `out`. On error, whatever was rendered before the
    /// failing action stays in `out`.
    pub fn render<S: FieldSource + ?Sized>(
        &self,
        src: &S,
        out: &mut String,
    ) -> Result<(), TemplateError> {
        let mut num = itoa::Buffer::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Field(name) => match src.field(name) {
                    Some(Value::Str(s)) => out.push_str(s),
                    Some(Value::Uint(n)) => out.push_str(num.format(n)),
                    None => {
                        return Err(TemplateError::UnknownField { name: name.clone() });
                    }
                },
            }
        }
        Ok(())
    }
}

fn push_text(segments: &mut Vec<Segment>, text: &str, trim_leading: bool, trim_trailing: bool) {
    let text = if trim_leading { text.trim_start() } else { text };
    let text = if trim_trailing { text.trim_end() } else { text };
    if !text.is_empty() {
        segments.push(Segment::Text(text.to_string()));
    }
}

/// Split an action body at its closing delimiter.
///
/// Returns the trimmed action text, bytes consumed (delimiter included) and
/// whether a ` -}}` right-trim marker was present.
fn split_action(body: &str) -> Option<(Option<&str>, usize, bool)> {
    let close = body.find(CLOSE)?;
    let inner = &body[..close];
    let (inner, trim_right) = strip_right_trim(inner);
    Some((Some(inner.trim()), close + CLOSE.len(), trim_right))
}

/// Like [`split_action`] for `/* ... */` comments, which may contain `}}`.
fn split_comment(body: &str) -> Option<(Option<&str>, usize, bool)> {
    let start = body.find("/*")?;
    let end = start + body[start..].find("*/")? + 2;
    let tail = &body[end..];
    let close = tail.find(CLOSE)?;
    let (between, trim_right) = strip_right_trim(&tail[..close]);
    if !between.trim().is_empty() {
        return None;
    }
    Some((None, end + close + CLOSE.len(), trim_right))
}

fn strip_right_trim(inner: &str) -> (&str, bool) {
    match inner.strip_suffix('-') {
        Some(before) if before.ends_with(|c: char| c.is_ascii_whitespace()) => (before, true),
        _ => (inner, false),
    }
}

fn parse_field(action: &str, line: usize) -> Result<String, TemplateError> {
    if action.is_empty() {
        return Err(TemplateError::EmptyAction { line });
    }
    let name = action.strip_prefix('.').filter(|name| is_identifier(name));
    match name {
        Some(name) => Ok(name.to_string()),
        None => Err(TemplateError::UnsupportedAction {
            line,
            action: action.to_string(),
        }),
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}
