//! Template helpers
//!
//! Helpers are section tags whose name resolves to a function instead of a
//! value: `{{#truncate}}40|{{project.name}}{{/truncate}}`. Each receives the
//! raw inner text and a callback that renders text against the current
//! context, so arguments may contain variables.

use std::fmt::Write as _;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

use super::context::TemplateContext;
use crate::error::Result;

const ELLIPSIS: &str = "...";

#[derive(Debug, Error)]
#[error("{0}")]
pub struct HelperError(String);

impl HelperError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Callback that renders text against the caller's context.
pub type RenderFn<'a> = &'a dyn Fn(&str) -> Result<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Helper {
    /// `{{#format_date}}%Y-%m-%d|2024-05-01T10:00:00Z{{/format_date}}`
    FormatDate,
    /// `{{#truncate}}20|long text{{/truncate}}`
    Truncate,
    /// `{{#highlight_code}}rust|fn main() {}{{/highlight_code}}`
    HighlightCode,
}

pub const HELPERS: &[Helper] = &[Helper::FormatDate, Helper::Truncate, Helper::HighlightCode];

impl Helper {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FormatDate => "format_date",
            Self::Truncate => "truncate",
            Self::HighlightCode => "highlight_code",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        HELPERS.iter().copied().find(|h| h.name() == name)
    }

    pub fn call(
        &self,
        raw: &str,
        render: RenderFn<'_>,
        context: &TemplateContext,
    ) -> std::result::Result<String, HelperError> {
        let text = render(raw).map_err(|e| HelperError::new(e.to_string()))?;
        match self {
            Self::FormatDate => format_date(text.trim(), context),
            Self::Truncate => truncate(text.trim()),
            Self::HighlightCode => Ok(highlight_code(&text)),
        }
    }
}

fn format_date(text: &str, context: &TemplateContext) -> std::result::Result<String, HelperError> {
    let (pattern, value) = match text.rsplit_once('|') {
        Some((pattern, value)) => (pattern, value.trim()),
        None => (text, ""),
    };
    if pattern.is_empty() {
        return Err(HelperError::new("missing date format before '|'"));
    }

    let datetime = if value.is_empty() {
        let now = context
            .value("now.iso")
            .and_then(|v| v.as_str())
            .ok_or_else(|| HelperError::new("no date given and no current time in context"))?;
        parse_datetime(now)?
    } else {
        parse_datetime(value)?
    };

    let mut out = String::new();
    write!(out, "{}", datetime.format(pattern))
        .map_err(|_| HelperError::new(format!("invalid date format '{}'", pattern)))?;
    Ok(out)
}

/// RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD` or epoch seconds.
fn parse_datetime(value: &str) -> std::result::Result<DateTime<FixedOffset>, HelperError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt);
    }
    let utc = FixedOffset::east_opt(0).ok_or_else(|| HelperError::new("invalid UTC offset"))?;
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(seconds) = value.parse::<i64>() {
        if let Some(dt) = DateTime::<Utc>::from_timestamp(seconds, 0) {
            return Ok(dt.fixed_offset());
        }
    }
    Err(HelperError::new(format!("cannot parse '{}' as a date", value)))
}

fn truncate(text: &str) -> std::result::Result<String, HelperError> {
    let (max, body) = text
        .split_once('|')
        .ok_or_else(|| HelperError::new("expected 'length|text'"))?;
    let max: usize = max
        .trim()
        .parse()
        .map_err(|_| HelperError::new(format!("'{}' is not a length", max.trim())))?;
    let body = body.trim();

    if body.chars().count() <= max {
        return Ok(body.to_string());
    }
    if max < ELLIPSIS.len() {
        return Ok(body.chars().take(max).collect());
    }
    let kept: String = body.chars().take(max - ELLIPSIS.len()).collect();
    Ok(format!("{}{}", kept.trim_end(), ELLIPSIS))
}

/// No highlighter is bundled, so this always emits a fenced block.
fn highlight_code(text: &str) -> String {
    let (lang, code) = match text.split_once('|') {
        Some((lang, code)) if !lang.contains('\n') => (lang.trim(), code),
        _ => ("", text),
    };
    format!("```{}\n{}\n```", lang, code.trim_matches('\n'))
}
