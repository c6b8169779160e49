//! Front matter parsing from markdown files.
//!
//! A page starts with an optional YAML header fenced by `---` lines:
//!
//! ```text
//! ---
//! title: Hello
//! date: 2024-01-05
//! abstract: A first post.
//! ---
//! # Hello
//! World
//! ```

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrontMatterError {
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid date {0:?} (expected YYYY-MM-DD or an RFC 3339 timestamp)")]
    InvalidDate(String),
}

/// Recognized front matter fields. Everything else lands in `extra`.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FrontMatter {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date: Option<DateField>,
    #[serde(default, rename = "abstract")]
    pub summary: Option<String>,
    #[serde(default)]
    pub draft: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Raw `date` value. YAML may hand us a quoted or unquoted string, or a
/// bare number for odd inputs like `date: 2024`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DateField {
    Text(String),
    Number(i64),
}

impl FrontMatter {
    /// Parse the declared publication date, if any.
    pub fn publication_date(&self) -> Result<Option<NaiveDate>, FrontMatterError> {
        match &self.date {
            None => Ok(None),
            Some(DateField::Text(raw)) => parse_date(raw).map(Some),
            Some(DateField::Number(n)) => Err(FrontMatterError::InvalidDate(n.to_string())),
        }
    }
}

/// Result of splitting a source file.
#[derive(Debug)]
pub struct Parsed<'a> {
    pub front_matter: FrontMatter,
    pub body: &'a str,
}

/// Why a header could not be used.
#[derive(Debug)]
pub struct HeaderError {
    pub error: FrontMatterError,
    /// Whether the raw header declares a `date:` key. Dated pages cannot
    /// fall back to empty front matter.
    pub declares_date: bool,
    /// Body following the broken header.
    pub body_offset: usize,
}

static FRONTMATTER_REGEX: OnceLock<Regex> = OnceLock::new();
static DATE_KEY_REGEX: OnceLock<Regex> = OnceLock::new();

fn frontmatter_regex() -> &'static Regex {
    FRONTMATTER_REGEX.get_or_init(|| {
        Regex::new(r"(?s)\A\u{feff}?---[ \t]*\r?\n(?:(.*?)\r?\n)?---[ \t]*(?:\r?\n|\z)")
            .expect("front matter pattern is valid")
    })
}

fn date_key_regex() -> &'static Regex {
    DATE_KEY_REGEX
        .get_or_init(|| Regex::new(r"(?m)^date\s*:").expect("date key pattern is valid"))
}

/// Split a markdown source into front matter and body.
///
/// A file without a header yields default front matter and the whole file
/// as body. A header that is present but does not parse is reported as a
/// [`HeaderError`] so the caller can decide whether to tolerate it.
pub fn parse_front_matter(content: &str) -> Result<Parsed<'_>, HeaderError> {
    let Some(captures) = frontmatter_regex().captures(content) else {
        return Ok(Parsed {
            front_matter: FrontMatter::default(),
            body: content,
        });
    };

    let whole = captures.get(0).map_or(0..0, |m| m.range());
    let yaml = captures.get(1).map_or("", |m| m.as_str());
    let body = &content[whole.end..];

    let front_matter = if yaml.trim().is_empty() {
        Ok(FrontMatter::default())
    } else {
        serde_yaml::from_str::<FrontMatter>(yaml).map_err(FrontMatterError::from)
    };

    let front_matter = front_matter.and_then(|fm| {
        // Surface date problems together with YAML problems so the caller
        // applies one tolerance rule to both.
        fm.publication_date().map(|_| fm)
    });

    match front_matter {
        Ok(front_matter) => Ok(Parsed { front_matter, body }),
        Err(error) => Err(HeaderError {
            error,
            declares_date: date_key_regex().is_match(yaml),
            body_offset: whole.end,
        }),
    }
}

/// Parse a date string into a calendar date.
///
/// Accepts `YYYY-MM-DD` and RFC 3339 timestamps; the time of day is dropped.
pub fn parse_date(raw: &str) -> Result<NaiveDate, FrontMatterError> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .map_err(|_| FrontMatterError::InvalidDate(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_header() {
        let content = "---\ntitle: \"Hello\"\ndate: 2024-01-05\nabstract: First post\n---\n# Hello\nWorld";
        let parsed = parse_front_matter(content).unwrap();
        let fm = parsed.front_matter;

        assert_eq!(fm.title.as_deref(), Some("Hello"));
        assert_eq!(fm.summary.as_deref(), Some("First post"));
        assert_eq!(
            fm.publication_date().unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 5)
        );
        assert_eq!(parsed.body, "# Hello\nWorld");
    }

    #[test]
    fn missing_header_keeps_whole_body() {
        let content = "# Just markdown\n\nNo header here.";
        let parsed = parse_front_matter(content).unwrap();
        assert!(parsed.front_matter.title.is_none());
        assert!(parsed.front_matter.date.is_none());
        assert_eq!(parsed.body, content);
    }

    #[test]
    fn unknown_fields_pass_through() {
        let content = "---\ntitle: T\ntags: [a, b]\nlayout: wide\n---\nbody";
        let fm = parse_front_matter(content).unwrap().front_matter;
        assert!(fm.extra.contains_key("tags"));
        assert!(fm.extra.contains_key("layout"));
        assert!(!fm.extra.contains_key("title"));
    }

    #[test]
    fn empty_header_is_default() {
        let parsed = parse_front_matter("---\n---\nbody").unwrap();
        assert!(parsed.front_matter.title.is_none());
        assert_eq!(parsed.body, "body");
    }

    #[test]
    fn closing_fence_must_start_a_line() {
        let content = "---\ntitle: wait---\n---\nbody";
        let parsed = parse_front_matter(content).unwrap();
        assert_eq!(parsed.front_matter.title.as_deref(), Some("wait---"));
        assert_eq!(parsed.body, "body");
    }

    #[test]
    fn draft_flag_defaults_to_false() {
        let fm = parse_front_matter("---\ntitle: T\n---\n").unwrap().front_matter;
        assert!(!fm.draft);
        let fm = parse_front_matter("---\ndraft: true\n---\n").unwrap().front_matter;
        assert!(fm.draft);
    }

    #[test]
    fn broken_yaml_without_date_reports_tolerable_error() {
        let content = "---\ntitle: [unclosed\n---\nBody text";
        let err = parse_front_matter(content).unwrap_err();
        assert!(!err.declares_date);
        assert_eq!(&content[err.body_offset..], "Body text");
    }

    #[test]
    fn broken_yaml_with_date_is_flagged() {
        let content = "---\ntitle: [unclosed\ndate: 2024-01-05\n---\nBody";
        let err = parse_front_matter(content).unwrap_err();
        assert!(err.declares_date);
    }

    #[test]
    fn invalid_date_is_flagged() {
        let err = parse_front_matter("---\ndate: yesterday\n---\n").unwrap_err();
        assert!(err.declares_date);
        assert!(matches!(err.error, FrontMatterError::InvalidDate(_)));
    }

    #[test]
    fn parse_date_accepts_timestamps() {
        assert_eq!(
            parse_date("2024-01-05T18:30:00+01:00").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
        );
        assert_eq!(
            parse_date(" 2023-12-31 ").unwrap(),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
        );
    }

    #[test]
    fn crlf_header() {
        let content = "---\r\ntitle: Windows\r\n---\r\nBody";
        let parsed = parse_front_matter(content).unwrap();
        assert_eq!(parsed.front_matter.title.as_deref(), Some("Windows"));
        assert_eq!(parsed.body, "Body");
    }
}
