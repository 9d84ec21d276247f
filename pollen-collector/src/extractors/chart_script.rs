//! Recovery of chart series embedded in the historical report page
//!
//! The page ships its data as a JavaScript object literal passed to the
//! charting library, roughly:
//!
//! ```text
//! series: [{visible:false,name:'2019',data:[[Date.UTC(1972,3,1),12],[Date.UTC(1972,3,2),null]]}, ...]
//! ```
//!
//! That literal is not JSON. Recovery runs in four stages:
//!
//! 1. **marker** ([`locate_series`]): find `series:` followed by `[{` and cut
//!    the text at the bracket balancing the opening `[`
//! 2. **tokenizer** ([`tokenize`]): punctuation, identifiers, numbers, quoted
//!    strings and `Date.UTC(..)` calls
//! 3. **fix-ups** ([`to_json`]): date calls and single-quoted strings become
//!    JSON strings, bare object keys get quoted, trailing commas are dropped
//! 4. **decode** ([`decode_series`]): serde into [`ChartSeries`]
//!
//! [`series_to_counts`] then turns the decoded series into dated counts. The
//! year inside every date call is a fixed placeholder (1972); the real year is
//! the series name.

use chrono::NaiveDate;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::error::{IngestError, IngestResult};
use crate::types::HistoricalPollenCount;

const SERIES_MARKER: &str = "series:";
const DATE_CALL_PREFIX: &str = "Date.UTC(";

/// One decoded chart series (one year of data)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChartSeries {
    #[serde(default)]
    pub visible: Option<bool>,
    /// Year as text; numbers are accepted and rendered as text
    #[serde(deserialize_with = "name_as_text")]
    pub name: String,
    /// `(date call text, count)` pairs
    #[serde(default)]
    pub data: Vec<(String, Option<f64>)>,
}

fn name_as_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!("unexpected series name {}", other))),
    }
}

/// Extract every dated count from a report page, ascending by date
pub fn extract_series(page: &str) -> IngestResult<Vec<HistoricalPollenCount>> {
    let literal = locate_series(page)?;
    let tokens = tokenize(literal)?;
    let json = to_json(&tokens)?;
    let series = decode_series(&json)?;
    series_to_counts(&series)
}

/// Stage 1: the array literal following the `series:` marker
pub fn locate_series(page: &str) -> IngestResult<&str> {
    let mut search_from = 0;

    while let Some(offset) = page[search_from..].find(SERIES_MARKER) {
        let after_marker = search_from + offset + SERIES_MARKER.len();
        let rest = &page[after_marker..];
        let trimmed = rest.trim_start();
        let open = after_marker + (rest.len() - trimmed.len());

        if trimmed.starts_with('[') && trimmed[1..].trim_start().starts_with('{') {
            let close = balancing_bracket(page, open)?;
            return Ok(&page[open..=close]);
        }
        search_from = after_marker;
    }

    Err(IngestError::ScrapeFormat(
        "Chart series marker not found in page".to_string(),
    ))
}

/// Index of the `]` that balances the `[` at `open`, skipping quoted text
fn balancing_bracket(text: &str, open: usize) -> IngestResult<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in text[open..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => quote = Some(c),
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(open + i);
                }
            }
            _ => {}
        }
    }

    Err(IngestError::ScrapeFormat(
        "Chart series array is not terminated".to_string(),
    ))
}

/// Lexical unit of the series literal
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// One of `[ ] { } , :`
    Punct(char),
    Ident(String),
    /// Numeric literal, as written
    Number(String),
    /// Quoted string, unescaped
    Str(String),
    /// `Date.UTC(..)` call, whitespace removed
    DateCall(String),
}

/// Stage 2: split the literal into tokens
pub fn tokenize(literal: &str) -> IngestResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = literal;

    while let Some(c) = rest.chars().next() {
        if c.is_whitespace() {
            rest = &rest[c.len_utf8()..];
        } else if matches!(c, '[' | ']' | '{' | '}' | ',' | ':') {
            tokens.push(Token::Punct(c));
            rest = &rest[1..];
        } else if rest.starts_with(DATE_CALL_PREFIX) {
            let end = rest.find(')').ok_or_else(|| {
                IngestError::ScrapeFormat("Unterminated Date.UTC call".to_string())
            })?;
            let call: String = rest[..=end].chars().filter(|c| !c.is_whitespace()).collect();
            tokens.push(Token::DateCall(call));
            rest = &rest[end + 1..];
        } else if c == '"' || c == '\'' {
            let (value, consumed) = read_quoted(rest, c)?;
            tokens.push(Token::Str(value));
            rest = &rest[consumed..];
        } else if c == '-' || c == '.' || c.is_ascii_digit() {
            let len = rest
                .char_indices()
                .skip(1)
                .find(|(_, ch)| !(ch.is_ascii_alphanumeric() || matches!(ch, '.' | '+' | '-')))
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            tokens.push(Token::Number(rest[..len].to_string()));
            rest = &rest[len..];
        } else if c.is_alphabetic() || c == '_' || c == '$' {
            let len = rest
                .char_indices()
                .find(|(_, ch)| !(ch.is_alphanumeric() || matches!(ch, '_' | '$')))
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            tokens.push(Token::Ident(rest[..len].to_string()));
            rest = &rest[len..];
        } else {
            return Err(IngestError::ScrapeFormat(format!(
                "Unexpected character '{}' in chart series",
                c
            )));
        }
    }

    Ok(tokens)
}

/// Read a quoted string starting at `text[0]`; returns (value, bytes consumed)
fn read_quoted(text: &str, quote: char) -> IngestResult<(String, usize)> {
    let mut value = String::new();
    let mut escaped = false;

    for (i, c) in text.char_indices().skip(1) {
        if escaped {
            value.push(match c {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                other => other,
            });
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Ok((value, i + c.len_utf8()));
        } else {
            value.push(c);
        }
    }

    Err(IngestError::ScrapeFormat(
        "Unterminated string in chart series".to_string(),
    ))
}

/// Stage 3: render tokens as JSON text
pub fn to_json(tokens: &[Token]) -> IngestResult<String> {
    let mut json = String::new();

    for (i, token) in tokens.iter().enumerate() {
        let next = tokens.get(i + 1);
        match token {
            Token::Punct(',') if matches!(next, Some(Token::Punct(']' | '}'))) => {}
            Token::Punct(c) => json.push(*c),
            Token::DateCall(call) => json.push_str(&quote_json(call)),
            Token::Str(s) => json.push_str(&quote_json(s)),
            Token::Ident(name) if matches!(next, Some(Token::Punct(':'))) => {
                json.push_str(&quote_json(name))
            }
            Token::Ident(name) => match name.as_str() {
                "true" | "false" | "null" => json.push_str(name),
                "undefined" => json.push_str("null"),
                other => {
                    return Err(IngestError::ScrapeFormat(format!(
                        "Unexpected identifier '{}' in chart series",
                        other
                    )))
                }
            },
            Token::Number(text) => json.push_str(&normalize_number(text)?),
        }
    }

    Ok(json)
}

fn quote_json(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// JavaScript allows `.5` and `5.`; JSON does not
fn normalize_number(text: &str) -> IngestResult<String> {
    if text.parse::<i64>().is_ok() {
        return Ok(text.to_string());
    }
    let value: f64 = text
        .parse()
        .map_err(|_| IngestError::ScrapeFormat(format!("Invalid number '{}' in chart series", text)))?;
    serde_json::Number::from_f64(value)
        .map(|n| n.to_string())
        .ok_or_else(|| IngestError::ScrapeFormat(format!("Non-finite number '{}' in chart series", text)))
}

/// Stage 4: decode the repaired JSON
pub fn decode_series(json: &str) -> IngestResult<Vec<ChartSeries>> {
    serde_json::from_str(json)
        .map_err(|e| IngestError::ScrapeFormat(format!("Failed to decode chart series: {}", e)))
}

fn date_call_regex() -> IngestResult<&'static Regex> {
    static DATE_CALL_RE: OnceCell<Regex> = OnceCell::new();
    DATE_CALL_RE
        .get_or_try_init(|| Regex::new(r"Date\.UTC\(\s*-?\d+\s*,\s*(\d+)\s*,\s*(\d+)"))
        .map_err(|e| IngestError::ScrapeFormat(format!("Date pattern failed to compile: {}", e)))
}

/// Attach each series' year to its points
///
/// Series with a non-numeric name, points without a count and points whose
/// day does not exist in that year (Feb 29 outside leap years) are skipped.
pub fn series_to_counts(series: &[ChartSeries]) -> IngestResult<Vec<HistoricalPollenCount>> {
    let date_re = date_call_regex()?;
    let mut counts = Vec::new();

    for entry in series {
        let year: i32 = match entry.name.trim().parse() {
            Ok(year) => year,
            Err(_) => {
                debug!(name = %entry.name, "Skipping chart series without a year name");
                continue;
            }
        };

        for (date_text, count) in &entry.data {
            let Some(count) = count else { continue };

            let Some(caps) = date_re.captures(date_text) else {
                debug!(date = %date_text, "Skipping chart point with unrecognized date");
                continue;
            };
            let month: Option<u32> = caps[1].parse().ok();
            let day: Option<u32> = caps[2].parse().ok();

            // Upstream months are zero-based
            let date = match (month.and_then(|m| m.checked_add(1)), day) {
                (Some(month), Some(day)) => NaiveDate::from_ymd_opt(year, month, day),
                _ => None,
            };
            let Some(date) = date else {
                debug!(year, date = %date_text, "Skipping impossible calendar date");
                continue;
            };

            counts.push(HistoricalPollenCount {
                date,
                count: *count as i32,
            });
        }
    }

    counts.sort_by_key(|c| c.date);
    Ok(counts)
}
