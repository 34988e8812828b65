//! CSS `font` shorthand parsing.
//!
//! Accepts `[style] [variant] [weight] size[/line-height] family[, family]*`,
//! e.g. `"bold italic 14pt 'Times New Roman', serif"`.

use crate::error::{Canvas2dError, Canvas2dResult};
use crate::style::{FontStyle, FontWeight};

/// The parts of a font shorthand the engine keeps.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    pub style: FontStyle,
    pub weight: FontWeight,
    pub size_px: f64,
    pub families: Vec<String>,
}

pub const DEFAULT_FONT_SIZE: f64 = 14.0;
pub const DEFAULT_FONT_FAMILY: &str = "sans-serif";

impl Default for FontSpec {
    /// `14px sans-serif`.
    fn default() -> Self {
        Self {
            style: FontStyle::Normal,
            weight: FontWeight::NORMAL,
            size_px: DEFAULT_FONT_SIZE,
            families: vec![DEFAULT_FONT_FAMILY.to_string()],
        }
    }
}

/// Consume `word` if it is the next whole token of `s`.
fn strip_keyword<'a>(s: &'a str, word: &str) -> Option<&'a str> {
    let rest = s.strip_prefix(word)?;
    (rest.is_empty() || rest.starts_with(char::is_whitespace)).then_some(rest)
}

pub fn parse_font(font_str: &str) -> Canvas2dResult<FontSpec> {
    let mut style = FontStyle::Normal;
    let mut weight = FontWeight::NORMAL;
    let mut remaining = font_str.trim();
    if remaining.is_empty() {
        return Err(Canvas2dError::FontParseError("empty font string".to_string()));
    }

    // Style, variant and weight may come in any order before the size.
    loop {
        let trimmed = remaining.trim_start();
        if let Some(rest) = strip_keyword(trimmed, "italic") {
            style = FontStyle::Italic;
            remaining = rest;
        } else if let Some(rest) = strip_keyword(trimmed, "oblique") {
            style = FontStyle::Oblique;
            remaining = rest;
        } else if let Some(rest) = strip_keyword(trimmed, "normal")
            .or_else(|| strip_keyword(trimmed, "small-caps"))
        {
            remaining = rest;
        } else if let Some((w, rest)) = ["bold", "bolder", "lighter"]
            .iter()
            .find_map(|kw| strip_keyword(trimmed, kw).map(|rest| (*kw, rest)))
        {
            weight = w.parse()?;
            remaining = rest;
        } else if let Some((w, rest)) = parse_numeric_weight(trimmed) {
            weight = w;
            remaining = rest;
        } else {
            break;
        }
    }

    let (size_px, rest) = parse_font_size(remaining.trim_start())?;
    remaining = rest.trim_start();
    if let Some(rest) = remaining.strip_prefix('/') {
        remaining = skip_line_height(rest);
    }

    let families = parse_font_families(remaining.trim_start());
    if families.is_empty() {
        return Err(Canvas2dError::FontParseError(format!(
            "missing font family in '{font_str}'"
        )));
    }

    Ok(FontSpec {
        style,
        weight,
        size_px,
        families,
    })
}

/// A numeric weight (100..=900 in steps of 100) followed by whitespace.
fn parse_numeric_weight(s: &str) -> Option<(FontWeight, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let rest = &s[end..];
    if end == 0 || !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let weight: u16 = s[..end].parse().ok()?;
    ((100..=900).contains(&weight) && weight % 100 == 0).then_some((FontWeight(weight), rest))
}

fn parse_font_size(s: &str) -> Canvas2dResult<(f64, &str)> {
    let num_end = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    if num_end == 0 {
        return Err(Canvas2dError::FontParseError(format!(
            "Expected font size, got: {s}"
        )));
    }
    let size: f64 = s[..num_end].parse().map_err(|_| {
        Canvas2dError::FontParseError(format!("Invalid font size number: {}", &s[..num_end]))
    })?;
    let rest = &s[num_end..];

    let (multiplier, unit_len) = if rest.starts_with("px") {
        (1.0, 2)
    } else if rest.starts_with("pt") {
        (4.0 / 3.0, 2)
    } else if rest.starts_with("rem") {
        (16.0, 3)
    } else if rest.starts_with("em") {
        (16.0, 2)
    } else if rest.starts_with('%') {
        (16.0 / 100.0, 1)
    } else {
        (1.0, 0)
    };
    Ok((size * multiplier, &rest[unit_len..]))
}

fn skip_line_height(s: &str) -> &str {
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    &s[end..]
}

/// Comma-separated family list; quotes are stripped.
pub fn parse_font_families(s: &str) -> Vec<String> {
    s.split(',')
        .map(|f| f.trim().trim_matches(|c| c == '"' || c == '\'').trim())
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}
