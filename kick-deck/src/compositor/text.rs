//! Text overlay layout.
//!
//! Font sizes shrink with the longest line so names fit the 144px canvas.
//! Every glyph run is white with a drop shadow.

use serde::{Deserialize, Serialize};

/// Wrap width, in characters, for category subtitles.
pub const SUBTITLE_WRAP: usize = 15;

const CENTER_X: f64 = 72.0;
const CENTER_Y: f64 = 72.0;
/// Center of the title block when a subtitle sits below it.
const TITLE_CENTER_WITH_SUBTITLE: f64 = 46.0;
const MIN_FONT: u32 = 14;
const SINGLE_LINE_MAX_FONT: u32 = 24;
const MULTI_LINE_MAX_FONT: u32 = 20;
const SUBTITLE_MAX_FONT: u32 = 20;
const TITLE_TEXT_WIDTH: u32 = 170;
const SUBTITLE_TEXT_WIDTH: u32 = 220;
const LINE_PITCH: f64 = 1.1;
/// Baseline offset that visually centers a line on its y coordinate.
const BASELINE_SHIFT: f64 = 0.35;
const SUBTITLE_SINGLE_BASELINE: f64 = 92.0;
const SUBTITLE_MULTI_BASELINE: f64 = 82.0;

pub const TEXT_SHADOW_ID: &str = "text-shadow";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextOverlay {
    /// Newline-separated title lines.
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
}

impl TextOverlay {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
        }
    }

    /// Title plus a subtitle wrapped at [`SUBTITLE_WRAP`] characters.
    pub fn with_wrapped_subtitle(title: impl Into<String>, subtitle: Option<&str>) -> Self {
        let subtitle = subtitle
            .map(|s| wrap_text(s, SUBTITLE_WRAP).join("\n"))
            .filter(|s| !s.is_empty());
        Self {
            title: title.into(),
            subtitle,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty()
            && self.subtitle.as_deref().is_none_or(|s| s.trim().is_empty())
    }
}

/// Escape the five XML-significant characters.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Greedy word wrap. Words longer than `width` are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        let current_len = current.chars().count();
        if current.is_empty() {
            current.extend(word);
        } else if current_len + 1 + word.len() <= width {
            current.push(' ');
            current.extend(word);
        } else {
            lines.push(std::mem::replace(&mut current, word.into_iter().collect()));
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn longest_line(lines: &[&str]) -> u32 {
    lines
        .iter()
        .map(|l| l.chars().count() as u32)
        .max()
        .unwrap_or(0)
        .max(1)
}

pub fn title_font_size(lines: &[&str]) -> u32 {
    let max = if lines.len() <= 1 {
        SINGLE_LINE_MAX_FONT
    } else {
        MULTI_LINE_MAX_FONT
    };
    (TITLE_TEXT_WIDTH / longest_line(lines)).min(max).max(MIN_FONT)
}

pub fn subtitle_font_size(lines: &[&str]) -> u32 {
    (SUBTITLE_TEXT_WIDTH / longest_line(lines))
        .min(SUBTITLE_MAX_FONT)
        .max(MIN_FONT)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub font_size: u32,
    pub baseline: f64,
}

/// Position every line of `overlay`.
pub fn layout(overlay: &TextOverlay) -> Vec<PlacedLine> {
    let title_lines: Vec<&str> = overlay
        .title
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let subtitle_lines: Vec<&str> = overlay
        .subtitle
        .as_deref()
        .map(|s| s.lines().map(str::trim).filter(|l| !l.is_empty()).collect())
        .unwrap_or_default();

    let mut placed = Vec::with_capacity(title_lines.len() + subtitle_lines.len());

    if !title_lines.is_empty() {
        let font = title_font_size(&title_lines);
        let pitch = f64::from(font) * LINE_PITCH;
        let center = if subtitle_lines.is_empty() {
            CENTER_Y
        } else {
            TITLE_CENTER_WITH_SUBTITLE
        };
        let first = center - (title_lines.len() - 1) as f64 * pitch / 2.0
            + f64::from(font) * BASELINE_SHIFT;

        for (i, line) in title_lines.iter().enumerate() {
            placed.push(PlacedLine {
                text: (*line).to_string(),
                font_size: font,
                baseline: first + i as f64 * pitch,
            });
        }
    }

    if !subtitle_lines.is_empty() {
        let font = subtitle_font_size(&subtitle_lines);
        let (first, pitch) = if subtitle_lines.len() == 1 {
            (SUBTITLE_SINGLE_BASELINE, 0.0)
        } else {
            (SUBTITLE_MULTI_BASELINE, f64::from(font))
        };

        for (i, line) in subtitle_lines.iter().enumerate() {
            placed.push(PlacedLine {
                text: (*line).to_string(),
                font_size: font,
                baseline: first + i as f64 * pitch,
            });
        }
    }

    placed
}

/// Round to two decimals and drop trailing zeros.
pub(crate) fn num(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded}")
}

pub fn shadow_filter_def() -> String {
    format!(
        r##"<filter id="{TEXT_SHADOW_ID}" x="-20%" y="-20%" width="140%" height="140%"><feDropShadow dx="0" dy="1" stdDeviation="1.5" flood-color="#000000" flood-opacity="0.9"/></filter>"##
    )
}

/// SVG `<text>` elements for `overlay`. Needs [`shadow_filter_def`] in `<defs>`.
pub fn overlay_svg(overlay: &TextOverlay) -> String {
    layout(overlay)
        .into_iter()
        .map(|line| {
            format!(
                r##"<text x="{x}" y="{y}" font-family="Arial, Helvetica, sans-serif" font-size="{size}" font-weight="bold" fill="#ffffff" text-anchor="middle" filter="url(#{TEXT_SHADOW_ID})">{text}</text>"##,
                x = num(CENTER_X),
                y = num(line.baseline),
                size = line.font_size,
                text = escape_xml(&line.text),
            )
        })
        .collect()
}
