//! Turning posts into styled terminal lines.
//!
//! Formatting is pure: a [`Formatter`] maps a [`Post`] and the current time
//! to a list of [`Line`]s made of styled [`Span`]s. Turning those into
//! escape sequences happens in [`render_line`], so the layout can be
//! tested on plain text.

use crate::config::DisplayConfig;
use crate::feeds::Post;
use crate::{Error, Result};
use chrono::{DateTime, TimeDelta, Utc};
use crossterm::style::{Color, Stylize};
use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

const AUTHOR_COLOR: Color = Color::AnsiValue(33);
const ALERT_COLOR: Color = Color::AnsiValue(196);
const REPOST_COLOR: Color = Color::AnsiValue(244);

const LINE_BREAK_GLYPH: &str = " ↵ ";

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b[@-Z\\-_]").expect("static regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Plain,
    Repost,
    Author,
    Handle,
    Age,
    Alert,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub style: Style,
}

impl Span {
    pub fn styled(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    pub fn raw(text: impl Into<String>) -> Self {
        Self::styled(text, Style::Plain)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    pub spans: Vec<Span>,
}

impl Line {
    pub fn from_spans(spans: Vec<Span>) -> Self {
        Self { spans }
    }

    /// The line without any styling.
    pub fn plain_text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct FormattedPost {
    pub lines: Vec<Line>,
    pub critical: bool,
}

#[derive(Debug, Clone)]
pub struct Formatter {
    alert: Regex,
    line_break_glyph: bool,
    strip_emoji: bool,
}

impl Formatter {
    pub fn new(alert_pattern: &str, display: &DisplayConfig) -> Result<Self> {
        let alert = RegexBuilder::new(alert_pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::Config(format!("invalid alert_pattern: {}", e)))?;
        Ok(Self {
            alert,
            line_break_glyph: display.line_break_glyph,
            strip_emoji: display.strip_emoji,
        })
    }

    /// Whether the body opens with one of the alert keywords.
    pub fn is_critical(&self, text: &str) -> bool {
        self.alert.is_match(text)
    }

    pub fn format_post(&self, post: &Post, now: DateTime<Utc>) -> FormattedPost {
        let mut lines = Vec::with_capacity(3);

        if let Some(by) = &post.reposted_by {
            lines.push(Line::from_spans(vec![Span::styled(
                format!("⟲ reposted by {}", by),
                Style::Repost,
            )]));
        }

        let age = ago(now.signed_duration_since(post.created_at));
        lines.push(Line::from_spans(vec![
            Span::styled(post.author.clone(), Style::Author),
            Span::raw(" "),
            Span::styled(post.handle.clone(), Style::Handle),
            Span::raw(" ⋅ "),
            Span::styled(age, Style::Age),
        ]));

        let body = self.clean_body(&post.text);
        let critical = self.is_critical(&body);
        lines.push(Line::from_spans(self.highlight(&body)));

        FormattedPost { lines, critical }
    }

    fn clean_body(&self, text: &str) -> String {
        let text = if self.strip_emoji {
            strip_emoji(text)
        } else {
            text.to_string()
        };
        normalize_whitespace(&text, self.line_break_glyph)
    }

    /// Split `text` into alert spans for every pattern match and plain
    /// spans for the rest.
    fn highlight(&self, text: &str) -> Vec<Span> {
        let mut spans = Vec::new();
        let mut last = 0;
        for m in self.alert.find_iter(text) {
            if m.start() > last {
                spans.push(Span::raw(&text[last..m.start()]));
            }
            if !m.as_str().is_empty() {
                spans.push(Span::styled(m.as_str(), Style::Alert));
            }
            last = m.end();
        }
        if last < text.len() || spans.is_empty() {
            spans.push(Span::raw(&text[last..]));
        }
        spans
    }
}

/// Human-readable age using the coarsest unit that is at least one:
/// `1.1y`, `3.0mo`, `4d`, `23h`, `5m`, `45s`.
pub fn ago(delta: TimeDelta) -> String {
    let secs = delta.num_seconds().max(0);
    let mins = secs / 60;
    let hours = mins / 60;
    let days = hours / 24;

    if days >= 365 {
        format!("{:.1}y", days as f64 / 365.242)
    } else if days >= 30 {
        format!("{:.1}mo", days as f64 / 30.437)
    } else if days >= 1 {
        format!("{}d", days)
    } else if hours >= 1 {
        format!("{}h", hours)
    } else if mins >= 1 {
        format!("{}m", mins)
    } else {
        format!("{}s", secs)
    }
}

/// Collapse blank-line runs, fold the remaining breaks into a space (or a
/// visible glyph) and squeeze repeated spaces.
pub fn normalize_whitespace(text: &str, line_break_glyph: bool) -> String {
    let separator = if line_break_glyph {
        LINE_BREAK_GLYPH
    } else {
        " "
    };
    let joined = text
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join(separator);

    let mut out = String::with_capacity(joined.len());
    let mut prev_space = false;
    for c in joined.chars() {
        if c == ' ' {
            if !prev_space {
                out.push(c);
            }
            prev_space = true;
        } else {
            out.push(c);
            prev_space = false;
        }
    }
    out.trim().to_string()
}

fn is_emoji(c: char) -> bool {
    matches!(c as u32,
        0x1F000..=0x1FAFF   // pictographs, emoticons, transport, flags
        | 0x2600..=0x27BF   // misc symbols, dingbats
        | 0x2B00..=0x2BFF   // arrows, stars
        | 0xE0020..=0xE007F // tag sequences
        | 0xFE0E..=0xFE0F   // variation selectors
        | 0x200D            // zero-width joiner
        | 0x20E3            // keycap
    )
}

pub fn strip_emoji(text: &str) -> String {
    text.chars().filter(|c| !is_emoji(*c)).collect()
}

/// Single-line form of a body for the log file: escape sequences and
/// control characters removed, whitespace collapsed.
pub fn sanitize_for_log(text: &str) -> String {
    let text = ANSI_ESCAPE.replace_all(text, "");
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// ANSI rendering of a line, without trailing newline.
pub fn render_line(line: &Line) -> String {
    line.spans.iter().map(render_span).collect()
}

fn render_span(span: &Span) -> String {
    let text = span.text.as_str();
    match span.style {
        Style::Plain => text.to_string(),
        Style::Repost => text.with(REPOST_COLOR).dim().to_string(),
        Style::Author => text.with(AUTHOR_COLOR).bold().to_string(),
        Style::Handle | Style::Age => text.with(AUTHOR_COLOR).dim().to_string(),
        Style::Alert => text.with(ALERT_COLOR).to_string(),
    }
}
