//! Line re-rendering: emphasis for timestamps, addresses, targets and tokens,
//! with each address followed by its owner.

use field_extract::ExtractedFields;
use std::io::{self, Write};
use termcolor::{Buffer, Color, ColorChoice, ColorSpec, WriteColor};

use crate::resolver::OwnershipResult;

/// Lines with fewer whitespace-separated fields are passed through.
const MIN_FIELDS: usize = 3;

/// Visual styles applied to the parts of a line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Emphasis {
    /// Date and time fields.
    Timestamp,
    /// An address whose owner was already cached.
    KnownAddress,
    /// An address looked up during this call.
    NewAddress,
    /// The ` (owner)` suffix after an address.
    Owner,
    /// The bracketed target.
    Target,
    /// The interaction token.
    Token,
    /// The fifth field, usually the interaction type or hostname.
    Entity,
}

impl Emphasis {
    fn color(self) -> Color {
        match self {
            Emphasis::Timestamp => Color::Blue,
            Emphasis::KnownAddress | Emphasis::Target | Emphasis::Entity => Color::Green,
            Emphasis::NewAddress | Emphasis::Token => Color::Red,
            Emphasis::Owner => Color::Yellow,
        }
    }

    fn spec(self) -> ColorSpec {
        let mut spec = ColorSpec::new();
        spec.set_fg(Some(self.color()));
        spec
    }
}

/// A piece of the line being rebuilt. Painted pieces are never searched again,
/// so later replacements cannot land inside escape codes or owner text.
enum Segment<'a> {
    Plain(&'a str),
    Painted(String),
}

struct Segments<'a>(Vec<Segment<'a>>);

impl<'a> Segments<'a> {
    fn new(line: &'a str) -> Self {
        Segments(vec![Segment::Plain(line)])
    }

    /// Replace up to `limit` occurrences of `needle`, left to right, in the
    /// parts of the line that are still plain. Returns how many were replaced.
    fn emphasize<F>(&mut self, needle: &str, limit: usize, render: F) -> usize
    where
        F: Fn() -> String,
    {
        if needle.is_empty() {
            return 0;
        }

        let mut done = 0;
        let mut i = 0;
        while done < limit && i < self.0.len() {
            let text = match &self.0[i] {
                Segment::Plain(text) => *text,
                Segment::Painted(_) => {
                    i += 1;
                    continue;
                }
            };

            let Some(at) = text.find(needle) else {
                i += 1;
                continue;
            };

            let before = &text[..at];
            let after = &text[at + needle.len()..];

            let mut parts = Vec::with_capacity(3);
            if !before.is_empty() {
                parts.push(Segment::Plain(before));
            }
            parts.push(Segment::Painted(render()));
            let next = i + parts.len();
            if !after.is_empty() {
                parts.push(Segment::Plain(after));
            }

            self.0.splice(i..=i, parts);
            i = next;
            done += 1;
        }
        done
    }

    fn into_string(self) -> String {
        let mut out = String::new();
        for segment in self.0 {
            match segment {
                Segment::Plain(text) => out.push_str(text),
                Segment::Painted(text) => out.push_str(&text),
            }
        }
        out
    }
}

/// Renders annotated lines.
///
/// With colour off, addresses still get their ` (owner)` suffix but no escape
/// codes are written.
#[derive(Copy, Clone, Debug)]
pub struct LineAnnotator {
    color: bool,
}

impl LineAnnotator {
    /// `Always` and `AlwaysAnsi` enable colour; anything else disables it.
    /// Resolve `Auto` against the terminal before calling this.
    pub fn new(color: ColorChoice) -> Self {
        Self {
            color: matches!(color, ColorChoice::Always | ColorChoice::AlwaysAnsi),
        }
    }

    pub fn is_colored(&self) -> bool {
        self.color
    }

    /// Whether `line` has the minimum shape (three fields) to be annotated.
    #[inline]
    pub fn accepts(&self, line: &str) -> bool {
        line.split_whitespace().nth(MIN_FIELDS - 1).is_some()
    }

    /// Wrap `text` in the escape codes for `style`.
    pub fn paint(&self, text: &str, style: Emphasis) -> String {
        if !self.color {
            return text.to_owned();
        }

        let mut buf = Buffer::ansi();
        match write_styled(&mut buf, text, style) {
            Ok(()) => String::from_utf8_lossy(buf.as_slice()).into_owned(),
            Err(_) => text.to_owned(),
        }
    }

    fn paint_address(&self, ip: &str, resolution: &OwnershipResult) -> String {
        let style = if resolution.cached {
            Emphasis::KnownAddress
        } else {
            Emphasis::NewAddress
        };
        let mut out = self.paint(ip, style);
        out.push_str(&self.paint(&format!(" ({})", resolution.owner), Emphasis::Owner));
        out
    }

    /// Annotate `line`.
    ///
    /// `resolutions` is parallel to `fields.ips`: one entry per extracted
    /// occurrence, in the same order. Lines with fewer than three
    /// whitespace-separated fields come back unchanged.
    ///
    /// The output is not meant to be annotated again.
    pub fn annotate(
        &self,
        line: &str,
        fields: &ExtractedFields<'_>,
        resolutions: &[OwnershipResult],
    ) -> String {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < MIN_FIELDS {
            return line.to_owned();
        }

        let mut segments = Segments::new(line);

        // date, then time
        for part in &parts[..2] {
            segments.emphasize(part, 1, || self.paint(part, Emphasis::Timestamp));
        }

        // each extracted occurrence consumes one occurrence in the line
        for (ip, resolution) in fields.ips.iter().zip(resolutions) {
            segments.emphasize(ip, 1, || self.paint_address(ip, resolution));
        }

        if let Some(target) = fields.target {
            segments.emphasize(target, 2, || self.paint(target, Emphasis::Target));
        }

        if let Some(token) = fields.token.as_deref() {
            segments.emphasize(token, 2, || self.paint(token, Emphasis::Token));
        }

        if let Some(entity) = parts.get(4) {
            segments.emphasize(entity, 1, || self.paint(entity, Emphasis::Entity));
        }

        segments.into_string()
    }
}

fn write_styled(buf: &mut Buffer, text: &str, style: Emphasis) -> io::Result<()> {
    buf.set_color(&style.spec())?;
    buf.write_all(text.as_bytes())?;
    buf.reset()
}
