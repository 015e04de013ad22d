// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the fwdiff project (forward-mode differentiation by tree rewriting).

//! Parse diagnostics: byte spans, line/col, caret-highlighted rendering.

use std::fmt;
use std::ops::Range;

/// Byte-span in the original source (inclusive start, exclusive end).
pub type Span = Range<usize>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub line: usize, // 1-based
    pub col: usize,  // 1-based, counts chars
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub span: Span,
    pub start: Location,
    pub end: Location,
}

fn offset_to_loc(src: &str, offset: usize) -> Location {
    let mut line = 1usize;
    let mut col = 1usize;
    for (idx, ch) in src.char_indices() {
        if idx >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    Location { line, col }
}

fn byte_offset(src: &str, char_idx: usize) -> usize {
    src.char_indices()
        .nth(char_idx)
        .map_or(src.len(), |(idx, _)| idx)
}

/// The source line containing `offset`, plus the byte offset where it starts.
fn line_at(src: &str, offset: usize) -> (&str, usize) {
    let offset = offset.min(src.len());
    let start = src[..offset].rfind('\n').map_or(0, |i| i + 1);
    let end = src[offset..].find('\n').map_or(src.len(), |i| offset + i);
    (&src[start..end], start)
}

/// Render a caret-highlight under the diagnostic's span (first line only).
pub fn render(src: &str, diag: &Diagnostic) -> String {
    let (line_str, line_off) = line_at(src, diag.span.start);
    let caret_start = src[line_off..diag.span.start.min(src.len())].chars().count();
    let span_end = diag.span.end.clamp(diag.span.start, src.len());
    let caret_len = src
        .get(diag.span.start..span_end)
        .map_or(0, |s| s.chars().count())
        .max(1);
    let caret_len = caret_len.min(line_str.chars().count().saturating_sub(caret_start).max(1));

    format!(
        "error: {}\n--> line {}, col {}\n{}\n{}{}",
        diag.message,
        diag.start.line,
        diag.start.col,
        line_str,
        " ".repeat(caret_start),
        "^".repeat(caret_len)
    )
}

/// Render every diagnostic, separated by blank lines.
pub fn render_all(src: &str, diags: &[Diagnostic]) -> String {
    diags
        .iter()
        .map(|d| render(src, d))
        .collect::<Vec<_>>()
        .join("\n\n")
}

impl Diagnostic {
    /// Construct from a chumsky `Simple` error. Chumsky reports spans in
    /// chars; they are converted to byte offsets here.
    pub fn from_chumsky(src: &str, e: chumsky::error::Simple<char>) -> Self {
        let chars = e.span();
        let span = byte_offset(src, chars.start)..byte_offset(src, chars.end);
        let start = offset_to_loc(src, span.start);
        let end = offset_to_loc(src, span.end);
        Diagnostic {
            message: e.to_string(),
            span,
            start,
            end,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (line {}, col {})",
            self.message, self.start.line, self.start.col
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locations_are_one_based() {
        let src = "ab\ncd";
        assert_eq!(offset_to_loc(src, 0), Location { line: 1, col: 1 });
        assert_eq!(offset_to_loc(src, 4), Location { line: 2, col: 2 });
    }

    #[test]
    fn caret_sits_under_the_span() {
        let src = "fn f(x) {\n  x +\n}";
        let diag = Diagnostic {
            message: "unexpected '}'".into(),
            span: 16..17,
            start: offset_to_loc(src, 16),
            end: offset_to_loc(src, 17),
        };
        let out = render(src, &diag);
        assert!(out.contains("line 3, col 1"));
        assert!(out.ends_with("}\n^"));
    }

    #[test]
    fn one_caret_per_char() {
        let src = "x + ∂y";
        let diag = Diagnostic {
            message: "unexpected '∂'".into(),
            span: 4..7,
            start: offset_to_loc(src, 4),
            end: offset_to_loc(src, 7),
        };
        assert!(render(src, &diag).ends_with("x + ∂y\n    ^"));
    }
}
