//! Marker location.
//!
//! Finds the start and end markers of one syntax family in a text buffer.
//! Markers are recognized by position (each one sits at the start of a line
//! inside that family's comment syntax), not by parsing the host language.

use std::fmt;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;

use crate::syntax::{Span, Spanned};

/// One of the three comment styles markers can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SyntaxFamily {
    /// `// #ifdef ...` / `// #endif`
    Line,
    /// `<!-- #ifdef ... -->` / `<!-- #endif -->`
    Html,
    /// `/* #ifdef ... */` / `/* #endif */`
    Block,
}

impl SyntaxFamily {
    /// The order families are applied in. A later family's markers may only
    /// become well-formed once an earlier family's regions are stripped.
    pub const PASS_ORDER: [SyntaxFamily; 3] = [SyntaxFamily::Html, SyntaxFamily::Line, SyntaxFamily::Block];

    pub fn as_str(&self) -> &'static str {
        match self {
            SyntaxFamily::Line => "line-comment",
            SyntaxFamily::Html => "html-comment",
            SyntaxFamily::Block => "block-comment",
        }
    }

    fn patterns(&self) -> (&'static Regex, &'static Regex) {
        match self {
            SyntaxFamily::Line => (&LINE_START, &LINE_END),
            SyntaxFamily::Html => (&HTML_START, &HTML_END),
            SyntaxFamily::Block => (&BLOCK_START, &BLOCK_END),
        }
    }
}

impl fmt::Display for SyntaxFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The directive a marker carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarkerKind {
    Ifdef,
    Ifndef,
    RegionIfdef,
    RegionIfndef,
    Endif,
    EndregionEndif,
}

impl MarkerKind {
    /// Parses a directive as captured, tolerating runs of blanks between words.
    pub fn from_directive(directive: &str) -> Option<Self> {
        let words: Vec<&str> = directive.split_whitespace().collect();
        Some(match words.as_slice() {
            ["ifdef"] => MarkerKind::Ifdef,
            ["ifndef"] => MarkerKind::Ifndef,
            ["region", "ifdef"] => MarkerKind::RegionIfdef,
            ["region", "ifndef"] => MarkerKind::RegionIfndef,
            ["endif"] => MarkerKind::Endif,
            ["endregion", "endif"] => MarkerKind::EndregionEndif,
            _ => return None,
        })
    }

    /// Whether the condition result is inverted (`ifndef` forms).
    pub fn is_negated(&self) -> bool {
        matches!(self, MarkerKind::Ifndef | MarkerKind::RegionIfndef)
    }

    pub fn directive(&self) -> &'static str {
        match self {
            MarkerKind::Ifdef => "ifdef",
            MarkerKind::Ifndef => "ifndef",
            MarkerKind::RegionIfdef => "region ifdef",
            MarkerKind::RegionIfndef => "region ifndef",
            MarkerKind::Endif => "endif",
            MarkerKind::EndregionEndif => "endregion endif",
        }
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.directive())
    }
}

/// One located marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerOccurrence {
    pub kind: MarkerKind,
    /// Byte range of the whole marker, including its own line break.
    pub span: Span,
    /// Trimmed condition source of a start marker and where it sits.
    pub condition: Option<Spanned<String>>,
}

impl MarkerOccurrence {
    /// The exact text the marker occupies in `text`.
    pub fn raw_text<'a>(&self, text: &'a str) -> &'a str {
        &text[self.span.start..self.span.end]
    }
}

// ============================================================================
// PATTERNS
// ============================================================================

const START_DIRECTIVE: &str = r"#(ifdef|ifndef|region[ \t]+ifdef|region[ \t]+ifndef)[ \t]+";
const END_DIRECTIVE: &str = r"#(endif|endregion[ \t]+endif)";

fn compile(pattern: String) -> Regex {
    // patterns are built from constants above; a failure is a programming error
    Regex::new(&pattern).unwrap_or_else(|e| panic!("invalid marker pattern {pattern}: {e}"))
}

static LINE_START: Lazy<Regex> = Lazy::new(|| {
    compile(format!(
        r"(?m)^[ \t]*//[ \t]*{START_DIRECTIVE}(\S[^\r\n]*?)[ \t]*(?:\r?\n|$)"
    ))
});
static LINE_END: Lazy<Regex> =
    Lazy::new(|| compile(format!(r"(?m)^[ \t]*//[ \t]*{END_DIRECTIVE}[ \t]*(?:\r?\n|$)")));

static HTML_START: Lazy<Regex> = Lazy::new(|| {
    compile(format!(
        r"(?m)^[ \t]*<!--[ \t]*{START_DIRECTIVE}(\S.*?)[ \t]*-->(?:[ \t]*\r?\n)?"
    ))
});
static HTML_END: Lazy<Regex> = Lazy::new(|| {
    compile(format!(
        r"(?m)^[ \t]*<!--[ \t]*{END_DIRECTIVE}[ \t]*-->(?:[ \t]*\r?\n)?"
    ))
});

static BLOCK_START: Lazy<Regex> = Lazy::new(|| {
    compile(format!(
        r"(?m)^[ \t]*/\*[ \t]*{START_DIRECTIVE}(\S.*?)[ \t]*\*/(?:[ \t]*\r?\n)?"
    ))
});
static BLOCK_END: Lazy<Regex> = Lazy::new(|| {
    compile(format!(
        r"(?m)^[ \t]*/\*[ \t]*{END_DIRECTIVE}[ \t]*\*/(?:[ \t]*\r?\n)?"
    ))
});

// ============================================================================
// PUBLIC API
// ============================================================================

/// Locates every start and end marker of `family` in `text`, each list in
/// ascending offset order.
pub fn locate(family: SyntaxFamily, text: &str) -> (Vec<MarkerOccurrence>, Vec<MarkerOccurrence>) {
    let (start_re, end_re) = family.patterns();
    let starts = start_re.captures_iter(text).filter_map(|c| occurrence(&c)).collect();
    let ends = end_re.captures_iter(text).filter_map(|c| occurrence(&c)).collect();
    (starts, ends)
}

fn occurrence(caps: &Captures<'_>) -> Option<MarkerOccurrence> {
    let whole = caps.get(0)?;
    let kind = MarkerKind::from_directive(caps.get(1)?.as_str())?;
    let condition = caps.get(2).map(|m| Spanned {
        value: m.as_str().trim().to_string(),
        span: Span::new(m.start(), m.start() + m.as_str().trim_end().len()),
    });
    Some(MarkerOccurrence {
        kind,
        span: Span::new(whole.start(), whole.end()),
        condition,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_markers() {
        let text = "a\n  // #ifdef DEBUG && X  \nb\n// #endif\nc";
        let (starts, ends) = locate(SyntaxFamily::Line, text);
        assert_eq!(starts.len(), 1);
        assert_eq!(ends.len(), 1);
        assert_eq!(starts[0].kind, MarkerKind::Ifdef);
        assert_eq!(starts[0].condition.as_ref().unwrap().value, "DEBUG && X");
        assert_eq!(starts[0].raw_text(text), "  // #ifdef DEBUG && X  \n");
        assert_eq!(ends[0].raw_text(text), "// #endif\n");
        let cond = starts[0].condition.as_ref().unwrap();
        assert_eq!(&text[cond.span.start..cond.span.end], "DEBUG && X");
    }

    #[test]
    fn test_region_forms_and_whitespace() {
        let text = "//#region   ifndef MOBILE\nx\n// #endregion  endif";
        let (starts, ends) = locate(SyntaxFamily::Line, text);
        assert_eq!(starts[0].kind, MarkerKind::RegionIfndef);
        assert!(starts[0].kind.is_negated());
        assert_eq!(ends[0].kind, MarkerKind::EndregionEndif);
        assert_eq!(ends[0].span.end, text.len());
    }

    #[test]
    fn test_html_markers() {
        let text = "<div>\n<!-- #ifdef H5 -->\n<p>web</p>\n<!-- #endif -->\n</div>";
        let (starts, ends) = locate(SyntaxFamily::Html, text);
        assert_eq!(starts.len(), 1);
        assert_eq!(starts[0].condition.as_ref().unwrap().value, "H5");
        assert_eq!(ends[0].raw_text(text), "<!-- #endif -->\n");
    }

    #[test]
    fn test_block_markers() {
        let text = "/* #ifndef APP */\n.a { color: red; }\n/* #endif */\n";
        let (starts, ends) = locate(SyntaxFamily::Block, text);
        assert_eq!(starts[0].kind, MarkerKind::Ifndef);
        assert_eq!(starts[0].condition.as_ref().unwrap().value, "APP");
        assert_eq!(ends.len(), 1);
    }

    #[test]
    fn test_markers_must_start_the_line() {
        let text = "let a = 1; // #ifdef DEBUG\n// #endif\n";
        let (starts, ends) = locate(SyntaxFamily::Line, text);
        assert!(starts.is_empty());
        assert_eq!(ends.len(), 1);
    }

    #[test]
    fn test_families_do_not_cross_match() {
        let text = "/* #ifdef A */\n// #ifdef B\n<!-- #ifdef C -->\n";
        assert_eq!(locate(SyntaxFamily::Block, text).0.len(), 1);
        assert_eq!(locate(SyntaxFamily::Line, text).0.len(), 1);
        assert_eq!(locate(SyntaxFamily::Html, text).0.len(), 1);
    }

    #[test]
    fn test_crlf_line_endings() {
        let text = "// #ifdef A\r\nx\r\n// #endif\r\ny";
        let (starts, ends) = locate(SyntaxFamily::Line, text);
        assert_eq!(starts[0].condition.as_ref().unwrap().value, "A");
        assert_eq!(starts[0].raw_text(text), "// #ifdef A\r\n");
        assert_eq!(ends[0].raw_text(text), "// #endif\r\n");
    }
}
