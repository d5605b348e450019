//! Line Number Resolver
//!
//! Maps an original-template path to the `(line, column)` where that path's
//! value begins in the source text. Built by a small hand-rolled JSON
//! scanner that walks the same text `serde_json` already parsed, tracking
//! line/column as it goes - `serde_json::Value` itself carries no position
//! information, so recovering it means re-walking the raw text once.
//!
//! A lookup miss (path never seen during the scan) returns the sentinel
//! `(0, 0)`, never an error - this resolver must never throw.

use std::collections::HashMap;
use std::str::CharIndices;

/// `(line, column)`, both 1-based. `(0, 0)` is the "unknown" sentinel.
pub type Position = (u32, u32);

/// Resolves original-template paths to source positions.
#[derive(Debug, Clone, Default)]
pub struct LineNumberResolver {
    index: HashMap<String, Position>,
}

impl LineNumberResolver {
    /// Scan `source` (the raw template JSON text) and build the path index.
    /// Malformed JSON yields an empty resolver rather than an error; by this
    /// point the template has already been parsed successfully by the
    /// caller, so a scan failure here only degrades line numbers to the
    /// "unknown" sentinel, it never aborts analysis.
    pub fn from_source(source: &str) -> Self {
        let mut index = HashMap::new();
        let mut scanner = Scanner::new(source);
        let _ = scanner.parse_value("", &mut index);
        LineNumberResolver { index }
    }

    /// Resolve `path` to its source position, or `(0, 0)` on a miss.
    pub fn resolve(&self, path: &str) -> Position {
        self.index.get(path).copied().unwrap_or((0, 0))
    }
}

/// Interface for translating JSON paths in a Bicep-compiled template back to
/// Bicep source coordinates. Bicep compilation is an external collaborator,
/// so only the seam is defined here - no implementation ships with it.
pub trait BicepSourceMap {
    fn translate(&self, path: &str) -> Option<Position>;
}

struct Scanner<'a> {
    text: &'a str,
    iter: std::iter::Peekable<CharIndices<'a>>,
    line: u32,
    col: u32,
}

type ScanResult = Result<(), ()>;

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Scanner {
            text,
            iter: text.char_indices().peekable(),
            line: 1,
            col: 1,
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.iter.peek().map(|&(_, c)| c)
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.iter.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek_char(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn position(&self) -> Position {
        (self.line, self.col)
    }

    fn parse_value(&mut self, path: &str, out: &mut HashMap<String, Position>) -> ScanResult {
        self.skip_ws();
        out.insert(path.to_string(), self.position());
        match self.peek_char().ok_or(())? {
            '{' => self.parse_object(path, out),
            '[' => self.parse_array(path, out),
            '"' => self.parse_string().map(|_| ()),
            _ => self.parse_scalar(),
        }
    }

    fn parse_object(&mut self, path: &str, out: &mut HashMap<String, Position>) -> ScanResult {
        self.bump(); // '{'
        self.skip_ws();
        if self.peek_char() == Some('}') {
            self.bump();
            return Ok(());
        }
        loop {
            self.skip_ws();
            let key = self.parse_string()?;
            self.skip_ws();
            if self.bump() != Some(':') {
                return Err(());
            }
            let child_path = if path.is_empty() { key.clone() } else { format!("{path}.{key}") };
            self.parse_value(&child_path, out)?;
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(()),
                _ => return Err(()),
            }
        }
    }

    fn parse_array(&mut self, path: &str, out: &mut HashMap<String, Position>) -> ScanResult {
        self.bump(); // '['
        self.skip_ws();
        if self.peek_char() == Some(']') {
            self.bump();
            return Ok(());
        }
        let mut i = 0usize;
        loop {
            let child_path = format!("{path}[{i}]");
            self.parse_value(&child_path, out)?;
            i += 1;
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(']') => return Ok(()),
                _ => return Err(()),
            }
        }
    }

    fn parse_string(&mut self) -> Result<String, ()> {
        if self.bump() != Some('"') {
            return Err(());
        }
        let mut s = String::new();
        loop {
            match self.bump().ok_or(())? {
                '"' => return Ok(s),
                '\\' => {
                    let escaped = self.bump().ok_or(())?;
                    s.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                c => s.push(c),
            }
        }
    }

    fn parse_scalar(&mut self) -> ScanResult {
        while matches!(self.peek_char(), Some(c) if !matches!(c, ',' | '}' | ']') && !c.is_whitespace()) {
            self.bump();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_top_level_key() {
        let source = "{\n  \"resources\": []\n}";
        let resolver = LineNumberResolver::from_source(source);
        assert_eq!(resolver.resolve("resources"), (2, 16));
    }

    #[test]
    fn resolves_nested_array_element() {
        let source = "{\"resources\": [\n  {\"type\": \"Microsoft.Web/sites\"}\n]}";
        let resolver = LineNumberResolver::from_source(source);
        let (line, _) = resolver.resolve("resources[0]");
        assert_eq!(line, 2);
    }

    #[test]
    fn miss_returns_unknown_sentinel() {
        let resolver = LineNumberResolver::from_source("{}");
        assert_eq!(resolver.resolve("resources[0].properties.httpsOnly"), (0, 0));
    }

    #[test]
    fn malformed_source_yields_empty_resolver_not_a_panic() {
        let resolver = LineNumberResolver::from_source("{not json");
        assert_eq!(resolver.resolve("anything"), (0, 0));
    }
}
