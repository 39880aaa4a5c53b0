use std::fmt;
use std::rc::Rc;

/// A named piece of source text. Shared by every span cut from it.
#[derive(Debug, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub text: String,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct CodePosition {
    pub byte_pos: usize,
    pub line_no: usize,
    pub column_no: usize,
}

#[derive(Debug, Clone)]
pub struct Span {
    pub start_pos: CodePosition,
    pub end_pos: CodePosition,
    pub source: Rc<SourceFile>,
}

impl SourceFile {
    pub fn new(name: &str, text: &str) -> Rc<Self> {
        Rc::new(SourceFile {
            name: name.to_owned(),
            text: text.to_owned(),
        })
    }

    /// Returns the text of a 1-based line, without its newline.
    pub fn line(&self, line_no: usize) -> &str {
        self.text
            .split('\n')
            .nth(line_no.saturating_sub(1))
            .map(|l| l.trim_end_matches('\r'))
            .unwrap_or("")
    }
}

impl CodePosition {
    pub fn new(byte_pos: usize, line_no: usize, column_no: usize) -> Self {
        CodePosition {
            byte_pos,
            line_no,
            column_no,
        }
    }
}

impl fmt::Display for CodePosition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line_no, self.column_no)
    }
}

impl Span {
    pub fn new(start_pos: CodePosition, end_pos: CodePosition, source: &Rc<SourceFile>) -> Self {
        Span {
            start_pos,
            end_pos,
            source: source.clone(),
        }
    }

    /// A zero-width span at the very start of the source.
    pub fn empty(source: &Rc<SourceFile>) -> Self {
        let default_pos = CodePosition::new(0, 1, 1);
        Span::new(default_pos, default_pos, source)
    }

    pub fn extend(&self, other: &Self) -> Self {
        Span {
            start_pos: std::cmp::min(self.start_pos, other.start_pos),
            end_pos: std::cmp::max(self.end_pos, other.end_pos),
            source: self.source.clone(),
        }
    }

    pub fn extract_string(&self) -> Option<&str> {
        self.source
            .text
            .get(self.start_pos.byte_pos..self.end_pos.byte_pos)
    }

    /// Quotes every line the span touches and underlines the spanned columns.
    pub fn underline(&self) -> String {
        let first = self.start_pos.line_no;
        let last = std::cmp::max(first, self.end_pos.line_no);
        let mut result = String::new();

        for line_no in first..=last {
            let line = self.source.line(line_no);
            let line_len = line.chars().count();
            let col_start = if line_no == first {
                self.start_pos.column_no.saturating_sub(1)
            } else {
                0
            };
            let col_end = if line_no == self.end_pos.line_no {
                self.end_pos.column_no.saturating_sub(1)
            } else {
                line_len
            };
            let width = std::cmp::max(col_end.saturating_sub(col_start), 1);

            result.push_str(line);
            result.push('\n');
            result.push_str(&" ".repeat(col_start));
            result.push_str(&"^".repeat(width));
            if line_no != last {
                result.push('\n');
            }
        }

        result
    }
}

impl PartialEq for Span {
    fn eq(&self, other: &Self) -> bool {
        self.start_pos == other.start_pos
            && self.end_pos == other.end_pos
            && Rc::ptr_eq(&self.source, &other.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_underline_single_line() {
        let source = SourceFile::new("<test>", "var x = 1 / 0");
        let span = Span::new(CodePosition::new(8, 1, 9), CodePosition::new(13, 1, 14), &source);
        assert_eq!(span.underline(), "var x = 1 / 0\n        ^^^^^");
        assert_eq!(span.extract_string(), Some("1 / 0"));
    }

    #[test]
    fn test_underline_spans_lines() {
        let source = SourceFile::new("<test>", "fun f() {\n  1\n}");
        let span = Span::new(CodePosition::new(0, 1, 1), CodePosition::new(15, 3, 2), &source);
        let rendered = span.underline();
        assert_eq!(rendered.lines().count(), 6);
        assert!(rendered.starts_with("fun f() {\n^^^^^^^^^"));
    }

    #[test]
    fn test_extend() {
        let source = SourceFile::new("<test>", "a + b");
        let lhs = Span::new(CodePosition::new(0, 1, 1), CodePosition::new(1, 1, 2), &source);
        let rhs = Span::new(CodePosition::new(4, 1, 5), CodePosition::new(5, 1, 6), &source);
        let joined = lhs.extend(&rhs);
        assert_eq!(joined.extract_string(), Some("a + b"));
    }
}
