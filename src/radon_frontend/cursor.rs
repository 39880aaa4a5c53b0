use super::span::CodePosition;
use std::iter::Peekable;
use std::str::CharIndices;

/// Character stream over the source with line/column bookkeeping.
#[derive(Debug, Clone)]
pub struct Cursor<'src> {
    source: &'src str,
    chars: Peekable<CharIndices<'src>>,
    position: CodePosition,
}

impl<'src> Cursor<'src> {
    pub fn new(source: &'src str) -> Self {
        Cursor {
            source,
            chars: source.char_indices().peekable(),
            position: CodePosition::new(0, 1, 1),
        }
    }

    pub fn position(&self) -> CodePosition {
        self.position
    }

    pub fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, ch)| ch)
    }

    /// Consumes the next character, moving to a new line after `\n`.
    pub fn take(&mut self) -> Option<char> {
        let (_, ch) = self.chars.next()?;

        self.position.byte_pos = self
            .chars
            .peek()
            .map(|&(idx, _)| idx)
            .unwrap_or(self.source.len());
        if ch == '\n' {
            self.position.line_no += 1;
            self.position.column_no = 1;
        } else {
            self.position.column_no += 1;
        }

        Some(ch)
    }

    pub fn take_if(&mut self, target: char) -> bool {
        if self.peek() == Some(target) {
            self.take();
            true
        } else {
            false
        }
    }

    pub fn take_while<F>(&mut self, condition: F)
    where
        F: Fn(char) -> bool,
    {
        while let Some(ch) = self.peek() {
            if !condition(ch) {
                break;
            }
            self.take();
        }
    }

    pub fn slice_from(&self, start: usize) -> &'src str {
        &self.source[start..self.position.byte_pos]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_track_newlines() {
        let mut cursor = Cursor::new("ab\ncd");
        cursor.take();
        cursor.take();
        assert_eq!(cursor.position(), CodePosition::new(2, 1, 3));
        cursor.take();
        assert_eq!(cursor.position(), CodePosition::new(3, 2, 1));
        assert_eq!(cursor.peek(), Some('c'));
    }

    #[test]
    fn test_take_while_and_slice() {
        let mut cursor = Cursor::new("hello world");
        cursor.take_while(|ch| ch.is_ascii_alphabetic());
        assert_eq!(cursor.slice_from(0), "hello");
        assert!(cursor.take_if(' '));
        assert!(!cursor.take_if('x'));
    }
}
