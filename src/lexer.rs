//! Lexical analysis: splitting a raw input line into words and operator
//! tokens.
//!
//! The lexer works byte-wise and resolves quoting and escaping in a single
//! pass, so downstream stages only ever see plain, de-quoted strings. It
//! never fails: an unterminated quote simply flushes whatever accumulated
//! when the input ends.

/// Quoting state of the tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    /// Between tokens or inside an unquoted word.
    Outside,
    /// Inside `'...'`: every byte is literal except the closing quote.
    SingleQuote,
    /// Inside `"..."`: backslash escapes `"` `\` `$` only.
    DoubleQuote,
}

struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
    state: LexState,
    current: Vec<u8>,
    tokens: Vec<String>,
}

impl<'a> Lexer<'a> {
    fn new(line: &'a str) -> Self {
        Lexer {
            input: line.as_bytes(),
            pos: 0,
            state: LexState::Outside,
            current: Vec::new(),
            tokens: Vec::new(),
        }
    }

    fn make_tokens(mut self) -> Vec<String> {
        while let Some(b) = self.read_byte() {
            match self.state {
                LexState::Outside => self.handle_outside(b),
                LexState::SingleQuote => self.handle_single_quote(b),
                LexState::DoubleQuote => self.handle_double_quote(b),
            }
        }
        // Unterminated quotes fall through here on purpose.
        self.flush_current();
        self.tokens
    }

    fn read_byte(&mut self) -> Option<u8> {
        let b = self.input.get(self.pos).copied();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    fn handle_outside(&mut self, b: u8) {
        match b {
            b'\\' => {
                // The next byte, whatever it is, is taken literally. A
                // trailing backslash stands for itself.
                match self.read_byte() {
                    Some(escaped) => self.current.push(escaped),
                    None => self.current.push(b'\\'),
                }
            }
            b'\'' => self.state = LexState::SingleQuote,
            b'"' => self.state = LexState::DoubleQuote,
            b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r' => self.flush_current(),
            other => self.current.push(other),
        }
    }

    fn handle_single_quote(&mut self, b: u8) {
        match b {
            b'\'' => self.state = LexState::Outside,
            other => self.current.push(other),
        }
    }

    fn handle_double_quote(&mut self, b: u8) {
        match b {
            b'"' => self.state = LexState::Outside,
            b'\\' => match self.read_byte() {
                Some(next @ (b'"' | b'\\' | b'$')) => self.current.push(next),
                Some(next) => {
                    self.current.push(b'\\');
                    self.current.push(next);
                }
                None => self.current.push(b'\\'),
            },
            other => self.current.push(other),
        }
    }

    /// Emits the accumulator as a token. Empty accumulators emit nothing, so
    /// `''` and `""` contribute no token at all.
    fn flush_current(&mut self) {
        if !self.current.is_empty() {
            let word = String::from_utf8_lossy(&self.current).into_owned();
            self.tokens.push(word);
            self.current.clear();
        }
    }
}

/// Tokenizes one logical line (no embedded newline expected, though one is
/// treated as plain whitespace).
///
/// Quoting follows the POSIX subset most users rely on: single quotes are
/// fully literal, double quotes escape only `"` `\` `$`, and a bare backslash
/// protects the next byte. Operators (`|`, `>`, `2>>`, ...) come out as
/// ordinary tokens distinguished only by their literal value; a quoted `'>'`
/// is therefore indistinguishable from a real one.
pub fn split_into_tokens(line: &str) -> Vec<String> {
    Lexer::new(line).make_tokens()
}
