use crate::error::LexError;
use crate::token::{Token, TokenKind};

/// Turns NBF source text into a token stream.
///
/// Single-pass, character-at-a-time scanning in the same shape as
/// `examples/original_source/scanner.cc`'s `Scanner`: `peek`/`advance`/
/// `match_char`, with a running line counter for diagnostics.
pub struct Scanner<'src> {
    source: &'src [u8],
    start: usize,
    current: usize,
    line: u32,
    tokens: Vec<Token>,
}

impl<'src> Scanner<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source: source.as_bytes(),
            start: 0,
            current: 0,
            line: 1,
            tokens: Vec::new(),
        }
    }

    pub fn scan_tokens(mut self) -> Result<Vec<Token>, LexError> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token()?;
        }
        self.tokens.push(Token::new(TokenKind::Eof, self.line));
        Ok(self.tokens)
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> u8 {
        let c = self.source[self.current];
        self.current += 1;
        c
    }

    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.source[self.current]
        }
    }

    fn peek_next(&self) -> u8 {
        if self.current + 1 >= self.source.len() {
            0
        } else {
            self.source[self.current + 1]
        }
    }

    fn match_char(&mut self, expected: u8) -> bool {
        if self.is_at_end() || self.source[self.current] != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn add(&mut self, kind: TokenKind) {
        self.tokens.push(Token::new(kind, self.line));
    }

    fn scan_token(&mut self) -> Result<(), LexError> {
        let c = self.advance();
        use TokenKind::*;
        match c {
            b'(' => self.add(LeftParen),
            b')' => self.add(RightParen),
            b'{' => self.add(LeftBrace),
            b'}' => self.add(RightBrace),
            b'[' => self.add(LeftSquare),
            b']' => self.add(RightSquare),
            b',' => self.add(Comma),
            b';' => self.add(Semicolon),
            b'+' => self.add(Plus),
            b'-' => self.add(Minus),
            b'*' => self.add(Star),
            b'%' => self.add(Percent),
            b'!' => {
                let kind = if self.match_char(b'=') { BangEqual } else { Bang };
                self.add(kind);
            }
            b'=' => {
                let kind = if self.match_char(b'=') { EqualEqual } else { Equal };
                self.add(kind);
            }
            b'<' => {
                let kind = if self.match_char(b'=') { LessEqual } else { Less };
                self.add(kind);
            }
            b'>' => {
                let kind = if self.match_char(b'=') {
                    GreaterEqual
                } else {
                    Greater
                };
                self.add(kind);
            }
            b'/' => {
                if self.match_char(b'/') {
                    while self.peek() != b'\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    self.add(Slash);
                }
            }
            b' ' | b'\r' | b'\t' => {}
            b'\n' => self.line += 1,
            b'\'' => self.char_literal()?,
            b'"' => self.string_literal()?,
            c if c.is_ascii_digit() => self.number(),
            c if c.is_ascii_alphabetic() || c == b'_' => self.identifier(),
            other => {
                return Err(LexError::UnexpectedChar {
                    line: self.line,
                    ch: other as char,
                });
            }
        }
        Ok(())
    }

    fn escape(&mut self) -> Result<u8, LexError> {
        let c = self.advance();
        Ok(match c {
            b'n' => b'\n',
            b't' => b'\t',
            b'r' => b'\r',
            b'0' => 0,
            b'\\' => b'\\',
            b'\'' => b'\'',
            b'"' => b'"',
            other => {
                return Err(LexError::BadEscape {
                    line: self.line,
                    ch: other as char,
                });
            }
        })
    }

    fn char_literal(&mut self) -> Result<(), LexError> {
        if self.is_at_end() {
            return Err(LexError::UnterminatedChar { line: self.line });
        }
        let value = if self.peek() == b'\\' {
            self.advance();
            self.escape()?
        } else {
            if self.peek() == b'\'' {
                return Err(LexError::EmptyChar { line: self.line });
            }
            self.advance()
        };
        if !self.match_char(b'\'') {
            return Err(LexError::UnterminatedChar { line: self.line });
        }
        self.add(TokenKind::Number(value as i64));
        Ok(())
    }

    fn string_literal(&mut self) -> Result<(), LexError> {
        let mut value = String::new();
        loop {
            if self.is_at_end() {
                return Err(LexError::UnterminatedString { line: self.line });
            }
            let c = self.peek();
            if c == b'"' {
                self.advance();
                break;
            }
            if c == b'\n' {
                self.line += 1;
            }
            if c == b'\\' {
                self.advance();
                value.push(self.escape()? as char);
            } else {
                value.push(self.advance() as char);
            }
        }
        self.add(TokenKind::Str(value));
        Ok(())
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        let text = std::str::from_utf8(&self.source[self.start..self.current]).unwrap();
        let value: i64 = text.parse().expect("scanned digits must parse");
        self.add(TokenKind::Number(value));
    }

    fn identifier(&mut self) {
        while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
            self.advance();
        }
        let text = std::str::from_utf8(&self.source[self.start..self.current]).unwrap();
        let kind = match text {
            "fun" => TokenKind::Fun,
            "var" => TokenKind::Var,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "putc" => TokenKind::Putc,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            _ => TokenKind::Identifier(text.to_string()),
        };
        self.add(kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Scanner::new(src)
            .scan_tokens()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn scans_punctuation_and_operators() {
        let k = kinds("( ) { } [ ] , ; = ! - + * / % < <= > >= == !=");
        assert_eq!(
            k,
            vec![
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::LeftSquare,
                TokenKind::RightSquare,
                TokenKind::Comma,
                TokenKind::Semicolon,
                TokenKind::Equal,
                TokenKind::Bang,
                TokenKind::Minus,
                TokenKind::Plus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Percent,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::EqualEqual,
                TokenKind::BangEqual,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_char_literals_with_escapes() {
        assert_eq!(kinds("'a'"), vec![TokenKind::Number(b'a' as i64), TokenKind::Eof]);
        assert_eq!(kinds("'\\n'"), vec![TokenKind::Number(b'\n' as i64), TokenKind::Eof]);
        assert_eq!(kinds("'\\''"), vec![TokenKind::Number(b'\'' as i64), TokenKind::Eof]);
    }

    #[test]
    fn skips_line_comments() {
        assert_eq!(kinds("// whole line\n42"), vec![TokenKind::Number(42), TokenKind::Eof]);
    }

    #[test]
    fn rejects_unknown_character() {
        assert!(Scanner::new("@").scan_tokens().is_err());
    }

    #[test]
    fn rejects_unterminated_string() {
        assert!(Scanner::new("\"abc").scan_tokens().is_err());
    }
}
