//! Tokenizer for rule expressions.
//!
//! Positions are character offsets into the compiled rule text.

use crate::error::CompileError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Question,
    Colon,
    Arrow,
    Bang,
    AndAnd,
    OrOr,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: usize,
}

/// Split `source` into tokens, ending with `TokenKind::Eof`.
///
/// # Examples
///
/// ```rust
/// use itemfilter::lexer::{tokenize, TokenKind};
///
/// let tokens = tokenize("ItemLevel >= 80").unwrap();
/// assert_eq!(tokens[0].kind, TokenKind::Ident("ItemLevel".into()));
/// assert_eq!(tokens[1].kind, TokenKind::Ge);
/// assert_eq!(tokens[2].kind, TokenKind::Int(80));
/// assert_eq!(tokens[3].kind, TokenKind::Eof);
/// ```
pub fn tokenize(source: &str) -> Result<Vec<Token>, CompileError> {
    Lexer {
        chars: source.chars().collect(),
        pos: 0,
    }
    .run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn run(mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
                continue;
            }
            let start = self.pos;
            let kind = if c.is_ascii_digit() {
                self.number()?
            } else if c == '"' || c == '\'' {
                self.string(c)?
            } else if c.is_alphabetic() || c == '_' {
                self.ident()
            } else {
                self.symbol()?
            };
            tokens.push(Token { kind, pos: start });
        }
        tokens.push(Token {
            kind: TokenKind::Eof,
            pos: self.pos,
        });
        Ok(tokens)
    }

    fn ident(&mut self) -> TokenKind {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        TokenKind::Ident(self.chars[start..self.pos].iter().collect())
    }

    fn number(&mut self) -> Result<TokenKind, CompileError> {
        let start = self.pos;
        let mut is_float = false;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            self.pos += 1;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = usize::from(matches!(self.peek_at(1), Some('+' | '-')));
            if matches!(self.peek_at(1 + sign), Some(c) if c.is_ascii_digit()) {
                is_float = true;
                self.pos += 1 + sign;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();

        // Numeric suffixes: f/d/m make a real literal, l keeps it integral.
        match self.peek() {
            Some('f' | 'F' | 'd' | 'D' | 'm' | 'M') => {
                is_float = true;
                self.pos += 1;
            }
            Some('l' | 'L') => self.pos += 1,
            _ => {}
        }

        if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| CompileError::at(format!("Invalid real literal '{}'", text), start))
        } else {
            text.parse::<i64>()
                .map(TokenKind::Int)
                .map_err(|_| CompileError::at(format!("Invalid integer literal '{}'", text), start))
        }
    }

    fn string(&mut self, quote: char) -> Result<TokenKind, CompileError> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        loop {
            let c = self
                .peek()
                .ok_or_else(|| CompileError::at("Unterminated string literal", start))?;
            self.pos += 1;
            match c {
                '\\' => {
                    let escaped = self
                        .peek()
                        .ok_or_else(|| CompileError::at("Unterminated string literal", start))?;
                    self.pos += 1;
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        other => other,
                    });
                }
                c if c == quote => {
                    // A doubled quote is an escaped quote.
                    if self.peek() == Some(quote) {
                        self.pos += 1;
                        out.push(quote);
                    } else {
                        return Ok(TokenKind::Str(out));
                    }
                }
                other => out.push(other),
            }
        }
    }

    fn symbol(&mut self) -> Result<TokenKind, CompileError> {
        let start = self.pos;
        let c = self.chars[self.pos];
        let next = self.peek_at(1);
        let (kind, width) = match (c, next) {
            ('&', Some('&')) => (TokenKind::AndAnd, 2),
            ('|', Some('|')) => (TokenKind::OrOr, 2),
            ('=', Some('=')) => (TokenKind::EqEq, 2),
            ('=', Some('>')) => (TokenKind::Arrow, 2),
            ('=', _) => (TokenKind::EqEq, 1),
            ('!', Some('=')) => (TokenKind::NotEq, 2),
            ('!', _) => (TokenKind::Bang, 1),
            ('<', Some('>')) => (TokenKind::NotEq, 2),
            ('<', Some('=')) => (TokenKind::Le, 2),
            ('<', _) => (TokenKind::Lt, 1),
            ('>', Some('=')) => (TokenKind::Ge, 2),
            ('>', _) => (TokenKind::Gt, 1),
            ('(', _) => (TokenKind::LParen, 1),
            (')', _) => (TokenKind::RParen, 1),
            ('[', _) => (TokenKind::LBracket, 1),
            (']', _) => (TokenKind::RBracket, 1),
            ('{', _) => (TokenKind::LBrace, 1),
            ('}', _) => (TokenKind::RBrace, 1),
            (',', _) => (TokenKind::Comma, 1),
            ('.', _) => (TokenKind::Dot, 1),
            ('?', _) => (TokenKind::Question, 1),
            (':', _) => (TokenKind::Colon, 1),
            ('+', _) => (TokenKind::Plus, 1),
            ('-', _) => (TokenKind::Minus, 1),
            ('*', _) => (TokenKind::Star, 1),
            ('/', _) => (TokenKind::Slash, 1),
            ('%', _) => (TokenKind::Percent, 1),
            (other, _) => {
                return Err(CompileError::at(
                    format!("Syntax error '{}'", other),
                    start,
                ))
            }
        };
        self.pos += width;
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a && b || !c"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::AndAnd,
                TokenKind::Ident("b".into()),
                TokenKind::OrOr,
                TokenKind::Bang,
                TokenKind::Ident("c".into()),
                TokenKind::Eof,
            ]
        );
        assert_eq!(kinds("= == != <>")[..4], [TokenKind::EqEq, TokenKind::EqEq, TokenKind::NotEq, TokenKind::NotEq]);
        assert_eq!(kinds("x => 1")[1], TokenKind::Arrow);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("42")[0], TokenKind::Int(42));
        assert_eq!(kinds("1.5")[0], TokenKind::Float(1.5));
        assert_eq!(kinds("2f")[0], TokenKind::Float(2.0));
        assert_eq!(kinds("3L")[0], TokenKind::Int(3));
        assert_eq!(kinds("1e3")[0], TokenKind::Float(1000.0));
    }

    #[test]
    fn test_member_after_int_is_not_float() {
        assert_eq!(kinds("1.ToString")[..3], [TokenKind::Int(1), TokenKind::Dot, TokenKind::Ident("ToString".into())]);
    }

    #[test]
    fn test_strings() {
        assert_eq!(kinds(r#""Chaos Orb""#)[0], TokenKind::Str("Chaos Orb".into()));
        assert_eq!(kinds(r#""a\"b""#)[0], TokenKind::Str("a\"b".into()));
        assert_eq!(kinds("'single'")[0], TokenKind::Str("single".into()));
    }

    #[test]
    fn test_positions_are_char_offsets() {
        let tokens = tokenize("\"é\" == x").unwrap();
        assert_eq!(tokens[1].pos, 4);
        assert_eq!(tokens[2].pos, 7);
    }

    #[test]
    fn test_errors() {
        let err = tokenize("Name == \"open").unwrap_err();
        assert_eq!(err.position, Some(8));
        let err = tokenize("a # b").unwrap_err();
        assert_eq!(err.position, Some(2));
    }
}
