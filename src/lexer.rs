//! Character-stream tokenizer with one-token lookahead.

use crate::token::{Token, TokenKind};

/// Scratch buffer bound on identifier/integer lexeme length (spec §4.3).
const MAX_LEXEME_LEN: usize = 1024;

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    peeked: Option<Token>,
    pub has_error: bool,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            peeked: None,
            has_error: false,
        }
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn advance_char(&mut self) -> Option<char> {
        let c = self.current();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn error(&mut self, line: usize, message: impl Into<String>) -> Token {
        self.has_error = true;
        Token::with_lexeme(TokenKind::Error, line, message.into())
    }

    /// Return the next token without consuming it. Idempotent until `next`.
    pub fn peek(&mut self) -> Token {
        if self.peeked.is_none() {
            self.peeked = Some(self.scan_token());
        }
        self.peeked.clone().unwrap()
    }

    /// Consume and return the next token.
    pub fn next(&mut self) -> Token {
        if let Some(tok) = self.peeked.take() {
            return tok;
        }
        self.scan_token()
    }

    fn skip_whitespace_and_track_lines(&mut self) {
        loop {
            match self.current() {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.pos += 1;
                }
                Some('\n') => {
                    self.pos += 1;
                    self.line += 1;
                }
                _ => break,
            }
        }
    }

    fn scan_token(&mut self) -> Token {
        self.skip_whitespace_and_track_lines();
        let line = self.line;
        let c = match self.advance_char() {
            Some(c) => c,
            None => return Token::new(TokenKind::Eof, line),
        };

        match c {
            '(' => Token::new(TokenKind::LParen, line),
            ')' => Token::new(TokenKind::RParen, line),
            '{' => Token::new(TokenKind::LBrace, line),
            '}' => Token::new(TokenKind::RBrace, line),
            ',' => Token::new(TokenKind::Comma, line),
            ';' => Token::new(TokenKind::Semicolon, line),
            '+' => Token::new(TokenKind::Plus, line),
            '-' => Token::new(TokenKind::Minus, line),
            '*' => Token::new(TokenKind::Star, line),
            '/' => Token::new(TokenKind::Slash, line),
            '=' => self.maximal_munch(line, TokenKind::Equal, TokenKind::EqualEqual),
            '<' => self.maximal_munch(line, TokenKind::Less, TokenKind::LessEqual),
            '>' => self.maximal_munch(line, TokenKind::Greater, TokenKind::GreaterEqual),
            '!' => self.maximal_munch(line, TokenKind::Bang, TokenKind::BangEqual),
            c if c.is_ascii_digit() => self.scan_int(line, c),
            c if c.is_alphabetic() => self.scan_ident(line, c),
            other => self.error(line, format!("unexpected character '{}'", other)),
        }
    }

    fn maximal_munch(&mut self, line: usize, base: TokenKind, equals: TokenKind) -> Token {
        if self.current() == Some('=') {
            self.pos += 1;
            Token::new(equals, line)
        } else {
            Token::new(base, line)
        }
    }

    fn scan_int(&mut self, line: usize, first: char) -> Token {
        let mut lexeme = String::new();
        lexeme.push(first);
        while let Some(c) = self.current() {
            if c.is_ascii_digit() {
                lexeme.push(c);
                self.pos += 1;
                if lexeme.len() > MAX_LEXEME_LEN {
                    return self.error(line, "integer literal too long");
                }
            } else if c.is_alphabetic() {
                // A digit run immediately followed by a letter is malformed
                // ("123abc"), not two tokens.
                return self.error(line, format!("malformed integer literal near '{}'", lexeme));
            } else {
                break;
            }
        }
        match lexeme.parse::<i64>() {
            Ok(_) => Token::with_lexeme(TokenKind::IntLit, line, lexeme),
            Err(_) => self.error(line, format!("integer literal '{}' out of range", lexeme)),
        }
    }

    fn scan_ident(&mut self, line: usize, first: char) -> Token {
        let mut lexeme = String::new();
        lexeme.push(first);
        while let Some(c) = self.current() {
            if c.is_alphanumeric() {
                lexeme.push(c);
                self.pos += 1;
                if lexeme.len() > MAX_LEXEME_LEN {
                    return self.error(line, "identifier too long");
                }
            } else {
                break;
            }
        }
        match TokenKind::keyword(&lexeme) {
            Some(kind) => Token::new(kind, line),
            None => Token::with_lexeme(TokenKind::Ident, line, lexeme),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next();
            let done = tok.kind == TokenKind::Eof;
            out.push(tok.kind);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn maximal_munch_two_char_operators() {
        let mut lexer = Lexer::new("= == < <= > >= ! !=");
        let got: Vec<_> = (0..8).map(|_| lexer.next().kind).collect();
        assert_eq!(
            got,
            vec![
                TokenKind::Equal,
                TokenKind::EqualEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Bang,
                TokenKind::BangEqual,
            ]
        );
    }

    #[test]
    fn peek_is_idempotent_until_next() {
        let mut lexer = Lexer::new("foo bar");
        let a = lexer.peek();
        let b = lexer.peek();
        assert_eq!(a.text(), b.text());
        let consumed = lexer.next();
        assert_eq!(consumed.text(), "foo");
        assert_eq!(lexer.next().text(), "bar");
    }

    #[test]
    fn newline_increments_line_number() {
        let mut lexer = Lexer::new("x\ny");
        let first = lexer.next();
        let second = lexer.next();
        assert_eq!(first.line, 1);
        assert_eq!(second.line, 2);
    }

    #[test]
    fn keywords_are_recognized() {
        assert_eq!(
            kinds("if else while print return int void and or"),
            vec![
                TokenKind::If,
                TokenKind::Else,
                TokenKind::While,
                TokenKind::Print,
                TokenKind::Return,
                TokenKind::Int,
                TokenKind::Void,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn integer_overflow_is_an_error_token() {
        let mut lexer = Lexer::new("99999999999999999999999");
        let tok = lexer.next();
        assert_eq!(tok.kind, TokenKind::Error);
        assert!(lexer.has_error);
    }

    #[test]
    fn identifier_length_is_bounded() {
        let long = "a".repeat(MAX_LEXEME_LEN + 1);
        let mut lexer = Lexer::new(&long);
        let tok = lexer.next();
        assert_eq!(tok.kind, TokenKind::Error);
        assert!(lexer.has_error);
    }
}
