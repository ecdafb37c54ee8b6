//! Lexer for Opal source code.
//!
//! Converts source text to a token stream. The lexer never fails: characters
//! it does not recognize become `Illegal` tokens and the parser reports them.

use std::iter::Peekable;
use std::str::Chars;

use crate::token::{Token, TokenKind, lookup_ident};

/// A lexer over a source string.
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    /// Create a lexer for the given source.
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
        }
    }

    /// Produce the next token. Returns an `Eof` token at the end of input
    /// and forever after.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let Some(ch) = self.chars.next() else {
            return Token::new(TokenKind::Eof, "");
        };

        match ch {
            '=' => {
                if self.chars.peek() == Some(&'=') {
                    self.chars.next();
                    Token::new(TokenKind::Eq, "==")
                } else {
                    Token::new(TokenKind::Assign, "=")
                }
            }
            '!' => {
                if self.chars.peek() == Some(&'=') {
                    self.chars.next();
                    Token::new(TokenKind::NotEq, "!=")
                } else {
                    Token::new(TokenKind::Bang, "!")
                }
            }
            '+' => Token::new(TokenKind::Plus, "+"),
            '-' => Token::new(TokenKind::Minus, "-"),
            '*' => Token::new(TokenKind::Asterisk, "*"),
            '/' => Token::new(TokenKind::Slash, "/"),
            '<' => Token::new(TokenKind::Lt, "<"),
            '>' => Token::new(TokenKind::Gt, ">"),
            ',' => Token::new(TokenKind::Comma, ","),
            ';' => Token::new(TokenKind::Semicolon, ";"),
            ':' => Token::new(TokenKind::Colon, ":"),
            '(' => Token::new(TokenKind::Lparen, "("),
            ')' => Token::new(TokenKind::Rparen, ")"),
            '{' => Token::new(TokenKind::Lbrace, "{"),
            '}' => Token::new(TokenKind::Rbrace, "}"),
            '[' => Token::new(TokenKind::Lbracket, "["),
            ']' => Token::new(TokenKind::Rbracket, "]"),
            '"' => self.read_string(),
            c if is_ident_start(c) => {
                let ident = self.read_identifier(c);
                let kind = lookup_ident(&ident);
                Token::new(kind, ident)
            }
            c if c.is_ascii_digit() => {
                let number = self.read_number(c);
                Token::new(TokenKind::Int, number)
            }
            c => Token::new(TokenKind::Illegal, c.to_string()),
        }
    }

    /// Lex the entire remaining input, including the trailing `Eof` token.
    pub fn tokens(mut self) -> Vec<Token> {
        let mut out = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            out.push(token);
            if done {
                return out;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.chars.peek()
            && c.is_whitespace()
        {
            self.chars.next();
        }
    }

    fn read_identifier(&mut self, first: char) -> String {
        let mut ident = String::from(first);
        while let Some(&c) = self.chars.peek()
            && is_ident_continue(c)
        {
            ident.push(c);
            self.chars.next();
        }
        ident
    }

    fn read_number(&mut self, first: char) -> String {
        let mut number = String::from(first);
        while let Some(&c) = self.chars.peek()
            && c.is_ascii_digit()
        {
            number.push(c);
            self.chars.next();
        }
        number
    }

    /// Read a string literal. The opening quote has been consumed; an
    /// unterminated string simply ends at the end of input.
    fn read_string(&mut self) -> Token {
        let mut s = String::new();
        for c in self.chars.by_ref() {
            if c == '"' {
                return Token::new(TokenKind::Str, s);
            }
            s.push(c);
        }
        Token::new(TokenKind::Str, s)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source).tokens().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn single_char_tokens() {
        use TokenKind::*;
        assert_eq!(
            kinds("=+(){},;"),
            vec![Assign, Plus, Lparen, Rparen, Lbrace, Rbrace, Comma, Semicolon, Eof]
        );
    }

    #[test]
    fn full_program() {
        use TokenKind::*;
        let source = r#"
            let five = 5;
            let add = fn(x, y) { x + y; };
            let result = add(five, 10);
        "#;
        assert_eq!(
            kinds(source),
            vec![
                Let, Ident, Assign, Int, Semicolon, //
                Let, Ident, Assign, Function, Lparen, Ident, Comma, Ident, Rparen, Lbrace, Ident,
                Plus, Ident, Semicolon, Rbrace, Semicolon, //
                Let, Ident, Assign, Ident, Lparen, Ident, Comma, Int, Rparen, Semicolon, //
                Eof,
            ]
        );
    }

    #[test]
    fn two_char_operators() {
        use TokenKind::*;
        assert_eq!(
            kinds("10 == 10; 10 != 9; !true"),
            vec![Int, Eq, Int, Semicolon, Int, NotEq, Int, Semicolon, Bang, True, Eof]
        );
    }

    #[test]
    fn comparison_and_arithmetic() {
        use TokenKind::*;
        assert_eq!(
            kinds("5 < 10 > 5 - / *"),
            vec![Int, Lt, Int, Gt, Int, Minus, Slash, Asterisk, Eof]
        );
    }

    #[test]
    fn string_literals() {
        let tokens = Lexer::new(r#""foobar" "foo bar" """#).tokens();
        assert_eq!(tokens[0], Token::new(TokenKind::Str, "foobar"));
        assert_eq!(tokens[1], Token::new(TokenKind::Str, "foo bar"));
        assert_eq!(tokens[2], Token::new(TokenKind::Str, ""));
    }

    #[test]
    fn brackets_and_colon() {
        use TokenKind::*;
        assert_eq!(
            kinds(r#"[1, 2]; {"a": 1}"#),
            vec![
                Lbracket, Int, Comma, Int, Rbracket, Semicolon, Lbrace, Str, Colon, Int, Rbrace,
                Eof
            ]
        );
    }

    #[test]
    fn keywords() {
        use TokenKind::*;
        assert_eq!(
            kinds("if (true) { return 1; } else { false }"),
            vec![
                If, Lparen, True, Rparen, Lbrace, Return, Int, Semicolon, Rbrace, Else, Lbrace,
                False, Rbrace, Eof
            ]
        );
    }

    #[test]
    fn illegal_characters() {
        let tokens = Lexer::new("1 @ 2").tokens();
        assert_eq!(tokens[1], Token::new(TokenKind::Illegal, "@"));
    }

    #[test]
    fn eof_is_sticky() {
        let mut lexer = Lexer::new("");
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    }
}
