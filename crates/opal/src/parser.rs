//! Parser for Opal source code.
//!
//! A Pratt (top-down operator precedence) parser over the lexer's token
//! stream. Errors are collected rather than fail-fast: a bad statement is
//! skipped and parsing continues, so a REPL line can report everything
//! wrong with it at once.

use std::fmt;

use crate::ast::{BlockStatement, Expression, Program, Statement};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

/// Binding power, weakest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    /// `==` `!=`
    Equals,
    /// `<` `>`
    LessGreater,
    /// `+` `-`
    Sum,
    /// `*` `/`
    Product,
    /// `-x` `!x`
    Prefix,
    /// `f(x)`
    Call,
    /// `a[0]`
    Index,
}

fn precedence_of(kind: TokenKind) -> Precedence {
    match kind {
        TokenKind::Eq | TokenKind::NotEq => Precedence::Equals,
        TokenKind::Lt | TokenKind::Gt => Precedence::LessGreater,
        TokenKind::Plus | TokenKind::Minus => Precedence::Sum,
        TokenKind::Asterisk | TokenKind::Slash => Precedence::Product,
        TokenKind::Lparen => Precedence::Call,
        TokenKind::Lbracket => Precedence::Index,
        _ => Precedence::Lowest,
    }
}

/// Parse error with context about what was expected and found.
#[derive(Clone, Debug)]
pub struct ParseError {
    /// Human-readable error message.
    pub message: String,
    /// What was expected (if applicable).
    pub expected: Option<String>,
    /// What was found (if applicable).
    pub found: Option<String>,
}

impl ParseError {
    /// Create a simple error with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            expected: None,
            found: None,
        }
    }

    /// Create an error with expected/found context.
    pub fn expected(expected: impl Into<String>, found: impl Into<String>) -> Self {
        let expected = expected.into();
        let found = found.into();
        Self {
            message: format!("expected {}, found {}", expected, found),
            expected: Some(expected),
            found: Some(found),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parse a source string into a program, or the list of everything wrong
/// with it.
pub fn parse(source: &str) -> Result<Program, Vec<ParseError>> {
    let mut parser = Parser::new(source);
    let program = parser.parse_program();
    if parser.errors.is_empty() {
        Ok(program)
    } else {
        Err(parser.errors)
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    cur: Token,
    peek: Token,
    errors: Vec<ParseError>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        let mut lexer = Lexer::new(source);
        let cur = lexer.next_token();
        let peek = lexer.next_token();
        Self {
            lexer,
            cur,
            peek,
            errors: Vec::new(),
        }
    }

    fn next_token(&mut self) {
        self.cur = std::mem::replace(&mut self.peek, self.lexer.next_token());
    }

    /// Advance past `kind` in peek position, or record an error.
    fn expect_peek(&mut self, kind: TokenKind) -> bool {
        if self.peek.kind == kind {
            self.next_token();
            true
        } else {
            self.errors.push(ParseError::expected(
                kind.describe(),
                self.peek.kind.describe(),
            ));
            false
        }
    }

    fn parse_program(&mut self) -> Program {
        let mut program = Program::default();
        while self.cur.kind != TokenKind::Eof {
            if let Some(statement) = self.parse_statement() {
                program.statements.push(statement);
            }
            self.next_token();
        }
        program
    }

    // === Statements ===

    fn parse_statement(&mut self) -> Option<Statement> {
        match self.cur.kind {
            TokenKind::Let => self.parse_let_statement(),
            TokenKind::Return => self.parse_return_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_let_statement(&mut self) -> Option<Statement> {
        if !self.expect_peek(TokenKind::Ident) {
            return None;
        }
        let name = self.cur.literal.clone();

        if !self.expect_peek(TokenKind::Assign) {
            return None;
        }
        self.next_token();

        let mut value = self.parse_expression(Precedence::Lowest)?;
        // Tag a function literal with the name it is bound to, so recursive
        // functions render by name.
        if let Expression::FunctionLiteral {
            name: literal_name, ..
        } = &mut value
        {
            *literal_name = Some(name.clone());
        }

        if self.peek.kind == TokenKind::Semicolon {
            self.next_token();
        }
        Some(Statement::Let { name, value })
    }

    fn parse_return_statement(&mut self) -> Option<Statement> {
        self.next_token();
        let value = self.parse_expression(Precedence::Lowest)?;
        if self.peek.kind == TokenKind::Semicolon {
            self.next_token();
        }
        Some(Statement::Return { value })
    }

    fn parse_expression_statement(&mut self) -> Option<Statement> {
        let expression = self.parse_expression(Precedence::Lowest)?;
        if self.peek.kind == TokenKind::Semicolon {
            self.next_token();
        }
        Some(Statement::Expression { expression })
    }

    fn parse_block_statement(&mut self) -> BlockStatement {
        let mut block = BlockStatement {
            statements: Vec::new(),
        };
        self.next_token();
        while self.cur.kind != TokenKind::Rbrace {
            if self.cur.kind == TokenKind::Eof {
                self.errors
                    .push(ParseError::expected("'}'", TokenKind::Eof.describe()));
                break;
            }
            if let Some(statement) = self.parse_statement() {
                block.statements.push(statement);
            }
            self.next_token();
        }
        block
    }

    // === Expressions ===

    fn parse_expression(&mut self, precedence: Precedence) -> Option<Expression> {
        let mut left = self.parse_prefix()?;

        while self.peek.kind != TokenKind::Semicolon && precedence < precedence_of(self.peek.kind)
        {
            left = match self.peek.kind {
                TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Asterisk
                | TokenKind::Slash
                | TokenKind::Lt
                | TokenKind::Gt
                | TokenKind::Eq
                | TokenKind::NotEq => {
                    self.next_token();
                    self.parse_infix_expression(left)?
                }
                TokenKind::Lparen => {
                    self.next_token();
                    self.parse_call_expression(left)?
                }
                TokenKind::Lbracket => {
                    self.next_token();
                    self.parse_index_expression(left)?
                }
                _ => return Some(left),
            };
        }
        Some(left)
    }

    fn parse_prefix(&mut self) -> Option<Expression> {
        match self.cur.kind {
            TokenKind::Ident => Some(Expression::Identifier(self.cur.literal.clone())),
            TokenKind::Int => self.parse_integer_literal(),
            TokenKind::Str => Some(Expression::StringLiteral(self.cur.literal.clone())),
            TokenKind::True => Some(Expression::Boolean(true)),
            TokenKind::False => Some(Expression::Boolean(false)),
            TokenKind::Bang | TokenKind::Minus => self.parse_prefix_expression(),
            TokenKind::Lparen => self.parse_grouped_expression(),
            TokenKind::If => self.parse_if_expression(),
            TokenKind::Function => self.parse_function_literal(),
            TokenKind::Lbracket => {
                let elements = self.parse_expression_list(TokenKind::Rbracket)?;
                Some(Expression::ArrayLiteral(elements))
            }
            TokenKind::Lbrace => self.parse_hash_literal(),
            kind => {
                self.errors.push(ParseError::new(format!(
                    "no expression starts with {}",
                    kind.describe()
                )));
                None
            }
        }
    }

    fn parse_integer_literal(&mut self) -> Option<Expression> {
        match self.cur.literal.parse::<i64>() {
            Ok(value) => Some(Expression::IntegerLiteral(value)),
            Err(_) => {
                self.errors.push(ParseError::new(format!(
                    "could not parse {} as an integer",
                    self.cur.literal
                )));
                None
            }
        }
    }

    fn parse_prefix_expression(&mut self) -> Option<Expression> {
        let operator = self.cur.literal.clone();
        self.next_token();
        let right = self.parse_expression(Precedence::Prefix)?;
        Some(Expression::Prefix {
            operator,
            right: Box::new(right),
        })
    }

    fn parse_infix_expression(&mut self, left: Expression) -> Option<Expression> {
        let operator = self.cur.literal.clone();
        let precedence = precedence_of(self.cur.kind);
        self.next_token();
        let right = self.parse_expression(precedence)?;
        Some(Expression::Infix {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_grouped_expression(&mut self) -> Option<Expression> {
        self.next_token();
        let expression = self.parse_expression(Precedence::Lowest)?;
        if !self.expect_peek(TokenKind::Rparen) {
            return None;
        }
        Some(expression)
    }

    fn parse_if_expression(&mut self) -> Option<Expression> {
        if !self.expect_peek(TokenKind::Lparen) {
            return None;
        }
        self.next_token();
        let condition = self.parse_expression(Precedence::Lowest)?;
        if !self.expect_peek(TokenKind::Rparen) {
            return None;
        }
        if !self.expect_peek(TokenKind::Lbrace) {
            return None;
        }
        let consequence = self.parse_block_statement();

        let alternative = if self.peek.kind == TokenKind::Else {
            self.next_token();
            if !self.expect_peek(TokenKind::Lbrace) {
                return None;
            }
            Some(self.parse_block_statement())
        } else {
            None
        };

        Some(Expression::If {
            condition: Box::new(condition),
            consequence,
            alternative,
        })
    }

    fn parse_function_literal(&mut self) -> Option<Expression> {
        if !self.expect_peek(TokenKind::Lparen) {
            return None;
        }
        let parameters = self.parse_function_parameters()?;
        if !self.expect_peek(TokenKind::Lbrace) {
            return None;
        }
        let body = self.parse_block_statement();
        Some(Expression::FunctionLiteral {
            name: None,
            parameters,
            body,
        })
    }

    fn parse_function_parameters(&mut self) -> Option<Vec<String>> {
        let mut parameters = Vec::new();
        if self.peek.kind == TokenKind::Rparen {
            self.next_token();
            return Some(parameters);
        }

        self.next_token();
        parameters.push(self.parse_parameter_name()?);
        while self.peek.kind == TokenKind::Comma {
            self.next_token();
            self.next_token();
            parameters.push(self.parse_parameter_name()?);
        }

        if !self.expect_peek(TokenKind::Rparen) {
            return None;
        }
        Some(parameters)
    }

    fn parse_parameter_name(&mut self) -> Option<String> {
        if self.cur.kind != TokenKind::Ident {
            self.errors.push(ParseError::expected(
                TokenKind::Ident.describe(),
                self.cur.kind.describe(),
            ));
            return None;
        }
        Some(self.cur.literal.clone())
    }

    fn parse_call_expression(&mut self, function: Expression) -> Option<Expression> {
        let arguments = self.parse_expression_list(TokenKind::Rparen)?;
        Some(Expression::Call {
            function: Box::new(function),
            arguments,
        })
    }

    fn parse_index_expression(&mut self, left: Expression) -> Option<Expression> {
        self.next_token();
        let index = self.parse_expression(Precedence::Lowest)?;
        if !self.expect_peek(TokenKind::Rbracket) {
            return None;
        }
        Some(Expression::Index {
            left: Box::new(left),
            index: Box::new(index),
        })
    }

    fn parse_expression_list(&mut self, end: TokenKind) -> Option<Vec<Expression>> {
        let mut list = Vec::new();
        if self.peek.kind == end {
            self.next_token();
            return Some(list);
        }

        self.next_token();
        list.push(self.parse_expression(Precedence::Lowest)?);
        while self.peek.kind == TokenKind::Comma {
            self.next_token();
            self.next_token();
            list.push(self.parse_expression(Precedence::Lowest)?);
        }

        if !self.expect_peek(end) {
            return None;
        }
        Some(list)
    }

    fn parse_hash_literal(&mut self) -> Option<Expression> {
        let mut pairs = Vec::new();
        while self.peek.kind != TokenKind::Rbrace {
            self.next_token();
            let key = self.parse_expression(Precedence::Lowest)?;
            if !self.expect_peek(TokenKind::Colon) {
                return None;
            }
            self.next_token();
            let value = self.parse_expression(Precedence::Lowest)?;
            pairs.push((key, value));

            if self.peek.kind != TokenKind::Rbrace && !self.expect_peek(TokenKind::Comma) {
                return None;
            }
        }
        if !self.expect_peek(TokenKind::Rbrace) {
            return None;
        }
        Some(Expression::HashLiteral(pairs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Program {
        parse(source).unwrap_or_else(|errors| {
            panic!("parse errors for {:?}: {:?}", source, errors);
        })
    }

    fn single_expression(source: &str) -> Expression {
        let mut program = parse_ok(source);
        assert_eq!(program.statements.len(), 1, "source: {:?}", source);
        match program.statements.remove(0) {
            Statement::Expression { expression } => expression,
            other => panic!("expected an expression statement, got {:?}", other),
        }
    }

    #[test]
    fn let_statements() {
        let program = parse_ok("let x = 5; let y = true; let foobar = y;");
        assert_eq!(
            program.statements,
            vec![
                Statement::Let {
                    name: "x".into(),
                    value: Expression::IntegerLiteral(5),
                },
                Statement::Let {
                    name: "y".into(),
                    value: Expression::Boolean(true),
                },
                Statement::Let {
                    name: "foobar".into(),
                    value: Expression::Identifier("y".into()),
                },
            ]
        );
    }

    #[test]
    fn let_binds_function_literal_names() {
        let program = parse_ok("let double = fn(x) { x * 2 };");
        let Statement::Let { value, .. } = &program.statements[0] else {
            panic!("expected a let statement");
        };
        let Expression::FunctionLiteral { name, .. } = value else {
            panic!("expected a function literal");
        };
        assert_eq!(name.as_deref(), Some("double"));
    }

    #[test]
    fn return_statements() {
        let program = parse_ok("return 5; return x;");
        assert_eq!(
            program.statements,
            vec![
                Statement::Return {
                    value: Expression::IntegerLiteral(5),
                },
                Statement::Return {
                    value: Expression::Identifier("x".into()),
                },
            ]
        );
    }

    #[test]
    fn literal_expressions() {
        assert_eq!(
            single_expression("foobar;"),
            Expression::Identifier("foobar".into())
        );
        assert_eq!(single_expression("5;"), Expression::IntegerLiteral(5));
        assert_eq!(
            single_expression(r#""hello world";"#),
            Expression::StringLiteral("hello world".into())
        );
        assert_eq!(single_expression("true;"), Expression::Boolean(true));
    }

    #[test]
    fn prefix_expressions() {
        assert_eq!(
            single_expression("!5;"),
            Expression::Prefix {
                operator: "!".into(),
                right: Box::new(Expression::IntegerLiteral(5)),
            }
        );
        assert_eq!(
            single_expression("-15;"),
            Expression::Prefix {
                operator: "-".into(),
                right: Box::new(Expression::IntegerLiteral(15)),
            }
        );
    }

    #[test]
    fn infix_expressions() {
        for operator in ["+", "-", "*", "/", ">", "<", "==", "!="] {
            let expression = single_expression(&format!("5 {} 5;", operator));
            assert_eq!(
                expression,
                Expression::Infix {
                    operator: operator.into(),
                    left: Box::new(Expression::IntegerLiteral(5)),
                    right: Box::new(Expression::IntegerLiteral(5)),
                },
                "operator {:?}",
                operator
            );
        }
    }

    #[test]
    fn operator_precedence() {
        let cases = [
            ("-a * b", "((-a) * b)"),
            ("!-a", "(!(-a))"),
            ("a + b + c", "((a + b) + c)"),
            ("a + b - c", "((a + b) - c)"),
            ("a * b * c", "((a * b) * c)"),
            ("a + b / c", "(a + (b / c))"),
            ("5 > 4 == 3 < 4", "((5 > 4) == (3 < 4))"),
            ("3 + 4 * 5 == 3 * 1 + 4 * 5", "((3 + (4 * 5)) == ((3 * 1) + (4 * 5)))"),
            ("3 > 5 == false", "((3 > 5) == false)"),
            ("1 + (2 + 3) + 4", "((1 + (2 + 3)) + 4)"),
            ("(5 + 5) * 2", "((5 + 5) * 2)"),
            ("-(5 + 5)", "(-(5 + 5))"),
            ("!(true == true)", "(!(true == true))"),
            ("a + add(b * c) + d", "((a + add((b * c))) + d)"),
            ("a * [1, 2, 3, 4][b * c] * d", "((a * ([1, 2, 3, 4][(b * c)])) * d)"),
            ("add(a * b[2], b[1], 2 * [1, 2][1])", "add((a * (b[2])), (b[1]), (2 * ([1, 2][1])))"),
        ];
        for (source, expected) in cases {
            assert_eq!(parse_ok(source).to_string(), expected, "source {:?}", source);
        }
    }

    #[test]
    fn if_expression_without_else() {
        let Expression::If {
            condition,
            consequence,
            alternative,
        } = single_expression("if (x < y) { x }")
        else {
            panic!("expected an if expression");
        };
        assert_eq!(condition.to_string(), "(x < y)");
        assert_eq!(consequence.to_string(), "x");
        assert!(alternative.is_none());
    }

    #[test]
    fn if_expression_with_else() {
        let Expression::If { alternative, .. } = single_expression("if (x < y) { x } else { y }")
        else {
            panic!("expected an if expression");
        };
        assert_eq!(alternative.expect("else branch").to_string(), "y");
    }

    #[test]
    fn function_literals() {
        let Expression::FunctionLiteral {
            parameters, body, ..
        } = single_expression("fn(x, y) { x + y; }")
        else {
            panic!("expected a function literal");
        };
        assert_eq!(parameters, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(body.to_string(), "(x + y)");
    }

    #[test]
    fn function_parameter_lists() {
        for (source, expected) in [
            ("fn() {};", vec![]),
            ("fn(x) {};", vec!["x"]),
            ("fn(x, y, z) {};", vec!["x", "y", "z"]),
        ] {
            let Expression::FunctionLiteral { parameters, .. } = single_expression(source) else {
                panic!("expected a function literal");
            };
            assert_eq!(parameters, expected, "source {:?}", source);
        }
    }

    #[test]
    fn call_expressions() {
        let Expression::Call {
            function,
            arguments,
        } = single_expression("add(1, 2 * 3, 4 + 5);")
        else {
            panic!("expected a call expression");
        };
        assert_eq!(function.to_string(), "add");
        assert_eq!(arguments.len(), 3);
        assert_eq!(arguments[1].to_string(), "(2 * 3)");
    }

    #[test]
    fn array_literals_and_index() {
        assert_eq!(
            single_expression("[1, 2 * 2, 3 + 3]").to_string(),
            "[1, (2 * 2), (3 + 3)]"
        );
        assert_eq!(
            single_expression("myArray[1 + 1]").to_string(),
            "(myArray[(1 + 1)])"
        );
        assert_eq!(single_expression("[]"), Expression::ArrayLiteral(vec![]));
    }

    #[test]
    fn hash_literals() {
        let Expression::HashLiteral(pairs) = single_expression(r#"{"one": 1, "two": 2}"#) else {
            panic!("expected a hash literal");
        };
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0, Expression::StringLiteral("one".into()));
        assert_eq!(pairs[0].1, Expression::IntegerLiteral(1));

        assert_eq!(
            single_expression("{}"),
            Expression::HashLiteral(vec![])
        );

        // Pairs keep their source order in the AST.
        let Expression::HashLiteral(pairs) = single_expression("{3: 4, 1: 2}") else {
            panic!("expected a hash literal");
        };
        assert_eq!(pairs[0].0, Expression::IntegerLiteral(3));
    }

    #[test]
    fn errors_carry_expected_and_found() {
        let errors = parse("let x 5;").expect_err("should not parse");
        assert!(!errors.is_empty());
        assert_eq!(errors[0].message, "expected '=', found integer literal");
        assert_eq!(errors[0].expected.as_deref(), Some("'='"));
        assert_eq!(errors[0].found.as_deref(), Some("integer literal"));
    }

    #[test]
    fn errors_are_collected_across_statements() {
        let errors = parse("let = 1; let y 2;").expect_err("should not parse");
        assert!(errors.len() >= 2, "got {:?}", errors);
    }

    #[test]
    fn unclosed_block_is_an_error() {
        assert!(parse("if (x) { 1").is_err());
    }

    #[test]
    fn illegal_character_is_reported() {
        let errors = parse("1 + $").expect_err("should not parse");
        assert!(
            errors[0].message.contains("illegal character"),
            "got {:?}",
            errors
        );
    }
}
