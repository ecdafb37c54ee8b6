//! Abstract syntax tree for Opal programs.
//!
//! Every node implements `Display`, rendering canonical source text. The
//! compiler relies on this rendering to order hash-literal keys
//! deterministically, and the evaluator uses it to print function values.

use std::fmt;

/// The root node: a program is a sequence of statements.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

/// A `{ ... }` block.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockStatement {
    pub statements: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    /// `let <name> = <value>;`
    Let { name: String, value: Expression },
    /// `return <value>;`
    Return { value: Expression },
    /// A bare expression used as a statement.
    Expression { expression: Expression },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    Identifier(String),
    IntegerLiteral(i64),
    StringLiteral(String),
    Boolean(bool),
    /// `!right` or `-right`.
    Prefix {
        operator: String,
        right: Box<Expression>,
    },
    /// `left <op> right`.
    Infix {
        operator: String,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// `if (<cond>) { ... } else { ... }` — the else branch is optional.
    If {
        condition: Box<Expression>,
        consequence: BlockStatement,
        alternative: Option<BlockStatement>,
    },
    /// `fn(<params>) { ... }`. `name` is filled in when the literal is the
    /// value of a `let`, so recursive functions can be rendered by name.
    FunctionLiteral {
        name: Option<String>,
        parameters: Vec<String>,
        body: BlockStatement,
    },
    /// `<function>(<arguments>)`.
    Call {
        function: Box<Expression>,
        arguments: Vec<Expression>,
    },
    /// `[a, b, c]`.
    ArrayLiteral(Vec<Expression>),
    /// `{k: v, ...}` — pairs in source order.
    HashLiteral(Vec<(Expression, Expression)>),
    /// `<left>[<index>]`.
    Index {
        left: Box<Expression>,
        index: Box<Expression>,
    },
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            write!(f, "{}", statement)?;
        }
        Ok(())
    }
}

impl fmt::Display for BlockStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            write!(f, "{}", statement)?;
        }
        Ok(())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Let { name, value } => write!(f, "let {} = {};", name, value),
            Statement::Return { value } => write!(f, "return {};", value),
            Statement::Expression { expression } => write!(f, "{}", expression),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Identifier(name) => write!(f, "{}", name),
            Expression::IntegerLiteral(value) => write!(f, "{}", value),
            Expression::StringLiteral(value) => write!(f, "{}", value),
            Expression::Boolean(value) => write!(f, "{}", value),
            Expression::Prefix { operator, right } => write!(f, "({}{})", operator, right),
            Expression::Infix {
                operator,
                left,
                right,
            } => write!(f, "({} {} {})", left, operator, right),
            Expression::If {
                condition,
                consequence,
                alternative,
            } => {
                write!(f, "if{} {}", condition, consequence)?;
                if let Some(alternative) = alternative {
                    write!(f, "else {}", alternative)?;
                }
                Ok(())
            }
            Expression::FunctionLiteral {
                name,
                parameters,
                body,
            } => {
                write!(f, "fn")?;
                if let Some(name) = name {
                    write!(f, "<{}>", name)?;
                }
                write!(f, "({}) {}", parameters.join(", "), body)
            }
            Expression::Call {
                function,
                arguments,
            } => {
                let args: Vec<String> = arguments.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", function, args.join(", "))
            }
            Expression::ArrayLiteral(elements) => {
                let elems: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", elems.join(", "))
            }
            Expression::HashLiteral(pairs) => {
                let pairs: Vec<String> =
                    pairs.iter().map(|(k, v)| format!("{}:{}", k, v)).collect();
                write!(f, "{{{}}}", pairs.join(", "))
            }
            Expression::Index { left, index } => write!(f, "({}[{}])", left, index),
        }
    }
}
