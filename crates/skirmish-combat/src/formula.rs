//! Sandboxed formula language for authored regen and drain expressions.
//!
//! Content authors write small arithmetic expressions such as
//! `b.mhp * 0.05 + v[12]` or `Math.max(a.mat - b.mdf, 0) * s.stacks`.
//! Source text is parsed once into an [`Expr`] tree and evaluated against a
//! [`FormulaScope`]; nothing outside the scope is reachable.
//!
//! ## Grammar
//!
//! ```text
//! expr        := or ( '?' expr ':' expr )?
//! or          := and ( '||' and )*
//! and         := equality ( '&&' equality )*
//! equality    := comparison ( ( '==' | '!=' ) comparison )*
//! comparison  := additive ( ( '<' | '<=' | '>' | '>=' ) additive )*
//! additive    := term ( ( '+' | '-' ) term )*
//! term        := unary ( ( '*' | '/' | '%' ) unary )*
//! unary       := ( '-' | '+' | '!' ) unary | primary
//! primary     := number | 'true' | 'false' | '(' expr ')'
//!              | 'v' '[' expr ']' | path | path '(' args ')'
//! path        := ident ( '.' ident )*
//! ```

use std::fmt;

use ahash::AHashMap;
use thiserror::Error;

/// Maximum nesting depth accepted by the parser.
const MAX_DEPTH: usize = 48;

/// Errors produced while parsing or evaluating a formula.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// A character outside the language.
    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedChar {
        /// Offending character
        ch: char,
        /// Byte offset
        pos: usize,
    },

    /// A token in the wrong place.
    #[error("unexpected {found} at {pos}, expected {expected}")]
    UnexpectedToken {
        /// Token found
        found: String,
        /// Byte offset
        pos: usize,
        /// What the parser wanted
        expected: &'static str,
    },

    /// Input ended mid-expression.
    #[error("unexpected end of formula")]
    UnexpectedEnd,

    /// Malformed numeric literal.
    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    /// Path that the scope cannot resolve.
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    /// Call to a function outside the whitelist.
    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    /// Wrong argument count.
    #[error("function '{name}' got {got} arguments")]
    Arity {
        /// Function name
        name: &'static str,
        /// Arguments supplied
        got: usize,
    },

    /// Expression nested beyond the parser limit.
    #[error("formula nested deeper than {MAX_DEPTH} levels")]
    TooDeep,

    /// Evaluation produced NaN or an infinity.
    #[error("formula produced a non-finite value")]
    NonFinite,
}

// ============================================================================
// Tokens
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Equal,
    NotEqual,
    And,
    Or,
    Question,
    Colon,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "number {n}"),
            Self::Ident(name) => write!(f, "identifier '{name}'"),
            Self::Dot => write!(f, "'.'"),
            Self::Comma => write!(f, "','"),
            Self::LParen => write!(f, "'('"),
            Self::RParen => write!(f, "')'"),
            Self::LBracket => write!(f, "'['"),
            Self::RBracket => write!(f, "']'"),
            Self::Plus => write!(f, "'+'"),
            Self::Minus => write!(f, "'-'"),
            Self::Star => write!(f, "'*'"),
            Self::Slash => write!(f, "'/'"),
            Self::Percent => write!(f, "'%'"),
            Self::Bang => write!(f, "'!'"),
            Self::Less => write!(f, "'<'"),
            Self::LessEq => write!(f, "'<='"),
            Self::Greater => write!(f, "'>'"),
            Self::GreaterEq => write!(f, "'>='"),
            Self::Equal => write!(f, "'=='"),
            Self::NotEqual => write!(f, "'!='"),
            Self::And => write!(f, "'&&'"),
            Self::Or => write!(f, "'||'"),
            Self::Question => write!(f, "'?'"),
            Self::Colon => write!(f, "':'"),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, FormulaError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        if ch.is_ascii_digit() {
            let mut literal = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if c.is_ascii_digit() || c == '.' {
                    literal.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            let value = literal
                .parse::<f64>()
                .map_err(|_| FormulaError::InvalidNumber(literal.clone()))?;
            tokens.push((Token::Number(value), pos));
            continue;
        }

        if ch.is_ascii_alphabetic() || ch == '_' || ch == '$' {
            let mut name = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
                    name.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push((Token::Ident(name), pos));
            continue;
        }

        chars.next();
        let next = chars.peek().map(|&(_, c)| c);
        let token = match (ch, next) {
            ('+', _) => Token::Plus,
            ('-', _) => Token::Minus,
            ('*', _) => Token::Star,
            ('/', _) => Token::Slash,
            ('%', _) => Token::Percent,
            ('(', _) => Token::LParen,
            (')', _) => Token::RParen,
            ('[', _) => Token::LBracket,
            (']', _) => Token::RBracket,
            (',', _) => Token::Comma,
            ('.', _) => Token::Dot,
            ('?', _) => Token::Question,
            (':', _) => Token::Colon,
            ('<', Some('=')) => {
                chars.next();
                Token::LessEq
            },
            ('<', _) => Token::Less,
            ('>', Some('=')) => {
                chars.next();
                Token::GreaterEq
            },
            ('>', _) => Token::Greater,
            ('!', Some('=')) => {
                chars.next();
                if chars.peek().map(|&(_, c)| c) == Some('=') {
                    chars.next();
                }
                Token::NotEqual
            },
            ('!', _) => Token::Bang,
            ('=', Some('=')) => {
                chars.next();
                if chars.peek().map(|&(_, c)| c) == Some('=') {
                    chars.next();
                }
                Token::Equal
            },
            ('&', Some('&')) => {
                chars.next();
                Token::And
            },
            ('|', Some('|')) => {
                chars.next();
                Token::Or
            },
            _ => return Err(FormulaError::UnexpectedChar { ch, pos }),
        };
        tokens.push((token, pos));
    }

    Ok(tokens)
}

// ============================================================================
// Syntax Tree
// ============================================================================

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation.
    Neg,
    /// Logical not (1.0 for zero, else 0.0).
    Not,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `<`
    Less,
    /// `<=`
    LessEq,
    /// `>`
    Greater,
    /// `>=`
    GreaterEq,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `&&`
    And,
    /// `||`
    Or,
}

/// Whitelisted functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// Smallest argument.
    Min,
    /// Largest argument.
    Max,
    /// Absolute value.
    Abs,
    /// Round toward negative infinity.
    Floor,
    /// Round toward positive infinity.
    Ceil,
    /// Round half up.
    Round,
    /// Square root.
    Sqrt,
    /// `pow(base, exponent)`.
    Pow,
    /// `clamp(value, low, high)`.
    Clamp,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "min" => Self::Min,
            "max" => Self::Max,
            "abs" => Self::Abs,
            "floor" => Self::Floor,
            "ceil" => Self::Ceil,
            "round" => Self::Round,
            "sqrt" => Self::Sqrt,
            "pow" => Self::Pow,
            "clamp" => Self::Clamp,
            _ => return None,
        })
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::Abs => "abs",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Round => "round",
            Self::Sqrt => "sqrt",
            Self::Pow => "pow",
            Self::Clamp => "clamp",
        }
    }

    fn accepts(self, count: usize) -> bool {
        match self {
            Self::Min | Self::Max => count >= 1,
            Self::Abs | Self::Floor | Self::Ceil | Self::Round | Self::Sqrt => count == 1,
            Self::Pow => count == 2,
            Self::Clamp => count == 3,
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        match self {
            Self::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::Abs => args[0].abs(),
            Self::Floor => args[0].floor(),
            Self::Ceil => args[0].ceil(),
            Self::Round => (args[0] + 0.5).floor(),
            Self::Sqrt => args[0].sqrt(),
            Self::Pow => args[0].powf(args[1]),
            Self::Clamp => args[0].max(args[1]).min(args[2]),
        }
    }
}

/// Parsed formula expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal.
    Number(f64),
    /// Dotted path resolved by the scope (`a.hp`, `s.stacks`).
    Path(Vec<String>),
    /// Game variable `v[index]`.
    Variable(Box<Expr>),
    /// Unary operation.
    Unary(UnaryOp, Box<Expr>),
    /// Binary operation.
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// `cond ? then : otherwise`.
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    /// Whitelisted function call.
    Call(Function, Vec<Expr>),
}

// ============================================================================
// Parser
// ============================================================================

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<(Token, usize)> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, label: &'static str) -> Result<(), FormulaError> {
        match self.advance() {
            Some((token, _)) if &token == expected => Ok(()),
            Some((token, pos)) => Err(FormulaError::UnexpectedToken {
                found: token.to_string(),
                pos,
                expected: label,
            }),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }

    fn enter(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            Err(FormulaError::TooDeep)
        } else {
            Ok(())
        }
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn parse_expr(&mut self) -> Result<Expr, FormulaError> {
        self.enter()?;
        let condition = self.parse_or()?;
        let expr = if self.eat(&Token::Question) {
            let then = self.parse_expr()?;
            self.expect(&Token::Colon, "':'")?;
            let otherwise = self.parse_expr()?;
            Expr::Conditional(Box::new(condition), Box::new(then), Box::new(otherwise))
        } else {
            condition
        };
        self.leave();
        Ok(expr)
    }

    fn parse_binary_level(
        &mut self,
        next: fn(&mut Self) -> Result<Expr, FormulaError>,
        ops: &[(Token, BinaryOp)],
    ) -> Result<Expr, FormulaError> {
        let mut left = next(self)?;
        'outer: loop {
            for (token, op) in ops {
                if self.eat(token) {
                    let right = next(self)?;
                    left = Expr::Binary(*op, Box::new(left), Box::new(right));
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn parse_or(&mut self) -> Result<Expr, FormulaError> {
        self.parse_binary_level(Self::parse_and, &[(Token::Or, BinaryOp::Or)])
    }

    fn parse_and(&mut self) -> Result<Expr, FormulaError> {
        self.parse_binary_level(Self::parse_equality, &[(Token::And, BinaryOp::And)])
    }

    fn parse_equality(&mut self) -> Result<Expr, FormulaError> {
        self.parse_binary_level(
            Self::parse_comparison,
            &[
                (Token::Equal, BinaryOp::Equal),
                (Token::NotEqual, BinaryOp::NotEqual),
            ],
        )
    }

    fn parse_comparison(&mut self) -> Result<Expr, FormulaError> {
        self.parse_binary_level(
            Self::parse_additive,
            &[
                (Token::LessEq, BinaryOp::LessEq),
                (Token::Less, BinaryOp::Less),
                (Token::GreaterEq, BinaryOp::GreaterEq),
                (Token::Greater, BinaryOp::Greater),
            ],
        )
    }

    fn parse_additive(&mut self) -> Result<Expr, FormulaError> {
        self.parse_binary_level(
            Self::parse_term,
            &[(Token::Plus, BinaryOp::Add), (Token::Minus, BinaryOp::Sub)],
        )
    }

    fn parse_term(&mut self) -> Result<Expr, FormulaError> {
        self.parse_binary_level(
            Self::parse_unary,
            &[
                (Token::Star, BinaryOp::Mul),
                (Token::Slash, BinaryOp::Div),
                (Token::Percent, BinaryOp::Rem),
            ],
        )
    }

    fn parse_unary(&mut self) -> Result<Expr, FormulaError> {
        let op = match self.peek() {
            Some(Token::Minus) => Some(UnaryOp::Neg),
            Some(Token::Bang) => Some(UnaryOp::Not),
            Some(Token::Plus) => None,
            _ => return self.parse_primary(),
        };
        self.pos += 1;
        self.enter()?;
        let operand = self.parse_unary()?;
        self.leave();
        Ok(match op {
            Some(op) => Expr::Unary(op, Box::new(operand)),
            None => operand,
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, FormulaError> {
        let (token, pos) = self.advance().ok_or(FormulaError::UnexpectedEnd)?;
        match token {
            Token::Number(value) => Ok(Expr::Number(value)),
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            },
            Token::Ident(name) => self.parse_identifier(name),
            other => Err(FormulaError::UnexpectedToken {
                found: other.to_string(),
                pos,
                expected: "a value",
            }),
        }
    }

    fn parse_identifier(&mut self, first: String) -> Result<Expr, FormulaError> {
        match first.as_str() {
            "true" => return Ok(Expr::Number(1.0)),
            "false" => return Ok(Expr::Number(0.0)),
            "v" if self.peek() == Some(&Token::LBracket) => {
                self.pos += 1;
                let index = self.parse_expr()?;
                self.expect(&Token::RBracket, "']'")?;
                return Ok(Expr::Variable(Box::new(index)));
            },
            _ => {},
        }

        let mut segments = vec![first];
        while self.eat(&Token::Dot) {
            match self.advance() {
                Some((Token::Ident(name), _)) => segments.push(name),
                Some((token, pos)) => {
                    return Err(FormulaError::UnexpectedToken {
                        found: token.to_string(),
                        pos,
                        expected: "a property name",
                    })
                },
                None => return Err(FormulaError::UnexpectedEnd),
            }
        }

        if !self.eat(&Token::LParen) {
            return Ok(Expr::Path(segments));
        }

        let name = match segments.as_slice() {
            [single] => single.as_str(),
            [namespace, name] if namespace == "Math" => name.as_str(),
            _ => "",
        };
        let function =
            Function::from_name(name).ok_or_else(|| FormulaError::UnknownFunction(segments.join(".")))?;

        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if self.eat(&Token::Comma) {
                    continue;
                }
                self.expect(&Token::RParen, "')' or ','")?;
                break;
            }
        }
        if !function.accepts(args.len()) {
            return Err(FormulaError::Arity {
                name: function.name(),
                got: args.len(),
            });
        }
        Ok(Expr::Call(function, args))
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// Names and variables visible to a formula.
pub trait FormulaScope {
    /// Resolve a dotted path such as `["b", "mhp"]`.
    fn resolve(&self, path: &[String]) -> Option<f64>;

    /// Value of game variable `index`.
    fn variable(&self, index: u32) -> f64;
}

fn truthy(value: f64) -> bool {
    value != 0.0 && !value.is_nan()
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

#[allow(clippy::float_cmp)]
fn eval(expr: &Expr, scope: &dyn FormulaScope) -> Result<f64, FormulaError> {
    Ok(match expr {
        Expr::Number(value) => *value,
        Expr::Path(path) => scope
            .resolve(path)
            .ok_or_else(|| FormulaError::UnknownVariable(path.join(".")))?,
        Expr::Variable(index) => {
            let index = eval(index, scope)?;
            if index.is_finite() && index >= 0.0 {
                scope.variable(index as u32)
            } else {
                0.0
            }
        },
        Expr::Unary(UnaryOp::Neg, operand) => -eval(operand, scope)?,
        Expr::Unary(UnaryOp::Not, operand) => flag(!truthy(eval(operand, scope)?)),
        Expr::Binary(BinaryOp::And, left, right) => {
            let left = eval(left, scope)?;
            if truthy(left) {
                eval(right, scope)?
            } else {
                left
            }
        },
        Expr::Binary(BinaryOp::Or, left, right) => {
            let left = eval(left, scope)?;
            if truthy(left) {
                left
            } else {
                eval(right, scope)?
            }
        },
        Expr::Binary(op, left, right) => {
            let a = eval(left, scope)?;
            let b = eval(right, scope)?;
            match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                BinaryOp::Rem => a % b,
                BinaryOp::Less => flag(a < b),
                BinaryOp::LessEq => flag(a <= b),
                BinaryOp::Greater => flag(a > b),
                BinaryOp::GreaterEq => flag(a >= b),
                BinaryOp::Equal => flag(a == b),
                BinaryOp::NotEqual => flag(a != b),
                BinaryOp::And | BinaryOp::Or => unreachable!("short-circuit operators handled above"),
            }
        },
        Expr::Conditional(condition, then, otherwise) => {
            if truthy(eval(condition, scope)?) {
                eval(then, scope)?
            } else {
                eval(otherwise, scope)?
            }
        },
        Expr::Call(function, args) => {
            let values = args
                .iter()
                .map(|arg| eval(arg, scope))
                .collect::<Result<Vec<_>, _>>()?;
            function.apply(&values)
        },
    })
}

/// A parsed formula together with its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    /// Parse source text.
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.parse_expr()?;
        if let Some((token, pos)) = parser.advance() {
            return Err(FormulaError::UnexpectedToken {
                found: token.to_string(),
                pos,
                expected: "end of formula",
            });
        }
        Ok(Self {
            source: source.to_owned(),
            expr,
        })
    }

    /// Evaluate against a scope. Non-finite results are errors.
    pub fn evaluate(&self, scope: &dyn FormulaScope) -> Result<f64, FormulaError> {
        let value = eval(&self.expr, scope)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(FormulaError::NonFinite)
        }
    }

    /// Original source text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parsed expression tree.
    #[must_use]
    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}

/// Parse-once cache keyed by source text. Parse failures are cached too.
#[derive(Debug, Default)]
pub struct FormulaCache {
    parsed: AHashMap<String, Result<Formula, FormulaError>>,
}

impl FormulaCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parsed formula for `source`, parsing on first use.
    pub fn get_or_parse(&mut self, source: &str) -> Result<&Formula, FormulaError> {
        self.parsed
            .entry(source.to_owned())
            .or_insert_with(|| Formula::parse(source))
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Number of cached sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parsed.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parsed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestScope;

    impl FormulaScope for TestScope {
        fn resolve(&self, path: &[String]) -> Option<f64> {
            let path: Vec<&str> = path.iter().map(String::as_str).collect();
            match path.as_slice() {
                ["a", "atk"] => Some(20.0),
                ["b", "mhp"] => Some(200.0),
                ["b", "hp"] => Some(50.0),
                ["s", "stacks"] => Some(3.0),
                _ => None,
            }
        }

        fn variable(&self, index: u32) -> f64 {
            f64::from(index) * 10.0
        }
    }

    fn eval_str(source: &str) -> Result<f64, FormulaError> {
        Formula::parse(source)?.evaluate(&TestScope)
    }

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(eval_str("1 + 2 * 3"), Ok(7.0));
        assert_eq!(eval_str("(1 + 2) * 3"), Ok(9.0));
        assert_eq!(eval_str("-2 * -3"), Ok(6.0));
        assert_eq!(eval_str("10 % 4"), Ok(2.0));
        assert_eq!(eval_str("0.5 * 4"), Ok(2.0));
    }

    #[test]
    fn test_paths_and_variables() {
        assert_eq!(eval_str("b.mhp * 0.05"), Ok(10.0));
        assert_eq!(eval_str("a.atk * s.stacks"), Ok(60.0));
        assert_eq!(eval_str("v[3] + v[1 + 1]"), Ok(50.0));
    }

    #[test]
    fn test_comparisons_and_conditionals() {
        assert_eq!(eval_str("b.hp < b.mhp / 2 ? 10 : 0"), Ok(10.0));
        assert_eq!(eval_str("b.hp >= 100 || 3"), Ok(3.0));
        assert_eq!(eval_str("1 && 0"), Ok(0.0));
        assert_eq!(eval_str("!0"), Ok(1.0));
        assert_eq!(eval_str("2 === 2"), Ok(1.0));
        assert_eq!(eval_str("true != false"), Ok(1.0));
    }

    #[test]
    fn test_functions() {
        assert_eq!(eval_str("Math.max(a.atk - 30, 0)"), Ok(0.0));
        assert_eq!(eval_str("min(4, 2, 9)"), Ok(2.0));
        assert_eq!(eval_str("Math.round(2.5)"), Ok(3.0));
        assert_eq!(eval_str("clamp(15, 0, 10)"), Ok(10.0));
        assert_eq!(eval_str("pow(2, 3)"), Ok(8.0));
    }

    #[test]
    fn test_non_finite_rejected() {
        assert_eq!(eval_str("1 / 0"), Err(FormulaError::NonFinite));
        assert_eq!(eval_str("sqrt(-1)"), Err(FormulaError::NonFinite));
    }

    #[test]
    fn test_unknown_names_rejected() {
        assert_eq!(
            eval_str("c.hp"),
            Err(FormulaError::UnknownVariable("c.hp".to_string()))
        );
        assert!(matches!(
            Formula::parse("eval(1)"),
            Err(FormulaError::UnknownFunction(_))
        ));
        assert!(matches!(
            Formula::parse("window.alert(1)"),
            Err(FormulaError::UnknownFunction(_))
        ));
        assert!(matches!(
            Formula::parse("abs(1, 2)"),
            Err(FormulaError::Arity { name: "abs", got: 2 })
        ));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            Formula::parse("a = 1"),
            Err(FormulaError::UnexpectedChar { ch: '=', .. })
        ));
        assert_eq!(Formula::parse("1 +"), Err(FormulaError::UnexpectedEnd));
        assert!(matches!(
            Formula::parse("1 2"),
            Err(FormulaError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            Formula::parse("1..2"),
            Err(FormulaError::InvalidNumber(_))
        ));
        let deep = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(Formula::parse(&deep), Err(FormulaError::TooDeep));
    }

    #[test]
    fn test_cache_parses_once() {
        let mut cache = FormulaCache::new();
        assert!(cache.get_or_parse("b.mhp * 0.1").is_ok());
        assert!(cache.get_or_parse("b.mhp * 0.1").is_ok());
        assert!(cache.get_or_parse("1 +").is_err());
        assert!(cache.get_or_parse("1 +").is_err());
        assert_eq!(cache.len(), 2);
    }
}
