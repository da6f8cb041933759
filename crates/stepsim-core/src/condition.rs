//! The `NAME OP VALUE` condition mini-language.
//!
//! Conditions compare a container's current stock against a non-negative
//! integer literal. They are parsed once into a [`Condition`] and evaluated
//! through [`ComparisonOp::compare`]; no text is ever executed.

use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while parsing a condition string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionError {
    #[error("malformed condition '{0}': expected NAME OPERATOR VALUE")]
    Syntax(String),
    #[error("unsupported operator '{0}'")]
    UnsupportedOperator(String),
    #[error("value '{0}' is not a non-negative integer")]
    InvalidValue(String),
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// Comparison operator for conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Gt,
    Lt,
    Eq,
    Gte,
    Lte,
    Ne,
}

impl ComparisonOp {
    pub fn compare(self, lhs: u64, rhs: u64) -> bool {
        match self {
            ComparisonOp::Gt => lhs > rhs,
            ComparisonOp::Lt => lhs < rhs,
            ComparisonOp::Eq => lhs == rhs,
            ComparisonOp::Gte => lhs >= rhs,
            ComparisonOp::Lte => lhs <= rhs,
            ComparisonOp::Ne => lhs != rhs,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ComparisonOp::Gt => ">",
            ComparisonOp::Lt => "<",
            ComparisonOp::Eq => "==",
            ComparisonOp::Gte => ">=",
            ComparisonOp::Lte => "<=",
            ComparisonOp::Ne => "!=",
        }
    }
}

impl FromStr for ComparisonOp {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">" => Ok(ComparisonOp::Gt),
            "<" => Ok(ComparisonOp::Lt),
            "==" => Ok(ComparisonOp::Eq),
            ">=" => Ok(ComparisonOp::Gte),
            "<=" => Ok(ComparisonOp::Lte),
            "!=" => Ok(ComparisonOp::Ne),
            other => Err(ConditionError::UnsupportedOperator(other.to_string())),
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

/// A parsed `NAME OP VALUE` condition. Container names are case-sensitive
/// and may contain inner spaces; the last two tokens are the operator and
/// the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub container: String,
    pub op: ComparisonOp,
    pub value: u64,
}

impl Condition {
    pub fn parse(input: &str) -> Result<Self, ConditionError> {
        let tokens: Vec<&str> = input.split_whitespace().collect();
        if tokens.len() < 3 {
            return Err(ConditionError::Syntax(input.to_string()));
        }
        let (name, rest) = tokens.split_at(tokens.len() - 2);
        let op: ComparisonOp = rest[0].parse()?;
        let literal = rest[1];
        if !literal.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ConditionError::InvalidValue(literal.to_string()));
        }
        let value = literal
            .parse::<u64>()
            .map_err(|_| ConditionError::InvalidValue(literal.to_string()))?;

        Ok(Self {
            container: name.join(" "),
            op,
            value,
        })
    }

    /// Apply the comparison to a stock value.
    pub fn holds_for(&self, stock: u64) -> bool {
        self.op.compare(stock, self.value)
    }
}

impl FromStr for Condition {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Condition::parse(s)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.container, self.op, self.value)
    }
}
