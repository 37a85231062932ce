// In-memory predicate filtering over document data

use crate::record::DocumentData;
use eyre::{Result, eyre};
use serde_json::Value;
use std::cmp::Ordering;
use std::str::FromStr;

/// Single filter clause: `{field} {op} {value}`
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Field name to filter on; dots descend into nested objects
    pub field: String,
    /// Comparison operator
    pub op: FilterOp,
    /// Value to compare against
    pub value: Value,
}

/// Comparison operators for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,            // ==
    Ne,            // !=
    Lt,            // <
    Lte,           // <=
    Gt,            // >
    Gte,           // >=
    ArrayContains, // array-contains
}

impl Filter {
    pub fn new<S: Into<String>, V: Into<Value>>(field: S, op: FilterOp, value: V) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Evaluate the clause against a document's data
    ///
    /// Absent data never matches. A missing field only satisfies `!=`.
    pub fn matches(&self, data: Option<&DocumentData>) -> bool {
        let Some(data) = data else {
            return false;
        };

        let Some(actual) = lookup(data, &self.field) else {
            return self.op == FilterOp::Ne;
        };

        match self.op {
            FilterOp::Eq => values_equal(actual, &self.value),
            FilterOp::Ne => !values_equal(actual, &self.value),
            FilterOp::Lt => compare(actual, &self.value) == Some(Ordering::Less),
            FilterOp::Lte => matches!(compare(actual, &self.value), Some(Ordering::Less | Ordering::Equal)),
            FilterOp::Gt => compare(actual, &self.value) == Some(Ordering::Greater),
            FilterOp::Gte => matches!(compare(actual, &self.value), Some(Ordering::Greater | Ordering::Equal)),
            FilterOp::ArrayContains => actual
                .as_array()
                .is_some_and(|items| items.iter().any(|item| values_equal(item, &self.value))),
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.field, self.op, self.value)
    }
}

/// Build a filter clause
pub fn where_<S: Into<String>, V: Into<Value>>(field: S, op: FilterOp, value: V) -> Filter {
    Filter::new(field, op, value)
}

/// Parse a clause such as `age>=18` or `status==active`
///
/// The value is read as JSON when possible, otherwise as a bare string.
pub fn parse_where(clause: &str) -> Result<Filter> {
    // Longest operators first so `>=` is not read as `>`
    const OPS: [&str; 7] = ["array-contains", "==", "!=", "<=", ">=", "<", ">"];

    for token in OPS {
        if let Some(pos) = clause.find(token) {
            let field = clause[..pos].trim();
            let raw_value = clause[pos + token.len()..].trim();
            if field.is_empty() {
                return Err(eyre!("Missing field name in clause: {}", clause));
            }
            let value = serde_json::from_str(raw_value).unwrap_or_else(|_| Value::String(raw_value.to_string()));
            return Ok(Filter::new(field, token.parse()?, value));
        }
    }

    Err(eyre!("No comparison operator in clause: {}", clause))
}

impl FromStr for FilterOp {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "==" => Ok(FilterOp::Eq),
            "!=" => Ok(FilterOp::Ne),
            "<" => Ok(FilterOp::Lt),
            "<=" => Ok(FilterOp::Lte),
            ">" => Ok(FilterOp::Gt),
            ">=" => Ok(FilterOp::Gte),
            "array-contains" => Ok(FilterOp::ArrayContains),
            other => Err(eyre!("Unknown filter operator: {}", other)),
        }
    }
}

impl std::fmt::Display for FilterOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterOp::Eq => write!(f, "=="),
            FilterOp::Ne => write!(f, "!="),
            FilterOp::Lt => write!(f, "<"),
            FilterOp::Lte => write!(f, "<="),
            FilterOp::Gt => write!(f, ">"),
            FilterOp::Gte => write!(f, ">="),
            FilterOp::ArrayContains => write!(f, "array-contains"),
        }
    }
}

fn lookup<'a>(data: &'a DocumentData, field: &str) -> Option<&'a Value> {
    let mut segments = field.split('.');
    let first = data.get(segments.next()?)?;
    segments.try_fold(first, |cursor, segment| cursor.as_object()?.get(segment))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

// Only values of the same JSON type are ordered
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}
