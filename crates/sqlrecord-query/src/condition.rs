//! Filter conditions for select queries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlrecord_core::{Error, Properties, Result, Value};

/// Comparison operators accepted in structured conditions.
///
/// The set is closed: operator text is rendered into SQL verbatim, so
/// anything outside it is rejected with [`Error::InvalidOperator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Operator {
    /// `=`
    Eq,
    /// `!=` (also accepts `<>`)
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
}

impl Operator {
    /// Parse caller-supplied operator text. Case and surrounding whitespace
    /// are ignored for the keyword operators.
    pub fn parse(text: &str) -> Result<Self> {
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            "=" => Ok(Operator::Eq),
            "!=" | "<>" => Ok(Operator::NotEq),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Le),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Ge),
            "LIKE" => Ok(Operator::Like),
            "NOT LIKE" => Ok(Operator::NotLike),
            _ => Err(Error::InvalidOperator(text.to_string())),
        }
    }

    /// SQL text for this operator.
    pub const fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
        }
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Operator::parse(s)
    }
}

impl TryFrom<String> for Operator {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Operator::parse(&value)
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.as_sql().to_string()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// What a condition requires of its field.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// Plain equality, the `field => value` form.
    Equals(Value),
    /// Explicit comparison, the `field => [op, value]` form.
    Compare(Operator, Value),
}

/// One `field <op> value` restriction.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Column the condition applies to.
    pub field: String,
    /// Required relation to the value.
    pub criterion: Criterion,
}

impl Condition {
    /// Operator used when rendering.
    pub fn operator(&self) -> Operator {
        match self.criterion {
            Criterion::Equals(_) => Operator::Eq,
            Criterion::Compare(op, _) => op,
        }
    }

    /// Bound value.
    pub fn value(&self) -> &Value {
        match &self.criterion {
            Criterion::Equals(v) | Criterion::Compare(_, v) => v,
        }
    }

    /// True for the explicit-operator form, even when the operator is `=`.
    pub fn is_structured(&self) -> bool {
        matches!(self.criterion, Criterion::Compare(..))
    }
}

/// An ordered conjunction of conditions.
///
/// # Example
///
/// ```ignore
/// let filter = Conditions::new()
///     .eq("user_id", 7)
///     .compare("views", Operator::Gt, 100);
/// let posts = engine.select(&cx, "Post", &filter, None).await;
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    items: Vec<Condition>,
}

impl Conditions {
    /// No conditions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `field = value`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, Criterion::Equals(value.into()));
        self
    }

    /// Add `field <op> value`.
    pub fn compare(
        mut self,
        field: impl Into<String>,
        op: Operator,
        value: impl Into<Value>,
    ) -> Self {
        self.push(field, Criterion::Compare(op, value.into()));
        self
    }

    /// Add `field <op> value` with the operator given as text.
    pub fn compare_str(
        self,
        field: impl Into<String>,
        op: &str,
        value: impl Into<Value>,
    ) -> Result<Self> {
        Ok(self.compare(field, Operator::parse(op)?, value))
    }

    /// Append a condition.
    pub fn push(&mut self, field: impl Into<String>, criterion: Criterion) {
        self.items.push(Condition {
            field: field.into(),
            criterion,
        });
    }

    /// True if any condition restricts `field`.
    pub fn targets(&self, field: &str) -> bool {
        self.items.iter().any(|c| c.field == field)
    }

    /// Only the plain equality conditions, in order.
    pub fn equalities(&self) -> Conditions {
        self.items
            .iter()
            .filter(|c| !c.is_structured())
            .cloned()
            .collect()
    }

    /// Equality conditions as `field → value` properties.
    pub fn to_properties(&self) -> Properties {
        self.items
            .iter()
            .filter_map(|c| match &c.criterion {
                Criterion::Equals(v) => Some((c.field.clone(), v.clone())),
                Criterion::Compare(..) => None,
            })
            .collect()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Condition> {
        self.items.iter()
    }

    /// Number of conditions.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if there are no conditions.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Conditions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut conditions = Conditions::new();
        for (field, value) in iter {
            conditions.push(field, Criterion::Equals(value.into()));
        }
        conditions
    }
}

impl FromIterator<Condition> for Conditions {
    fn from_iter<I: IntoIterator<Item = Condition>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Conditions {
    type Item = &'a Condition;
    type IntoIter = std::slice::Iter<'a, Condition>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
