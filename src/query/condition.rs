//! Condition trees
//!
//! A condition is an immutable boolean expression over record fields.
//! Leaves normalize their operand once, at construction; a leaf whose
//! operand cannot be normalized becomes an invalid leaf that carries its
//! error, and `check()` surfaces it through every enclosing group.

use regex::Regex;

use super::errors::{QueryError, QueryResult};
use super::operator::{Operand, Operator, OperatorFamily};
use super::parser::escape_token;
use crate::record::Accessor;

/// Boolean expression over record fields
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `field op value`
    Field(FieldCondition),
    /// All children must match; matches everything when empty
    And(Vec<Condition>),
    /// Any child must match; matches nothing when empty
    Or(Vec<Condition>),
    /// Negation
    Not(Box<Condition>),
    /// Leaf whose operand failed to normalize
    Invalid(QueryError),
}

/// A normalized leaf condition
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCondition {
    key: String,
    operator: Operator,
    value: Value,
}

/// Normalized operand
#[derive(Debug, Clone)]
enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<String>),
    Regex(Regex),
    Bool(bool),
    None,
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Regex(a), Value::Regex(b)) => a.as_str() == b.as_str(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::None, Value::None) => true,
            _ => false,
        }
    }
}

impl Condition {
    /// Build a leaf condition, normalizing the operand for the operator's family
    pub fn field(key: impl Into<String>, operator: Operator, operand: impl Into<Operand>) -> Self {
        match normalize(operator, operand.into()) {
            Ok(value) => Condition::Field(FieldCondition {
                key: key.into(),
                operator,
                value,
            }),
            Err(e) => Condition::Invalid(e),
        }
    }

    /// Build an `exists` leaf
    pub fn exists(key: impl Into<String>) -> Self {
        Self::field(key, Operator::Exists, Operand::None)
    }

    /// Conjunction
    pub fn and(conditions: Vec<Condition>) -> Self {
        Condition::And(conditions)
    }

    /// Disjunction
    pub fn or(conditions: Vec<Condition>) -> Self {
        Condition::Or(conditions)
    }

    /// Negation
    #[allow(clippy::should_implement_trait)]
    pub fn not(condition: Condition) -> Self {
        Condition::Not(Box::new(condition))
    }

    /// Validate the tree; the first invalid leaf fails the whole tree
    pub fn check(&self) -> QueryResult<()> {
        match self {
            Condition::Field(_) => Ok(()),
            Condition::Invalid(e) => Err(e.clone()),
            Condition::And(children) | Condition::Or(children) => {
                children.iter().try_for_each(Condition::check)
            }
            Condition::Not(child) => child.check(),
        }
    }

    /// Evaluate against a record's accessor
    pub fn complies(&self, acc: &dyn Accessor) -> bool {
        match self {
            Condition::Field(field) => field.complies(acc),
            Condition::And(children) => children.iter().all(|c| c.complies(acc)),
            Condition::Or(children) => children.iter().any(|c| c.complies(acc)),
            Condition::Not(child) => !child.complies(acc),
            Condition::Invalid(_) => false,
        }
    }

    /// Render in query text form.
    ///
    /// The text parses back to an equivalent tree. The text form has no
    /// empty disjunction, so `Or([])` renders as `not ()`.
    pub fn to_text(&self) -> String {
        match self {
            Condition::Field(field) => field.render(false),
            Condition::And(children) => join_group(children, " and "),
            Condition::Or(children) if children.is_empty() => "not ()".to_string(),
            Condition::Or(children) => join_group(children, " or "),
            Condition::Not(child) => match child.as_ref() {
                Condition::Field(field) => field.render(true),
                group @ Condition::And(_) => format!("not {}", group.to_text()),
                group @ Condition::Or(children) if !children.is_empty() => {
                    format!("not {}", group.to_text())
                }
                other => format!("not ({})", other.to_text()),
            },
            Condition::Invalid(e) => format!("[invalid: {}]", e),
        }
    }
}

fn join_group(children: &[Condition], sep: &str) -> String {
    let parts: Vec<String> = children.iter().map(Condition::to_text).collect();
    format!("({})", parts.join(sep))
}

impl FieldCondition {
    /// Selector this leaf reads
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Operator of this leaf
    pub fn operator(&self) -> Operator {
        self.operator
    }

    fn complies(&self, acc: &dyn Accessor) -> bool {
        let key = self.key.as_str();
        match (&self.operator, &self.value) {
            (Operator::Exists, _) => acc.exists(key),
            (op, Value::Int(v)) => acc.get_int(key).is_some_and(|actual| match op {
                Operator::Equals => actual == *v,
                Operator::GreaterThan => actual > *v,
                Operator::GreaterThanOrEqual => actual >= *v,
                Operator::LessThan => actual < *v,
                Operator::LessThanOrEqual => actual <= *v,
                _ => false,
            }),
            (op, Value::Float(v)) => acc.get_float(key).is_some_and(|actual| match op {
                Operator::FloatEquals => actual == *v,
                Operator::FloatGreaterThan => actual > *v,
                Operator::FloatGreaterThanOrEqual => actual >= *v,
                Operator::FloatLessThan => actual < *v,
                Operator::FloatLessThanOrEqual => actual <= *v,
                _ => false,
            }),
            (op, Value::Str(v)) => acc.get_string(key).is_some_and(|actual| match op {
                Operator::SameAs => actual == *v,
                Operator::Contains => actual.contains(v.as_str()),
                Operator::StartsWith => actual.starts_with(v.as_str()),
                Operator::EndsWith => actual.ends_with(v.as_str()),
                _ => false,
            }),
            // a string field must be listed; an array field must share an entry
            (_, Value::List(values)) => match acc.get_string(key) {
                Some(actual) => values.contains(&actual),
                None => acc
                    .get_string_array(key)
                    .is_some_and(|items| items.iter().any(|item| values.contains(item))),
            },
            (_, Value::Regex(re)) => acc.get_string(key).is_some_and(|actual| re.is_match(&actual)),
            (_, Value::Bool(v)) => acc.get_bool(key) == Some(*v),
            (_, Value::None) => false,
        }
    }

    /// `key [not] op [value]`, built from the parts so quoting stays intact
    fn render(&self, negated: bool) -> String {
        let key = escape_token(&self.key);
        let op = if negated {
            format!("not {}", self.operator.name())
        } else {
            self.operator.name().to_string()
        };
        let value = match &self.value {
            Value::None => return format!("{} {}", key, op),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Str(v) => escape_token(v),
            Value::List(v) => escape_token(&v.join(",")),
            Value::Regex(re) => escape_token(re.as_str()),
            Value::Bool(v) => v.to_string(),
        };
        format!("{} {} {}", key, op, value)
    }
}

fn normalize(operator: Operator, operand: Operand) -> QueryResult<Value> {
    match operator.family() {
        OperatorFamily::Int => match operand {
            Operand::Int(v) => Ok(Value::Int(v)),
            Operand::Uint(v) => i64::try_from(v)
                .map(Value::Int)
                .map_err(|_| QueryError::invalid_operand(format!("{} overflows int64", v))),
            Operand::Str(s) => s.parse::<i64>().map(Value::Int).map_err(|e| {
                QueryError::invalid_operand(format!(
                    "could not parse {} to int64: {} (hint: use \"sameas\" to compare strings)",
                    s, e
                ))
            }),
            other => Err(incompatible(&other, "int64")),
        },
        OperatorFamily::Float => match operand {
            Operand::Int(v) => Ok(Value::Float(v as f64)),
            Operand::Uint(v) => Ok(Value::Float(v as f64)),
            Operand::Float(v) => Ok(Value::Float(v)),
            Operand::Str(s) => s.parse::<f64>().map(Value::Float).map_err(|e| {
                QueryError::invalid_operand(format!("could not parse {} to float64: {}", s, e))
            }),
            other => Err(incompatible(&other, "float64")),
        },
        OperatorFamily::String => match operand {
            Operand::Str(s) => Ok(Value::Str(s)),
            other => Err(incompatible(&other, "string")),
        },
        OperatorFamily::StringSlice => match operand {
            Operand::List(values) => Ok(Value::List(values)),
            Operand::Str(s) => {
                let values: Vec<String> = s.split(',').map(str::to_string).collect();
                if values.len() < 2 {
                    return Err(QueryError::invalid_operand(format!(
                        "could not parse \"{}\" to []string",
                        s
                    )));
                }
                Ok(Value::List(values))
            }
            other => Err(incompatible(&other, "[]string")),
        },
        OperatorFamily::Regex => match operand {
            Operand::Str(pattern) => match Regex::new(&pattern) {
                Ok(re) => Ok(Value::Regex(re)),
                Err(e) => Err(QueryError::InvalidRegex {
                    pattern,
                    reason: e.to_string(),
                }),
            },
            other => Err(incompatible(&other, "regex")),
        },
        OperatorFamily::Bool => match operand {
            Operand::Bool(v) => Ok(Value::Bool(v)),
            Operand::Str(s) => parse_bool(&s).map(Value::Bool).ok_or_else(|| {
                QueryError::invalid_operand(format!("could not parse \"{}\" to bool", s))
            }),
            other => Err(incompatible(&other, "bool")),
        },
        OperatorFamily::Any => Ok(Value::None),
    }
}

fn incompatible(operand: &Operand, target: &str) -> QueryError {
    QueryError::invalid_operand(format!("incompatible value {:?} for {}", operand, target))
}

/// Textual bool forms accepted by `is`
fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "true" | "True" | "TRUE" => Some(true),
        "0" | "f" | "F" | "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::JsonAccessor;
    use serde_json::json;

    fn doc() -> serde_json::Value {
        json!({
            "name": "Julian",
            "bananas": 120,
            "weight": 3.5,
            "ripe": true,
            "tags": ["yellow", "sweet"],
            "origin": {"country": "Ecuador"}
        })
    }

    fn check(cond: &Condition) -> bool {
        let d = doc();
        cond.complies(&JsonAccessor::new(&d))
    }

    #[test]
    fn test_int_operators() {
        assert!(check(&Condition::field("bananas", Operator::Equals, 120)));
        assert!(check(&Condition::field("bananas", Operator::GreaterThan, 100)));
        assert!(check(&Condition::field("bananas", Operator::GreaterThanOrEqual, "120")));
        assert!(!check(&Condition::field("bananas", Operator::LessThan, 120)));
        assert!(check(&Condition::field("bananas", Operator::LessThanOrEqual, 120u64)));
        assert!(check(&Condition::field("tags.#", Operator::Equals, 2)));
    }

    #[test]
    fn test_float_operators() {
        assert!(check(&Condition::field("weight", Operator::FloatEquals, 3.5)));
        assert!(check(&Condition::field("weight", Operator::FloatGreaterThan, 3)));
        assert!(check(&Condition::field("weight", Operator::FloatLessThan, "3.6")));
        assert!(check(&Condition::field("bananas", Operator::FloatGreaterThanOrEqual, 120.0)));
        assert!(!check(&Condition::field("weight", Operator::FloatLessThanOrEqual, 3.4)));
    }

    #[test]
    fn test_string_operators() {
        assert!(check(&Condition::field("name", Operator::SameAs, "Julian")));
        assert!(!check(&Condition::field("name", Operator::SameAs, "julian")));
        assert!(check(&Condition::field("name", Operator::Contains, "uli")));
        assert!(check(&Condition::field("name", Operator::StartsWith, "Jul")));
        assert!(check(&Condition::field("name", Operator::EndsWith, "ian")));
        assert!(check(&Condition::field("origin.country", Operator::SameAs, "Ecuador")));
    }

    #[test]
    fn test_in_operator() {
        assert!(check(&Condition::field("name", Operator::In, "Peter,Julian")));
        assert!(check(&Condition::field("name", Operator::In, vec!["Julian"])));
        assert!(!check(&Condition::field("name", Operator::In, "Peter,Paul")));
        assert!(check(&Condition::field("tags", Operator::In, "sour,sweet")));
        assert!(!check(&Condition::field("tags", Operator::In, "sour,bitter")));
    }

    #[test]
    fn test_regex_bool_exists() {
        assert!(check(&Condition::field("name", Operator::Matches, "^Ju.*n$")));
        assert!(check(&Condition::field("ripe", Operator::Is, "T")));
        assert!(!check(&Condition::field("ripe", Operator::Is, false)));
        assert!(check(&Condition::exists("origin.country")));
        assert!(!check(&Condition::exists("origin.city")));
    }

    #[test]
    fn test_unresolvable_selector_is_non_match() {
        assert!(!check(&Condition::field("missing", Operator::Equals, 1)));
        assert!(!check(&Condition::field("name", Operator::GreaterThan, 1)));
        assert!(!check(&Condition::field("missing", Operator::SameAs, "x")));
    }

    #[test]
    fn test_empty_groups() {
        assert!(check(&Condition::and(vec![])));
        assert!(!check(&Condition::or(vec![])));
    }

    #[test]
    fn test_double_negation() {
        let c = Condition::field("bananas", Operator::GreaterThan, 100);
        let nn = Condition::not(Condition::not(c.clone()));
        assert_eq!(check(&c), check(&nn));

        let c = Condition::field("bananas", Operator::LessThan, 100);
        let nn = Condition::not(Condition::not(c.clone()));
        assert_eq!(check(&c), check(&nn));
    }

    #[test]
    fn test_invalid_operands() {
        let err = Condition::field("x", Operator::Equals, "banana").check().unwrap_err();
        assert!(err.to_string().starts_with("could not parse banana to int64"));
        assert!(err.to_string().contains("hint: use \"sameas\""));

        assert!(Condition::field("x", Operator::FloatEquals, "banana").check().is_err());
        assert!(Condition::field("x", Operator::SameAs, 5).check().is_err());
        assert!(Condition::field("x", Operator::Is, "great").check().is_err());
        assert!(Condition::field("x", Operator::Equals, u64::MAX).check().is_err());

        let err = Condition::field("x", Operator::In, "banana").check().unwrap_err();
        assert_eq!(err.to_string(), "could not parse \"banana\" to []string");

        let err = Condition::field("x", Operator::Matches, "[banana").check().unwrap_err();
        assert!(matches!(err, QueryError::InvalidRegex { .. }));
    }

    #[test]
    fn test_invalid_leaf_propagates() {
        let bad = Condition::field("x", Operator::Equals, "nope");
        let tree = Condition::or(vec![
            Condition::exists("a"),
            Condition::and(vec![Condition::exists("b"), Condition::not(bad)]),
        ]);
        assert!(tree.check().is_err());
        assert!(!check(&Condition::and(vec![Condition::Invalid(QueryError::invalid_operand("x"))])));
    }

    #[test]
    fn test_to_text() {
        let c = Condition::or(vec![
            Condition::and(vec![
                Condition::field("bananas", Operator::GreaterThan, 100),
                Condition::not(Condition::field("area", Operator::GreaterThan, 50)),
            ]),
            Condition::field("name", Operator::Matches, "^King "),
            Condition::not(Condition::exists("banana")),
        ]);
        assert_eq!(
            c.to_text(),
            "((bananas > 100 and area not > 50) or name matches \"^King \" or banana not exists)"
        );
    }

    #[test]
    fn test_negated_text_forms() {
        let quoted = Condition::not(Condition::field("a b", Operator::SameAs, "x"));
        assert_eq!(quoted.to_text(), "\"a b\" not sameas x");

        let double = Condition::not(Condition::not(Condition::exists("x")));
        assert_eq!(double.to_text(), "not (x not exists)");

        let group = Condition::not(Condition::or(vec![Condition::exists("a"), Condition::exists("b")]));
        assert_eq!(group.to_text(), "not (a exists or b exists)");
    }

    #[test]
    fn test_empty_group_text() {
        assert_eq!(Condition::and(vec![]).to_text(), "()");
        assert_eq!(Condition::or(vec![]).to_text(), "not ()");
        assert_eq!(Condition::not(Condition::or(vec![])).to_text(), "not (not ())");
    }
}
