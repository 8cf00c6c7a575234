use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Wire tokens for the boolean operators.
mod op {
    pub const AND: &str = "&";
    pub const OR: &str = "|";
    pub const XOR: &str = "^";
    pub const NOT: &str = "~";
}

fn is_operator(key: &str) -> bool {
    matches!(key, op::AND | op::OR | op::XOR | op::NOT)
}

/// A single field condition, combinable into arbitrarily nested boolean
/// expressions with [`and`](Query::and), [`or`](Query::or),
/// [`xor`](Query::xor) and [`not`](Query::not).
///
/// Every combinator returns a new value; expressions are never mutated in
/// place. Serialization keeps nesting shallow: combining two expressions on
/// the same associative operator splices their operand lists together rather
/// than nesting one inside the other, because the service caps how deeply a
/// request body may nest.
///
/// Multi-valued inputs (for lookups such as `in` or `range`) are folded into
/// a comma-joined string at construction, with null elements rendered as the
/// empty string. The join does not escape commas, so individual values must
/// not contain them.
///
/// ```
/// use cairn::Query;
/// use serde_json::json;
///
/// let q = Query::field("sample_id", "sample-123")
///     .and(&Query::field("published_date__range", json!(["2023-01-01", "2023-09-18"])))?;
/// assert_eq!(
///     q.to_value(),
///     json!({"&": [
///         {"sample_id": "sample-123"},
///         {"published_date__range": "2023-01-01,2023-09-18"},
///     ]})
/// );
/// # Ok::<(), cairn::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    key: String,
    value: Value,
}

impl Query {
    /// Build a leaf condition from one field (optionally suffixed with a
    /// lookup, e.g. `published_date__range`) and its value.
    pub fn field(key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let mut value = value.into();
        if !is_operator(&key) {
            value = fold_multi_value(value);
        }
        Query { key, value }
    }

    /// Build a leaf condition from a sequence of field-value pairs, which
    /// must contain exactly one pair.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut pairs = pairs.into_iter();
        let first = pairs.next();
        let rest = pairs.count();
        match (first, rest) {
            (Some((key, value)), 0) => Ok(Query::field(key, value)),
            (first, rest) => {
                let received = if first.is_some() { rest + 1 } else { 0 };
                Err(Error::Validation(format!(
                    "expected exactly one field-value pair, received: {received}"
                )))
            }
        }
    }

    pub fn and(&self, other: &Query) -> Result<Query> {
        self.combine(other, op::AND)
    }

    pub fn or(&self, other: &Query) -> Result<Query> {
        self.combine(other, op::OR)
    }

    pub fn xor(&self, other: &Query) -> Result<Query> {
        self.combine(other, op::XOR)
    }

    /// Negate the expression. Negating an already-negated expression unwraps
    /// it instead of wrapping twice, so `~~a` serializes identically to `a`.
    pub fn not(&self) -> Result<Query> {
        if self.key == op::NOT {
            match &self.value {
                Value::Object(inner) if inner.len() == 1 => {
                    let (key, value) = inner.iter().next().map(|(k, v)| (k.clone(), v.clone()))
                        .ok_or_else(|| Error::Internal("empty negation operand".to_string()))?;
                    Ok(Query { key, value })
                }
                other => Err(Error::Internal(format!(
                    "negation must hold a single-key expression, found: {other}"
                ))),
            }
        } else {
            Ok(Query {
                key: op::NOT.to_string(),
                value: self.to_value(),
            })
        }
    }

    /// Combine two expressions on an associative operator, splicing operand
    /// lists where the top-level operator already matches. Chaining
    /// `a & b & c` therefore serializes as one three-element `&` list, not a
    /// nested pair of binary nodes.
    fn combine(&self, other: &Query, operator: &str) -> Result<Query> {
        let mut operands = self.operands(operator)?;
        operands.extend(other.operands(operator)?);
        Ok(Query {
            key: operator.to_string(),
            value: Value::Array(operands),
        })
    }

    /// The operand list this expression contributes when combined under
    /// `operator`: its own children when the top-level operator matches,
    /// otherwise the expression itself as a single operand.
    fn operands(&self, operator: &str) -> Result<Vec<Value>> {
        if self.key == operator {
            match &self.value {
                Value::Array(items) => Ok(items.clone()),
                other => Err(Error::Internal(format!(
                    "operator '{operator}' must hold a list of expressions, found: {other}"
                ))),
            }
        } else {
            Ok(vec![self.to_value()])
        }
    }

    /// Serialize to the JSON request-body form.
    pub fn to_value(&self) -> Value {
        let mut map = Map::with_capacity(1);
        map.insert(self.key.clone(), self.value.clone());
        Value::Object(map)
    }
}

/// Fold a multi-valued input into the comma-joined wire form. Scalars pass
/// through untouched.
fn fold_multi_value(value: Value) -> Value {
    match value {
        Value::Array(items) => {
            let joined = items
                .iter()
                .map(scalar_text)
                .collect::<Vec<_>>()
                .join(",");
            Value::String(joined)
        }
        other => other,
    }
}

/// Render a scalar the way it appears in query parameters and delimited
/// output: strings unquoted, null as the empty string.
pub(crate) fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn leaf_serialization() {
        assert_eq!(
            Query::field("sample_id", "sample-123").to_value(),
            json!({"sample_id": "sample-123"})
        );
        assert_eq!(
            Query::field("ct_value", 123.456).to_value(),
            json!({"ct_value": 123.456})
        );
        assert_eq!(
            Query::field("published_date", Value::Null).to_value(),
            json!({"published_date": null})
        );
    }

    #[test]
    fn multi_value_inputs_comma_join() {
        assert_eq!(
            Query::field("published_date__range", json!(["2023-01-01", "2023-09-18"])).to_value(),
            json!({"published_date__range": "2023-01-01,2023-09-18"})
        );
        assert_eq!(
            Query::field("field__in", json!([null, "y"])).to_value(),
            json!({"field__in": ",y"})
        );
    }

    #[test]
    fn from_pairs_requires_exactly_one() {
        assert!(matches!(
            Query::from_pairs(vec![]),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            Query::from_pairs(vec![
                ("sample_id".to_string(), json!("sample-123")),
                ("another_field".to_string(), json!("another_value")),
            ]),
            Err(Error::Validation(_))
        ));
        let query = Query::from_pairs(vec![("sample_id".to_string(), json!("s-1"))]).unwrap();
        assert_eq!(query.to_value(), json!({"sample_id": "s-1"}));
    }

    #[test]
    fn chained_and_flattens() {
        let a = Query::field("a", 1);
        let b = Query::field("b", 2);
        let c = Query::field("c", 3);
        let combined = a.and(&b).unwrap().and(&c).unwrap();
        assert_eq!(
            combined.to_value(),
            json!({"&": [{"a": 1}, {"b": 2}, {"c": 3}]})
        );
    }

    #[test]
    fn flattening_applies_per_operator() {
        let a = Query::field("a", 1);
        let b = Query::field("b", 2);
        let c = Query::field("c", 3);
        let d = Query::field("d", 4);

        let or_chain = c.or(&d).unwrap();
        let combined = a.and(&b).unwrap().and(&or_chain).unwrap();
        assert_eq!(
            combined.to_value(),
            json!({"&": [{"a": 1}, {"b": 2}, {"|": [{"c": 3}, {"d": 4}]}]})
        );

        let xor_chain = a.xor(&b).unwrap().xor(&c).unwrap();
        assert_eq!(
            xor_chain.to_value(),
            json!({"^": [{"a": 1}, {"b": 2}, {"c": 3}]})
        );
    }

    #[test]
    fn splices_both_sides() {
        let left = Query::field("a", 1).and(&Query::field("b", 2)).unwrap();
        let right = Query::field("c", 3).and(&Query::field("d", 4)).unwrap();
        let combined = left.and(&right).unwrap();
        assert_eq!(
            combined.to_value(),
            json!({"&": [{"a": 1}, {"b": 2}, {"c": 3}, {"d": 4}]})
        );
    }

    #[test]
    fn double_negation_unwraps() {
        let a = Query::field("sample_id", "sample-123");
        assert_eq!(a.not().unwrap().not().unwrap(), a);
        assert_eq!(
            a.not().unwrap().not().unwrap().not().unwrap(),
            a.not().unwrap()
        );
        assert_eq!(
            a.not().unwrap().to_value(),
            json!({"~": {"sample_id": "sample-123"}})
        );
    }

    #[test]
    fn negation_of_compound_expression_round_trips() {
        let compound = Query::field("a", 1).or(&Query::field("b", 2)).unwrap();
        let negated = compound.not().unwrap();
        assert_eq!(
            negated.to_value(),
            json!({"~": {"|": [{"a": 1}, {"b": 2}]}})
        );
        assert_eq!(negated.not().unwrap(), compound);
    }

    #[test]
    fn equality_is_structural() {
        let a = Query::field("x", json!(["1", "2"]));
        let b = Query::field("x", "1,2");
        assert_eq!(a, b);
    }
}
