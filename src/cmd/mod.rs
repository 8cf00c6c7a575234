pub mod account;
pub mod meta;
pub mod records;

use anyhow::{bail, Result};
use serde_json::map::Entry;
use serde_json::{json, Value};

use cairn::Row;

fn split_pair(pair: &str) -> Result<(String, String)> {
    match pair.split_once('=') {
        Some((field, value)) if !field.is_empty() => Ok((field.to_string(), value.to_string())),
        _ => bail!("expected FIELD=VALUE, received: '{pair}'"),
    }
}

/// Parse repeated `FIELD=VALUE` arguments, collecting repeated fields into
/// multi-value lists.
pub fn grouped_fields(pairs: &[String]) -> Result<Row> {
    let mut fields = Row::new();
    for pair in pairs {
        let (field, value) = split_pair(pair)?;
        match fields.entry(field) {
            Entry::Vacant(slot) => {
                slot.insert(Value::String(value));
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                Value::Array(values) => values.push(Value::String(value)),
                existing => {
                    let first = existing.take();
                    *existing = json!([first, value]);
                }
            },
        }
    }
    Ok(fields)
}

/// Parse repeated `FIELD=VALUE` arguments, rejecting duplicate fields.
pub fn unique_fields(pairs: &[String]) -> Result<Row> {
    let mut fields = Row::new();
    for pair in pairs {
        let (field, value) = split_pair(pair)?;
        if fields.contains_key(&field) {
            bail!("field '{field}' was provided more than once");
        }
        fields.insert(field, Value::String(value));
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grouped_fields_collects_repeats() {
        let fields = grouped_fields(&[
            "site=bham".to_string(),
            "site=leeds".to_string(),
            "sample_id=s-1".to_string(),
        ])
        .unwrap();
        assert_eq!(fields["site"], json!(["bham", "leeds"]));
        assert_eq!(fields["sample_id"], json!("s-1"));
    }

    #[test]
    fn unique_fields_rejects_repeats() {
        let result = unique_fields(&["site=bham".to_string(), "site=leeds".to_string()]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_malformed_pairs() {
        assert!(grouped_fields(&["no-equals".to_string()]).is_err());
        assert!(grouped_fields(&["=value".to_string()]).is_err());
    }
}
