use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One policy record as served by `GET /api/policies`. The column set is
/// whatever the uploaded file had, so rows stay untyped apart from `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyRow(pub Map<String, Value>);

impl PolicyRow {
    pub fn id(&self) -> Option<String> {
        match self.0.get("id")? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns a copy with `field` replaced; `id` cannot be edited.
    pub fn with_field(&self, field: &str, value: Value) -> Option<PolicyRow> {
        if field == "id" {
            return None;
        }
        let mut next = self.clone();
        next.0.insert(field.to_string(), value);
        Some(next)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDef {
    pub field: String,
    pub header_name: String,
    pub editable: bool,
}

/// Columns come from the first row's keys; every column except `id` is
/// editable.
pub fn columns_for(rows: &[PolicyRow]) -> Vec<ColumnDef> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    first
        .0
        .keys()
        .map(|key| ColumnDef {
            field: key.clone(),
            header_name: key.clone(),
            editable: key != "id",
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(v: Value) -> PolicyRow {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_columns_from_first_row() {
        let rows = vec![
            row(serde_json::json!({"id": 1, "Account_Value": 1000.0})),
            row(serde_json::json!({"id": 2, "Other": true})),
        ];
        let cols = columns_for(&rows);
        assert_eq!(cols.len(), 2);
        assert!(cols.iter().any(|c| c.field == "Account_Value" && c.editable));
        assert!(cols.iter().any(|c| c.field == "id" && !c.editable));
        assert!(columns_for(&[]).is_empty());
    }

    #[test]
    fn test_id_is_not_editable() {
        let r = row(serde_json::json!({"id": "p-1", "Age": 40}));
        assert_eq!(r.id().as_deref(), Some("p-1"));
        assert!(r.with_field("id", Value::from("p-2")).is_none());
        let edited = r.with_field("Age", Value::from(41)).unwrap();
        assert_eq!(edited.get("Age"), Some(&Value::from(41)));
        assert_eq!(r.get("Age"), Some(&Value::from(40)));
    }
}
