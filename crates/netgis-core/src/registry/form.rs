// ── Form templates ──

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldKind {
    Text,
    Number,
    Select(Vec<String>),
    Checkbox,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    pub required: bool,
}

impl FormField {
    pub fn text(name: &str, label: &str) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind: FieldKind::Text,
            required: false,
        }
    }

    pub fn number(name: &str, label: &str) -> Self {
        Self {
            kind: FieldKind::Number,
            ..Self::text(name, label)
        }
    }

    pub fn select(name: &str, label: &str, options: &[&str]) -> Self {
        Self {
            kind: FieldKind::Select(options.iter().map(|o| (*o).to_owned()).collect()),
            ..Self::text(name, label)
        }
    }

    pub fn checkbox(name: &str, label: &str) -> Self {
        Self {
            kind: FieldKind::Checkbox,
            ..Self::text(name, label)
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Message for `value`, or `None` when acceptable.
    fn check(&self, value: Option<&Value>) -> Option<String> {
        let value = match value {
            None | Some(Value::Null) => {
                return self.required.then(|| "This field is required.".to_owned());
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                return self.required.then(|| "This field is required.".to_owned());
            }
            Some(v) => v,
        };
        match (&self.kind, value) {
            (FieldKind::Number, Value::Number(_)) => None,
            (FieldKind::Number, Value::String(s)) if s.trim().parse::<f64>().is_ok() => None,
            (FieldKind::Number, _) => Some("Enter a number.".to_owned()),
            (FieldKind::Select(options), Value::String(s)) if options.contains(s) => None,
            (FieldKind::Select(_), _) => Some("Select a valid choice.".to_owned()),
            (FieldKind::Checkbox, Value::Bool(_)) => None,
            (FieldKind::Checkbox, _) => Some("Must be true or false.".to_owned()),
            (FieldKind::Text, _) => None,
        }
    }
}

/// A per-field message attached to a form payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormFieldError {
    pub field: String,
    pub message: String,
}

/// Local checks of `data` against `fields`, in field order.
pub fn check_form(fields: &[FormField], data: &Map<String, Value>) -> Vec<FormFieldError> {
    fields
        .iter()
        .filter_map(|f| {
            f.check(data.get(&f.name)).map(|message| FormFieldError {
                field: f.name.clone(),
                message,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields() -> Vec<FormField> {
        vec![
            FormField::text("name", "Name").required(),
            FormField::number("home_pass", "Home pass"),
            FormField::select("status", "Status", &["P", "RFS"]),
            FormField::checkbox("aerial", "Aerial"),
        ]
    }

    #[test]
    fn valid_form_has_no_errors() {
        let data = json!({"name": "DP-1", "home_pass": "12", "status": "RFS", "aerial": true});
        assert!(check_form(&fields(), data.as_object().unwrap_or(&Map::new())).is_empty());
    }

    #[test]
    fn reports_missing_and_malformed_fields_in_order() {
        let data = json!({"name": "  ", "home_pass": "many", "status": "X", "aerial": "yes"});
        let errs = check_form(&fields(), data.as_object().unwrap_or(&Map::new()));
        let names: Vec<_> = errs.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(names, ["name", "home_pass", "status", "aerial"]);
    }

    #[test]
    fn optional_fields_may_be_absent() {
        let data = json!({"name": "x"});
        assert!(check_form(&fields(), data.as_object().unwrap_or(&Map::new())).is_empty());
    }
}
