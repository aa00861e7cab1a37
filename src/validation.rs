// Request validation for the booking form
// Every rule is a pure predicate over a JSON value, and all violations are collected
// so the caller can report every problem at once.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::booking::{AGES, ARRIVAL, DEPARTURE, OCCUPANTS, UNIT_NAME};

pub const DMY_FORMAT: &str = "%d/%m/%Y";

// A single rule violation, scoped to the field it was raised for
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("The {field} field is required.")]
    MissingField { field: String },

    #[error("The {field} must be {expected}.")]
    TypeMismatch {
        field: String,
        expected: &'static str,
    },

    #[error("The {field} must be at least {min}.")]
    BelowMinimum { field: String, min: i64 },

    #[error("The {field} must be in dd/mm/yyyy format.")]
    BadDateFormat { field: String },

    #[error("All ages must be positive integers. Invalid age at index {index}: {value}")]
    InvalidAge { index: usize, value: String },

    // Business rule failures found after the field rules passed
    #[error("{message}")]
    Rejected { field: String, message: String },
}

impl Violation {
    pub fn field(&self) -> &str {
        match self {
            Violation::MissingField { field }
            | Violation::TypeMismatch { field, .. }
            | Violation::BelowMinimum { field, .. }
            | Violation::BadDateFormat { field }
            | Violation::Rejected { field, .. } => field.as_str(),
            Violation::InvalidAge { .. } => AGES,
        }
    }
}

/// Violations grouped by field, in the order the fields were first reported.
/// Empty means the request is valid.
///
/// Serializes as `{"<field>": ["<message>", ...]}`, which is the shape the
/// form expects in a 422 response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: IndexMap<String, Vec<Violation>>,
}

impl ValidationErrors {
    pub fn push(&mut self, violation: Violation) {
        self.fields
            .entry(violation.field().to_string())
            .or_default()
            .push(violation);
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[Violation]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    pub fn messages(&self, field: &str) -> Vec<String> {
        self.get(field)
            .map(|violations| violations.iter().map(ToString::to_string).collect())
            .unwrap_or_default()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

impl From<Violation> for ValidationErrors {
    fn from(violation: Violation) -> Self {
        let mut errors = ValidationErrors::default();
        errors.push(violation);
        errors
    }
}

impl Serialize for ValidationErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (field, violations) in &self.fields {
            let messages: Vec<String> = violations.iter().map(ToString::to_string).collect();
            map.serialize_entry(field, &messages)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Required,
    IsString,
    IsInteger,
    IsArray,
    MinValue(i64),
    IsDateDmy,
}

impl Rule {
    // Check one value against this rule. `None` means the field is absent.
    pub fn check(&self, field: &str, value: Option<&Value>) -> Option<Violation> {
        let passes = match self {
            Rule::Required => !value.map_or(true, is_empty_value),
            Rule::IsString => value.map_or(false, Value::is_string),
            Rule::IsInteger => value.map_or(false, is_integer),
            Rule::IsArray => value.map_or(false, Value::is_array),
            // Only meaningful once the value is an integer
            Rule::MinValue(min) => match value.filter(|v| is_integer(v)) {
                Some(v) => v.as_i64().map_or(true, |n| n >= *min),
                None => true,
            },
            Rule::IsDateDmy => value.and_then(Value::as_str).map_or(false, is_dmy_date),
        };

        if passes {
            return None;
        }

        let field = field.to_string();
        Some(match self {
            Rule::Required => Violation::MissingField { field },
            Rule::IsString => Violation::TypeMismatch {
                field,
                expected: "a string",
            },
            Rule::IsInteger => Violation::TypeMismatch {
                field,
                expected: "an integer",
            },
            Rule::IsArray => Violation::TypeMismatch {
                field,
                expected: "an array",
            },
            Rule::MinValue(min) => Violation::BelowMinimum { field, min: *min },
            Rule::IsDateDmy => Violation::BadDateFormat { field },
        })
    }
}

#[derive(Debug, Clone)]
pub struct FieldRules {
    pub field: &'static str,
    pub rules: Vec<Rule>,
}

impl FieldRules {
    pub fn new(field: &'static str, rules: Vec<Rule>) -> Self {
        Self { field, rules }
    }
}

// Rules applied to every inbound booking request
pub fn booking_rules() -> Vec<FieldRules> {
    vec![
        FieldRules::new(UNIT_NAME, vec![Rule::Required, Rule::IsString]),
        FieldRules::new(ARRIVAL, vec![Rule::Required, Rule::IsDateDmy]),
        FieldRules::new(DEPARTURE, vec![Rule::Required, Rule::IsDateDmy]),
        FieldRules::new(
            OCCUPANTS,
            vec![Rule::Required, Rule::IsInteger, Rule::MinValue(1)],
        ),
        FieldRules::new(AGES, vec![Rule::Required, Rule::IsArray]),
    ]
}

// Run every rule for every field, no short-circuiting
pub fn validate(data: &Map<String, Value>, rules: &[FieldRules]) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    for field_rules in rules {
        let value = data.get(field_rules.field);
        for rule in &field_rules.rules {
            if let Some(violation) = rule.check(field_rules.field, value) {
                errors.push(violation);
            }
        }
    }

    errors
}

// Every element of Ages must be a non-negative integer
pub fn validate_ages(data: &Map<String, Value>) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    if let Some(ages) = data.get(AGES).and_then(Value::as_array) {
        for (index, age) in ages.iter().enumerate() {
            if age.as_u64().is_none() {
                errors.push(Violation::InvalidAge {
                    index,
                    value: age.to_string(),
                });
            }
        }
    }

    errors
}

// A dd/mm/yyyy string is valid only if formatting the parsed date gives back the input
pub fn is_dmy_date(value: &str) -> bool {
    NaiveDate::parse_from_str(value, DMY_FORMAT)
        .map(|date| date.format(DMY_FORMAT).to_string() == value)
        .unwrap_or(false)
}

fn is_integer(value: &Value) -> bool {
    value
        .as_number()
        .map_or(false, |n| n.is_i64() || n.is_u64())
}

// Absent, null, false, "", "0", zero, [] and {} all count as empty
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty() || s == "0",
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Array(items) => items.is_empty(),
        Value::Object(entries) => entries.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn valid_request() -> Map<String, Value> {
        fields(json!({
            "Unit Name": "Standard Room",
            "Arrival": "01/12/2025",
            "Departure": "05/12/2025",
            "Occupants": 2,
            "Ages": [30, 10]
        }))
    }

    #[test]
    fn test_valid_request_has_no_errors() {
        let errors = validate(&valid_request(), &booking_rules());
        assert!(errors.is_empty(), "Unexpected errors: {:?}", errors);
    }

    #[test_case(UNIT_NAME; "#1 missing unit name")]
    #[test_case(ARRIVAL; "#2 missing arrival")]
    #[test_case(DEPARTURE; "#3 missing departure")]
    #[test_case(OCCUPANTS; "#4 missing occupants")]
    #[test_case(AGES; "#5 missing ages")]
    fn test_missing_field_is_reported(field: &str) {
        let mut data = valid_request();
        data.remove(field);

        let errors = validate(&data, &booking_rules());
        assert!(!errors.is_empty());

        let violations = errors.get(field).unwrap();
        assert_eq!(
            violations[0],
            Violation::MissingField {
                field: field.to_string()
            }
        );
        // Only the removed field is affected
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec![field]);
    }

    #[test]
    fn test_type_rules_run_even_when_missing() {
        let errors = validate(&Map::new(), &booking_rules());

        assert_eq!(
            errors.messages(UNIT_NAME),
            vec![
                "The Unit Name field is required.",
                "The Unit Name must be a string."
            ]
        );
        assert_eq!(
            errors.messages(ARRIVAL),
            vec![
                "The Arrival field is required.",
                "The Arrival must be in dd/mm/yyyy format."
            ]
        );
        assert_eq!(
            errors.messages(OCCUPANTS),
            vec![
                "The Occupants field is required.",
                "The Occupants must be an integer."
            ]
        );
        assert_eq!(
            errors.messages(AGES),
            vec!["The Ages field is required.", "The Ages must be an array."]
        );
    }

    #[test]
    fn test_zero_occupants_is_missing_and_below_minimum() {
        let mut data = valid_request();
        data.insert(OCCUPANTS.to_string(), json!(0));

        let errors = validate(&data, &booking_rules());
        assert_eq!(
            errors.messages(OCCUPANTS),
            vec![
                "The Occupants field is required.",
                "The Occupants must be at least 1."
            ]
        );
    }

    #[test]
    fn test_min_value_ignores_non_integers() {
        let violation = Rule::MinValue(5).check("Occupants", Some(&json!("3")));
        assert!(violation.is_none());

        let violation = Rule::MinValue(5).check("Occupants", Some(&json!(3)));
        assert_eq!(
            violation,
            Some(Violation::BelowMinimum {
                field: "Occupants".to_string(),
                min: 5
            })
        );
    }

    #[test_case(json!(null), true; "#1 null")]
    #[test_case(json!(false), true; "#2 false")]
    #[test_case(json!(""), true; "#3 empty string")]
    #[test_case(json!("0"), true; "#4 zero string")]
    #[test_case(json!(0), true; "#5 zero")]
    #[test_case(json!([]), true; "#6 empty array")]
    #[test_case(json!({}), true; "#7 empty object")]
    #[test_case(json!("Standard Room"), false; "#8 text")]
    #[test_case(json!(3), false; "#9 number")]
    #[test_case(json!([1]), false; "#10 array")]
    fn test_required_rule(value: Value, missing: bool) {
        let violation = Rule::Required.check("Field", Some(&value));
        assert_eq!(violation.is_some(), missing);
    }

    #[test_case(json!(2), true; "#1 integer")]
    #[test_case(json!(2.0), false; "#2 float")]
    #[test_case(json!("2"), false; "#3 numeric string")]
    #[test_case(json!(-7), true; "#4 negative integer")]
    fn test_integer_rule(value: Value, is_int: bool) {
        let violation = Rule::IsInteger.check("Occupants", Some(&value));
        assert_eq!(violation.is_none(), is_int);
    }

    #[test_case("01/12/2025", true; "#1 valid date")]
    #[test_case("29/02/2024", true; "#2 leap day")]
    #[test_case("29/02/2025", false; "#3 not a leap year")]
    #[test_case("32/01/2024", false; "#4 day overflow")]
    #[test_case("1/12/2025", false; "#5 unpadded day")]
    #[test_case("01/1/2025", false; "#6 unpadded month")]
    #[test_case("2025-12-01", false; "#7 iso format")]
    #[test_case("01/12/2025 ", false; "#8 trailing space")]
    #[test_case("", false; "#9 empty")]
    fn test_dmy_dates(value: &str, expected: bool) {
        assert_eq!(is_dmy_date(value), expected);
    }

    #[test]
    fn test_date_rule_rejects_non_strings() {
        let violation = Rule::IsDateDmy.check("Arrival", Some(&json!(20251201)));
        assert_eq!(
            violation.map(|v| v.to_string()),
            Some("The Arrival must be in dd/mm/yyyy format.".to_string())
        );
    }

    #[test]
    fn test_array_rule_rejects_objects() {
        let violation = Rule::IsArray.check("Ages", Some(&json!({"0": 30})));
        assert!(violation.is_some());
    }

    #[test]
    fn test_validate_ages_reports_every_bad_index() {
        let data = fields(json!({ "Ages": [30, -1, 12, "9", 4.5] }));

        let errors = validate_ages(&data);
        assert_eq!(
            errors.messages(AGES),
            vec![
                "All ages must be positive integers. Invalid age at index 1: -1",
                "All ages must be positive integers. Invalid age at index 3: \"9\"",
                "All ages must be positive integers. Invalid age at index 4: 4.5"
            ]
        );
    }

    #[test]
    fn test_validate_ages_skips_non_arrays() {
        let data = fields(json!({ "Ages": "30,10" }));
        assert!(validate_ages(&data).is_empty());
        assert!(validate_ages(&Map::new()).is_empty());
    }

    #[test]
    fn test_errors_serialize_as_field_messages() {
        let mut data = valid_request();
        data.insert(ARRIVAL.to_string(), json!("2025-12-01"));

        let errors = validate(&data, &booking_rules());
        let value = serde_json::to_value(&errors).unwrap();
        assert_eq!(
            value,
            json!({ "Arrival": ["The Arrival must be in dd/mm/yyyy format."] })
        );
    }

    #[test]
    fn test_errors_keep_rule_order() {
        let errors = validate(&Map::new(), &booking_rules());
        assert_eq!(
            errors.fields().collect::<Vec<_>>(),
            vec![UNIT_NAME, ARRIVAL, DEPARTURE, OCCUPANTS, AGES]
        );

        let text = serde_json::to_string(&errors).unwrap();
        let positions: Vec<usize> = [UNIT_NAME, ARRIVAL, DEPARTURE, OCCUPANTS, AGES]
            .iter()
            .map(|field| text.find(&format!("\"{}\":", field)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]), "{}", text);
    }
}
