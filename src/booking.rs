// Inbound booking request as submitted by the availability form
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::validation::{booking_rules, validate, validate_ages, ValidationErrors, Violation};

// Field names exactly as the form sends them
pub const UNIT_NAME: &str = "Unit Name";
pub const ARRIVAL: &str = "Arrival";
pub const DEPARTURE: &str = "Departure";
pub const OCCUPANTS: &str = "Occupants";
pub const AGES: &str = "Ages";

/// A fully typed booking request. Only produced by [`parse_booking_request`],
/// so holding one means every field rule already passed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BookingRequest {
    #[serde(rename = "Unit Name")]
    pub unit_name: String,
    /// `dd/mm/yyyy`
    #[serde(rename = "Arrival")]
    pub arrival: String,
    /// `dd/mm/yyyy`
    #[serde(rename = "Departure")]
    pub departure: String,
    #[serde(rename = "Occupants")]
    pub occupants: u64,
    #[serde(rename = "Ages")]
    pub ages: Vec<u64>,
}

// Validate the raw JSON body and lift it into a BookingRequest.
// Anything other than a JSON object is treated as an object with no fields.
pub fn parse_booking_request(body: &Value) -> Result<BookingRequest, ValidationErrors> {
    let empty = Map::new();
    let fields = body.as_object().unwrap_or(&empty);

    let errors = validate(fields, &booking_rules());
    if !errors.is_empty() {
        return Err(errors);
    }

    let errors = validate_ages(fields);
    if !errors.is_empty() {
        return Err(errors);
    }

    let mut errors = ValidationErrors::default();
    let unit_name = take_string(fields, UNIT_NAME, &mut errors);
    let arrival = take_string(fields, ARRIVAL, &mut errors);
    let departure = take_string(fields, DEPARTURE, &mut errors);
    let occupants = fields.get(OCCUPANTS).and_then(Value::as_u64);
    if occupants.is_none() {
        errors.push(Violation::TypeMismatch {
            field: OCCUPANTS.to_string(),
            expected: "an integer",
        });
    }
    let ages = fields
        .get(AGES)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_u64).collect::<Vec<_>>());
    if ages.is_none() {
        errors.push(Violation::TypeMismatch {
            field: AGES.to_string(),
            expected: "an array",
        });
    }

    match (unit_name, arrival, departure, occupants, ages) {
        (Some(unit_name), Some(arrival), Some(departure), Some(occupants), Some(ages)) => {
            Ok(BookingRequest {
                unit_name,
                arrival,
                departure,
                occupants,
                ages,
            })
        }
        _ => Err(errors),
    }
}

fn take_string(
    fields: &Map<String, Value>,
    field: &str,
    errors: &mut ValidationErrors,
) -> Option<String> {
    let value = fields.get(field).and_then(Value::as_str).map(str::to_string);
    if value.is_none() {
        errors.push(Violation::TypeMismatch {
            field: field.to_string(),
            expected: "a string",
        });
    }
    value
}
