// Rates payload transformation
// Maps a validated booking request onto the shape the upstream rates API expects:
// unit name to unit type ID, dd/mm/yyyy dates to yyyy-mm-dd, ages to age groups.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::booking::{BookingRequest, AGES, ARRIVAL, DEPARTURE};
use crate::validation::{Violation, DMY_FORMAT};

pub const ISO_FORMAT: &str = "%Y-%m-%d";

pub const STANDARD_ROOM_ID: i64 = -2147483637;
pub const DELUXE_SUITE_ID: i64 = -2147483456;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("Number of ages must match number of occupants ({ages} ages for {occupants} occupants)")]
    CountMismatch { ages: usize, occupants: u64 },

    #[error("Invalid date format: {value}")]
    BadDate { field: &'static str, value: String },

    #[error("Departure date must be after arrival date")]
    DepartureNotAfterArrival {
        arrival: NaiveDate,
        departure: NaiveDate,
    },
}

impl TransformError {
    // The inbound field the error should be reported against
    pub fn field(&self) -> &'static str {
        match self {
            TransformError::CountMismatch { .. } => AGES,
            TransformError::BadDate { field, .. } => *field,
            TransformError::DepartureNotAfterArrival { .. } => DEPARTURE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum AgeGroup {
    Adult,
    Teens,
    Child,
}

impl AgeGroup {
    pub fn from_age(age: u64) -> Self {
        match age {
            18.. => AgeGroup::Adult,
            13..=17 => AgeGroup::Teens,
            _ => AgeGroup::Child,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Guest {
    #[serde(rename = "AgeGroup")]
    pub age_group: AgeGroup,
}

// Body of the outbound rates request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OutboundRatesPayload {
    #[serde(rename = "Unit Type ID")]
    pub unit_type_id: i64,
    /// `yyyy-mm-dd`
    #[serde(rename = "Arrival")]
    pub arrival: String,
    /// `yyyy-mm-dd`
    #[serde(rename = "Departure")]
    pub departure: String,
    #[serde(rename = "Guests")]
    pub guests: Vec<Guest>,
}

/// Result of looking a unit name up in the [`UnitTypeTable`].
///
/// Unknown names fall back to the table's default ID instead of failing;
/// `Defaulted` keeps that case distinguishable from a real match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitLookup {
    Matched(i64),
    Defaulted(i64),
}

impl UnitLookup {
    pub fn id(&self) -> i64 {
        match self {
            UnitLookup::Matched(id) | UnitLookup::Defaulted(id) => *id,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, UnitLookup::Defaulted(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UnitTypeTable {
    pub units: HashMap<String, i64>,
    pub default_id: i64,
}

impl Default for UnitTypeTable {
    fn default() -> Self {
        let units = HashMap::from([
            ("Standard Room".to_string(), STANDARD_ROOM_ID),
            ("Deluxe Suite".to_string(), DELUXE_SUITE_ID),
        ]);
        Self {
            units,
            default_id: STANDARD_ROOM_ID,
        }
    }
}

impl UnitTypeTable {
    // Exact, case-sensitive match on the unit name
    pub fn lookup(&self, unit_name: &str) -> UnitLookup {
        match self.units.get(unit_name) {
            Some(id) => UnitLookup::Matched(*id),
            None => UnitLookup::Defaulted(self.default_id),
        }
    }
}

// Reorder a dd/mm/yyyy date into yyyy-mm-dd
pub fn convert_date(date: &str) -> Option<String> {
    parse_dmy(date).map(format_iso)
}

fn format_iso(date: NaiveDate) -> String {
    date.format(ISO_FORMAT).to_string()
}

fn parse_dmy(date: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date, DMY_FORMAT).ok()
}

pub struct RatesTransformer {
    units: UnitTypeTable,
}

impl Default for RatesTransformer {
    fn default() -> Self {
        Self::new(UnitTypeTable::default())
    }
}

impl RatesTransformer {
    pub fn new(units: UnitTypeTable) -> Self {
        Self { units }
    }

    // Build the outbound payload, checking the business rules the field validator cannot see
    pub fn transform(
        &self,
        request: &BookingRequest,
    ) -> Result<OutboundRatesPayload, TransformError> {
        if request.ages.len() as u64 != request.occupants {
            return Err(TransformError::CountMismatch {
                ages: request.ages.len(),
                occupants: request.occupants,
            });
        }

        let lookup = self.units.lookup(&request.unit_name);
        if lookup.is_defaulted() {
            warn!(
                unit_name = %request.unit_name,
                unit_type_id = lookup.id(),
                "Unknown unit name, using default unit type"
            );
        }

        let arrival = parse_dmy(&request.arrival).ok_or_else(|| TransformError::BadDate {
            field: ARRIVAL,
            value: request.arrival.clone(),
        })?;
        let departure = parse_dmy(&request.departure).ok_or_else(|| TransformError::BadDate {
            field: DEPARTURE,
            value: request.departure.clone(),
        })?;

        if departure <= arrival {
            return Err(TransformError::DepartureNotAfterArrival { arrival, departure });
        }

        let guests = request
            .ages
            .iter()
            .map(|age| Guest {
                age_group: AgeGroup::from_age(*age),
            })
            .collect();

        Ok(OutboundRatesPayload {
            unit_type_id: lookup.id(),
            arrival: format_iso(arrival),
            departure: format_iso(departure),
            guests,
        })
    }
}

impl From<&TransformError> for Violation {
    fn from(error: &TransformError) -> Self {
        match error {
            TransformError::BadDate { field, .. } => Violation::BadDateFormat {
                field: field.to_string(),
            },
            other => Violation::Rejected {
                field: other.field().to_string(),
                message: other.to_string(),
            },
        }
    }
}
