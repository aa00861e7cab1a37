// Rates service: transform the booking request, call the upstream, audit both legs

use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::audit::{AuditLog, EntryKind};
use crate::booking::BookingRequest;
use crate::gateway::{GatewayError, RatesApi, RatesResult};
use crate::transform::{RatesTransformer, TransformError};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("Failed to fetch rates: {0}")]
    Gateway(#[from] GatewayError),
}

pub struct RatesService {
    transformer: RatesTransformer,
    client: Arc<dyn RatesApi>,
    audit: Option<AuditLog>,
}

impl RatesService {
    pub fn new(transformer: RatesTransformer, client: Arc<dyn RatesApi>) -> Self {
        Self {
            transformer,
            client,
            audit: None,
        }
    }

    pub fn with_audit_log(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    // `original` is the inbound body as received, kept for the audit trail only
    pub async fn fetch_rates(
        &self,
        request: &BookingRequest,
        original: &Value,
    ) -> Result<RatesResult, ServiceError> {
        let payload = self.transformer.transform(request)?;
        debug!(?payload, "Transformed rates payload");

        if let Some(audit) = &self.audit {
            let entry = json!({ "original": original, "transformed": payload });
            audit.record(EntryKind::Request, &entry).await;
        }

        let rates = self.client.fetch_rates(&payload).await?;

        if let Some(audit) = &self.audit {
            audit.record(EntryKind::Response, &rates.0).await;
        }

        Ok(rates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::parse_booking_request;
    use crate::gateway::mock_gateway::{MockMode, MockRatesApi};
    use crate::transform::{AgeGroup, Guest, OutboundRatesPayload, STANDARD_ROOM_ID};

    fn body(occupants: u64, ages: Value) -> Value {
        json!({
            "Unit Name": "Standard Room",
            "Arrival": "01/12/2025",
            "Departure": "05/12/2025",
            "Occupants": occupants,
            "Ages": ages
        })
    }

    fn service(mock: Arc<MockRatesApi>) -> RatesService {
        RatesService::new(RatesTransformer::default(), mock)
    }

    #[tokio::test]
    async fn test_fetch_rates_forwards_transformed_payload() {
        let mock = Arc::new(MockRatesApi::new(MockMode::Respond(json!({"Rooms": 1}))));
        let service = service(mock.clone());

        let original = body(2, json!([30, 10]));
        let request = parse_booking_request(&original).unwrap();
        let result = service.fetch_rates(&request, &original).await;
        assert!(result.is_ok(), "Fetch failed: {:?}", result.err());
        assert_eq!(result.unwrap().into_inner(), json!({"Rooms": 1}));

        let payloads = mock.payloads().await;
        assert_eq!(
            payloads,
            vec![OutboundRatesPayload {
                unit_type_id: STANDARD_ROOM_ID,
                arrival: "2025-12-01".to_string(),
                departure: "2025-12-05".to_string(),
                guests: vec![
                    Guest {
                        age_group: AgeGroup::Adult
                    },
                    Guest {
                        age_group: AgeGroup::Child
                    },
                ],
            }]
        );
    }

    #[tokio::test]
    async fn test_count_mismatch_makes_no_outbound_call() {
        let mock = Arc::new(MockRatesApi::new(MockMode::Respond(json!({}))));
        let service = service(mock.clone());

        let original = body(2, json!([10]));
        let request = parse_booking_request(&original).unwrap();
        let err = service.fetch_rates(&request, &original).await.unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Transform(TransformError::CountMismatch { .. })
        ));
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_gateway_error_is_wrapped() {
        let mock = Arc::new(MockRatesApi::new(MockMode::Status(500)));
        let service = service(mock.clone());

        let original = body(1, json!([40]));
        let request = parse_booking_request(&original).unwrap();
        let err = service.fetch_rates(&request, &original).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "Failed to fetch rates: Remote API returned status code: 500"
        );
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_audit_log_records_request_and_response() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.log");
        let audit = AuditLog::open(&path).await.unwrap();

        let mock = Arc::new(MockRatesApi::new(MockMode::Respond(json!({"Rooms": 1}))));
        let service = service(mock).with_audit_log(audit);

        let original = body(1, json!([40]));
        let request = parse_booking_request(&original).unwrap();
        tokio_test::assert_ok!(service.fetch_rates(&request, &original).await);

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let entries: Vec<Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["type"], "Request");
        assert_eq!(entries[0]["data"]["original"], original);
        assert_eq!(entries[0]["data"]["transformed"]["Arrival"], "2025-12-01");
        assert_eq!(entries[1]["type"], "Response");
        assert_eq!(entries[1]["data"], json!({"Rooms": 1}));
    }

    #[tokio::test]
    async fn test_failed_gateway_call_only_audits_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.log");
        let audit = AuditLog::open(&path).await.unwrap();

        let mock = Arc::new(MockRatesApi::new(MockMode::InvalidBody));
        let service = service(mock).with_audit_log(audit);

        let original = body(1, json!([40]));
        let request = parse_booking_request(&original).unwrap();
        tokio_test::assert_err!(service.fetch_rates(&request, &original).await);

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    // Every write to /dev/full fails with ENOSPC
    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_audit_write_failure_does_not_fail_request() {
        let audit = AuditLog::open("/dev/full").await.unwrap();

        let mock = Arc::new(MockRatesApi::new(MockMode::Respond(json!({"Rooms": 1}))));
        let service = service(mock.clone()).with_audit_log(audit);

        let original = body(1, json!([40]));
        let request = parse_booking_request(&original).unwrap();
        let rates = tokio_test::assert_ok!(service.fetch_rates(&request, &original).await);

        assert_eq!(rates.into_inner(), json!({"Rooms": 1}));
        assert_eq!(mock.request_count(), 1);
    }
}
