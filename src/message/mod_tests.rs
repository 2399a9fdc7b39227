//! Tests for queue message encoding.

use super::*;
use crate::time::unix_now;

fn sample_job() -> FaxJob {
    FaxJob::new("a", "b", "c", "d").with_retry_count(5)
}

mod fax_job {
    use super::*;

    #[test]
    fn decodes_all_fields() {
        let body = r#"
            {
                "fax_id": "a",
                "to": "b",
                "pdf_url": "c",
                "callback_url": "d",
                "retry_count": 5
            }
        "#;

        assert_eq!(FaxJob::decode(body).unwrap(), sample_job());
    }

    #[test]
    fn missing_retry_count_defaults_to_zero() {
        let body = r#"{"fax_id": "a", "to": "b", "pdf_url": "c", "callback_url": "d"}"#;

        let job = FaxJob::decode(body).unwrap();
        assert_eq!(job.retry_count, 0);
        assert_eq!(job, FaxJob::new("a", "b", "c", "d"));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let body = r#"{"fax_id": "a", "to": "b", "pdf_url": "c", "callback_url": "d", "priority": "high"}"#;

        assert_eq!(FaxJob::decode(body).unwrap(), FaxJob::new("a", "b", "c", "d"));
    }

    #[test]
    fn encodes_to_flat_object() {
        let encoded = sample_job().encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "fax_id": "a",
                "to": "b",
                "pdf_url": "c",
                "callback_url": "d",
                "retry_count": 5
            })
        );
    }

    #[test]
    fn encoding_is_compact() {
        let encoded = sample_job().encode().unwrap();
        assert!(!encoded.contains('\n'));
        assert!(!encoded.contains(": "));
    }

    #[test]
    fn survives_encode_decode() {
        let job = sample_job();
        assert_eq!(FaxJob::decode(&job.encode().unwrap()).unwrap(), job);
    }

    #[test]
    fn missing_required_field_is_decode_error() {
        let body = r#"{"fax_id": "a", "to": "b", "pdf_url": "c"}"#;

        let err = FaxJob::decode(body).unwrap_err();
        assert!(matches!(err, MessageError::Decode { kind: "fax job", .. }));
        assert!(err.to_string().contains("callback_url"));
    }

    #[test]
    fn negative_retry_count_is_rejected() {
        let body = r#"{"fax_id": "a", "to": "b", "pdf_url": "c", "callback_url": "d", "retry_count": -1}"#;

        assert!(FaxJob::decode(body).is_err());
    }

    #[test]
    fn attempt_is_one_based() {
        assert_eq!(FaxJob::new("a", "b", "c", "d").attempt(), 1);
        assert_eq!(sample_job().attempt(), 6);
    }

    #[test]
    fn next_attempt_increments_retry_count_only() {
        let job = sample_job();
        let next = job.next_attempt();

        assert_eq!(next.retry_count, 6);
        assert_eq!(next.fax_id, job.fax_id);
        assert_eq!(next.to, job.to);
        assert_eq!(next.pdf_url, job.pdf_url);
        assert_eq!(next.callback_url, job.callback_url);
    }
}

mod fax_status {
    use super::*;

    #[test]
    fn serializes_to_wire_names() {
        assert_eq!(serde_json::to_string(&FaxStatus::Sent).unwrap(), r#""sent""#);
        assert_eq!(
            serde_json::to_string(&FaxStatus::TemporaryFailure).unwrap(),
            r#""tmp_fail""#
        );
        assert_eq!(
            serde_json::to_string(&FaxStatus::PermanentFailure).unwrap(),
            r#""perm_fail""#
        );
    }

    #[test]
    fn display_matches_wire_name() {
        for status in [
            FaxStatus::Sent,
            FaxStatus::TemporaryFailure,
            FaxStatus::PermanentFailure,
        ] {
            let wire = serde_json::to_string(&status).unwrap();
            assert_eq!(wire, format!("\"{status}\""));
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(serde_json::from_str::<FaxStatus>(r#""lost""#).is_err());
    }
}

mod webhook {
    use super::*;

    #[test]
    fn decodes_notification_with_timestamp() {
        let body = r#"
            {
                "callback_url": "a",
                "payload": {
                    "fax_id": "b",
                    "status": "sent",
                    "message": "c",
                    "timestamp": 1590590198
                }
            }
        "#;

        assert_eq!(
            WebhookNotification::decode(body).unwrap(),
            WebhookNotification::new("a", WebhookPayload::at("b", FaxStatus::Sent, "c", 1_590_590_198))
        );
    }

    #[test]
    fn missing_timestamp_defaults_to_decode_time() {
        let body = r#"
            {
                "callback_url": "a",
                "payload": {"fax_id": "b", "status": "tmp_fail", "message": "c"}
            }
        "#;

        let before = unix_now();
        let notification = WebhookNotification::decode(body).unwrap();
        let after = unix_now();

        assert_eq!(notification.payload.status, FaxStatus::TemporaryFailure);
        assert!(notification.payload.timestamp >= before);
        assert!(notification.payload.timestamp <= after);
    }

    #[test]
    fn new_payload_is_stamped_with_current_time() {
        let before = unix_now();
        let payload = WebhookPayload::new("b", FaxStatus::PermanentFailure, "c");
        let after = unix_now();

        assert!(payload.timestamp >= before);
        assert!(payload.timestamp <= after);
    }

    #[test]
    fn encodes_nested_payload() {
        let notification = WebhookNotification::new(
            "a",
            WebhookPayload::at("b", FaxStatus::PermanentFailure, "c", 1_326_517_567),
        );

        let value: serde_json::Value =
            serde_json::from_str(&notification.encode().unwrap()).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "callback_url": "a",
                "payload": {
                    "fax_id": "b",
                    "status": "perm_fail",
                    "message": "c",
                    "timestamp": 1_326_517_567
                }
            })
        );
    }

    #[test]
    fn payload_survives_encode_decode() {
        let payload = WebhookPayload::at("b", FaxStatus::Sent, "c", 1_590_590_198);
        assert_eq!(WebhookPayload::decode(&payload.encode().unwrap()).unwrap(), payload);
    }

    #[test]
    fn notification_survives_encode_decode() {
        let notification = WebhookNotification::new(
            "a",
            WebhookPayload::at("b", FaxStatus::Sent, "c", 1_590_590_198),
        );

        assert_eq!(
            WebhookNotification::decode(&notification.encode().unwrap()).unwrap(),
            notification
        );
    }

    #[test]
    fn garbage_body_names_the_expected_kind() {
        let err = WebhookNotification::decode("not json").unwrap_err();
        assert!(err.to_string().starts_with("Failed to decode webhook notification"));
    }
}
