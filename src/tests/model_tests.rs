//! tests/model_tests.rs
//! Pruebas de modelos, adaptadores del proveedor y utilidades puras.

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use serde_json::json;

    use std::time::Duration;

    use crate::config::app_config::{parse_bool, send_timeout_from_secs};
    use crate::handlers::error_status;
    use crate::models::{
        account_model::{AccountPatch, ProviderUser, WhatsAppCredentials},
        batch_model::{ApiResponse, BatchRequest},
        error_model::{QuotaReason, ServiceError},
        recipient_model::{count_placeholders, fill_placeholders, Channel},
        report_model::EmailEventType,
    };
    use crate::services::transport_service::CloudWhatsAppTransport;

    #[test]
    fn provider_user_maps_to_client_account() {
        let user: ProviderUser = serde_json::from_value(json!({
            "user_id": "auth0|1",
            "email": " Ana@Example.com ",
            "email_verified": true,
            "app_metadata": {
                "tokens": -4,
                "is_active": true,
                "mobile_number": "+5215512345678",
                "wa_access_token": "tok",
                "wa_phone_number_id": "123"
            }
        }))
        .unwrap();

        let account = user.into_account();

        assert_eq!(account.email, "ana@example.com");
        assert_eq!(account.balance, 0);
        assert!(account.active && account.email_verified);
        assert_eq!(account.whatsapp.unwrap().phone_number_id, "123");

        let bare: ProviderUser =
            serde_json::from_value(json!({ "user_id": "auth0|2", "email": "b@x.com" })).unwrap();
        let bare = bare.into_account();
        assert!(!bare.active);
        assert!(bare.whatsapp.is_none());
        assert!(!bare.is_report_eligible());
    }

    #[test]
    fn account_patch_only_carries_changed_fields() {
        let patch = AccountPatch {
            balance: Some(7),
            ..AccountPatch::default()
        };
        assert_eq!(
            patch.to_provider_body(),
            json!({ "app_metadata": { "tokens": 7 } })
        );

        let wa = AccountPatch {
            whatsapp: Some(WhatsAppCredentials {
                access_token: "tok".to_string(),
                phone_number_id: "123".to_string(),
            }),
            ..AccountPatch::default()
        };
        assert_eq!(
            wa.to_provider_body(),
            json!({ "app_metadata": { "wa_access_token": "tok", "wa_phone_number_id": "123" } })
        );
        assert!(AccountPatch::default().is_empty());
    }

    #[test]
    fn placeholders_are_filled_in_order() {
        assert_eq!(count_placeholders("Hola {}, tu código es {}"), 2);
        assert_eq!(
            fill_placeholders("Hola {}, tu código es {}", &["Ana", "42"]),
            "Hola Ana, tu código es 42"
        );
        assert_eq!(fill_placeholders("{} y {}", &["solo"]), "solo y ");
    }

    #[test]
    fn whatsapp_payload_uses_body_parameters() {
        let payload = CloudWhatsAppTransport::template_payload(
            "+5215500000001",
            "reminder",
            "es_MX",
            &["Ana".to_string()],
        );

        assert_eq!(payload["to"], "5215500000001");
        assert_eq!(payload["template"]["language"]["code"], "es_MX");
        assert_eq!(
            payload["template"]["components"][0]["parameters"][0]["text"],
            "Ana"
        );

        let no_params = CloudWhatsAppTransport::template_payload("+1", "hello", "en_US", &[]);
        assert!(no_params["template"].get("components").is_none());
    }

    #[test]
    fn batch_request_deserializes_from_json_grid() {
        let req: BatchRequest = serde_json::from_value(json!({
            "channel": "whatsapp",
            "sheet": { "rows": [["field", "value"], ["mobile", null]] }
        }))
        .unwrap();

        assert_eq!(req.channel, Channel::WhatsApp);
        assert!(!req.is_draft && !req.async_send);
        assert_eq!(req.sheet.rows[1][1], None);
    }

    #[test]
    fn errors_map_to_structured_responses() {
        let err = ServiceError::Quota {
            reason: QuotaReason::Insufficient,
            required: 6,
            balance: 5,
        };
        let body = serde_json::to_value(ApiResponse::from_error(&err)).unwrap();

        assert_eq!(body["success"], false);
        assert_eq!(body["error_kind"], "quota");
        assert_eq!(body["details"]["reason"], "insufficient");
        assert_eq!(error_status(&err), StatusCode::PAYMENT_REQUIRED);

        let missing = ServiceError::missing_field("subject", "required field is missing");
        assert_eq!(error_status(&missing), StatusCode::BAD_REQUEST);
        assert_eq!(
            error_status(&ServiceError::FeatureDisabled("ENABLE_SEND_SMS")),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn env_booleans_and_event_types_parse_strictly() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);

        assert_eq!(EmailEventType::parse("Bounce"), Some(EmailEventType::Bounce));
        assert_eq!(EmailEventType::parse("Open"), None);
    }

    #[test]
    fn zero_send_timeout_is_raised_to_one_second() {
        assert_eq!(send_timeout_from_secs(0), Duration::from_secs(1));
        assert_eq!(send_timeout_from_secs(30), Duration::from_secs(30));
    }

    #[test]
    fn failure_response_has_no_error_kind() {
        let body = serde_json::to_value(
            ApiResponse::failure("operation op-1 not found").with_operation("op-1"),
        )
        .unwrap();

        assert_eq!(body["success"], json!(false));
        assert_eq!(body["status"], json!("error"));
        assert_eq!(body["operation_id"], json!("op-1"));
        assert!(body.get("error_kind").is_none());
    }
}
