//! tests/report_tests.rs
//! Pruebas unitarias para el reporte mensual (`ReportService`).

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde_json::json;

    use crate::config::app_config::{Feature, FeatureFlags};
    use crate::models::{
        account_model::ClientAccount,
        error_model::{ErrorKind, ServiceError},
        report_model::{
            EmailDeliveryEvent, EmailEventType, LogStreamInfo, ProviderLogEvent, SmsSendEvent,
        },
    };
    use crate::services::report_service::{aggregate_email_events, window_start, ReportService};
    use crate::tests::support::{account, MemoryLogStore, MockEventSource, MockIdentity, RecordingMailer};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap()
    }

    fn email_event(kind: &str, to: &str, ts: DateTime<Utc>) -> EmailDeliveryEvent {
        EmailDeliveryEvent {
            event_type: kind.to_string(),
            recipients: vec![to.to_string()],
            timestamp: ts,
            metadata: serde_json::Value::Null,
        }
    }

    fn delivery(message_id: &str, destination: &str, status: &str) -> ProviderLogEvent {
        ProviderLogEvent {
            timestamp: now(),
            message: json!({
                "notification": { "messageId": message_id },
                "delivery": {
                    "destination": destination,
                    "phoneCarrier": "Telcel",
                    "providerResponse": "Message has been accepted by phone"
                },
                "status": status
            }),
        }
    }

    struct Harness {
        identity: Arc<MockIdentity>,
        events: Arc<MockEventSource>,
        store: Arc<MemoryLogStore>,
        mailer: Arc<RecordingMailer>,
    }

    impl Harness {
        fn new(accounts: Vec<ClientAccount>, events: MockEventSource) -> Self {
            Harness {
                identity: Arc::new(MockIdentity::with_accounts(accounts)),
                events: Arc::new(events),
                store: Arc::new(MemoryLogStore::default()),
                mailer: Arc::new(RecordingMailer::default()),
            }
        }

        fn service(&self, flags: FeatureFlags, all_clients: bool) -> ReportService {
            ReportService::new(
                self.identity.clone(),
                self.events.clone(),
                self.events.clone(),
                self.store.clone(),
                self.mailer.clone(),
                flags,
                all_clients,
            )
        }
    }

    #[test]
    fn events_older_than_thirty_days_are_excluded() {
        let now = now();
        let events = vec![
            email_event("Delivery", "a@x.com", now - Duration::days(1)),
            email_event("Delivery", "old@x.com", now - Duration::days(31)),
            email_event("Delivery", "edge@x.com", window_start(now)),
            email_event("Bounce", "b@x.com", now - Duration::days(2)),
            email_event("Bounce", "b@x.com", now - Duration::days(3)),
            email_event("Open", "a@x.com", now - Duration::days(1)),
        ];

        let usage = aggregate_email_events(&events, window_start(now), now);

        assert_eq!(usage.count(EmailEventType::Delivery), 2);
        assert_eq!(
            usage.recipients[&EmailEventType::Delivery],
            vec!["a@x.com", "edge@x.com"]
        );
        assert_eq!(usage.count(EmailEventType::Bounce), 2);
        assert_eq!(usage.recipients[&EmailEventType::Bounce], vec!["b@x.com"]);
        assert_eq!(usage.count(EmailEventType::Complaint), 0);
        assert_eq!(usage.counts.len(), 2);
    }

    #[actix_rt::test]
    async fn sms_sends_are_matched_most_recent_stream_first() {
        let client = account("ana@example.com", 10);
        let stream = client.sms_log_stream();
        assert_eq!(stream, "sms-sends/ana_example_com");

        let mut events = MockEventSource::default();
        events.sms_sends.insert(
            stream,
            vec![
                SmsSendEvent {
                    message_id: "m-1".to_string(),
                    timestamp: now() - Duration::days(1),
                },
                SmsSendEvent {
                    message_id: "m-2".to_string(),
                    timestamp: now() - Duration::days(2),
                },
                SmsSendEvent {
                    message_id: "m-old".to_string(),
                    timestamp: now() - Duration::days(40),
                },
            ],
        );
        events.streams = vec![
            LogStreamInfo {
                name: "older".to_string(),
                last_event_at: Some(now() - Duration::days(5)),
            },
            LogStreamInfo {
                name: "newest".to_string(),
                last_event_at: Some(now() - Duration::hours(1)),
            },
        ];
        events.stream_contents.insert(
            "newest".to_string(),
            vec![
                delivery("m-1", "+5215500000001", "SUCCESS"),
                ProviderLogEvent {
                    timestamp: now(),
                    message: json!("not a delivery entry"),
                },
            ],
        );
        events.stream_contents.insert(
            "older".to_string(),
            vec![
                delivery("m-1", "+5215599999999", "FAILURE"),
                delivery("m-old", "+5215500000003", "SUCCESS"),
            ],
        );
        let h = Harness::new(vec![client.clone()], events);
        let service = h.service(FeatureFlags::all_enabled(), false);

        let since = window_start(now());
        let records = service.correlate_sms(&client, since, now()).await.unwrap();

        // m-1 sale del stream más reciente; m-2 no tiene entrega; m-old queda fuera de la ventana
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message_id, "m-1");
        assert_eq!(records[0].mobile_number, "+5215500000001");
        assert_eq!(records[0].phone_carrier, "Telcel");
        assert_eq!(records[0].status, "SUCCESS");
        assert_eq!(h.events.fetches(), vec!["newest", "older"]);
    }

    #[actix_rt::test]
    async fn provider_entries_encoded_as_text_are_parsed() {
        let client = account("ana@example.com", 10);
        let mut events = MockEventSource::default();
        events.sms_sends.insert(
            client.sms_log_stream(),
            vec![SmsSendEvent {
                message_id: "m-9".to_string(),
                timestamp: now(),
            }],
        );
        events.streams = vec![LogStreamInfo {
            name: "s".to_string(),
            last_event_at: None,
        }];
        let raw = delivery("m-9", "+5215500000009", "SUCCESS").message.to_string();
        events.stream_contents.insert(
            "s".to_string(),
            vec![ProviderLogEvent {
                timestamp: now(),
                message: json!(raw),
            }],
        );
        let h = Harness::new(vec![client.clone()], events);

        let records = h
            .service(FeatureFlags::all_enabled(), false)
            .correlate_sms(&client, window_start(now()), now())
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].mobile_number, "+5215500000009");
    }

    #[actix_rt::test]
    async fn only_eligible_clients_and_first_one_by_default() {
        let mut inactive = account("a-inactive@example.com", 10);
        inactive.active = false;
        let empty = account("b-empty@example.com", 0);
        let first = account("c-first@example.com", 10);
        let second = account("d-second@example.com", 3);
        let h = Harness::new(
            vec![inactive, empty, first, second],
            MockEventSource::default(),
        );

        let outcomes = h
            .service(FeatureFlags::all_enabled(), false)
            .run_monthly_reports(now())
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].client_email, "c-first@example.com");

        let outcomes = h
            .service(FeatureFlags::all_enabled(), true)
            .run_monthly_reports(now())
            .await
            .unwrap();
        let emails: Vec<_> = outcomes.iter().map(|o| o.client_email.as_str()).collect();
        assert_eq!(emails, vec!["c-first@example.com", "d-second@example.com"]);

        let reports = h.mailer.reports.lock().unwrap().clone();
        assert!(reports
            .iter()
            .any(|(to, file, balance)| to == "d-second@example.com"
                && file.starts_with("d-second_monthly-report_")
                && *balance == 3));
    }

    #[actix_rt::test]
    async fn one_client_failure_does_not_stop_the_others() {
        let mut events = MockEventSource::default();
        events
            .failing_senders
            .insert("a-broken@example.com".to_string());
        events.email_events.insert(
            "b-fine@example.com".to_string(),
            vec![email_event("Send", "x@y.com", now() - Duration::days(1))],
        );
        let h = Harness::new(
            vec![
                account("a-broken@example.com", 5),
                account("b-fine@example.com", 5),
            ],
            events,
        );

        let outcomes = h
            .service(FeatureFlags::all_enabled(), true)
            .run_monthly_reports(now())
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[0].success);
        assert!(outcomes[0].error.as_deref().unwrap().contains("correlation error"));
        assert!(outcomes[1].success);
        let stored = h.store.files.lock().unwrap();
        let content = stored
            .get(outcomes[1].report_file.as_deref().unwrap())
            .unwrap();
        assert!(content.contains("Send: 1"));
        assert!(content.contains("  - x@y.com"));
    }

    #[actix_rt::test]
    async fn listing_failure_and_disabled_flag_abort_the_run() {
        let h = Harness {
            identity: Arc::new(MockIdentity {
                fail_list: true,
                ..MockIdentity::default()
            }),
            events: Arc::new(MockEventSource::default()),
            store: Arc::new(MemoryLogStore::default()),
            mailer: Arc::new(RecordingMailer::default()),
        };
        let err = h
            .service(FeatureFlags::all_enabled(), true)
            .run_monthly_reports(now())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Credential);

        let mut flags = FeatureFlags::all_enabled();
        flags.set(Feature::MonthlyReport, false);
        let err = h.service(flags, true).run_monthly_reports(now()).await.unwrap_err();
        assert!(matches!(err, ServiceError::FeatureDisabled("ENABLE_MONTHLY_REPORT")));
    }
}
