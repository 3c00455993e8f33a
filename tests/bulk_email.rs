mod common;

use std::sync::Arc;

use common::{RecordingTransport, identity};
use steth_store_api::notifications::{Attachment, NotificationDispatcher};

fn image(name: &str) -> Attachment {
    Attachment {
        name: name.into(),
        content_type: "image/png".into(),
        content: vec![0x89, 0x50, 0x4e, 0x47],
    }
}

#[tokio::test]
async fn one_failed_recipient_does_not_stop_the_others() {
    let transport = Arc::new(RecordingTransport::failing_for(&["two@example.com"]));
    let dispatcher = NotificationDispatcher::new(transport.clone(), identity());
    let recipients = vec![
        "one@example.com".to_string(),
        "two@example.com".to_string(),
        "three@example.com".to_string(),
    ];
    let images = vec![image("summer.png"), image("scrubs.png")];

    let report = dispatcher
        .bulk(&recipients, "Summer sale", "Everything is 20% off", &images)
        .await;

    assert_eq!(report.success_count, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].email, "two@example.com");
    assert!(report.failures[0].error.contains("550"));

    for address in ["one@example.com", "three@example.com"] {
        let received = transport.sent_to(address);
        assert_eq!(received.len(), 1, "{address} should get exactly one email");
        let names: Vec<_> = received[0].attachments.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["summer.png", "scrubs.png"]);
        assert_eq!(received[0].subject, "Summer sale");
    }
    assert!(transport.sent_to("two@example.com").is_empty());
}

#[tokio::test]
async fn report_serializes_in_camel_case() {
    let transport = Arc::new(RecordingTransport::failing_for(&["b@example.com"]));
    let dispatcher = NotificationDispatcher::new(transport, identity());
    let report = dispatcher
        .bulk(&["a@example.com".to_string(), "b@example.com".to_string()], "Hi", "Hello", &[])
        .await;

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["successCount"], 1);
    assert_eq!(json["failures"][0]["email"], "b@example.com");
}
