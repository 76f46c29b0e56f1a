//! Unit tests for Gmail message decoding.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;

use task_harvester::channels::email::{
    extract_email, sender_address, GmailBody, GmailHeader, GmailMessage, GmailPart,
};

fn header(name: &str, value: &str) -> GmailHeader {
    GmailHeader {
        name: name.to_owned(),
        value: value.to_owned(),
    }
}

fn body(data: &str) -> Option<GmailBody> {
    Some(GmailBody {
        data: Some(data.to_owned()),
    })
}

#[test]
fn inline_body_and_headers_are_decoded() {
    let message = GmailMessage {
        id: "m1".into(),
        payload: Some(GmailPart {
            headers: vec![
                header("Subject", "Quarterly report"),
                header("From", "Boss <boss@example.com>"),
            ],
            body: body(&URL_SAFE.encode("Please send the report by Friday.")),
            parts: Vec::new(),
        }),
    };

    let email = extract_email(&message);
    assert_eq!(email.id, "m1");
    assert_eq!(email.subject, "Quarterly report");
    assert_eq!(email.sender, "Boss <boss@example.com>");
    assert_eq!(email.body, "Please send the report by Friday.");
}

#[test]
fn multipart_uses_first_part_when_inline_is_empty() {
    let message = GmailMessage {
        id: "m2".into(),
        payload: Some(GmailPart {
            headers: vec![header("subject", "lower-case header")],
            body: body(""),
            parts: vec![
                GmailPart {
                    body: body(&URL_SAFE_NO_PAD.encode("plain text part")),
                    ..GmailPart::default()
                },
                GmailPart {
                    body: body(&URL_SAFE_NO_PAD.encode("<p>html part</p>")),
                    ..GmailPart::default()
                },
            ],
        }),
    };

    let email = extract_email(&message);
    assert_eq!(email.body, "plain text part");
    assert_eq!(email.subject, "lower-case header");
}

#[test]
fn missing_headers_and_body_use_defaults() {
    let message = GmailMessage {
        id: "m3".into(),
        payload: None,
    };

    let email = extract_email(&message);
    assert_eq!(email.subject, "No Subject");
    assert_eq!(email.sender, "Unknown Sender");
    assert_eq!(email.body, "");
}

#[test]
fn undecodable_body_is_empty() {
    let message = GmailMessage {
        id: "m4".into(),
        payload: Some(GmailPart {
            body: body("!!not base64!!"),
            ..GmailPart::default()
        }),
    };
    assert_eq!(extract_email(&message).body, "");
}

#[test]
fn wire_json_deserializes() {
    let raw = serde_json::json!({
        "id": "abc",
        "threadId": "t1",
        "payload": {
            "mimeType": "text/plain",
            "headers": [{"name": "From", "value": "a@example.com"}],
            "body": {"size": 2, "data": "aGk"}
        }
    });
    let message: GmailMessage = serde_json::from_value(raw).expect("deserialize");
    let email = extract_email(&message);
    assert_eq!(email.body, "hi");
    assert_eq!(sender_address(&email.sender), "a@example.com");
}
