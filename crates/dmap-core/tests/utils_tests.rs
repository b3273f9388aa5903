use dmap_core::{decode_blob, encode_blob, mask_sensitive, EventEnvelope};

#[test]
fn test_mask_sensitive() {
    // Short strings (8 chars or less) should be completely masked
    assert_eq!(mask_sensitive("short"), "***");
    assert_eq!(mask_sensitive("12345678"), "***");

    // Longer strings should show first 4 and last 4 chars
    assert_eq!(mask_sensitive("1234567890"), "1234***7890");
    assert_eq!(mask_sensitive("secretpassword123"), "secr***d123");

    // Empty string
    assert_eq!(mask_sensitive(""), "***");

    // Multi-byte characters are counted as characters, not bytes
    assert_eq!(mask_sensitive("pässwörtlich"), "päss***lich");
}

#[test]
fn test_controller_push_blob_recovers_plaintext() {
    let message = "hi controller, this is module";
    let body = serde_json::json!({
        "receiverId": "controller",
        "blob": encode_blob(message.as_bytes()),
    });

    let blob = body["blob"].as_str().unwrap();
    assert_eq!(decode_blob(blob).unwrap(), message.as_bytes());
}

#[test]
fn test_envelope_from_peer_body() {
    let envelope = EventEnvelope::wrap(b"hey there, this is module").with_source("ep-1");
    let body = serde_json::to_vec(&envelope).unwrap();

    let envelope = EventEnvelope::from_json(&body).unwrap();
    assert_eq!(envelope.source_endpoint_id.as_deref(), Some("ep-1"));
    assert_eq!(envelope.message().unwrap(), b"hey there, this is module");
}
