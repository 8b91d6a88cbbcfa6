//! Canonical wire form of the hashed model types. A remote verifier
//! recomputes hashes from these exact bytes.

use attest_core::{sha256_hex, sha256_hex_bytes, AnalysisResult, CanonicalBytes, Message};

fn analysis() -> AnalysisResult {
    serde_json::from_str(
        r#"{
            "processingTimeMs": 12,
            "messageCount": 3,
            "trustworthinessScore": {
                "explanation": "ok",
                "factors": {"tone": 0.5, "consistency": 1.0},
                "score": 0.25
            },
            "personalityTraits": {
                "neuroticism": 0.1, "agreeableness": 0.2, "extraversion": 0.3,
                "conscientiousness": 0.4, "openness": 0.5, "confidence": 0.75
            }
        }"#,
    )
    .unwrap()
}

#[test]
fn analysis_result_canonical_form() {
    let bytes = CanonicalBytes::new(&analysis()).unwrap();
    let text = std::str::from_utf8(bytes.as_bytes()).unwrap();
    assert_eq!(
        text,
        concat!(
            r#"{"messageCount":3,"#,
            r#""personalityTraits":{"agreeableness":0.2,"confidence":0.75,"#,
            r#""conscientiousness":0.4,"extraversion":0.3,"neuroticism":0.1,"openness":0.5},"#,
            r#""processingTimeMs":12,"#,
            r#""trustworthinessScore":{"explanation":"ok","#,
            r#""factors":{"consistency":1,"tone":0.5},"score":0.25}}"#
        )
    );
}

#[test]
fn canonical_form_ignores_input_key_order() {
    let reordered: AnalysisResult = serde_json::from_value(serde_json::json!({
        "personalityTraits": {
            "openness": 0.5, "conscientiousness": 0.4, "extraversion": 0.3,
            "agreeableness": 0.2, "neuroticism": 0.1, "confidence": 0.75
        },
        "trustworthinessScore": {
            "score": 0.25, "factors": {"consistency": 1.0, "tone": 0.5}, "explanation": "ok"
        },
        "messageCount": 3,
        "processingTimeMs": 12
    }))
    .unwrap();
    assert_eq!(
        sha256_hex(&CanonicalBytes::new(&reordered).unwrap()),
        sha256_hex(&CanonicalBytes::new(&analysis()).unwrap())
    );
}

#[test]
fn message_canonical_form() {
    let message: Message = serde_json::from_value(serde_json::json!({
        "id": "6f1c2a9e-3b4d-4e5f-8a7b-9c0d1e2f3a4b",
        "content": "hello",
        "timestamp": "2026-02-03T04:05:06.789+02:00",
        "sender": "alice",
        "recipient": "bob",
        "direction": "outgoing"
    }))
    .unwrap();
    let bytes = CanonicalBytes::new(&message).unwrap();
    assert_eq!(
        std::str::from_utf8(bytes.as_bytes()).unwrap(),
        concat!(
            r#"{"content":"hello","direction":"outgoing","#,
            r#""id":"6f1c2a9e-3b4d-4e5f-8a7b-9c0d1e2f3a4b","#,
            r#""recipient":"bob","sender":"alice","#,
            r#""timestamp":"2026-02-03T02:05:06Z"}"#
        )
    );
}

#[test]
fn sha256_known_vector() {
    assert_eq!(
        sha256_hex_bytes(b"abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}
