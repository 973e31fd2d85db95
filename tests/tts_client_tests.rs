//! Mock HTTP tests for the narration client.

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use videoforge::tts::{TtsClient, TtsError, DEFAULT_VOICE_ID};

fn client_for(server: &MockServer) -> TtsClient {
    TtsClient::with_api_key("test-api-key".to_string())
        .unwrap()
        .base_url(server.uri())
}

#[tokio::test]
async fn test_synthesize_streams_audio_to_file() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("narration.mp3");

    Mock::given(method("POST"))
        .and(path(format!("/v1/text-to-speech/{}", DEFAULT_VOICE_ID)))
        .and(header("xi-api-key", "test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3-bytes".to_vec()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let written = client.synthesize("Welcome to the video.", &dest).await.unwrap();

    assert_eq!(written, 9);
    assert_eq!(std::fs::read(&dest).unwrap(), b"mp3-bytes");
}

#[tokio::test]
async fn test_custom_voice_changes_endpoint() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("narration.mp3");

    Mock::given(method("POST"))
        .and(path("/v1/text-to-speech/custom-voice"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server).voice("custom-voice");
    client.synthesize("Hello.", &dest).await.unwrap();
}

#[tokio::test]
async fn test_quota_exhaustion_retries_with_shortened_script() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("narration.mp3");

    // First attempt hits the quota wall, the shortened retry goes through.
    Mock::given(method("POST"))
        .and(path(format!("/v1/text-to-speech/{}", DEFAULT_VOICE_ID)))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_string(r#"{"detail": {"status": "quota_exceeded"}}"#),
        )
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/v1/text-to-speech/{}", DEFAULT_VOICE_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"short-mp3".to_vec()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let text = "word ".repeat(500);
    let saved = client
        .synthesize_with_quota_fallback(&text, &dest)
        .await
        .unwrap();

    assert_eq!(saved, dest);
    assert_eq!(std::fs::read(&dest).unwrap(), b"short-mp3");
}

#[tokio::test]
async fn test_quota_exhaustion_twice_propagates() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("narration.mp3");

    Mock::given(method("POST"))
        .and(path(format!("/v1/text-to-speech/{}", DEFAULT_VOICE_ID)))
        .respond_with(
            ResponseTemplate::new(401).set_body_string("credit limit reached"),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let text = "word ".repeat(500);
    let err = client
        .synthesize_with_quota_fallback(&text, &dest)
        .await
        .unwrap_err();

    assert!(matches!(err, TtsError::QuotaExhausted(_)));
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_non_quota_error_is_not_retried() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("narration.mp3");

    Mock::given(method("POST"))
        .and(path(format!("/v1/text-to-speech/{}", DEFAULT_VOICE_ID)))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .synthesize_with_quota_fallback("Hello.", &dest)
        .await
        .unwrap_err();

    match err {
        TtsError::ApiError(msg) => assert!(msg.contains("internal error")),
        other => panic!("Expected ApiError, got {:?}", other),
    }
}
