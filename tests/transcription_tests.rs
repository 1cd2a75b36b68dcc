use bakbak::services::{AssemblyAiTranscriber, TranscriptionError, Transcriber};
use serde_json::json;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use wiremock::matchers::{body_json, body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "test-key";

fn audio_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"RIFF fake wav bytes").unwrap();
    file
}

fn transcriber(server: &MockServer) -> AssemblyAiTranscriber {
    AssemblyAiTranscriber::new(server.uri(), API_KEY).with_polling(5, Duration::from_millis(10))
}

async fn mount_upload_and_request(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v2/upload"))
        .and(header("authorization", API_KEY))
        .and(body_string("RIFF fake wav bytes"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "upload_url": "https://cdn/audio/1" })),
        )
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v2/transcript"))
        .and(header("authorization", API_KEY))
        .and(body_json(json!({ "audio_url": "https://cdn/audio/1" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "tr_1" })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_transcribe_polls_until_completed() {
    let server = MockServer::start().await;
    mount_upload_and_request(&server).await;

    Mock::given(method("GET"))
        .and(path("/v2/transcript/tr_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "processing" })))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/transcript/tr_1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "completed", "text": "Peter Piper picked" })),
        )
        .mount(&server)
        .await;

    let file = audio_file();
    let text = transcriber(&server).transcribe(file.path()).await.unwrap();
    assert_eq!(text, "Peter Piper picked");
}

#[tokio::test]
async fn test_failed_job_reports_error() {
    let server = MockServer::start().await;
    mount_upload_and_request(&server).await;

    Mock::given(method("GET"))
        .and(path("/v2/transcript/tr_1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "failed", "error": "no speech found" })),
        )
        .mount(&server)
        .await;

    let file = audio_file();
    let err = transcriber(&server)
        .transcribe(file.path())
        .await
        .unwrap_err();
    match err {
        TranscriptionError::Failed(reason) => assert_eq!(reason, "no speech found"),
        other => panic!("expected Failed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_gives_up_after_max_polls() {
    let server = MockServer::start().await;
    mount_upload_and_request(&server).await;

    Mock::given(method("GET"))
        .and(path("/v2/transcript/tr_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "queued" })))
        .expect(5)
        .mount(&server)
        .await;

    let file = audio_file();
    let err = transcriber(&server)
        .transcribe(file.path())
        .await
        .unwrap_err();
    assert!(matches!(err, TranscriptionError::TimedOut));
}

#[tokio::test]
async fn test_upload_rejection_stops_early() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/upload"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/transcript"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let file = audio_file();
    let err = transcriber(&server)
        .transcribe(file.path())
        .await
        .unwrap_err();
    assert!(matches!(err, TranscriptionError::UploadFailed(401)));
}

#[tokio::test]
async fn test_transcript_request_rejection() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/upload"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "upload_url": "https://cdn/audio/1" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/transcript"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let file = audio_file();
    let err = transcriber(&server)
        .transcribe(file.path())
        .await
        .unwrap_err();
    assert!(matches!(err, TranscriptionError::RequestFailed(400)));
}

#[tokio::test]
async fn test_missing_file_is_an_io_error() {
    let server = MockServer::start().await;
    let err = transcriber(&server)
        .transcribe(std::path::Path::new("/definitely/not/here.wav"))
        .await
        .unwrap_err();
    assert!(matches!(err, TranscriptionError::Io(_)));
}
