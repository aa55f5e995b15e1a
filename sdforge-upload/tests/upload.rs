use sdforge_upload::{CredentialStore, ExternalHostClient, GuestCredential, LocalFileSink, UploadRequest, UploadRouter};
use sqlx::sqlite::SqlitePoolOptions;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn credential_store() -> CredentialStore {
    let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    CredentialStore::from_pool(pool)
}

#[tokio::test]
async fn end_to_end_personal_upload_carries_metadata_and_records_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "url": "https://host.example/i/1.png",
            "deletion_handle": "del-1",
        })))
        .mount(&server)
        .await;

    let credentials = credential_store().await;
    credentials.set("alice", "alice-key", Some("alice-album")).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let router = UploadRouter::new(
        credentials,
        Some(ExternalHostClient::new(server.uri())),
        Some(GuestCredential { api_key: "guest-key".into(), album: None }),
        LocalFileSink::new(dir.path().to_str().unwrap(), "http://files.example"),
    );

    let request = UploadRequest::new(vec![9, 9, 9], "png")
        .for_user("alice");
    let outcome = router.upload(request).await;

    assert_eq!(outcome.sink, "personal");
    assert_eq!(outcome.url, "https://host.example/i/1.png");
    assert_eq!(outcome.deletion_handle.as_deref(), Some("del-1"));
}

#[tokio::test]
async fn every_external_sink_down_still_produces_a_locally_hosted_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let router = UploadRouter::new(
        credential_store().await,
        Some(ExternalHostClient::new(server.uri())),
        Some(GuestCredential { api_key: "guest-key".into(), album: None }),
        LocalFileSink::new(dir.path().to_str().unwrap(), "http://files.example"),
    );

    let outcome = router.upload(UploadRequest::new(vec![1, 2], "png")).await;

    assert_eq!(outcome.sink, "local");
    assert!(outcome.url.starts_with("http://files.example/images/"));
    assert_eq!(outcome.fallbacks.len(), 1);
    assert_eq!(outcome.fallbacks[0].sink, "guest");
}
