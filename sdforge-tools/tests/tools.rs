//! End-to-end tests dispatching through `ToolSurface::into_registry()`
//! the way an LLM host would: by tool name and a JSON input blob.

use std::sync::Arc;

use sdforge_content::ContentClassifier;
use sdforge_gateway::SdGateway;
use sdforge_lora::LoraCatalog;
use sdforge_queue::QueueEngine;
use sdforge_store::ConversationStore;
use sdforge_tools::ToolSurface;
use sdforge_upload::{CredentialStore, LocalFileSink, UploadRouter};
use sqlx::sqlite::SqlitePoolOptions;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn build_surface(gateway_uri: &str, local_dir: &std::path::Path) -> Arc<ToolSurface> {
    let gateway = Arc::new(SdGateway::new(gateway_uri));

    let lora_pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("../sdforge-lora/migrations").run(&lora_pool).await.unwrap();
    let catalog = LoraCatalog::from_pool(lora_pool);
    catalog.sync_from_gateway(&gateway).await.unwrap();

    let classifier = Arc::new(ContentClassifier::new());
    let queue = Arc::new(QueueEngine::with_noop_pipeline(Arc::clone(&gateway)));
    let store = ConversationStore::open("sqlite::memory:", Default::default()).await.unwrap();

    let credentials = {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("../sdforge-upload/migrations").run(&pool).await.unwrap();
        CredentialStore::from_pool(pool)
    };
    let local = LocalFileSink::new(local_dir.to_str().unwrap(), "http://files.example");
    let upload = Arc::new(UploadRouter::new(credentials, None, None, local));

    Arc::new(ToolSurface::new(gateway, Arc::new(catalog), classifier, queue, Arc::new(store), upload))
}

async fn mock_gateway() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sdapi/v1/sd-models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "title": "anime-base-v2", "model_name": "anime-base-v2", "hash": "abc123" },
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sdapi/v1/samplers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "name": "Euler a" },
            { "name": "DPM++ 2M" },
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sdapi/v1/loras"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "name": "anime_style_lora",
                "alias": "anime_style",
                "path": "/models/lora/anime_style_lora.safetensors",
                "metadata": { "tag_frequency": { "anime": 10, "girl": 5 } },
            },
        ])))
        .mount(&server)
        .await;

    let image_b64 = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, b"fake-png-bytes");
    Mock::given(method("POST"))
        .and(path("/sdapi/v1/txt2img"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "images": [image_b64],
            "info": "{\"seed\": 7}",
        })))
        .mount(&server)
        .await;

    server
}

#[tokio::test]
async fn model_sampler_and_lora_tools_report_from_the_gateway() {
    let server = mock_gateway().await;
    let dir = tempfile::tempdir().unwrap();
    let registry = build_surface(&server.uri(), dir.path()).await.into_registry();

    let models = registry.call("get_sd_models_summary", serde_json::json!({})).await;
    assert_eq!(models["success"], true);
    assert_eq!(models["count"], 1);

    let search = registry.call("search_sd_models", serde_json::json!({ "query": "anime" })).await;
    assert_eq!(search["matches"].as_array().unwrap().len(), 1);

    let samplers = registry.call("get_samplers_list", serde_json::json!({})).await;
    assert_eq!(samplers["samplers"].as_array().unwrap().len(), 2);

    let summary = registry.call("get_lora_summary", serde_json::json!({})).await;
    assert_eq!(summary["total"], 1);

    let browse = registry.call("browse_loras_by_category", serde_json::json!({ "category": "anime" })).await;
    assert_eq!(browse["loras"].as_array().unwrap().len(), 1);

    let bad_category = registry.call("browse_loras_by_category", serde_json::json!({ "category": "not-a-category" })).await;
    assert_eq!(bad_category["success"], false);
}

#[tokio::test]
async fn suggest_and_validate_loras_round_trip() {
    let server = mock_gateway().await;
    let dir = tempfile::tempdir().unwrap();
    let registry = build_surface(&server.uri(), dir.path()).await.into_registry();

    let suggestions = registry
        .call("suggest_loras_for_prompt", serde_json::json!({ "prompt": "anime girl portrait" }))
        .await;
    let suggestions = suggestions["suggestions"].as_array().unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0]["name"], "anime_style_lora");

    let validation = registry
        .call(
            "validate_lora_combination",
            serde_json::json!({ "selected": [{ "name": "anime_style_lora", "category": "anime", "weight": 1.0 }] }),
        )
        .await;
    assert_eq!(validation["valid"], true);
}

#[tokio::test]
async fn generation_tools_drive_the_queue_end_to_end() {
    let server = mock_gateway().await;
    let dir = tempfile::tempdir().unwrap();
    let registry = build_surface(&server.uri(), dir.path()).await.into_registry();

    let direct = registry.call("generate_image", serde_json::json!({ "prompt": "a cat" })).await;
    assert_eq!(direct["success"], true);
    assert_eq!(direct["image_count"], 1);

    let enqueued = registry.call("enqueue_image_generation", serde_json::json!({ "prompt": "a dog" })).await;
    let job_id = enqueued["job_id"].as_str().unwrap().to_string();

    let mut state = String::new();
    for _ in 0..50 {
        let progress = registry.call("get_generation_progress", serde_json::json!({ "job_id": job_id })).await;
        state = progress["state"].as_str().unwrap().to_string();
        if state == "completed" || state == "failed" {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(state, "completed");

    let status = registry.call("get_queue_status", serde_json::json!({})).await;
    assert!(status["success"].as_bool().unwrap());

    let history = registry.call("get_job_history", serde_json::json!({})).await;
    assert!(!history["jobs"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn cancelling_an_unknown_job_fails_cleanly() {
    let server = mock_gateway().await;
    let dir = tempfile::tempdir().unwrap();
    let registry = build_surface(&server.uri(), dir.path()).await.into_registry();

    let result = registry.call("cancel_generation_job", serde_json::json!({ "job_id": "does-not-exist" })).await;
    assert_eq!(result["success"], false);
}

#[tokio::test]
async fn content_tools_analyze_and_list_categories() {
    let server = mock_gateway().await;
    let dir = tempfile::tempdir().unwrap();
    let registry = build_surface(&server.uri(), dir.path()).await.into_registry();

    let analysis = registry
        .call("analyze_prompt_content", serde_json::json!({ "prompt": "a quiet forest at dawn", "negative_prompt": "" }))
        .await;
    assert_eq!(analysis["success"], true);

    let enhanced = registry
        .call("enhanced_prompt_generation", serde_json::json!({ "prompt": "a quiet forest" }))
        .await;
    assert!(enhanced["enhanced_prompt"].as_str().unwrap().contains("a quiet forest"));

    let categories = registry.call("get_content_categories", serde_json::json!({})).await;
    assert!(!categories["categories"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn orchestrate_recipe_reports_every_step_and_a_job_id() {
    let server = mock_gateway().await;
    let dir = tempfile::tempdir().unwrap();
    let registry = build_surface(&server.uri(), dir.path()).await.into_registry();

    let result = registry
        .call("orchestrate_image_generation", serde_json::json!({ "prompt": "anime girl in a garden" }))
        .await;

    assert_eq!(result["success"], true);
    assert!(result["job_id"].as_str().unwrap().len() > 0);
    let steps: Vec<String> =
        result["steps_completed"].as_array().unwrap().iter().map(|s| s.as_str().unwrap().to_string()).collect();
    assert_eq!(steps, vec!["content_analysis", "lora_suggestion", "weight_optimization", "conflict_check", "enqueue"]);
}

#[tokio::test]
async fn upload_test_and_personalities_list_round_trip() {
    let server = mock_gateway().await;
    let dir = tempfile::tempdir().unwrap();
    let registry = build_surface(&server.uri(), dir.path()).await.into_registry();

    let upload = registry.call("upload_test", serde_json::json!({})).await;
    assert_eq!(upload["sink"], "local");
    assert!(upload["url"].as_str().unwrap().starts_with("http://files.example/images/"));

    let personalities = registry.call("list_personalities", serde_json::json!({})).await;
    assert!(!personalities["personalities"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_tool_name_reports_failure_instead_of_panicking() {
    let server = mock_gateway().await;
    let dir = tempfile::tempdir().unwrap();
    let registry = build_surface(&server.uri(), dir.path()).await.into_registry();

    let result = registry.call("not_a_real_tool", serde_json::json!({})).await;
    assert_eq!(result["success"], false);
}
