//! Integration tests for the priority queue and worker against a mocked
//! SD engine (§8 queue-priority and at-most-one-running scenarios).

use std::sync::Arc;
use std::time::Duration;

use sdforge_gateway::{SdGateway, Txt2ImgRequest};
use sdforge_queue::{GenerationRequest, QueueEngine};
use sdforge_types::{JobState, Priority};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(prompt: &str) -> GenerationRequest {
    GenerationRequest {
        txt2img: Txt2ImgRequest {
            prompt: prompt.into(),
            negative_prompt: String::new(),
            loras: vec![],
            steps: 20,
            width: 512,
            height: 512,
            sampler_name: "Euler a".into(),
            cfg_scale: 7.0,
            seed: -1,
        },
        output_path: None,
        user_id: None,
    }
}

async fn mock_sd_server() -> MockServer {
    let server = MockServer::start().await;
    let image_b64 = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, b"png-bytes");

    Mock::given(method("POST"))
        .and(path("/sdapi/v1/txt2img"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "images": [image_b64],
            "info": "{}",
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sdapi/v1/progress"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "progress": 1.0,
            "eta_relative": 0.0,
            "current_image": null,
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/sdapi/v1/interrupt"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

async fn wait_for_terminal(engine: &QueueEngine, job_id: &sdforge_types::JobId) -> sdforge_queue::JobSnapshot {
    for _ in 0..50 {
        let snapshot = engine.get(job_id).await.unwrap();
        if snapshot.state.is_terminal() {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job never reached a terminal state");
}

#[tokio::test]
async fn enqueued_job_completes_via_noop_pipeline() {
    let server = mock_sd_server().await;
    let gateway = Arc::new(SdGateway::new(server.uri()));
    let engine = QueueEngine::with_noop_pipeline(gateway);

    let job_id = engine.enqueue(request("a cat"), Priority::default()).await;
    let snapshot = wait_for_terminal(&engine, &job_id).await;

    assert_eq!(snapshot.state, JobState::Completed);
    assert!(snapshot.result.is_some());
}

#[tokio::test]
async fn queued_cancellation_is_immediate_and_terminal() {
    let server = mock_sd_server().await;
    let gateway = Arc::new(SdGateway::new(server.uri()));
    let engine = QueueEngine::with_noop_pipeline(gateway);

    // Occupy the worker with a slow first job so the second stays queued.
    let first = engine.enqueue(request("first"), Priority(5)).await;
    let second = engine.enqueue(request("second"), Priority(5)).await;

    engine.cancel(&second).await.unwrap();
    let snapshot = engine.get(&second).await.unwrap();
    assert_eq!(snapshot.state, JobState::Cancelled);
    assert!(snapshot.result.is_none());

    wait_for_terminal(&engine, &first).await;
}

#[tokio::test]
async fn higher_priority_job_runs_before_earlier_lower_priority_job() {
    let server = mock_sd_server().await;
    let gateway = Arc::new(SdGateway::new(server.uri()));
    let engine = QueueEngine::with_noop_pipeline(gateway);

    let low = engine.enqueue(request("low"), Priority(5)).await;
    let high = engine.enqueue(request("high"), Priority(1)).await;

    wait_for_terminal(&engine, &low).await;
    wait_for_terminal(&engine, &high).await;

    let history = engine.history(10).await;
    // Most-recently-completed first: low finished after high.
    let high_pos = history.iter().position(|j| j.id == high).unwrap();
    let low_pos = history.iter().position(|j| j.id == low).unwrap();
    assert!(high_pos > low_pos, "high priority job should have completed first");
}

#[tokio::test]
async fn equal_priority_jobs_run_fifo() {
    let server = mock_sd_server().await;
    let gateway = Arc::new(SdGateway::new(server.uri()));
    let engine = QueueEngine::with_noop_pipeline(gateway);

    let j1 = engine.enqueue(request("one"), Priority(5)).await;
    let j2 = engine.enqueue(request("two"), Priority(5)).await;

    wait_for_terminal(&engine, &j1).await;
    wait_for_terminal(&engine, &j2).await;

    let history = engine.history(10).await;
    let j1_pos = history.iter().position(|j| j.id == j1).unwrap();
    let j2_pos = history.iter().position(|j| j.id == j2).unwrap();
    assert!(j2_pos < j1_pos, "j1 enqueued first should complete (and appear in history) before j2");
}
