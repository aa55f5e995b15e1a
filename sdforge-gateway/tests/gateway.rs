//! Integration tests against a mocked SD engine.

use sdforge_gateway::{SdGateway, Txt2ImgRequest};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sample_request() -> Txt2ImgRequest {
    Txt2ImgRequest {
        prompt: "a cat".into(),
        negative_prompt: String::new(),
        loras: vec![],
        steps: 20,
        width: 512,
        height: 512,
        sampler_name: "Euler a".into(),
        cfg_scale: 7.0,
        seed: -1,
    }
}

#[tokio::test]
async fn txt2img_decodes_base64_images() {
    let server = MockServer::start().await;
    let image_b64 = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, b"fake-png-bytes");

    Mock::given(method("POST"))
        .and(path("/sdapi/v1/txt2img"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "images": [image_b64],
            "info": "{\"seed\": 42}",
        })))
        .mount(&server)
        .await;

    let gateway = SdGateway::new(server.uri());
    let response = gateway.txt2img(&sample_request()).await.unwrap();

    assert_eq!(response.images.len(), 1);
    assert_eq!(response.images[0], b"fake-png-bytes");
}

#[tokio::test]
async fn txt2img_maps_5xx_to_upstream_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sdapi/v1/txt2img"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let gateway = SdGateway::new(server.uri());
    let err = gateway.txt2img(&sample_request()).await.unwrap_err();

    assert!(matches!(err, sdforge_types::SdForgeError::Upstream { .. }));
}

#[tokio::test]
async fn poll_progress_parses_fields() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sdapi/v1/progress"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "progress": 0.42,
            "eta_relative": 12.5,
            "current_image": null,
        })))
        .mount(&server)
        .await;

    let gateway = SdGateway::new(server.uri());
    let snapshot = gateway.poll_progress().await.unwrap();

    assert!((snapshot.progress - 0.42).abs() < f64::EPSILON);
    assert_eq!(snapshot.eta_seconds, Some(12.5));
    assert!(snapshot.current_image.is_none());
}

#[tokio::test]
async fn interrupt_succeeds_on_2xx() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sdapi/v1/interrupt"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let gateway = SdGateway::new(server.uri());
    gateway.interrupt().await.unwrap();
}
