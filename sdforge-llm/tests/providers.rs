use sdforge_llm::{AnthropicProvider, ChatMessage, ChatRole, OllamaProvider};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn anthropic_chat_extracts_text_block() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [{"type": "text", "text": "hello back"}],
        })))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("sk-test").base_url(server.uri());
    let response = provider.chat(&[ChatMessage::new(ChatRole::User, "hi")]).await;

    assert!(response.success);
    assert_eq!(response.content, "hello back");
    assert_eq!(response.provider, "anthropic");
}

#[tokio::test]
async fn anthropic_chat_reports_failure_without_throwing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("sk-bad").base_url(server.uri());
    let response = provider.chat(&[ChatMessage::new(ChatRole::User, "hi")]).await;

    assert!(!response.success);
    assert!(response.error.is_some());
}

#[tokio::test]
async fn ollama_chat_extracts_message_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": {"role": "assistant", "content": "local reply"},
        })))
        .mount(&server)
        .await;

    let provider = OllamaProvider::new().base_url(server.uri());
    let response = provider.chat(&[ChatMessage::new(ChatRole::User, "hi")]).await;

    assert!(response.success);
    assert_eq!(response.content, "local reply");
}

#[tokio::test]
async fn unavailable_provider_reports_structured_failure() {
    let provider = sdforge_llm::provider_for("unknown-provider", None, None, None, None);
    let response = provider.chat(&[ChatMessage::new(ChatRole::User, "hi")]).await;
    assert!(!response.success);
    assert!(response.error.unwrap().contains("unknown-provider"));
}

#[tokio::test]
async fn anthropic_provider_unavailable_without_api_key() {
    let provider = sdforge_llm::provider_for("anthropic", None, None, None, None);
    assert_eq!(provider.name(), "anthropic");
    let response = provider.chat(&[]).await;
    assert!(!response.success);
}
