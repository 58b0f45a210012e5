//! Adapter tests against a mock HTTP server

use std::sync::Arc;

use aicleaner_providers::{
    CleaningRequest, ImagePayload, Provider, ProviderClient, ProviderConfig, ProviderError,
    ProviderKind, ProviderSelector, SelectorConfig, SelectorError,
};
use mockito::Matcher;
use reqwest::Client;

fn request() -> CleaningRequest {
    CleaningRequest::new(
        ImagePayload::new(vec![0xFF, 0xD8, 0xFF, 0xE0], "image/jpeg"),
        "What needs cleaning?",
    )
    .with_zone("Kitchen")
}

fn client_for(config: &ProviderConfig) -> ProviderClient {
    ProviderClient::from_config(config, Arc::new(Client::new())).unwrap()
}

#[tokio::test]
async fn test_ollama_chat_with_mock() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJsonString(
            r#"{"model": "llava:13b", "stream": false}"#.to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
            "model": "llava:13b",
            "message": {
                "role": "assistant",
                "content": "{\"description\": \"Dishes in the sink\", \"tasks\": [\"Wash dishes\"]}"
            },
            "done": true
        }"#,
        )
        .create_async()
        .await;

    let config = ProviderConfig::new("local", ProviderKind::Ollama, 1).with_base_url(server.url());
    let result = client_for(&config).analyze(&request()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(result.description, "Dishes in the sink");
    assert_eq!(result.tasks, vec!["Wash dishes".to_string()]);
    assert_eq!(result.provider_id, "local");
    assert_eq!(result.model, "llava:13b");
}

#[tokio::test]
async fn test_openai_chat_with_mock() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
            "choices": [
                {"message": {"role": "assistant", "content": "Floor is cluttered.\n- Pick up toys\n- Vacuum rug"}}
            ]
        }"#,
        )
        .create_async()
        .await;

    let config = ProviderConfig::new("gpt", ProviderKind::OpenAi, 1)
        .with_api_key("sk-test")
        .with_base_url(server.url());
    let result = client_for(&config).analyze(&request()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(result.description, "Floor is cluttered.");
    assert_eq!(
        result.tasks,
        vec!["Pick up toys".to_string(), "Vacuum rug".to_string()]
    );
}

#[tokio::test]
async fn test_anthropic_chat_with_mock() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/messages")
        .match_header("x-api-key", "ak-test")
        .match_header("anthropic-version", "2023-06-01")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"content": [{"type": "text", "text": "{\"description\": \"Tidy\", \"tasks\": []}"}]}"#,
        )
        .create_async()
        .await;

    let config = ProviderConfig::new("claude", ProviderKind::Anthropic, 1)
        .with_api_key("ak-test")
        .with_base_url(server.url());
    let result = client_for(&config).analyze(&request()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(result.description, "Tidy");
    assert!(result.tasks.is_empty());
}

#[tokio::test]
async fn test_gemini_chat_with_mock() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/models/gemini-1.5-flash:generateContent")
        .match_query(Matcher::UrlEncoded("key".into(), "g-test".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"candidates": [{"content": {"parts": [{"text": "- Wipe the counter"}]}}]}"#,
        )
        .create_async()
        .await;

    let config = ProviderConfig::new("gemini", ProviderKind::Gemini, 1)
        .with_api_key("g-test")
        .with_base_url(server.url());
    let result = client_for(&config).analyze(&request()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(result.tasks, vec!["Wipe the counter".to_string()]);
}

#[tokio::test]
async fn test_unauthorized_maps_to_auth_error() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(401)
        .with_body(r#"{"error": {"message": "Incorrect API key provided"}}"#)
        .create_async()
        .await;

    let config = ProviderConfig::new("gpt", ProviderKind::OpenAi, 1)
        .with_api_key("sk-wrong")
        .with_base_url(server.url());
    let result = client_for(&config).analyze(&request()).await;

    assert_eq!(result, Err(ProviderError::AuthError));
}

#[tokio::test]
async fn test_server_error_and_malformed_body() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/api/chat")
        .with_status(503)
        .with_body("model loading")
        .create_async()
        .await;

    let config = ProviderConfig::new("local", ProviderKind::Ollama, 1).with_base_url(server.url());
    let result = client_for(&config).analyze(&request()).await;
    assert!(matches!(
        result,
        Err(ProviderError::ServerError { status: 503, .. })
    ));

    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let config = ProviderConfig::new("local", ProviderKind::Ollama, 1).with_base_url(server.url());
    let result = client_for(&config).analyze(&request()).await;
    assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_health_check_with_mock() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_body(r#"{"models": []}"#)
        .create_async()
        .await;

    let config = ProviderConfig::new("local", ProviderKind::Ollama, 1).with_base_url(server.url());
    assert_eq!(client_for(&config).health_check().await, Ok(true));
}

#[tokio::test]
async fn test_selector_falls_back_across_real_adapters() {
    let mut ollama = mockito::Server::new_async().await;
    let _down = ollama
        .mock("POST", "/api/chat")
        .with_status(500)
        .with_body("out of memory")
        .create_async()
        .await;

    let mut openai = mockito::Server::new_async().await;
    let _up = openai
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices": [{"message": {"content": "{\"description\": \"ok\", \"tasks\": [\"Sweep\"]}"}}]}"#)
        .create_async()
        .await;

    let configs = vec![
        ProviderConfig::new("local", ProviderKind::Ollama, 1).with_base_url(ollama.url()),
        ProviderConfig::new("gpt", ProviderKind::OpenAi, 2)
            .with_api_key("sk-test")
            .with_base_url(openai.url()),
        // Missing key, left out of the selector
        ProviderConfig::new("claude", ProviderKind::Anthropic, 3),
    ];
    let selector = ProviderSelector::from_configs(&configs, SelectorConfig::default()).unwrap();

    assert_eq!(selector.providers().len(), 2);
    let result = selector.select_and_invoke(&request()).await.unwrap();
    assert_eq!(result.provider_id, "gpt");
    assert_eq!(result.tasks, vec!["Sweep".to_string()]);
    assert_eq!(
        selector.provider_health("local").unwrap().consecutive_failures,
        1
    );
    assert!(matches!(
        selector.provider_health("claude"),
        Err(SelectorError::ProviderNotFound(_))
    ));
}
