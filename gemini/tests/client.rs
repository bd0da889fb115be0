use gear_vault_gemini::GeminiClient;
use gear_vault_store::RecordStore;
use gear_vault_store::config::GeminiConfig;
use gear_vault_store::enrich::DescriptionWriter;
use gear_vault_store::enrich::Enricher;
use gear_vault_store::enrich::LookupError;
use gear_vault_store::enrich::MetadataLookup;
use gear_vault_store::storage::memory::MemorySlotStorage;
use gear_vault_store::types::Category;
use gear_vault_store::types::EquipmentRecord;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::body_partial_json;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;

const SEARCH_PATH: &str = "/v1beta/models/gemini-3-pro-preview:generateContent";
const TEXT_PATH: &str = "/v1beta/models/gemini-3-flash-preview:generateContent";

fn client(server: &MockServer) -> GeminiClient {
    let config = GeminiConfig {
        base_url: server.uri(),
        ..GeminiConfig::default()
    };
    GeminiClient::new(&config, "test-key").unwrap()
}

fn answer(parts: &[&str]) -> ResponseTemplate {
    let parts: Vec<_> = parts.iter().map(|t| json!({ "text": t })).collect();
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{ "content": { "role": "model", "parts": parts } }]
    }))
}

#[tokio::test]
async fn lookup_uses_search_model_with_grounding() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "tools": [{ "googleSearch": {} }],
            "generationConfig": { "temperature": 0.1 }
        })))
        .respond_with(answer(&[
            "IMAGE: https://img.example/u87.jpg\n",
            "STORE: https://shop.example/u87",
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let text = client(&server).lookup("Neumann U87ai").await.unwrap();
    assert_eq!(
        text,
        "IMAGE: https://img.example/u87.jpg\nSTORE: https://shop.example/u87"
    );
}

#[tokio::test]
async fn polish_uses_text_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(answer(&["A studio classic."]))
        .expect(1)
        .mount(&server)
        .await;

    let text = client(&server)
        .polish("Neumann U87ai", "warm, pricey")
        .await
        .unwrap();
    assert_eq!(text, "A studio classic.");
}

#[tokio::test]
async fn error_status_carries_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exhausted"))
        .mount(&server)
        .await;

    let err = client(&server).lookup("Shure SM7B").await.unwrap_err();
    match err {
        LookupError::Status { status, body } => {
            assert_eq!(status, 429);
            assert_eq!(body, "quota exhausted");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn response_without_text_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let err = client(&server).lookup("Shure SM7B").await.unwrap_err();
    assert!(matches!(err, LookupError::EmptyResponse));
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let config = GeminiConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        ..GeminiConfig::default()
    };
    let client = GeminiClient::new(&config, "test-key").unwrap();
    let err = client.lookup("Shure SM7B").await.unwrap_err();
    assert!(matches!(err, LookupError::Network(_)));
}

#[tokio::test]
async fn enrichment_batch_against_mock_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(answer(&["**IMAGE:** (https://img.example/sm7b.jpg)"]))
        .expect(2)
        .mount(&server)
        .await;

    let records: Vec<EquipmentRecord> = ["a", "b"]
        .into_iter()
        .map(|id| EquipmentRecord {
            id: id.to_string(),
            brand: "Shure".to_string(),
            model: "SM7B".to_string(),
            category: Category::Microphone,
            rating: 5,
            description: String::new(),
            image_reference: None,
            purchase_url: Some("https://shop.example/sm7b".to_string()),
            date: "2025/01/01".to_string(),
        })
        .collect();
    let store = RecordStore::new(Box::new(MemorySlotStorage::new()));
    store.save(&records).unwrap();
    let store = Arc::new(store);

    let report = Enricher::new(store.clone(), client(&server))
        .with_delay(Duration::ZERO)
        .run_batch(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.updated, 2);
    for record in store.list().unwrap() {
        assert_eq!(
            record.image_reference.as_deref(),
            Some("https://img.example/sm7b.jpg")
        );
    }
}
