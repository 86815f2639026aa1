use super::*;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path, query_param},
};

fn azure_config(endpoint: &str) -> AzureConfig {
    AzureConfig {
        endpoint: endpoint.to_string(),
        api_key: Some("test-key".to_string()),
        ..AzureConfig::default()
    }
}

fn fast_transport(endpoint: &str) -> AzureTransport {
    AzureTransport::new(&azure_config(endpoint))
        .expect("transport should build")
        .with_retry_delay(Duration::from_millis(1))
}

#[test]
fn requires_credentials() {
    let mut config = azure_config("https://movies.openai.azure.com");
    config.api_key = None;
    assert!(AzureTransport::new(&config).is_err());

    let unset = AzureConfig::default();
    assert!(AzureTransport::new(&unset).is_err());
}

#[test]
fn deployment_url_includes_api_version() {
    let transport = fast_transport("https://movies.openai.azure.com");
    let url = transport
        .deployment_url("gpt-4o-mini", "chat/completions", "2024-09-01-preview")
        .expect("url should build");

    assert_eq!(
        url.as_str(),
        "https://movies.openai.azure.com/openai/deployments/gpt-4o-mini/chat/completions?api-version=2024-09-01-preview"
    );
}

#[test]
fn builder_methods() {
    let transport = fast_transport("https://movies.openai.azure.com")
        .with_timeout(Duration::from_secs(5))
        .with_retry_attempts(0);

    // at least one attempt is always made
    assert_eq!(transport.retry_attempts(), 1);
    assert_eq!(
        transport.base_url().as_str(),
        "https://movies.openai.azure.com/"
    );
}

#[test]
fn service_error_message_is_preferred() {
    let body = r#"{"error":{"code":"401","message":"Access denied due to invalid subscription key."}}"#;
    assert_eq!(
        describe_http_error(401, body),
        "HTTP 401 [code=401]: Access denied due to invalid subscription key."
    );
    assert_eq!(describe_http_error(404, ""), "HTTP 404");
    assert_eq!(describe_http_error(400, "bad things"), "HTTP 400: bad things");
}

#[tokio::test]
async fn post_sends_api_key_and_returns_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/deployments/embed/embeddings"))
        .and(query_param("api-version", "v1"))
        .and(header("api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
        .expect(1)
        .mount(&server)
        .await;

    let transport = fast_transport(&server.uri());
    let url = transport
        .deployment_url("embed", "embeddings", "v1")
        .expect("url should build");

    let body = transport.post_json(&url, "{}").expect("request should succeed");
    assert_eq!(body, "{\"ok\":true}");
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
        .mount(&server)
        .await;

    let transport = fast_transport(&server.uri());
    let url = transport
        .deployment_url("chat", "chat/completions", "v1")
        .expect("url should build");

    let body = transport.post_json(&url, "{}").expect("should recover after retries");
    assert_eq!(body, "recovered");
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_string(r#"{"error":{"message":"Access denied"}}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transport = fast_transport(&server.uri());
    let url = transport
        .deployment_url("chat", "chat/completions", "v1")
        .expect("url should build");

    let err = transport.post_json(&url, "{}").expect_err("should fail");
    assert_eq!(err.to_string(), "HTTP 401: Access denied");
}

#[tokio::test]
async fn gives_up_after_configured_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let transport = fast_transport(&server.uri()).with_retry_attempts(2);
    let url = transport
        .deployment_url("chat", "chat/completions", "v1")
        .expect("url should build");

    let err = transport.post_json(&url, "{}").expect_err("should fail");
    assert!(err.to_string().contains("HTTP 500"));
}

#[test]
fn backoff_doubles_and_saturates() {
    let base = Duration::from_millis(100);
    assert_eq!(backoff_delay(base, 1), base);
    assert_eq!(backoff_delay(base, 2), Duration::from_millis(200));
    assert_eq!(backoff_delay(base, 4), Duration::from_millis(800));

    // Large attempt counts must not overflow
    assert_eq!(backoff_delay(base, 40), base.saturating_mul(u32::MAX));
    assert_eq!(backoff_delay(Duration::MAX, 3), Duration::MAX);
}
