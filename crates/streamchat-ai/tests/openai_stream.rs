//! Integration tests for the OpenAI streaming client using wiremock.

use futures::StreamExt;
use streamchat_ai::{AiError, CompletionRequest, LlmClient, Message, OpenAIClient, StreamChunk};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chat_request() -> CompletionRequest {
    CompletionRequest::new(vec![Message::user("Say hello")])
        .with_max_tokens(20)
        .with_temperature(0.8)
}

fn sse_body(deltas: &[&str]) -> String {
    let mut body = String::new();
    body.push_str(
        "data: {\"id\":\"chatcmpl-1\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"\"},\"finish_reason\":null}]}\n\n",
    );
    for delta in deltas {
        let payload = serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "delta": {"content": delta}, "finish_reason": null}]
        });
        body.push_str(&format!("data: {}\n\n", payload));
    }
    body.push_str(
        "data: {\"id\":\"chatcmpl-1\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
    );
    body.push_str("data: [DONE]\n\n");
    body
}

async fn collect_text(client: &OpenAIClient) -> Vec<Result<StreamChunk, AiError>> {
    let stream = client
        .complete_stream(chat_request())
        .await
        .expect("stream should open");
    stream.collect().await
}

#[tokio::test]
async fn stream_sends_expected_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-api-key"))
        .and(header(
            "user-agent",
            concat!("streamchat/", env!("CARGO_PKG_VERSION")),
        ))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-3.5-turbo",
            "max_tokens": 20,
            "temperature": 0.8,
            "stream": true,
            "messages": [{"role": "user", "content": "Say hello"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body(&["hi"]), "text/event-stream"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client =
        OpenAIClient::new("test-api-key").with_base_url(format!("{}/v1", mock_server.uri()));

    let chunks = collect_text(&client).await;
    assert!(chunks.iter().all(|c| c.is_ok()));
}

#[tokio::test]
async fn stream_yields_deltas_in_order() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["Hel", "lo", " world"]), "text/event-stream"),
        )
        .mount(&mock_server)
        .await;

    let client = OpenAIClient::new("key").with_base_url(format!("{}/v1", mock_server.uri()));

    let texts: Vec<String> = collect_text(&client)
        .await
        .into_iter()
        .map(|c| c.expect("chunk should be ok"))
        .filter(|c| !c.is_final())
        .map(|c| c.text)
        .collect();

    assert_eq!(texts, vec!["Hel", "lo", " world"]);
}

#[tokio::test]
async fn stream_open_fails_on_provider_error_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })))
        .mount(&mock_server)
        .await;

    let client = OpenAIClient::new("bad").with_base_url(format!("{}/v1", mock_server.uri()));

    match client.complete_stream(chat_request()).await {
        Err(AiError::LlmHttp {
            status, message, ..
        }) => {
            assert_eq!(status, 401);
            assert!(message.contains("Incorrect API key"));
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("stream should not open"),
    }
}

#[tokio::test]
async fn stream_open_fails_when_provider_unreachable() {
    // Reserve a free port, then release it so nothing is listening there.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let address = listener.local_addr().expect("local address");
    drop(listener);

    let client = OpenAIClient::new("key").with_base_url(format!("http://{}/v1", address));

    let result = client.complete_stream(chat_request()).await;
    assert!(matches!(result, Err(AiError::Http(_))));
}

#[tokio::test]
async fn stream_surfaces_mid_stream_error_payload() {
    let mock_server = MockServer::start().await;

    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n\n",
        "data: {\"error\":{\"message\":\"server overloaded\"}}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&mock_server)
        .await;

    let client = OpenAIClient::new("key").with_base_url(format!("{}/v1", mock_server.uri()));

    let chunks = collect_text(&client).await;
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].as_ref().map(|c| c.text.as_str()).ok(), Some("partial"));
    assert!(matches!(&chunks[1], Err(AiError::Llm(message)) if message == "server overloaded"));
}

#[tokio::test]
async fn stream_decodes_unterminated_trailing_event() {
    let mock_server = MockServer::start().await;

    let body = "data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}";
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&mock_server)
        .await;

    let client = OpenAIClient::new("key").with_base_url(format!("{}/v1", mock_server.uri()));

    let texts: Vec<String> = collect_text(&client)
        .await
        .into_iter()
        .filter_map(Result::ok)
        .map(|c| c.text)
        .collect();
    assert_eq!(texts, vec!["tail"]);
}
