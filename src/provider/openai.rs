//! OpenAI-compatible Chat Completions client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::VoxError;
use crate::types::{Message, ToolCallRequest};
use crate::util::retry::RetryPolicy;

use super::http::{bearer_headers, build_client, request_error, status_to_error};
use super::{CompletionClient, CompletionRequest, CompletionResponse, FinishReason, Usage};

pub struct OpenAiChatClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl OpenAiChatClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, VoxError> {
        Ok(Self {
            client: build_client(timeout)?,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            retry: RetryPolicy::default(),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, VoxError> {
        Ok(Self::new(
            config.api_key.clone(),
            config.base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?
        .with_retry_policy(RetryPolicy::from_config(config)))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let messages = request
            .messages
            .iter()
            .map(message_to_openai)
            .collect::<Vec<_>>();

        let mut body = serde_json::Map::new();
        body.insert("model".into(), request.model.clone().into());
        body.insert("messages".into(), messages.into());

        if let Some(temp) = request.temperature {
            body.insert("temperature".into(), temp.into());
        }
        if let Some(max) = request.max_tokens {
            body.insert("max_tokens".into(), max.into());
        }
        if !request.tools.is_empty() {
            let tool_defs: Vec<serde_json::Value> =
                request.tools.iter().map(|t| t.to_openai_value()).collect();
            body.insert("tools".into(), tool_defs.into());
            body.insert("tool_choice".into(), "auto".into());
        }

        serde_json::Value::Object(body)
    }

    async fn send_once(&self, body: &serde_json::Value) -> Result<CompletionResponse, VoxError> {
        let url = format!("{}/chat/completions", self.base_url);

        let resp = self
            .client
            .post(&url)
            .headers(bearer_headers(&self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let data: OpenAiChatResponse = resp.json().await.map_err(|e| request_error(e, self.timeout))?;
        parse_chat_response(data)
    }
}

#[async_trait]
impl CompletionClient for OpenAiChatClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, VoxError> {
        let body = self.build_request_body(request);
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "chat completion"
        );
        self.retry
            .execute("chat completion", || self.send_once(&body))
            .await
    }
}

fn parse_chat_response(data: OpenAiChatResponse) -> Result<CompletionResponse, VoxError> {
    let choice = data
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| VoxError::CompletionCall("no choices in completion response".into()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCallRequest::new(tc.id, tc.function.name, tc.function.arguments))
        .collect();

    Ok(CompletionResponse {
        content: choice.message.content,
        tool_calls,
        finish_reason: choice
            .finish_reason
            .as_deref()
            .and_then(|reason| reason.parse::<FinishReason>().ok()),
        usage: data.usage.map(|u| Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
    })
}

fn message_to_openai(msg: &Message) -> serde_json::Value {
    match msg {
        Message::Assistant {
            content,
            tool_calls,
        } if !tool_calls.is_empty() => {
            let tc_json: Vec<serde_json::Value> = tool_calls
                .iter()
                .map(|tc| {
                    serde_json::json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {
                            "name": tc.name,
                            "arguments": tc.arguments,
                        }
                    })
                })
                .collect();
            serde_json::json!({
                "role": "assistant",
                "content": content,
                "tool_calls": tc_json,
            })
        }
        Message::Tool {
            tool_call_id,
            content,
        } => serde_json::json!({
            "role": "tool",
            "tool_call_id": tool_call_id,
            "content": content,
        }),
        other => serde_json::json!({
            "role": other.role().to_string(),
            "content": other.content().unwrap_or_default(),
        }),
    }
}

// Chat Completions response types (internal)

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Deserialize)]
struct OpenAiToolCall {
    id: String,
    function: OpenAiFunction,
}

#[derive(Deserialize)]
struct OpenAiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolDefinition;
    use serde_json::json;

    fn client() -> OpenAiChatClient {
        OpenAiChatClient::new("sk-test", "http://localhost:1/v1/", Duration::from_secs(5))
            .expect("client should build")
    }

    #[test]
    fn request_body_includes_tools_only_when_present() {
        let request = CompletionRequest::builder()
            .model("gpt-4o-mini")
            .messages(vec![Message::system("be brief"), Message::user("hi")])
            .temperature(0.7)
            .build();
        let body = client().build_request_body(&request);
        assert_eq!(body["messages"][0], json!({"role": "system", "content": "be brief"}));
        assert!(body.get("tools").is_none());

        let request = CompletionRequest::builder()
            .model("gpt-4o-mini")
            .messages(vec![Message::user("lights")])
            .tools(vec![ToolDefinition {
                name: "lights_on".into(),
                description: "Turn on lights".into(),
                parameters: json!({"type": "object", "properties": {}}),
            }])
            .build();
        let body = client().build_request_body(&request);
        assert_eq!(body["tools"][0]["function"]["name"], "lights_on");
        assert_eq!(body["tool_choice"], "auto");
    }

    #[test]
    fn assistant_tool_calls_use_function_shape() {
        let message = Message::assistant_tool_calls(
            None,
            vec![ToolCallRequest::new("c1", "lights_on", r#"{"room":"kitchen"}"#)],
        );
        let value = message_to_openai(&message);
        assert_eq!(value["content"], serde_json::Value::Null);
        assert_eq!(value["tool_calls"][0]["type"], "function");
        assert_eq!(value["tool_calls"][0]["function"]["arguments"], r#"{"room":"kitchen"}"#);

        let tool = message_to_openai(&Message::tool("c1", "done"));
        assert_eq!(tool, json!({"role": "tool", "tool_call_id": "c1", "content": "done"}));
    }

    #[test]
    fn parse_response_keeps_raw_arguments() {
        let data: OpenAiChatResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "lights_on", "arguments": "{not json" }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 3, "total_tokens": 13 }
        }))
        .expect("fixture should deserialize");

        let response = parse_chat_response(data).expect("response should parse");
        assert_eq!(response.tool_calls[0].arguments, "{not json");
        assert_eq!(response.finish_reason, Some(FinishReason::ToolCalls));
        assert_eq!(response.usage.map(|u| u.total_tokens), Some(13));
    }

    #[test]
    fn empty_choices_is_a_completion_error() {
        let data: OpenAiChatResponse =
            serde_json::from_value(json!({"choices": []})).expect("fixture should deserialize");
        assert!(matches!(parse_chat_response(data), Err(VoxError::CompletionCall(_))));
    }
}
