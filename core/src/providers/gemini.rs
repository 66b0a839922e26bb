use crate::error::ProviderError;
use crate::traits::{ChatMessage, ChatRequest, ChatResponse, Provider, ToolCall, ToolSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTools<'a>>>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<GeminiFunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<GeminiFunctionResponse>,
}

impl GeminiContent {
    fn is_function_responses(&self) -> bool {
        self.role.as_deref() == Some("user")
            && !self.parts.is_empty()
            && self.parts.iter().all(|p| p.function_response.is_some())
    }
}

impl GeminiPart {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTools<'a> {
    function_declarations: Vec<GeminiFunctionDeclaration<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionDeclaration<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
}

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn convert_messages(messages: &[ChatMessage]) -> (Option<GeminiContent>, Vec<GeminiContent>) {
        let mut system = None;
        let mut contents = Vec::with_capacity(messages.len());

        for m in messages {
            match m.role.as_str() {
                "system" => {
                    system = Some(GeminiContent {
                        role: None,
                        parts: vec![GeminiPart::text(&m.content)],
                    });
                }
                "assistant" => {
                    let mut parts = Vec::new();
                    if !m.content.is_empty() {
                        parts.push(GeminiPart::text(&m.content));
                    }
                    for call in m.tool_calls.iter().flatten() {
                        let args = serde_json::from_str(&call.arguments)
                            .unwrap_or_else(|_| json!({ "request": call.arguments }));
                        parts.push(GeminiPart {
                            function_call: Some(GeminiFunctionCall {
                                name: call.name.clone(),
                                args,
                            }),
                            ..Default::default()
                        });
                    }
                    contents.push(GeminiContent {
                        role: Some("model".into()),
                        parts,
                    });
                }
                "tool" => {
                    let part = GeminiPart {
                        function_response: Some(GeminiFunctionResponse {
                            name: m.tool_name.clone().unwrap_or_default(),
                            response: json!({ "content": m.content }),
                        }),
                        ..Default::default()
                    };
                    // Results answering one model turn travel together.
                    match contents.last_mut() {
                        Some(last) if last.is_function_responses() => last.parts.push(part),
                        _ => contents.push(GeminiContent {
                            role: Some("user".into()),
                            parts: vec![part],
                        }),
                    }
                }
                _ => {
                    contents.push(GeminiContent {
                        role: Some("user".into()),
                        parts: vec![GeminiPart::text(&m.content)],
                    });
                }
            }
        }

        (system, contents)
    }

    fn convert_tools(tools: &[ToolSpec]) -> Vec<GeminiTools<'_>> {
        vec![GeminiTools {
            function_declarations: tools
                .iter()
                .map(|t| GeminiFunctionDeclaration {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters,
                })
                .collect(),
        }]
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn chat(&self, request: ChatRequest<'_>) -> Result<ChatResponse, ProviderError> {
        let (system_instruction, contents) = Self::convert_messages(request.messages);
        let gemini_request = GeminiRequest {
            system_instruction,
            contents,
            tools: request
                .tools
                .filter(|t| !t.is_empty())
                .map(Self::convert_tools),
        };

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, request.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&gemini_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        let gemini_response: GeminiResponse = serde_json::from_str(&response.text().await?)?;

        let candidate = gemini_response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("no candidates in response".into()))?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for part in candidate.content.parts {
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if let Some(call) = part.function_call {
                tool_calls.push(ToolCall {
                    id: format!("call_{}", tool_calls.len()),
                    name: call.name,
                    arguments: call.args.to_string(),
                });
            }
        }

        if text.trim().is_empty() && tool_calls.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "empty response: no content or tool calls".into(),
            ));
        }

        Ok(ChatResponse {
            text: (!text.is_empty()).then_some(text),
            tool_calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn sends_system_instruction_and_parses_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash-lite:generateContent"))
            .and(header("x-goog-api-key", "g-key"))
            .and(body_partial_json(json!({
                "systemInstruction": {"parts": [{"text": "Be brief"}]},
                "contents": [{"role": "user", "parts": [{"text": "Hi"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "Hel"}, {"text": "lo"}]}}]
            })))
            .mount(&server)
            .await;

        let provider = GeminiProvider::new("g-key").with_base_url(server.uri());
        let messages = vec![ChatMessage::system("Be brief"), ChatMessage::user("Hi")];
        let response = provider
            .chat(ChatRequest {
                model: "gemini-2.5-flash-lite",
                messages: &messages,
                tools: None,
            })
            .await
            .unwrap();

        assert_eq!(response.text_or_empty(), "Hello");
    }

    #[tokio::test]
    async fn function_calls_round_trip_through_contents() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "tools": [{"functionDeclarations": [{"name": "Researcher"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [
                    {"functionCall": {"name": "Researcher", "args": {"request": "agents"}}}
                ]}}]
            })))
            .mount(&server)
            .await;

        let provider = GeminiProvider::new("k").with_base_url(server.uri());
        let messages = vec![ChatMessage::system("Coordinate"), ChatMessage::user("Research agents")];
        let tools = [ToolSpec::for_request("Researcher", "Finds things")];
        let response = provider
            .chat(ChatRequest {
                model: "m",
                messages: &messages,
                tools: Some(&tools),
            })
            .await
            .unwrap();

        assert!(response.text.is_none());
        assert_eq!(response.tool_calls[0].name, "Researcher");
        let args: Value = serde_json::from_str(&response.tool_calls[0].arguments).unwrap();
        assert_eq!(args["request"], "agents");
    }

    #[test]
    fn tool_results_become_function_responses() {
        let call = ToolCall {
            id: "call_0".into(),
            name: "Researcher".into(),
            arguments: r#"{"request":"agents"}"#.into(),
        };
        let messages = vec![
            ChatMessage::system("sys"),
            ChatMessage::user("q"),
            ChatMessage::assistant_with_tool_calls("", vec![call.clone()]),
            ChatMessage::tool_result(&call, "found it"),
        ];

        let (system, contents) = GeminiProvider::convert_messages(&messages);

        assert!(system.is_some());
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1].role.as_deref(), Some("model"));
        let call_part = contents[1].parts[0].function_call.as_ref().unwrap();
        assert_eq!(call_part.args["request"], "agents");
        let response = contents[2].parts[0].function_response.as_ref().unwrap();
        assert_eq!(response.name, "Researcher");
        assert_eq!(response.response["content"], "found it");
    }

    #[test]
    fn consecutive_tool_results_share_one_turn() {
        let lookup = |id: &str, name: &str| ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: r#"{"request":"agents"}"#.into(),
        };
        let (a, b) = (lookup("call_0", "Researcher"), lookup("call_1", "Summariser"));
        let messages = vec![
            ChatMessage::system("sys"),
            ChatMessage::user("q"),
            ChatMessage::assistant_with_tool_calls("", vec![a.clone(), b.clone()]),
            ChatMessage::tool_result(&a, "facts"),
            ChatMessage::tool_result(&b, "summary"),
            ChatMessage::user("thanks"),
        ];

        let (_, contents) = GeminiProvider::convert_messages(&messages);

        assert_eq!(contents.len(), 4);
        assert_eq!(contents[1].parts.len(), 2);
        let names: Vec<&str> = contents[2]
            .parts
            .iter()
            .map(|p| p.function_response.as_ref().unwrap().name.as_str())
            .collect();
        assert_eq!(names, ["Researcher", "Summariser"]);
        assert_eq!(contents[2].role.as_deref(), Some("user"));
        assert_eq!(contents[3].parts[0].text.as_deref(), Some("thanks"));
    }

    #[tokio::test]
    async fn service_unavailable_is_reported_with_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let provider = GeminiProvider::new("k").with_base_url(server.uri());
        let messages = vec![ChatMessage::user("Hi")];
        let err = provider
            .chat(ChatRequest {
                model: "m",
                messages: &messages,
                tools: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Status { status: 503, .. }));
    }
}
