//! Chat Completions wire types and request assembly.

use crate::error::CompletionError;
use chorus_core::persona::Persona;
use chorus_core::session::{ChatMessage, MessageRole};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Placeholder in the group prompt replaced by the current local time.
pub const TIME_PLACEHOLDER: &str = "{{Date::time}}";

/// Text standing in for an image the persona cannot see.
pub const IMAGE_PLACEHOLDER: &str = "[图片]";

const DEFAULT_MAX_TOKENS: u32 = 1500;
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Prompts shared by every persona.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SharedPrompts {
    pub user_prompt: String,
    pub group_prompt: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<RequestMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolSpec>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RequestMessage {
    pub role: &'static str,
    pub content: RequestContent,
}

/// Plain string content, or an array of typed parts for multimodal input.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum RequestContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { url: String },
}

impl Serialize for ContentPart {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(2))?;
        match self {
            ContentPart::Text { text } => {
                map.serialize_entry("type", "text")?;
                map.serialize_entry("text", text)?;
            }
            ContentPart::ImageUrl { url } => {
                map.serialize_entry("type", "image_url")?;
                map.serialize_entry("image_url", &ImageUrl { url })?;
            }
        }
        map.end()
    }
}

#[derive(Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Serialize, Debug, Clone)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: FunctionSpec,
}

#[derive(Serialize, Debug, Clone)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: serde_json::Value,
}

impl ToolSpec {
    /// The web search function offered to personas with search support.
    pub fn google_search() -> Self {
        Self {
            kind: "function",
            function: FunctionSpec {
                name: "google_search",
                description: "Perform a Google search to find information on the web.",
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "The search query string."
                        }
                    },
                    "required": ["query"]
                }),
            },
        }
    }
}

#[derive(Deserialize, Debug)]
pub(crate) struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct Choice {
    #[serde(default)]
    pub message: Option<ResponseMessage>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// `choices[0].message.content`, if non-empty.
    pub fn into_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.is_empty())
    }
}

/// One streamed `chat.completion.chunk` payload.
#[derive(Deserialize, Debug)]
pub(crate) struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct ChunkChoice {
    #[serde(default)]
    pub delta: Option<ChunkDelta>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionChunk {
    pub fn first_choice(&self) -> Option<&ChunkChoice> {
        self.choices.first()
    }

    /// `choices[0].delta.content`, if present.
    pub fn delta_content(&self) -> Option<&str> {
        self.first_choice()?.delta.as_ref()?.content.as_deref()
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Deserialize)]
struct FlatErrorResponse {
    message: String,
}

/// Extracts a server error message from an error body, if it carries one.
pub(crate) fn error_message_from_body(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|wrapper| wrapper.error.message)
        .or_else(|_| serde_json::from_str::<FlatErrorResponse>(body).map(|flat| flat.message))
        .ok()
        .filter(|message| !message.trim().is_empty())
}

/// Assembles the request for `persona` replying to `history`.
pub fn build_request(
    persona: &Persona,
    history: &[ChatMessage],
    prompts: &SharedPrompts,
    streaming: bool,
    now: DateTime<Local>,
) -> Result<ChatCompletionRequest, CompletionError> {
    let mut messages = Vec::with_capacity(history.len() + 2);

    let system = system_prompt(persona, prompts, now);
    if !system.trim().is_empty() {
        messages.push(RequestMessage {
            role: "system",
            content: RequestContent::Text(system),
        });
    }
    let preamble = messages.len();

    messages.extend(
        history
            .iter()
            .filter_map(|message| history_message(message, persona.supports_image)),
    );
    if messages.len() == preamble {
        return Err(CompletionError::EmptyConversation);
    }

    if !persona.invite_prompt.trim().is_empty() {
        messages.push(RequestMessage {
            role: "user",
            content: RequestContent::Text(persona.invite_prompt.clone()),
        });
    }

    let (tools, tool_choice) = if persona.supports_web_search {
        (Some(vec![ToolSpec::google_search()]), Some("auto".to_string()))
    } else {
        (None, None)
    };

    Ok(ChatCompletionRequest {
        model: persona.model.clone(),
        messages,
        max_tokens: persona.max_output_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        temperature: persona.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        stream: streaming,
        tools,
        tool_choice,
    })
}

fn system_prompt(persona: &Persona, prompts: &SharedPrompts, now: DateTime<Local>) -> String {
    let time = now.format("%Y/%-m/%-d %H:%M:%S").to_string();
    let group_prompt = prompts.group_prompt.replacen(TIME_PLACEHOLDER, &time, 1);

    [
        prompts.user_prompt.as_str(),
        group_prompt.as_str(),
        persona.system_prompt.as_str(),
    ]
    .into_iter()
    .filter(|part| !part.trim().is_empty())
    .collect::<Vec<_>>()
    .join("\n")
}

fn history_message(message: &ChatMessage, supports_image: bool) -> Option<RequestMessage> {
    let role = match message.role {
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    };
    let prefix = format!("{}: ", message.name);
    let text = message.content.non_empty_text();
    let image = message.content.non_empty_image();

    let content = match (text, image) {
        (text, Some(url)) if supports_image => RequestContent::Parts(vec![
            ContentPart::Text {
                text: format!("{}{}", prefix, text.unwrap_or(IMAGE_PLACEHOLDER)),
            },
            ContentPart::ImageUrl {
                url: url.to_string(),
            },
        ]),
        (Some(text), _) => RequestContent::Text(format!("{}{}", prefix, text)),
        (None, Some(_)) => RequestContent::Text(format!("{}{}", prefix, IMAGE_PLACEHOLDER)),
        (None, None) => {
            tracing::debug!("[Completion] Skipping empty history message from {}", message.name);
            return None;
        }
    };

    Some(RequestMessage { role, content })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_core::session::MessageContent;
    use chrono::TimeZone;
    use serde_json::Value;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 9, 5, 0).unwrap()
    }

    fn prompts() -> SharedPrompts {
        SharedPrompts {
            user_prompt: "I am Ryan.".to_string(),
            group_prompt: "Time: {{Date::time}}".to_string(),
        }
    }

    fn as_json(request: &ChatCompletionRequest) -> Value {
        serde_json::from_str(&serde_json::to_string(request).unwrap()).unwrap()
    }

    #[test]
    fn test_system_message_and_prefixes() {
        let mut persona = Persona::new("Ann", "gpt-4o");
        persona.system_prompt = "You are Ann.".to_string();
        let history = vec![
            ChatMessage::user("Ryan", MessageContent::text("hi all")),
            ChatMessage::assistant("Ben", "hello"),
        ];

        let request = build_request(&persona, &history, &prompts(), false, now()).unwrap();
        let body = as_json(&request);

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 1500);
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["stream"], false);
        assert!(body.get("tools").is_none());
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(
            body["messages"][0]["content"],
            "I am Ryan.\nTime: 2024/5/1 09:05:00\nYou are Ann."
        );
        assert_eq!(body["messages"][1]["content"], "Ryan: hi all");
        assert_eq!(body["messages"][2]["role"], "assistant");
        assert_eq!(body["messages"][2]["content"], "Ben: hello");
        assert_eq!(request.messages.len(), 3);
    }

    #[test]
    fn test_image_supported_becomes_parts() {
        let mut persona = Persona::new("Ann", "gpt-4o");
        persona.supports_image = true;
        let history = vec![ChatMessage::user(
            "Ryan",
            MessageContent::with_image(None, Some("data:image/png;base64,AAAA".to_string())),
        )];

        let body = as_json(&build_request(&persona, &history, &prompts(), false, now()).unwrap());
        let parts = &body["messages"][1]["content"];
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[0]["text"], "Ryan: [图片]");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_image_unsupported_degrades_to_text() {
        let persona = Persona::new("Ann", "gpt-4o");
        let history = vec![
            ChatMessage::user(
                "Ryan",
                MessageContent::with_image(Some("look".to_string()), Some("https://x/cat.png".to_string())),
            ),
            ChatMessage::user(
                "Ryan",
                MessageContent::with_image(None, Some("https://x/dog.png".to_string())),
            ),
        ];

        let body = as_json(&build_request(&persona, &history, &prompts(), false, now()).unwrap());
        assert_eq!(body["messages"][1]["content"], "Ryan: look");
        assert_eq!(body["messages"][2]["content"], "Ryan: [图片]");
    }

    #[test]
    fn test_invite_prompt_appended_once_and_tools() {
        let mut persona = Persona::new("Ann", "gpt-4o");
        persona.invite_prompt = "Reply briefly.".to_string();
        persona.supports_web_search = true;
        persona.max_output_tokens = Some(300);
        persona.temperature = Some(0.25);
        let history = vec![ChatMessage::user("Ryan", MessageContent::text("news?"))];

        let request = build_request(&persona, &history, &prompts(), true, now()).unwrap();
        let body = as_json(&request);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(messages[2]["content"], "Reply briefly.");
        assert_eq!(body["max_tokens"], 300);
        assert_eq!(body["temperature"], 0.25);
        assert_eq!(body["stream"], true);
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "google_search");
        assert_eq!(
            body["tools"][0]["function"]["parameters"]["required"][0],
            "query"
        );
    }

    #[test]
    fn test_empty_conversation() {
        let persona = Persona::new("Ann", "gpt-4o");
        let history = vec![ChatMessage::user("Ryan", MessageContent::default())];
        let err = build_request(&persona, &history, &prompts(), false, now()).unwrap_err();
        assert_eq!(err, CompletionError::EmptyConversation);

        let err = build_request(&persona, &[], &SharedPrompts::default(), false, now()).unwrap_err();
        assert_eq!(err, CompletionError::EmptyConversation);
    }

    #[test]
    fn test_error_message_from_body() {
        assert_eq!(
            error_message_from_body(r#"{"error":{"message":"Invalid key","type":"auth"}}"#).as_deref(),
            Some("Invalid key")
        );
        assert_eq!(
            error_message_from_body(r#"{"message":"quota"}"#).as_deref(),
            Some("quota")
        );
        assert!(error_message_from_body("<html>").is_none());
    }

    #[test]
    fn test_parse_response_and_chunks() {
        let response: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":"Hey"}}]}"#)
                .unwrap();
        assert_eq!(response.into_text().as_deref(), Some("Hey"));

        let response: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(response.into_text().is_none());

        let chunk: ChatCompletionChunk =
            serde_json::from_str(r#"{"choices":[{"delta":{"content":"Hi"},"finish_reason":null}]}"#)
                .unwrap();
        assert_eq!(chunk.delta_content(), Some("Hi"));

        let last: ChatCompletionChunk =
            serde_json::from_str(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#).unwrap();
        assert!(last.delta_content().is_none());
        assert_eq!(
            last.first_choice().and_then(|c| c.finish_reason.as_deref()),
            Some("stop")
        );
    }
}
