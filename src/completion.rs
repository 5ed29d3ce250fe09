//! Chat-completions client for the remote inference API.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Config, Replies};

pub struct Client {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    persona: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: MessageContent,
}

/// Some backends return the content as a plain string, others as a list of
/// typed fragments keyed `text` or `content`.
#[derive(Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Fragments(Vec<Fragment>),
}

#[derive(Deserialize)]
struct Fragment {
    text: Option<String>,
    content: Option<String>,
}

impl MessageContent {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Fragments(fragments) => fragments
                .into_iter()
                .filter_map(|f| f.text.or(f.content))
                .collect(),
        }
    }
}

impl Client {
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            api_url: config.api_url.clone(),
            api_key: config.llm_api_key.clone(),
            model: config.model.clone(),
            persona: config.persona.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Single-turn completion: persona system prompt plus the user text verbatim.
    pub async fn complete(&self, prompt: &str) -> Result<String, Error> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ApiMessage {
                    role: "system",
                    content: &self.persona,
                },
                ApiMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout
                } else {
                    Error::Http(e.to_string())
                }
            })?;

        let status = response.status();
        debug!("Completion status: {status}");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body: truncate_safe(&body, 200).to_string(),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.into_text())
            .filter(|text| !text.is_empty())
            .ok_or(Error::Empty)
    }
}

#[derive(Debug)]
pub enum Error {
    Timeout,
    Http(String),
    Api { status: u16, body: String },
    Parse(String),
    Empty,
}

impl Error {
    /// What the user sees. Every variant maps to non-empty text, nothing is
    /// propagated past the handler.
    pub fn user_text(&self, replies: &Replies) -> String {
        match self {
            Error::Timeout | Error::Http(_) => replies.network_apology.clone(),
            Error::Api { status, body } => {
                format!("{}: {status} | {body}", replies.api_error_prefix)
            }
            Error::Parse(_) | Error::Empty => replies.placeholder.clone(),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Timeout => write!(f, "Request timed out"),
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Api { status, body } => write!(f, "API error {status}: {body}"),
            Error::Parse(e) => write!(f, "Parse error: {e}"),
            Error::Empty => write!(f, "Empty response"),
        }
    }
}

impl std::error::Error for Error {}

/// Safely truncate a string at a char boundary.
fn truncate_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ChatResponse {
        serde_json::from_str(json).expect("valid fixture")
    }

    fn first_text(response: ChatResponse) -> Option<String> {
        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.into_text())
    }

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: "deepseek-ai/DeepSeek-R1-0528",
            messages: vec![
                ApiMessage {
                    role: "system",
                    content: "persona",
                },
                ApiMessage {
                    role: "user",
                    content: "привет",
                },
            ],
            temperature: 0.7,
            max_tokens: 350,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "deepseek-ai/DeepSeek-R1-0528");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["role"], "user");
        assert_eq!(value["messages"][1]["content"], "привет");
        assert_eq!(value["max_tokens"], 350);
        assert!((value["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_parse_string_content() {
        let response = parse(r#"{"choices":[{"message":{"content":"hi"}}]}"#);
        assert_eq!(first_text(response).as_deref(), Some("hi"));
    }

    #[test]
    fn test_parse_fragment_content_text_key() {
        let response = parse(r#"{"choices":[{"message":{"content":[{"text":"a"},{"text":"b"}]}}]}"#);
        assert_eq!(first_text(response).as_deref(), Some("ab"));
    }

    #[test]
    fn test_parse_fragment_content_content_key() {
        let response = parse(r#"{"choices":[{"message":{"content":[{"content":"hi"}]}}]}"#);
        assert_eq!(first_text(response).as_deref(), Some("hi"));
    }

    #[test]
    fn test_parse_missing_choices() {
        let response = parse(r#"{"id":"x"}"#);
        assert!(response.choices.is_empty());
    }

    #[test]
    fn test_api_error_text_embeds_status() {
        let err = Error::Api {
            status: 500,
            body: "internal".to_string(),
        };
        let text = err.user_text(&Replies::default());
        assert!(text.contains("500"));
        assert!(!text.is_empty());
    }

    #[test]
    fn test_network_errors_map_to_apology() {
        let replies = Replies::default();
        assert_eq!(Error::Timeout.user_text(&replies), replies.network_apology);
        assert_eq!(
            Error::Http("reset".to_string()).user_text(&replies),
            replies.network_apology
        );
    }

    #[test]
    fn test_parse_and_empty_map_to_placeholder() {
        let replies = Replies::default();
        assert_eq!(
            Error::Parse("bad json".to_string()).user_text(&replies),
            replies.placeholder
        );
        assert_eq!(Error::Empty.user_text(&replies), replies.placeholder);
    }

    #[test]
    fn test_truncate_safe_multibyte() {
        // "ой" is 4 bytes, a cut at 3 would split the second char.
        assert_eq!(truncate_safe("ой", 3), "о");
        assert_eq!(truncate_safe("ой", 4), "ой");
        assert_eq!(truncate_safe("abc", 10), "abc");
    }
}
