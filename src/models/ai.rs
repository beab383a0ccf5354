use serde::{Deserialize, Serialize};

/// OpenAI 兼容接口配置（可选的 AI 研究数据源）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AIConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// 研究场景要求数据精确，建议 0.1 左右
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String { "https://api.openai.com/v1".to_string() }
fn default_model_name() -> String { "gpt-4o-mini".to_string() }
fn default_max_tokens() -> u32 { 2048 }
fn default_temperature() -> f64 { 0.1 }
fn default_timeout_secs() -> u64 { 120 }

impl Default for AIConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            model_name: default_model_name(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AIConfig {
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

// ========== Chat Completion 数据结构 ==========

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(content.to_string()),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: Option<String>,
    pub choices: Vec<ChatChoice>,
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub index: u32,
    pub message: Option<ChatChoiceMessage>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoiceMessage {
    pub role: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_skips_unset_options() {
        let req = ChatCompletionRequest {
            model: "m".to_string(),
            messages: vec![ChatMessage::user("hi")],
            max_tokens: None,
            temperature: Some(0.1),
            stream: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("max_tokens").is_none());
        assert!(json.get("stream").is_none());
        assert_eq!(json["temperature"], 0.1);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_response_without_usage_parses() {
        let body = r#"{"id":"x","choices":[{"message":{"role":"assistant","content":"[]"},"finish_reason":"stop"}]}"#;
        let resp: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert!(resp.usage.is_none());
        assert_eq!(resp.choices[0].index, 0);
        assert_eq!(resp.choices[0].message.as_ref().and_then(|m| m.content.as_deref()), Some("[]"));
    }

    #[test]
    fn test_completions_url_trims_slash() {
        let cfg = AIConfig { base_url: "http://localhost:8080/v1/".to_string(), ..Default::default() };
        assert_eq!(cfg.completions_url(), "http://localhost:8080/v1/chat/completions");
    }
}
