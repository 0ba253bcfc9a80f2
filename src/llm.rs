use std::time::Duration;
use anyhow::{bail, Context as _};
use reqwest::Client;
use serde_json::{json, Value};

const ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const TIMEOUT: Duration = Duration::from_secs(30);
const TEMPERATURE: f64 = 0.3;

#[derive(Clone, Debug)]
pub struct ChatClient {
    client: Client,
    api_key: String,
    model: String
}

impl ChatClient {
    pub fn new(api_key: String, model: String) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(TIMEOUT).build()?;
        Ok(Self { client, api_key, model })
    }

    /// One system + user exchange; returns the trimmed reply text.
    pub async fn ask(&self, system: &str, prompt: &str, max_tokens: u32) -> anyhow::Result<String> {
        let res = self.client
            .post(ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&request_body(&self.model, system, prompt, max_tokens))
            .send().await?;

        if !res.status().is_success() {
            let status = res.status();
            bail!("chat completion failed with {status}: {}", res.text().await?);
        }

        reply_text(&res.json::<Value>().await?)
    }
}

fn request_body(model: &str, system: &str, prompt: &str, max_tokens: u32) -> Value {
    json!({
        "model": model,
        "messages": [
            { "role": "system", "content": system },
            { "role": "user", "content": prompt }
        ],
        "temperature": TEMPERATURE,
        "max_tokens": max_tokens
    })
}

fn reply_text(res: &Value) -> anyhow::Result<String> {
    let text = res
        .pointer("/choices/0/message/content").context("no message content in reply")?
        .as_str().context("message content is not a string")?;
    Ok(text.trim().to_owned())
}

/// Strips code fences and returns the outermost `{...}` of a reply.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let text = text.trim();
    let text = text.strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.trim_end().strip_suffix("```").unwrap_or(text);
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_message_content() {
        let res = json!({ "choices": [{ "message": { "role": "assistant", "content": "  성 모니카\n" } }] });
        assert_eq!(reply_text(&res).unwrap(), "성 모니카");
        assert!(reply_text(&json!({ "error": { "message": "quota" } })).is_err());
        assert!(reply_text(&json!({ "choices": [{ "message": { "content": null } }] })).is_err());
    }

    #[test]
    fn builds_request() {
        let body = request_body("gpt-4o-mini", "sys", "hi", 100);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["temperature"], 0.3);
    }

    #[test]
    fn extracts_fenced_json() {
        let reply = "```json\n{\"saints\": [{\"name\": \"a\"}]}\n```";
        assert_eq!(extract_json_object(reply), Some("{\"saints\": [{\"name\": \"a\"}]}"));
        assert_eq!(extract_json_object("Here you go: {\"a\": 1} hope it helps"), Some("{\"a\": 1}"));
        assert_eq!(extract_json_object("no json"), None);
        assert_eq!(extract_json_object("} {"), None);
    }
}
