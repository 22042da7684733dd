// src/summarize.rs
//! Summarizer collaborator: a closed set of backends resolved once at
//! startup. Hosted backends speak a TITLE:/SUMMARY: line protocol so the
//! same parser serves all of them; any failure or malformed response is
//! an error the caller answers with the deterministic fallback.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;

pub const TITLE_MAX_LENGTH: usize = 80;
pub const SUMMARY_TRUNCATE_LENGTH: usize = 200;
const MAX_TOKENS: u32 = 250;
const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);
const CLI_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-haiku-20240307";

/// Prompt pair for editorial generation. `{text}` and `{keywords}` are
/// substituted into the user template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSet {
    pub system: String,
    pub user_template: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            system: "You are a news editor writing a short morning editorial. \
                     Weave the given stories into one coherent piece."
                .to_string(),
            user_template: "Given these stories:\n{text}\n\nFocus keywords: {keywords}\n\n\
                            Generate:\n1. A concise, engaging title (max 80 characters)\n\
                            2. An editorial in markdown\n\nFormat as:\nTITLE: <title>\nSUMMARY: <editorial>"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SummaryRequest {
    pub text: String,
    pub keywords: Vec<String>,
    pub prompts: Option<PromptSet>,
    pub max_len: Option<usize>,
}

impl SummaryRequest {
    fn render_prompt(&self) -> (String, String) {
        let prompts = self.prompts.clone().unwrap_or_default();
        let user = prompts
            .user_template
            .replace("{text}", &self.text)
            .replace("{keywords}", &self.keywords.join(", "));
        (prompts.system, user)
    }
}

/// What a backend hands back: a title and the generated body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCopy {
    pub title: String,
    pub content: String,
}

#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, req: &SummaryRequest) -> Result<GeneratedCopy>;
    fn name(&self) -> &'static str;
}

/// Parse the TITLE:/SUMMARY: protocol. The summary tag is required; text
/// after it (including later lines) is the content.
fn parse_tagged_copy(raw: &str) -> Result<GeneratedCopy> {
    let mut title = None;
    let mut content_lines: Vec<&str> = Vec::new();
    let mut in_summary = false;

    for line in raw.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("TITLE:") {
            title = Some(rest.trim().to_string());
            in_summary = false;
        } else if let Some(rest) = trimmed.strip_prefix("SUMMARY:") {
            content_lines.push(rest.trim());
            in_summary = true;
        } else if in_summary {
            content_lines.push(line);
        }
    }

    if content_lines.is_empty() {
        return Err(anyhow!("response has no SUMMARY: section"));
    }
    Ok(GeneratedCopy {
        title: truncate_chars(
            &title.unwrap_or_else(|| "Your Morning News".to_string()),
            TITLE_MAX_LENGTH,
        ),
        content: content_lines.join("\n").trim().to_string(),
    })
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        s.chars().take(max).collect()
    } else {
        s.to_string()
    }
}

// ---- OpenAI chat-completions backend ----

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: ChatMessage,
}

pub struct OpenAiSummarizer {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiSummarizer {
    pub fn new(api_key: String, model: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        })
    }
}

#[async_trait::async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, req: &SummaryRequest) -> Result<GeneratedCopy> {
        let (system, user) = req.render_prompt();
        let body = OpenAiRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: system,
                },
                ChatMessage {
                    role: "user".into(),
                    content: user,
                },
            ],
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("sending request to OpenAI")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("OpenAI API error {status}: {text}"));
        }

        let parsed: OpenAiResponse = response
            .json()
            .await
            .context("parsing OpenAI response")?;
        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| anyhow!("OpenAI response has no choices"))?;
        parse_tagged_copy(content)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

// ---- Anthropic messages backend ----

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: String,
}

pub struct AnthropicSummarizer {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl AnthropicSummarizer {
    pub fn new(api_key: String, model: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
        })
    }
}

#[async_trait::async_trait]
impl Summarizer for AnthropicSummarizer {
    async fn summarize(&self, req: &SummaryRequest) -> Result<GeneratedCopy> {
        let (system, user) = req.render_prompt();
        let body = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            system,
            messages: vec![ChatMessage {
                role: "user".into(),
                content: user,
            }],
        };

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .context("sending request to Anthropic")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Anthropic API error {status}: {text}"));
        }

        let parsed: AnthropicResponse = response
            .json()
            .await
            .context("parsing Anthropic response")?;
        let content = parsed
            .content
            .first()
            .map(|c| c.text.as_str())
            .ok_or_else(|| anyhow!("Anthropic response has no content"))?;
        parse_tagged_copy(content)
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}

// ---- Local CLI backend ----

/// Shells out to a local text-generation CLI. The prompt goes in on
/// stdin; the TITLE:/SUMMARY: answer is expected on stdout.
pub struct CliSummarizer {
    program: String,
    args: Vec<String>,
}

impl CliSummarizer {
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

#[async_trait::async_trait]
impl Summarizer for CliSummarizer {
    async fn summarize(&self, req: &SummaryRequest) -> Result<GeneratedCopy> {
        let (system, user) = req.render_prompt();
        let prompt = format!("{system}\n\n{user}");

        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("spawning {}", self.program))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .context("writing prompt to cli stdin")?;
        }

        let output = tokio::time::timeout(CLI_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| anyhow!("{} timed out after {:?}", self.program, CLI_TIMEOUT))?
            .with_context(|| format!("waiting for {}", self.program))?;

        if !output.status.success() {
            return Err(anyhow!("{} exited with {}", self.program, output.status));
        }
        parse_tagged_copy(&String::from_utf8_lossy(&output.stdout))
    }

    fn name(&self) -> &'static str {
        "cli"
    }
}

// ---- Deterministic non-AI backend ----

/// Truncation-only backend for demos and for running without keys.
#[derive(Debug, Default, Clone)]
pub struct SimpleSummarizer;

#[async_trait::async_trait]
impl Summarizer for SimpleSummarizer {
    async fn summarize(&self, req: &SummaryRequest) -> Result<GeneratedCopy> {
        let title = req
            .text
            .lines()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("Your Morning News");
        let max = req.max_len.unwrap_or(SUMMARY_TRUNCATE_LENGTH);
        Ok(GeneratedCopy {
            title: truncate_chars(title.trim(), TITLE_MAX_LENGTH),
            content: truncate_chars(req.text.trim(), max),
        })
    }

    fn name(&self) -> &'static str {
        "simple"
    }
}

// ---- Backend selection ----

/// The backends we know about, picked once at startup from config.
pub enum SummarizerBackend {
    OpenAi(OpenAiSummarizer),
    Anthropic(AnthropicSummarizer),
    Cli(CliSummarizer),
    Simple(SimpleSummarizer),
}

#[async_trait::async_trait]
impl Summarizer for SummarizerBackend {
    async fn summarize(&self, req: &SummaryRequest) -> Result<GeneratedCopy> {
        match self {
            SummarizerBackend::OpenAi(s) => s.summarize(req).await,
            SummarizerBackend::Anthropic(s) => s.summarize(req).await,
            SummarizerBackend::Cli(s) => s.summarize(req).await,
            SummarizerBackend::Simple(s) => s.summarize(req).await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            SummarizerBackend::OpenAi(s) => s.name(),
            SummarizerBackend::Anthropic(s) => s.name(),
            SummarizerBackend::Cli(s) => s.name(),
            SummarizerBackend::Simple(s) => s.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_copy_parses_title_and_multiline_summary() {
        let raw = "TITLE: Chips Everywhere\nSUMMARY: First line.\nSecond line.";
        let copy = parse_tagged_copy(raw).unwrap();
        assert_eq!(copy.title, "Chips Everywhere");
        assert_eq!(copy.content, "First line.\nSecond line.");
    }

    #[test]
    fn missing_summary_tag_is_an_error() {
        assert!(parse_tagged_copy("TITLE: Lonely title").is_err());
        assert!(parse_tagged_copy("free-form prose").is_err());
    }

    #[test]
    fn missing_title_gets_a_default() {
        let copy = parse_tagged_copy("SUMMARY: body").unwrap();
        assert_eq!(copy.title, "Your Morning News");
    }

    #[tokio::test]
    async fn simple_backend_truncates_deterministically() {
        let req = SummaryRequest {
            text: "Headline\nand then a very long body".to_string(),
            max_len: Some(12),
            ..Default::default()
        };
        let copy = SimpleSummarizer.summarize(&req).await.unwrap();
        assert_eq!(copy.title, "Headline");
        assert_eq!(copy.content.chars().count(), 12);
    }
}
