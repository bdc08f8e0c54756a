use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::{ChatProviderKind, ChatSettings};
use crate::error::{truncate_for_log, Result, SiteError};
use crate::extract::{CSS_END, CSS_START, HTML_END, HTML_START, JS_END, JS_START};
use crate::models::{GenerationRequest, RawModelResponse};

pub const DEFAULT_LOGO_FILENAME: &str = "logo.png";
pub const TEMPERATURE: f32 = 0.6;
pub const TOP_P: f32 = 0.95;
pub const MAX_TOKENS: u32 = 16384;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// A chat-completion upstream. Each implementation owns one response shape.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Shared request plumbing for the chat upstreams; they differ only in how
/// the reply envelope is read.
struct ChatEndpoint {
    client: Client,
    settings: ChatSettings,
}

impl ChatEndpoint {
    async fn post(&self, prompt: &str) -> Result<reqwest::Response> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self.settings.system_prompt.as_deref() {
            messages.push(ChatMessage { role: "system", content: system });
        }
        messages.push(ChatMessage { role: "user", content: prompt });

        let body = ChatRequest {
            model: &self.settings.model,
            messages,
            temperature: TEMPERATURE,
            top_p: TOP_P,
            max_tokens: MAX_TOKENS,
        };

        info!("🔗 Making request to: {}", self.settings.url);
        let response = self.client
            .post(&self.settings.url)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        info!("📥 Response status: {}", status);
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("❌ API Error response: {}", truncate_for_log(&body, 500));
            return Err(SiteError::Upstream { status: status.as_u16(), body });
        }
        Ok(response)
    }
}

/// OpenAI-compatible: `choices[0].message.content`.
pub struct ChatCompletionsProvider(ChatEndpoint);

impl ChatCompletionsProvider {
    pub fn new(client: Client, settings: ChatSettings) -> Self {
        Self(ChatEndpoint { client, settings })
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice { message: ChoiceMessage }

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ModelProvider for ChatCompletionsProvider {
    fn name(&self) -> &str { "chat-completions" }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let parsed: ChatCompletionResponse = self.0.post(prompt).await?
            .json()
            .await
            .map_err(|e| SiteError::MalformedResponse(e.to_string()))?;

        parsed.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| SiteError::MalformedResponse("missing choices[0].message.content".into()))
    }
}

/// Gateways that answer with a flat `{"result": "..."}`.
pub struct ResultFieldProvider(ChatEndpoint);

impl ResultFieldProvider {
    pub fn new(client: Client, settings: ChatSettings) -> Self {
        Self(ChatEndpoint { client, settings })
    }
}

#[derive(Debug, Deserialize)]
struct ResultEnvelope {
    #[serde(default)]
    result: Option<String>,
}

#[async_trait]
impl ModelProvider for ResultFieldProvider {
    fn name(&self) -> &str { "result-field" }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let parsed: ResultEnvelope = self.0.post(prompt).await?
            .json()
            .await
            .map_err(|e| SiteError::MalformedResponse(e.to_string()))?;

        parsed.result
            .ok_or_else(|| SiteError::MalformedResponse("missing result field".into()))
    }
}

pub fn provider_from_settings(client: Client, settings: &ChatSettings) -> Arc<dyn ModelProvider> {
    match settings.provider {
        ChatProviderKind::ChatCompletions => Arc::new(ChatCompletionsProvider::new(client, settings.clone())),
        ChatProviderKind::ResultField => Arc::new(ResultFieldProvider::new(client, settings.clone())),
    }
}

pub struct CodeGenerator {
    provider: Arc<dyn ModelProvider>,
}

impl CodeGenerator {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self { Self { provider } }

    #[instrument(skip_all, fields(business = %request.business_name))]
    pub async fn generate_code(&self, request: &GenerationRequest) -> Result<RawModelResponse> {
        let prompt = build_prompt(request);
        info!("📤 Sending prompt ({} chars, {} content images) via {}", prompt.len(), request.content_images.len(), self.provider.name());

        let text = self.provider.complete(&prompt).await?;
        info!("📥 Model replied with {} chars", text.len());
        Ok(RawModelResponse(text))
    }
}

/// Basename of the logo path, or `logo.png` when no logo was supplied.
pub fn logo_filename(logo_path: Option<&Path>) -> String {
    logo_path
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_LOGO_FILENAME.to_string())
}

pub fn build_prompt(request: &GenerationRequest) -> String {
    let logo = logo_filename(request.logo_path.as_deref());

    let mut images_info = String::new();
    if !request.content_images.is_empty() {
        images_info.push_str("Content Images:\n");
        for (i, img) in request.content_images.iter().enumerate() {
            let _ = writeln!(images_info, "{}. Content Image URL: {}, Alt Text: {}", i + 1, img.url, img.alt_text);
        }
    }

    format!(
        "Generate a complete website using HTML, CSS, and JavaScript based on this information:

Business Name: {name}
Main Color: {main}
Secondary Color: {secondary}
Description: {description}

Logo: The website should include a logo image with filename \"{logo}\" in the header or top-left of the page.

{images_info}
Requirements:
1. Structure your response with clearly separated sections:
- HTML (between {HTML_START} and {HTML_END})
- CSS (between {CSS_START} and {CSS_END})
- JavaScript (between {JS_START} and {JS_END})
2. Create a responsive, mobile-friendly design
3. Include the logo image with max height of 100px (maintain aspect ratio)
4. Incorporate the provided content images URLs directly in the HTML (do NOT change the URLs)
5. Add subtle animations, hover effects, and transitions to interactive elements
6. Ensure all text has sufficient contrast with background colors

First, think about the overall structure and design approach, then provide the complete code.
",
        name = request.business_name,
        main = request.main_color,
        secondary = request.secondary_color,
        description = request.description,
    )
}
