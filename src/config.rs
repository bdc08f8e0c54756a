use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SiteError};

pub const DEFAULT_CHAT_URL: &str = "https://integrate.api.nvidia.com/v1/chat/completions";
pub const DEFAULT_CHAT_MODEL: &str = "nvidia/llama-3.1-nemotron-ultra-253b-v1";
pub const DEFAULT_IMAGE_URL: &str = "https://ai.api.nvidia.com/v1/genai/black-forest-labs/flux.1-dev";
pub const DEFAULT_PEXELS_BASE: &str = "https://api.pexels.com/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatProviderKind {
    /// OpenAI-style `choices[0].message.content`.
    ChatCompletions,
    /// Flat `{"result": "..."}` envelope.
    ResultField,
}

impl ChatProviderKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chat-completions" | "openai" => Ok(Self::ChatCompletions),
            "result-field" | "result" => Ok(Self::ResultField),
            other => Err(SiteError::Config(format!("unknown CHAT_PROVIDER '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageProviderKind {
    /// JSON envelope with a base64 image field.
    FluxJson,
    /// Raw image bytes in the response body.
    RawBytes,
}

impl ImageProviderKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flux-json" | "nvidia" => Ok(Self::FluxJson),
            "raw-bytes" | "huggingface" => Ok(Self::RawBytes),
            other => Err(SiteError::Config(format!("unknown IMAGE_PROVIDER '{other}'"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub provider: ChatProviderKind,
    pub url: String,
    pub api_key: String,
    pub model: String,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImageSettings {
    pub provider: ImageProviderKind,
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct PexelsSettings {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub output_dir: PathBuf,
    pub logo_dir: PathBuf,
    pub http_timeout: Option<Duration>,
    pub chat: ChatSettings,
    pub image: ImageSettings,
    pub pexels: PexelsSettings,
}

impl Settings {
    /// Reads settings from the process environment. Call `dotenv` first.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup, so tests don't touch the real env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            Some(v) => v
                .parse()
                .map_err(|_| SiteError::Config(format!("PORT is not a valid port: {v}")))?,
            None => 8080,
        };

        let http_timeout = match get("HTTP_TIMEOUT_SECS") {
            Some(v) => Some(Duration::from_secs(v.parse().map_err(|_| {
                SiteError::Config(format!("HTTP_TIMEOUT_SECS is not a number: {v}"))
            })?)),
            None => None,
        };

        let nvidia_key = get("NVIDIA_API_KEY").unwrap_or_default();

        let chat = ChatSettings {
            provider: get("CHAT_PROVIDER")
                .map(|v| ChatProviderKind::parse(&v))
                .transpose()?
                .unwrap_or(ChatProviderKind::ChatCompletions),
            url: get("CHAT_API_URL").unwrap_or_else(|| DEFAULT_CHAT_URL.to_string()),
            api_key: get("CHAT_API_KEY").unwrap_or_else(|| nvidia_key.clone()),
            model: get("CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            system_prompt: get("CHAT_SYSTEM_PROMPT"),
        };

        let image = ImageSettings {
            provider: get("IMAGE_PROVIDER")
                .map(|v| ImageProviderKind::parse(&v))
                .transpose()?
                .unwrap_or(ImageProviderKind::FluxJson),
            url: get("IMAGE_API_URL").unwrap_or_else(|| DEFAULT_IMAGE_URL.to_string()),
            api_key: get("IMAGE_API_KEY").unwrap_or(nvidia_key),
        };

        let pexels = PexelsSettings {
            base_url: get("PEXELS_API_BASE").unwrap_or_else(|| DEFAULT_PEXELS_BASE.to_string()),
            api_key: get("PEXELS_API_KEY").unwrap_or_default(),
        };

        Ok(Self {
            port,
            output_dir: get("OUTPUT_DIR").unwrap_or_else(|| "generated_website".into()).into(),
            logo_dir: get("LOGO_DIR").unwrap_or_else(|| "uploads".into()).into(),
            http_timeout,
            chat,
            image,
            pexels,
        })
    }

    /// Shared reqwest client; no deadline unless `HTTP_TIMEOUT_SECS` is set.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = self.http_timeout {
            builder = builder.timeout(t);
        }
        builder
            .build()
            .map_err(|e| SiteError::Config(format!("failed to build HTTP client: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_env_is_empty() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.port, 8080);
        assert_eq!(s.output_dir, PathBuf::from("generated_website"));
        assert_eq!(s.chat.provider, ChatProviderKind::ChatCompletions);
        assert_eq!(s.chat.model, DEFAULT_CHAT_MODEL);
        assert_eq!(s.image.provider, ImageProviderKind::FluxJson);
        assert!(s.http_timeout.is_none());
        assert!(s.chat.system_prompt.is_none());
    }

    #[test]
    fn nvidia_key_feeds_chat_and_image() {
        let s = settings(&[("NVIDIA_API_KEY", "nv"), ("IMAGE_API_KEY", "img")]).unwrap();
        assert_eq!(s.chat.api_key, "nv");
        assert_eq!(s.image.api_key, "img");
    }

    #[test]
    fn provider_names_are_parsed() {
        let s = settings(&[("CHAT_PROVIDER", "result-field"), ("IMAGE_PROVIDER", "raw-bytes")]).unwrap();
        assert_eq!(s.chat.provider, ChatProviderKind::ResultField);
        assert_eq!(s.image.provider, ImageProviderKind::RawBytes);
    }

    #[test]
    fn unknown_provider_is_a_config_error() {
        let err = settings(&[("CHAT_PROVIDER", "carrier-pigeon")]).unwrap_err();
        assert!(matches!(err, SiteError::Config(_)));
    }

    #[test]
    fn bad_port_is_rejected() {
        assert!(settings(&[("PORT", "eighty")]).is_err());
    }
}
