use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// A stock photo offered to the model as website content.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ImageDescriptor {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub alt_text: String,
    pub photographer_credit: String,
    pub source_page_url: String,
}

/// `#RRGGBB`, always upper case. `#RGB` input is expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub struct HexColor(String);

impl HexColor {
    pub fn parse(raw: &str) -> Option<Self> {
        let digits = raw.trim().strip_prefix('#')?;
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let full = match digits.len() {
            6 => digits.to_string(),
            3 => digits.chars().flat_map(|c| [c, c]).collect(),
            _ => return None,
        };
        Some(Self(format!("#{}", full.to_ascii_uppercase())))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<HexColor> for String {
    fn from(c: HexColor) -> Self { c.0 }
}

/// Everything one generation attempt needs. Built fresh per attempt.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub description: String,
    pub business_name: String,
    pub main_color: HexColor,
    pub secondary_color: HexColor,
    pub logo_path: Option<PathBuf>,
    pub content_images: Vec<ImageDescriptor>,
}

/// Model output exactly as returned; consumed once by the extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct RawModelResponse(pub String);

impl RawModelResponse {
    pub fn as_str(&self) -> &str { &self.0 }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedCode {
    pub html: String,
    pub css: String,
    pub js: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct GeneratedSite {
    pub id: Uuid,
    pub html: String,
    pub css: String,
    pub js: String,
    pub saved_directory: PathBuf,
    pub generated_at: DateTime<Utc>,
}

fn default_main_color() -> String { "#000000".into() }
fn default_secondary_color() -> String { "#FFFFFF".into() }

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GenerateSiteBody {
    pub description: String,
    #[serde(default)]
    pub business_name: String,
    #[serde(default = "default_main_color")]
    pub main_color: String,
    #[serde(default = "default_secondary_color")]
    pub secondary_color: String,
    #[serde(default)]
    pub image_keywords: Option<Vec<String>>, // e.g., "croissant", "bakery interior"
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogoUpload {
    #[serde(default)]
    pub filename: Option<String>,
    pub data_base64: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogoPrompt {
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogoInfo {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImageQuery {
    pub keyword: String,
    #[serde(default)]
    pub count: Option<usize>,
}
