use thiserror::Error;

pub type Result<T> = std::result::Result<T, SiteError>;

#[derive(Debug, Error)]
pub enum SiteError {
    /// Network, DNS or timeout failure talking to an upstream provider.
    #[error("transport error: {0}")]
    Transport(String),

    /// Upstream answered with a non-success status.
    #[error("upstream error: status={status} body={body}")]
    Upstream { status: u16, body: String },

    /// Missing JSON field, bad base64, undecodable image bytes.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A required section came back empty after extraction.
    #[error("no {0} content found in model response")]
    ExtractionEmpty(&'static str),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for SiteError {
    fn from(e: reqwest::Error) -> Self {
        SiteError::Transport(e.to_string())
    }
}

/// Keeps log lines readable when an upstream echoes a large body back.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...[{} chars]", &s[..end], s.chars().count())
}
