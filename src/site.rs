use std::fmt;
use std::path::{Path, PathBuf};

use base64::Engine;
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::codegen::CodeGenerator;
use crate::error::{Result, SiteError};
use crate::extract::extract;
use crate::models::{ExtractedCode, GeneratedSite, GenerationRequest};

pub const HTML_FILE: &str = "index.html";
pub const CSS_FILE: &str = "styles.css";
pub const JS_FILE: &str = "script.js";
pub const SITE_FILES: [&str; 3] = [HTML_FILE, CSS_FILE, JS_FILE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    CallingModel,
    Extracting,
    Persisting,
    InliningLogo,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::CallingModel => "calling model",
            Stage::Extracting => "extracting",
            Stage::Persisting => "persisting",
            Stage::InliningLogo => "inlining logo",
        })
    }
}

/// Runs one generation end to end and hands back the finished site.
pub struct SiteGenerator {
    codegen: CodeGenerator,
    output_dir: PathBuf,
}

impl SiteGenerator {
    pub fn new(codegen: CodeGenerator, output_dir: impl Into<PathBuf>) -> Self {
        Self { codegen, output_dir: output_dir.into() }
    }

    pub fn output_dir(&self) -> &Path { &self.output_dir }

    pub async fn generate_and_process(&self, request: GenerationRequest) -> Result<GeneratedSite> {
        info!("🚀 Generating website for: {}", request.business_name);

        let raw = self.codegen
            .generate_code(&request)
            .await
            .map_err(|e| failed(Stage::CallingModel, e))?;

        let code = validate(extract(&raw)).map_err(|e| failed(Stage::Extracting, e))?;

        // Read the logo before touching the output directory so a bad logo
        // leaves the previous run's files in place.
        let mut html = code.html.clone();
        let mut logo_to_copy = None;
        if let Some(logo) = request.logo_path.as_deref() {
            if tokio::fs::try_exists(logo).await.unwrap_or(false) {
                html = inline_logo(&html, logo)
                    .await
                    .map_err(|e| failed(Stage::InliningLogo, e))?;
                logo_to_copy = Some(logo);
            } else {
                warn!("⚠️ Logo {} does not exist, leaving HTML untouched", logo.display());
            }
        }

        persist(&self.output_dir, &code)
            .await
            .map_err(|e| failed(Stage::Persisting, e))?;
        if let Some(logo) = logo_to_copy {
            copy_logo(logo, &self.output_dir)
                .await
                .map_err(|e| failed(Stage::Persisting, e))?;
        }

        let site = GeneratedSite {
            id: Uuid::new_v4(),
            html,
            css: code.css,
            js: code.js,
            saved_directory: self.output_dir.clone(),
            generated_at: Utc::now(),
        };
        info!("✅ Website {} generated in {}", site.id, site.saved_directory.display());
        Ok(site)
    }
}

fn failed(stage: Stage, e: SiteError) -> SiteError {
    error!("❌ Generation failed while {}: {}", stage, e);
    e
}

/// Empty HTML is fatal; empty CSS or JS still makes a usable page.
fn validate(code: ExtractedCode) -> Result<ExtractedCode> {
    if code.html.trim().is_empty() {
        return Err(SiteError::ExtractionEmpty("html"));
    }
    if code.css.trim().is_empty() {
        warn!("⚠️ No CSS found in model response");
    }
    if code.js.trim().is_empty() {
        warn!("⚠️ No JavaScript found in model response");
    }
    Ok(code)
}

/// Writes the three files, replacing whatever a previous run left behind.
pub async fn persist(dir: &Path, code: &ExtractedCode) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(dir.join(HTML_FILE), &code.html).await?;
    tokio::fs::write(dir.join(CSS_FILE), &code.css).await?;
    tokio::fs::write(dir.join(JS_FILE), &code.js).await?;
    info!("💾 Saved {} files to {}", SITE_FILES.len(), dir.display());
    Ok(())
}

/// `data:image/<ext>;base64,...` for the file at `path`.
pub async fn logo_data_uri(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned()).unwrap_or_default();
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:image/{ext};base64,{encoded}"))
}

/// Replaces every literal occurrence of the logo's file name with a data URI.
/// Only works when the model kept the exact file name it was given.
pub async fn inline_logo(html: &str, logo: &Path) -> Result<String> {
    let Some(name) = logo.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return Ok(html.to_string());
    };
    let uri = logo_data_uri(logo).await?;
    let hits = html.matches(name.as_str()).count();
    info!("🖼️ Inlining logo {} ({} references)", name, hits);
    Ok(html.replace(name.as_str(), &uri))
}

/// Site files always win over a logo that shares their name.
async fn copy_logo(logo: &Path, dir: &Path) -> Result<()> {
    if let Some(name) = logo.file_name() {
        if SITE_FILES.iter().any(|f| name == *f) {
            warn!("⚠️ Logo name {} collides with a site file, not copying it", name.to_string_lossy());
            return Ok(());
        }
        let target = dir.join(name);
        if target != logo {
            tokio::fs::copy(logo, target).await?;
        }
    }
    Ok(())
}

/// Single document with the stylesheet and script embedded, for previewing.
pub fn compose_preview(site: &GeneratedSite) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>\n{}\n</style>\n</head>\n<body>\n{}\n<script>\n{}\n</script>\n</body>\n</html>\n",
        site.css, site.html, site.js
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::tests::sweet_rolls;
    use crate::codegen::{build_prompt, ModelProvider};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::TempDir;

    const REPLY: &str = "Plan: a warm hero section.\n\
<!-- HTML START -->\n<header><img src=\"logo.png\" alt=\"Sweet Rolls\"></header>\n<main>Fresh daily</main>\n<!-- HTML END -->\n\
/* CSS START */\nheader { background: #441100; }\n/* CSS END */\n\
// JavaScript START\nconsole.log('ready');\n// JavaScript END\n";

    /// Returns a canned reply and remembers the prompt it was sent.
    struct StubModel {
        reply: std::result::Result<String, u16>,
        prompts: Mutex<Vec<String>>,
    }

    impl StubModel {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self { reply: Ok(reply.to_string()), prompts: Mutex::new(Vec::new()) })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self { reply: Err(status), prompts: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl ModelProvider for StubModel {
        fn name(&self) -> &str { "stub" }

        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(status) => Err(SiteError::Upstream { status: *status, body: "stub".into() }),
            }
        }
    }

    fn generator(model: Arc<StubModel>, dir: &Path) -> SiteGenerator {
        SiteGenerator::new(CodeGenerator::new(model), dir.join("site"))
    }

    async fn read(dir: &Path, name: &str) -> String {
        tokio::fs::read_to_string(dir.join(name)).await.unwrap()
    }

    #[tokio::test]
    async fn sweet_rolls_round_trip() {
        let tmp = TempDir::new().unwrap();
        let model = StubModel::replying(REPLY);
        let site = generator(model.clone(), tmp.path())
            .generate_and_process(sweet_rolls())
            .await
            .unwrap();

        let prompt = model.prompts.lock()[0].clone();
        assert_eq!(prompt, build_prompt(&sweet_rolls()));
        for needle in ["Sweet Rolls", "#441100", "#FFF8E7", "logo.png"] {
            assert!(prompt.contains(needle));
        }

        let out = tmp.path().join("site");
        assert_eq!(site.saved_directory, out);
        assert_eq!(
            read(&out, HTML_FILE).await,
            "<header><img src=\"logo.png\" alt=\"Sweet Rolls\"></header>\n<main>Fresh daily</main>"
        );
        assert_eq!(read(&out, CSS_FILE).await, "header { background: #441100; }");
        assert_eq!(read(&out, JS_FILE).await, "console.log('ready');");
        assert_eq!(site.html, read(&out, HTML_FILE).await);
    }

    #[tokio::test]
    async fn logo_is_inlined_as_data_uri() {
        let tmp = TempDir::new().unwrap();
        let logo = tmp.path().join("logo.png");
        tokio::fs::write(&logo, crate::images::tests::tiny_png()).await.unwrap();

        let mut request = sweet_rolls();
        request.logo_path = Some(logo);

        let site = generator(StubModel::replying(REPLY), tmp.path())
            .generate_and_process(request)
            .await
            .unwrap();

        assert!(site.html.contains("src=\"data:image/png;base64,"));
        assert!(!site.html.contains("logo.png"));

        // The saved page keeps the file reference and the logo sits beside it.
        let out = tmp.path().join("site");
        assert!(read(&out, HTML_FILE).await.contains("src=\"logo.png\""));
        assert!(out.join("logo.png").exists());
    }

    #[tokio::test]
    async fn missing_logo_file_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let mut request = sweet_rolls();
        request.logo_path = Some(tmp.path().join("nope.png"));

        let site = generator(StubModel::replying(REPLY), tmp.path())
            .generate_and_process(request)
            .await
            .unwrap();
        assert!(site.html.contains("src=\"logo.png\""));
    }

    #[tokio::test]
    async fn empty_html_fails_and_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let reply = "/* CSS START */ body {} /* CSS END */";
        let err = generator(StubModel::replying(reply), tmp.path())
            .generate_and_process(sweet_rolls())
            .await
            .unwrap_err();

        assert!(matches!(err, SiteError::ExtractionEmpty("html")));
        assert!(!tmp.path().join("site").exists());
    }

    #[tokio::test]
    async fn empty_css_and_js_are_tolerated() {
        let tmp = TempDir::new().unwrap();
        let site = generator(StubModel::replying("```html\n<p>only markup</p>\n```"), tmp.path())
            .generate_and_process(sweet_rolls())
            .await
            .unwrap();

        assert_eq!(site.html, "<p>only markup</p>");
        assert_eq!(site.css, "");
        assert_eq!(read(&tmp.path().join("site"), JS_FILE).await, "");
    }

    #[tokio::test]
    async fn upstream_failure_propagates() {
        let tmp = TempDir::new().unwrap();
        let err = generator(StubModel::failing(500), tmp.path())
            .generate_and_process(sweet_rolls())
            .await
            .unwrap_err();
        assert!(matches!(err, SiteError::Upstream { status: 500, .. }));
        assert!(!tmp.path().join("site").exists());
    }

    #[tokio::test]
    async fn second_run_overwrites_files() {
        let tmp = TempDir::new().unwrap();
        generator(StubModel::replying(REPLY), tmp.path())
            .generate_and_process(sweet_rolls())
            .await
            .unwrap();
        generator(StubModel::replying("<!-- HTML START -->v2<!-- HTML END -->"), tmp.path())
            .generate_and_process(sweet_rolls())
            .await
            .unwrap();

        let out = tmp.path().join("site");
        assert_eq!(read(&out, HTML_FILE).await, "v2");
        assert_eq!(read(&out, CSS_FILE).await, "");
    }

    #[tokio::test]
    async fn logo_named_like_a_site_file_is_not_copied() {
        let tmp = TempDir::new().unwrap();
        let logo = tmp.path().join(JS_FILE);
        tokio::fs::write(&logo, crate::images::tests::tiny_png()).await.unwrap();

        let mut request = sweet_rolls();
        request.logo_path = Some(logo);

        generator(StubModel::replying(REPLY), tmp.path())
            .generate_and_process(request)
            .await
            .unwrap();
        assert_eq!(read(&tmp.path().join("site"), JS_FILE).await, "console.log('ready');");
    }

    #[tokio::test]
    async fn unreadable_logo_fails_before_writing() {
        let tmp = TempDir::new().unwrap();
        // A directory passes the existence check but cannot be read as a file.
        let logo = tmp.path().join("logo.png");
        tokio::fs::create_dir(&logo).await.unwrap();

        let mut request = sweet_rolls();
        request.logo_path = Some(logo);

        let err = generator(StubModel::replying(REPLY), tmp.path())
            .generate_and_process(request)
            .await
            .unwrap_err();
        assert!(matches!(err, SiteError::Io(_)));
        assert!(!tmp.path().join("site").exists());
    }

    #[tokio::test]
    async fn data_uri_uses_extension_as_subtype() {
        let tmp = TempDir::new().unwrap();
        let logo = tmp.path().join("mark.jpeg");
        tokio::fs::write(&logo, b"abc").await.unwrap();
        assert_eq!(logo_data_uri(&logo).await.unwrap(), "data:image/jpeg;base64,YWJj");
    }

    #[tokio::test]
    async fn inline_logo_replaces_every_occurrence() {
        let tmp = TempDir::new().unwrap();
        let logo = tmp.path().join("logo.png");
        tokio::fs::write(&logo, b"abc").await.unwrap();

        let html = "<img src=\"logo.png\"><link rel=\"icon\" href=\"logo.png\">";
        let out = inline_logo(html, &logo).await.unwrap();
        assert_eq!(out.matches("data:image/png;base64,YWJj").count(), 2);
    }

    #[test]
    fn preview_embeds_all_three_parts() {
        let site = GeneratedSite {
            id: Uuid::nil(),
            html: "<h1>Hi</h1>".into(),
            css: "h1{color:red}".into(),
            js: "alert(1)".into(),
            saved_directory: PathBuf::from("x"),
            generated_at: Utc::now(),
        };
        let page = compose_preview(&site);
        assert!(page.contains("<style>\nh1{color:red}\n</style>"));
        assert!(page.contains("<body>\n<h1>Hi</h1>"));
        assert!(page.contains("<script>\nalert(1)\n</script>"));
    }
}
