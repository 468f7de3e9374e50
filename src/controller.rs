//! The single controller behind every front-end.
//!
//! Each operation turns failures into status lines instead of returning
//! errors, so a front-end only has to render `status()` and the accessors.
//! Generation is the only call that leaves the caller's task: it spawns a
//! worker whose events come back through the receiver handed out by
//! [`Controller::new`] and must be fed to [`Controller::handle_event`].

use std::{path::PathBuf, sync::Arc};
use tokio::sync::mpsc;

use crate::{
    browse::ImageBrowser,
    config::{AppConfig, Credentials, ProviderKind},
    events::GenerationEvent,
    fetch::{inspect, ImageFetcher, ImageInfo},
    io::{image_filename, write_image},
    manifest::{GenerationLog, LogRecord},
    ollama::OllamaClient,
    orchestrator::{spawn_generation, GenerationJob},
    prompts::{assemble_prompt, PromptSource},
    providers::{build_provider, clamp_count, ImageProvider},
    status::StatusLog,
    styles::{resolve_style, StyleCatalog, StyleSelection},
};

/// What produced the images currently being browsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationContext {
    pub phrase: String,
    pub style: String,
    pub prompt: String,
}

pub struct Controller {
    config: AppConfig,
    catalog: StyleCatalog,
    credentials: Credentials,
    provider_kind: ProviderKind,
    provider: Option<Arc<dyn ImageProvider>>,
    ollama: OllamaClient,
    fetcher: ImageFetcher,
    log: GenerationLog,

    models: Vec<String>,
    selected_model: Option<String>,
    style: StyleSelection,
    custom_style: String,
    image_count: u8,

    browser: ImageBrowser,
    current_bytes: Option<Vec<u8>>,
    current_info: Option<ImageInfo>,
    last_generation: Option<GenerationContext>,
    pending_generation: Option<GenerationContext>,
    save_counter: u32,
    generating: bool,

    status: StatusLog,
    events_tx: mpsc::UnboundedSender<GenerationEvent>,
}

impl Controller {
    pub fn new(
        config: AppConfig,
        credentials: Credentials,
    ) -> (Self, mpsc::UnboundedReceiver<GenerationEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let catalog = config.catalog();
        let style = catalog.default_selection(&config.default_style);
        let controller = Self {
            catalog,
            credentials,
            provider_kind: config.provider,
            provider: None,
            ollama: OllamaClient::new(&config.ollama),
            fetcher: ImageFetcher::new(config.fetch_timeout()),
            log: GenerationLog::new(config.log_path()),
            models: Vec::new(),
            selected_model: None,
            style,
            custom_style: String::new(),
            image_count: 1,
            browser: ImageBrowser::default(),
            current_bytes: None,
            current_info: None,
            last_generation: None,
            pending_generation: None,
            save_counter: 1,
            generating: false,
            status: StatusLog::default(),
            events_tx,
            config,
        };
        (controller, events_rx)
    }

    /// Picks up the cookies from the process environment.
    pub fn load_environment(&mut self) {
        let creds = Credentials::from_env();
        if creds.is_complete() {
            self.status.info("Loaded cookies from environment variables");
        } else {
            self.status.info("No environment variables found. Please enter cookies manually.");
        }
        self.set_credentials(creds);
    }

    pub fn set_credentials(&mut self, creds: Credentials) {
        if creds != self.credentials {
            self.provider = None;
        }
        self.credentials = creds;
    }

    /// Replaces the cached provider; the next generation uses it as-is.
    pub fn set_provider(&mut self, provider: Arc<dyn ImageProvider>) {
        self.provider = Some(provider);
    }

    pub fn validate_credentials(&mut self) -> bool {
        if !self.credentials.is_complete() {
            self.status.error("Both U_COOKIE and SRCHHPGUSR are required");
            return false;
        }
        match build_provider(self.provider_kind, &self.credentials, &self.config.bing) {
            Ok(p) => {
                self.provider = Some(p);
                self.status.info("Cookies validated successfully!");
                true
            }
            Err(e) => {
                self.provider = None;
                self.status.error(format!("Cookie validation failed: {e}"));
                false
            }
        }
    }

    pub fn update_environment(&mut self) -> bool {
        if !self.credentials.is_complete() {
            self.status.error("Both U_COOKIE and SRCHHPGUSR are required");
            return false;
        }
        self.credentials.apply_to_env();
        self.status.info("Environment variables updated for this session");
        true
    }

    pub async fn refresh_models(&mut self) {
        match self.ollama.list_models().await {
            Ok(models) => {
                if let Some(sel) = &self.selected_model {
                    if !models.contains(sel) {
                        self.selected_model = None;
                    }
                }
                self.status.info(format!("Found {} Ollama model(s)", models.len()));
                self.models = models;
            }
            Err(e) if e.is_unreachable() => {
                tracing::debug!("ollama unreachable: {e}");
                self.status.info("Ollama not available (optional feature)");
            }
            Err(e) => {
                tracing::debug!("ollama model listing failed: {e}");
                self.status.error("Failed to fetch Ollama models");
            }
        }
    }

    /// `None` selects the direct prompt. Only listed models can be chosen.
    pub fn select_model(&mut self, model: Option<&str>) -> bool {
        let Some(name) = model.map(str::trim) else {
            self.selected_model = None;
            self.status.info("Using direct prompt");
            return true;
        };
        if self.models.iter().any(|m| m == name) {
            self.selected_model = Some(name.to_string());
            self.status.info(format!("Using Ollama model {name}"));
            true
        } else {
            self.status
                .error(format!("Unknown model '{name}'; refresh the model list first"));
            false
        }
    }

    pub fn select_style(&mut self, input: &str) -> bool {
        match self.catalog.parse_selection(input) {
            Some(sel) => {
                self.style = sel;
                true
            }
            None => {
                self.status.error(format!("Unknown style '{}'", input.trim()));
                false
            }
        }
    }

    pub fn set_custom_style(&mut self, text: &str) {
        self.custom_style = text.trim().to_string();
    }

    /// Clamped to 1..=4; returns the value kept.
    pub fn set_image_count(&mut self, count: u8) -> u8 {
        self.image_count = clamp_count(count);
        self.image_count
    }

    pub fn resolved_style(&self) -> String {
        resolve_style(&self.style, &self.custom_style)
    }

    /// Validates input, assembles the prompt and starts the worker.
    /// Returns whether a worker was started.
    pub async fn generate(&mut self, phrase: &str) -> bool {
        let phrase = phrase.trim();
        if phrase.is_empty() {
            self.status.error("Please enter a word or phrase");
            return false;
        }
        if self.provider_kind.requires_credentials() && !self.credentials.is_complete() {
            self.status.error("Please provide valid cookies");
            return false;
        }
        if self.generating {
            self.status.error("A generation is already in progress");
            return false;
        }

        let style = self.resolved_style();
        let assembled =
            assemble_prompt(&self.ollama, phrase, &style, self.selected_model.as_deref()).await;
        match &assembled.source {
            PromptSource::Direct => {}
            PromptSource::Enriched { model } => {
                self.status.info(format!("Generated prompt with {model}"));
            }
            PromptSource::Fallback { reason, .. } => {
                self.status.error(format!("Ollama error: {reason}, using direct prompt"));
            }
        }
        self.status.info(format!("Using prompt: {}", assembled.text));

        let provider = match self.provider.clone() {
            Some(p) => p,
            None => match build_provider(self.provider_kind, &self.credentials, &self.config.bing) {
                Ok(p) => {
                    self.provider = Some(p.clone());
                    p
                }
                Err(e) => {
                    self.status.error(format!("Failed to initialize: {e}"));
                    return false;
                }
            },
        };

        self.pending_generation = Some(GenerationContext {
            phrase: phrase.to_string(),
            style,
            prompt: assembled.text.clone(),
        });
        self.generating = true;
        spawn_generation(
            provider,
            GenerationJob { prompt: assembled.text, count: self.image_count },
            self.events_tx.clone(),
        );
        true
    }

    pub async fn handle_event(&mut self, event: GenerationEvent) {
        match event {
            GenerationEvent::Started { count } => {
                self.status.info(format!("Generating {count} image(s)..."));
            }
            GenerationEvent::Finished { urls } => {
                self.generating = false;
                let ctx = self.pending_generation.take();
                if urls.is_empty() {
                    self.status.error("No images were generated");
                    return;
                }
                self.status.info(format!("Successfully generated {} image(s)", urls.len()));
                self.browser.replace(urls);
                self.last_generation = ctx;
                self.display_current().await;
            }
            GenerationEvent::Failed { error } => {
                self.generating = false;
                self.pending_generation = None;
                self.status.error(format!("Generation failed: {error}"));
            }
        }
    }

    /// Fetches and renders the image under the cursor. On failure the cursor
    /// stays put and nothing is buffered for saving.
    pub async fn display_current(&mut self) {
        let Some(url) = self.browser.current().map(str::to_string) else {
            return;
        };
        self.current_bytes = None;
        self.current_info = None;
        let shown = match self.fetcher.fetch(&url).await {
            Ok(bytes) => inspect(&bytes).map(|info| (bytes, info)),
            Err(e) => Err(e),
        };
        match shown {
            Ok((bytes, info)) => {
                self.status
                    .info(format!("Showing {} ({info})", self.browser.position_label()));
                self.current_bytes = Some(bytes);
                self.current_info = Some(info);
            }
            Err(e) => self.status.error(format!("Failed to load image: {e}")),
        }
    }

    pub async fn show_previous(&mut self) -> bool {
        if !self.browser.previous() {
            return false;
        }
        self.display_current().await;
        true
    }

    pub async fn show_next(&mut self) -> bool {
        if !self.browser.next() {
            return false;
        }
        self.display_current().await;
        true
    }

    /// Saves the displayed image's original bytes and appends a log record.
    pub async fn save_current(&mut self) -> Option<PathBuf> {
        let (Some(url), Some(ctx)) = (
            self.browser.current().map(str::to_string),
            self.last_generation.clone(),
        ) else {
            self.status.error("No image to save");
            return None;
        };

        let bytes = match &self.current_bytes {
            Some(b) => b.clone(),
            None => match self.fetcher.fetch(&url).await {
                Ok(b) => b,
                Err(e) => {
                    self.status.error(format!("Failed to save image: {e}"));
                    return None;
                }
            },
        };

        let filename = image_filename(&ctx.phrase, &ctx.style, self.save_counter);
        let path = match write_image(&self.config.output_dir, &filename, &bytes).await {
            Ok(p) => p,
            Err(e) => {
                self.status.error(format!("Failed to save image: {e:#}"));
                return None;
            }
        };
        self.save_counter += 1;
        self.status.info(format!("Saved: {}", path.display()));

        let record = LogRecord::new(&ctx.phrase, &ctx.style, &ctx.prompt, &filename);
        if let Err(e) = self.log.append(&record).await {
            self.status
                .error(format!("Saved image but failed to update generation log: {e}"));
        }
        Some(path)
    }

    pub fn status(&self) -> &StatusLog {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut StatusLog {
        &mut self.status
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn catalog(&self) -> &StyleCatalog {
        &self.catalog
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn selected_model(&self) -> Option<&str> {
        self.selected_model.as_deref()
    }

    pub fn style_selection(&self) -> &StyleSelection {
        &self.style
    }

    pub fn custom_style(&self) -> &str {
        &self.custom_style
    }

    pub fn image_count(&self) -> u8 {
        self.image_count
    }

    pub fn browser(&self) -> &ImageBrowser {
        &self.browser
    }

    pub fn current_bytes(&self) -> Option<&[u8]> {
        self.current_bytes.as_deref()
    }

    pub fn current_info(&self) -> Option<&ImageInfo> {
        self.current_info.as_ref()
    }

    pub fn last_generation(&self) -> Option<&GenerationContext> {
        self.last_generation.as_ref()
    }

    pub fn save_counter(&self) -> u32 {
        self.save_counter
    }

    /// True while a worker runs; the generate control is disabled.
    pub fn is_generating(&self) -> bool {
        self.generating
    }

    pub fn log(&self) -> &GenerationLog {
        &self.log
    }
}
