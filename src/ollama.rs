use serde::{Deserialize, Serialize};
use std::{future::Future, pin::Pin, time::Duration};

use crate::config::OllamaCfg;
use crate::prompts::PromptEnricher;

#[derive(Debug, thiserror::Error)]
pub enum OllamaError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {0}")]
    Status(reqwest::StatusCode),
    #[error("model returned an empty response")]
    EmptyResponse,
}

impl OllamaError {
    /// Nothing Ollama-shaped answered: no connection, no reply in time, or a
    /// reply that is not the expected JSON. A non-success status is not this.
    pub fn is_unreachable(&self) -> bool {
        match self {
            OllamaError::Transport(e) => {
                e.is_connect() || e.is_timeout() || e.is_request() || e.is_decode()
            }
            _ => false,
        }
    }
}

#[derive(Deserialize)]
struct TagsResp {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

#[derive(Serialize)]
struct GenerateReq<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResp {
    #[serde(default)]
    response: String,
}

/// Client for a local Ollama server.
pub struct OllamaClient {
    client: reqwest::Client,
    host: String,
    list_timeout: Duration,
    generate_timeout: Duration,
}

impl OllamaClient {
    pub fn new(cfg: &OllamaCfg) -> Self {
        Self {
            client: reqwest::Client::new(),
            host: normalize_host(&cfg.host),
            list_timeout: Duration::from_secs(cfg.list_timeout_secs),
            generate_timeout: Duration::from_secs(cfg.generate_timeout_secs),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub async fn list_models(&self) -> Result<Vec<String>, OllamaError> {
        let url = format!("{}/api/tags", self.host);
        tracing::debug!("listing models from {url}");
        let resp = self.client.get(&url).timeout(self.list_timeout).send().await?;
        if !resp.status().is_success() {
            return Err(OllamaError::Status(resp.status()));
        }
        let tags: TagsResp = resp.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Single non-streaming completion; the answer comes back trimmed.
    pub async fn generate(&self, model: &str, prompt: &str) -> Result<String, OllamaError> {
        let url = format!("{}/api/generate", self.host);
        let req = GenerateReq { model, prompt, stream: false };
        let resp = self
            .client
            .post(&url)
            .timeout(self.generate_timeout)
            .json(&req)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(OllamaError::Status(resp.status()));
        }
        let body: GenerateResp = resp.json().await?;
        let text = body.response.trim();
        if text.is_empty() {
            return Err(OllamaError::EmptyResponse);
        }
        Ok(text.to_string())
    }
}

impl PromptEnricher for OllamaClient {
    fn enrich<'a>(
        &'a self,
        model: &'a str,
        instruction: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, OllamaError>> + Send + 'a>> {
        Box::pin(self.generate(model, instruction))
    }
}

/// `localhost:11434` -> `http://localhost:11434`; trailing slashes dropped.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}
