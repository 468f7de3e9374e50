use std::{future::Future, pin::Pin};

use crate::ollama::OllamaError;

/// Anything that can turn an instruction into a prompt with a named model.
pub trait PromptEnricher: Send + Sync {
    fn enrich<'a>(
        &'a self,
        model: &'a str,
        instruction: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, OllamaError>> + Send + 'a>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptSource {
    Direct,
    Enriched { model: String },
    /// Enrichment was requested but failed; the text is the direct form.
    Fallback { model: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPrompt {
    pub text: String,
    pub source: PromptSource,
}

pub fn direct_prompt(phrase: &str, style: &str) -> String {
    format!("{phrase}, {style}")
}

pub fn enrichment_instruction(phrase: &str, style: &str) -> String {
    format!(
        "Create a detailed image generation prompt for: '{phrase}' in {style} style. Only respond with the prompt, no explanations."
    )
}

/// One attempt at enrichment when a model is given; any failure yields the
/// direct `"<phrase>, <style>"` form.
pub async fn assemble_prompt(
    enricher: &dyn PromptEnricher,
    phrase: &str,
    style: &str,
    model: Option<&str>,
) -> AssembledPrompt {
    let Some(model) = model else {
        return AssembledPrompt { text: direct_prompt(phrase, style), source: PromptSource::Direct };
    };

    let instruction = enrichment_instruction(phrase, style);
    match enricher.enrich(model, &instruction).await {
        Ok(text) => AssembledPrompt {
            text,
            source: PromptSource::Enriched { model: model.to_string() },
        },
        Err(e) => {
            tracing::warn!(model, "enrichment failed: {e}");
            AssembledPrompt {
                text: direct_prompt(phrase, style),
                source: PromptSource::Fallback { model: model.to_string(), reason: e.to_string() },
            }
        }
    }
}
