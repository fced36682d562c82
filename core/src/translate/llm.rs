//! LLM translator variant: a bounded worker pool draining a shared atomic
//! cursor into a shared, pre-sized output array. No locking beyond the
//! cursor: each worker claims an index, computes independently, and writes
//! into its own slot.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::config::AppSettings;
use crate::entities::TranslatorUsage;

use super::expand_language;

const WORKER_POOL_SIZE: usize = 5;
const TEMPERATURE: f32 = 0.3;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a professional translator. Translate the following text accurately and naturally. Output only the translated text, nothing else. Preserve any formatting, numbers, and special characters.";

pub struct LlmTranslator {
    client: reqwest::Client,
    provider: String,
    model: String,
    api_token: String,
    base_url: String,
    system_prompt: String,
    input_tokens: Arc<AtomicU64>,
    output_tokens: Arc<AtomicU64>,
    /// Accumulated in micro-dollars (USD * 1e6) so it can live in an
    /// `AtomicU64`; divided back down to dollars in [`LlmTranslator::usage`].
    total_cost_micros: Arc<AtomicU64>,
}

/// Cost per 1M tokens (input, output), in USD. Unrecognized models fall back
/// to a conservative flat rate rather than reporting zero cost.
fn cost_per_million(model: &str) -> (f64, f64) {
    match model.to_lowercase().as_str() {
        "gpt-4o" => (2.50, 10.00),
        "gpt-4o-mini" => (0.15, 0.60),
        "o1" => (15.00, 60.00),
        _ => (1.00, 3.00),
    }
}

impl LlmTranslator {
    pub fn from_settings(settings: &AppSettings) -> Self {
        let system_prompt = if settings.custom_prompt.trim().is_empty() {
            DEFAULT_SYSTEM_PROMPT.to_string()
        } else {
            settings.custom_prompt.clone()
        };
        Self {
            client: reqwest::Client::new(),
            provider: settings.llm_provider.clone(),
            model: settings.llm_model.clone(),
            api_token: settings.llm_api_token.clone(),
            base_url: settings.llm_base_url.clone(),
            system_prompt,
            input_tokens: Arc::new(AtomicU64::new(0)),
            output_tokens: Arc::new(AtomicU64::new(0)),
            total_cost_micros: Arc::new(AtomicU64::new(0)),
        }
    }

    #[instrument(skip(self, texts), fields(provider = %self.provider, model = %self.model))]
    pub async fn translate_batch(
        &mut self,
        texts: &[String],
        from: &str,
        to: &str,
    ) -> anyhow::Result<Vec<String>> {
        self.input_tokens.store(0, Ordering::SeqCst);
        self.output_tokens.store(0, Ordering::SeqCst);
        self.total_cost_micros.store(0, Ordering::SeqCst);

        let from_label = expand_language(from);
        let to_label = expand_language(to);
        let cursor = Arc::new(AtomicUsize::new(0));
        let results: Arc<Mutex<Vec<Option<String>>>> = Arc::new(Mutex::new(vec![None; texts.len()]));

        let mut workers = Vec::with_capacity(WORKER_POOL_SIZE);
        for _ in 0..WORKER_POOL_SIZE.min(texts.len().max(1)) {
            let cursor = cursor.clone();
            let results = results.clone();
            let texts = texts.to_vec();
            let from_label = from_label.clone();
            let to_label = to_label.clone();
            let client = self.client.clone();
            let base_url = self.base_url.clone();
            let api_token = self.api_token.clone();
            let model = self.model.clone();
            let system_prompt = self.system_prompt.clone();
            let input_tokens = self.input_tokens.clone();
            let output_tokens = self.output_tokens.clone();
            let total_cost_micros = self.total_cost_micros.clone();

            workers.push(tokio::spawn(async move {
                loop {
                    let idx = cursor.fetch_add(1, Ordering::SeqCst);
                    if idx >= texts.len() {
                        break;
                    }
                    let translated = complete_one(
                        &client,
                        &base_url,
                        &api_token,
                        &model,
                        &system_prompt,
                        &from_label,
                        &to_label,
                        &texts[idx],
                        &input_tokens,
                        &output_tokens,
                        &total_cost_micros,
                    )
                    .await?;
                    results.lock().await[idx] = Some(translated);
                }
                Ok::<(), anyhow::Error>(())
            }));
        }

        for worker in workers {
            worker.await??;
        }

        let results = Arc::try_unwrap(results)
            .map_err(|_| anyhow::anyhow!("translator worker still holds a reference"))?
            .into_inner();
        results
            .into_iter()
            .map(|r| r.ok_or_else(|| anyhow::anyhow!("translation slot left unfilled")))
            .collect()
    }

    pub fn usage(&self) -> TranslatorUsage {
        TranslatorUsage {
            input_tokens: self.input_tokens.load(Ordering::SeqCst),
            output_tokens: self.output_tokens.load(Ordering::SeqCst),
            total_cost: self.total_cost_micros.load(Ordering::SeqCst) as f64 / 1_000_000.0,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[allow(clippy::too_many_arguments)]
async fn complete_one(
    client: &reqwest::Client,
    base_url: &str,
    api_token: &str,
    model: &str,
    system_prompt: &str,
    from_label: &str,
    to_label: &str,
    text: &str,
    input_tokens: &AtomicU64,
    output_tokens: &AtomicU64,
    total_cost_micros: &AtomicU64,
) -> anyhow::Result<String> {
    let user_turn = format!("Translate from {from_label} to {to_label}:\n\n{text}");
    let request = ChatRequest {
        model,
        temperature: TEMPERATURE,
        messages: vec![
            ChatMessage {
                role: "system",
                content: system_prompt.to_string(),
            },
            ChatMessage {
                role: "user",
                content: user_turn,
            },
        ],
    };

    let response = client
        .post(format!("{base_url}/chat/completions"))
        .bearer_auth(api_token)
        .json(&request)
        .send()
        .await?
        .error_for_status()?
        .json::<ChatResponse>()
        .await?;

    if let Some(usage) = &response.usage {
        input_tokens.fetch_add(usage.prompt_tokens, Ordering::SeqCst);
        output_tokens.fetch_add(usage.completion_tokens, Ordering::SeqCst);

        let (input_rate, output_rate) = cost_per_million(model);
        let cost_usd = (usage.prompt_tokens as f64 * input_rate / 1_000_000.0)
            + (usage.completion_tokens as f64 * output_rate / 1_000_000.0);
        total_cost_micros.fetch_add((cost_usd * 1_000_000.0).round() as u64, Ordering::SeqCst);
    }

    let translated = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_else(|| text.to_string());
    Ok(translated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_system_prompt_is_used_when_custom_is_blank() {
        let settings = AppSettings::default();
        let translator = LlmTranslator::from_settings(&settings);
        assert_eq!(translator.system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn custom_prompt_overrides_default() {
        let mut settings = AppSettings::default();
        settings.custom_prompt = "Be terse.".to_string();
        let translator = LlmTranslator::from_settings(&settings);
        assert_eq!(translator.system_prompt, "Be terse.");
    }

    #[test]
    fn usage_starts_at_zero() {
        let settings = AppSettings::default();
        let translator = LlmTranslator::from_settings(&settings);
        let usage = translator.usage();
        assert_eq!(usage.input_tokens, 0);
        assert_eq!(usage.output_tokens, 0);
        assert_eq!(usage.total_cost, 0.0);
    }

    #[test]
    fn cost_per_million_known_and_unknown_models() {
        assert_eq!(cost_per_million("gpt-4o"), (2.50, 10.00));
        assert_eq!(cost_per_million("GPT-4O-MINI"), (0.15, 0.60));
        assert_eq!(cost_per_million("some-unlisted-model"), (1.00, 3.00));
    }
}
