//! Component E — Translator.
//!
//! A small tagged variant over two backends sharing one operation set,
//! rather than an open trait hierarchy: each variant owns its own state
//! (inter-call delay, usage counters) and the orchestrator only ever talks
//! to `Translator`.

mod google;
mod llm;

use crate::config::{AppSettings, TranslatorKind};
use crate::entities::TranslatorUsage;

pub use google::GoogleTranslator;
pub use llm::LlmTranslator;

/// Expands a BCP-47-ish language code into the display name an LLM prompt
/// expects; unknown codes and the empty string pass through unchanged
/// except `""`, which becomes `auto-detect`.
pub fn expand_language(code: &str) -> String {
    match code {
        "" => "auto-detect".to_string(),
        "zh-CN" => "Simplified Chinese".to_string(),
        "zh-TW" => "Traditional Chinese".to_string(),
        "ja" => "Japanese".to_string(),
        "ko" => "Korean".to_string(),
        "fr" => "French".to_string(),
        "de" => "German".to_string(),
        "es" => "Spanish".to_string(),
        "en" => "English".to_string(),
        other => other.to_string(),
    }
}

pub enum Translator {
    Google(GoogleTranslator),
    Llm(LlmTranslator),
}

impl Translator {
    pub fn from_settings(settings: &AppSettings) -> Self {
        match settings.translator_type {
            TranslatorKind::Google => Translator::Google(GoogleTranslator::new()),
            TranslatorKind::Llm => Translator::Llm(LlmTranslator::from_settings(settings)),
        }
    }

    pub async fn translate_batch(
        &mut self,
        texts: &[String],
        from: &str,
        to: &str,
    ) -> anyhow::Result<Vec<String>> {
        match self {
            Translator::Google(t) => t.translate_batch(texts, from, to).await,
            Translator::Llm(t) => t.translate_batch(texts, from, to).await,
        }
    }

    /// Translates a single text. A thin wrapper over [`Translator::translate_batch`]
    /// with a one-element input, so both backends share one code path.
    pub async fn translate(&mut self, text: &str, from: &str, to: &str) -> anyhow::Result<String> {
        let texts = vec![text.to_string()];
        let mut results = self.translate_batch(&texts, from, to).await?;
        Ok(results.pop().unwrap_or_else(|| text.to_string()))
    }

    pub fn usage(&self) -> TranslatorUsage {
        match self {
            Translator::Google(t) => t.usage(),
            Translator::Llm(t) => t.usage(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_language_known_codes() {
        assert_eq!(expand_language("ja"), "Japanese");
        assert_eq!(expand_language("zh-CN"), "Simplified Chinese");
        assert_eq!(expand_language(""), "auto-detect");
    }

    #[test]
    fn expand_language_unknown_passes_through() {
        assert_eq!(expand_language("xx-YY"), "xx-YY");
    }
}
