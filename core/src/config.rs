//! `AppSettings`: the one piece of the desktop shell's persisted settings the
//! pipeline actually reads. Unknown keys are ignored by serde's default
//! behavior; missing keys fall back to `Default`.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslatorKind {
    Google,
    Llm,
}

impl Default for TranslatorKind {
    fn default() -> Self {
        TranslatorKind::Google
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSettings {
    pub translator_type: TranslatorKind,
    pub target_language: TargetLanguage,
    pub llm_provider: String,
    pub llm_model: String,
    pub llm_api_token: String,
    pub llm_base_url: String,
    pub custom_prompt: String,
}

/// `targetLanguage` always has a sensible fallback even when the settings
/// file omits it entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetLanguage(pub String);

impl Default for TargetLanguage {
    fn default() -> Self {
        TargetLanguage("en".to_string())
    }
}

impl AppSettings {
    /// Parses a TOML settings document. Unknown keys are ignored by serde;
    /// this only rejects genuinely malformed TOML or an invalid
    /// `translatorType`/`llmModel` combination.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let settings: AppSettings =
            toml::from_str(s).map_err(|e| PipelineError::ConfigInvalid(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.translator_type == TranslatorKind::Llm && self.llm_model.trim().is_empty() {
            return Err(PipelineError::ConfigInvalid(
                "llmModel is required when translatorType = llm".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let settings = AppSettings::from_toml_str("").unwrap();
        assert_eq!(settings.translator_type, TranslatorKind::Google);
        assert_eq!(settings.target_language.0, "en");
        assert_eq!(settings.custom_prompt, "");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let settings = AppSettings::from_toml_str(
            r#"
            targetLanguage = "ja"
            somethingUnrecognized = true
            "#,
        )
        .unwrap();
        assert_eq!(settings.target_language.0, "ja");
    }

    #[test]
    fn llm_without_model_is_invalid() {
        let err = AppSettings::from_toml_str(
            r#"
            translatorType = "llm"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::ConfigInvalid(_)));
    }

    #[test]
    fn llm_with_model_is_valid() {
        let settings = AppSettings::from_toml_str(
            r#"
            translatorType = "llm"
            llmModel = "gpt-4o-mini"
            "#,
        )
        .unwrap();
        assert_eq!(settings.translator_type, TranslatorKind::Llm);
    }
}
