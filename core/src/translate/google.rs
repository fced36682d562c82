//! Free-web translator variant: sequential, rate-limited, no usage accounting.

use std::time::Duration;

use tracing::instrument;

use crate::entities::TranslatorUsage;

const INTER_CALL_DELAY: Duration = Duration::from_millis(100);

pub struct GoogleTranslator {
    client: reqwest::Client,
}

impl GoogleTranslator {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    #[instrument(skip(self, texts))]
    pub async fn translate_batch(
        &mut self,
        texts: &[String],
        from: &str,
        to: &str,
    ) -> anyhow::Result<Vec<String>> {
        let mut out = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(INTER_CALL_DELAY).await;
            }
            out.push(self.translate_one(text, from, to).await?);
        }
        Ok(out)
    }

    async fn translate_one(&self, text: &str, from: &str, to: &str) -> anyhow::Result<String> {
        let src = if from.is_empty() { "auto" } else { from };
        let response = self
            .client
            .get("https://translate.googleapis.com/translate_a/single")
            .query(&[
                ("client", "gtx"),
                ("sl", src),
                ("tl", to),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?
            .error_for_status()?;
        let body: serde_json::Value = response.json().await?;
        let translated = body
            .get(0)
            .and_then(|sentences| sentences.as_array())
            .map(|sentences| {
                sentences
                    .iter()
                    .filter_map(|s| s.get(0).and_then(|t| t.as_str()))
                    .collect::<String>()
            })
            .unwrap_or_else(|| text.to_string());
        Ok(translated)
    }

    pub fn usage(&self) -> TranslatorUsage {
        TranslatorUsage::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_is_always_zero() {
        let t = GoogleTranslator::new();
        let usage = t.usage();
        assert_eq!(usage.input_tokens, 0);
        assert_eq!(usage.output_tokens, 0);
        assert_eq!(usage.total_cost, 0.0);
    }
}
