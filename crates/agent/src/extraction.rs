use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::LlmClient;

pub const DEFAULT_BATCH_SIZE: usize = 40;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedIdentity {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

impl ExtractedIdentity {
    fn normalized(self) -> Self {
        let clean = |value: Option<String>| {
            value.map(|text| text.trim().to_owned()).filter(|text| !text.is_empty())
        };
        Self { name: clean(self.name), company: clean(self.company) }
    }
}

#[derive(Debug, Error)]
pub enum ExtractionBatchError {
    #[error("completion call failed: {0}")]
    Completion(String),
    #[error("completion response contained no JSON array")]
    MissingJson,
    #[error("completion JSON could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Turns raw chat titles into name/company pairs, one completion call per batch.
#[derive(Clone)]
pub struct TitleExtractor {
    llm: Arc<dyn LlmClient>,
}

impl TitleExtractor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Returns exactly `titles.len()` identities; titles the model skipped come back empty.
    pub async fn extract_batch(
        &self,
        titles: &[String],
    ) -> Result<Vec<ExtractedIdentity>, ExtractionBatchError> {
        if titles.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = build_prompt(titles);
        let response = self
            .llm
            .complete(&prompt)
            .await
            .map_err(|error| ExtractionBatchError::Completion(format!("{error:#}")))?;
        parse_identities(&response, titles.len())
    }
}

fn build_prompt(titles: &[String]) -> String {
    let numbered = titles
        .iter()
        .enumerate()
        .map(|(index, title)| format!("{}. {}", index + 1, title))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Each line below is the title of a chat with a prospective client. For every line, \
         extract the person's name and the company name. Keep several people joined with `&` \
         as a single name. Drop status markers, emojis, language tags, unit numbers and \
         parenthesised remarks.\n\n\
         Reply with only a JSON array holding one object per line, in order: \
         [{{\"name\": \"...\", \"company\": \"...\"}}]. Use null for anything missing.\n\n\
         Titles:\n{numbered}"
    )
}

/// Parses the first `[...]` span of `text` and pads or truncates it to `expected` entries.
pub fn parse_identities(
    text: &str,
    expected: usize,
) -> Result<Vec<ExtractedIdentity>, ExtractionBatchError> {
    let start = text.find('[').ok_or(ExtractionBatchError::MissingJson)?;
    let end = text.rfind(']').filter(|end| *end > start).ok_or(ExtractionBatchError::MissingJson)?;

    let entries: Vec<Option<ExtractedIdentity>> = serde_json::from_str(&text[start..=end])?;
    let mut identities: Vec<ExtractedIdentity> =
        entries.into_iter().map(|entry| entry.unwrap_or_default().normalized()).collect();
    identities.resize_with(expected, ExtractedIdentity::default);
    Ok(identities)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use super::{parse_identities, ExtractedIdentity, ExtractionBatchError, TitleExtractor};
    use crate::llm::LlmClient;

    struct FixedReply(&'static str);

    #[async_trait]
    impl LlmClient for FixedReply {
        async fn complete(&self, prompt: &str) -> Result<String> {
            assert!(prompt.contains("1. INACTIVE John & Jane Trucking #45"));
            Ok(self.0.to_owned())
        }
    }

    struct Offline;

    #[async_trait]
    impl LlmClient for Offline {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(anyhow!("connection refused"))
        }
    }

    fn identity(name: Option<&str>, company: Option<&str>) -> ExtractedIdentity {
        ExtractedIdentity { name: name.map(str::to_owned), company: company.map(str::to_owned) }
    }

    #[test]
    fn takes_the_array_out_of_surrounding_prose() {
        let text = "Here you go:\n[{\"name\": \"John & Jane\", \"company\": \"JJ Trucking\"}, \
                    {\"name\": null, \"company\": \"  \"}]\nThanks!";

        let parsed = parse_identities(text, 2).expect("parse");

        assert_eq!(
            parsed,
            vec![identity(Some("John & Jane"), Some("JJ Trucking")), identity(None, None)]
        );
    }

    #[test]
    fn pads_short_and_truncates_long_answers() {
        let short = parse_identities("[{\"name\": \"A\"}]", 3).expect("parse");
        assert_eq!(short.len(), 3);
        assert_eq!(short[2], ExtractedIdentity::default());

        let long = parse_identities("[null, {}, {\"company\": \"C\"}]", 1).expect("parse");
        assert_eq!(long, vec![ExtractedIdentity::default()]);
    }

    #[test]
    fn missing_or_broken_json_is_a_batch_error() {
        assert!(matches!(parse_identities("no idea", 1), Err(ExtractionBatchError::MissingJson)));
        assert!(matches!(parse_identities("[{oops]", 1), Err(ExtractionBatchError::Decode(_))));
    }

    #[tokio::test]
    async fn extracts_one_identity_per_title() {
        let extractor = TitleExtractor::new(Arc::new(FixedReply(
            "[{\"name\": \"John & Jane\", \"company\": \"John & Jane Trucking\"}]",
        )));

        let identities = extractor
            .extract_batch(&["INACTIVE John & Jane Trucking #45".to_owned()])
            .await
            .expect("extract");

        assert_eq!(identities, vec![identity(Some("John & Jane"), Some("John & Jane Trucking"))]);
    }

    #[tokio::test]
    async fn completion_failures_surface_as_batch_errors() {
        let extractor = TitleExtractor::new(Arc::new(Offline));
        let error = extractor.extract_batch(&["x".to_owned()]).await.expect_err("offline");
        assert!(error.to_string().contains("connection refused"));
    }
}
