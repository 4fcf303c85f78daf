//! Upstream lead generation: exported chat list -> groups -> inactive groups -> leads.

use std::path::Path;

use anyhow::{Context, Result};
use outreach_core::NewLead;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::extraction::{ExtractedIdentity, TitleExtractor};

pub const DEFAULT_INACTIVE_MARKER: &str = "inactive";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    User,
    Group,
    Channel,
    #[serde(other)]
    Unknown,
}

/// One entry of the exported chat list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ChatKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread_count: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    pub leads: Vec<NewLead>,
    pub batches: usize,
    pub failed_batches: usize,
}

pub fn filter_groups(chats: Vec<ChatSummary>) -> Vec<ChatSummary> {
    chats.into_iter().filter(|chat| matches!(chat.kind, ChatKind::Group | ChatKind::Channel)).collect()
}

/// Keeps chats whose title contains `marker`, ignoring case.
pub fn filter_inactive(chats: Vec<ChatSummary>, marker: &str) -> Vec<ChatSummary> {
    let marker = marker.to_lowercase();
    chats.into_iter().filter(|chat| chat.title.to_lowercase().contains(&marker)).collect()
}

/// Runs extraction batch by batch. A failed batch is logged and its leads keep empty
/// name and company; the run carries on.
pub async fn extract_leads(
    chats: &[ChatSummary],
    extractor: &TitleExtractor,
    batch_size: usize,
) -> ExtractionReport {
    let batch_size = batch_size.max(1);
    let total_batches = chats.len().div_ceil(batch_size);
    let mut report = ExtractionReport::default();

    for (number, batch) in chats.chunks(batch_size).enumerate() {
        let titles: Vec<String> = batch.iter().map(|chat| chat.title.clone()).collect();
        let identities = match extractor.extract_batch(&titles).await {
            Ok(identities) => {
                info!(
                    event_name = "pipeline.extraction.batch_completed",
                    batch = number + 1,
                    total_batches,
                    size = batch.len(),
                    "extraction batch completed"
                );
                identities
            }
            Err(error) => {
                warn!(
                    event_name = "pipeline.extraction.batch_failed",
                    batch = number + 1,
                    total_batches,
                    size = batch.len(),
                    error = %error,
                    "extraction batch failed; recording empty identities"
                );
                report.failed_batches += 1;
                vec![ExtractedIdentity::default(); batch.len()]
            }
        };

        report.leads.extend(batch.iter().zip(identities).map(|(chat, identity)| NewLead {
            id: chat.id.clone(),
            name: identity.name,
            company: identity.company,
            title: chat.title.clone(),
        }));
        report.batches += 1;
    }

    report
}

pub fn read_json<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("could not read `{}`", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("could not parse `{}`", path.display()))
}

pub fn write_json<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let rendered = serde_json::to_string_pretty(value)?;
    std::fs::write(path, rendered).with_context(|| format!("could not write `{}`", path.display()))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use outreach_core::NewLead;
    use tempfile::TempDir;

    use super::{
        extract_leads, filter_groups, filter_inactive, read_json, write_json, ChatKind,
        ChatSummary, DEFAULT_INACTIVE_MARKER,
    };
    use crate::extraction::TitleExtractor;
    use crate::llm::LlmClient;

    fn chat(id: &str, title: &str, kind: ChatKind) -> ChatSummary {
        ChatSummary { id: id.to_owned(), title: title.to_owned(), kind, unread_count: None }
    }

    /// Fails the second call, answers every other call with one identity per numbered line.
    struct FlakyExtractor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for FlakyExtractor {
        async fn complete(&self, prompt: &str) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 1 {
                return Err(anyhow!("rate limited"));
            }
            let lines = prompt
                .lines()
                .filter(|line| line.split_once(". ").is_some_and(|(n, _)| n.parse::<u32>().is_ok()))
                .count();
            let entries = vec![r#"{"name": "N", "company": "C"}"#; lines].join(",");
            Ok(format!("[{entries}]"))
        }
    }

    #[test]
    fn keeps_only_groups_and_channels() {
        let chats = vec![
            chat("1", "Alice", ChatKind::User),
            chat("-2", "Drivers", ChatKind::Group),
            chat("-3", "News", ChatKind::Channel),
            chat("4", "???", ChatKind::Unknown),
        ];

        let ids: Vec<String> = filter_groups(chats).into_iter().map(|chat| chat.id).collect();
        assert_eq!(ids, vec!["-2", "-3"]);
    }

    #[test]
    fn inactive_filter_is_case_insensitive_substring() {
        let chats = vec![
            chat("-1", "INACTIVE John & Jane Trucking #45", ChatKind::Group),
            chat("-2", "Just chatting", ChatKind::Group),
            chat("-3", "(Inactive) Bob", ChatKind::Channel),
        ];

        let titles: Vec<String> = filter_inactive(chats, DEFAULT_INACTIVE_MARKER)
            .into_iter()
            .map(|chat| chat.title)
            .collect();
        assert_eq!(titles, vec!["INACTIVE John & Jane Trucking #45", "(Inactive) Bob"]);
    }

    #[test]
    fn end_to_end_title_filter_keeps_first() {
        let chats = vec![
            chat("-1", "INACTIVE John & Jane Trucking #45", ChatKind::Group),
            chat("-2", "Just chatting", ChatKind::Group),
        ];
        let kept = filter_inactive(filter_groups(chats), "inactive");
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "-1");
    }

    #[tokio::test]
    async fn failed_batch_degrades_to_empty_identities() {
        let extractor =
            TitleExtractor::new(Arc::new(FlakyExtractor { calls: AtomicUsize::new(0) }));
        let chats: Vec<ChatSummary> = (0..5)
            .map(|index| chat(&format!("-{index}"), &format!("inactive {index}"), ChatKind::Group))
            .collect();

        let report = extract_leads(&chats, &extractor, 2).await;

        assert_eq!(report.batches, 3);
        assert_eq!(report.failed_batches, 1);
        assert_eq!(report.leads.len(), 5);
        assert_eq!(report.leads[0].name.as_deref(), Some("N"));
        assert_eq!(report.leads[2].name, None);
        assert_eq!(report.leads[3].company, None);
        assert_eq!(report.leads[4].company.as_deref(), Some("C"));
        assert_eq!(report.leads[3].title, "inactive 3");
    }

    #[test]
    fn chats_and_leads_round_trip_through_files() {
        let dir = TempDir::new().expect("temp dir");
        let chats_path = dir.path().join("chats.json");
        std::fs::write(
            &chats_path,
            r#"[{"id": "-100", "title": "INACTIVE Acme", "type": "group", "unreadCount": 3},
                {"id": "5", "title": "Bob", "type": "bot"}]"#,
        )
        .expect("write chats");

        let chats: Vec<ChatSummary> = read_json(&chats_path).expect("read chats");
        assert_eq!(chats[0].unread_count, Some(3));
        assert_eq!(chats[1].kind, ChatKind::Unknown);

        let leads_path = dir.path().join("leads.json");
        let leads = vec![NewLead {
            id: "-100".to_owned(),
            name: None,
            company: Some("Acme".to_owned()),
            title: "INACTIVE Acme".to_owned(),
        }];
        write_json(&leads_path, &leads).expect("write leads");
        let raw = std::fs::read_to_string(&leads_path).expect("read leads");
        assert!(raw.contains("\"name\": null"));
        let back: Vec<NewLead> = read_json(&leads_path).expect("parse leads");
        assert_eq!(back, leads);
    }
}
