use outreach_core::config::PromptLanguage;
use outreach_core::{LeadRecord, LeadStats, Outcome};
use serde::Serialize;

use crate::commands::CallbackAction;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    #[serde(rename = "HTML")]
    Html,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, action: CallbackAction) -> Self {
        Self { text: text.into(), callback_data: action.to_string() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    pub keyboard: Vec<Vec<InlineButton>>,
}

impl MessageTemplate {
    pub fn plain(text: impl Into<String>) -> Self {
        MessageBuilder::plain().line(text).build()
    }
}

pub struct MessageBuilder {
    lines: Vec<String>,
    parse_mode: Option<ParseMode>,
    keyboard: Vec<Vec<InlineButton>>,
}

impl MessageBuilder {
    pub fn plain() -> Self {
        Self { lines: Vec::new(), parse_mode: None, keyboard: Vec::new() }
    }

    /// Lines are sent as HTML; callers escape dynamic values with [`escape_html`].
    pub fn html() -> Self {
        Self { parse_mode: Some(ParseMode::Html), ..Self::plain() }
    }

    pub fn line(mut self, text: impl Into<String>) -> Self {
        self.lines.push(text.into());
        self
    }

    pub fn blank(self) -> Self {
        self.line("")
    }

    pub fn keyboard_row<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut KeyboardRowBuilder),
    {
        let mut builder = KeyboardRowBuilder::default();
        build(&mut builder);
        if !builder.buttons.is_empty() {
            self.keyboard.push(builder.buttons);
        }
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate {
            text: self.lines.join("\n"),
            parse_mode: self.parse_mode,
            keyboard: self.keyboard,
        }
    }
}

#[derive(Default)]
pub struct KeyboardRowBuilder {
    buttons: Vec<InlineButton>,
}

impl KeyboardRowBuilder {
    pub fn button(&mut self, button: InlineButton) -> &mut Self {
        self.buttons.push(button);
        self
    }
}

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    escaped
}

pub fn welcome_message() -> MessageTemplate {
    MessageBuilder::plain()
        .line("Welcome to the Outreach Lead Bot!")
        .blank()
        .line("Commands:")
        .line("/next - Get next lead to process")
        .line("/stats - View statistics")
        .line("/help - Show this help message")
        .build()
}

pub fn help_message() -> MessageTemplate {
    MessageBuilder::plain()
        .line("Outreach Lead Bot Help")
        .blank()
        .line("/next - Get the next lead with empty result")
        .line("/stats - View current statistics")
        .blank()
        .line("When processing a lead:")
        .line("1. Click Successful, Rejected, or Ignored")
        .line("2. For Successful/Rejected, provide a reason (text or voice)")
        .line("3. The result will be saved to the lead sheet")
        .build()
}

pub fn unknown_command_message(name: &str) -> MessageTemplate {
    MessageTemplate::plain(format!("Unknown command /{name}. Use /help to see available commands."))
}

fn or_na(value: Option<&str>) -> String {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => escape_html(value),
        None => "N/A".to_owned(),
    }
}

pub fn lead_card(lead: &LeadRecord) -> MessageTemplate {
    let row = lead.row_index;
    MessageBuilder::html()
        .line(format!("<b>Lead #{}</b>", row.display_number()))
        .blank()
        .line(format!("<b>ID:</b> <code>{}</code>", escape_html(&lead.id)))
        .line(format!("<b>Company:</b> {}", or_na(lead.company.as_deref())))
        .line(format!("<b>Name:</b> {}", or_na(lead.name.as_deref())))
        .line(format!("<b>Original Title:</b> {}", or_na(Some(&lead.original_title))))
        .keyboard_row(|buttons| {
            buttons
                .button(InlineButton::new(
                    "Successful",
                    CallbackAction::result(Outcome::Successful, row),
                ))
                .button(InlineButton::new("Rejected", CallbackAction::result(Outcome::Rejected, row)));
        })
        .keyboard_row(|buttons| {
            buttons.button(InlineButton::new("Ignored", CallbackAction::result(Outcome::Ignored, row)));
        })
        .build()
}

pub fn no_leads_message() -> MessageTemplate {
    MessageTemplate::plain("No more leads to process! All leads have been completed.")
}

/// Lead card text with the chosen outcome appended. Sent without markup since the
/// platform returns the card as plain text.
pub fn card_with_result(card_text: &str, outcome: Outcome) -> MessageTemplate {
    MessageTemplate::plain(format!("{card_text}\n\nResult: {}", outcome.label()))
}

pub fn reason_question(outcome: Outcome, language: PromptLanguage) -> &'static str {
    match (language, outcome) {
        (PromptLanguage::Ru, Outcome::Rejected) => "Что привело к отказу?",
        (PromptLanguage::Ru, _) => "Причина успеха?",
        (PromptLanguage::En, Outcome::Rejected) => "What led to the rejection?",
        (PromptLanguage::En, _) => "What made this a success?",
    }
}

pub fn reason_prompt(action: CallbackAction, language: PromptLanguage) -> MessageTemplate {
    MessageBuilder::plain()
        .line(reason_question(action.outcome, language))
        .blank()
        .line("Please send a text message or voice recording.")
        .keyboard_row(|buttons| {
            buttons.button(InlineButton::new(
                "Skip reason",
                CallbackAction::skip(action.outcome, action.row_index),
            ));
        })
        .build()
}

pub fn reason_skipped_message() -> MessageTemplate {
    MessageTemplate::plain("Reason skipped.")
}

pub fn marked_message(outcome: Outcome) -> MessageTemplate {
    MessageTemplate::plain(format!(
        "Lead marked as {}. Use /next to get the next lead.",
        outcome.token()
    ))
}

pub fn saved_message(outcome: Outcome, reason: &str) -> MessageTemplate {
    MessageBuilder::plain()
        .line("Saved!")
        .line(format!("Result: {}", outcome.token()))
        .line(format!("Reason: {reason}"))
        .blank()
        .line("Use /next to get the next lead.")
        .build()
}

pub fn stats_message(stats: &LeadStats) -> MessageTemplate {
    let mut builder = MessageBuilder::plain()
        .line("Statistics:")
        .blank()
        .line(format!("Total leads: {}", stats.total))
        .line(format!("Completed: {}", stats.completed))
        .line(format!("In progress: {}", stats.in_progress))
        .line(format!("Pending: {}", stats.pending))
        .blank()
        .line(format!("Successful: {}", stats.successful))
        .line(format!("Rejected: {}", stats.rejected))
        .line(format!("Ignored: {}", stats.ignored));
    if stats.unrecognized > 0 {
        builder = builder.line(format!("Unrecognized: {}", stats.unrecognized));
    }
    builder.build()
}

pub fn transcribing_message() -> MessageTemplate {
    MessageTemplate::plain("Transcribing voice message...")
}

pub fn transcribed_message(text: &str) -> MessageTemplate {
    MessageTemplate::plain(format!("Transcribed: \"{text}\""))
}

pub fn unauthorized_message() -> MessageTemplate {
    MessageTemplate::plain("You are not authorized to use this bot.")
}

pub fn no_session_for_voice_message() -> MessageTemplate {
    MessageTemplate::plain("Please use /next to get a lead first.")
}

pub mod failures {
    use super::MessageTemplate;

    pub fn next_lead() -> MessageTemplate {
        MessageTemplate::plain("Error fetching next lead. Please try again.")
    }

    pub fn stats() -> MessageTemplate {
        MessageTemplate::plain("Error fetching statistics. Please try again.")
    }

    pub fn selection() -> MessageTemplate {
        MessageTemplate::plain("Error processing your selection. Please try again with /next")
    }

    pub fn skip() -> MessageTemplate {
        MessageTemplate::plain("Error processing. Please try again with /next")
    }

    pub fn save_reason() -> MessageTemplate {
        MessageTemplate::plain("Error saving to the lead sheet. Please try again.")
    }

    pub fn transcription() -> MessageTemplate {
        MessageTemplate::plain(
            "Error transcribing voice. Please try sending a text message instead.",
        )
    }
}

#[cfg(test)]
mod tests {
    use outreach_core::config::PromptLanguage;
    use outreach_core::{LeadRecord, LeadStats, Outcome, ResultCell, RowIndex};

    use super::{card_with_result, escape_html, lead_card, reason_prompt, stats_message, ParseMode};
    use crate::commands::CallbackAction;

    fn lead() -> LeadRecord {
        LeadRecord {
            row_index: RowIndex::new(5).expect("data row"),
            id: "-100123".to_owned(),
            name: Some("John & Jane".to_owned()),
            company: None,
            original_title: "INACTIVE <John & Jane> #45".to_owned(),
            notes: None,
            result: ResultCell::parse(""),
            completed_by: None,
        }
    }

    #[test]
    fn lead_card_escapes_fields_and_offers_three_outcomes() {
        let card = lead_card(&lead());

        assert_eq!(card.parse_mode, Some(ParseMode::Html));
        assert!(card.text.starts_with("<b>Lead #4</b>"));
        assert!(card.text.contains("<b>Company:</b> N/A"));
        assert!(card.text.contains("<b>Name:</b> John &amp; Jane"));
        assert!(card.text.contains("INACTIVE &lt;John &amp; Jane&gt; #45"));

        let data: Vec<Vec<&str>> = card
            .keyboard
            .iter()
            .map(|row| row.iter().map(|button| button.callback_data.as_str()).collect())
            .collect();
        assert_eq!(
            data,
            vec![vec!["result:successful:5", "result:rejected:5"], vec!["result:ignored:5"]]
        );
    }

    #[test]
    fn reason_prompt_carries_skip_button() {
        let action = CallbackAction::result(Outcome::Rejected, RowIndex::new(9).expect("row"));

        let ru = reason_prompt(action, PromptLanguage::Ru);
        assert!(ru.text.starts_with("Что привело к отказу?"));
        assert_eq!(ru.keyboard[0][0].callback_data, "skip:rejected:9");

        let en = reason_prompt(
            CallbackAction::result(Outcome::Successful, RowIndex::new(9).expect("row")),
            PromptLanguage::En,
        );
        assert!(en.text.starts_with("What made this a success?"));
        assert!(en.parse_mode.is_none());
    }

    #[test]
    fn result_edit_appends_label() {
        let edited = card_with_result("Lead #4\n\nID: -100123", Outcome::Ignored);
        assert_eq!(edited.text, "Lead #4\n\nID: -100123\n\nResult: Ignored");
    }

    #[test]
    fn stats_show_unrecognized_only_when_present() {
        let mut stats = LeadStats { total: 3, pending: 1, completed: 2, ignored: 2, ..LeadStats::default() };
        let text = stats_message(&stats).text;
        assert!(text.contains("Total leads: 3"));
        assert!(text.contains("Ignored: 2"));
        assert!(!text.contains("Unrecognized"));

        stats.unrecognized = 1;
        assert!(stats_message(&stats).text.contains("Unrecognized: 1"));
    }

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(escape_html("a<b>&c"), "a&lt;b&gt;&amp;c");
    }
}
