use std::path::Path;

use outreach_agent::pipeline::{
    extract_leads, filter_groups, filter_inactive, read_json, write_json, ChatSummary,
};
use outreach_agent::{build_llm_client, TitleExtractor};
use outreach_core::NewLead;
use outreach_sheets::LeadRepository;

use super::{
    load_config, runtime, sheet_repository, CommandResult, EXIT_INPUT, EXIT_LLM, EXIT_STORE,
};

pub fn filter(
    input: &Path,
    output: &Path,
    marker: &str,
    groups_output: Option<&Path>,
) -> CommandResult {
    const COMMAND: &str = "pipeline filter";

    let chats: Vec<ChatSummary> = match read_json(input) {
        Ok(chats) => chats,
        Err(error) => return input_failure(COMMAND, &error),
    };
    let total = chats.len();

    let groups = filter_groups(chats);
    if let Some(path) = groups_output {
        if let Err(error) = write_json(path, &groups) {
            return input_failure(COMMAND, &error);
        }
    }
    let group_count = groups.len();

    let inactive = filter_inactive(groups, marker);
    if let Err(error) = write_json(output, &inactive) {
        return input_failure(COMMAND, &error);
    }

    CommandResult::success(
        COMMAND,
        format!(
            "kept {} of {total} chats ({group_count} groups, marker `{marker}`) -> {}",
            inactive.len(),
            output.display()
        ),
    )
}

pub fn extract(input: &Path, output: &Path, batch_size: Option<usize>) -> CommandResult {
    const COMMAND: &str = "pipeline extract";

    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let llm = match build_llm_client(&config.llm) {
        Ok(llm) => llm,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "llm_configuration",
                format!("{error:#}"),
                EXIT_LLM,
            )
        }
    };
    let extractor = TitleExtractor::new(llm);
    let batch_size = batch_size.unwrap_or(config.llm.batch_size);

    match runtime(COMMAND) {
        Ok(runtime) => runtime.block_on(execute_extract(input, output, &extractor, batch_size)),
        Err(result) => result,
    }
}

pub async fn execute_extract(
    input: &Path,
    output: &Path,
    extractor: &TitleExtractor,
    batch_size: usize,
) -> CommandResult {
    const COMMAND: &str = "pipeline extract";

    let chats: Vec<ChatSummary> = match read_json(input) {
        Ok(chats) => chats,
        Err(error) => return input_failure(COMMAND, &error),
    };

    let report = extract_leads(&chats, extractor, batch_size).await;
    if let Err(error) = write_json(output, &report.leads) {
        return input_failure(COMMAND, &error);
    }

    CommandResult::success(
        COMMAND,
        format!(
            "extracted {} leads in {} batches ({} failed) -> {}",
            report.leads.len(),
            report.batches,
            report.failed_batches,
            output.display()
        ),
    )
}

pub fn import(input: &Path) -> CommandResult {
    const COMMAND: &str = "pipeline import";

    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let repository = match sheet_repository(&config) {
        Ok(repository) => repository,
        Err(error) => {
            return CommandResult::failure(COMMAND, "store_unavailable", error.to_string(), EXIT_STORE)
        }
    };

    match runtime(COMMAND) {
        Ok(runtime) => runtime.block_on(execute_import(input, &repository)),
        Err(result) => result,
    }
}

pub async fn execute_import(input: &Path, repository: &dyn LeadRepository) -> CommandResult {
    const COMMAND: &str = "pipeline import";

    let leads: Vec<NewLead> = match read_json(input) {
        Ok(leads) => leads,
        Err(error) => return input_failure(COMMAND, &error),
    };

    match repository.append_leads(&leads).await {
        Ok(rows) => {
            let span = match (rows.first(), rows.last()) {
                (Some(first), Some(last)) => format!(" at rows {first}..={last}"),
                _ => String::new(),
            };
            CommandResult::success(COMMAND, format!("imported {} leads{span}", rows.len()))
        }
        Err(error) => {
            CommandResult::failure(COMMAND, "store_unavailable", error.to_string(), EXIT_STORE)
        }
    }
}

fn input_failure(command: &str, error: &anyhow::Error) -> CommandResult {
    CommandResult::failure(command, "input", format!("{error:#}"), EXIT_INPUT)
}
