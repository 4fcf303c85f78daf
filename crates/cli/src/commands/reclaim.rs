use chrono::Utc;
use outreach_sheets::LeadRepository;

use super::{load_config, runtime, sheet_repository, CommandResult, EXIT_STORE};

const COMMAND: &str = "reclaim";

pub fn run() -> CommandResult {
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(result) => return result,
    };
    if config.queue.reclaim_after_secs.is_none() {
        return CommandResult::success(
            COMMAND,
            "reclaim disabled (queue.reclaim_after_secs unset); nothing to do",
        );
    }
    let repository = match sheet_repository(&config) {
        Ok(repository) => repository,
        Err(error) => {
            return CommandResult::failure(COMMAND, "store_unavailable", error.to_string(), EXIT_STORE)
        }
    };
    match runtime(COMMAND) {
        Ok(runtime) => runtime.block_on(execute(&repository)),
        Err(result) => result,
    }
}

pub async fn execute(repository: &dyn LeadRepository) -> CommandResult {
    match repository.reclaim_stale(Utc::now()).await {
        Ok(rows) if rows.is_empty() => CommandResult::success(COMMAND, "no stale claims"),
        Ok(rows) => {
            let listed = rows.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
            CommandResult::success(
                COMMAND,
                format!("returned {} stale claims to the queue: rows {listed}", rows.len()),
            )
        }
        Err(error) => {
            CommandResult::failure(COMMAND, "store_unavailable", error.to_string(), EXIT_STORE)
        }
    }
}
