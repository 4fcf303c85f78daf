use outreach_sheets::LeadRepository;

use super::{load_config, runtime, sheet_repository, CommandResult, EXIT_STORE};

const COMMAND: &str = "stats";

pub fn run() -> CommandResult {
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
        Ok(runtime) => runtime.block_on(execute(&repository)),
        Err(result) => result,
    }
}

pub async fn execute(repository: &dyn LeadRepository) -> CommandResult {
    match repository.compute_stats().await {
        Ok(stats) => CommandResult::success(
            COMMAND,
            format!(
                "total={} completed={} pending={} in_progress={} successful={} rejected={} \
                 ignored={} unrecognized={}",
                stats.total,
                stats.completed,
                stats.pending,
                stats.in_progress,
                stats.successful,
                stats.rejected,
                stats.ignored,
                stats.unrecognized
            ),
        ),
        Err(error) => {
            CommandResult::failure(COMMAND, "store_unavailable", error.to_string(), EXIT_STORE)
        }
    }
}
