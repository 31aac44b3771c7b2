//! Operator command-line runner.
//!
//! Thin wrapper over the command surface for driving syncs and migrations
//! without the admin layer: `sync_cli full-sync`, `sync_cli stage 2`,
//! `sync_cli migrate to-local`, etc. Output is the JSON envelope of the
//! invoked command.

use anyhow::{bail, Context, Result};
use serde::Serialize;

use case_gallery_sync::application::AppState;
use case_gallery_sync::commands;
use case_gallery_sync::domain::migration::{CleanupPolicy, MigrationOptions, MigrationType};
use case_gallery_sync::infrastructure::config::ConfigManager;
use case_gallery_sync::infrastructure::logging::init_logging;

fn print_envelope<T: Serialize>(envelope: &commands::ApiResponse<T>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(envelope)?);
    if envelope.success {
        Ok(())
    } else {
        bail!("command failed")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ConfigManager::new()?.load()?;
    init_logging(&config.logging)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("help");

    if command == "help" {
        print_usage();
        return Ok(());
    }

    let state = AppState::initialize(config).await?;

    match command {
        "stage" => {
            let stage: u8 = args
                .get(1)
                .context("usage: sync_cli stage <1|2|3>")?
                .parse()
                .context("stage must be a number")?;
            print_envelope(&commands::start_stage(&state, stage).await)
        }
        "full-sync" => print_envelope(&commands::run_full_sync(&state).await),
        "progress" => print_envelope(&commands::get_progress(&state).await),
        "stop" => print_envelope(&commands::request_stop(&state).await),
        "delete-artifact" => {
            let kind = args
                .get(1)
                .context("usage: sync_cli delete-artifact <sync_data|manifest|stage3_summary>")?;
            print_envelope(&commands::delete_artifact(&state, kind).await)
        }
        "migrate" => {
            let direction = match args.get(1).map(String::as_str) {
                Some("to-local") => MigrationType::ToLocal,
                Some("to-api") => MigrationType::ToApi,
                _ => bail!("usage: sync_cli migrate <to-local|to-api> [archive|hide|delete]"),
            };
            let mut options = MigrationOptions::default();
            if let Some(policy) = args.get(2) {
                options.cleanup = match policy.as_str() {
                    "archive" => CleanupPolicy::Archive,
                    "hide" => CleanupPolicy::Hide,
                    "delete" => {
                        options.preserve_data = false;
                        CleanupPolicy::Delete
                    }
                    other => bail!("unknown cleanup policy '{other}'"),
                };
            }
            print_envelope(&commands::migrate(&state, direction, &options).await)
        }
        "rollback" => print_envelope(&commands::rollback(&state).await),
        "validate" => print_envelope(&commands::validate(&state).await),
        "repair" => print_envelope(&commands::repair_data(&state).await),
        "export" => print_envelope(&commands::export_data(&state).await),
        "import" => {
            let path = args.get(1).context("usage: sync_cli import <file.json>")?;
            let body = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {path}"))?;
            let doc: serde_json::Value =
                serde_json::from_str(&body).context("import file is not valid JSON")?;
            print_envelope(&commands::import_data(&state, &doc).await)
        }
        other => {
            print_usage();
            bail!("unknown command '{other}'")
        }
    }
}

fn print_usage() {
    eprintln!(
        "usage: sync_cli <command>\n\
         \n\
         commands:\n\
         \u{20}  stage <1|2|3>                    run one pipeline stage\n\
         \u{20}  full-sync                        run stages 1-3 sequentially\n\
         \u{20}  progress                         show the shared progress slot\n\
         \u{20}  stop                             request a stop at the next stage boundary\n\
         \u{20}  delete-artifact <kind>           force a stage to run again\n\
         \u{20}  migrate <to-local|to-api> [policy]\n\
         \u{20}  rollback                         restore the pre-migration backup\n\
         \u{20}  validate                         run the integrity checks\n\
         \u{20}  repair                           best-effort data repair (logged)\n\
         \u{20}  export                           print the export document\n\
         \u{20}  import <file.json>               import a previously exported document"
    );
}
