//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to inspect a well planning database.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `wellplan_cli [status | delete-well <uuid> | delete-project <uuid>]`

use log::info;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wellplan_core::{
    core_version, init_logging_from_config, DeletionStatus, EngineConfig, SqliteContainer,
    Workspace,
};

const DELETE_WAIT: Duration = Duration::from_secs(30);

fn main() -> ExitCode {
    let config = EngineConfig::from_env();
    if let Err(err) = init_logging_from_config(&config) {
        eprintln!("logging disabled: {err}");
    }

    match run(&config, std::env::args().skip(1).collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &EngineConfig, args: Vec<String>) -> Result<(), String> {
    let container = SqliteContainer::open_with_timeout(&config.db_path, config.busy_timeout)
        .map_err(|err| err.to_string())?;
    let mut workspace = Workspace::open(Arc::new(container), config.workspace.clone())
        .map_err(|err| err.to_string())?;

    println!("wellplan_core version={}", core_version());
    println!("db_path={}", config.db_path.display());

    match args.first().map(String::as_str) {
        None | Some("status") => {}
        Some(command @ ("delete-well" | "delete-project")) => {
            let id = args
                .get(1)
                .ok_or_else(|| format!("{command} needs an id"))?
                .parse::<Uuid>()
                .map_err(|err| format!("invalid id: {err}"))?;
            let ticket = if command == "delete-well" {
                workspace.request_delete_wells(&[id])
            } else {
                workspace.request_delete_projects(&[id])
            };
            let Some(ticket) = ticket else {
                return Ok(());
            };
            info!("event=cli_delete module=cli status=start ticket={}", ticket.value());
            let done = workspace
                .wait_for(ticket, DELETE_WAIT)
                .map_err(|err| err.to_string())?
                .ok_or_else(|| format!("{ticket} did not finish in time"))?;
            match done.status {
                DeletionStatus::Committed(report) => println!(
                    "{ticket} committed resolved={} skipped={} deleted={}",
                    report.resolved, report.skipped, report.deleted
                ),
                DeletionStatus::Failed(message) => return Err(format!("{ticket} failed: {message}")),
            }
            workspace.pump().map_err(|err| err.to_string())?;
        }
        Some(other) => return Err(format!("unknown command `{other}`")),
    }

    print_roots(&workspace);
    Ok(())
}

fn print_roots(workspace: &Workspace<SqliteContainer>) {
    let selection = workspace.current_selection();
    for entry in workspace.roots().entries() {
        let marker = if selection.well_id == Some(entry.id()) { "*" } else { " " };
        println!("{marker} well {} {}", entry.id(), entry.well.name);
        for project in &entry.projects {
            let marker = if selection.project_id == Some(project.uuid) {
                "*"
            } else {
                " "
            };
            println!("  {marker} project {} {}", project.uuid, project.name);
        }
    }
    println!(
        "selection well={} project={}",
        display_id(selection.well_id),
        display_id(selection.project_id)
    );
}

fn display_id(id: Option<Uuid>) -> String {
    id.map_or_else(|| "none".to_string(), |id| id.to_string())
}
