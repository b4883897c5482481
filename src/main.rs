mod cli;
mod demo;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use tracing::debug;

use sgc::config::SgcConfig;
use sgc::error::WorkflowError;
use sgc::hierarchy::UnitHierarchy;
use sgc::remote::SgcClient;
use sgc::service::WorkflowService;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = SgcConfig::load()?;
    sgc::logging::init(cli.verbose, &config.log_filter);
    debug!(base_url = %config.base_url, "configuration loaded");

    match cli.command {
        Command::Demo => demo::run().await,
        Command::Hierarchy { tipo } => {
            let process_type = tipo.into();
            let mut service = connect(&config)?;
            let progress = ui::RequestProgress::start("Consultando árvore de unidades...");
            match service.refresh_hierarchy(process_type).await {
                Ok(()) => {
                    progress.success(&format!("{} unidades", service.hierarchy().len()));
                    ui::print_tree(&service.hierarchy(), process_type);
                    Ok(())
                }
                Err(err) => fail(&progress, err),
            }
        }
        ref command @ Command::History { .. } => {
            let Some(id) = command.subprocess() else {
                return Ok(());
            };
            let service = connect(&config)?;
            let progress =
                ui::RequestProgress::start(&format!("Consultando histórico de {id}..."));
            match service.history(id).await {
                Ok((movements, reviews)) => {
                    progress.success(&format!("subprocesso {id}"));
                    ui::print_history(&movements, &reviews);
                    Ok(())
                }
                Err(err) => fail(&progress, err),
            }
        }
    }
}

fn connect(config: &SgcConfig) -> Result<WorkflowService<SgcClient>> {
    let client = SgcClient::new(config).context("building HTTP client")?;
    Ok(WorkflowService::new(client, UnitHierarchy::default()))
}

fn fail(progress: &ui::RequestProgress, err: WorkflowError) -> Result<()> {
    progress.failure(&err);
    Err(err.into())
}
