use clap::{Parser, Subcommand};
use runsync::build_info::RestBuildInfoProvider;
use runsync::remote::{RestTestManagementClient, TestManagementApi};
use runsync::results::load_results;
use runsync::run::summary::summarize_results;
use runsync::{Credentials, RunConfig, RunController, SyncResult};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Records automated test outcomes in a remote test-management run.
#[derive(Parser)]
#[command(name = "runsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Run configuration (YAML)
    #[arg(long, global = true, default_value = "runsync.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a run, record every executed case and complete the run
    Sync {
        /// JSON array of executed cases
        #[arg(long)]
        results: PathBuf,

        /// Branch reported in the run summary
        #[arg(long, env = "BUILD_SOURCEBRANCHNAME", default_value = "unknown")]
        branch: String,
    },

    /// Print the outcome breakdown of an existing run
    Analyze {
        #[arg(long)]
        run_id: u64,
    },
}

#[tokio::main]
async fn main() -> SyncResult<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = RunConfig::load(&cli.config)?.with_env_overrides();
    let credentials = Credentials::from_env()?;
    let api = Arc::new(RestTestManagementClient::new(&config, &credentials)?);

    match cli.command {
        Commands::Sync { results, branch } => {
            let cases = load_results(&results)?;
            let mut controller = RunController::new(api, config.clone());
            if config.build_definition_id.is_some() {
                controller = controller
                    .with_build_info(Arc::new(RestBuildInfoProvider::new(&config, &credentials)?));
            }
            let active = controller.start().await?;
            info!(run_id = active.id(), cases = cases.len(), url = %active.run_url(), "run started");

            for case in &cases {
                if let Err(err) = active.finalize(case.to_request()).await {
                    error!(case_id = %case.case_id, error = %err, "case not recorded");
                    continue;
                }
                for path in &case.attachments {
                    if let Err(err) = active.attach_file(&case.case_id, path, "Test artifact").await {
                        warn!(case_id = %case.case_id, error = %err, "attachment skipped");
                    }
                }
            }

            active.attach_failure_digest().await;
            let summary = active.summary(&branch).await;
            let run = active.complete(&summary.render()).await?;
            for link in active.failure_links() {
                warn!(case_id = %link.case_id, work_item = %link.work_item_url, "failed");
            }
            println!("{}", summary.render());
            println!("Run {} {}: {}", run.id, run.state, active.run_url());
        }
        Commands::Analyze { run_id } => {
            let results = api.list_results(run_id).await?;
            print!("{}", summarize_results(&results).render());
        }
    }
    Ok(())
}
