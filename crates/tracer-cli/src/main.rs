mod args;
mod client;
mod config;
mod output;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;

use tracer_client::{
    ApiClient, Catalog, Ingestion, JobPoller, JobSource, JobSubmitter, JobsApi,
    LocalFile, PolicyCommand, PolicyGrid, PollScope, ReportAssembler, UploadCoordinator,
};
use tracer_common::telemetry::init_tracing;
use tracer_common::JobId;

use crate::args::{Args, CatalogCommand, Command, IngestCommand, JobsCommand, PoliciesCommand};
use crate::client::api_client;
use crate::config::{build_client_config, build_job_config, parse_cell_value};
use crate::output::{
    print_catalog, print_jobs, print_policies, print_policy_sets, print_product_codes, print_report,
    print_session, print_snapshot, print_upload_receipt,
};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing("tracer-cli", args.log_format);

    if let Err(e) = run(args).await {
        eprintln!("✗ {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = build_client_config(&args);
    let api = api_client(&args, &config)?;

    match args.command {
        Command::Jobs { subcommand } => {
            let jobs = JobsApi::new(api, &config);
            match subcommand {
                JobsCommand::List => print_jobs(&jobs.list_jobs().await?),
                JobsCommand::Watch { job } => {
                    let scope = match job {
                        Some(id) => PollScope::One(JobId::new(id)),
                        None => PollScope::All,
                    };
                    watch(Arc::new(jobs), scope, config.poll_interval, None).await;
                }
            }
        }
        Command::Submit {
            products,
            scenario,
            assumptions,
            stochastic,
            attribution,
            policy_sets,
            no_scenario,
            watch: follow,
        } => {
            let mut config = config;
            config.require_scenario = !no_scenario;
            let job_config =
                build_job_config(products, scenario, assumptions, stochastic, attribution, policy_sets);
            let job_id = JobSubmitter::new(api.clone(), &config).submit(&job_config).await?;
            println!("✓ Calculation queued, job ID: {job_id}");
            if follow {
                let source = Arc::new(JobsApi::new(api, &config));
                watch(source, PollScope::All, config.poll_interval, Some(job_id)).await;
            }
        }
        Command::Upload { target, file } => {
            let source = LocalFile::new(file)?;
            let receipt = UploadCoordinator::new(api, config.upload_ticket_ttl())
                .upload(&source, &target)
                .await?;
            print_upload_receipt(&receipt);
        }
        Command::Report { job_id } => {
            let report = ReportAssembler::new(api, &config)
                .assemble(&JobId::new(job_id))
                .await?;
            print_report(&report);
        }
        Command::Catalog { subcommand } => {
            let catalog = Catalog::new(api);
            match subcommand {
                CatalogCommand::PolicySets => {
                    print_catalog("Policy Sets", &catalog.policy_sets().await?)
                }
                CatalogCommand::PolicySetDetails => {
                    print_policy_sets(&catalog.policy_set_summaries().await?)
                }
                CatalogCommand::Scenarios => {
                    print_catalog("Scenario Sets", &catalog.scenarios().await?)
                }
                CatalogCommand::ProductCodes { sets } => {
                    print_product_codes(&catalog.product_codes(&sets).await?)
                }
            }
        }
        Command::Policies { subcommand } => policies(api, subcommand).await?,
        Command::Ingest { subcommand } => {
            let ingestion = Ingestion::new(api);
            let message = match subcommand {
                IngestCommand::Csv { file } => ingestion.ingest_csv(&LocalFile::new(file)?).await?,
                IngestCommand::Url { url } => ingestion.ingest_from_url(&url).await?,
                IngestCommand::ScenarioFile { file, rate } => {
                    ingestion
                        .ingest_scenarios_file(&LocalFile::new(file)?, rate)
                        .await?
                }
                IngestCommand::ScenarioUrl { url, rate } => {
                    ingestion.ingest_scenarios_from_url(&url, rate).await?
                }
            };
            println!("✓ {}", message.trim());
        }
        Command::Whoami => print_session(&api.session().await?),
    }

    Ok(())
}

async fn policies(api: ApiClient, subcommand: PoliciesCommand) -> Result<()> {
    match subcommand {
        PoliciesCommand::List { set } => {
            let grid = PolicyGrid::load(api, set).await?;
            print_policies(&grid.columns(), grid.rows());
        }
        PoliciesCommand::Update {
            set,
            id,
            field,
            value,
        } => {
            let mut grid = PolicyGrid::load(api, set).await?;
            let row = grid
                .row(&id)
                .ok_or_else(|| anyhow!("no policy with id '{id}' in this set"))?;
            let edited = row
                .with_field(&field, parse_cell_value(&value))
                .ok_or_else(|| anyhow!("column '{field}' is read-only"))?;
            grid.apply(PolicyCommand::Update(edited)).await?;
            println!("✓ Policy '{id}' updated");
        }
        PoliciesCommand::Delete { set, id } => {
            let mut grid = PolicyGrid::load(api, set).await?;
            grid.apply(PolicyCommand::Delete(id.clone())).await?;
            println!("✓ Policy '{id}' deleted");
        }
    }
    Ok(())
}

/// Prints every snapshot until Ctrl-C, or until the followed job finishes.
async fn watch(source: Arc<dyn JobSource>, scope: PollScope, interval: Duration, new_job: Option<JobId>) {
    let follow = match (&scope, &new_job) {
        (PollScope::One(id), _) => Some(id.clone()),
        (PollScope::All, job) => job.clone(),
    };

    let handle = JobPoller::spawn(source, scope, interval);
    if let Some(id) = new_job {
        handle.notify_new_job(id);
    }
    let mut snapshots = handle.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snap = snapshots.borrow_and_update().clone();
                print_snapshot(&snap);

                let finished = follow.as_ref().and_then(|id| snap.jobs.iter().find(|j| &j.id == id));
                if let Some(job) = finished.filter(|j| j.status.is_terminal()) {
                    println!("Job {} finished: {}", job.id, job.status.label());
                    break;
                }
            }
        }
    }

    handle.stop().await;
}
