//! BDD runner
//!
//! Runs the feature files against the target configured through the
//! environment (`BASE_URL`, `API_BASE_URL`, credentials, browser settings).
//! Cucumber's own flags (`--tags`, `--name`, `--concurrency`, ...) are
//! available alongside the ones below.
//!
//! Usage:
//!   cargo run -p plantshop-bdd-tests --bin bdd-runner
//!   cargo run -p plantshop-bdd-tests --bin bdd-runner -- --tags @api
//!   cargo run -p plantshop-bdd-tests --bin bdd-runner -- --features tests/bdd/features/ui

use anyhow::Context as _;
use cucumber::{cli, writer::Stats as _, World as _};
use plantshop_bdd_tests::steps::world::{outcome_of, scenario_info};
use plantshop_bdd_tests::PlantShopWorld;
use plantshop_test_utils::logging::{init_logging, LogFormat};
use plantshop_test_utils::{RunContext, SuiteConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(clap::Args, Clone, Debug)]
struct CustomOpts {
    /// Feature file or directory to run
    #[arg(long, value_name = "PATH")]
    features: Option<PathBuf>,
}

fn default_features() -> PathBuf {
    let from_workspace = PathBuf::from("tests/bdd/features");
    if from_workspace.exists() {
        from_workspace
    } else {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("features")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LogFormat::from_env()).context("initializing logging")?;

    let opts = cli::Opts::<_, _, _, CustomOpts>::parsed();
    let features = opts.custom.features.clone().unwrap_or_else(default_features);

    let config = SuiteConfig::from_env();
    info!(
        base_url = %config.base_url,
        api_base_url = %config.api_base_url,
        headless = config.headless,
        workers = config.workers,
        features = %features.display(),
        "Starting BDD run"
    );
    let workers = config.workers;
    let run = Arc::new(RunContext::new(config));

    let before_run = Arc::clone(&run);
    let writer = PlantShopWorld::cucumber()
        .max_concurrent_scenarios(workers)
        .before(move |feature, rule, scenario, world| {
            let run = Arc::clone(&before_run);
            Box::pin(async move {
                let info = scenario_info(feature, rule, scenario);
                if let Err(e) = world.start_scenario(run, info).await {
                    panic!("Scenario setup failed: {e}");
                }
            })
        })
        .after(|_feature, _rule, scenario, event, world| {
            Box::pin(async move {
                let Some(world) = world else {
                    return;
                };
                if let Some(report) = world.finish_scenario(outcome_of(event)).await {
                    if let Some(path) = &report.screenshot {
                        info!(scenario = %scenario.name, path = %path.display(), "Saved failure screenshot");
                    }
                    if !report.is_clean() {
                        warn!(scenario = %scenario.name, errors = ?report.errors, "Teardown finished with errors");
                    }
                }
            })
        })
        .with_cli(opts)
        .run(features)
        .await;

    if let Err(e) = run.shutdown().await {
        error!("Failed to close browser: {}", e);
    }

    if writer.execution_has_failed() {
        anyhow::bail!(
            "{} step(s) failed, {} parsing error(s), {} hook error(s)",
            writer.failed_steps(),
            writer.parsing_errors(),
            writer.hook_errors()
        );
    }
    Ok(())
}
