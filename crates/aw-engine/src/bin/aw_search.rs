use std::path::PathBuf;

use aw_engine::{PipelineConfig, SearchDriver};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = PipelineConfig::load(config_path.as_deref())?;
    tracing::info!(
        data = %config.data_path.display(),
        output = %config.output_dir.display(),
        pack_size = config.search.pack_size,
        iterations = config.search.max_iterations,
        "AmlWolf search starting"
    );

    let artifact = SearchDriver::new(config)?.run()?;
    if let Some(report) = &artifact.report {
        println!("best {} = {:.4}", report.metric.name(), report.best_fitness);
        println!("best config: {}", report.best_config);
        if let Some(holdout) = &report.holdout {
            println!(
                "holdout: PR-AUC {:.4}  ROC-AUC {:.4}  F1 {:.4}",
                holdout.average_precision, holdout.roc_auc, holdout.f1
            );
        }
    }
    Ok(())
}
