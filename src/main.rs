use anyhow::{Context, Result};
use config::RebundleConfig;
use rebundle::timing::RunTime;

mod config;
mod csv_rewrite;
mod document;
mod file_utils;
mod image_mappings;
mod json_tools;
mod logging;
mod patch;
mod rebundle;


fn main() -> Result<()> {
    let start = std::time::Instant::now();

    logging::init().context("initializing logging")?;

    let rebundle_config = RebundleConfig::new()?;

    logging::set_verbose(rebundle_config.verbose);

    let run_result = rebundle::run(&rebundle_config);

    let summary_result = logging::generate_summary(&rebundle_config, &run_result, RunTime::since_start(start));

    // The run error takes precedence over a failure to write the summary
    run_result?;
    summary_result.context("generating summary")?;

    Ok(())
}
