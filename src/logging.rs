use crate::{
    config::RebundleConfig,
    rebundle::{timing::RunTime, RunSummary},
};
use anyhow::{bail, Context, Result};
use lazy_static::lazy_static;
use log::{LevelFilter, Metadata, Record};
use std::sync::{Arc, Mutex};

struct RebundleLogger;

static LOGGER: RebundleLogger = RebundleLogger;

pub fn init() -> Result<()> {
    match log::set_logger(&LOGGER) {
        Ok(_) => log::set_max_level(LevelFilter::Info),
        Err(_) => bail!("Logger initalization failed"),
    };

    Ok(())
}

/// Progress is always reported, verbose adds the per-entry detail lines
pub(crate) fn set_verbose(verbose: bool) {
    log::set_max_level(if verbose { LevelFilter::Debug } else { LevelFilter::Info });
}

lazy_static! {
    pub(crate) static ref LOG_RECORDS: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
}

impl log::Log for RebundleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let log_string = format!(
                "{} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            );

            {
                let mut log_records = match LOG_RECORDS.lock() {
                    Ok(log_records) => log_records,
                    Err(err) => {
                        println!("Failed to lock log records: {}", err);
                        return;
                    }
                };
                log_records.push(log_string.clone());
            }

            println!("{}", log_string);
        }
    }

    fn flush(&self) {}
}

#[derive(serde::Serialize)]
struct Summary<'a> {
    rebundle_config: &'a RebundleConfig,
    run_summary: Option<&'a RunSummary>,
    error: Option<String>,
    run_time: RunTime,
    logs: Vec<String>,
}

/// Write the summary file, if one was requested. The summary is written for failed runs too.
pub(crate) fn generate_summary(rebundle_config: &RebundleConfig, run_result: &Result<RunSummary>, run_time: RunTime) -> Result<()> {
    let Some(summary_file) = &rebundle_config.summary_file else {
        return Ok(());
    };

    let logs = match LOG_RECORDS.lock() {
        Ok(logs) => logs.clone(),
        Err(err) => {
            vec![format!("Failed to lock log records: {}", err)]
        }
    };

    let summary = Summary {
        rebundle_config,
        run_summary: run_result.as_ref().ok(),
        error: run_result.as_ref().err().map(|err| format!("{:#}", err)),
        run_time,
        logs,
    };

    let summary_file = std::fs::File::create(&**summary_file).context("opening summary file for writing")?;
    serde_yaml::to_writer(summary_file, &summary).context("serializing run summary into summary file")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BundlePath, DocumentPaths};
    use serde_json::Value;
    use serial_test::serial;

    fn config(summary_file: Option<BundlePath>) -> Result<RebundleConfig> {
        Ok(RebundleConfig {
            related_images: BundlePath::new("relatedImages.yml")?,
            csv: DocumentPaths {
                upstream: BundlePath::new("upstream.clusterserviceversion.yaml")?,
                output: BundlePath::new("upstream.clusterserviceversion.yaml")?,
                patch: None,
            },
            annotations: None,
            dry_run: false,
            verbose: false,
            summary_file,
            config_file_raw: None,
            cli_raw: None,
        })
    }

    fn run_time() -> RunTime {
        RunTime::since_start(std::time::Instant::now())
    }

    #[test]
    #[serial]
    fn test_summary_of_successful_run() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let summary_path = dir.path().join("summary.yaml");

        LOG_RECORDS.lock().unwrap().push("2025-03-07 09:05:01 - INFO - Updated 3 relatedImages entries".to_string());

        let run_summary = RunSummary {
            image_mappings: 5,
            env_var_mappings: 4,
            ..Default::default()
        };

        generate_summary(
            &config(Some(BundlePath::new(summary_path.to_str().context("path")?)?))?,
            &Ok(run_summary),
            run_time(),
        )?;

        let summary: Value = serde_yaml::from_str(&std::fs::read_to_string(&summary_path)?)?;

        assert_eq!(summary["run_summary"]["image_mappings"], 5);
        assert_eq!(summary["rebundle_config"]["related_images"], "relatedImages.yml");
        assert!(summary["error"].is_null());
        assert!(summary["logs"]
            .as_array()
            .context("logs")?
            .iter()
            .any(|line| line == "2025-03-07 09:05:01 - INFO - Updated 3 relatedImages entries"));

        LOG_RECORDS.lock().unwrap().clear();

        Ok(())
    }

    #[test]
    #[serial]
    fn test_summary_of_failed_run() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let summary_path = dir.path().join("summary.yaml");

        generate_summary(
            &config(Some(BundlePath::new(summary_path.to_str().context("path")?)?))?,
            &Err(anyhow::anyhow!("nothing to delete").context("applying CSV patch oadp-csv.patch.yaml")),
            run_time(),
        )?;

        let summary: Value = serde_yaml::from_str(&std::fs::read_to_string(&summary_path)?)?;

        assert!(summary["run_summary"].is_null());
        assert_eq!(summary["error"], "applying CSV patch oadp-csv.patch.yaml: nothing to delete");

        Ok(())
    }

    #[test]
    fn test_no_summary_requested() -> Result<()> {
        generate_summary(&config(None)?, &Ok(RunSummary::default()), run_time())
    }
}
