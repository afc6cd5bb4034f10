//! Batch pipeline orchestrator.
//!
//! Runs ingest -> quality -> clean -> quality -> write -> publish for both
//! datasets in order. Every failure is tagged with the stage and dataset it
//! came from; publishing is the only stage allowed to fail softly.

use std::path::{Path, PathBuf};
use std::time::Instant;

use data_coyote_cli_utils::StepProgress;
use data_coyote_config::{Config, ConfigError, load_config};
use data_coyote_publish::{PublishError, maybe_publish, write_table};
use data_coyote_quality::{QualityError, REQUIRED_COLUMNS, expect_columns, expect_non_empty};
use data_coyote_source::SourceError;
use data_coyote_table_models::{Dataset, Table};
use strum_macros::Display;

/// Number of progress steps in a full run.
pub const STEP_COUNT: u64 = 10;

/// Pipeline stage, used to label progress and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Stage {
    #[strum(serialize = "ingest")]
    Ingest,
    #[strum(serialize = "raw quality check")]
    RawQuality,
    #[strum(serialize = "clean quality check")]
    CleanQuality,
    #[strum(serialize = "write")]
    Write,
}

/// Failure raised by one stage of the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Quality(#[from] QualityError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// A pipeline run failure.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The config file could not be loaded.
    #[error("config failed: {source}")]
    Config {
        /// Underlying error.
        #[from]
        source: ConfigError,
    },

    /// A dataset stage failed.
    #[error("{stage} failed for {dataset}: {source}")]
    Stage {
        /// Stage that failed.
        stage: Stage,
        /// Dataset being processed.
        dataset: Dataset,
        /// Underlying error.
        #[source]
        source: StageError,
    },
}

trait StageContext<T> {
    fn at(self, stage: Stage, dataset: Dataset) -> Result<T, PipelineError>;
}

impl<T, E: Into<StageError>> StageContext<T> for Result<T, E> {
    fn at(self, stage: Stage, dataset: Dataset) -> Result<T, PipelineError> {
        self.map_err(|e| PipelineError::Stage {
            stage,
            dataset,
            source: e.into(),
        })
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Rows written for the crime dataset.
    pub crime_rows: usize,
    /// Rows written for the tourism dataset.
    pub tourism_rows: usize,
    /// Output files, crime first.
    pub outputs: Vec<PathBuf>,
    /// Whether spreadsheet publishing succeeded.
    pub published: bool,
}

/// Loads `config_path` and runs the full pipeline.
///
/// # Errors
///
/// Returns [`PipelineError`] naming the failing stage and dataset.
pub async fn run(config_path: &Path, steps: &StepProgress) -> Result<RunSummary, PipelineError> {
    steps.start("Loading config");
    let config = load_config(config_path)?;
    steps.complete();

    run_with_config(&config, steps).await
}

/// Runs the pipeline with an already-loaded config.
///
/// # Errors
///
/// Returns [`PipelineError`] naming the failing stage and dataset.
pub async fn run_with_config(
    config: &Config,
    steps: &StepProgress,
) -> Result<RunSummary, PipelineError> {
    let start = Instant::now();

    steps.start("Ingesting crime");
    let raw_crime = data_coyote_source::ingest_crime(config)
        .await
        .at(Stage::Ingest, Dataset::Crime)?;
    steps.complete();

    steps.start("Ingesting tourism");
    let raw_tourism = data_coyote_source::ingest_tourism(config)
        .await
        .at(Stage::Ingest, Dataset::Tourism)?;
    steps.complete();

    steps.start("Checking raw tables");
    expect_non_empty(&raw_crime, "crime_raw").at(Stage::RawQuality, Dataset::Crime)?;
    expect_non_empty(&raw_tourism, "tourism_raw").at(Stage::RawQuality, Dataset::Tourism)?;
    steps.complete();

    steps.start("Cleaning crime");
    let crime = data_coyote_clean::clean_crime(raw_crime, &config.sources.crime);
    steps.complete();

    steps.start("Cleaning tourism");
    let tourism = data_coyote_clean::clean_tourism(raw_tourism, &config.sources.tourism);
    steps.complete();

    steps.start("Checking clean tables");
    check_clean(&crime, Dataset::Crime)?;
    check_clean(&tourism, Dataset::Tourism)?;
    steps.complete();

    let out_dir = &config.publish.files.out_dir;
    steps.start("Writing crime output");
    let crime_path = write_table(&crime, &output_name(Dataset::Crime), out_dir)
        .at(Stage::Write, Dataset::Crime)?;
    steps.complete();

    steps.start("Writing tourism output");
    let tourism_path = write_table(&tourism, &output_name(Dataset::Tourism), out_dir)
        .at(Stage::Write, Dataset::Tourism)?;
    steps.complete();

    steps.start("Publishing");
    let published = maybe_publish(&config.publish.google_sheets, &crime, &tourism).await;
    steps.complete();

    log::info!("Pipeline finished in {:.1?}", start.elapsed());

    Ok(RunSummary {
        crime_rows: crime.len(),
        tourism_rows: tourism.len(),
        outputs: vec![crime_path, tourism_path],
        published,
    })
}

fn check_clean(table: &Table, dataset: Dataset) -> Result<(), PipelineError> {
    let name = format!("{dataset}_clean");
    expect_non_empty(table, &name).at(Stage::CleanQuality, dataset)?;
    expect_columns(table, REQUIRED_COLUMNS, &name).at(Stage::CleanQuality, dataset)?;
    Ok(())
}

/// File stem for a dataset's cleaned output.
fn output_name(dataset: Dataset) -> String {
    format!("{dataset}_latest")
}

#[cfg(test)]
mod tests {
    use std::fs;

    use data_coyote_config::parse_config_str;

    use super::*;

    const CRIME_CSV: &str = "\
Incident_Date,Offense,Address
2024-01-15T14:30:00,AGGRAVATED ASSAULT,100 MAIN ST
2024-01-16 09:00:00,BURGLARY,200 OAK AVE
not a date,ROBBERY,300 PINE RD
2024-01-16 09:00:00,BURGLARY,200 OAK AVE
";

    const TOURISM_CSV: &str = "\
Month,Visitors
2024-01,1000
2024-02,1200
";

    fn config_for(dir: &Path, crime: &str, tourism: &str) -> Config {
        let crime_path = dir.join("crime.csv");
        let tourism_path = dir.join("tourism.csv");
        fs::write(&crime_path, crime).unwrap();
        fs::write(&tourism_path, tourism).unwrap();

        let text = format!(
            r#"
[sources.crime]
local_path = "{}"
date_column = "incident_date"
type_column = "offense"

[sources.tourism]
local_path = "{}"
date_column = "month"

[publish.files]
out_dir = "{}"
"#,
            crime_path.display(),
            tourism_path.display(),
            dir.join("processed").display(),
        );
        parse_config_str(&text, |_| None).unwrap()
    }

    #[tokio::test]
    async fn runs_end_to_end_from_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path(), CRIME_CSV, TOURISM_CSV);

        let summary = run_with_config(&config, &StepProgress::hidden(STEP_COUNT))
            .await
            .unwrap();

        assert_eq!(summary.crime_rows, 2);
        assert_eq!(summary.tourism_rows, 2);
        assert!(!summary.published);

        let processed = dir.path().join("processed");
        assert_eq!(
            summary.outputs,
            [
                processed.join("crime_latest.csv"),
                processed.join("tourism_latest.csv")
            ]
        );
        let crime = fs::read_to_string(processed.join("crime_latest.csv")).unwrap();
        let header = crime.lines().next().unwrap();
        assert_eq!(
            header,
            "incident_date,offense,address,year,month,dow,hour,crime_category"
        );
        assert!(crime.contains(
            "2024-01-15 14:30:00,AGGRAVATED ASSAULT,100 MAIN ST,2024,1,Monday,14,Violent"
        ));
    }

    #[tokio::test]
    async fn empty_raw_table_fails_raw_quality() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path(), "Incident_Date,Offense\n", TOURISM_CSV);

        let err = run_with_config(&config, &StepProgress::hidden(STEP_COUNT))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Stage {
                stage: Stage::RawQuality,
                dataset: Dataset::Crime,
                source: StageError::Quality(QualityError::Empty { .. }),
            }
        ));
        assert!(!dir.path().join("processed").exists());
    }

    #[tokio::test]
    async fn all_dates_unparseable_fails_clean_quality() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path(), CRIME_CSV, "Month,Visitors\nbad,1\n");

        let err = run_with_config(&config, &StepProgress::hidden(STEP_COUNT))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Stage {
                stage: Stage::CleanQuality,
                dataset: Dataset::Tourism,
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "clean quality check failed for tourism: tourism_clean is empty"
        );
    }

    #[tokio::test]
    async fn missing_source_fails_ingest() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for(dir.path(), CRIME_CSV, TOURISM_CSV);
        config.sources.tourism.local_path = Some(dir.path().join("missing.csv"));

        let err = run_with_config(&config, &StepProgress::hidden(STEP_COUNT))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Stage {
                stage: Stage::Ingest,
                dataset: Dataset::Tourism,
                source: StageError::Source(SourceError::Io { .. }),
            }
        ));
    }

    #[tokio::test]
    async fn unreadable_config_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(&dir.path().join("nope.toml"), &StepProgress::hidden(STEP_COUNT))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config { .. }));
    }
}
