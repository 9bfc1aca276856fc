// src/main.rs
// SURVEYOR CORE - AUTOMATED EXPECTATION SURVEY
// Drives hosted assistants through a fixed questionnaire under randomized
// news-context conditions and exports one result table per assistant.

use std::path::Path;
use std::process::ExitCode;
use std::thread;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod assistant;
mod batch;
mod config;
mod error;
mod questions;
mod reporter;
mod scout;
mod trial;

use assistant::OpenAiAssistantClient;
use batch::BatchOrchestrator;
use config::SurveyConfig;
use questions::QuestionBank;
use reporter::Reporter;
use scout::NewsScout;

fn main() -> ExitCode {
    // Mirror everything to survey.log so long unattended runs stay
    // auditable after the terminal is gone.
    let file_appender = tracing_appender::rolling::never(".", "survey.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "surveyor_core=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = ?e, "survey run failed");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<()> {
    let config = SurveyConfig::from_env().context("loading configuration")?;
    let questions = QuestionBank::load(Path::new(&config.questions_file))
        .context("loading question bank")?;
    info!(
        file = %config.questions_file,
        questions = questions.len(),
        assistants = config.assistants.len(),
        trials = config.trials,
        run = config.run_id,
        "survey starting"
    );

    let client = OpenAiAssistantClient::new(
        &config.api_key,
        &config.api_base,
        config.poll_interval,
        config.poll_max_attempts,
    )?;
    let scout = NewsScout::new();
    let orchestrator = BatchOrchestrator::new(&client, &scout, &questions, &config);

    for (index, assistant_config) in config.assistants.iter().enumerate() {
        info!(assistant = %assistant_config.name, "starting batch");

        match orchestrator.run_batch(assistant_config) {
            Ok(rows) if rows.is_empty() => {
                // Zero successful trials: no table file for this assistant.
                error!(
                    assistant = %assistant_config.name,
                    "batch produced no successful trials, nothing to export"
                );
            }
            Ok(rows) => {
                Reporter::export_csv(
                    Path::new(&config.output_dir),
                    &assistant_config.name,
                    config.run_id,
                    &questions,
                    &rows,
                )?;
            }
            Err(e) => {
                error!(
                    assistant = %assistant_config.name,
                    error = %e,
                    "batch aborted"
                );
            }
        }

        if index + 1 < config.assistants.len() {
            info!(
                secs = config.cooldown.as_secs(),
                "cooling down before next assistant"
            );
            thread::sleep(config.cooldown);
        }
    }

    Ok(())
}
