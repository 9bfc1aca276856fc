// src/config.rs
// Environment-driven run configuration. Everything operational lives here;
// the orchestration modules only ever see the parsed struct.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::error::SurveyError;

/// Instructions sent with every survey question unless overridden via
/// SURVEY_INSTRUCTIONS. Kept verbatim from the deployed questionnaire.
pub const DEFAULT_INSTRUCTIONS: &str = r"The GPT is designed to answer users' questions about the expectations for future inflation. It responds with numerical percentage estimates, reflecting its opinions and anticipations about inflation while acknowledging the inherent uncertainty in such forecasts. It presents answers in two formats: single percentage points for point prediction and a list of percentages for probability distribution questions. The GPT ensures responses are solely numerical and not any written statements with the alphabets and formatted accordingly: for point prediction, it uses [\_\_\_ \%,] and for probability distribution questions, it uses [\_\_\_ \%,\_\_\_ \%,\_\_\_ \%,\_\_\_ \%,\_\_\_ \%,\_\_\_ \%,\_\_\_ \%,\_\_\_ \%,\_\_\_ \%,\_\_\_ \%,].";

/// One named remote assistant under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantConfig {
    pub name: String,
    pub assistant_id: String,
}

#[derive(Debug, Clone)]
pub struct SurveyConfig {
    pub api_key: String,
    pub api_base: String,
    pub assistants: Vec<AssistantConfig>,
    /// Trials per assistant batch.
    pub trials: usize,
    /// Run identifier stamped into every result row.
    pub run_id: u32,
    pub questions_file: String,
    pub output_dir: String,
    pub instructions: String,
    /// Pause between distinct assistant batches.
    pub cooldown: Duration,
    /// Fixed interval between job-status polls.
    pub poll_interval: Duration,
    /// Poll budget before a job is declared timed out.
    pub poll_max_attempts: u32,
    /// Optional RNG seed; a fixed seed reproduces the group permutation.
    pub seed: Option<u64>,
}

impl SurveyConfig {
    pub fn from_env() -> Result<Self, SurveyError> {
        dotenvy::dotenv().ok();

        let api_key = required("SURVEY_API_KEY")?;
        let assistants = parse_assistants(&required("SURVEY_ASSISTANTS")?)?;

        Ok(Self {
            api_key,
            api_base: env_or("SURVEY_API_BASE", "https://api.openai.com/v1"),
            assistants,
            trials: env_parse("SURVEY_TRIALS", 30)?,
            run_id: env_parse("SURVEY_RUN_ID", 1)?,
            questions_file: env_or("SURVEY_QUESTIONS_FILE", "questions_daily.csv"),
            output_dir: env_or("SURVEY_OUTPUT_DIR", "."),
            instructions: env_or("SURVEY_INSTRUCTIONS", DEFAULT_INSTRUCTIONS),
            cooldown: Duration::from_secs(env_parse("SURVEY_COOLDOWN_SECS", 5u64)?),
            poll_interval: Duration::from_secs(env_parse("SURVEY_POLL_INTERVAL_SECS", 1u64)?),
            poll_max_attempts: env_parse("SURVEY_POLL_MAX_ATTEMPTS", 300u32)?,
            seed: match std::env::var("SURVEY_SEED") {
                Ok(v) => Some(v.parse().map_err(|e| {
                    SurveyError::Configuration(format!("invalid SURVEY_SEED '{v}': {e}"))
                })?),
                Err(_) => None,
            },
        })
    }
}

fn required(name: &str) -> Result<String, SurveyError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| SurveyError::Configuration(format!("{name} not set")))
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(name: &str, default: T) -> Result<T, SurveyError>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(name) {
        Ok(v) => v
            .parse()
            .map_err(|e| SurveyError::Configuration(format!("invalid {name} '{v}': {e}"))),
        Err(_) => Ok(default),
    }
}

/// Parses "name=asst_id,name=asst_id" into the assistant roster.
fn parse_assistants(raw: &str) -> Result<Vec<AssistantConfig>, SurveyError> {
    let mut assistants = Vec::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (name, assistant_id) = entry.split_once('=').ok_or_else(|| {
            SurveyError::Configuration(format!(
                "SURVEY_ASSISTANTS entry '{entry}' is not of the form name=assistant_id"
            ))
        })?;
        if name.trim().is_empty() || assistant_id.trim().is_empty() {
            return Err(SurveyError::Configuration(format!(
                "SURVEY_ASSISTANTS entry '{entry}' has an empty name or id"
            )));
        }
        assistants.push(AssistantConfig {
            name: name.trim().to_string(),
            assistant_id: assistant_id.trim().to_string(),
        });
    }
    if assistants.is_empty() {
        return Err(SurveyError::Configuration(
            "SURVEY_ASSISTANTS contains no assistants".to_string(),
        ));
    }
    Ok(assistants)
}
