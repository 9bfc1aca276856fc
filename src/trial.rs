// src/trial.rs
// One randomized trial end-to-end: fresh session, optional news context,
// the fixed questionnaire in order, one result row out.

use std::fmt;

use tracing::debug;

use crate::assistant::AssistantService;
use crate::config::AssistantConfig;
use crate::error::SurveyError;
use crate::questions::QuestionBank;

/// Instruction sent with the context message for non-control trials.
pub const CONTEXT_INSTRUCTIONS: &str =
    "Please read this context before answering the following questions.";

/// Experimental condition for a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
    Control,
    InflationContext,
    ElectionContext,
}

impl Group {
    /// Numeric code used in the result tables (0 = control).
    pub fn code(self) -> u8 {
        match self {
            Group::Control => 0,
            Group::InflationContext => 1,
            Group::ElectionContext => 2,
        }
    }

    /// News topic injected before questioning, if any.
    pub fn topic(self) -> Option<&'static str> {
        match self {
            Group::Control => None,
            Group::InflationContext => Some("Inflation"),
            Group::ElectionContext => Some("Election"),
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Group::Control => "control",
            Group::InflationContext => "inflation",
            Group::ElectionContext => "election",
        };
        f.write_str(label)
    }
}

/// Flattened projection of one completed trial. Column order is fixed:
/// `Run, Group, <responses...>, <prompts...>, Instructions, Context`.
#[derive(Debug, Clone)]
pub struct ResultRow {
    pub run: u32,
    pub group: Group,
    pub responses: Vec<String>,
    pub prompts: Vec<String>,
    pub instructions: String,
    pub context: String,
}

pub struct TrialRunner<'a, S: AssistantService> {
    client: &'a S,
    questions: &'a QuestionBank,
    instructions: &'a str,
}

impl<'a, S: AssistantService> TrialRunner<'a, S> {
    pub fn new(client: &'a S, questions: &'a QuestionBank, instructions: &'a str) -> Self {
        Self {
            client,
            questions,
            instructions,
        }
    }

    /// Runs one trial. `context` is the pre-fetched news text for the
    /// trial's group; ignored for the control group. Any client failure
    /// aborts the whole trial, there is no partial row.
    pub fn run(
        &self,
        run_id: u32,
        assistant: &AssistantConfig,
        group: Group,
        context: &str,
    ) -> Result<ResultRow, SurveyError> {
        let session = self.client.create_session()?;

        if group != Group::Control {
            // The assistant reads the news before any question is asked.
            // Its acknowledgement is not part of the survey data.
            self.client
                .ask(&session, assistant, context, CONTEXT_INSTRUCTIONS)?;
        }

        let mut responses = Vec::with_capacity(self.questions.len());
        let mut prompts = Vec::with_capacity(self.questions.len());
        for question in self.questions.questions() {
            let response =
                self.client
                    .ask(&session, assistant, &question.text, self.instructions)?;
            debug!(session = %session.id, question = %question.id, "question answered");
            responses.push(response);
            prompts.push(question.text.clone());
        }

        Ok(ResultRow {
            run: run_id,
            group,
            responses,
            prompts,
            instructions: self.instructions.to_string(),
            context: if group == Group::Control {
                String::new()
            } else {
                context.to_string()
            },
        })
    }
}
