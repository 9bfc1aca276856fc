// src/questions.rs
// Question bank loading. The bank is read once at startup and is read-only
// for the rest of the process.

use std::path::Path;

use serde::Deserialize;

use crate::error::SurveyError;

/// The fixed questionnaire, asked in this order in every trial.
pub const QUESTIONNAIRE: [&str; 5] = ["Q1_I", "Q2_I", "Q3_I", "Q4_I", "Q5_I"];

#[derive(Debug, Clone, Deserialize)]
pub struct Question {
    #[serde(rename = "question_id")]
    pub id: String,
    #[serde(rename = "question_text")]
    pub text: String,
}

/// The five questionnaire questions, resolved against the bank file and held
/// in questionnaire order.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    /// Reads a CSV with `question_id,question_text` columns.
    pub fn load(path: &Path) -> Result<Self, SurveyError> {
        let mut reader = csv::Reader::from_path(path).map_err(|e| {
            SurveyError::Configuration(format!(
                "cannot open question bank {}: {e}",
                path.display()
            ))
        })?;

        let mut rows = Vec::new();
        for record in reader.deserialize::<Question>() {
            let question = record.map_err(|e| {
                SurveyError::Configuration(format!("malformed question bank row: {e}"))
            })?;
            rows.push(question);
        }
        Self::from_rows(rows)
    }

    /// Resolves the fixed questionnaire against loaded rows. Every
    /// questionnaire id must be present; extra rows are ignored.
    pub fn from_rows(rows: Vec<Question>) -> Result<Self, SurveyError> {
        let mut questions = Vec::with_capacity(QUESTIONNAIRE.len());
        for id in QUESTIONNAIRE {
            let question = rows
                .iter()
                .find(|q| q.id == id)
                .cloned()
                .ok_or_else(|| {
                    SurveyError::Configuration(format!("question bank is missing '{id}'"))
                })?;
            questions.push(question);
        }
        Ok(Self { questions })
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.questions.iter().map(|q| q.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }
}
