// src/reporter.rs
// CSV export of completed batches, one file per assistant per run.

use std::path::{Path, PathBuf};

use chrono::Local;
use csv::Writer;
use tracing::info;

use crate::error::SurveyError;
use crate::questions::QuestionBank;
use crate::trial::ResultRow;

pub struct Reporter;

impl Reporter {
    /// Writes one result table. The column order is fixed across every row
    /// of a run: `Run, Group, <response per question>, <prompt per
    /// question>, Instructions, Context`. Returns the written path.
    pub fn export_csv(
        output_dir: &Path,
        assistant_name: &str,
        run_id: u32,
        questions: &QuestionBank,
        rows: &[ResultRow],
    ) -> Result<PathBuf, SurveyError> {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let filename = format!("results_{assistant_name}_run{run_id}_{timestamp}.csv");
        let path = output_dir.join(filename);

        let mut writer = Writer::from_path(&path)
            .map_err(|e| SurveyError::ResultWrite(format!("{}: {e}", path.display())))?;

        let mut header: Vec<String> = vec!["Run".to_string(), "Group".to_string()];
        header.extend(questions.ids().map(str::to_string));
        header.extend(questions.ids().map(|id| format!("Prompt_{id}")));
        header.push("Instructions".to_string());
        header.push("Context".to_string());
        writer
            .write_record(&header)
            .map_err(|e| SurveyError::ResultWrite(e.to_string()))?;

        for row in rows {
            let mut record: Vec<String> =
                vec![row.run.to_string(), row.group.code().to_string()];
            record.extend(row.responses.iter().cloned());
            record.extend(row.prompts.iter().cloned());
            record.push(row.instructions.clone());
            record.push(row.context.clone());
            writer
                .write_record(&record)
                .map_err(|e| SurveyError::ResultWrite(e.to_string()))?;
        }

        writer
            .flush()
            .map_err(|e| SurveyError::ResultWrite(e.to_string()))?;

        info!(path = %path.display(), rows = rows.len(), "result table exported");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questions::{Question, QUESTIONNAIRE};
    use crate::trial::Group;

    fn bank() -> QuestionBank {
        let rows = QUESTIONNAIRE
            .iter()
            .map(|id| Question {
                id: id.to_string(),
                text: format!("Text of {id}"),
            })
            .collect();
        QuestionBank::from_rows(rows).unwrap()
    }

    fn row(group: Group, context: &str) -> ResultRow {
        ResultRow {
            run: 1,
            group,
            responses: (1..=5).map(|i| format!("{i}.0 %,")).collect(),
            prompts: QUESTIONNAIRE
                .iter()
                .map(|id| format!("Text of {id}"))
                .collect(),
            instructions: "test instructions".to_string(),
            context: context.to_string(),
        }
    }

    #[test]
    fn exports_fixed_column_order() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![
            row(Group::Control, ""),
            row(Group::InflationContext, "Title: CPI\nDescription: up\n\n"),
        ];

        let path =
            Reporter::export_csv(dir.path(), "Assistant_test", 1, &bank(), &rows).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("results_Assistant_test_run1_"));
        assert!(name.ends_with(".csv"));

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let header: Vec<String> = reader
            .headers()
            .unwrap()
            .iter()
            .map(str::to_string)
            .collect();
        assert_eq!(
            header,
            vec![
                "Run", "Group", "Q1_I", "Q2_I", "Q3_I", "Q4_I", "Q5_I", "Prompt_Q1_I",
                "Prompt_Q2_I", "Prompt_Q3_I", "Prompt_Q4_I", "Prompt_Q5_I", "Instructions",
                "Context",
            ]
        );

        let records: Vec<csv::StringRecord> =
            reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(&records[0][0], "1");
        assert_eq!(&records[0][1], "0");
        assert_eq!(&records[0][13], "");
        assert_eq!(&records[1][1], "1");
        assert_eq!(&records[1][2], "1.0 %,");
        assert_eq!(&records[1][7], "Text of Q1_I");
        assert_eq!(&records[1][13], "Title: CPI\nDescription: up\n\n");
    }
}
