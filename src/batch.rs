// src/batch.rs
// Batch orchestration: balanced random group assignment, sequential trial
// execution, per-assistant aggregation.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::assistant::AssistantService;
use crate::config::{AssistantConfig, SurveyConfig};
use crate::error::SurveyError;
use crate::questions::QuestionBank;
use crate::scout::ContextProvider;
use crate::trial::{Group, ResultRow, TrialRunner};

/// Balanced multiset of groups for `trials` slots, uniformly permuted.
/// When `trials` is not divisible by 3, the remainder is assigned to the
/// control group so that exactly `trials` trials always run.
pub fn group_assignment(trials: usize, seed: Option<u64>) -> Vec<Group> {
    let per_group = trials / 3;
    let mut groups = Vec::with_capacity(trials);
    groups.extend(std::iter::repeat(Group::Control).take(per_group + trials % 3));
    groups.extend(std::iter::repeat(Group::InflationContext).take(per_group));
    groups.extend(std::iter::repeat(Group::ElectionContext).take(per_group));

    match seed {
        Some(seed) => groups.shuffle(&mut StdRng::seed_from_u64(seed)),
        None => groups.shuffle(&mut rand::thread_rng()),
    }
    groups
}

pub struct BatchOrchestrator<'a, S: AssistantService, C: ContextProvider> {
    client: &'a S,
    scout: &'a C,
    questions: &'a QuestionBank,
    config: &'a SurveyConfig,
}

impl<'a, S, C> BatchOrchestrator<'a, S, C>
where
    S: AssistantService,
    C: ContextProvider,
{
    pub fn new(
        client: &'a S,
        scout: &'a C,
        questions: &'a QuestionBank,
        config: &'a SurveyConfig,
    ) -> Self {
        Self {
            client,
            scout,
            questions,
            config,
        }
    }

    /// Runs every trial for one assistant and returns the successful rows
    /// in execution order. A context fetch failure aborts the batch before
    /// any trial spends remote quota; a single trial failure only drops
    /// that trial.
    pub fn run_batch(&self, assistant: &AssistantConfig) -> Result<Vec<ResultRow>, SurveyError> {
        let assignment = group_assignment(self.config.trials, self.config.seed);

        // One fetch per topic, shared read-only by every trial in that
        // group for the rest of the batch.
        let inflation_news = self.fetch_if_assigned(&assignment, Group::InflationContext)?;
        let election_news = self.fetch_if_assigned(&assignment, Group::ElectionContext)?;

        let runner = TrialRunner::new(self.client, self.questions, &self.config.instructions);
        let mut rows = Vec::new();
        for (i, group) in assignment.iter().copied().enumerate() {
            let context = match group {
                Group::Control => "",
                Group::InflationContext => inflation_news.as_str(),
                Group::ElectionContext => election_news.as_str(),
            };

            match runner.run(self.config.run_id, assistant, group, context) {
                Ok(row) => {
                    info!(
                        assistant = %assistant.name,
                        trial = i + 1,
                        total = assignment.len(),
                        %group,
                        "trial complete"
                    );
                    rows.push(row);
                }
                Err(e) => {
                    warn!(
                        assistant = %assistant.name,
                        trial = i + 1,
                        %group,
                        error = %e,
                        "trial failed, continuing with next trial"
                    );
                }
            }
        }
        Ok(rows)
    }

    fn fetch_if_assigned(
        &self,
        assignment: &[Group],
        group: Group,
    ) -> Result<String, SurveyError> {
        let topic = match group.topic() {
            Some(topic) => topic,
            None => return Ok(String::new()),
        };
        if !assignment.contains(&group) {
            return Ok(String::new());
        }
        let context = self.scout.fetch_context(topic)?;
        info!(topic, bytes = context.len(), "context fetched");
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::questions::{Question, QUESTIONNAIRE};
    use crate::trial::testing::{assistant, ScriptedClient};

    struct FixedScout;

    impl ContextProvider for FixedScout {
        fn fetch_context(&self, topic: &str) -> Result<String, SurveyError> {
            Ok(format!(
                "Title: {topic} headline\nDescription: {topic} body\n\n"
            ))
        }
    }

    struct FailingScout;

    impl ContextProvider for FailingScout {
        fn fetch_context(&self, topic: &str) -> Result<String, SurveyError> {
            Err(SurveyError::ContextFetch {
                topic: topic.to_string(),
                reason: "offline".to_string(),
            })
        }
    }

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

    fn config(trials: usize, seed: Option<u64>) -> SurveyConfig {
        SurveyConfig {
            api_key: "test-key".to_string(),
            api_base: "http://localhost".to_string(),
            assistants: vec![assistant()],
            trials,
            run_id: 1,
            questions_file: "questions_daily.csv".to_string(),
            output_dir: ".".to_string(),
            instructions: "test instructions".to_string(),
            cooldown: Duration::ZERO,
            poll_interval: Duration::ZERO,
            poll_max_attempts: 1,
            seed,
        }
    }

    fn count(assignment: &[Group], group: Group) -> usize {
        assignment.iter().filter(|g| **g == group).count()
    }

    #[test]
    fn assignment_is_balanced_when_divisible_by_three() {
        let assignment = group_assignment(30, Some(7));
        assert_eq!(assignment.len(), 30);
        assert_eq!(count(&assignment, Group::Control), 10);
        assert_eq!(count(&assignment, Group::InflationContext), 10);
        assert_eq!(count(&assignment, Group::ElectionContext), 10);
    }

    #[test]
    fn assignment_remainder_goes_to_control() {
        let assignment = group_assignment(31, Some(7));
        assert_eq!(assignment.len(), 31);
        assert_eq!(count(&assignment, Group::Control), 11);
        assert_eq!(count(&assignment, Group::InflationContext), 10);
        assert_eq!(count(&assignment, Group::ElectionContext), 10);
    }

    #[test]
    fn assignment_is_deterministic_for_a_fixed_seed() {
        assert_eq!(group_assignment(30, Some(42)), group_assignment(30, Some(42)));
    }

    #[test]
    fn full_batch_yields_one_row_per_trial() {
        let client = ScriptedClient::answering("2.1 %,");
        let scout = FixedScout;
        let bank = bank();
        let config = config(30, Some(42));
        let orchestrator = BatchOrchestrator::new(&client, &scout, &bank, &config);

        let rows = orchestrator.run_batch(&assistant()).unwrap();

        assert_eq!(rows.len(), 30);
        for row in &rows {
            assert_eq!(row.responses.len(), 5);
            assert!(row.responses.iter().all(|r| !r.is_empty()));
            assert_eq!(
                row.prompts,
                QUESTIONNAIRE
                    .iter()
                    .map(|id| format!("Text of {id}"))
                    .collect::<Vec<_>>()
            );
            assert_eq!(row.instructions, "test instructions");
        }
    }

    #[test]
    fn context_is_fetched_once_and_shared_within_a_group() {
        let client = ScriptedClient::answering("ok");
        let scout = FixedScout;
        let bank = bank();
        let config = config(12, Some(3));
        let orchestrator = BatchOrchestrator::new(&client, &scout, &bank, &config);

        let rows = orchestrator.run_batch(&assistant()).unwrap();

        let inflation_text = "Title: Inflation headline\nDescription: Inflation body\n\n";
        let election_text = "Title: Election headline\nDescription: Election body\n\n";
        for row in &rows {
            match row.group {
                Group::Control => assert!(row.context.is_empty()),
                Group::InflationContext => assert_eq!(row.context, inflation_text),
                Group::ElectionContext => assert_eq!(row.context, election_text),
            }
        }
    }

    #[test]
    fn failed_trial_is_dropped_and_the_batch_continues() {
        // First ask of the first session fails, killing trial 1 whatever
        // its group; the other three trials survive.
        let client = ScriptedClient::failing_at(1, 1);
        let scout = FixedScout;
        let bank = bank();
        let config = config(4, Some(11));
        let orchestrator = BatchOrchestrator::new(&client, &scout, &bank, &config);

        let rows = orchestrator.run_batch(&assistant()).unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn failure_on_third_question_drops_only_that_trial() {
        // A single-trial batch is always control, so ask 3 is question 3.
        let client = ScriptedClient::failing_at(1, 3);
        let scout = FixedScout;
        let bank = bank();
        let config = config(1, Some(1));
        let orchestrator = BatchOrchestrator::new(&client, &scout, &bank, &config);

        let rows = orchestrator.run_batch(&assistant()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn context_fetch_failure_aborts_before_any_trial() {
        let client = ScriptedClient::answering("ok");
        let scout = FailingScout;
        let bank = bank();
        let config = config(9, Some(5));
        let orchestrator = BatchOrchestrator::new(&client, &scout, &bank, &config);

        let err = orchestrator.run_batch(&assistant()).unwrap_err();
        assert!(matches!(err, SurveyError::ContextFetch { .. }));
        assert!(client.asked.borrow().is_empty());
    }

    #[test]
    fn all_control_batch_never_touches_the_scout() {
        let client = ScriptedClient::answering("ok");
        let scout = FailingScout;
        let bank = bank();
        let config = config(1, Some(1));
        let orchestrator = BatchOrchestrator::new(&client, &scout, &bank, &config);

        let rows = orchestrator.run_batch(&assistant()).unwrap();
        assert_eq!(rows.len(), 1);
    }
}
