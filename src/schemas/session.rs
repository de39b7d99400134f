use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::{Validate, ValidationError};

use crate::core::time::{format_hms, format_offset};
use crate::exam::model::{Difficulty, McqOption, Question, ResponseEntry, Section};
use crate::exam::monitor::Verdict;
use crate::exam::session::{ExamSession, Phase};
use crate::exam::submission::SubmissionState;
use crate::schemas::exam::ExamDefinition;

/// Either a batch id to fetch from the grading backend or an inline definition.
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_exam_source"))]
pub(crate) struct CreateSessionRequest {
    #[serde(default, alias = "batchId")]
    #[validate(length(min = 1, max = 128), custom(function = "validate_batch_id"))]
    pub(crate) batch_id: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub(crate) exam: Option<ExamDefinition>,
}

/// Batch ids are opaque backend keys: letters, digits, `-` and `_` only.
fn validate_batch_id(batch_id: &str) -> Result<(), ValidationError> {
    if batch_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        Ok(())
    } else {
        Err(ValidationError::new("batch_id_charset"))
    }
}

fn validate_exam_source(request: &CreateSessionRequest) -> Result<(), ValidationError> {
    match (&request.batch_id, &request.exam) {
        (Some(_), None) | (None, Some(_)) => Ok(()),
        _ => Err(ValidationError::new("exactly_one_of_batch_id_or_exam")),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnswerRequest {
    #[serde(alias = "questionId")]
    pub(crate) question_id: String,
    #[serde(flatten)]
    pub(crate) response: ResponseEntry,
}

#[derive(Debug, Serialize)]
pub(crate) struct IntegrityEventResponse {
    pub(crate) verdict: Verdict,
    pub(crate) session: SessionView,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionView {
    pub(crate) session_id: String,
    pub(crate) exam_id: String,
    pub(crate) phase: Phase,
    pub(crate) started_at: String,
    pub(crate) deadline: String,
    pub(crate) ended_at: Option<String>,
    pub(crate) remaining_seconds: i64,
    pub(crate) remaining: String,
    pub(crate) current_question: Option<QuestionView>,
    pub(crate) palette: Vec<PaletteEntry>,
    pub(crate) integrity: IntegrityView,
    pub(crate) submission: SubmissionState,
}

/// What the client may see of a question: no correct option, no hidden tests.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum QuestionView {
    Mcq {
        id: String,
        subject: String,
        difficulty: Difficulty,
        score: f64,
        prompt: String,
        options: Vec<McqOption>,
        time_left: Option<u64>,
        response: Option<ResponseEntry>,
    },
    Coding {
        id: String,
        subject: String,
        difficulty: Difficulty,
        score: f64,
        title: String,
        statement: String,
        constraints: Option<String>,
        sample_input: Option<String>,
        sample_output: Option<String>,
        hidden_tests: usize,
        time_left: Option<u64>,
        response: Option<ResponseEntry>,
    },
}

#[derive(Debug, Serialize)]
pub(crate) struct PaletteEntry {
    pub(crate) question_id: String,
    pub(crate) section: Section,
    pub(crate) visited: bool,
    pub(crate) answered: bool,
    pub(crate) locked: bool,
    pub(crate) time_left: Option<u64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct IntegrityView {
    pub(crate) active: bool,
    pub(crate) tab_switches: u32,
    pub(crate) warnings: u32,
}

impl SessionView {
    pub(crate) fn build(session_id: &str, session: &ExamSession, now: OffsetDateTime) -> Self {
        let remaining_seconds = session.remaining_seconds(now).max(0);

        let current_question = session.current_question().map(|question| {
            let time_left = session.status(question.id()).and_then(|status| status.time_left);
            let response = session.response(question.id()).cloned();
            match question {
                Question::Mcq(mcq) => QuestionView::Mcq {
                    id: mcq.id.clone(),
                    subject: mcq.subject.clone(),
                    difficulty: mcq.difficulty,
                    score: mcq.score,
                    prompt: mcq.prompt.clone(),
                    options: mcq.options.clone(),
                    time_left,
                    response,
                },
                Question::Coding(coding) => QuestionView::Coding {
                    id: coding.id.clone(),
                    subject: coding.subject.clone(),
                    difficulty: coding.difficulty,
                    score: coding.score,
                    title: coding.title.clone(),
                    statement: coding.statement.clone(),
                    constraints: coding.constraints.clone(),
                    sample_input: coding.sample_input.clone(),
                    sample_output: coding.sample_output.clone(),
                    hidden_tests: coding.hidden_test_cases.len(),
                    time_left,
                    response,
                },
            }
        });

        let palette = session
            .questions()
            .map(|question| {
                let status = session.status(question.id()).copied().unwrap_or_default();
                PaletteEntry {
                    question_id: question.id().to_string(),
                    section: question.section(),
                    visited: status.visited,
                    answered: status.answered,
                    locked: status.locked,
                    time_left: status.time_left,
                }
            })
            .collect();

        let monitor = session.monitor();

        Self {
            session_id: session_id.to_string(),
            exam_id: session.exam_id().to_string(),
            phase: session.phase(),
            started_at: format_offset(session.started_at()),
            deadline: format_offset(session.deadline()),
            ended_at: session.ended_at().map(format_offset),
            remaining_seconds,
            remaining: format_hms(remaining_seconds),
            current_question,
            palette,
            integrity: IntegrityView {
                active: monitor.is_active(),
                tab_switches: monitor.tab_switches(),
                warnings: monitor.warnings(),
            },
            submission: session.submission().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exam::monitor::TabSwitchPolicy;
    use crate::exam::session::Command;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn create_request_needs_exactly_one_source() {
        let neither: CreateSessionRequest = serde_json::from_value(json!({})).expect("parse");
        assert!(neither.validate().is_err());

        let batch: CreateSessionRequest =
            serde_json::from_value(json!({"batchId": "b-7"})).expect("parse");
        assert!(batch.validate().is_ok());
        assert_eq!(batch.batch_id.as_deref(), Some("b-7"));

        let traversal: CreateSessionRequest =
            serde_json::from_value(json!({"batchId": "../b-7"})).expect("parse");
        assert!(traversal.validate().is_err());
    }

    #[test]
    fn answer_request_flattens_response() {
        let request: AnswerRequest = serde_json::from_value(json!({
            "questionId": "m1",
            "type": "mcq",
            "selectedOption": "b"
        }))
        .expect("answer");
        assert_eq!(request.question_id, "m1");
        assert_eq!(request.response, ResponseEntry::Mcq { selected_option: "b".to_string() });
    }

    #[test]
    fn view_hides_answer_key_and_clamps_remaining() {
        let t0 = datetime!(2025-05-05 12:00 UTC);
        let definition: ExamDefinition = serde_json::from_value(json!({
            "examId": "e-1",
            "totalExamTime": 1,
            "subjects": [{
                "subject": "Logic",
                "MCQs": [{"_id": "m1", "question": "p or not p?", "options": ["true", "false"],
                          "correctAnswer": "true", "difficulty": "easy"}],
                "timeConstraints": {"MCQs": {"easy": 1}}
            }]
        }))
        .expect("definition");
        let mut session =
            ExamSession::from_definition(definition, t0, TabSwitchPolicy::Immediate).expect("session");
        session.apply(Command::Start, t0).expect("start");

        let view = SessionView::build("s-1", &session, t0 + time::Duration::seconds(75));
        assert_eq!(view.remaining_seconds, 0);
        assert_eq!(view.remaining, "00:00:00");
        assert_eq!(view.palette.len(), 1);

        let json = serde_json::to_value(&view).expect("serialize");
        assert_eq!(json["current_question"]["type"], "mcq");
        assert_eq!(json["current_question"]["time_left"], 60);
        assert!(json["current_question"].get("correct_option").is_none());
        assert_eq!(json["submission"]["state"], "not_submitted");
        assert_eq!(json["phase"], "in_progress");
    }
}
