use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::exam::model::{Question, ResponseEntry};
use crate::exam::monitor::Violation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum SubmitTrigger {
    Manual,
    Deadline,
    Integrity { violation: Violation },
}

impl SubmitTrigger {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Deadline => "deadline",
            Self::Integrity { .. } => "integrity",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub(crate) enum SubmittedAnswer {
    Option(String),
    #[serde(rename_all = "camelCase")]
    Code { source_code: String, language: String },
}

/// Payload key holding the exam id; no question may use it as its id.
pub(crate) const EXAM_ID_KEY: &str = "examId";

/// Wire payload for the grading backend: the exam id plus one entry per answered
/// question id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct SubmissionPayload {
    #[serde(rename = "examId")]
    pub(crate) exam_id: String,
    #[serde(flatten)]
    pub(crate) answers: BTreeMap<String, SubmittedAnswer>,
}

/// Walks the authoritative question list so ids the exam does not contain can
/// never reach the payload.
pub(crate) fn assemble<'a>(
    exam_id: &str,
    questions: impl IntoIterator<Item = &'a Question>,
    responses: &HashMap<String, ResponseEntry>,
) -> SubmissionPayload {
    let mut answers = BTreeMap::new();

    for question in questions {
        let Some(entry) = responses.get(question.id()) else {
            continue;
        };

        let answer = match (question, entry) {
            (Question::Mcq(_), ResponseEntry::Mcq { selected_option }) => {
                SubmittedAnswer::Option(selected_option.clone())
            }
            (Question::Coding(_), ResponseEntry::Coding { source_code, language, test_case_summary }) => {
                if !test_case_summary.attempted() {
                    continue;
                }
                SubmittedAnswer::Code { source_code: source_code.clone(), language: language.clone() }
            }
            _ => continue,
        };

        answers.insert(question.id().to_string(), answer);
    }

    SubmissionPayload { exam_id: exam_id.to_string(), answers }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SubmissionOutcome {
    Accepted { message: String, analysis: Option<serde_json::Value> },
    Rejected { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub(crate) enum SubmissionState {
    NotSubmitted,
    Submitting {
        trigger: SubmitTrigger,
    },
    Submitted {
        trigger: SubmitTrigger,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        analysis: Option<serde_json::Value>,
    },
    Failed {
        trigger: SubmitTrigger,
        message: String,
    },
}

impl SubmissionState {
    pub(crate) fn is_submitted(&self) -> bool {
        !matches!(self, Self::NotSubmitted)
    }

    pub(crate) fn trigger(&self) -> Option<SubmitTrigger> {
        match self {
            Self::NotSubmitted => None,
            Self::Submitting { trigger }
            | Self::Submitted { trigger, .. }
            | Self::Failed { trigger, .. } => Some(*trigger),
        }
    }

    /// Enters `Submitting` only from `NotSubmitted`; every later trigger is refused.
    pub(crate) fn begin(&mut self, trigger: SubmitTrigger) -> bool {
        if self.is_submitted() {
            return false;
        }
        *self = Self::Submitting { trigger };
        true
    }

    pub(crate) fn finish(&mut self, outcome: SubmissionOutcome) -> bool {
        let Self::Submitting { trigger } = *self else {
            return false;
        };
        *self = match outcome {
            SubmissionOutcome::Accepted { message, analysis } => {
                Self::Submitted { trigger, message, analysis }
            }
            SubmissionOutcome::Rejected { message } => Self::Failed { trigger, message },
        };
        true
    }
}
