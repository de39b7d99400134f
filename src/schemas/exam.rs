use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime, PrimitiveDateTime};
use validator::Validate;

use crate::exam::budget::TimeConstraints;
use crate::exam::model::{
    CodingQuestion, Difficulty, McqOption, McqQuestion, Question, TestCase,
};
use crate::exam::DefinitionError;

/// Exam definition as served by the grading backend for a batch.
#[derive(Debug, Clone, Deserialize, Validate)]
pub(crate) struct ExamDefinition {
    #[serde(alias = "examId")]
    #[validate(length(min = 1, message = "exam_id must not be empty"))]
    pub(crate) exam_id: String,
    #[serde(
        default,
        alias = "startTime",
        alias = "startDate",
        alias = "start_date",
        deserialize_with = "deserialize_option_offset_datetime_flexible"
    )]
    pub(crate) start_time: Option<OffsetDateTime>,
    #[serde(alias = "totalExamTime")]
    #[validate(range(exclusive_min = 0.0, message = "total_exam_time must be positive"))]
    pub(crate) total_exam_time: f64,
    #[serde(default)]
    #[validate(nested)]
    pub(crate) subjects: Vec<SubjectBlock>,
}

/// Some backend routes wrap the definition in `{ "exam": ... }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ExamEnvelope {
    Wrapped { exam: ExamDefinition },
    Bare(ExamDefinition),
}

impl ExamEnvelope {
    pub(crate) fn into_definition(self) -> ExamDefinition {
        match self {
            Self::Wrapped { exam } => exam,
            Self::Bare(exam) => exam,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub(crate) struct SubjectBlock {
    #[validate(length(min = 1, message = "subject must not be empty"))]
    pub(crate) subject: String,
    #[serde(default, alias = "MCQs", alias = "MCQ")]
    pub(crate) mcqs: Vec<McqPayload>,
    #[serde(default, alias = "Coding")]
    pub(crate) coding: Vec<CodingPayload>,
    #[serde(default, alias = "timeConstraints")]
    pub(crate) time_constraints: TimeConstraints,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct McqPayload {
    #[serde(alias = "_id")]
    pub(crate) id: String,
    #[serde(alias = "question")]
    pub(crate) prompt: String,
    #[serde(default)]
    pub(crate) options: Vec<OptionPayload>,
    #[serde(alias = "correctAnswer", alias = "correctOption")]
    pub(crate) correct_option: String,
    pub(crate) difficulty: Difficulty,
    #[serde(default)]
    pub(crate) score: f64,
}

/// Options arrive either as plain strings (the text doubles as the key) or as
/// explicit key/text pairs.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum OptionPayload {
    Keyed { key: String, text: String },
    Plain(String),
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CodingPayload {
    #[serde(alias = "_id")]
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) title: String,
    #[serde(default, alias = "problemStatement", alias = "description")]
    pub(crate) statement: String,
    #[serde(default)]
    pub(crate) constraints: Option<String>,
    #[serde(default, alias = "sampleInput")]
    pub(crate) sample_input: Option<String>,
    #[serde(default, alias = "sampleOutput")]
    pub(crate) sample_output: Option<String>,
    #[serde(default, alias = "testCases", alias = "hiddenTestCases")]
    pub(crate) hidden_test_cases: Vec<TestCasePayload>,
    pub(crate) difficulty: Difficulty,
    #[serde(default)]
    pub(crate) score: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TestCasePayload {
    #[serde(default)]
    pub(crate) input: String,
    #[serde(default, alias = "expectedOutput", alias = "output")]
    pub(crate) expected_output: String,
}

impl SubjectBlock {
    /// MCQs first, then coding questions, in delivery order.
    pub(crate) fn into_questions(self) -> Result<Vec<Question>, DefinitionError> {
        let subject = self.subject;
        let mut questions = Vec::with_capacity(self.mcqs.len() + self.coding.len());

        for mcq in self.mcqs {
            if mcq.options.is_empty() {
                return Err(DefinitionError::NoOptions(mcq.id));
            }
            let options = mcq
                .options
                .into_iter()
                .map(|option| match option {
                    OptionPayload::Keyed { key, text } => McqOption { key, text },
                    OptionPayload::Plain(text) => McqOption { key: text.clone(), text },
                })
                .collect();
            questions.push(Question::Mcq(McqQuestion {
                id: mcq.id,
                subject: subject.clone(),
                difficulty: mcq.difficulty,
                score: mcq.score,
                prompt: mcq.prompt,
                options,
                correct_option: mcq.correct_option,
            }));
        }

        for coding in self.coding {
            questions.push(Question::Coding(CodingQuestion {
                id: coding.id,
                subject: subject.clone(),
                difficulty: coding.difficulty,
                score: coding.score,
                title: coding.title,
                statement: coding.statement,
                constraints: coding.constraints,
                sample_input: coding.sample_input,
                sample_output: coding.sample_output,
                hidden_test_cases: coding
                    .hidden_test_cases
                    .into_iter()
                    .map(|case| TestCase { input: case.input, expected_output: case.expected_output })
                    .collect(),
            }));
        }

        Ok(questions)
    }
}

/// Grading backend reply to a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SubmissionReceipt {
    #[serde(default)]
    pub(crate) success: bool,
    #[serde(default)]
    pub(crate) message: String,
    #[serde(default)]
    pub(crate) analysis: Option<serde_json::Value>,
}

fn deserialize_option_offset_datetime_flexible<'de, D>(
    deserializer: D,
) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => parse_offset_datetime_flexible(&value)
            .ok_or_else(|| D::Error::custom(format!("invalid datetime: {value}")))
            .map(Some),
        None => Ok(None),
    }
}

fn parse_offset_datetime_flexible(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(value);
    }

    // datetime-local inputs come without a timezone.
    if raw.len() == 16 && raw.as_bytes().get(10) == Some(&b'T') {
        let candidate = format!("{raw}:00Z");
        if let Ok(value) = OffsetDateTime::parse(&candidate, &Rfc3339) {
            return Some(value);
        }
    }

    if raw.len() == 19 && raw.as_bytes().get(10) == Some(&b'T') {
        let candidate = format!("{raw}Z");
        if let Ok(value) = OffsetDateTime::parse(&candidate, &Rfc3339) {
            return Some(value);
        }
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Some(value.assume_utc());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn parses_backend_definition() {
        let raw = json!({
            "examId": "e-42",
            "startDate": "2025-04-01T10:00",
            "totalExamTime": 45,
            "subjects": [{
                "subject": "DSA",
                "MCQs": [{
                    "_id": "m1",
                    "question": "Complexity of binary search?",
                    "options": [{"key": "a", "text": "O(n)"}, {"key": "b", "text": "O(log n)"}],
                    "correctAnswer": "b",
                    "difficulty": "Easy",
                    "score": 2
                }],
                "Coding": [{
                    "_id": "c1",
                    "title": "Reverse",
                    "problemStatement": "Reverse a string",
                    "sampleInput": "abc",
                    "sampleOutput": "cba",
                    "testCases": [{"input": "xy", "expectedOutput": "yx"}],
                    "difficulty": "hard"
                }],
                "timeConstraints": {"MCQs": {"easy": 5}, "Coding": {"hard": 30}}
            }]
        });

        let definition: ExamDefinition = serde_json::from_value(raw).expect("definition");
        assert!(definition.validate().is_ok());
        assert_eq!(definition.exam_id, "e-42");
        assert_eq!(definition.start_time, Some(datetime!(2025-04-01 10:00 UTC)));

        let questions = definition.subjects[0].clone().into_questions().expect("questions");
        assert_eq!(questions.len(), 2);
        let Question::Mcq(mcq) = &questions[0] else { panic!("expected mcq") };
        assert!(mcq.has_option("b"));
        assert_eq!(mcq.subject, "DSA");
        let Question::Coding(coding) = &questions[1] else { panic!("expected coding") };
        assert_eq!(coding.hidden_test_cases.len(), 1);
    }

    #[test]
    fn document_id_does_not_clash_with_exam_id() {
        let raw = json!({
            "_id": "665f1c2e9b1d4a0012ab34cd",
            "examId": "e-42",
            "totalExamTime": 20,
            "subjects": [{"subject": "Math"}]
        });

        let envelope: ExamEnvelope = serde_json::from_value(raw).expect("envelope");
        assert_eq!(envelope.into_definition().exam_id, "e-42");
    }

    #[test]
    fn envelope_accepts_wrapped_and_bare() {
        let bare = json!({"examId": "e1", "totalExamTime": 10, "subjects": []});
        let wrapped = json!({"exam": bare.clone()});
        let a: ExamEnvelope = serde_json::from_value(bare).expect("bare");
        let b: ExamEnvelope = serde_json::from_value(wrapped).expect("wrapped");
        assert_eq!(a.into_definition().exam_id, "e1");
        assert_eq!(b.into_definition().exam_id, "e1");
    }

    #[test]
    fn validation_rejects_non_positive_duration() {
        let definition: ExamDefinition = serde_json::from_value(json!({
            "examId": "e1",
            "totalExamTime": 0,
            "subjects": [{"subject": "Math"}]
        }))
        .expect("definition");
        assert!(definition.validate().is_err());
    }

    #[test]
    fn mcq_without_options_is_rejected() {
        let block: SubjectBlock = serde_json::from_value(json!({
            "subject": "Math",
            "MCQs": [{"_id": "m1", "question": "?", "correctAnswer": "a", "difficulty": "easy"}]
        }))
        .expect("block");
        assert_eq!(block.into_questions().err(), Some(DefinitionError::NoOptions("m1".to_string())));
    }
}
