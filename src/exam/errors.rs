use thiserror::Error;

use crate::exam::model::Section;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum ExamError {
    #[error("question {0} is not part of this exam")]
    UnknownQuestion(String),
    #[error("question {0} is locked")]
    QuestionLocked(String),
    #[error("question {0} is not the current question")]
    NotCurrent(String),
    #[error("question {question_id} expects a {expected} response")]
    WrongVariant { question_id: String, expected: Section },
    #[error("option '{option}' does not exist on question {question_id}")]
    UnknownOption { question_id: String, option: String },
    #[error("exam session has not started")]
    NotStarted,
    #[error("exam session has already ended")]
    SessionEnded,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum DefinitionError {
    #[error("exam has no questions")]
    Empty,
    #[error("question id '{0}' appears more than once")]
    DuplicateQuestion(String),
    #[error("question id must not be empty")]
    MissingQuestionId,
    #[error("question id '{0}' is reserved for the submission payload")]
    ReservedQuestionId(String),
    #[error("total exam time must be positive")]
    InvalidDuration,
    #[error("question {0} has a correct answer that is not one of its options")]
    UnknownCorrectOption(String),
    #[error("question {0} has no options")]
    NoOptions(String),
}
