use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Difficulty {
    #[serde(alias = "Easy", alias = "EASY")]
    Easy,
    #[serde(alias = "Medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "Hard", alias = "HARD")]
    Hard,
}

impl Difficulty {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Section {
    Mcq,
    Coding,
}

impl Section {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Mcq => "mcq",
            Self::Coding => "coding",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct McqOption {
    pub(crate) key: String,
    pub(crate) text: String,
}

#[derive(Debug, Clone)]
pub(crate) struct McqQuestion {
    pub(crate) id: String,
    pub(crate) subject: String,
    pub(crate) difficulty: Difficulty,
    pub(crate) score: f64,
    pub(crate) prompt: String,
    pub(crate) options: Vec<McqOption>,
    pub(crate) correct_option: String,
}

impl McqQuestion {
    pub(crate) fn has_option(&self, key: &str) -> bool {
        self.options.iter().any(|option| option.key == key)
    }
}

/// Run by the grading backend; the conductor only carries them.
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TestCase {
    pub(crate) input: String,
    pub(crate) expected_output: String,
}

#[derive(Debug, Clone)]
pub(crate) struct CodingQuestion {
    pub(crate) id: String,
    pub(crate) subject: String,
    pub(crate) difficulty: Difficulty,
    pub(crate) score: f64,
    pub(crate) title: String,
    pub(crate) statement: String,
    pub(crate) constraints: Option<String>,
    pub(crate) sample_input: Option<String>,
    pub(crate) sample_output: Option<String>,
    pub(crate) hidden_test_cases: Vec<TestCase>,
}

/// A question as delivered by the grading backend. Immutable for the lifetime of a
/// session.
#[derive(Debug, Clone)]
pub(crate) enum Question {
    Mcq(McqQuestion),
    Coding(CodingQuestion),
}

impl Question {
    pub(crate) fn id(&self) -> &str {
        match self {
            Self::Mcq(question) => &question.id,
            Self::Coding(question) => &question.id,
        }
    }

    pub(crate) fn subject(&self) -> &str {
        match self {
            Self::Mcq(question) => &question.subject,
            Self::Coding(question) => &question.subject,
        }
    }

    pub(crate) fn difficulty(&self) -> Difficulty {
        match self {
            Self::Mcq(question) => question.difficulty,
            Self::Coding(question) => question.difficulty,
        }
    }

    pub(crate) fn section(&self) -> Section {
        match self {
            Self::Mcq(_) => Section::Mcq,
            Self::Coding(_) => Section::Coding,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TestCaseSummary {
    #[serde(default)]
    pub(crate) passed: u32,
    #[serde(default)]
    pub(crate) failed: u32,
}

impl TestCaseSummary {
    pub(crate) fn attempted(&self) -> bool {
        self.passed > 0 || self.failed > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ResponseEntry {
    Mcq {
        #[serde(alias = "selectedOption")]
        selected_option: String,
    },
    Coding {
        #[serde(alias = "sourceCode")]
        source_code: String,
        language: String,
        #[serde(default, alias = "testCaseSummary")]
        test_case_summary: TestCaseSummary,
    },
}

impl ResponseEntry {
    /// Coding drafts that were never run against any test case do not count.
    pub(crate) fn counts_as_answered(&self) -> bool {
        match self {
            Self::Mcq { .. } => true,
            Self::Coding { test_case_summary, .. } => test_case_summary.attempted(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub(crate) struct QuestionRuntimeStatus {
    pub(crate) visited: bool,
    pub(crate) answered: bool,
    pub(crate) locked: bool,
    pub(crate) time_left: Option<u64>,
}

impl QuestionRuntimeStatus {
    pub(crate) fn lock(&mut self) {
        self.locked = true;
        self.time_left = Some(0);
    }
}
