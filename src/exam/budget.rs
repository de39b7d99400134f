use std::collections::HashMap;

use serde::Deserialize;

use crate::exam::model::{Difficulty, Question, Section};

/// Minutes a subject allocates to all questions of each difficulty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub(crate) struct DifficultyPools {
    #[serde(default)]
    pub(crate) easy: Option<f64>,
    #[serde(default)]
    pub(crate) medium: Option<f64>,
    #[serde(default)]
    pub(crate) hard: Option<f64>,
}

impl DifficultyPools {
    pub(crate) fn minutes(&self, difficulty: Difficulty) -> Option<f64> {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub(crate) struct TimeConstraints {
    #[serde(default, alias = "MCQs", alias = "MCQ")]
    pub(crate) mcq: DifficultyPools,
    #[serde(default, alias = "Coding")]
    pub(crate) coding: DifficultyPools,
}

impl TimeConstraints {
    pub(crate) fn pool(&self, section: Section, difficulty: Difficulty) -> Option<f64> {
        match section {
            Section::Mcq => self.mcq.minutes(difficulty),
            Section::Coding => self.coding.minutes(difficulty),
        }
    }
}

/// Per-question countdown budgets, in whole seconds.
#[derive(Debug, Clone, Default)]
pub(crate) struct BudgetTable {
    seconds: HashMap<String, u64>,
}

impl BudgetTable {
    /// Splits each (section, difficulty) pool of one subject evenly across the
    /// subject's questions in that group.
    pub(crate) fn allocate_subject(&mut self, constraints: &TimeConstraints, questions: &[Question]) {
        let mut group_sizes: HashMap<(Section, Difficulty), usize> = HashMap::new();
        for question in questions {
            *group_sizes.entry((question.section(), question.difficulty())).or_default() += 1;
        }

        for question in questions {
            let key = (question.section(), question.difficulty());
            let group_size = group_sizes.get(&key).copied().unwrap_or(0);
            let pool = constraints.pool(key.0, key.1);
            let budget = split_pool(pool, group_size);
            if pool.is_none() {
                tracing::warn!(
                    question_id = %question.id(),
                    subject = %question.subject(),
                    section = %key.0,
                    difficulty = key.1.as_str(),
                    "No time pool configured; question gets a zero budget"
                );
            }
            self.seconds.insert(question.id().to_string(), budget);
        }
    }

    pub(crate) fn seconds_for(&self, question_id: &str) -> u64 {
        self.seconds.get(question_id).copied().unwrap_or(0)
    }
}

/// `floor(pool_minutes / group_size * 60)`; missing, negative or non-finite pools
/// yield zero.
pub(crate) fn split_pool(pool_minutes: Option<f64>, group_size: usize) -> u64 {
    let Some(minutes) = pool_minutes else {
        return 0;
    };
    if group_size == 0 || !minutes.is_finite() || minutes <= 0.0 {
        return 0;
    }

    (minutes * 60.0 / group_size as f64).floor() as u64
}
