use std::collections::{HashMap, HashSet};

use time::{Duration, OffsetDateTime};

use crate::exam::budget::BudgetTable;
use crate::exam::model::{Question, QuestionRuntimeStatus, ResponseEntry, Section};
use crate::exam::monitor::{IntegrityMonitor, IntegritySignal, TabSwitchPolicy, Verdict};
use crate::exam::navigation::{self, Cursor, Direction, Layout, NavigationRequest};
use crate::exam::submission::{
    self, SubmissionOutcome, SubmissionPayload, SubmissionState, SubmitTrigger,
};
use crate::exam::{DefinitionError, ExamError};
use crate::schemas::exam::ExamDefinition;

const MAX_EXAM_MINUTES: f64 = 7.0 * 24.0 * 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Phase {
    NotStarted,
    InProgress,
    Submitting,
    Ended,
    TornDown,
}

impl Phase {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Submitting => "submitting",
            Self::Ended => "ended",
            Self::TornDown => "torn_down",
        }
    }
}

/// Inputs to [`ExamSession::apply`].
#[derive(Debug, Clone)]
pub(crate) enum Command {
    Start,
    Tick,
    Answer { question_id: String, response: ResponseEntry },
    Navigate(NavigationRequest),
    Integrity(IntegritySignal),
    Submit,
    SubmissionFinished(SubmissionOutcome),
    TearDown,
}

/// Observable consequences of a transition. `Submit` must be delivered to the
/// grading backend by the caller; it is emitted at most once per session.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Effect {
    QuestionShown { question_id: String },
    QuestionLocked { question_id: String },
    Exhausted,
    AnswerRecorded { question_id: String },
    Integrity(Verdict),
    Submit { trigger: SubmitTrigger, payload: SubmissionPayload },
    Ended,
}

#[derive(Debug, Clone)]
pub(crate) struct ExamSession {
    exam_id: String,
    started_at: OffsetDateTime,
    deadline: OffsetDateTime,
    mcq: Vec<Question>,
    coding: Vec<Question>,
    budgets: BudgetTable,
    statuses: HashMap<String, QuestionRuntimeStatus>,
    responses: HashMap<String, ResponseEntry>,
    current: Option<Cursor>,
    phase: Phase,
    submission: SubmissionState,
    monitor: IntegrityMonitor,
    ended_at: Option<OffsetDateTime>,
}

impl ExamSession {
    pub(crate) fn from_definition(
        definition: ExamDefinition,
        created_at: OffsetDateTime,
        policy: TabSwitchPolicy,
    ) -> Result<Self, DefinitionError> {
        let minutes = definition.total_exam_time;
        if !minutes.is_finite() || minutes <= 0.0 || minutes > MAX_EXAM_MINUTES {
            return Err(DefinitionError::InvalidDuration);
        }

        let started_at = definition.start_time.unwrap_or(created_at);
        let deadline = started_at + Duration::seconds_f64(minutes * 60.0);

        let mut mcq = Vec::new();
        let mut coding = Vec::new();
        let mut budgets = BudgetTable::default();
        let mut seen = HashSet::new();

        for block in definition.subjects {
            let constraints = block.time_constraints;
            let questions = block.into_questions()?;
            for question in &questions {
                if question.id().trim().is_empty() {
                    return Err(DefinitionError::MissingQuestionId);
                }
                if question.id() == submission::EXAM_ID_KEY {
                    return Err(DefinitionError::ReservedQuestionId(question.id().to_string()));
                }
                if let Question::Mcq(mcq) = question {
                    if !mcq.has_option(&mcq.correct_option) {
                        return Err(DefinitionError::UnknownCorrectOption(mcq.id.clone()));
                    }
                }
                if !seen.insert(question.id().to_string()) {
                    return Err(DefinitionError::DuplicateQuestion(question.id().to_string()));
                }
            }
            budgets.allocate_subject(&constraints, &questions);
            for question in questions {
                match question.section() {
                    Section::Mcq => mcq.push(question),
                    Section::Coding => coding.push(question),
                }
            }
        }

        if mcq.is_empty() && coding.is_empty() {
            return Err(DefinitionError::Empty);
        }

        let statuses = seen.into_iter().map(|id| (id, QuestionRuntimeStatus::default())).collect();

        Ok(Self {
            exam_id: definition.exam_id,
            started_at,
            deadline,
            mcq,
            coding,
            budgets,
            statuses,
            responses: HashMap::new(),
            current: None,
            phase: Phase::NotStarted,
            submission: SubmissionState::NotSubmitted,
            monitor: IntegrityMonitor::new(policy),
            ended_at: None,
        })
    }

    /// Single entry point for every state transition.
    pub(crate) fn apply(
        &mut self,
        command: Command,
        now: OffsetDateTime,
    ) -> Result<Vec<Effect>, ExamError> {
        let mut effects = Vec::new();

        match command {
            Command::Start => self.start(now, &mut effects)?,
            Command::Tick => self.tick(now, &mut effects),
            Command::Answer { question_id, response } => {
                self.record_answer(question_id, response, &mut effects)?
            }
            Command::Navigate(request) => self.navigate(request, &mut effects)?,
            Command::Integrity(signal) => self.report(&signal, &mut effects),
            Command::Submit => {
                self.ensure_live()?;
                self.request_submit(SubmitTrigger::Manual, &mut effects);
            }
            Command::SubmissionFinished(outcome) => {
                self.finish_submission(outcome, now, &mut effects)?
            }
            Command::TearDown => self.tear_down(),
        }

        Ok(effects)
    }

    fn start(&mut self, now: OffsetDateTime, effects: &mut Vec<Effect>) -> Result<(), ExamError> {
        if self.phase != Phase::NotStarted {
            return Err(ExamError::SessionEnded);
        }

        self.phase = Phase::InProgress;
        if now >= self.deadline {
            self.request_submit(SubmitTrigger::Deadline, effects);
            return Ok(());
        }

        let first = self.step(None, Direction::Forward);
        self.show(first, effects);
        Ok(())
    }

    /// One second of wall time. The overall deadline wins over the per-question
    /// countdown.
    fn tick(&mut self, now: OffsetDateTime, effects: &mut Vec<Effect>) {
        if self.phase != Phase::InProgress {
            return;
        }

        if now >= self.deadline {
            self.request_submit(SubmitTrigger::Deadline, effects);
            return;
        }

        let Some(cursor) = self.current else {
            return;
        };
        let question_id = self.question_at(cursor).id().to_string();
        let Some(status) = self.statuses.get_mut(&question_id) else {
            return;
        };
        if status.locked {
            return;
        }

        let left = status.time_left.unwrap_or(0).saturating_sub(1);
        status.time_left = Some(left);
        if left == 0 {
            status.lock();
            effects.push(Effect::QuestionLocked { question_id });
            let next = self.step(Some(cursor), Direction::Forward);
            self.show(next, effects);
        }
    }

    fn record_answer(
        &mut self,
        question_id: String,
        response: ResponseEntry,
        effects: &mut Vec<Effect>,
    ) -> Result<(), ExamError> {
        self.ensure_live()?;

        let question = self
            .find(&question_id)
            .map(|(_, question)| question)
            .ok_or_else(|| ExamError::UnknownQuestion(question_id.clone()))?;

        if self.status(&question_id).is_some_and(|status| status.locked) {
            return Err(ExamError::QuestionLocked(question_id));
        }
        if self.current_question().map(Question::id) != Some(question_id.as_str()) {
            return Err(ExamError::NotCurrent(question_id));
        }

        match (question, &response) {
            (Question::Mcq(mcq), ResponseEntry::Mcq { selected_option }) => {
                if !mcq.has_option(selected_option) {
                    return Err(ExamError::UnknownOption {
                        question_id,
                        option: selected_option.clone(),
                    });
                }
            }
            (Question::Coding(_), ResponseEntry::Coding { .. }) => {}
            (question, _) => {
                return Err(ExamError::WrongVariant {
                    question_id,
                    expected: question.section(),
                });
            }
        }

        let answered = response.counts_as_answered();
        if let Some(status) = self.statuses.get_mut(&question_id) {
            status.answered = answered;
        }
        self.responses.insert(question_id.clone(), response);
        effects.push(Effect::AnswerRecorded { question_id });
        Ok(())
    }

    fn navigate(
        &mut self,
        request: NavigationRequest,
        effects: &mut Vec<Effect>,
    ) -> Result<(), ExamError> {
        self.ensure_live()?;

        let target = match request {
            NavigationRequest::Next => self.step(self.current, Direction::Forward),
            NavigationRequest::Previous => self.step(self.current, Direction::Backward),
            NavigationRequest::Select { question_id } => {
                let (cursor, _) = self
                    .find(&question_id)
                    .ok_or_else(|| ExamError::UnknownQuestion(question_id.clone()))?;
                if self.is_locked(cursor) {
                    return Err(ExamError::QuestionLocked(question_id));
                }
                Some(cursor)
            }
        };

        self.show(target, effects);
        Ok(())
    }

    fn report(&mut self, signal: &IntegritySignal, effects: &mut Vec<Effect>) {
        if self.phase != Phase::InProgress || self.submission.is_submitted() {
            effects.push(Effect::Integrity(Verdict::Ignored));
            return;
        }

        let verdict = self.monitor.observe(signal);
        effects.push(Effect::Integrity(verdict));
        if let Verdict::Terminate { violation } = verdict {
            self.request_submit(SubmitTrigger::Integrity { violation }, effects);
        }
    }

    /// Moves into `Submitting` and emits the payload, unless some other trigger got
    /// there first.
    fn request_submit(&mut self, trigger: SubmitTrigger, effects: &mut Vec<Effect>) {
        if !self.submission.begin(trigger) {
            return;
        }

        self.phase = Phase::Submitting;
        self.monitor.stop();
        let payload = submission::assemble(
            &self.exam_id,
            self.mcq.iter().chain(self.coding.iter()),
            &self.responses,
        );
        effects.push(Effect::Submit { trigger, payload });
    }

    fn finish_submission(
        &mut self,
        outcome: SubmissionOutcome,
        now: OffsetDateTime,
        effects: &mut Vec<Effect>,
    ) -> Result<(), ExamError> {
        if !matches!(self.phase, Phase::Submitting | Phase::TornDown)
            || !self.submission.finish(outcome)
        {
            return Err(ExamError::SessionEnded);
        }

        // A torn down session still records where its in-flight submission landed.
        if self.phase == Phase::Submitting {
            self.phase = Phase::Ended;
            self.ended_at = Some(now);
            effects.push(Effect::Ended);
        }
        Ok(())
    }

    fn tear_down(&mut self) {
        self.phase = Phase::TornDown;
        self.monitor.stop();
    }

    /// Makes `target` current, initialising its countdown on first display. Zero
    /// budgets lock on sight and hand over to the next unlocked question.
    fn show(&mut self, mut target: Option<Cursor>, effects: &mut Vec<Effect>) {
        loop {
            let Some(cursor) = target else {
                self.current = None;
                effects.push(Effect::Exhausted);
                return;
            };

            let question_id = self.question_at(cursor).id().to_string();
            let budget = self.budgets.seconds_for(&question_id);
            let status = self.statuses.entry(question_id.clone()).or_default();
            status.visited = true;
            let left = *status.time_left.get_or_insert(budget);

            if left == 0 {
                if !status.locked {
                    status.lock();
                    effects.push(Effect::QuestionLocked { question_id });
                }
                target = self.step(Some(cursor), Direction::Forward);
                continue;
            }

            self.current = Some(cursor);
            effects.push(Effect::QuestionShown { question_id });
            return;
        }
    }

    fn step(&self, from: Option<Cursor>, direction: Direction) -> Option<Cursor> {
        navigation::step(self.layout(), from, direction, |cursor| self.is_locked(cursor))
    }

    fn ensure_live(&self) -> Result<(), ExamError> {
        match self.phase {
            Phase::NotStarted => Err(ExamError::NotStarted),
            Phase::InProgress if !self.submission.is_submitted() => Ok(()),
            _ => Err(ExamError::SessionEnded),
        }
    }

    fn layout(&self) -> Layout {
        Layout { mcq: self.mcq.len(), coding: self.coding.len() }
    }

    fn section_list(&self, section: Section) -> &[Question] {
        match section {
            Section::Mcq => &self.mcq,
            Section::Coding => &self.coding,
        }
    }

    fn question_at(&self, cursor: Cursor) -> &Question {
        &self.section_list(cursor.section)[cursor.index]
    }

    fn is_locked(&self, cursor: Cursor) -> bool {
        let question = self.question_at(cursor);
        self.statuses.get(question.id()).is_some_and(|status| status.locked)
    }

    fn find(&self, question_id: &str) -> Option<(Cursor, &Question)> {
        [Section::Mcq, Section::Coding].into_iter().find_map(|section| {
            self.section_list(section)
                .iter()
                .position(|question| question.id() == question_id)
                .map(|index| (Cursor::new(section, index), &self.section_list(section)[index]))
        })
    }

    pub(crate) fn exam_id(&self) -> &str {
        &self.exam_id
    }

    pub(crate) fn started_at(&self) -> OffsetDateTime {
        self.started_at
    }

    pub(crate) fn deadline(&self) -> OffsetDateTime {
        self.deadline
    }

    pub(crate) fn ended_at(&self) -> Option<OffsetDateTime> {
        self.ended_at
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn submission(&self) -> &SubmissionState {
        &self.submission
    }

    #[cfg(test)]
    pub(crate) fn submitted(&self) -> bool {
        self.submission.is_submitted()
    }

    pub(crate) fn monitor(&self) -> &IntegrityMonitor {
        &self.monitor
    }

    #[cfg(test)]
    pub(crate) fn current(&self) -> Option<Cursor> {
        self.current
    }

    pub(crate) fn current_question(&self) -> Option<&Question> {
        self.current.map(|cursor| self.question_at(cursor))
    }

    pub(crate) fn questions(&self) -> impl Iterator<Item = &Question> {
        self.mcq.iter().chain(self.coding.iter())
    }

    pub(crate) fn status(&self, question_id: &str) -> Option<&QuestionRuntimeStatus> {
        self.statuses.get(question_id)
    }

    pub(crate) fn response(&self, question_id: &str) -> Option<&ResponseEntry> {
        self.responses.get(question_id)
    }

    /// Whole seconds until the deadline, negative once it has passed.
    pub(crate) fn remaining_seconds(&self, now: OffsetDateTime) -> i64 {
        (self.deadline - now).whole_seconds()
    }
}
