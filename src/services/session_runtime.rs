use std::sync::{Arc, Weak};
use std::time::Duration as StdDuration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use uuid::Uuid;

use crate::core::time::SessionClock;
use crate::exam::monitor::{IntegritySignal, Verdict};
use crate::exam::session::{Command, Effect, ExamSession, Phase};
use crate::exam::submission::{SubmissionOutcome, SubmissionPayload, SubmitTrigger};
use crate::exam::ExamError;
use crate::schemas::session::SessionView;
use crate::services::grading_backend::{outcome_of, GradingBackend};

const TICK_PERIOD: StdDuration = StdDuration::from_secs(1);

type PendingSubmit = (SubmitTrigger, SubmissionPayload);

/// Shared handle to one live exam session and its ticker.
#[derive(Clone)]
pub(crate) struct SessionHandle {
    inner: Arc<Inner>,
}

struct Inner {
    id: Uuid,
    slot: Mutex<Slot>,
    backend: Arc<dyn GradingBackend>,
    clock: SessionClock,
}

struct Slot {
    session: ExamSession,
    ticker: Option<TickerGuard>,
}

/// Aborts the ticker task when the session goes away.
struct TickerGuard(JoinHandle<()>);

impl Drop for TickerGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl SessionHandle {
    /// Wraps `session`, spawns its ticker and applies `Start`.
    pub(crate) async fn launch(
        session: ExamSession,
        backend: Arc<dyn GradingBackend>,
        clock: SessionClock,
    ) -> Result<(Self, Vec<Effect>), ExamError> {
        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| Inner {
            id: Uuid::new_v4(),
            slot: Mutex::new(Slot {
                session,
                ticker: Some(TickerGuard(tokio::spawn(run_ticker(weak.clone())))),
            }),
            backend,
            clock,
        });
        let handle = Self { inner };

        let exam_id = handle.inner.slot.lock().await.session.exam_id().to_string();
        let effects = handle.dispatch(Command::Start).await?;
        metrics::counter!("exam_sessions_started_total").increment(1);
        tracing::info!(session_id = %handle.id(), exam_id = %exam_id, "exam session started");
        Ok((handle, effects))
    }

    pub(crate) fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Applies `command` under the session lock. A resulting submission is
    /// delivered after the lock is released and its outcome applied afterwards.
    pub(crate) async fn dispatch(&self, command: Command) -> Result<Vec<Effect>, ExamError> {
        let (mut effects, pending) = self.apply(command).await?;
        if let Some((trigger, payload)) = pending {
            effects.extend(self.deliver(trigger, payload).await);
        }
        Ok(effects)
    }

    async fn apply(
        &self,
        command: Command,
    ) -> Result<(Vec<Effect>, Option<PendingSubmit>), ExamError> {
        let mut slot = self.inner.slot.lock().await;
        let effects = slot.session.apply(command, self.inner.clock.now())?;
        self.record(&slot.session, &effects);
        let pending = effects.iter().find_map(|effect| match effect {
            Effect::Submit { trigger, payload } => Some((*trigger, payload.clone())),
            _ => None,
        });
        Ok((effects, pending))
    }

    async fn deliver(&self, trigger: SubmitTrigger, payload: SubmissionPayload) -> Vec<Effect> {
        let outcome = outcome_of(self.inner.backend.submit_exam(&payload).await);
        self.finish(trigger, outcome).await
    }

    async fn finish(&self, trigger: SubmitTrigger, outcome: SubmissionOutcome) -> Vec<Effect> {
        let label = match &outcome {
            SubmissionOutcome::Accepted { .. } => "accepted",
            SubmissionOutcome::Rejected { .. } => "failed",
        };
        metrics::counter!(
            "exam_submissions_total",
            "trigger" => trigger.as_str(),
            "outcome" => label
        )
        .increment(1);

        match &outcome {
            SubmissionOutcome::Accepted { .. } => tracing::info!(
                session_id = %self.id(),
                trigger = trigger.as_str(),
                "exam submission accepted"
            ),
            SubmissionOutcome::Rejected { message } => tracing::warn!(
                session_id = %self.id(),
                trigger = trigger.as_str(),
                error = %message,
                "exam submission failed"
            ),
        }

        let mut slot = self.inner.slot.lock().await;
        match slot.session.apply(Command::SubmissionFinished(outcome), self.inner.clock.now()) {
            Ok(effects) => effects,
            Err(err) => {
                tracing::debug!(session_id = %self.id(), error = %err, "submission outcome dropped");
                Vec::new()
            }
        }
    }

    /// Feeds a client-reported signal to the monitor and returns its verdict.
    pub(crate) async fn report(&self, signal: IntegritySignal) -> Result<Verdict, ExamError> {
        let kind = signal.kind();
        let effects = self.dispatch(Command::Integrity(signal)).await?;
        let verdict = effects
            .iter()
            .find_map(|effect| match effect {
                Effect::Integrity(verdict) => Some(*verdict),
                _ => None,
            })
            .unwrap_or(Verdict::Ignored);

        metrics::counter!(
            "exam_integrity_events_total",
            "kind" => kind,
            "verdict" => verdict.as_str()
        )
        .increment(1);
        if let Verdict::Terminate { violation } = verdict {
            tracing::warn!(
                session_id = %self.id(),
                violation = violation.as_str(),
                "integrity violation ended the exam"
            );
        }
        Ok(verdict)
    }

    /// Stops the ticker and silences the session. Idempotent.
    pub(crate) async fn tear_down(&self) {
        let mut slot = self.inner.slot.lock().await;
        let previous = slot.session.phase();
        if previous == Phase::TornDown {
            return;
        }
        if let Err(err) = slot.session.apply(Command::TearDown, self.inner.clock.now()) {
            tracing::debug!(session_id = %self.id(), error = %err, "teardown rejected");
        }
        slot.ticker.take();
        tracing::info!(session_id = %self.id(), phase = previous.as_str(), "exam session torn down");
    }

    pub(crate) async fn view(&self) -> SessionView {
        let slot = self.inner.slot.lock().await;
        SessionView::build(&self.id().to_string(), &slot.session, self.inner.clock.now())
    }

    /// How long ago the session ended; `None` while it is still running. Torn
    /// down sessions count as ended forever ago.
    pub(crate) async fn ended_for(&self) -> Option<StdDuration> {
        let slot = self.inner.slot.lock().await;
        match slot.session.phase() {
            Phase::TornDown => Some(StdDuration::MAX),
            Phase::Ended => slot.session.ended_at().map(|ended_at| {
                StdDuration::try_from(self.inner.clock.now() - ended_at).unwrap_or_default()
            }),
            _ => None,
        }
    }

    pub(crate) async fn phase(&self) -> Phase {
        self.inner.slot.lock().await.session.phase()
    }

    fn record(&self, session: &ExamSession, effects: &[Effect]) {
        for effect in effects {
            match effect {
                Effect::QuestionLocked { question_id } => {
                    metrics::counter!("exam_questions_locked_total").increment(1);
                    tracing::info!(session_id = %self.id(), question_id = %question_id, "question locked");
                }
                Effect::Exhausted => {
                    tracing::info!(session_id = %self.id(), "no unlocked questions remain");
                }
                Effect::Submit { trigger, payload } => {
                    tracing::info!(
                        session_id = %self.id(),
                        exam_id = %session.exam_id(),
                        trigger = trigger.as_str(),
                        answers = payload.answers.len(),
                        "submitting exam"
                    );
                }
                _ => {}
            }
        }
    }
}

/// Ticks until the session leaves `InProgress`. A submission raised by a tick is
/// delivered from its own task, so aborting the ticker cannot cancel it.
async fn run_ticker(inner: Weak<Inner>) {
    let mut ticks = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
    loop {
        ticks.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let handle = SessionHandle { inner };

        match handle.apply(Command::Tick).await {
            Ok((_, Some((trigger, payload)))) => {
                tokio::spawn(async move {
                    handle.deliver(trigger, payload).await;
                });
                break;
            }
            Ok((_, None)) => {}
            Err(err) => {
                tracing::debug!(session_id = %handle.id(), error = %err, "tick rejected");
            }
        }
        if handle.phase().await != Phase::InProgress {
            break;
        }
    }
}
