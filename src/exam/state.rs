use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::exam::autosave::{AutosaveTracker, SaveStatus};
use crate::schemas::exam::{OptionLetter, Question};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionPhase {
    NotStarted,
    InProgress,
    Submitted,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotStarted => "not started",
            Self::InProgress => "in progress",
            Self::Submitted => "submitted",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Previous,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    /// Nothing to count down: not started, already submitted, or already at zero.
    Idle,
    Running(u64),
    /// The countdown just reached zero.
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NavigatorStatus {
    Current,
    Answered,
    Unanswered,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum TransitionError {
    #[error("cannot {action} while the exam is {phase}")]
    InvalidPhase { action: &'static str, phase: SessionPhase },
    #[error("a submission is already in flight")]
    SubmitInFlight,
    #[error("question {0} is not part of this exam")]
    UnknownQuestion(i64),
    #[error("this exam has no time allotted")]
    NoTimeAllotted,
}

/// What the async layer must send after an answer was recorded locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AnswerEffect {
    pub(crate) question_id: i64,
    pub(crate) option: OptionLetter,
    pub(crate) generation: u64,
}

/// One student's attempt at one exam, free of any I/O.
#[derive(Debug)]
pub(crate) struct ExamState {
    phase: SessionPhase,
    remaining_seconds: u64,
    questions: Vec<Question>,
    current_index: usize,
    answers: BTreeMap<i64, OptionLetter>,
    saves: AutosaveTracker,
    submitting: bool,
}

impl Default for ExamState {
    fn default() -> Self {
        Self::new()
    }
}

impl ExamState {
    pub(crate) fn new() -> Self {
        Self {
            phase: SessionPhase::NotStarted,
            remaining_seconds: 0,
            questions: Vec::new(),
            current_index: 0,
            answers: BTreeMap::new(),
            saves: AutosaveTracker::default(),
            submitting: false,
        }
    }

    pub(crate) fn begin(&mut self, duration_seconds: u64) -> Result<(), TransitionError> {
        self.require(SessionPhase::NotStarted, "start")?;
        if duration_seconds == 0 {
            return Err(TransitionError::NoTimeAllotted);
        }
        self.phase = SessionPhase::InProgress;
        self.remaining_seconds = duration_seconds;
        Ok(())
    }

    /// Replaces the question set; answers for questions no longer present are dropped.
    /// Only an attempt in progress takes a new set, so a late fetch cannot touch
    /// a submitted one.
    pub(crate) fn load_questions(
        &mut self,
        questions: Vec<Question>,
    ) -> Result<(), TransitionError> {
        self.require(SessionPhase::InProgress, "load questions")?;
        self.questions = questions;
        self.current_index = 0;
        let known = |question_id: i64, questions: &[Question]| {
            questions.iter().any(|question| question.id == question_id)
        };
        let questions = &self.questions;
        self.answers.retain(|question_id, _| known(*question_id, questions));
        self.saves.retain(|question_id| known(question_id, questions));
        Ok(())
    }

    pub(crate) fn select_answer(
        &mut self,
        question_id: i64,
        option: OptionLetter,
    ) -> Result<AnswerEffect, TransitionError> {
        self.require(SessionPhase::InProgress, "answer")?;
        if !self.questions.iter().any(|question| question.id == question_id) {
            return Err(TransitionError::UnknownQuestion(question_id));
        }

        self.answers.insert(question_id, option);
        let generation = self.saves.begin(question_id);
        Ok(AnswerEffect { question_id, option, generation })
    }

    pub(crate) fn record_save(&mut self, question_id: i64, generation: u64, saved: bool) -> bool {
        self.saves.finish(question_id, generation, saved)
    }

    pub(crate) fn advance(&mut self, direction: Direction) -> usize {
        let target = match direction {
            Direction::Previous => self.current_index.saturating_sub(1),
            Direction::Next => self.current_index.saturating_add(1),
        };
        self.jump_to(target)
    }

    pub(crate) fn jump_to(&mut self, index: usize) -> usize {
        let last = self.questions.len().saturating_sub(1);
        self.current_index = index.min(last);
        self.current_index
    }

    pub(crate) fn tick(&mut self) -> TickOutcome {
        if self.phase != SessionPhase::InProgress || self.remaining_seconds == 0 {
            return TickOutcome::Idle;
        }

        self.remaining_seconds -= 1;
        if self.remaining_seconds == 0 {
            TickOutcome::Expired
        } else {
            TickOutcome::Running(self.remaining_seconds)
        }
    }

    /// Claims the single submission slot.
    pub(crate) fn try_begin_submit(&mut self) -> Result<(), TransitionError> {
        self.require(SessionPhase::InProgress, "submit")?;
        if self.submitting {
            return Err(TransitionError::SubmitInFlight);
        }
        self.submitting = true;
        Ok(())
    }

    pub(crate) fn finish_submit(&mut self, success: bool) {
        self.submitting = false;
        if success {
            self.phase = SessionPhase::Submitted;
        }
    }

    pub(crate) fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub(crate) fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    pub(crate) fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub(crate) fn answers(&self) -> &BTreeMap<i64, OptionLetter> {
        &self.answers
    }

    pub(crate) fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub(crate) fn current_index(&self) -> usize {
        self.current_index
    }

    pub(crate) fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    pub(crate) fn answered_count(&self) -> usize {
        self.answers.len()
    }

    pub(crate) fn save_status(&self, question_id: i64) -> Option<SaveStatus> {
        self.saves.status(question_id)
    }

    pub(crate) fn unsaved_questions(&self) -> Vec<i64> {
        self.saves.unsaved()
    }

    pub(crate) fn navigator(&self) -> Vec<NavigatorStatus> {
        self.questions
            .iter()
            .enumerate()
            .map(|(index, question)| {
                if index == self.current_index {
                    NavigatorStatus::Current
                } else if self.answers.contains_key(&question.id) {
                    NavigatorStatus::Answered
                } else {
                    NavigatorStatus::Unanswered
                }
            })
            .collect()
    }

    fn require(&self, phase: SessionPhase, action: &'static str) -> Result<(), TransitionError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(TransitionError::InvalidPhase { action, phase: self.phase })
        }
    }
}
