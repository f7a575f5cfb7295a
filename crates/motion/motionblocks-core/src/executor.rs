//! Per-entity sequential executor.
//!
//! An executor owns at most one active run. A run is a queue of steps
//! (instructions and pauses) that is consumed strictly in order as
//! [`Executor::advance`] feeds it elapsed time; a step that finishes part
//! way through a tick hands its unused time to the next step. Repeat
//! instructions are expanded lazily: the plan holds one iteration of the
//! body at a time plus a counter for the rest, so neither the repeat count
//! nor nesting grows the queue.

use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::animators::{Animator, StepCtx, StepOutcome};
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::ids::{EntityId, InstructionId};
use crate::instruction::{sort_for_execution, Instruction, ResolvedAction};
use crate::outputs::{MotionEvent, Outputs};
use crate::store::EntityStore;

/// Progress of the active instruction, as shown to the user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    /// `None` for the run-completed summary.
    pub instruction: Option<InstructionId>,
    pub current_step: u32,
    pub total_steps: u32,
    pub label: String,
}

impl RunStatus {
    pub fn new(instruction: InstructionId, total_steps: u32, label: String) -> Self {
        Self {
            instruction: Some(instruction),
            current_step: 0,
            total_steps,
            label,
        }
    }
}

/// Speech or thought bubble currently shown by a say / think.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Speech {
    pub text: String,
    pub thought: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecStateKind {
    Idle,
    Running,
    Completed,
}

#[derive(Debug, Clone)]
enum Step {
    Perform {
        instruction: Instruction,
        /// Repeats being expanded around this step (outermost first).
        /// A repeat never replays itself or any of these.
        enclosing: Arc<[InstructionId]>,
    },
    Pause(f32),
    /// Iterations of a repeat not yet queued. Each activation queues one
    /// pass over `body` ahead of itself with `remaining - 1`; at zero the
    /// repeat finishes.
    Repeat {
        id: InstructionId,
        remaining: u32,
        body: Arc<[Instruction]>,
        /// Enclosing repeats plus this one, handed to every replayed step.
        excluded: Arc<[InstructionId]>,
    },
}

#[derive(Debug)]
enum Active {
    Animating {
        instruction: InstructionId,
        animator: Animator,
    },
    Pausing {
        remaining: f32,
    },
}

#[derive(Debug)]
struct ActiveRun {
    token: CancelToken,
    /// Top-level instructions in execution order; repeats replay from here.
    instructions: Vec<Instruction>,
    plan: VecDeque<Step>,
    active: Option<Active>,
    status: Option<RunStatus>,
    speech: Option<Speech>,
}

enum RunProgress {
    Running,
    Done { leftover: f32 },
    Cancelled,
}

impl ActiveRun {
    fn new(instructions: Vec<Instruction>, pause: f32) -> Self {
        let last = instructions.len().saturating_sub(1);
        let top: Arc<[InstructionId]> = Arc::from(Vec::new());
        let mut plan = VecDeque::with_capacity(instructions.len() * 2);
        for (i, instruction) in instructions.iter().enumerate() {
            plan.push_back(Step::Perform {
                instruction: instruction.clone(),
                enclosing: Arc::clone(&top),
            });
            if i < last {
                plan.push_back(Step::Pause(pause));
            }
        }
        Self {
            token: CancelToken::new(),
            instructions,
            plan,
            active: None,
            status: None,
            speech: None,
        }
    }

    fn advance(
        &mut self,
        entity: &EntityId,
        dt: f32,
        cfg: &Config,
        store: &mut EntityStore,
        outputs: &mut Outputs,
    ) -> RunProgress {
        let mut budget = dt;
        loop {
            if self.token.is_cancelled() {
                return RunProgress::Cancelled;
            }
            if self.active.is_none() {
                match self.plan.pop_front() {
                    Some(step) => {
                        self.begin(entity, step, cfg, store, outputs);
                        continue;
                    }
                    None => return RunProgress::Done { leftover: budget },
                }
            }
            let Some(active) = self.active.as_mut() else {
                continue;
            };
            match active {
                Active::Pausing { remaining } => {
                    if *remaining > budget {
                        *remaining -= budget;
                        return RunProgress::Running;
                    }
                    budget -= *remaining;
                }
                Active::Animating {
                    instruction,
                    animator,
                } => {
                    let mut ctx = StepCtx {
                        entity,
                        store: &mut *store,
                        token: &self.token,
                        status: &mut self.status,
                        speech: &mut self.speech,
                        outputs: &mut *outputs,
                    };
                    match animator.advance(budget, cfg, &mut ctx) {
                        StepOutcome::Running => return RunProgress::Running,
                        StepOutcome::Cancelled => return RunProgress::Cancelled,
                        StepOutcome::Finished { leftover } => {
                            debug!("{entity}: instruction {instruction} finished");
                            outputs.push_event(MotionEvent::InstructionFinished {
                                entity: entity.clone(),
                                instruction: *instruction,
                            });
                            budget = leftover;
                        }
                    }
                }
            }
            self.active = None;
        }
    }

    /// Activate one step. Steps that need no time (repeat headers, skips)
    /// resolve here and leave `active` empty.
    fn begin(
        &mut self,
        entity: &EntityId,
        step: Step,
        cfg: &Config,
        store: &mut EntityStore,
        outputs: &mut Outputs,
    ) {
        let (instruction, enclosing) = match step {
            Step::Pause(seconds) => {
                self.active = Some(Active::Pausing { remaining: seconds });
                return;
            }
            Step::Repeat {
                id,
                remaining,
                body,
                excluded,
            } => {
                if remaining == 0 || body.is_empty() {
                    outputs.push_event(MotionEvent::InstructionFinished {
                        entity: entity.clone(),
                        instruction: id,
                    });
                    return;
                }
                self.plan.push_front(Step::Repeat {
                    id,
                    remaining: remaining - 1,
                    body: Arc::clone(&body),
                    excluded: Arc::clone(&excluded),
                });
                for replay in body.iter().rev() {
                    self.plan.push_front(Step::Pause(cfg.timing.repeat_pause));
                    self.plan.push_front(Step::Perform {
                        instruction: replay.clone(),
                        enclosing: Arc::clone(&excluded),
                    });
                }
                return;
            }
            Step::Perform {
                instruction,
                enclosing,
            } => (instruction, enclosing),
        };

        let id = instruction.id();
        let kind = instruction.action().kind();
        match instruction.action().resolve(&cfg.looks) {
            ResolvedAction::Unknown => {
                warn!("{entity}: skipping instruction {id} of unknown kind");
                outputs.push_event(MotionEvent::InstructionSkipped {
                    entity: entity.clone(),
                    instruction: id,
                    reason: "unknown instruction kind".into(),
                });
            }
            ResolvedAction::Repeat { count } => {
                outputs.push_event(MotionEvent::InstructionStarted {
                    entity: entity.clone(),
                    instruction: id,
                    kind: kind.into(),
                });
                let excluded: Arc<[InstructionId]> =
                    enclosing.iter().copied().chain([id]).collect();
                let body: Arc<[Instruction]> = self
                    .instructions
                    .iter()
                    .filter(|i| !excluded.contains(&i.id()))
                    .cloned()
                    .collect();
                debug!(
                    "{entity}: repeat {id} replays {} instruction(s) x{count}",
                    body.len()
                );
                self.plan.push_front(Step::Repeat {
                    id,
                    remaining: count,
                    body,
                    excluded,
                });
            }
            leaf => {
                let mut ctx = StepCtx {
                    entity,
                    store,
                    token: &self.token,
                    status: &mut self.status,
                    speech: &mut self.speech,
                    outputs: &mut *outputs,
                };
                match Animator::start(id, &leaf, cfg, &mut ctx) {
                    Some(animator) => {
                        debug!("{entity}: instruction {id} ({kind}) started");
                        outputs.push_event(MotionEvent::InstructionStarted {
                            entity: entity.clone(),
                            instruction: id,
                            kind: kind.into(),
                        });
                        self.active = Some(Active::Animating {
                            instruction: id,
                            animator,
                        });
                    }
                    None => {
                        warn!("{entity}: skipping instruction {id}, entity is not registered");
                        outputs.push_event(MotionEvent::InstructionSkipped {
                            entity: entity.clone(),
                            instruction: id,
                            reason: "entity not registered".into(),
                        });
                    }
                }
            }
        }
    }

    /// Flip every queued, not-yet-started move, including those in repeat
    /// iterations still to come. The one animating now keeps its direction.
    fn reverse_pending_moves(&mut self) -> usize {
        let mut n: usize = 0;
        for step in self.plan.iter_mut() {
            match step {
                Step::Perform { instruction, .. } => {
                    if let Some(flipped) = instruction.reversed_move() {
                        *instruction = flipped;
                        n += 1;
                    }
                }
                Step::Repeat {
                    remaining, body, ..
                } => {
                    let mut moves: usize = 0;
                    let flipped: Arc<[Instruction]> = body
                        .iter()
                        .map(|i| match i.reversed_move() {
                            Some(f) => {
                                moves += 1;
                                f
                            }
                            None => i.clone(),
                        })
                        .collect();
                    if moves > 0 {
                        *body = flipped;
                        n = n.saturating_add(moves.saturating_mul(*remaining as usize));
                    }
                }
                Step::Pause(_) => {}
            }
        }
        for instruction in self.instructions.iter_mut() {
            if let Some(flipped) = instruction.reversed_move() {
                *instruction = flipped;
            }
        }
        n
    }
}

#[derive(Debug)]
enum ExecState {
    Idle,
    Running(ActiveRun),
    /// Run finished; the summary status stays visible for `remaining` seconds.
    Completed { status: RunStatus, remaining: f32 },
}

#[derive(Debug)]
pub struct Executor {
    entity: EntityId,
    state: ExecState,
}

impl Executor {
    pub fn new(entity: EntityId) -> Self {
        Self {
            entity,
            state: ExecState::Idle,
        }
    }

    #[inline]
    pub fn entity(&self) -> &EntityId {
        &self.entity
    }

    /// Start a run over the instructions that belong to this entity.
    ///
    /// Returns `false` without touching anything when a run is already
    /// active or when nothing in `instructions` targets this entity.
    pub fn run(&mut self, instructions: Vec<Instruction>, cfg: &Config, outputs: &mut Outputs) -> bool {
        if self.is_running() {
            debug!("{}: run rejected, already executing", self.entity);
            return false;
        }
        let mut own: Vec<Instruction> = instructions
            .into_iter()
            .filter(|i| i.entity() == &self.entity)
            .collect();
        if own.is_empty() {
            debug!("{}: run rejected, no instructions", self.entity);
            return false;
        }
        sort_for_execution(&mut own);
        let count = own.len();
        info!("{}: running {count} instruction(s)", self.entity);
        self.state = ExecState::Running(ActiveRun::new(own, cfg.timing.instruction_pause));
        outputs.push_event(MotionEvent::RunStarted {
            entity: self.entity.clone(),
            instructions: count,
        });
        true
    }

    /// Cancel the active run, if any. Also clears a lingering completion
    /// summary. Returns whether a run was actually cancelled.
    pub fn cancel(&mut self, outputs: &mut Outputs) -> bool {
        match std::mem::replace(&mut self.state, ExecState::Idle) {
            ExecState::Running(run) => {
                run.token.cancel();
                info!("{}: run cancelled", self.entity);
                outputs.push_event(MotionEvent::RunCancelled {
                    entity: self.entity.clone(),
                });
                true
            }
            ExecState::Idle | ExecState::Completed { .. } => false,
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        matches!(self.state, ExecState::Running(_))
    }

    pub fn state_kind(&self) -> ExecStateKind {
        match self.state {
            ExecState::Idle => ExecStateKind::Idle,
            ExecState::Running(_) => ExecStateKind::Running,
            ExecState::Completed { .. } => ExecStateKind::Completed,
        }
    }

    pub fn current_status(&self) -> Option<RunStatus> {
        match &self.state {
            ExecState::Idle => None,
            ExecState::Running(run) => run.status.clone(),
            ExecState::Completed { status, .. } => Some(status.clone()),
        }
    }

    pub fn speech(&self) -> Option<Speech> {
        match &self.state {
            ExecState::Running(run) => run.speech.clone(),
            _ => None,
        }
    }

    /// Token of the active run, for hosts that drive primitives themselves.
    pub fn token(&self) -> Option<CancelToken> {
        match &self.state {
            ExecState::Running(run) => Some(run.token.clone()),
            _ => None,
        }
    }

    pub fn reverse_pending_moves(&mut self) -> usize {
        match &mut self.state {
            ExecState::Running(run) => run.reverse_pending_moves(),
            _ => 0,
        }
    }

    pub fn advance(&mut self, dt: f32, cfg: &Config, store: &mut EntityStore, outputs: &mut Outputs) {
        let progress = match &mut self.state {
            ExecState::Idle => return,
            ExecState::Completed { remaining, .. } => {
                *remaining -= dt;
                if *remaining <= 0.0 {
                    self.state = ExecState::Idle;
                }
                return;
            }
            ExecState::Running(run) => run.advance(&self.entity, dt, cfg, store, outputs),
        };
        match progress {
            RunProgress::Running => {}
            RunProgress::Cancelled => {
                info!("{}: run stopped by cancellation", self.entity);
                self.state = ExecState::Idle;
            }
            RunProgress::Done { leftover } => {
                let total = match &self.state {
                    ExecState::Running(run) => run.instructions.len(),
                    _ => 0,
                };
                info!("{}: run completed ({total} instruction(s))", self.entity);
                outputs.push_event(MotionEvent::RunCompleted {
                    entity: self.entity.clone(),
                    instructions: total,
                });
                let remaining = cfg.timing.completion_display - leftover;
                self.state = if remaining > 0.0 {
                    ExecState::Completed {
                        status: RunStatus {
                            instruction: None,
                            current_step: total as u32,
                            total_steps: total as u32,
                            label: format!(
                                "{} - All {} blocks completed!",
                                self.entity.as_str().to_uppercase(),
                                total
                            ),
                        },
                        remaining,
                    }
                } else {
                    ExecState::Idle
                };
            }
        }
    }
}
