//! Animator primitives: time-driven interpolators for move / turn / goto /
//! say / think.
//!
//! An animator is created when its instruction becomes active, then advanced
//! by elapsed seconds until it reports [`StepOutcome::Finished`]. Every store
//! write goes through [`StepCtx::write`], which refuses to write once the
//! run's cancel token is set.

use crate::cancel::CancelToken;
use crate::config::{Config, TimingCfg};
use crate::easing::{ease_in_out_cubic, fraction};
use crate::executor::{RunStatus, Speech};
use crate::ids::{EntityId, InstructionId};
use crate::instruction::ResolvedAction;
use crate::outputs::{Change, ChangeSource, Outputs};
use crate::store::{EntityState, EntityStore};

/// Borrowed view of everything a primitive may touch while it runs.
pub struct StepCtx<'a> {
    pub entity: &'a EntityId,
    pub store: &'a mut EntityStore,
    pub token: &'a CancelToken,
    pub status: &'a mut Option<RunStatus>,
    pub speech: &'a mut Option<Speech>,
    pub outputs: &'a mut Outputs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteResult {
    Applied,
    Cancelled,
    Missing,
}

impl<'a> StepCtx<'a> {
    pub fn write<F>(&mut self, f: F) -> WriteResult
    where
        F: FnOnce(EntityState) -> EntityState,
    {
        if self.token.is_cancelled() {
            return WriteResult::Cancelled;
        }
        match self.store.update(self.entity, f) {
            Some(state) => {
                self.outputs.push_change(Change {
                    entity: self.entity.clone(),
                    state,
                    source: ChangeSource::Animation,
                });
                WriteResult::Applied
            }
            None => WriteResult::Missing,
        }
    }

    /// Raise the progress counter; never lowers it.
    fn raise_progress(&mut self, step: u32) {
        if let Some(status) = self.status.as_mut() {
            let step = step.min(status.total_steps);
            if step > status.current_step {
                status.current_step = step;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    Running,
    /// Done; `leftover` is the part of the last `dt` not consumed.
    Finished { leftover: f32 },
    Cancelled,
}

/// Shared time bookkeeping: an animated segment followed by a linger window
/// during which the completed status stays visible.
#[derive(Debug, Clone, Copy)]
struct Clock {
    elapsed: f32,
    duration: f32,
    linger: f32,
}

impl Clock {
    fn new(duration: f32, linger: f32) -> Self {
        Self {
            elapsed: 0.0,
            duration: duration.max(0.0),
            linger: linger.max(0.0),
        }
    }

    fn tick(&mut self, dt: f32) {
        self.elapsed += dt;
    }

    fn progress(&self) -> f32 {
        fraction(self.elapsed, self.duration)
    }

    /// Time past the end of the linger window, if reached.
    fn overrun(&self, dt: f32) -> Option<f32> {
        let over = self.elapsed - (self.duration + self.linger);
        (over >= 0.0).then(|| over.min(dt))
    }
}

fn plural(n: f32) -> &'static str {
    if n.abs() == 1.0 {
        ""
    } else {
        "s"
    }
}

fn whole(n: f32) -> u32 {
    n.abs().ceil() as u32
}

#[derive(Debug, Clone)]
pub struct MoveAnim {
    steps: f32,
    total_px: f32,
    direction: f32,
    heading: (f32, f32),
    pixels_per_step: f32,
    moved: f32,
    landed: bool,
    clock: Clock,
}

impl MoveAnim {
    fn new(steps: f32, rotation: f32, t: &TimingCfg) -> Self {
        let theta = rotation.to_radians();
        Self {
            steps,
            total_px: steps.abs() * t.pixels_per_step,
            direction: if steps < 0.0 { -1.0 } else { 1.0 },
            heading: (theta.cos(), theta.sin()),
            pixels_per_step: t.pixels_per_step,
            moved: 0.0,
            landed: false,
            clock: Clock::new(
                t.move_min_duration.max(steps.abs() * t.move_seconds_per_step),
                t.move_linger,
            ),
        }
    }

    fn advance(&mut self, dt: f32, t: &TimingCfg, ctx: &mut StepCtx<'_>) -> StepOutcome {
        self.clock.tick(dt);
        if !self.landed {
            let p = self.clock.progress();
            let target = self.total_px * ease_in_out_cubic(p);
            let pending = target - self.moved;
            let finishing = p >= 1.0;
            if pending > t.write_epsilon || (finishing && pending > 0.0) {
                let d = pending * self.direction;
                let (hx, hy) = self.heading;
                match ctx.write(|s| EntityState::new(s.x + d * hx, s.y + d * hy, s.rotation)) {
                    WriteResult::Applied => {}
                    WriteResult::Cancelled => return StepOutcome::Cancelled,
                    WriteResult::Missing => return StepOutcome::Finished { leftover: 0.0 },
                }
                self.moved = target;
                ctx.raise_progress((self.moved / self.pixels_per_step).floor() as u32);
            }
            if !finishing {
                return StepOutcome::Running;
            }
            self.landed = true;
            let total = whole(self.steps);
            if let Some(status) = ctx.status.as_mut() {
                status.current_step = total;
                status.label = format!(
                    "Moved {} step{}!",
                    self.steps.abs(),
                    plural(self.steps)
                );
            }
        }
        match self.clock.overrun(dt) {
            Some(leftover) => {
                *ctx.status = None;
                StepOutcome::Finished { leftover }
            }
            None => StepOutcome::Running,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TurnAnim {
    degrees: f32,
    turned: f32,
    landed: bool,
    clock: Clock,
}

impl TurnAnim {
    fn new(degrees: f32, t: &TimingCfg) -> Self {
        Self {
            degrees,
            turned: 0.0,
            landed: false,
            clock: Clock::new(
                t.turn_min_duration
                    .max(degrees.abs() * t.turn_seconds_per_degree),
                t.turn_linger,
            ),
        }
    }

    fn advance(&mut self, dt: f32, t: &TimingCfg, ctx: &mut StepCtx<'_>) -> StepOutcome {
        self.clock.tick(dt);
        if !self.landed {
            let p = self.clock.progress();
            let target = self.degrees.abs() * ease_in_out_cubic(p);
            let pending = target - self.turned;
            let finishing = p >= 1.0;
            if pending > t.write_epsilon || (finishing && pending > 0.0) {
                let d = pending * self.degrees.signum();
                match ctx.write(|s| EntityState::new(s.x, s.y, s.rotation + d)) {
                    WriteResult::Applied => {}
                    WriteResult::Cancelled => return StepOutcome::Cancelled,
                    WriteResult::Missing => return StepOutcome::Finished { leftover: 0.0 },
                }
                self.turned = target;
                ctx.raise_progress(self.turned.floor() as u32);
            }
            if !finishing {
                return StepOutcome::Running;
            }
            self.landed = true;
            let total = whole(self.degrees);
            if let Some(status) = ctx.status.as_mut() {
                status.current_step = total;
                status.label = format!("Turned {}°!", self.degrees);
            }
        }
        match self.clock.overrun(dt) {
            Some(leftover) => {
                *ctx.status = None;
                StepOutcome::Finished { leftover }
            }
            None => StepOutcome::Running,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GotoAnim {
    start: (f32, f32),
    target: (f32, f32),
    landed: bool,
    clock: Clock,
}

impl GotoAnim {
    fn new(from: EntityState, x: f32, y: f32, t: &TimingCfg) -> Self {
        let dx = x - from.x;
        let dy = y - from.y;
        let distance = (dx * dx + dy * dy).sqrt();
        Self {
            start: (from.x, from.y),
            target: (x, y),
            landed: false,
            clock: Clock::new(
                t.goto_min_duration.max(distance * t.goto_seconds_per_pixel),
                t.goto_linger,
            ),
        }
    }

    fn advance(&mut self, dt: f32, ctx: &mut StepCtx<'_>) -> StepOutcome {
        self.clock.tick(dt);
        if !self.landed {
            let p = self.clock.progress();
            let (tx, ty) = self.target;
            let (x, y) = if p >= 1.0 {
                // land exactly, not asymptotically
                (tx, ty)
            } else {
                let e = ease_in_out_cubic(p);
                let (sx, sy) = self.start;
                (sx + (tx - sx) * e, sy + (ty - sy) * e)
            };
            match ctx.write(|s| EntityState::new(x, y, s.rotation)) {
                WriteResult::Applied => {}
                WriteResult::Cancelled => return StepOutcome::Cancelled,
                WriteResult::Missing => return StepOutcome::Finished { leftover: 0.0 },
            }
            if p < 1.0 {
                return StepOutcome::Running;
            }
            self.landed = true;
            ctx.raise_progress(1);
        }
        match self.clock.overrun(dt) {
            Some(leftover) => {
                *ctx.status = None;
                StepOutcome::Finished { leftover }
            }
            None => StepOutcome::Running,
        }
    }
}

/// Say / think: holds a bubble for a fixed time, no positional change.
#[derive(Debug, Clone)]
pub struct SpeakAnim {
    clock: Clock,
}

impl SpeakAnim {
    fn advance(&mut self, dt: f32, ctx: &mut StepCtx<'_>) -> StepOutcome {
        if ctx.token.is_cancelled() {
            return StepOutcome::Cancelled;
        }
        self.clock.tick(dt);
        match self.clock.overrun(dt) {
            Some(leftover) => {
                *ctx.speech = None;
                *ctx.status = None;
                StepOutcome::Finished { leftover }
            }
            None => StepOutcome::Running,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Animator {
    Move(MoveAnim),
    Turn(TurnAnim),
    Goto(GotoAnim),
    Speak(SpeakAnim),
}

impl Animator {
    /// Build the animator for a leaf action and publish its initial status.
    /// Returns `None` for non-leaf kinds (repeat, unknown) and for entities
    /// that are not registered.
    pub fn start(
        instruction: InstructionId,
        action: &ResolvedAction,
        cfg: &Config,
        ctx: &mut StepCtx<'_>,
    ) -> Option<Animator> {
        let t = &cfg.timing;
        let (animator, status) = match action {
            ResolvedAction::Move { steps } => {
                let current = ctx.store.get(ctx.entity)?;
                (
                    Animator::Move(MoveAnim::new(*steps, current.rotation, t)),
                    RunStatus::new(
                        instruction,
                        whole(*steps),
                        format!("Moving {} step{}", steps, plural(*steps)),
                    ),
                )
            }
            ResolvedAction::Turn { degrees } => {
                ctx.store.get(ctx.entity)?;
                (
                    Animator::Turn(TurnAnim::new(*degrees, t)),
                    RunStatus::new(instruction, whole(*degrees), format!("Turning {}°", degrees)),
                )
            }
            ResolvedAction::Goto { x, y } => {
                let current = ctx.store.get(ctx.entity)?;
                (
                    Animator::Goto(GotoAnim::new(current, *x, *y, t)),
                    RunStatus::new(instruction, 1, format!("Go to ({}, {})", x, y)),
                )
            }
            ResolvedAction::Speak {
                text,
                duration,
                thought,
            } => {
                ctx.store.get(ctx.entity)?;
                let label = if *thought {
                    format!("*{}*", text)
                } else {
                    format!("\"{}\"", text)
                };
                *ctx.speech = Some(Speech {
                    text: text.clone(),
                    thought: *thought,
                });
                let mut status = RunStatus::new(instruction, 1, label);
                status.current_step = 1;
                (
                    Animator::Speak(SpeakAnim {
                        clock: Clock::new(0.0, *duration),
                    }),
                    status,
                )
            }
            ResolvedAction::Repeat { .. } | ResolvedAction::Unknown => return None,
        };
        *ctx.status = Some(status);
        Some(animator)
    }

    pub fn advance(&mut self, dt: f32, cfg: &Config, ctx: &mut StepCtx<'_>) -> StepOutcome {
        match self {
            Animator::Move(a) => a.advance(dt, &cfg.timing, ctx),
            Animator::Turn(a) => a.advance(dt, &cfg.timing, ctx),
            Animator::Goto(a) => a.advance(dt, ctx),
            Animator::Speak(a) => a.advance(dt, ctx),
        }
    }
}
