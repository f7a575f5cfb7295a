//! Run orchestrator: owns the store, the program, one executor per entity and
//! the collision machinery, and drives them all from a single `update(dt)`.
//!
//! Operations invoked between ticks (drags, cancels, resets) record their
//! changes and events in a pending buffer that is flushed into the next
//! tick's [`Outputs`], so a host that only reads `update` sees everything.

use hashbrown::HashMap;
use log::{debug, info, warn};

use crate::collision::{CollisionDetector, PairKey, Swap};
use crate::config::Config;
use crate::executor::{ExecStateKind, Executor, RunStatus, Speech};
use crate::ids::{EntityId, InstructionId};
use crate::instruction::{Action, Category, Instruction};
use crate::outputs::{Change, ChangeSource, MotionEvent, Outputs};
use crate::program::Program;
use crate::store::{Bounds, EntityState, EntityStore};
use crate::Result;

#[derive(Debug)]
pub struct Orchestrator {
    cfg: Config,
    store: EntityStore,
    program: Program,
    executors: HashMap<EntityId, Executor>,
    detector: CollisionDetector,
    swaps: Vec<Swap>,
    markers: HashMap<EntityId, f32>,
    hero_mode: bool,
    busy: bool,
    pending: Outputs,
    outputs: Outputs,
}

impl Orchestrator {
    pub fn new(cfg: Config) -> Result<Self> {
        cfg.validate()?;
        let bounds = Bounds::try_from(cfg.canvas)?;
        let hero_mode = cfg.hero_mode;
        Ok(Self {
            cfg,
            store: EntityStore::new(bounds),
            program: Program::new(),
            executors: HashMap::new(),
            detector: CollisionDetector::new(),
            swaps: Vec::new(),
            markers: HashMap::new(),
            hero_mode,
            busy: false,
            pending: Outputs::default(),
            outputs: Outputs::default(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    // --- entities ---------------------------------------------------------

    /// Register (or re-register) an entity. The clamped state is returned and
    /// also becomes the entity's home for [`Orchestrator::reset_all`].
    pub fn register_entity(&mut self, id: impl Into<EntityId>, initial: EntityState) -> EntityState {
        let id = id.into();
        let state = self.store.register(id.clone(), initial);
        self.executors
            .entry(id.clone())
            .or_insert_with(|| Executor::new(id.clone()));
        self.detector.request_recheck();
        debug!("registered {id} at ({}, {})", state.x, state.y);
        state
    }

    /// Remove an entity together with its program, run and swaps.
    pub fn remove_entity(&mut self, id: &EntityId) -> bool {
        if let Some(mut ex) = self.executors.remove(id) {
            ex.cancel(&mut self.pending);
        }
        self.cancel_swaps_involving(id);
        self.program.drop_entity(id);
        self.detector.forget(id);
        self.markers.remove(id);
        let removed = self.store.remove(id).is_some();
        self.refresh_busy_pending();
        removed
    }

    pub fn get(&self, id: &EntityId) -> Option<EntityState> {
        self.store.get(id)
    }

    /// Direct manipulation (drag). Cancels the entity's run and any swap it
    /// takes part in, then writes the clamped position.
    pub fn move_entity(&mut self, id: &EntityId, x: f32, y: f32) -> Option<EntityState> {
        if !self.store.contains(id) {
            debug!("move_entity: unknown entity {id}");
            return None;
        }
        self.cancel(id);
        self.cancel_swaps_involving(id);
        let state = self
            .store
            .update(id, |s| EntityState::new(x, y, s.rotation))?;
        self.pending.push_change(Change {
            entity: id.clone(),
            state,
            source: ChangeSource::Drag,
        });
        self.detector.request_recheck();
        Some(state)
    }

    // --- program editing --------------------------------------------------

    /// Append an instruction to the entity's lane for the action's category.
    /// Returns `None` when the entity is not registered.
    pub fn create_instruction(&mut self, entity: &EntityId, action: Action) -> Option<Instruction> {
        if !self.store.contains(entity) {
            warn!("create_instruction: unknown entity {entity}");
            return None;
        }
        let instruction = self.program.append(entity.clone(), action);
        debug!(
            "{entity}: queued {} as {}",
            instruction.action().kind(),
            instruction.id()
        );
        if self.cfg.preview_on_create {
            self.run(entity, vec![instruction.clone()]);
        }
        Some(instruction)
    }

    pub fn remove_instruction(&mut self, id: InstructionId) -> Option<Instruction> {
        self.program.remove(id)
    }

    pub fn clear_lane(&mut self, entity: &EntityId, category: Category) -> usize {
        self.program.clear_lane(entity, category)
    }

    pub fn instructions_of(&self, entity: &EntityId) -> Vec<Instruction> {
        self.program.instructions_of(entity)
    }

    pub fn lane(&self, entity: &EntityId, category: Category) -> &[Instruction] {
        self.program.lane(entity, category)
    }

    // --- runs -------------------------------------------------------------

    /// Start a run of `instructions` on one entity's executor. Instructions
    /// for other entities are ignored.
    pub fn run(&mut self, entity: &EntityId, instructions: Vec<Instruction>) -> bool {
        let Some(ex) = self.executors.get_mut(entity) else {
            warn!("run: unknown entity {entity}");
            return false;
        };
        let started = ex.run(instructions, &self.cfg, &mut self.pending);
        self.refresh_busy_pending();
        started
    }

    /// Run the entity's queued program.
    pub fn run_entity(&mut self, entity: &EntityId) -> bool {
        let instructions = self.program.instructions_of(entity);
        self.run(entity, instructions)
    }

    /// Run every entity's queued program concurrently.
    pub fn run_all(&mut self) -> bool {
        let all = self.program.all();
        self.run_all_with(all)
    }

    /// Partition `instructions` by entity and start one run per entity.
    /// Refused as a whole while anything is executing.
    pub fn run_all_with(&mut self, instructions: Vec<Instruction>) -> bool {
        if self.is_any_executing() {
            info!("run_all rejected, a run is already active");
            return false;
        }
        let mut groups: HashMap<EntityId, Vec<Instruction>> = HashMap::new();
        for instruction in instructions {
            groups
                .entry(instruction.entity().clone())
                .or_default()
                .push(instruction);
        }
        let mut entities: Vec<EntityId> = groups.keys().cloned().collect();
        entities.sort();
        let mut started = false;
        for entity in entities {
            if let Some(list) = groups.remove(&entity) {
                started |= self.run(&entity, list);
            }
        }
        started
    }

    pub fn cancel(&mut self, entity: &EntityId) -> bool {
        let cancelled = self
            .executors
            .get_mut(entity)
            .map(|ex| ex.cancel(&mut self.pending))
            .unwrap_or(false);
        self.refresh_busy_pending();
        cancelled
    }

    /// Cancel every run. In-flight swaps keep going.
    pub fn cancel_all(&mut self) {
        let mut n = 0;
        for ex in self.executors.values_mut() {
            if ex.cancel(&mut self.pending) {
                n += 1;
            }
        }
        if n > 0 {
            info!("cancelled {n} run(s)");
        }
        self.refresh_busy_pending();
    }

    /// Cancel everything, empty the program and put every entity back home.
    pub fn reset_all(&mut self) {
        self.cancel_all();
        for swap in self.swaps.drain(..) {
            swap.cancel();
        }
        self.program.clear();
        for id in self.store.ids() {
            if let Some(state) = self.store.reset_to_home(&id) {
                self.pending.push_change(Change {
                    entity: id,
                    state,
                    source: ChangeSource::Reset,
                });
            }
        }
        self.detector.clear();
        self.markers.clear();
        info!("reset {} entities", self.store.len());
    }

    pub fn is_executing(&self, entity: &EntityId) -> bool {
        self.executors
            .get(entity)
            .map(Executor::is_running)
            .unwrap_or(false)
    }

    pub fn is_any_executing(&self) -> bool {
        self.executors.values().any(Executor::is_running)
    }

    pub fn exec_state(&self, entity: &EntityId) -> Option<ExecStateKind> {
        self.executors.get(entity).map(Executor::state_kind)
    }

    pub fn status_of(&self, entity: &EntityId) -> Option<RunStatus> {
        self.executors.get(entity).and_then(Executor::current_status)
    }

    pub fn speech_of(&self, entity: &EntityId) -> Option<Speech> {
        self.executors.get(entity).and_then(Executor::speech)
    }

    // --- hero mode ----------------------------------------------------------

    pub fn hero_mode(&self) -> bool {
        self.hero_mode
    }

    /// Turning hero mode off stops in-flight swaps and forgets overlaps, so
    /// turning it back on reports already-overlapping pairs afresh.
    pub fn set_hero_mode(&mut self, on: bool) {
        if self.hero_mode == on {
            return;
        }
        self.hero_mode = on;
        if on {
            self.detector.request_recheck();
        } else {
            for swap in self.swaps.drain(..) {
                swap.cancel();
            }
            self.detector.clear();
            self.markers.clear();
        }
        info!("hero mode {}", if on { "on" } else { "off" });
    }

    pub fn is_colliding(&self, entity: &EntityId) -> bool {
        self.markers.contains_key(entity)
    }

    pub fn is_swapping(&self, entity: &EntityId) -> bool {
        self.swaps.iter().any(|s| s.involves(entity))
    }

    // --- tick ---------------------------------------------------------------

    /// Advance every executor, swap and marker by `dt` seconds, then scan for
    /// collisions. Negative or non-finite `dt` counts as zero.
    pub fn update(&mut self, dt: f32) -> &Outputs {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.outputs.clear();
        self.outputs.append(&mut self.pending);

        let mut ids: Vec<EntityId> = self.executors.keys().cloned().collect();
        ids.sort();
        let mut moved = false;
        for id in &ids {
            if let Some(ex) = self.executors.get_mut(id) {
                let before = self.outputs.events.len();
                ex.advance(dt, &self.cfg, &mut self.store, &mut self.outputs);
                moved |= self.outputs.events[before..].iter().any(|e| {
                    matches!(e, MotionEvent::InstructionFinished { .. })
                });
            }
        }
        if moved {
            self.detector.request_recheck();
        }

        self.advance_swaps(dt);
        self.advance_markers(dt);

        if self.hero_mode && self.detector.due(dt, self.cfg.collision.scan_interval) {
            let entered = self
                .detector
                .scan(&self.store, self.cfg.collision.threshold());
            for pair in entered {
                self.on_collision(pair);
            }
        }

        if let Some(ev) = self.busy_transition() {
            self.outputs.push_event(ev);
        }
        &self.outputs
    }

    fn advance_swaps(&mut self, dt: f32) {
        let cfg = &self.cfg.collision;
        let store = &mut self.store;
        let outputs = &mut self.outputs;
        self.swaps.retain_mut(|swap| {
            if !swap.advance(dt, cfg, store, outputs) {
                return true;
            }
            if !swap.is_cancelled() {
                debug!("swap {} <-> {} finished", swap.pair().a(), swap.pair().b());
                outputs.push_event(MotionEvent::SwapFinished {
                    a: swap.pair().a().clone(),
                    b: swap.pair().b().clone(),
                });
            }
            false
        });
    }

    fn advance_markers(&mut self, dt: f32) {
        self.markers.retain(|_, remaining| {
            *remaining -= dt;
            *remaining > 0.0
        });
    }

    fn on_collision(&mut self, pair: PairKey) {
        let (a, b) = (pair.a().clone(), pair.b().clone());
        info!("collision {a} <-> {b}");
        self.outputs.push_event(MotionEvent::CollisionBegan {
            a: a.clone(),
            b: b.clone(),
        });
        let marker = self.cfg.collision.marker_duration;
        self.markers.insert(a.clone(), marker);
        self.markers.insert(b.clone(), marker);

        if self.is_swapping(&a) || self.is_swapping(&b) {
            warn!("swap for {a} <-> {b} skipped, one of them is already swapping");
            self.outputs.push_event(MotionEvent::SwapSkipped { a, b });
            return;
        }

        for id in [&a, &b] {
            let mut count = self.program.reverse_moves(id);
            if let Some(ex) = self.executors.get_mut(id) {
                count = count.max(ex.reverse_pending_moves());
            }
            if count > 0 {
                debug!("{id}: reversed {count} move(s)");
                self.outputs.push_event(MotionEvent::MovesReversed {
                    entity: id.clone(),
                    count,
                });
            }
        }

        let (Some(sa), Some(sb)) = (self.store.get(&a), self.store.get(&b)) else {
            return;
        };
        self.swaps.push(Swap::new(pair, sa, sb));
        self.outputs.push_event(MotionEvent::SwapStarted { a, b });
    }

    fn cancel_swaps_involving(&mut self, id: &EntityId) {
        self.swaps.retain(|swap| {
            if swap.involves(id) {
                swap.cancel();
                false
            } else {
                true
            }
        });
    }

    fn busy_transition(&mut self) -> Option<MotionEvent> {
        let busy = self.is_any_executing();
        if busy == self.busy {
            return None;
        }
        self.busy = busy;
        debug!("busy -> {busy}");
        Some(MotionEvent::BusyChanged { busy })
    }

    fn refresh_busy_pending(&mut self) {
        if let Some(ev) = self.busy_transition() {
            self.pending.push_event(ev);
        }
    }
}
