//! Per-tick outputs of the orchestrator.
//!
//! Outputs carry the entity state changes written since the previous tick and
//! a separate list of semantic events. Renderers may also read the store
//! directly; the change list exists so a host can apply only what moved.

use serde::{Deserialize, Serialize};

use crate::ids::{EntityId, InstructionId};
use crate::store::EntityState;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    Animation,
    Drag,
    Collision,
    Reset,
}

/// One stored entity state, as written by a single `EntityStore::update`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub entity: EntityId,
    pub state: EntityState,
    pub source: ChangeSource,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
#[non_exhaustive]
pub enum MotionEvent {
    RunStarted {
        entity: EntityId,
        instructions: usize,
    },
    InstructionStarted {
        entity: EntityId,
        instruction: InstructionId,
        kind: String,
    },
    InstructionFinished {
        entity: EntityId,
        instruction: InstructionId,
    },
    /// Resolved as a no-op without running (unknown kind, missing entity).
    InstructionSkipped {
        entity: EntityId,
        instruction: InstructionId,
        reason: String,
    },
    RunCompleted {
        entity: EntityId,
        instructions: usize,
    },
    RunCancelled {
        entity: EntityId,
    },
    CollisionBegan {
        a: EntityId,
        b: EntityId,
    },
    MovesReversed {
        entity: EntityId,
        count: usize,
    },
    SwapStarted {
        a: EntityId,
        b: EntityId,
    },
    SwapFinished {
        a: EntityId,
        b: EntityId,
    },
    SwapSkipped {
        a: EntityId,
        b: EntityId,
    },
    /// The aggregate "anything executing" signal flipped.
    BusyChanged {
        busy: bool,
    },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Outputs {
    #[serde(default)]
    pub changes: Vec<Change>,
    #[serde(default)]
    pub events: Vec<MotionEvent>,
}

impl Outputs {
    #[inline]
    pub fn clear(&mut self) {
        self.changes.clear();
        self.events.clear();
    }

    #[inline]
    pub fn push_change(&mut self, change: Change) {
        self.changes.push(change);
    }

    #[inline]
    pub fn push_event(&mut self, event: MotionEvent) {
        self.events.push(event);
    }

    #[inline]
    pub fn append(&mut self, other: &mut Outputs) {
        self.changes.append(&mut other.changes);
        self.events.append(&mut other.events);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.events.is_empty()
    }
}
