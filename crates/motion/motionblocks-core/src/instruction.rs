//! Instruction model: immutable, typed description of one queued action.
//!
//! JSON form (internally tagged, payload fields optional):
//!   { "type": "move", "steps": 5 }
//!   { "type": "goto", "x": 120, "y": 40 }
//!   { "type": "say", "text": "hi", "duration": 1.5 }
//! Any unrecognized `type` deserializes to [`Action::Unknown`].

use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::LooksCfg;
use crate::ids::{EntityId, InstructionId};

/// The two independently ordered lanes of an entity's program.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Motion,
    Looks,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Move {
        #[serde(default)]
        steps: Option<f32>,
    },
    Turn {
        #[serde(default)]
        degrees: Option<f32>,
    },
    Goto {
        #[serde(default)]
        x: Option<f32>,
        #[serde(default)]
        y: Option<f32>,
    },
    Repeat {
        #[serde(default)]
        count: Option<u32>,
    },
    Say {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        duration: Option<f32>,
    },
    Think {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        duration: Option<f32>,
    },
    #[serde(other)]
    Unknown,
}

pub const DEFAULT_MOVE_STEPS: f32 = 10.0;
pub const DEFAULT_TURN_DEGREES: f32 = 90.0;
pub const DEFAULT_GOTO: (f32, f32) = (100.0, 100.0);
pub const DEFAULT_REPEAT_COUNT: u32 = 2;

impl Action {
    pub fn move_steps(steps: f32) -> Self {
        Action::Move { steps: Some(steps) }
    }

    pub fn turn(degrees: f32) -> Self {
        Action::Turn {
            degrees: Some(degrees),
        }
    }

    pub fn goto(x: f32, y: f32) -> Self {
        Action::Goto {
            x: Some(x),
            y: Some(y),
        }
    }

    pub fn repeat(count: u32) -> Self {
        Action::Repeat { count: Some(count) }
    }

    pub fn say(text: impl Into<String>, duration: f32) -> Self {
        Action::Say {
            text: Some(text.into()),
            duration: Some(duration),
        }
    }

    pub fn think(text: impl Into<String>, duration: f32) -> Self {
        Action::Think {
            text: Some(text.into()),
            duration: Some(duration),
        }
    }

    /// Unknown kinds land in the motion lane, like every non-looks block.
    pub fn category(&self) -> Category {
        match self {
            Action::Say { .. } | Action::Think { .. } => Category::Looks,
            _ => Category::Motion,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Action::Move { .. } => "move",
            Action::Turn { .. } => "turn",
            Action::Goto { .. } => "goto",
            Action::Repeat { .. } => "repeat",
            Action::Say { .. } => "say",
            Action::Think { .. } => "think",
            Action::Unknown => "unknown",
        }
    }

    /// Fill missing payload values with editor defaults. A non-finite value
    /// (NaN or an infinity from a JS caller) counts as missing, so every
    /// resolved primitive has a finite duration.
    pub fn resolve(&self, looks: &LooksCfg) -> ResolvedAction {
        match self {
            Action::Move { steps } => ResolvedAction::Move {
                steps: finite_or("move.steps", *steps, DEFAULT_MOVE_STEPS),
            },
            Action::Turn { degrees } => ResolvedAction::Turn {
                degrees: finite_or("turn.degrees", *degrees, DEFAULT_TURN_DEGREES),
            },
            Action::Goto { x, y } => ResolvedAction::Goto {
                x: finite_or("goto.x", *x, DEFAULT_GOTO.0),
                y: finite_or("goto.y", *y, DEFAULT_GOTO.1),
            },
            Action::Repeat { count } => ResolvedAction::Repeat {
                count: count.unwrap_or(DEFAULT_REPEAT_COUNT),
            },
            Action::Say { text, duration } => ResolvedAction::Speak {
                text: text
                    .clone()
                    .unwrap_or_else(|| looks.say_default_text.clone()),
                duration: finite_or("say.duration", *duration, looks.default_duration),
                thought: false,
            },
            Action::Think { text, duration } => ResolvedAction::Speak {
                text: text
                    .clone()
                    .unwrap_or_else(|| looks.think_default_text.clone()),
                duration: finite_or("think.duration", *duration, looks.default_duration),
                thought: true,
            },
            Action::Unknown => ResolvedAction::Unknown,
        }
    }
}

fn finite_or(field: &str, value: Option<f32>, default: f32) -> f32 {
    match value {
        Some(v) if v.is_finite() => v,
        Some(v) => {
            warn!("{field} = {v} is not finite, using {default}");
            default
        }
        None => default,
    }
}

/// An action with every payload value present.
#[derive(Clone, Debug, PartialEq)]
pub enum ResolvedAction {
    Move {
        steps: f32,
    },
    Turn {
        degrees: f32,
    },
    Goto {
        x: f32,
        y: f32,
    },
    Repeat {
        count: u32,
    },
    Speak {
        text: String,
        duration: f32,
        thought: bool,
    },
    Unknown,
}

/// One queued action for one entity. Never mutated; edits produce a
/// replacement with the same id and sequence position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    id: InstructionId,
    entity: EntityId,
    action: Action,
    order: u32,
}

impl Instruction {
    pub fn new(id: InstructionId, entity: EntityId, action: Action, order: u32) -> Self {
        Self {
            id,
            entity,
            action,
            order,
        }
    }

    #[inline]
    pub fn id(&self) -> InstructionId {
        self.id
    }

    #[inline]
    pub fn entity(&self) -> &EntityId {
        &self.entity
    }

    #[inline]
    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Sequence position inside the (entity, category) lane.
    #[inline]
    pub fn order(&self) -> u32 {
        self.order
    }

    #[inline]
    pub fn category(&self) -> Category {
        self.action.category()
    }

    pub fn replaced(&self, action: Action) -> Self {
        Self {
            action,
            ..self.clone()
        }
    }

    /// Replacement with the move distance negated; `None` for other kinds.
    /// A missing distance is made explicit first so the flip is visible.
    pub fn reversed_move(&self) -> Option<Self> {
        match self.action {
            Action::Move { steps } => {
                let steps = steps.unwrap_or(DEFAULT_MOVE_STEPS);
                Some(self.replaced(Action::move_steps(-steps)))
            }
            _ => None,
        }
    }
}

/// Execution order: ascending sequence position, ties broken by creation.
pub fn sort_for_execution(list: &mut [Instruction]) {
    list.sort_by_key(|i| (i.order(), i.id()));
}
