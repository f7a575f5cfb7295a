//! MotionBlocks Core (engine-agnostic)
//!
//! Per-entity animation scheduler for block-based motion programs. Hosts
//! register entities, queue instructions (move, turn, goto, repeat, say,
//! think) and drive everything with [`Orchestrator::update`]. Every position
//! write goes through the [`EntityStore`], which clamps into the canvas.

pub mod animators;
pub mod cancel;
pub mod collision;
pub mod config;
pub mod easing;
pub mod error;
pub mod executor;
pub mod ids;
pub mod instruction;
pub mod orchestrator;
pub mod outputs;
pub mod program;
pub mod store;

// Re-exports for consumers (adapters)
pub use cancel::CancelToken;
pub use collision::{CollisionDetector, PairKey, Swap};
pub use config::{CanvasCfg, CollisionCfg, Config, LooksCfg, TimingCfg};
pub use error::MotionError;
pub use executor::{ExecStateKind, Executor, RunStatus, Speech};
pub use ids::{EntityId, InstructionId};
pub use instruction::{Action, Category, Instruction, ResolvedAction};
pub use orchestrator::Orchestrator;
pub use outputs::{Change, ChangeSource, MotionEvent, Outputs};
pub use program::Program;
pub use store::{Bounds, EntityState, EntityStore};

pub type Result<T> = core::result::Result<T, MotionError>;
