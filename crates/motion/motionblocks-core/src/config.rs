//! Engine configuration.
//!
//! Every timing constant is in seconds, every distance in canvas pixels.
//! Defaults reproduce the feel of the block editor the engine was built for.

use serde::{Deserialize, Serialize};

use crate::error::MotionError;
use crate::Result;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub canvas: CanvasCfg,
    pub timing: TimingCfg,
    pub looks: LooksCfg,
    pub collision: CollisionCfg,
    /// Collision detection and its side effects are only active in hero mode.
    pub hero_mode: bool,
    /// Run a freshly created instruction on its own right away, as a preview.
    pub preview_on_create: bool,
}

/// Reachable area for an entity's position: `[0, width] x [0, height]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasCfg {
    pub width: f32,
    pub height: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingCfg {
    pub pixels_per_step: f32,
    pub move_min_duration: f32,
    pub move_seconds_per_step: f32,
    pub move_linger: f32,
    pub turn_min_duration: f32,
    pub turn_seconds_per_degree: f32,
    pub turn_linger: f32,
    pub goto_min_duration: f32,
    pub goto_seconds_per_pixel: f32,
    pub goto_linger: f32,
    /// Pause between consecutive top-level instructions of a run.
    pub instruction_pause: f32,
    /// Pause after every instruction replayed by a repeat.
    pub repeat_pause: f32,
    /// How long the "all blocks completed" status stays visible.
    pub completion_display: f32,
    /// Minimum pending delta (pixels or degrees) before a frame writes.
    pub write_epsilon: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LooksCfg {
    pub say_default_text: String,
    pub think_default_text: String,
    pub default_duration: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionCfg {
    /// Footprint of one entity on the canvas.
    pub sprite_size: f32,
    /// Fraction of the footprint below which two centers count as overlapping.
    pub threshold_ratio: f32,
    pub scan_interval: f32,
    pub swap_duration: f32,
    pub swap_steps: u32,
    /// Full turns added during a swap (entity A spins forward, B backward).
    pub swap_spin_degrees: f32,
    /// How long an entity keeps its "colliding" marker after an event.
    pub marker_duration: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            canvas: CanvasCfg::default(),
            timing: TimingCfg::default(),
            looks: LooksCfg::default(),
            collision: CollisionCfg::default(),
            hero_mode: true,
            preview_on_create: false,
        }
    }
}

impl Default for CanvasCfg {
    fn default() -> Self {
        Self {
            width: 468.0,
            height: 368.0,
        }
    }
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            pixels_per_step: 20.0,
            move_min_duration: 1.2,
            move_seconds_per_step: 0.12,
            move_linger: 0.6,
            turn_min_duration: 0.8,
            turn_seconds_per_degree: 0.01,
            turn_linger: 0.5,
            goto_min_duration: 0.8,
            goto_seconds_per_pixel: 0.002,
            goto_linger: 0.4,
            instruction_pause: 0.3,
            repeat_pause: 0.3,
            completion_display: 2.0,
            write_epsilon: 0.1,
        }
    }
}

impl Default for LooksCfg {
    fn default() -> Self {
        Self {
            say_default_text: "Hello!".to_string(),
            think_default_text: "Hmm...".to_string(),
            default_duration: 2.0,
        }
    }
}

impl Default for CollisionCfg {
    fn default() -> Self {
        Self {
            sprite_size: 64.0,
            threshold_ratio: 0.8,
            scan_interval: 0.1,
            swap_duration: 0.8,
            swap_steps: 20,
            swap_spin_degrees: 360.0,
            marker_duration: 1.0,
        }
    }
}

impl CollisionCfg {
    /// Center distance below which two entities overlap.
    #[inline]
    pub fn threshold(&self) -> f32 {
        self.sprite_size * self.threshold_ratio
    }
}

fn non_negative(field: &str, v: f32) -> Result<()> {
    if !v.is_finite() || v < 0.0 {
        return Err(MotionError::invalid_config(
            field,
            format!("must be finite and >= 0 (got {v})"),
        ));
    }
    Ok(())
}

fn positive(field: &str, v: f32) -> Result<()> {
    if !v.is_finite() || v <= 0.0 {
        return Err(MotionError::invalid_config(
            field,
            format!("must be finite and > 0 (got {v})"),
        ));
    }
    Ok(())
}

impl Config {
    /// Parse a (possibly partial) JSON config; missing fields keep their defaults.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: Config = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.canvas;
        if !(c.width.is_finite() && c.height.is_finite() && c.width > 0.0 && c.height > 0.0) {
            return Err(MotionError::InvalidBounds {
                width: c.width,
                height: c.height,
            });
        }

        let t = &self.timing;
        positive("timing.pixels_per_step", t.pixels_per_step)?;
        for (field, v) in [
            ("timing.move_min_duration", t.move_min_duration),
            ("timing.move_seconds_per_step", t.move_seconds_per_step),
            ("timing.move_linger", t.move_linger),
            ("timing.turn_min_duration", t.turn_min_duration),
            ("timing.turn_seconds_per_degree", t.turn_seconds_per_degree),
            ("timing.turn_linger", t.turn_linger),
            ("timing.goto_min_duration", t.goto_min_duration),
            ("timing.goto_seconds_per_pixel", t.goto_seconds_per_pixel),
            ("timing.goto_linger", t.goto_linger),
            ("timing.instruction_pause", t.instruction_pause),
            ("timing.repeat_pause", t.repeat_pause),
            ("timing.completion_display", t.completion_display),
            ("timing.write_epsilon", t.write_epsilon),
            ("looks.default_duration", self.looks.default_duration),
        ] {
            non_negative(field, v)?;
        }

        let col = &self.collision;
        positive("collision.sprite_size", col.sprite_size)?;
        positive("collision.threshold_ratio", col.threshold_ratio)?;
        positive("collision.scan_interval", col.scan_interval)?;
        non_negative("collision.swap_duration", col.swap_duration)?;
        non_negative("collision.marker_duration", col.marker_duration)?;
        if !col.swap_spin_degrees.is_finite() {
            return Err(MotionError::invalid_config(
                "collision.swap_spin_degrees",
                "must be finite",
            ));
        }
        if col.swap_steps == 0 {
            return Err(MotionError::invalid_config(
                "collision.swap_steps",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}
