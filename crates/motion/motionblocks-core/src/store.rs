//! Entity State Store: the single source of truth for positions and rotations.
//!
//! Every writer goes through [`EntityStore::update`], which clamps the position
//! into the canvas and normalizes rotation into `[0, 360)` centrally.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::config::CanvasCfg;
use crate::error::MotionError;
use crate::ids::EntityId;
use crate::Result;

#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityState {
    pub x: f32,
    pub y: f32,
    /// Degrees.
    pub rotation: f32,
}

impl EntityState {
    pub fn new(x: f32, y: f32, rotation: f32) -> Self {
        Self { x, y, rotation }
    }

    pub fn at(x: f32, y: f32) -> Self {
        Self::new(x, y, 0.0)
    }

    /// Euclidean distance between two positions.
    #[inline]
    pub fn distance_to(&self, other: &EntityState) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Canvas rectangle `[0, width] x [0, height]` with clamping helpers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    width: f32,
    height: f32,
}

impl Bounds {
    pub fn new(width: f32, height: f32) -> Result<Self> {
        if width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0 {
            Ok(Self { width, height })
        } else {
            Err(MotionError::InvalidBounds { width, height })
        }
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.height
    }

    /// NaN maps to 0, infinities to the nearest edge.
    #[inline]
    fn clamp_axis(v: f32, max: f32) -> f32 {
        if v.is_nan() {
            0.0
        } else {
            v.clamp(0.0, max)
        }
    }

    pub fn apply(&self, s: EntityState) -> EntityState {
        EntityState {
            x: Self::clamp_axis(s.x, self.width),
            y: Self::clamp_axis(s.y, self.height),
            rotation: normalize_degrees(s.rotation),
        }
    }
}

impl TryFrom<CanvasCfg> for Bounds {
    type Error = MotionError;

    fn try_from(c: CanvasCfg) -> Result<Self> {
        Bounds::new(c.width, c.height)
    }
}

/// Normalize an angle into `[0, 360)`. Non-finite input maps to 0.
pub fn normalize_degrees(deg: f32) -> f32 {
    if !deg.is_finite() {
        return 0.0;
    }
    let r = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if r >= 360.0 {
        0.0
    } else {
        r
    }
}

#[derive(Clone, Debug)]
struct Slot {
    state: EntityState,
    home: EntityState,
}

#[derive(Debug)]
pub struct EntityStore {
    bounds: Bounds,
    inner: HashMap<EntityId, Slot>,
}

impl EntityStore {
    pub fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            inner: HashMap::new(),
        }
    }

    #[inline]
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Register (or re-register) an entity. The clamped initial state also
    /// becomes the entity's home state.
    pub fn register(&mut self, id: EntityId, initial: EntityState) -> EntityState {
        let state = self.bounds.apply(initial);
        self.inner.insert(id, Slot { state, home: state });
        state
    }

    pub fn remove(&mut self, id: &EntityId) -> Option<EntityState> {
        self.inner.remove(id).map(|slot| slot.state)
    }

    #[inline]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.inner.contains_key(id)
    }

    #[inline]
    pub fn get(&self, id: &EntityId) -> Option<EntityState> {
        self.inner.get(id).map(|slot| slot.state)
    }

    pub fn home(&self, id: &EntityId) -> Option<EntityState> {
        self.inner.get(id).map(|slot| slot.home)
    }

    /// Apply a pure transform to one entity and store the clamped, normalized
    /// result as a single replacement. Returns `None` for unknown entities.
    pub fn update<F>(&mut self, id: &EntityId, f: F) -> Option<EntityState>
    where
        F: FnOnce(EntityState) -> EntityState,
    {
        let bounds = self.bounds;
        let slot = self.inner.get_mut(id)?;
        let next = bounds.apply(f(slot.state));
        slot.state = next;
        Some(next)
    }

    pub fn reset_to_home(&mut self, id: &EntityId) -> Option<EntityState> {
        let slot = self.inner.get_mut(id)?;
        slot.state = slot.home;
        Some(slot.state)
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.inner.keys().cloned().collect();
        ids.sort();
        ids
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
