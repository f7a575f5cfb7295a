//! Hero-mode collision handling.
//!
//! [`CollisionDetector`] tracks the set of overlapping pairs and reports a
//! pair only on the scan where it starts overlapping. [`Swap`] animates the
//! side effect of a new collision: both entities trade positions over a
//! short quantized ease while spinning in opposite directions.

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::config::CollisionCfg;
use crate::easing::{ease_in_out_quad, lerp_f32};
use crate::ids::EntityId;
use crate::outputs::{Change, ChangeSource, Outputs};
use crate::store::{EntityState, EntityStore};

/// Unordered pair of distinct entities, stored with `a < b`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    a: EntityId,
    b: EntityId,
}

impl PairKey {
    pub fn new(x: EntityId, y: EntityId) -> Option<Self> {
        match x.cmp(&y) {
            std::cmp::Ordering::Less => Some(Self { a: x, b: y }),
            std::cmp::Ordering::Greater => Some(Self { a: y, b: x }),
            std::cmp::Ordering::Equal => None,
        }
    }

    #[inline]
    pub fn a(&self) -> &EntityId {
        &self.a
    }

    #[inline]
    pub fn b(&self) -> &EntityId {
        &self.b
    }

    #[inline]
    pub fn contains(&self, id: &EntityId) -> bool {
        &self.a == id || &self.b == id
    }
}

#[derive(Debug, Default)]
pub struct CollisionDetector {
    overlapping: HashSet<PairKey>,
    since_scan: f32,
    recheck: bool,
}

impl CollisionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a scan on the next tick regardless of the interval
    /// (after a move finishes or an entity is dragged).
    pub fn request_recheck(&mut self) {
        self.recheck = true;
    }

    /// Advance the scan timer; true when a scan should run this tick.
    pub fn due(&mut self, dt: f32, interval: f32) -> bool {
        self.since_scan += dt;
        if self.recheck || self.since_scan >= interval {
            self.recheck = false;
            self.since_scan = 0.0;
            true
        } else {
            false
        }
    }

    /// Recompute the overlap set and return the pairs that were not
    /// overlapping at the previous scan, sorted.
    pub fn scan(&mut self, store: &EntityStore, threshold: f32) -> Vec<PairKey> {
        let ids = store.ids();
        let mut current = HashSet::new();
        for (i, a) in ids.iter().enumerate() {
            let Some(sa) = store.get(a) else { continue };
            for b in &ids[i + 1..] {
                let Some(sb) = store.get(b) else { continue };
                if sa.distance_to(&sb) < threshold {
                    if let Some(key) = PairKey::new(a.clone(), b.clone()) {
                        current.insert(key);
                    }
                }
            }
        }
        let mut entered: Vec<PairKey> = current
            .iter()
            .filter(|k| !self.overlapping.contains(*k))
            .cloned()
            .collect();
        entered.sort();
        self.overlapping = current;
        entered
    }

    #[inline]
    pub fn is_overlapping(&self, pair: &PairKey) -> bool {
        self.overlapping.contains(pair)
    }

    pub fn forget(&mut self, id: &EntityId) {
        self.overlapping.retain(|k| !k.contains(id));
    }

    pub fn clear(&mut self) {
        self.overlapping.clear();
        self.since_scan = 0.0;
        self.recheck = false;
    }
}

/// One in-flight position swap between the two entities of a pair.
#[derive(Debug)]
pub struct Swap {
    pair: PairKey,
    from_a: EntityState,
    from_b: EntityState,
    elapsed: f32,
    last_step: u32,
    token: CancelToken,
}

impl Swap {
    pub fn new(pair: PairKey, from_a: EntityState, from_b: EntityState) -> Self {
        Self {
            pair,
            from_a,
            from_b,
            elapsed: 0.0,
            last_step: 0,
            token: CancelToken::new(),
        }
    }

    #[inline]
    pub fn pair(&self) -> &PairKey {
        &self.pair
    }

    #[inline]
    pub fn involves(&self, id: &EntityId) -> bool {
        self.pair.contains(id)
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Advance by `dt`; returns true once the final step has been written
    /// (or the swap was cancelled).
    pub fn advance(
        &mut self,
        dt: f32,
        cfg: &CollisionCfg,
        store: &mut EntityStore,
        outputs: &mut Outputs,
    ) -> bool {
        if self.token.is_cancelled() {
            return true;
        }
        self.elapsed += dt;
        let steps = cfg.swap_steps.max(1);
        let step = if cfg.swap_duration <= 0.0 {
            steps
        } else {
            let per_step = cfg.swap_duration / steps as f32;
            ((self.elapsed / per_step).floor() as u32).min(steps)
        };
        if step > self.last_step {
            self.last_step = step;
            let e = ease_in_out_quad(step as f32 / steps as f32);
            let spin = cfg.swap_spin_degrees * e;
            let (fa, fb) = (self.from_a, self.from_b);
            let next_a = EntityState::new(
                lerp_f32(fa.x, fb.x, e),
                lerp_f32(fa.y, fb.y, e),
                fa.rotation + spin,
            );
            let next_b = EntityState::new(
                lerp_f32(fb.x, fa.x, e),
                lerp_f32(fb.y, fa.y, e),
                fb.rotation - spin,
            );
            for (id, next) in [(&self.pair.a, next_a), (&self.pair.b, next_b)] {
                if self.token.is_cancelled() {
                    return true;
                }
                if let Some(state) = store.update(id, |_| next) {
                    outputs.push_change(Change {
                        entity: id.clone(),
                        state,
                        source: ChangeSource::Collision,
                    });
                }
            }
        }
        step >= steps
    }
}
