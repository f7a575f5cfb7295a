//! Per-entity instruction queues, split into a motion lane and a looks lane.

use hashbrown::HashMap;

use crate::ids::{EntityId, IdAllocator, InstructionId};
use crate::instruction::{sort_for_execution, Action, Category, Instruction};

#[derive(Debug, Default, Clone)]
pub struct Lanes {
    motion: Vec<Instruction>,
    looks: Vec<Instruction>,
}

impl Lanes {
    pub fn lane(&self, category: Category) -> &[Instruction] {
        match category {
            Category::Motion => &self.motion,
            Category::Looks => &self.looks,
        }
    }

    fn lane_mut(&mut self, category: Category) -> &mut Vec<Instruction> {
        match category {
            Category::Motion => &mut self.motion,
            Category::Looks => &mut self.looks,
        }
    }

    fn is_empty(&self) -> bool {
        self.motion.is_empty() && self.looks.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.motion.iter().chain(self.looks.iter())
    }
}

#[derive(Debug, Default)]
pub struct Program {
    ids: IdAllocator,
    lanes: HashMap<EntityId, Lanes>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new instruction; its sequence position is the current length
    /// of the (entity, category) lane.
    pub fn append(&mut self, entity: EntityId, action: Action) -> Instruction {
        let id = self.ids.alloc_instruction();
        let lanes = self.lanes.entry(entity.clone()).or_default();
        let lane = lanes.lane_mut(action.category());
        let instruction = Instruction::new(id, entity, action, lane.len() as u32);
        lane.push(instruction.clone());
        instruction
    }

    pub fn get(&self, id: InstructionId) -> Option<&Instruction> {
        self.lanes
            .values()
            .flat_map(|l| l.iter())
            .find(|i| i.id() == id)
    }

    pub fn remove(&mut self, id: InstructionId) -> Option<Instruction> {
        for lanes in self.lanes.values_mut() {
            for category in [Category::Motion, Category::Looks] {
                let lane = lanes.lane_mut(category);
                if let Some(pos) = lane.iter().position(|i| i.id() == id) {
                    return Some(lane.remove(pos));
                }
            }
        }
        None
    }

    /// Drop one lane of an entity. Returns how many instructions were removed.
    pub fn clear_lane(&mut self, entity: &EntityId, category: Category) -> usize {
        match self.lanes.get_mut(entity) {
            Some(lanes) => {
                let lane = lanes.lane_mut(category);
                let n = lane.len();
                lane.clear();
                n
            }
            None => 0,
        }
    }

    pub fn drop_entity(&mut self, entity: &EntityId) -> usize {
        self.lanes
            .remove(entity)
            .map(|l| l.motion.len() + l.looks.len())
            .unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.lanes.clear();
    }

    pub fn lane(&self, entity: &EntityId, category: Category) -> &[Instruction] {
        self.lanes
            .get(entity)
            .map(|l| l.lane(category))
            .unwrap_or(&[])
    }

    /// Both lanes of one entity in execution order.
    pub fn instructions_of(&self, entity: &EntityId) -> Vec<Instruction> {
        let mut out: Vec<Instruction> = self
            .lanes
            .get(entity)
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default();
        sort_for_execution(&mut out);
        out
    }

    /// Entities with at least one queued instruction, sorted.
    pub fn entities(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .lanes
            .iter()
            .filter(|(_, l)| !l.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Every queued instruction, grouped by sorted entity id.
    pub fn all(&self) -> Vec<Instruction> {
        self.entities()
            .iter()
            .flat_map(|e| self.instructions_of(e))
            .collect()
    }

    /// Replace every move of `entity` with its sign-flipped twin.
    /// Returns how many instructions were replaced.
    pub fn reverse_moves(&mut self, entity: &EntityId) -> usize {
        let Some(lanes) = self.lanes.get_mut(entity) else {
            return 0;
        };
        let mut n = 0;
        for slot in lanes.motion.iter_mut() {
            if let Some(flipped) = slot.reversed_move() {
                *slot = flipped;
                n += 1;
            }
        }
        n
    }

    pub fn len(&self) -> usize {
        self.lanes.values().map(|l| l.motion.len() + l.looks.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
