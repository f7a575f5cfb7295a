use js_sys::Function;
use serde::Serialize;
use serde_wasm_bindgen as swb;
use wasm_bindgen::prelude::*;

use motionblocks_core::{
    Action, Category, Config, EntityId, EntityState, Instruction, InstructionId, MotionError,
    MotionEvent, Orchestrator, Outputs,
};

#[wasm_bindgen]
pub struct MotionBlocks {
    core: Orchestrator,
    busy_listener: Option<Function>,
}

fn jsvalue_is_undefined_or_null(v: &JsValue) -> bool {
    v.is_undefined() || v.is_null()
}

fn to_js<T: Serialize + ?Sized>(what: &str, v: &T) -> Result<JsValue, JsError> {
    swb::to_value(v).map_err(|e| JsError::new(&format!("{what} error: {e}")))
}

fn core_err(e: MotionError) -> JsError {
    JsError::new(&format!("{} error: {e}", e.category()))
}

#[wasm_bindgen]
impl MotionBlocks {
    /// Create a scheduler. Pass a (partial) config object or undefined/null
    /// for defaults, e.g. `new MotionBlocks({ hero_mode: false })`.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<MotionBlocks, JsError> {
        console_error_panic_hook::set_once();

        let cfg: Config = if jsvalue_is_undefined_or_null(&config) {
            Config::default()
        } else {
            swb::from_value(config).map_err(|e| JsError::new(&format!("config error: {e}")))?
        };
        Ok(MotionBlocks {
            core: Orchestrator::new(cfg).map_err(core_err)?,
            busy_listener: None,
        })
    }

    /// Register (or re-register) a sprite. Returns the clamped state.
    #[wasm_bindgen(js_name = register_entity)]
    pub fn register_entity(
        &mut self,
        id: String,
        x: f32,
        y: f32,
        rotation: f32,
    ) -> Result<JsValue, JsError> {
        let state = self
            .core
            .register_entity(id, EntityState::new(x, y, rotation));
        to_js("state", &state)
    }

    #[wasm_bindgen(js_name = remove_entity)]
    pub fn remove_entity(&mut self, id: String) -> bool {
        self.core.remove_entity(&EntityId::from(id))
    }

    /// Current state `{ x, y, rotation }`, or null for unknown ids.
    #[wasm_bindgen]
    pub fn get(&self, id: String) -> Result<JsValue, JsError> {
        match self.core.get(&EntityId::from(id)) {
            Some(state) => to_js("state", &state),
            None => Ok(JsValue::NULL),
        }
    }

    /// Drag a sprite to `(x, y)`. Cancels its run and any swap it is in.
    #[wasm_bindgen(js_name = move_entity)]
    pub fn move_entity(&mut self, id: String, x: f32, y: f32) -> Result<JsValue, JsError> {
        let id = EntityId::from(id);
        let state = self
            .core
            .move_entity(&id, x, y)
            .ok_or_else(|| core_err(MotionError::UnknownEntity { id: id.to_string() }))?;
        to_js("state", &state)
    }

    /// Queue an action such as `{ type: "move", steps: 5 }`. Returns the
    /// created instruction, or null when the entity is unknown.
    #[wasm_bindgen(js_name = create_instruction)]
    pub fn create_instruction(&mut self, entity: String, action: JsValue) -> Result<JsValue, JsError> {
        let action: Action =
            swb::from_value(action).map_err(|e| JsError::new(&format!("action error: {e}")))?;
        match self.core.create_instruction(&EntityId::from(entity), action) {
            Some(instruction) => to_js("instruction", &instruction),
            None => Ok(JsValue::NULL),
        }
    }

    #[wasm_bindgen(js_name = remove_instruction)]
    pub fn remove_instruction(&mut self, id: u32) -> bool {
        self.core.remove_instruction(InstructionId(id)).is_some()
    }

    /// Clear the "motion" or "looks" lane of an entity.
    #[wasm_bindgen(js_name = clear_lane)]
    pub fn clear_lane(&mut self, entity: String, category: String) -> Result<u32, JsError> {
        let category: Category = swb::from_value(JsValue::from_str(&category))
            .map_err(|e| JsError::new(&format!("category error: {e}")))?;
        Ok(self.core.clear_lane(&EntityId::from(entity), category) as u32)
    }

    #[wasm_bindgen(js_name = instructions_of)]
    pub fn instructions_of(&self, entity: String) -> Result<JsValue, JsError> {
        to_js("instructions", &self.core.instructions_of(&EntityId::from(entity)))
    }

    #[wasm_bindgen(js_name = run_entity)]
    pub fn run_entity(&mut self, id: String) -> bool {
        self.core.run_entity(&EntityId::from(id))
    }

    #[wasm_bindgen(js_name = run_all)]
    pub fn run_all(&mut self) -> bool {
        self.core.run_all()
    }

    /// Run an explicit instruction list (as returned by `instructions_of`).
    #[wasm_bindgen(js_name = run_all_with)]
    pub fn run_all_with(&mut self, instructions: JsValue) -> Result<bool, JsError> {
        let list: Vec<Instruction> = swb::from_value(instructions)
            .map_err(|e| JsError::new(&format!("instructions error: {e}")))?;
        Ok(self.core.run_all_with(list))
    }

    #[wasm_bindgen]
    pub fn cancel(&mut self, id: String) -> bool {
        self.core.cancel(&EntityId::from(id))
    }

    #[wasm_bindgen(js_name = cancel_all)]
    pub fn cancel_all(&mut self) {
        self.core.cancel_all();
    }

    #[wasm_bindgen(js_name = reset_all)]
    pub fn reset_all(&mut self) {
        self.core.reset_all();
    }

    #[wasm_bindgen(js_name = is_executing)]
    pub fn is_executing(&self, id: String) -> bool {
        self.core.is_executing(&EntityId::from(id))
    }

    #[wasm_bindgen(js_name = is_any_executing)]
    pub fn is_any_executing(&self) -> bool {
        self.core.is_any_executing()
    }

    /// `{ instruction, current_step, total_steps, label }` or null.
    #[wasm_bindgen(js_name = status_of)]
    pub fn status_of(&self, id: String) -> Result<JsValue, JsError> {
        match self.core.status_of(&EntityId::from(id)) {
            Some(status) => to_js("status", &status),
            None => Ok(JsValue::NULL),
        }
    }

    /// `{ text, thought }` while a say / think is showing, else null.
    #[wasm_bindgen(js_name = speech_of)]
    pub fn speech_of(&self, id: String) -> Result<JsValue, JsError> {
        match self.core.speech_of(&EntityId::from(id)) {
            Some(speech) => to_js("speech", &speech),
            None => Ok(JsValue::NULL),
        }
    }

    /// "idle" | "running" | "completed", or null for unknown ids.
    #[wasm_bindgen(js_name = exec_state)]
    pub fn exec_state(&self, id: String) -> Result<JsValue, JsError> {
        match self.core.exec_state(&EntityId::from(id)) {
            Some(kind) => to_js("state", &kind),
            None => Ok(JsValue::NULL),
        }
    }

    #[wasm_bindgen(js_name = set_hero_mode)]
    pub fn set_hero_mode(&mut self, on: bool) {
        self.core.set_hero_mode(on);
    }

    #[wasm_bindgen(js_name = hero_mode)]
    pub fn hero_mode(&self) -> bool {
        self.core.hero_mode()
    }

    #[wasm_bindgen(js_name = is_colliding)]
    pub fn is_colliding(&self, id: String) -> bool {
        self.core.is_colliding(&EntityId::from(id))
    }

    #[wasm_bindgen(js_name = is_swapping)]
    pub fn is_swapping(&self, id: String) -> bool {
        self.core.is_swapping(&EntityId::from(id))
    }

    /// Register `listener(busy: boolean)`, called from `update` whenever the
    /// aggregate "anything executing" signal flips. Pass null to remove.
    #[wasm_bindgen(js_name = set_busy_listener)]
    pub fn set_busy_listener(&mut self, listener: Option<Function>) {
        self.busy_listener = listener;
    }

    /// Step by dt seconds. Returns `{ changes, events }`.
    #[wasm_bindgen]
    pub fn update(&mut self, dt: f32) -> Result<JsValue, JsError> {
        let out: &Outputs = self.core.update(dt);
        if let Some(listener) = &self.busy_listener {
            for ev in &out.events {
                if let MotionEvent::BusyChanged { busy } = ev {
                    listener
                        .call1(&JsValue::UNDEFINED, &JsValue::from_bool(*busy))
                        .map_err(|e| JsError::new(&format!("busy listener error: {e:?}")))?;
                }
            }
        }
        to_js("outputs", out)
    }
}

/// Numeric ABI version for compatibility checks at init.
#[wasm_bindgen]
pub fn abi_version() -> u32 {
    1
}
