//! Browser binding
//!
//! A thin `wasm-bindgen` handle over [`Simulation`]: the page owns the canvas
//! and the animation frame loop, calls `update` once per frame and forwards
//! pointer events in world coordinates.

use wasm_bindgen::prelude::*;

use crate::error::SimError;
use crate::settings::Settings;
use crate::sim::{InputEvent, Runner, Simulation};
use glam::Vec2;

fn to_js(e: SimError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    // A second init only happens when the module is reloaded in place
    console_log::init_with_level(log::Level::Info).ok();
    log::info!("Water Maze starting...");
}

#[wasm_bindgen]
pub struct WaterMazeApp {
    sim: Simulation,
    runner: Runner,
}

#[wasm_bindgen]
impl WaterMazeApp {
    /// New game with default settings; stage one starts immediately
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u32) -> Result<WaterMazeApp, JsValue> {
        Self::build(Settings::default(), seed)
    }

    /// New game with settings parsed from JSON (missing fields default)
    #[wasm_bindgen(js_name = withSettings)]
    pub fn with_settings(seed: u32, json: &str) -> Result<WaterMazeApp, JsValue> {
        Self::build(Settings::from_json(json).map_err(to_js)?, seed)
    }

    fn build(settings: Settings, seed: u32) -> Result<WaterMazeApp, JsValue> {
        let mut sim = Simulation::new(settings, u64::from(seed)).map_err(to_js)?;
        sim.start_stage().map_err(to_js)?;
        Ok(Self {
            sim,
            runner: Runner::new(),
        })
    }

    /// Advance by one frame's elapsed seconds; returns ticks run
    pub fn update(&mut self, dt: f32) -> u32 {
        self.runner.advance(&mut self.sim, dt)
    }

    #[wasm_bindgen(js_name = pointerDown)]
    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.sim.push_input(InputEvent::PointerDown(Vec2::new(x, y)));
    }

    #[wasm_bindgen(js_name = pointerMove)]
    pub fn pointer_move(&mut self, x: f32, y: f32) {
        self.sim.push_input(InputEvent::PointerMove(Vec2::new(x, y)));
    }

    #[wasm_bindgen(js_name = pointerUp)]
    pub fn pointer_up(&mut self, x: f32, y: f32) {
        self.sim.push_input(InputEvent::PointerUp(Vec2::new(x, y)));
    }

    /// Global release (window blur, mouseup outside the canvas)
    #[wasm_bindgen(js_name = pointerCancel)]
    pub fn pointer_cancel(&mut self) {
        self.sim.push_input(InputEvent::PointerCancel);
    }

    #[wasm_bindgen(js_name = nextStage)]
    pub fn next_stage(&mut self) -> Result<(), JsValue> {
        self.sim.next_stage().map_err(to_js)
    }

    pub fn restart(&mut self) -> Result<(), JsValue> {
        self.sim.restart().map_err(to_js)
    }

    /// Droplet centers as [x0, y0, x1, y1, ...]
    #[wasm_bindgen(js_name = dropletPositions)]
    pub fn droplet_positions(&self) -> js_sys::Float32Array {
        let flat: Vec<f32> = self
            .sim
            .droplets()
            .positions(self.sim.world())
            .into_iter()
            .flat_map(|p| [p.x, p.y])
            .collect();
        js_sys::Float32Array::from(flat.as_slice())
    }

    /// Maze wall rectangles as [cx, cy, w, h, ...] in world space; all share
    /// the angle from `mazeAngle`
    #[wasm_bindgen(js_name = wallRects)]
    pub fn wall_rects(&self) -> js_sys::Float32Array {
        let Some(compound) = self.sim.maze().compound() else {
            return js_sys::Float32Array::new_with_length(0);
        };
        let world = self.sim.world();
        let flat: Vec<f32> = compound
            .parts
            .iter()
            .flat_map(|part| {
                let c = compound.local_to_world(world, part.center);
                let size = part.half_extents * 2.0;
                [c.x, c.y, size.x, size.y]
            })
            .collect();
        js_sys::Float32Array::from(flat.as_slice())
    }

    /// Scale cup rectangles as [cx, cy, w, h, ...]
    #[wasm_bindgen(js_name = scaleRects)]
    pub fn scale_rects(&self) -> js_sys::Float32Array {
        let flat: Vec<f32> = self
            .sim
            .scale()
            .region()
            .map(|r| {
                r.parts()
                    .iter()
                    .flat_map(|p| [p.center.x, p.center.y, p.size.x, p.size.y])
                    .collect()
            })
            .unwrap_or_default();
        js_sys::Float32Array::from(flat.as_slice())
    }

    #[wasm_bindgen(js_name = mazeAngle)]
    pub fn maze_angle(&self) -> f32 {
        self.sim
            .maze()
            .compound()
            .map(|c| c.angle(self.sim.world()))
            .unwrap_or(0.0)
    }

    /// Events raised since the last call, as a JSON array
    #[wasm_bindgen(js_name = drainEvents)]
    pub fn drain_events(&mut self) -> Result<String, JsValue> {
        let events = self.sim.drain_events();
        serde_json::to_string(&events).map_err(|e| to_js(e.into()))
    }

    /// Stage, score, weight, target and time as a JSON object
    pub fn status(&self) -> Result<String, JsValue> {
        let stage = self.sim.stage();
        let status = serde_json::json!({
            "stage": stage.number(),
            "stageCount": self.sim.settings().stages.len(),
            "phase": stage.phase(),
            "score": stage.score(),
            "weight": self.sim.scale().weight(),
            "targetWeight": self.sim.current_config().map(|c| c.target_weight),
            "elapsed": stage.elapsed(self.sim.time()),
            "timeLimit": self.sim.settings().stage_time_limit,
            "weightLabel": self
                .sim
                .scale()
                .region()
                .map(|r| [r.display_anchor.x, r.display_anchor.y]),
            "rankings": self.sim.high_scores().scores(),
        });
        serde_json::to_string(&status).map_err(|e| to_js(e.into()))
    }
}
