use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    scenes: HashMap<String, String>,
    programs: HashMap<String, ProgramEntry>,
}

#[derive(Debug, Deserialize)]
struct ProgramEntry {
    program: String,
    /// Scene the program was written against.
    #[serde(default)]
    scene: Option<String>,
}

/// Read and parse a file under the repo-level `fixtures/` directory.
fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../../fixtures")
        .join(rel);
    let text = fs::read_to_string(&path)
        .with_context(|| format!("reading {} fixture {}", rel, path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing fixture {rel}"))
}

fn entry<'a, T>(map: &'a HashMap<String, T>, kind: &str, name: &str) -> Result<&'a T> {
    map.get(name)
        .ok_or_else(|| anyhow!("no {kind} named '{name}' in fixtures/manifest.json"))
}

fn sorted_keys<T>(map: &HashMap<String, T>) -> Vec<String> {
    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort();
    keys
}

/// Entity layouts (plus optional config overrides).
pub mod scenes {
    use super::*;

    pub fn keys() -> Vec<String> {
        sorted_keys(&MANIFEST.scenes)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        load_json(entry(&MANIFEST.scenes, "scene", name)?)
    }
}

/// Instruction lists, each tied to the scene it expects.
pub mod programs {
    use super::*;

    pub fn keys() -> Vec<String> {
        sorted_keys(&MANIFEST.programs)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        load_json(&entry(&MANIFEST.programs, "program", name)?.program)
    }

    /// Name of the scene this program runs against, if any.
    pub fn scene(name: &str) -> Result<Option<String>> {
        Ok(entry(&MANIFEST.programs, "program", name)?.scene.clone())
    }
}
