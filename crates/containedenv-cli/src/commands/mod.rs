pub mod completions;
pub mod down;
pub mod plan;
pub mod setup;
pub mod status;
pub mod up;

use containedenv_core::{CoreError, Engine};
use containedenv_runtime::{check_runtime_prereqs, format_missing, select_runtime, ContainerRuntime};
use containedenv_schema::{load_config, ProvisioningConfig};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_RUNTIME_ERROR: u8 = 3;

/// Everything a runtime-backed command needs.
pub struct Context<'a> {
    pub engine: Engine<'a>,
    pub config: &'a ProvisioningConfig,
    pub json: bool,
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn load(config_path: &Path) -> Result<ProvisioningConfig, String> {
    load_config(config_path).map_err(|e| CoreError::from(e).to_string())
}

/// Directory sent to the runtime as build context: the config file's
/// directory.
pub fn build_context(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

pub fn open_runtime(config: &ProvisioningConfig) -> Result<Box<dyn ContainerRuntime>, String> {
    let runtime =
        select_runtime(&config.runtime_backend).map_err(|e| CoreError::from(e).to_string())?;
    if std::env::var("CONTAINEDENV_SKIP_PREREQS").as_deref() != Ok("1") {
        let missing = check_runtime_prereqs(runtime.name());
        if !missing.is_empty() {
            return Err(format_missing(&missing));
        }
    }
    Ok(runtime)
}

/// Load the config, open its runtime and hand both to `f`.
pub fn with_context<F>(config_path: &Path, json: bool, f: F) -> Result<u8, String>
where
    F: FnOnce(&Context<'_>) -> Result<u8, String>,
{
    let config = load(config_path)?;
    let runtime = open_runtime(&config)?;
    let ctx = Context {
        engine: Engine::new(runtime.as_ref(), build_context(config_path)),
        config: &config,
        json,
    };
    f(&ctx)
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn finish(pb: &ProgressBar, msg: String) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(msg);
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✗ {msg}"));
}

/// Run `op` under a spinner unless output is JSON.
pub fn with_spinner<T>(
    json: bool,
    msg: &str,
    ok: &str,
    fail: &str,
    op: impl FnOnce() -> Result<T, CoreError>,
) -> Result<T, String> {
    let pb = (!json).then(|| spinner(msg));
    let result = op();
    if let Some(pb) = &pb {
        match &result {
            Ok(_) => spin_ok(pb, ok),
            Err(_) => spin_fail(pb, fail),
        }
    }
    result.map_err(|e| e.to_string())
}

pub fn colorize_state(state: &str) -> String {
    use console::Style;
    match state {
        "running" => Style::new().cyan().bold().apply_to(state).to_string(),
        "created" | "present" => Style::new().green().apply_to(state).to_string(),
        "reused" => Style::new().blue().apply_to(state).to_string(),
        "rebuilt" | "stopped" => Style::new().yellow().apply_to(state).to_string(),
        "absent" => Style::new().dim().apply_to(state).to_string(),
        other => other.to_owned(),
    }
}
