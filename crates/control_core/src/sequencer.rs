use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use shared::{
    domain::{EntityKey, InputName, Origin, SceneName},
    error::ControlError,
};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    events::ControlEvent,
    surface::{ControlSurface, MacroLayout},
};

pub const BREAK_MACRO: &str = "break";

pub fn return_macro_name(scene: &SceneName) -> String {
    format!("return:{scene}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    JingleEnabled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MacroStep {
    SetMute { input: InputName, muted: bool },
    SetScene(SceneName),
    SaveSnapshot(EntityKey),
    RestoreSnapshot(EntityKey),
    SetPip(f64),
    PlayCue(String),
    PlayCueIf(String, Condition),
    WaitFixed(Duration),
    WaitFixedIf(Duration, Condition),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Awaited by the caller; only quick steps.
    Inline,
    /// Spawned so fixed waits never hold up the caller.
    Background,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Macro {
    pub name: String,
    pub steps: Vec<MacroStep>,
    pub mode: ExecutionMode,
}

impl Macro {
    /// Mute both microphones, go to the break scene and hide the PIP, remembering its size.
    pub fn break_macro(layout: &MacroLayout) -> Self {
        Self {
            name: BREAK_MACRO.to_string(),
            steps: vec![
                MacroStep::SetMute {
                    input: layout.instructor.clone(),
                    muted: true,
                },
                MacroStep::SetMute {
                    input: layout.broadcaster.clone(),
                    muted: true,
                },
                MacroStep::SetScene(layout.break_scene.clone()),
                MacroStep::SaveSnapshot(EntityKey::pip()),
                MacroStep::SetPip(0.0),
            ],
            mode: ExecutionMode::Inline,
        }
    }

    /// Unmute the instructors, optionally play the return jingle and let it run, then switch
    /// to `scene` and bring the PIP back to its pre-break size.
    pub fn return_to(layout: &MacroLayout, scene: &SceneName) -> Self {
        Self {
            name: return_macro_name(scene),
            steps: vec![
                MacroStep::SetMute {
                    input: layout.instructor.clone(),
                    muted: false,
                },
                MacroStep::PlayCueIf(layout.return_cue.clone(), Condition::JingleEnabled),
                MacroStep::WaitFixedIf(layout.jingle_wait, Condition::JingleEnabled),
                MacroStep::SetScene(scene.clone()),
                MacroStep::RestoreSnapshot(EntityKey::pip()),
            ],
            mode: ExecutionMode::Background,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacroReport {
    pub name: String,
    pub completed_steps: usize,
    pub total_steps: usize,
    /// Recoverable step failures the sequence continued past.
    pub warnings: Vec<String>,
    /// The failure that aborted the sequence, if any.
    pub error: Option<String>,
}

impl MacroReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

pub enum MacroRun {
    Finished(MacroReport),
    Spawned(JoinHandle<MacroReport>),
}

/// Conditions are read once when a macro starts so its steps agree with each other.
#[derive(Debug, Clone, Copy)]
struct Conditions {
    jingle_enabled: bool,
}

impl Conditions {
    fn holds(self, condition: Condition) -> bool {
        match condition {
            Condition::JingleEnabled => self.jingle_enabled,
        }
    }
}

struct FlightGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
    name: String,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.name);
    }
}

/// Runs macros one step at a time against the surface. A macro name never has two runs in
/// flight; different names may interleave and the last write to each entity wins.
#[derive(Clone)]
pub struct MacroSequencer {
    surface: Arc<ControlSurface>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl MacroSequencer {
    pub fn new(surface: Arc<ControlSurface>) -> Self {
        Self {
            surface,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
    }

    pub async fn run_break(&self) -> Result<MacroRun, ControlError> {
        self.run(Macro::break_macro(self.surface.layout())).await
    }

    pub async fn run_return(&self, scene: &SceneName) -> Result<MacroRun, ControlError> {
        self.run(Macro::return_to(self.surface.layout(), scene)).await
    }

    pub async fn run(&self, macro_def: Macro) -> Result<MacroRun, ControlError> {
        let guard = self.acquire(&macro_def.name)?;
        let conditions = Conditions {
            jingle_enabled: self.surface.jingle_enabled(),
        };
        info!(macro_name = %macro_def.name, steps = macro_def.steps.len(), "macro: starting");
        match macro_def.mode {
            ExecutionMode::Inline => {
                let report = execute(&self.surface, &macro_def, conditions).await;
                drop(guard);
                Ok(MacroRun::Finished(report))
            }
            ExecutionMode::Background => {
                let surface = Arc::clone(&self.surface);
                Ok(MacroRun::Spawned(tokio::spawn(async move {
                    let _guard = guard;
                    execute(&surface, &macro_def, conditions).await
                })))
            }
        }
    }

    fn acquire(&self, name: &str) -> Result<FlightGuard, ControlError> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(name.to_string()) {
            warn!(macro_name = name, "macro: already running, request ignored");
            return Err(ControlError::MacroInFlight(name.to_string()));
        }
        Ok(FlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            name: name.to_string(),
        })
    }
}

async fn execute(surface: &ControlSurface, macro_def: &Macro, conditions: Conditions) -> MacroReport {
    let mut report = MacroReport {
        name: macro_def.name.clone(),
        completed_steps: 0,
        total_steps: macro_def.steps.len(),
        warnings: Vec::new(),
        error: None,
    };

    for (index, step) in macro_def.steps.iter().enumerate() {
        match run_step(surface, step, conditions).await {
            Ok(()) => {}
            Err(err) if err.is_recoverable() => {
                warn!(macro_name = %macro_def.name, step = index, "macro: step failed, continuing: {err}");
                report.warnings.push(err.to_string());
            }
            Err(err) => {
                error!(macro_name = %macro_def.name, step = index, "macro: aborted: {err}");
                report.error = Some(err.to_string());
                break;
            }
        }
        report.completed_steps += 1;
    }

    if report.is_success() {
        info!(macro_name = %report.name, warnings = report.warnings.len(), "macro: finished");
    } else {
        surface
            .events()
            .publish(ControlEvent::Error(format!(
                "{} stopped after {} of {} steps",
                report.name, report.completed_steps, report.total_steps
            )));
    }
    surface
        .events()
        .publish(ControlEvent::MacroFinished(report.clone()));
    report
}

async fn run_step(
    surface: &ControlSurface,
    step: &MacroStep,
    conditions: Conditions,
) -> Result<(), ControlError> {
    debug!(?step, "macro: step");
    match step {
        MacroStep::SetMute { input, muted } => surface.mute(input)?.apply(*muted).await,
        MacroStep::SetScene(scene) => surface.scenes().switch(scene, Origin::Local).await,
        MacroStep::SaveSnapshot(key) => {
            snapshot_target(key)?;
            surface.pip().save_snapshot().await
        }
        MacroStep::RestoreSnapshot(key) => {
            snapshot_target(key)?;
            surface.pip().restore_snapshot().await
        }
        MacroStep::SetPip(scale) => surface.pip().update(*scale, Origin::Local).await,
        MacroStep::PlayCue(label) => surface.cues().play(label).await,
        MacroStep::PlayCueIf(label, condition) => {
            if conditions.holds(*condition) {
                surface.cues().play(label).await
            } else {
                Ok(())
            }
        }
        MacroStep::WaitFixed(duration) => {
            tokio::time::sleep(*duration).await;
            Ok(())
        }
        MacroStep::WaitFixedIf(duration, condition) => {
            if conditions.holds(*condition) {
                tokio::time::sleep(*duration).await;
            }
            Ok(())
        }
    }
}

/// Only the PIP keeps a snapshot.
fn snapshot_target(key: &EntityKey) -> Result<(), ControlError> {
    if *key == EntityKey::pip() {
        Ok(())
    } else {
        Err(ControlError::unknown("snapshot target", key.as_str()))
    }
}

#[cfg(test)]
#[path = "tests/sequencer_tests.rs"]
mod tests;
