//! The animation driver: numeric tasks advanced by a cooperative clock.
//!
//! The driver is the opaque interpolation primitive the sequencer binds
//! work to. A rule resolves its values into an [`AnimationTask`] (numeric
//! keyframes plus an easing strategy); the sequencer groups every task of a
//! section into one [`CompositeStep`] and hands it to an
//! [`AnimationDriver`]. The built-in [`TickDriver`] advances the bound step
//! deterministically from the embedder's clock, which is also what the test
//! suite drives.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::easing::Easing;
use crate::effects::EffectRef;
use crate::stage::Stage;

/// Shared timing defaults for a task or a section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    /// Duration of one pass in milliseconds.
    pub duration_ms: f64,
    /// Delay before the task starts in milliseconds.
    pub delay_ms: f64,
    /// Easing strategy for the pass.
    pub easing: Easing,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            duration_ms: 300.0,
            delay_ms: 0.0,
            easing: Easing::Ease,
        }
    }
}

impl Timing {
    pub fn new(duration_ms: f64) -> Self {
        Self {
            duration_ms,
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay_ms: f64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    /// Timing built from configured playback defaults.
    pub fn from_config(config: &cadence_config::PlaybackConfig) -> Self {
        let easing = config
            .default_easing
            .as_deref()
            .and_then(Easing::from_name)
            .unwrap_or_default();
        Self {
            duration_ms: config.default_duration_ms,
            delay_ms: config.default_delay_ms,
            easing,
        }
    }
}

/// Lifecycle state of a bound task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Created, waiting out its delay.
    Pending,
    /// Actively advancing.
    Running,
    /// Paused; time does not accumulate.
    Paused,
    /// Completed all passes.
    Finished,
    /// Ended early by cancellation.
    Cancelled,
}

/// One bound animation task: numeric keyframes applied through an effect.
pub struct AnimationTask {
    element: String,
    effect: EffectRef,
    keyframes: Vec<f64>,
    timing: Timing,
    /// Number of passes; at least 1.
    repeats: u32,
    /// Odd passes play the keyframes backwards.
    alternate: bool,
    elapsed_ms: f64,
    state: TaskState,
}

impl fmt::Debug for AnimationTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationTask")
            .field("element", &self.element)
            .field("keyframes", &self.keyframes)
            .field("timing", &self.timing)
            .field("repeats", &self.repeats)
            .field("state", &self.state)
            .finish()
    }
}

impl AnimationTask {
    pub fn new(
        element: impl Into<String>,
        effect: EffectRef,
        keyframes: Vec<f64>,
        timing: Timing,
    ) -> Self {
        let state = if timing.delay_ms > 0.0 {
            TaskState::Pending
        } else {
            TaskState::Running
        };
        Self {
            element: element.into(),
            effect,
            keyframes,
            timing,
            repeats: 1,
            alternate: false,
            elapsed_ms: 0.0,
            state,
        }
    }

    pub fn with_repeats(mut self, repeats: u32, alternate: bool) -> Self {
        self.repeats = repeats.max(1);
        self.alternate = alternate;
        self
    }

    /// The same task with its keyframes played backwards.
    pub fn reversed(mut self) -> Self {
        self.keyframes.reverse();
        self
    }

    pub fn element(&self) -> &str {
        &self.element
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn keyframes(&self) -> &[f64] {
        &self.keyframes
    }

    /// Total wall time the task occupies, delay included.
    pub fn total_ms(&self) -> f64 {
        self.timing.delay_ms + self.timing.duration_ms * f64::from(self.repeats)
    }

    fn active_elapsed(&self) -> f64 {
        (self.elapsed_ms - self.timing.delay_ms).max(0.0)
    }

    /// Progress of the current pass (0.0 to 1.0), direction applied.
    fn pass_offset(&self) -> f64 {
        if self.timing.duration_ms <= 0.0 {
            return 1.0;
        }
        let passes = self.active_elapsed() / self.timing.duration_ms;
        let pass = (passes.floor() as u32).min(self.repeats - 1);
        let offset = if passes >= f64::from(self.repeats) {
            1.0
        } else {
            passes.fract()
        };
        if self.alternate && pass % 2 == 1 {
            1.0 - offset
        } else {
            offset
        }
    }

    /// Interpolate the keyframes at eased progress.
    fn value_at(&self, offset: f64) -> f64 {
        match self.keyframes.len() {
            0 => 0.0,
            1 => self.keyframes[0],
            len => {
                let eased = self.timing.easing.evaluate(offset);
                let scaled = (eased * (len - 1) as f64).clamp(0.0, (len - 1) as f64);
                let index = (scaled.floor() as usize).min(len - 2);
                let frac = scaled - index as f64;
                self.keyframes[index] + (self.keyframes[index + 1] - self.keyframes[index]) * frac
            }
        }
    }

    /// The current interpolated value.
    pub fn current_value(&self) -> f64 {
        match self.state {
            TaskState::Pending => self.value_at(0.0),
            TaskState::Finished | TaskState::Cancelled => self.value_at(self.pass_offset()),
            TaskState::Running | TaskState::Paused => self.value_at(self.pass_offset()),
        }
    }

    /// Advance the task. Returns `true` while still active.
    pub fn update(&mut self, delta_ms: f64) -> bool {
        match self.state {
            TaskState::Finished | TaskState::Cancelled => return false,
            TaskState::Paused => return true,
            TaskState::Pending | TaskState::Running => {}
        }

        self.elapsed_ms += delta_ms;
        if self.elapsed_ms < self.timing.delay_ms {
            return true;
        }
        if self.state == TaskState::Pending {
            self.state = TaskState::Running;
        }

        let total_active = self.timing.duration_ms * f64::from(self.repeats);
        if self.active_elapsed() >= total_active {
            self.state = TaskState::Finished;
            return false;
        }
        true
    }

    /// Apply the current value to the stage through the bound effect.
    ///
    /// Failures are logged and swallowed: a broken effect isolates to this
    /// task and the rest of the step proceeds.
    pub fn apply(&self, stage: &mut Stage) {
        if self.state == TaskState::Pending {
            return;
        }
        if let Err(err) = self.effect.apply(stage, &self.element, self.current_value()) {
            log::warn!("effect failed for '{}': {err}", self.element);
        }
    }

    pub fn pause(&mut self) {
        if matches!(self.state, TaskState::Running | TaskState::Pending) {
            self.state = TaskState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == TaskState::Paused {
            self.state = if self.elapsed_ms < self.timing.delay_ms {
                TaskState::Pending
            } else {
                TaskState::Running
            };
        }
    }

    pub fn cancel(&mut self) {
        if !matches!(self.state, TaskState::Finished | TaskState::Cancelled) {
            self.state = TaskState::Cancelled;
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            TaskState::Pending | TaskState::Running | TaskState::Paused
        )
    }

    pub fn is_finished(&self) -> bool {
        self.state == TaskState::Finished
    }

    /// Raw play time (elapsed wall time including delay).
    pub fn play_time(&self) -> f64 {
        self.elapsed_ms
    }

    /// Scrub to a raw play time. State is re-derived from the new position.
    pub fn set_play_time(&mut self, ms: f64) {
        if self.state == TaskState::Cancelled {
            return;
        }
        self.elapsed_ms = ms.max(0.0);
        let total_active = self.timing.duration_ms * f64::from(self.repeats);
        self.state = if self.elapsed_ms < self.timing.delay_ms {
            TaskState::Pending
        } else if self.active_elapsed() >= total_active {
            TaskState::Finished
        } else {
            TaskState::Running
        };
    }
}

/// Every task of one section, bound together as a single step.
///
/// The step completes only when **all** of its tasks have completed.
#[derive(Debug, Default)]
pub struct CompositeStep {
    tasks: Vec<AnimationTask>,
    /// The section's own start delay; scrub times are reported relative to
    /// it.
    base_delay_ms: f64,
}

impl CompositeStep {
    pub fn new(tasks: Vec<AnimationTask>, base_delay_ms: f64) -> Self {
        Self {
            tasks,
            base_delay_ms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn tasks(&self) -> &[AnimationTask] {
        &self.tasks
    }

    /// Advance every task and apply their values. Returns `true` while any
    /// task is still active.
    pub fn advance(&mut self, stage: &mut Stage, delta_ms: f64) -> bool {
        let mut any_active = false;
        for task in &mut self.tasks {
            let active = task.update(delta_ms);
            task.apply(stage);
            any_active |= active;
        }
        any_active
    }

    /// Complete only when all tasks have reached a terminal state.
    pub fn is_complete(&self) -> bool {
        self.tasks.iter().all(|t| !t.is_active())
    }

    pub fn pause(&mut self) {
        for task in &mut self.tasks {
            task.pause();
        }
    }

    pub fn resume(&mut self) {
        for task in &mut self.tasks {
            task.resume();
        }
    }

    /// End every task immediately.
    pub fn cancel(&mut self) {
        for task in &mut self.tasks {
            task.cancel();
        }
    }

    /// Current play time, adjusted by the step's own start delay.
    pub fn play_time(&self) -> f64 {
        let raw = self
            .tasks
            .iter()
            .map(AnimationTask::play_time)
            .fold(0.0, f64::max);
        (raw - self.base_delay_ms).max(0.0)
    }

    /// Scrub every task to the given play time (relative to the step's own
    /// start delay).
    pub fn set_play_time(&mut self, ms: f64) {
        let raw = ms.max(0.0) + self.base_delay_ms;
        for task in &mut self.tasks {
            task.set_play_time(raw);
        }
    }
}

/// The driver contract the sequencer binds composite steps to.
pub trait AnimationDriver: fmt::Debug {
    /// Bind a step, replacing any previously bound one.
    fn bind(&mut self, step: CompositeStep);

    /// Advance the bound step. Returns `true` while the step is running.
    fn advance(&mut self, stage: &mut Stage, delta_ms: f64) -> bool;

    /// Whether the bound step (if any) has fully completed.
    fn is_complete(&self) -> bool;

    fn pause(&mut self);
    fn resume(&mut self);
    fn cancel(&mut self);

    /// Play time of the bound step; zero when idle.
    fn play_time(&self) -> f64;

    /// Scrub the bound step.
    fn set_play_time(&mut self, ms: f64);

    /// The currently bound step, if any.
    fn step(&self) -> Option<&CompositeStep>;

    /// Drop the bound step, returning it for inspection.
    fn unbind(&mut self) -> Option<CompositeStep>;
}

/// Deterministic driver advancing steps from the embedder's clock.
#[derive(Debug, Default)]
pub struct TickDriver {
    step: Option<CompositeStep>,
}

impl TickDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnimationDriver for TickDriver {
    fn bind(&mut self, step: CompositeStep) {
        self.step = Some(step);
    }

    fn advance(&mut self, stage: &mut Stage, delta_ms: f64) -> bool {
        match self.step.as_mut() {
            Some(step) => step.advance(stage, delta_ms),
            None => false,
        }
    }

    fn is_complete(&self) -> bool {
        self.step.as_ref().is_none_or(CompositeStep::is_complete)
    }

    fn pause(&mut self) {
        if let Some(step) = self.step.as_mut() {
            step.pause();
        }
    }

    fn resume(&mut self) {
        if let Some(step) = self.step.as_mut() {
            step.resume();
        }
    }

    fn cancel(&mut self) {
        if let Some(step) = self.step.as_mut() {
            step.cancel();
        }
    }

    fn play_time(&self) -> f64 {
        self.step.as_ref().map(CompositeStep::play_time).unwrap_or(0.0)
    }

    fn set_play_time(&mut self, ms: f64) {
        if let Some(step) = self.step.as_mut() {
            step.set_play_time(ms);
        }
    }

    fn step(&self) -> Option<&CompositeStep> {
        self.step.as_ref()
    }

    fn unbind(&mut self) -> Option<CompositeStep> {
        self.step.take()
    }
}
