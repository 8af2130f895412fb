//! Rules: the atomic unit of staged change.
//!
//! A rule prepares against live geometry, resolves its symbolic inputs, and
//! produces at most one [`AnimationTask`] per section activation. The
//! contract here carries the reversal bookkeeping: scratch state sampled
//! during `get_ready` is reused — never resampled — when the same instance
//! replays in reverse, so a reverse playback exactly undoes the forward one.
//!
//! Per-playback lifecycle: Idle → Prepared → Animating → Ended | Skipped.

pub mod decorator;
pub mod kinds;

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use cadence_core::Size;

use crate::driver::{AnimationTask, Timing};
use crate::expr::EvalContext;
use crate::snapshot::{LayoutSnapshot, SnapshotRegistry};
use crate::stage::Stage;

/// Per-playback lifecycle phase of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RulePhase {
    #[default]
    Idle,
    Prepared,
    Animating,
    Ended,
    Skipped,
}

/// Scratch state a rule samples in `get_ready`.
///
/// Never copied on clone; a reverse replay reuses it for an exact undo.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scratch {
    values: Vec<f64>,
}

impl Scratch {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn push(&mut self, value: f64) {
        self.values.push(value);
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn replace(&mut self, values: Vec<f64>) {
        self.values = values;
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Configuration and runtime state shared by every rule kind.
#[derive(Debug, Clone, Default)]
pub struct RuleBase {
    /// Live counterpart element; `None` targets the composition's element.
    element: Option<String>,
    /// Configured to start reversed.
    start_reversed: bool,
    /// Per-rule timing override of the section default.
    timing: Option<Timing>,
    /// Wait the sequencer must honor before task creation for the section.
    wait_ms: Option<u64>,
    /// Running in reverse for the current activation.
    reverse: bool,
    scratch: Scratch,
    phase: RulePhase,
}

impl RuleBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(&self) -> Option<&str> {
        self.element.as_deref()
    }

    pub fn set_element(&mut self, element: Option<String>) {
        self.element = element;
    }

    pub fn start_reversed(&self) -> bool {
        self.start_reversed
    }

    pub fn set_start_reversed(&mut self, reversed: bool) {
        self.start_reversed = reversed;
    }

    pub fn timing(&self) -> Option<Timing> {
        self.timing
    }

    pub fn set_timing(&mut self, timing: Option<Timing>) {
        self.timing = timing;
    }

    pub fn wait_ms(&self) -> Option<u64> {
        self.wait_ms
    }

    pub fn set_wait_ms(&mut self, wait: Option<u64>) {
        self.wait_ms = wait;
    }

    pub fn reverse(&self) -> bool {
        self.reverse
    }

    pub fn set_reverse(&mut self, reverse: bool) {
        self.reverse = reverse;
    }

    pub fn scratch(&self) -> &Scratch {
        &self.scratch
    }

    pub fn scratch_mut(&mut self) -> &mut Scratch {
        &mut self.scratch
    }

    pub fn phase(&self) -> RulePhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: RulePhase) {
        self.phase = phase;
    }

    /// Structural copy for independent playback reuse: configuration is
    /// preserved, scratch and runtime state reset to empty.
    pub fn cloned_config(&self) -> Self {
        Self {
            element: self.element.clone(),
            start_reversed: self.start_reversed,
            timing: self.timing,
            wait_ms: self.wait_ms,
            reverse: false,
            scratch: Scratch::default(),
            phase: RulePhase::Idle,
        }
    }
}

/// Owned context for one section activation.
///
/// The three snapshots are captured fresh per activation; the registry is a
/// snapshot of the stage's cross-element registrations at that moment.
#[derive(Debug, Clone)]
pub struct ActivationContext {
    /// The composition's target element.
    pub target: String,
    /// Measured extent of the target.
    pub measured: Size,
    /// Container geometry.
    pub parent: LayoutSnapshot,
    /// Target geometry captured just before this section.
    pub before_section: LayoutSnapshot,
    /// Target geometry captured before the whole animation.
    pub origin: LayoutSnapshot,
    pub registry: SnapshotRegistry,
    /// Section default timing.
    pub timing: Timing,
}

impl ActivationContext {
    /// Expression context over this activation's snapshots.
    pub fn eval(&self) -> EvalContext<'_> {
        EvalContext {
            measured: self.measured,
            parent_size: self.parent.size(),
            parent: Some(&self.parent),
            target: Some(&self.before_section),
            original: Some(&self.origin),
            registry: Some(&self.registry),
        }
    }
}

/// The rule contract.
///
/// Concrete kinds implement [`Rule::sample`] and [`Rule::build_task`]; the
/// prepare paths and reversal bookkeeping are shared default methods.
pub trait Rule: fmt::Debug {
    fn base(&self) -> &RuleBase;
    fn base_mut(&mut self) -> &mut RuleBase;

    /// Sample "start values" into scratch. Called only when a fresh sample
    /// is actually needed; the prepare paths own the reuse decision.
    fn sample(&mut self, stage: &Stage, target: &str);

    /// Build this rule's task from prepared scratch state. `None` for
    /// instantaneous, non-animated effects. The default leaf has no task.
    fn build_task(
        &mut self,
        stage: &mut Stage,
        ctx: &ActivationContext,
    ) -> Option<AnimationTask> {
        let _ = (stage, ctx);
        None
    }

    /// Normal prepare path. Resets the reverse marker to the configured
    /// value; when replaying in reverse with non-empty scratch, the scratch
    /// is reused rather than resampled.
    fn get_ready(&mut self, stage: &Stage, target: &str) {
        let reversed = self.base().start_reversed();
        let base = self.base_mut();
        base.set_reverse(reversed);
        base.set_phase(RulePhase::Prepared);
        if reversed && !base.scratch().is_empty() {
            return;
        }
        self.base_mut().scratch_mut().clear();
        self.sample(stage, target);
    }

    /// Keep-old-data prepare path used by the reversing decorator: run at
    /// the given direction, reusing scratch when present.
    fn get_ready_kept(&mut self, stage: &Stage, target: &str, reverse: bool) {
        let base = self.base_mut();
        base.set_reverse(reverse);
        base.set_phase(RulePhase::Prepared);
        if self.base().scratch().is_empty() {
            self.sample(stage, target);
        }
    }

    /// Fresh prepare path: forward direction, forced resample.
    fn get_ready_fresh(&mut self, stage: &Stage, target: &str) {
        let base = self.base_mut();
        base.set_reverse(false);
        base.set_phase(RulePhase::Prepared);
        base.scratch_mut().clear();
        self.sample(stage, target);
    }

    /// Create the task for this activation. The sequencer invokes this
    /// exactly once per rule per section activation.
    fn create_task(&mut self, stage: &mut Stage, ctx: &ActivationContext)
    -> Option<AnimationTask> {
        self.build_task(stage, ctx)
    }

    /// Delay the sequencer must honor before creating this section's tasks;
    /// `None` means no additional wait.
    fn wait_millis(&self) -> Option<u64> {
        self.base().wait_ms()
    }

    /// Running inside a reversed section or explicitly marked to start
    /// reversed.
    fn is_reverse(&self) -> bool {
        self.base().reverse()
    }

    fn mark_reverse(&mut self, reverse: bool) {
        self.base_mut().set_reverse(reverse);
    }

    /// Structural copy preserving configuration, scratch reset to empty.
    fn clone_rule(&self) -> Box<dyn Rule>;

    /// Lazily expand a composite rule into its cached child rules. Leaf
    /// rules return `None`; an empty vec is an empty, instantly-complete
    /// contribution.
    fn expand(&mut self, stage: &Stage, target: &str) -> Option<Vec<RuleHandle>> {
        let _ = (stage, target);
        None
    }

    /// Notification after the sequencer binds this rule's task.
    fn task_bound(&mut self, task: &AnimationTask) {
        let _ = task;
    }

    /// Advance rule-owned work (nested sequencers). Returns `true` while
    /// the rule still holds its step open.
    fn advance(&mut self, stage: &mut Stage, delta_ms: f64) -> bool {
        let _ = (stage, delta_ms);
        false
    }

    /// Playback control proxies for rule-owned work.
    fn on_pause(&mut self) {}
    fn on_resume(&mut self) {}
    fn on_cancel(&mut self) {}
}

/// Shared, interior-mutable handle to a rule.
///
/// Sections hold handles; wrapping a rule in a decorator shares the same
/// instance underneath, which is what lets keep-old-data reversal reuse the
/// scratch state the forward run recorded.
#[derive(Debug, Clone)]
pub struct RuleHandle(Rc<RefCell<Box<dyn Rule>>>);

impl RuleHandle {
    pub fn new(rule: impl Rule + 'static) -> Self {
        Self(Rc::new(RefCell::new(Box::new(rule))))
    }

    pub fn from_box(rule: Box<dyn Rule>) -> Self {
        Self(Rc::new(RefCell::new(rule)))
    }

    pub fn borrow(&self) -> Ref<'_, Box<dyn Rule>> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Box<dyn Rule>> {
        self.0.borrow_mut()
    }

    /// Deep copy with scratch reset; the new handle shares nothing with
    /// this one.
    pub fn clone_detached(&self) -> RuleHandle {
        Self::from_box(self.0.borrow().clone_rule())
    }

    /// Whether two handles share the same underlying rule instance.
    pub fn shares_instance(&self, other: &RuleHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
