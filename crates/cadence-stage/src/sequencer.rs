//! The section sequencer: ordered playback of rule sections.
//!
//! One sequencer plays one composition against one target element. The
//! embedder drives it cooperatively: [`Sequencer::start`] activates the
//! first section and every [`Sequencer::tick`] advances the active step by
//! the elapsed wall time. Pause, resume and cancel are cooperative signals
//! honored at tick boundaries.
//!
//! States: Idle → Running → {Paused ⇄ Running} → Ended | Cancelled.

use std::fmt;

use crate::driver::{AnimationDriver, CompositeStep, TickDriver};
use crate::error::{Result, StageError};
use crate::events::{EventQueue, PlaybackEvent, SequencerListener};
use crate::rules::{ActivationContext, Rule, RuleHandle, RulePhase};
use crate::section::{ReversedSection, Section, SectionHandle};
use crate::snapshot::LayoutSnapshot;
use crate::stage::Stage;
use cadence_core::Rect;

/// Lifecycle state of a sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequencerState {
    #[default]
    Idle,
    Running,
    Paused,
    Ended,
    Cancelled,
}

/// How many whole-composition passes to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatCount {
    Times(u32),
    Infinite,
}

impl Default for RepeatCount {
    fn default() -> Self {
        Self::Times(1)
    }
}

impl RepeatCount {
    /// Whether another pass should play after `completed` finished passes.
    pub fn should_continue(&self, completed: u32) -> bool {
        match self {
            Self::Infinite => true,
            Self::Times(count) => completed < *count,
        }
    }
}

/// What a repeated pass plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatMode {
    /// Every pass replays the composition from the top.
    #[default]
    Restart,
    /// Odd passes play the reversed composition, undoing the forward pass
    /// from its recorded values.
    Reverse,
}

/// Whole-composition repeat configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RepeatSpec {
    pub count: RepeatCount,
    pub mode: RepeatMode,
}

impl RepeatSpec {
    pub fn times(count: u32) -> Self {
        Self {
            count: RepeatCount::Times(count),
            mode: RepeatMode::Restart,
        }
    }

    pub fn with_mode(mut self, mode: RepeatMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Runtime state of the currently active section.
struct ActiveSection {
    section: SectionHandle,
    rules: Vec<RuleHandle>,
    ctx: ActivationContext,
}

/// Orchestrates ordered playback of rule sections against one element.
pub struct Sequencer {
    target: String,
    sections: Vec<SectionHandle>,
    /// Reversed view of the composition, built lazily for reverse-alternate
    /// passes.
    reversed: Option<Vec<SectionHandle>>,
    repeat: RepeatSpec,
    state: SequencerState,
    cursor: usize,
    /// Completed whole-composition passes in the current playback.
    pass: u32,
    /// Monotonic playback counter; stamps per-playback caches.
    playback: u64,
    /// Target geometry captured once at playback start.
    origin: LayoutSnapshot,
    /// Pending wait gate before the active section's tasks are created.
    wait_remaining: Option<f64>,
    active: Option<ActiveSection>,
    driver: Box<dyn AnimationDriver>,
    listeners: Vec<Box<dyn SequencerListener>>,
    events: EventQueue,
}

impl fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequencer")
            .field("target", &self.target)
            .field("sections", &self.sections.len())
            .field("repeat", &self.repeat)
            .field("state", &self.state)
            .field("cursor", &self.cursor)
            .field("pass", &self.pass)
            .finish()
    }
}

impl Sequencer {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            sections: Vec::new(),
            reversed: None,
            repeat: RepeatSpec::default(),
            state: SequencerState::Idle,
            cursor: 0,
            pass: 0,
            playback: 0,
            origin: LayoutSnapshot::from_rect(Rect::ZERO),
            wait_remaining: None,
            active: None,
            driver: Box::new(TickDriver::new()),
            listeners: Vec::new(),
            events: EventQueue::new(),
        }
    }

    /// Replace the driver the composite steps are bound to.
    pub fn with_driver(mut self, driver: Box<dyn AnimationDriver>) -> Self {
        self.driver = driver;
        self
    }

    pub fn with_section(mut self, section: SectionHandle) -> Self {
        self.push_section(section);
        self
    }

    pub fn push_section(&mut self, section: SectionHandle) {
        self.sections.push(section);
        self.reversed = None;
    }

    pub fn with_repeat(mut self, repeat: RepeatSpec) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn set_repeat(&mut self, repeat: RepeatSpec) {
        self.repeat = repeat;
    }

    pub fn add_listener(&mut self, listener: Box<dyn SequencerListener>) {
        self.listeners.push(listener);
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    /// Index of the active (or next) section.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SequencerState::Running | SequencerState::Paused)
    }

    pub fn is_finished(&self) -> bool {
        self.state == SequencerState::Ended
    }

    /// Drain all pending playback events.
    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        self.events.drain().collect()
    }

    /// Start a new playback.
    ///
    /// A sequencer must reach a terminal or idle state before it can be
    /// started again; restarting from inside a callback of the same
    /// playback is a re-entrancy hazard and is rejected.
    pub fn start(&mut self, stage: &mut Stage) -> Result<()> {
        if self.is_active() {
            return Err(StageError::AlreadyRunning);
        }
        if self.sections.is_empty() {
            return Err(StageError::EmptyComposition);
        }

        self.playback += 1;
        self.pass = 0;
        self.cursor = 0;
        self.state = SequencerState::Running;
        self.wait_remaining = None;
        self.origin = stage
            .capture(&self.target)
            .unwrap_or_else(|| LayoutSnapshot::from_rect(Rect::ZERO));

        tracing::debug!(target: "cadence::sequencer", element = %self.target, "playback started");
        self.emit(PlaybackEvent::Started {
            target: self.target.clone(),
        });
        self.activate(stage, 0);
        Ok(())
    }

    /// Advance the playback by the elapsed wall time.
    pub fn tick(&mut self, stage: &mut Stage, delta_ms: f64) {
        if self.state != SequencerState::Running {
            return;
        }

        // A pending wait gate consumes time first; tasks are created only
        // once the longest requested wait has fully elapsed.
        let mut delta_ms = delta_ms;
        if let Some(remaining) = self.wait_remaining {
            if delta_ms < remaining {
                self.wait_remaining = Some(remaining - delta_ms);
                return;
            }
            delta_ms -= remaining;
            self.wait_remaining = None;
            self.bind_tasks(stage);
        }

        self.driver.advance(stage, delta_ms);

        let mut any_busy = false;
        if let Some(active) = &self.active {
            let rules = active.rules.clone();
            for rule in &rules {
                if rule.borrow_mut().advance(stage, delta_ms) {
                    any_busy = true;
                }
            }
        }

        if self.driver.is_complete() && !any_busy {
            self.complete_section(stage);
        }
    }

    /// Pause playback at the next tick boundary.
    pub fn pause(&mut self) {
        if self.state != SequencerState::Running {
            return;
        }
        self.state = SequencerState::Paused;
        self.driver.pause();
        self.for_each_active_rule(|rule| rule.borrow_mut().on_pause());
        self.emit(PlaybackEvent::Paused {
            target: self.target.clone(),
        });
    }

    /// Resume a paused playback.
    pub fn resume(&mut self) {
        if self.state != SequencerState::Paused {
            return;
        }
        self.state = SequencerState::Running;
        self.driver.resume();
        self.for_each_active_rule(|rule| rule.borrow_mut().on_resume());
        self.emit(PlaybackEvent::Resumed {
            target: self.target.clone(),
        });
    }

    /// Cancel the playback: every bound task ends immediately and no
    /// further section start hooks fire.
    pub fn cancel(&mut self) {
        if !self.is_active() {
            return;
        }
        self.state = SequencerState::Cancelled;
        self.wait_remaining = None;
        self.driver.cancel();
        self.driver.unbind();
        self.for_each_active_rule(|rule| rule.borrow_mut().on_cancel());
        self.active = None;
        tracing::debug!(target: "cadence::sequencer", element = %self.target, "playback cancelled");
        self.emit(PlaybackEvent::Cancelled {
            target: self.target.clone(),
        });
    }

    /// Current play time of the active step, adjusted by the step's own
    /// start delay.
    pub fn play_time(&self) -> f64 {
        self.driver.play_time()
    }

    /// Scrub the active step.
    pub fn set_play_time(&mut self, ms: f64) {
        self.driver.set_play_time(ms);
    }

    /// Structural copy for independent playback reuse: sections are deep
    /// copies, runtime state is reset, and the copy gets a fresh tick
    /// driver.
    pub fn cloned_config(&self) -> Sequencer {
        let mut copy = Sequencer::new(self.target.clone());
        copy.sections = self
            .sections
            .iter()
            .map(SectionHandle::clone_detached)
            .collect();
        copy.repeat = self.repeat;
        copy
    }

    fn emit(&mut self, event: PlaybackEvent) {
        for listener in &mut self.listeners {
            listener.notify(&event);
        }
        self.events.push(event);
    }

    fn for_each_active_rule(&self, mut f: impl FnMut(&RuleHandle)) {
        if let Some(active) = &self.active {
            for rule in &active.rules {
                f(rule);
            }
        }
    }

    /// The section list the current pass plays.
    fn playing_sections(&mut self) -> Vec<SectionHandle> {
        let reversed_pass = self.repeat.mode == RepeatMode::Reverse && self.pass % 2 == 1;
        if reversed_pass {
            if self.reversed.is_none() {
                self.reversed = Some(
                    self.sections
                        .iter()
                        .rev()
                        .map(|section| {
                            ReversedSection::new(section.clone(), true).into_handle()
                        })
                        .collect(),
                );
            }
            self.reversed.clone().unwrap_or_default()
        } else {
            self.sections.clone()
        }
    }

    /// Activate one section: fire its start hook, prepare every rule, and
    /// either open the wait gate or bind the tasks right away.
    fn activate(&mut self, stage: &mut Stage, index: usize) {
        let section = self.playing_sections()[index].clone();
        section.borrow_mut().fire_start(stage);
        self.emit(PlaybackEvent::SectionChanged {
            target: self.target.clone(),
            section: index,
        });

        let timing = section.borrow().timing();
        let ctx = ActivationContext {
            target: self.target.clone(),
            measured: stage.measured(&self.target),
            parent: stage.capture_parent(&self.target),
            before_section: stage
                .capture(&self.target)
                .unwrap_or_else(|| LayoutSnapshot::from_rect(Rect::ZERO)),
            origin: self.origin.clone(),
            registry: stage.snapshots().clone(),
            timing,
        };

        let handles = section.borrow_mut().rules(self.playback);
        let mut rules = Vec::new();
        Self::prepare_rules(stage, &self.target, &handles, &mut rules);

        // The section holds for the longest wait any rule requests; rules
        // reporting none don't contribute.
        let wait = rules
            .iter()
            .filter_map(|rule| rule.borrow().wait_millis())
            .max();

        self.active = Some(ActiveSection {
            section,
            rules,
            ctx,
        });

        match wait {
            Some(ms) if ms > 0 => {
                tracing::debug!(
                    target: "cadence::sequencer",
                    section = index,
                    wait_ms = ms,
                    "holding section for wait gate"
                );
                self.wait_remaining = Some(ms as f64);
            }
            _ => {
                self.wait_remaining = None;
                self.bind_tasks(stage);
            }
        }
    }

    /// Prepare rules in list order, expanding composites as they appear.
    fn prepare_rules(
        stage: &mut Stage,
        target: &str,
        handles: &[RuleHandle],
        out: &mut Vec<RuleHandle>,
    ) {
        for handle in handles {
            handle.borrow_mut().get_ready(stage, target);
            out.push(handle.clone());
            let expanded = handle.borrow_mut().expand(stage, target);
            if let Some(children) = expanded {
                Self::prepare_rules(stage, target, &children, out);
            }
        }
    }

    /// Create one task per rule and bind them as a single composite step.
    fn bind_tasks(&mut self, stage: &mut Stage) {
        let Some(active) = self.active.as_mut() else {
            return;
        };

        let mut tasks = Vec::new();
        let mut bound = Vec::new();
        for (rule_index, rule) in active.rules.iter().enumerate() {
            let produced = rule.borrow_mut().create_task(stage, &active.ctx);
            match produced {
                Some(task) => {
                    bound.push((rule_index, tasks.len()));
                    tasks.push(task);
                    rule.borrow_mut().base_mut().set_phase(RulePhase::Animating);
                }
                None => {
                    rule.borrow_mut().base_mut().set_phase(RulePhase::Skipped);
                }
            }
        }

        self.driver
            .bind(CompositeStep::new(tasks, active.ctx.timing.delay_ms));

        if let Some(step) = self.driver.step() {
            for (rule_index, task_index) in bound {
                active.rules[rule_index]
                    .borrow_mut()
                    .task_bound(&step.tasks()[task_index]);
            }
        }
    }

    /// Finish the active section: end hook, cursor advance, next section's
    /// start hook, in that order.
    fn complete_section(&mut self, stage: &mut Stage) {
        self.driver.unbind();

        if let Some(active) = self.active.take() {
            for rule in &active.rules {
                let mut rule = rule.borrow_mut();
                if rule.base().phase() == RulePhase::Animating {
                    rule.base_mut().set_phase(RulePhase::Ended);
                }
            }
            active.section.borrow_mut().fire_end(stage);
        }

        self.cursor += 1;
        if self.cursor < self.sections.len() {
            let index = self.cursor;
            self.activate(stage, index);
            return;
        }

        // Pass complete.
        self.pass += 1;
        if self.repeat.count.should_continue(self.pass) {
            self.emit(PlaybackEvent::Repeated {
                target: self.target.clone(),
                pass: self.pass - 1,
            });
            self.cursor = 0;
            self.activate(stage, 0);
            return;
        }

        self.state = SequencerState::Ended;
        tracing::debug!(target: "cadence::sequencer", element = %self.target, "playback ended");
        self.emit(PlaybackEvent::Ended {
            target: self.target.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Timing;
    use crate::easing::Easing;
    use crate::expr::{SizeConstant, SizeExpr};
    use crate::rules::kinds::{SubSequenceRule, TweenRule};
    use crate::section::RuleSection;
    use crate::stage::StageElement;
    use cadence_core::{Rect, Size};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn sample_stage() -> Stage {
        let mut stage = Stage::new();
        stage
            .insert(
                StageElement::new("root")
                    .with_measured(Size::new(400.0, 300.0))
                    .with_frame(Rect::from_edges(0.0, 0.0, 400.0, 300.0)),
                None,
            )
            .unwrap();
        stage
            .insert(
                StageElement::new("card")
                    .with_measured(Size::new(100.0, 60.0))
                    .with_frame(Rect::from_edges(20.0, 20.0, 120.0, 80.0))
                    .with_property("opacity", 1.0),
                Some("root"),
            )
            .unwrap();
        stage
    }

    fn linear(duration: f64) -> Timing {
        Timing::new(duration).with_easing(Easing::Linear)
    }

    fn tween_section(property: &str, to: f64, duration: f64) -> SectionHandle {
        RuleSection::new()
            .with_timing(linear(duration))
            .with_rule(TweenRule::new(property, SizeExpr::of(to)))
            .into_handle()
    }

    fn run_to_end(seq: &mut Sequencer, stage: &mut Stage, step_ms: f64, max_ticks: usize) {
        for _ in 0..max_ticks {
            if !seq.is_active() {
                break;
            }
            seq.tick(stage, step_ms);
        }
    }

    #[test]
    fn test_single_section_playback() {
        let mut stage = sample_stage();
        let mut seq = Sequencer::new("card").with_section(tween_section("left", 220.0, 100.0));

        seq.start(&mut stage).unwrap();
        assert_eq!(seq.state(), SequencerState::Running);

        seq.tick(&mut stage, 50.0);
        let mid = stage.get("card").unwrap().frame().left;
        assert!((mid - 120.0).abs() < 1e-6, "halfway: {mid}");

        seq.tick(&mut stage, 50.0);
        seq.tick(&mut stage, 1.0);
        assert_eq!(seq.state(), SequencerState::Ended);
        assert_eq!(stage.get("card").unwrap().frame().left, 220.0);
    }

    #[test]
    fn test_sections_advance_in_order() {
        let mut stage = sample_stage();
        let order = Rc::new(RefCell::new(Vec::new()));
        let (o1, o2, e1, e2) = (order.clone(), order.clone(), order.clone(), order.clone());

        let first = RuleSection::new()
            .with_timing(linear(0.0))
            .with_rule(TweenRule::new("left", SizeExpr::of(50.0)))
            .on_start(move |_| o1.borrow_mut().push("start:0"))
            .on_end(move |_| e1.borrow_mut().push("end:0"))
            .into_handle();
        let second = RuleSection::new()
            .with_timing(linear(0.0))
            .with_rule(TweenRule::new("top", SizeExpr::of(10.0)))
            .on_start(move |_| o2.borrow_mut().push("start:1"))
            .on_end(move |_| e2.borrow_mut().push("end:1"))
            .into_handle();

        let mut seq = Sequencer::new("card")
            .with_section(first)
            .with_section(second);
        seq.start(&mut stage).unwrap();
        run_to_end(&mut seq, &mut stage, 1.0, 10);

        assert_eq!(seq.state(), SequencerState::Ended);
        assert_eq!(
            *order.borrow(),
            ["start:0", "end:0", "start:1", "end:1"],
            "hooks fire in section order"
        );
    }

    #[test]
    fn test_zero_duration_sections_fire_all_hooks() {
        let mut stage = sample_stage();
        let starts = Rc::new(RefCell::new(0));
        let ends = Rc::new(RefCell::new(0));

        let mut seq = Sequencer::new("card");
        for _ in 0..5 {
            let (s, e) = (starts.clone(), ends.clone());
            seq.push_section(
                RuleSection::new()
                    .with_timing(linear(0.0))
                    .with_rule(TweenRule::new("left", SizeExpr::of(30.0)))
                    .on_start(move |_| *s.borrow_mut() += 1)
                    .on_end(move |_| *e.borrow_mut() += 1)
                    .into_handle(),
            );
        }

        seq.start(&mut stage).unwrap();
        run_to_end(&mut seq, &mut stage, 1.0, 20);

        assert_eq!(seq.state(), SequencerState::Ended);
        assert_eq!(*starts.borrow(), 5);
        assert_eq!(*ends.borrow(), 5);
    }

    #[test]
    fn test_wait_gate_uses_max_not_sum() {
        let mut stage = sample_stage();
        let section = RuleSection::new()
            .with_timing(linear(100.0))
            .with_rule(TweenRule::new("left", SizeExpr::of(220.0)).with_wait(500))
            .with_rule(TweenRule::new("top", SizeExpr::of(120.0)))
            .into_handle();
        let mut seq = Sequencer::new("card").with_section(section);
        seq.start(&mut stage).unwrap();

        // 499ms in, still gated: no task has moved anything.
        seq.tick(&mut stage, 499.0);
        assert_eq!(stage.get("card").unwrap().frame().left, 20.0);

        // Crossing 500ms creates the tasks; the 100ms overflow advances
        // them.
        seq.tick(&mut stage, 101.0);
        assert_eq!(stage.get("card").unwrap().frame().left, 220.0);
        assert_eq!(stage.get("card").unwrap().frame().top, 120.0);
    }

    #[test]
    fn test_cancel_suppresses_later_start_hooks() {
        let mut stage = sample_stage();
        let later_started = Rc::new(RefCell::new(false));
        let flag = later_started.clone();

        let mut seq = Sequencer::new("card")
            .with_section(tween_section("left", 220.0, 100.0))
            .with_section(
                RuleSection::new()
                    .with_rule(TweenRule::new("top", SizeExpr::of(10.0)))
                    .on_start(move |_| *flag.borrow_mut() = true)
                    .into_handle(),
            );

        seq.start(&mut stage).unwrap();
        seq.tick(&mut stage, 30.0);
        seq.cancel();

        assert_eq!(seq.state(), SequencerState::Cancelled);
        run_to_end(&mut seq, &mut stage, 50.0, 10);
        assert!(!*later_started.borrow());

        let events = seq.drain_events();
        assert!(events.iter().any(|e| matches!(e, PlaybackEvent::Cancelled { .. })));
        assert!(!events.iter().any(|e| matches!(
            e,
            PlaybackEvent::SectionChanged { section: 1, .. }
        )));
    }

    #[test]
    fn test_cancel_during_wait_gate_is_terminal() {
        let mut stage = sample_stage();
        let section = RuleSection::new()
            .with_rule(TweenRule::new("left", SizeExpr::of(220.0)).with_wait(1000))
            .into_handle();
        let mut seq = Sequencer::new("card").with_section(section);
        seq.start(&mut stage).unwrap();

        seq.tick(&mut stage, 100.0);
        seq.cancel();
        assert_eq!(seq.state(), SequencerState::Cancelled);

        // Nothing dangles: further ticks are no-ops and no task ever binds.
        seq.tick(&mut stage, 5000.0);
        assert_eq!(stage.get("card").unwrap().frame().left, 20.0);
    }

    #[test]
    fn test_pause_freezes_wait_gate_and_tasks() {
        let mut stage = sample_stage();
        let section = RuleSection::new()
            .with_timing(linear(100.0))
            .with_rule(TweenRule::new("left", SizeExpr::of(220.0)).with_wait(200))
            .into_handle();
        let mut seq = Sequencer::new("card").with_section(section);
        seq.start(&mut stage).unwrap();

        seq.tick(&mut stage, 100.0);
        seq.pause();
        assert_eq!(seq.state(), SequencerState::Paused);

        // Paused time does not drain the gate.
        seq.tick(&mut stage, 10_000.0);
        assert_eq!(stage.get("card").unwrap().frame().left, 20.0);

        seq.resume();
        seq.tick(&mut stage, 100.0);
        seq.tick(&mut stage, 100.0);
        seq.tick(&mut stage, 1.0);
        assert_eq!(stage.get("card").unwrap().frame().left, 220.0);
    }

    #[test]
    fn test_repeat_restart() {
        let mut stage = sample_stage();
        let mut seq = Sequencer::new("card")
            .with_section(tween_section("left", 220.0, 100.0))
            .with_repeat(RepeatSpec::times(2));
        seq.start(&mut stage).unwrap();

        run_to_end(&mut seq, &mut stage, 50.0, 30);
        assert_eq!(seq.state(), SequencerState::Ended);

        let events = seq.drain_events();
        let repeats = events
            .iter()
            .filter(|e| matches!(e, PlaybackEvent::Repeated { .. }))
            .count();
        assert_eq!(repeats, 1);
        assert_eq!(stage.get("card").unwrap().frame().left, 220.0);
    }

    #[test]
    fn test_repeat_reverse_returns_to_origin() {
        let mut stage = sample_stage();
        let mut seq = Sequencer::new("card")
            .with_section(tween_section("left", 220.0, 100.0))
            .with_repeat(RepeatSpec::times(2).with_mode(RepeatMode::Reverse));
        seq.start(&mut stage).unwrap();

        run_to_end(&mut seq, &mut stage, 25.0, 40);
        assert_eq!(seq.state(), SequencerState::Ended);

        // The reverse pass undid the forward pass from its recorded values.
        assert_eq!(stage.get("card").unwrap().frame().left, 20.0);
    }

    #[test]
    fn test_restart_after_end() {
        let mut stage = sample_stage();
        let mut seq = Sequencer::new("card").with_section(tween_section("left", 220.0, 50.0));

        seq.start(&mut stage).unwrap();
        assert!(matches!(
            seq.start(&mut stage),
            Err(StageError::AlreadyRunning)
        ));

        run_to_end(&mut seq, &mut stage, 25.0, 10);
        assert_eq!(seq.state(), SequencerState::Ended);

        // A finished sequencer can start a fresh playback.
        seq.start(&mut stage).unwrap();
        assert_eq!(seq.state(), SequencerState::Running);
    }

    #[test]
    fn test_empty_composition_rejected() {
        let mut stage = sample_stage();
        let mut seq = Sequencer::new("card");
        assert!(matches!(
            seq.start(&mut stage),
            Err(StageError::EmptyComposition)
        ));
    }

    #[test]
    fn test_scrub_delegates_to_step() {
        let mut stage = sample_stage();
        let section = RuleSection::new()
            .with_timing(linear(100.0).with_delay(40.0))
            .with_rule(TweenRule::new("left", SizeExpr::of(220.0)))
            .into_handle();
        let mut seq = Sequencer::new("card").with_section(section);
        seq.start(&mut stage).unwrap();

        seq.set_play_time(50.0);
        assert!((seq.play_time() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_event_order_for_full_playback() {
        let mut stage = sample_stage();
        let mut seq = Sequencer::new("card")
            .with_section(tween_section("left", 220.0, 0.0))
            .with_section(tween_section("top", 120.0, 0.0));
        seq.start(&mut stage).unwrap();
        run_to_end(&mut seq, &mut stage, 1.0, 10);

        let kinds: Vec<&str> = seq
            .drain_events()
            .iter()
            .map(|e| match e {
                PlaybackEvent::Started { .. } => "started",
                PlaybackEvent::SectionChanged { .. } => "section",
                PlaybackEvent::Ended { .. } => "ended",
                PlaybackEvent::Cancelled { .. } => "cancelled",
                PlaybackEvent::Paused { .. } => "paused",
                PlaybackEvent::Resumed { .. } => "resumed",
                PlaybackEvent::Repeated { .. } => "repeated",
            })
            .collect();
        assert_eq!(kinds, ["started", "section", "section", "ended"]);
    }

    #[test]
    fn test_listener_notifications() {
        #[derive(Default)]
        struct Counter {
            starts: u32,
            sections: u32,
            ends: u32,
        }
        let counter = Rc::new(RefCell::new(Counter::default()));

        struct Fwd(Rc<RefCell<Counter>>);
        impl SequencerListener for Fwd {
            fn on_start(&mut self, _: &str) {
                self.0.borrow_mut().starts += 1;
            }
            fn on_section_changed(&mut self, _: &str, _: usize) {
                self.0.borrow_mut().sections += 1;
            }
            fn on_end(&mut self, _: &str) {
                self.0.borrow_mut().ends += 1;
            }
        }

        let mut stage = sample_stage();
        let mut seq = Sequencer::new("card").with_section(tween_section("left", 220.0, 0.0));
        seq.add_listener(Box::new(Fwd(counter.clone())));
        seq.start(&mut stage).unwrap();
        run_to_end(&mut seq, &mut stage, 1.0, 10);

        let c = counter.borrow();
        assert_eq!((c.starts, c.sections, c.ends), (1, 1, 1));
    }

    #[test]
    fn test_nested_sub_sequencer_holds_step_open() {
        let mut stage = sample_stage();

        let child = Sequencer::new("card").with_section(tween_section("opacity", 0.0, 200.0));

        let parent_section = RuleSection::new()
            .with_timing(linear(50.0))
            .with_rule(TweenRule::new("left", SizeExpr::of(220.0)))
            .with_rule(SubSequenceRule::new(child))
            .into_handle();

        let mut seq = Sequencer::new("card").with_section(parent_section);
        seq.start(&mut stage).unwrap();

        // Parent tween is done at 50ms, but the child still runs: the step
        // stays open until the child playback ends.
        seq.tick(&mut stage, 60.0);
        assert!(seq.is_active());

        run_to_end(&mut seq, &mut stage, 50.0, 20);
        assert_eq!(seq.state(), SequencerState::Ended);
        assert_eq!(stage.get("card").unwrap().property("opacity"), Some(0.0));
    }

    #[test]
    fn test_parent_width_expression_resolves_at_activation() {
        let mut stage = sample_stage();
        let section = RuleSection::new()
            .with_timing(linear(100.0))
            .with_rule(TweenRule::new(
                "left",
                SizeExpr::of(SizeConstant::ParentWidth).div(2.0),
            ))
            .into_handle();
        let mut seq = Sequencer::new("card").with_section(section);
        seq.start(&mut stage).unwrap();
        run_to_end(&mut seq, &mut stage, 50.0, 10);

        // parent width 400 / 2 = 200
        assert_eq!(stage.get("card").unwrap().frame().left, 200.0);
    }

    #[test]
    fn test_cloned_config_is_independent() {
        let mut stage = sample_stage();
        let mut seq = Sequencer::new("card").with_section(tween_section("left", 220.0, 100.0));
        let mut copy = seq.cloned_config();

        seq.start(&mut stage).unwrap();
        run_to_end(&mut seq, &mut stage, 50.0, 10);
        assert_eq!(seq.state(), SequencerState::Ended);

        // The copy starts from idle with untouched rules.
        assert_eq!(copy.state(), SequencerState::Idle);
        copy.start(&mut stage).unwrap();
        assert_eq!(copy.state(), SequencerState::Running);
    }
}
