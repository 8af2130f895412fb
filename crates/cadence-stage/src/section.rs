//! Rule sections: sets of rules that start together.
//!
//! All rules of a section start at the same moment; each rule's own
//! delay/duration/easing governs its own timing, and there is no other
//! intra-section ordering. Sections are referenced by handle, never copied,
//! so they can be wrapped (reversed) any number of times without mutating
//! the original.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::driver::Timing;
use crate::rules::decorator::DecoratedRule;
use crate::rules::{Rule, RuleHandle};
use crate::stage::Stage;

/// Hook invoked when a section starts or ends.
pub type SectionHook = Rc<dyn Fn(&mut Stage)>;

/// The section contract the sequencer plays: a rule array with shared
/// timing and start/end hooks.
pub trait Section: fmt::Debug {
    /// Shared default timing for the section's rules.
    fn timing(&self) -> Timing;

    /// The rules to activate for the given playback. Called once per
    /// activation; decorating sections may rebuild their view here.
    fn rules(&mut self, playback: u64) -> Vec<RuleHandle>;

    /// Monotonic revision of the underlying rule list, for cache
    /// invalidation in wrapping sections.
    fn revision(&self) -> u64;

    fn fire_start(&mut self, stage: &mut Stage);
    fn fire_end(&mut self, stage: &mut Stage);

    /// Structural copy with independently-stateful rules.
    fn clone_section(&self) -> Box<dyn Section>;
}

/// Shared handle to a section.
#[derive(Debug, Clone)]
pub struct SectionHandle(Rc<RefCell<Box<dyn Section>>>);

impl SectionHandle {
    pub fn new(section: impl Section + 'static) -> Self {
        Self(Rc::new(RefCell::new(Box::new(section))))
    }

    pub fn borrow(&self) -> Ref<'_, Box<dyn Section>> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Box<dyn Section>> {
        self.0.borrow_mut()
    }

    /// Deep copy; the new handle shares no rule state with this one.
    pub fn clone_detached(&self) -> SectionHandle {
        Self(Rc::new(RefCell::new(self.0.borrow().clone_section())))
    }
}

/// An unordered set of rules with shared default timing and optional
/// start/end hooks.
#[derive(Default)]
pub struct RuleSection {
    name: Option<String>,
    rules: Vec<RuleHandle>,
    timing: Timing,
    on_start: Vec<SectionHook>,
    on_end: Vec<SectionHook>,
    revision: u64,
}

impl fmt::Debug for RuleSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleSection")
            .field("name", &self.name)
            .field("rules", &self.rules)
            .field("timing", &self.timing)
            .field("revision", &self.revision)
            .finish()
    }
}

impl RuleSection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn set_timing(&mut self, timing: Timing) {
        self.timing = timing;
    }

    /// Add a rule by value.
    pub fn with_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.add_rule(RuleHandle::new(rule));
        self
    }

    /// Add a rule handle.
    pub fn add_rule(&mut self, rule: RuleHandle) {
        self.rules.push(rule);
        self.revision += 1;
    }

    /// Register a start hook.
    pub fn on_start(mut self, hook: impl Fn(&mut Stage) + 'static) -> Self {
        self.on_start.push(Rc::new(hook));
        self
    }

    /// Register an end hook.
    pub fn on_end(mut self, hook: impl Fn(&mut Stage) + 'static) -> Self {
        self.on_end.push(Rc::new(hook));
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn into_handle(self) -> SectionHandle {
        SectionHandle::new(self)
    }
}

impl Section for RuleSection {
    fn timing(&self) -> Timing {
        self.timing
    }

    fn rules(&mut self, _playback: u64) -> Vec<RuleHandle> {
        self.rules.clone()
    }

    fn revision(&self) -> u64 {
        self.revision
    }

    fn fire_start(&mut self, stage: &mut Stage) {
        for hook in &self.on_start {
            hook(stage);
        }
    }

    fn fire_end(&mut self, stage: &mut Stage) {
        for hook in &self.on_end {
            hook(stage);
        }
    }

    fn clone_section(&self) -> Box<dyn Section> {
        Box::new(Self {
            name: self.name.clone(),
            rules: self.rules.iter().map(RuleHandle::clone_detached).collect(),
            timing: self.timing,
            on_start: self.on_start.clone(),
            on_end: self.on_end.clone(),
            revision: self.revision,
        })
    }
}

/// Section decorator playing the wrapped section's rules in reverse.
///
/// Every child rule is wrapped through the reversing rule decorator and the
/// resulting array is cached; the cache is rebuilt when the source section's
/// rule list changes or a new playback begins, so two independent playbacks
/// never share reversed rule wrappers. In keep-sampled mode the wrappers
/// still share the underlying rule instances — that is what an exact undo
/// requires — while fresh mode detaches them entirely.
#[derive(Debug)]
pub struct ReversedSection {
    source: SectionHandle,
    keep_sampled: bool,
    cache: Option<Vec<RuleHandle>>,
    cached_revision: u64,
    cached_playback: u64,
}

impl ReversedSection {
    pub fn new(source: SectionHandle, keep_sampled: bool) -> Self {
        Self {
            source,
            keep_sampled,
            cache: None,
            cached_revision: 0,
            cached_playback: 0,
        }
    }

    pub fn into_handle(self) -> SectionHandle {
        SectionHandle::new(self)
    }
}

impl Section for ReversedSection {
    fn timing(&self) -> Timing {
        self.source.borrow().timing()
    }

    fn rules(&mut self, playback: u64) -> Vec<RuleHandle> {
        let revision = self.source.borrow().revision();
        let stale = self.cache.is_none()
            || self.cached_revision != revision
            || self.cached_playback != playback;
        if stale {
            let children = self.source.borrow_mut().rules(playback);
            let reversed = children
                .into_iter()
                .map(|rule| {
                    let inner = if self.keep_sampled {
                        rule
                    } else {
                        rule.clone_detached()
                    };
                    RuleHandle::new(DecoratedRule::reverse(inner, self.keep_sampled))
                })
                .collect();
            self.cache = Some(reversed);
            self.cached_revision = revision;
            self.cached_playback = playback;
        }
        self.cache.clone().unwrap_or_default()
    }

    fn revision(&self) -> u64 {
        self.source.borrow().revision()
    }

    fn fire_start(&mut self, stage: &mut Stage) {
        self.source.borrow_mut().fire_start(stage);
    }

    fn fire_end(&mut self, stage: &mut Stage) {
        self.source.borrow_mut().fire_end(stage);
    }

    fn clone_section(&self) -> Box<dyn Section> {
        Box::new(Self {
            source: self.source.clone_detached(),
            keep_sampled: self.keep_sampled,
            cache: None,
            cached_revision: 0,
            cached_playback: 0,
        })
    }
}
