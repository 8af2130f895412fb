//! Duty-changing rule decorators.
//!
//! One polymorphic decorator type carries every duty change — reversal,
//! debug checkpoints, skipping — as a tagged variant rather than a subclass
//! chain, which keeps composition order irrelevant. The wrapped rule is held
//! by handle: wrapping shares the underlying instance, so keep-old-data
//! reversal sees the scratch state the forward run recorded.

use crate::driver::AnimationTask;
use crate::rules::{ActivationContext, Rule, RuleBase, RuleHandle, RulePhase};
use crate::stage::Stage;

/// What the decorator changes about the wrapped rule's duty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duty {
    /// Play the wrapped rule backwards.
    ///
    /// `keep_sampled` selects between the two reversal modes: `true` replays
    /// the previous run backward from its already-computed values; `false`
    /// builds a new reverse animation from current live state.
    Reverse { keep_sampled: bool },
    /// Record structured snapshots before task creation and after binding,
    /// without altering timing, values, or control flow.
    Debug,
    /// Produce no task while preserving the rule's position in the ordered
    /// rule list.
    Skip,
}

/// A rule wrapping another rule with a changed duty.
#[derive(Debug)]
pub struct DecoratedRule {
    base: RuleBase,
    duty: Duty,
    inner: RuleHandle,
}

impl DecoratedRule {
    pub fn new(inner: RuleHandle, duty: Duty) -> Self {
        Self {
            base: RuleBase::new(),
            duty,
            inner,
        }
    }

    pub fn reverse(inner: RuleHandle, keep_sampled: bool) -> Self {
        Self::new(inner, Duty::Reverse { keep_sampled })
    }

    pub fn debug(inner: RuleHandle) -> Self {
        Self::new(inner, Duty::Debug)
    }

    pub fn skip(inner: RuleHandle) -> Self {
        Self::new(inner, Duty::Skip)
    }

    pub fn duty(&self) -> Duty {
        self.duty
    }

    pub fn inner(&self) -> &RuleHandle {
        &self.inner
    }

    pub fn into_handle(self) -> RuleHandle {
        RuleHandle::new(self)
    }
}

impl Rule for DecoratedRule {
    fn base(&self) -> &RuleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RuleBase {
        &mut self.base
    }

    fn sample(&mut self, _stage: &Stage, _target: &str) {}

    fn get_ready(&mut self, stage: &Stage, target: &str) {
        self.base.set_phase(RulePhase::Prepared);
        match self.duty {
            Duty::Reverse { keep_sampled: true } => {
                self.inner.borrow_mut().get_ready_kept(stage, target, true);
            }
            Duty::Reverse {
                keep_sampled: false,
            } => {
                self.inner.borrow_mut().get_ready_fresh(stage, target);
            }
            Duty::Debug => {
                self.inner.borrow_mut().get_ready(stage, target);
            }
            Duty::Skip => {
                self.base.set_phase(RulePhase::Skipped);
            }
        }
    }

    fn get_ready_kept(&mut self, stage: &Stage, target: &str, reverse: bool) {
        self.base.set_phase(RulePhase::Prepared);
        match self.duty {
            // Each reversal layer flips the direction once.
            Duty::Reverse { .. } => {
                self.inner
                    .borrow_mut()
                    .get_ready_kept(stage, target, !reverse);
            }
            Duty::Debug => {
                self.inner
                    .borrow_mut()
                    .get_ready_kept(stage, target, reverse);
            }
            Duty::Skip => {
                self.base.set_phase(RulePhase::Skipped);
            }
        }
    }

    fn get_ready_fresh(&mut self, stage: &Stage, target: &str) {
        self.base.set_phase(RulePhase::Prepared);
        match self.duty {
            Duty::Reverse { .. } | Duty::Debug => {
                self.inner.borrow_mut().get_ready_fresh(stage, target);
            }
            Duty::Skip => {
                self.base.set_phase(RulePhase::Skipped);
            }
        }
    }

    fn create_task(
        &mut self,
        stage: &mut Stage,
        ctx: &ActivationContext,
    ) -> Option<AnimationTask> {
        match self.duty {
            Duty::Skip => None,
            Duty::Debug => {
                {
                    let inner = self.inner.borrow();
                    tracing::debug!(
                        target: "cadence::rules",
                        rule = ?inner,
                        reverse = inner.is_reverse(),
                        wait_ms = ?inner.wait_millis(),
                        scratch = ?inner.base().scratch().values(),
                        "checkpoint: before task creation"
                    );
                }
                self.inner.borrow_mut().create_task(stage, ctx)
            }
            Duty::Reverse { keep_sampled } => {
                let task = self.inner.borrow_mut().create_task(stage, ctx);
                if keep_sampled {
                    // The wrapped rule ran its reverse-prepare path and built
                    // the undo task itself.
                    task
                } else {
                    // Fresh mode prepared forward; the task plays backwards.
                    task.map(AnimationTask::reversed)
                }
            }
        }
    }

    fn wait_millis(&self) -> Option<u64> {
        match self.duty {
            Duty::Skip => None,
            _ => self.inner.borrow().wait_millis(),
        }
    }

    fn is_reverse(&self) -> bool {
        match self.duty {
            Duty::Reverse { .. } => !self.inner.borrow().is_reverse(),
            _ => self.inner.borrow().is_reverse(),
        }
    }

    fn mark_reverse(&mut self, reverse: bool) {
        match self.duty {
            Duty::Reverse { .. } => self.inner.borrow_mut().mark_reverse(!reverse),
            _ => self.inner.borrow_mut().mark_reverse(reverse),
        }
    }

    fn clone_rule(&self) -> Box<dyn Rule> {
        Box::new(Self {
            base: self.base.cloned_config(),
            duty: self.duty,
            inner: self.inner.clone_detached(),
        })
    }

    fn expand(&mut self, stage: &Stage, target: &str) -> Option<Vec<RuleHandle>> {
        match self.duty {
            Duty::Skip => None,
            Duty::Debug => self.inner.borrow_mut().expand(stage, target),
            Duty::Reverse { keep_sampled } => {
                // Reversal distributes over composite children.
                self.inner.borrow_mut().expand(stage, target).map(|kids| {
                    kids.into_iter()
                        .map(|kid| RuleHandle::new(Self::reverse(kid, keep_sampled)))
                        .collect()
                })
            }
        }
    }

    fn task_bound(&mut self, task: &AnimationTask) {
        if self.duty == Duty::Debug {
            tracing::debug!(
                target: "cadence::rules",
                element = task.element(),
                keyframes = ?task.keyframes(),
                timing = ?task.timing(),
                "checkpoint: after binding"
            );
        }
        self.inner.borrow_mut().task_bound(task);
    }

    fn advance(&mut self, stage: &mut Stage, delta_ms: f64) -> bool {
        match self.duty {
            Duty::Skip => false,
            _ => self.inner.borrow_mut().advance(stage, delta_ms),
        }
    }

    fn on_pause(&mut self) {
        self.inner.borrow_mut().on_pause();
    }

    fn on_resume(&mut self) {
        self.inner.borrow_mut().on_resume();
    }

    fn on_cancel(&mut self) {
        self.inner.borrow_mut().on_cancel();
    }
}
