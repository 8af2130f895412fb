//! Concrete rule kinds: leaf tweens, instant effects, composite groups, and
//! nested sub-sequences.

use std::rc::Rc;

use crate::driver::{AnimationTask, Timing};
use crate::effects::{EffectRef, SetProperty};
use crate::expr::SizeExpr;
use crate::rules::{ActivationContext, Rule, RuleBase, RuleHandle};
use crate::sequencer::Sequencer;
use crate::snapshot::Gravity;
use crate::stage::Stage;

fn property_gravity(property: &str) -> Gravity {
    match property {
        "top" => Gravity::Top,
        "right" => Gravity::Right,
        "bottom" => Gravity::Bottom,
        _ => Gravity::Left,
    }
}

/// Leaf rule: animates one named property from its sampled current value to
/// a resolved expression.
///
/// The resolved (start, end) pair is recorded in scratch at task creation,
/// so a keep-old-data reverse replay rebuilds the exact undo task without
/// touching live geometry again.
#[derive(Debug)]
pub struct TweenRule {
    base: RuleBase,
    property: String,
    to: SizeExpr,
    gravity: Gravity,
    effect: EffectRef,
}

impl TweenRule {
    pub fn new(property: impl Into<String>, to: SizeExpr) -> Self {
        let property = property.into();
        let gravity = property_gravity(&property);
        let effect: EffectRef = Rc::new(SetProperty::new(&property));
        Self {
            base: RuleBase::new(),
            property,
            to,
            gravity,
            effect,
        }
    }

    /// Gravity used to resolve the target expression; defaults to the
    /// property's own edge when the property names one.
    pub fn with_gravity(mut self, gravity: Gravity) -> Self {
        self.gravity = gravity;
        self
    }

    /// Replace the effect the resolved values are applied through.
    pub fn with_effect(mut self, effect: EffectRef) -> Self {
        self.effect = effect;
        self
    }

    /// Animate a counterpart element instead of the composition target.
    pub fn with_element(mut self, element: impl Into<String>) -> Self {
        self.base.set_element(Some(element.into()));
        self
    }

    /// Override the section's default timing for this rule.
    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.base.set_timing(Some(timing));
        self
    }

    /// Delay the sequencer must honor before this section's tasks.
    pub fn with_wait(mut self, wait_ms: u64) -> Self {
        self.base.set_wait_ms(Some(wait_ms));
        self
    }

    /// Mark the rule to start reversed.
    pub fn with_start_reversed(mut self) -> Self {
        self.base.set_start_reversed(true);
        self
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    fn effective_element<'a>(&'a self, ctx_target: &'a str) -> &'a str {
        self.base.element().unwrap_or(ctx_target)
    }
}

impl Rule for TweenRule {
    fn base(&self) -> &RuleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RuleBase {
        &mut self.base
    }

    fn sample(&mut self, stage: &Stage, target: &str) {
        let element = self.base.element().unwrap_or(target);
        let current = stage
            .get(element)
            .and_then(|e| e.property(&self.property))
            .unwrap_or(0.0);
        self.base.scratch_mut().push(current);
    }

    fn build_task(&mut self, _stage: &mut Stage, ctx: &ActivationContext) -> Option<AnimationTask> {
        let element = self.effective_element(&ctx.target).to_string();

        let (start, end) = if self.base.scratch().len() >= 2 {
            // Resolved pair recorded by a prior run; reuse for an exact
            // replay.
            (
                self.base.scratch().get(0).unwrap_or(0.0),
                self.base.scratch().get(1).unwrap_or(0.0),
            )
        } else {
            let start = self.base.scratch().get(0).unwrap_or(0.0);
            let end = self.to.evaluate(&ctx.eval(), self.gravity);
            self.base.scratch_mut().replace(vec![start, end]);
            (start, end)
        };

        let timing = self.base.timing().unwrap_or(ctx.timing);
        let keyframes = if self.base.reverse() {
            vec![end, start]
        } else {
            vec![start, end]
        };
        Some(AnimationTask::new(
            element,
            self.effect.clone(),
            keyframes,
            timing,
        ))
    }

    fn clone_rule(&self) -> Box<dyn Rule> {
        Box::new(Self {
            base: self.base.cloned_config(),
            property: self.property.clone(),
            to: self.to.clone(),
            gravity: self.gravity,
            effect: self.effect.clone(),
        })
    }
}

/// Non-animated rule: applies one resolved value immediately at task
/// creation and never contributes a task. Its fixed delay, if any, is
/// reported through the section wait gate.
#[derive(Debug)]
pub struct InstantRule {
    base: RuleBase,
    property: String,
    value: SizeExpr,
    gravity: Gravity,
    effect: EffectRef,
}

impl InstantRule {
    pub fn new(property: impl Into<String>, value: SizeExpr) -> Self {
        let property = property.into();
        let gravity = property_gravity(&property);
        let effect: EffectRef = Rc::new(SetProperty::new(&property));
        Self {
            base: RuleBase::new(),
            property,
            value,
            gravity,
            effect,
        }
    }

    pub fn with_effect(mut self, effect: EffectRef) -> Self {
        self.effect = effect;
        self
    }

    pub fn with_element(mut self, element: impl Into<String>) -> Self {
        self.base.set_element(Some(element.into()));
        self
    }

    /// Fixed delay before the effect applies, honored by the wait gate.
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.base.set_wait_ms(Some(delay_ms));
        self
    }
}

impl Rule for InstantRule {
    fn base(&self) -> &RuleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RuleBase {
        &mut self.base
    }

    fn sample(&mut self, stage: &Stage, target: &str) {
        let element = self.base.element().unwrap_or(target);
        let current = stage
            .get(element)
            .and_then(|e| e.property(&self.property))
            .unwrap_or(0.0);
        self.base.scratch_mut().push(current);
    }

    fn build_task(&mut self, stage: &mut Stage, ctx: &ActivationContext) -> Option<AnimationTask> {
        let element = self
            .base
            .element()
            .unwrap_or(&ctx.target)
            .to_string();

        // A reverse replay restores the sampled prior value.
        let value = if self.base.reverse() && !self.base.scratch().is_empty() {
            self.base.scratch().get(0).unwrap_or(0.0)
        } else {
            self.value.evaluate(&ctx.eval(), self.gravity)
        };

        if let Err(err) = self.effect.apply(stage, &element, value) {
            log::warn!("instant effect failed for '{element}': {err}");
        }
        None
    }

    fn clone_rule(&self) -> Box<dyn Rule> {
        Box::new(Self {
            base: self.base.cloned_config(),
            property: self.property.clone(),
            value: self.value.clone(),
            gravity: self.gravity,
            effect: self.effect.clone(),
        })
    }
}

/// Composite rule: expands lazily into a cached array of child rules and
/// never produces a task of its own. Expanding to no children is an empty,
/// instantly-complete contribution.
#[derive(Debug, Default)]
pub struct GroupRule {
    base: RuleBase,
    rules: Vec<RuleHandle>,
    expanded: Option<Vec<RuleHandle>>,
}

impl GroupRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: Vec<RuleHandle>) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    pub fn with_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.rules.push(RuleHandle::new(rule));
        self
    }

    /// Drop the cached expansion; the next activation rebuilds it.
    pub fn invalidate(&mut self) {
        self.expanded = None;
    }
}

impl Rule for GroupRule {
    fn base(&self) -> &RuleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RuleBase {
        &mut self.base
    }

    fn sample(&mut self, _stage: &Stage, _target: &str) {}

    fn expand(&mut self, _stage: &Stage, _target: &str) -> Option<Vec<RuleHandle>> {
        let cache = self
            .expanded
            .get_or_insert_with(|| self.rules.clone());
        Some(cache.clone())
    }

    fn clone_rule(&self) -> Box<dyn Rule> {
        Box::new(Self {
            base: self.base.cloned_config(),
            rules: self.rules.iter().map(RuleHandle::clone_detached).collect(),
            expanded: None,
        })
    }
}

/// Rule owning an independent child sequencer.
///
/// The child's whole playback (including its requested repeats) holds this
/// rule's step open; pause/resume/cancel proxy through.
#[derive(Debug)]
pub struct SubSequenceRule {
    base: RuleBase,
    child: Sequencer,
}

impl SubSequenceRule {
    pub fn new(child: Sequencer) -> Self {
        Self {
            base: RuleBase::new(),
            child,
        }
    }

    pub fn child(&self) -> &Sequencer {
        &self.child
    }
}

impl Rule for SubSequenceRule {
    fn base(&self) -> &RuleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RuleBase {
        &mut self.base
    }

    fn sample(&mut self, _stage: &Stage, _target: &str) {}

    fn build_task(&mut self, stage: &mut Stage, _ctx: &ActivationContext) -> Option<AnimationTask> {
        if let Err(err) = self.child.start(stage) {
            log::warn!("sub-sequence failed to start: {err}");
        }
        None
    }

    fn advance(&mut self, stage: &mut Stage, delta_ms: f64) -> bool {
        self.child.tick(stage, delta_ms);
        self.child.is_active()
    }

    fn on_pause(&mut self) {
        self.child.pause();
    }

    fn on_resume(&mut self) {
        self.child.resume();
    }

    fn on_cancel(&mut self) {
        self.child.cancel();
    }

    fn clone_rule(&self) -> Box<dyn Rule> {
        Box::new(Self {
            base: self.base.cloned_config(),
            child: self.child.cloned_config(),
        })
    }
}
