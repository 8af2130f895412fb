//! Declarative composition specs.
//!
//! These are serialization-focused types that get converted to runtime
//! compositions: a `CompositionSpec` describes sections, rules, and repeat
//! behavior as data, and [`CompositionSpec::build`] turns it into a live
//! [`Sequencer`] by resolving effect names through an injected
//! [`EffectRegistry`].

use serde::{Deserialize, Serialize};

use crate::driver::Timing;
use crate::easing::Easing;
use crate::effects::EffectRegistry;
use crate::error::{Result, StageError};
use crate::expr::SizeExpr;
use crate::rules::decorator::DecoratedRule;
use crate::rules::kinds::{GroupRule, InstantRule, TweenRule};
use crate::rules::RuleHandle;
use crate::section::{RuleSection, SectionHandle};
use crate::sequencer::{RepeatCount, RepeatMode, RepeatSpec, Sequencer};
use crate::snapshot::Gravity;

/// Timing overrides; unspecified fields fall back to the ambient defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingSpec {
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<f64>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub easing: Option<Easing>,
}

impl TimingSpec {
    /// Whether any field is set.
    pub fn is_empty(&self) -> bool {
        self.duration_ms.is_none() && self.delay_ms.is_none() && self.easing.is_none()
    }

    /// Resolve against ambient defaults.
    pub fn resolve(&self, defaults: Timing) -> Timing {
        Timing {
            duration_ms: self.duration_ms.unwrap_or(defaults.duration_ms),
            delay_ms: self.delay_ms.unwrap_or(defaults.delay_ms),
            easing: self.easing.unwrap_or(defaults.easing),
        }
    }
}

/// One rule, as data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleSpec {
    /// Animate a named property to a resolved expression.
    Tween {
        property: String,
        to: SizeExpr,
        #[serde(default)]
        #[serde(skip_serializing_if = "Option::is_none")]
        gravity: Option<Gravity>,
        /// Effect registry name; defaults to setting the named property.
        #[serde(default)]
        #[serde(skip_serializing_if = "Option::is_none")]
        effect: Option<String>,
        #[serde(default)]
        #[serde(skip_serializing_if = "Option::is_none")]
        element: Option<String>,
        #[serde(default)]
        #[serde(skip_serializing_if = "TimingSpec::is_empty")]
        timing: TimingSpec,
        #[serde(default)]
        #[serde(skip_serializing_if = "Option::is_none")]
        wait_ms: Option<u64>,
    },
    /// Apply a value immediately, without a task.
    Instant {
        property: String,
        value: SizeExpr,
        #[serde(default)]
        #[serde(skip_serializing_if = "Option::is_none")]
        effect: Option<String>,
        #[serde(default)]
        #[serde(skip_serializing_if = "Option::is_none")]
        element: Option<String>,
        #[serde(default)]
        #[serde(skip_serializing_if = "Option::is_none")]
        delay_ms: Option<u64>,
    },
    /// A composite of child rules.
    Group { rules: Vec<RuleSpec> },
    /// Play the wrapped rule backwards.
    Reverse {
        rule: Box<RuleSpec>,
        #[serde(default)]
        keep_sampled: bool,
    },
    /// Record debug checkpoints around the wrapped rule.
    Debug { rule: Box<RuleSpec> },
    /// Keep the wrapped rule's position but produce nothing.
    Skip { rule: Box<RuleSpec> },
}

impl RuleSpec {
    /// Build the runtime rule, resolving effect names through the registry.
    pub fn build(&self, effects: &EffectRegistry, defaults: Timing) -> Result<RuleHandle> {
        match self {
            Self::Tween {
                property,
                to,
                gravity,
                effect,
                element,
                timing,
                wait_ms,
            } => {
                let mut rule = TweenRule::new(property.clone(), to.clone());
                if let Some(gravity) = gravity {
                    rule = rule.with_gravity(*gravity);
                }
                if let Some(name) = effect {
                    let resolved = effects
                        .get(name)
                        .ok_or_else(|| StageError::UnknownEffect(name.clone()))?;
                    rule = rule.with_effect(resolved);
                }
                if let Some(element) = element {
                    rule = rule.with_element(element.clone());
                }
                if !timing.is_empty() {
                    rule = rule.with_timing(timing.resolve(defaults));
                }
                if let Some(wait) = wait_ms {
                    rule = rule.with_wait(*wait);
                }
                Ok(RuleHandle::new(rule))
            }
            Self::Instant {
                property,
                value,
                effect,
                element,
                delay_ms,
            } => {
                let mut rule = InstantRule::new(property.clone(), value.clone());
                if let Some(name) = effect {
                    let resolved = effects
                        .get(name)
                        .ok_or_else(|| StageError::UnknownEffect(name.clone()))?;
                    rule = rule.with_effect(resolved);
                }
                if let Some(element) = element {
                    rule = rule.with_element(element.clone());
                }
                if let Some(delay) = delay_ms {
                    rule = rule.with_delay(*delay);
                }
                Ok(RuleHandle::new(rule))
            }
            Self::Group { rules } => {
                let children = rules
                    .iter()
                    .map(|spec| spec.build(effects, defaults))
                    .collect::<Result<Vec<_>>>()?;
                Ok(RuleHandle::new(GroupRule::from_rules(children)))
            }
            Self::Reverse { rule, keep_sampled } => {
                let inner = rule.build(effects, defaults)?;
                Ok(RuleHandle::new(DecoratedRule::reverse(inner, *keep_sampled)))
            }
            Self::Debug { rule } => {
                let inner = rule.build(effects, defaults)?;
                Ok(RuleHandle::new(DecoratedRule::debug(inner)))
            }
            Self::Skip { rule } => {
                let inner = rule.build(effects, defaults)?;
                Ok(RuleHandle::new(DecoratedRule::skip(inner)))
            }
        }
    }
}

/// One section, as data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSpec {
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    #[serde(skip_serializing_if = "TimingSpec::is_empty")]
    pub timing: TimingSpec,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

impl SectionSpec {
    pub fn build(&self, effects: &EffectRegistry, defaults: Timing) -> Result<SectionHandle> {
        let timing = self.timing.resolve(defaults);
        let mut section = match &self.name {
            Some(name) => RuleSection::named(name.clone()),
            None => RuleSection::new(),
        }
        .with_timing(timing);
        for spec in &self.rules {
            section.add_rule(spec.build(effects, timing)?);
        }
        Ok(section.into_handle())
    }
}

/// How many whole-composition passes to play.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RepeatCountSpec {
    Count { count: u32 },
    Infinite,
}

impl Default for RepeatCountSpec {
    fn default() -> Self {
        Self::Count { count: 1 }
    }
}

/// Repeat playback mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatModeSpec {
    #[default]
    Restart,
    Reverse,
}

/// Whole-composition repeat, as data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RepeatSpecDef {
    #[serde(default)]
    pub count: RepeatCountSpec,
    #[serde(default)]
    pub mode: RepeatModeSpec,
}

impl From<RepeatSpecDef> for RepeatSpec {
    fn from(spec: RepeatSpecDef) -> Self {
        RepeatSpec {
            count: match spec.count {
                RepeatCountSpec::Count { count } => RepeatCount::Times(count),
                RepeatCountSpec::Infinite => RepeatCount::Infinite,
            },
            mode: match spec.mode {
                RepeatModeSpec::Restart => RepeatMode::Restart,
                RepeatModeSpec::Reverse => RepeatMode::Reverse,
            },
        }
    }
}

/// A whole composition, as data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionSpec {
    /// The element the composition targets.
    pub target: String,
    pub sections: Vec<SectionSpec>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat: Option<RepeatSpecDef>,
}

impl CompositionSpec {
    /// Parse a composition from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| StageError::InvalidSpec(e.to_string()))
    }

    /// Build a sequencer, resolving effect names through the registry and
    /// timing gaps through the ambient defaults.
    pub fn build(&self, effects: &EffectRegistry, defaults: Timing) -> Result<Sequencer> {
        if self.sections.is_empty() {
            return Err(StageError::EmptyComposition);
        }
        let mut sequencer = Sequencer::new(self.target.clone());
        for section in &self.sections {
            sequencer.push_section(section.build(effects, defaults)?);
        }
        if let Some(repeat) = self.repeat {
            sequencer.set_repeat(repeat.into());
        }
        Ok(sequencer)
    }
}
