//! cadence-stage: staged animation playback for tree-structured visual
//! elements.
//!
//! A caller describes an ordered list of rule sections — each a set of
//! value-changes that start together — and the sequencer plays them back,
//! forward or in reverse, against the element's live geometry.
//!
//! This crate provides:
//! - **Size expressions**: symbolic arithmetic over layout-dependent
//!   quantities, resolved lazily once real measurements exist
//! - **Layout snapshots**: resolved rectangles for parent / target /
//!   original geometry
//! - **Rules and decorators**: the atomic unit of change, with a reversal
//!   contract and duty-changing wrappers (reverse / debug / skip)
//! - **Sections and the sequencer**: ordered playback with wait, repeat,
//!   reverse, and cancel semantics
//! - **The tick driver**: a deterministic animation primitive driven by the
//!   embedder's clock
//!
//! # Architecture
//!
//! ```text
//! Sequencer
//!   ├── Rule Sections (rules that start together, shared timing)
//!   │     └── Rules ──resolve──▶ SizeExpr ──read──▶ LayoutSnapshots
//!   └── CompositeStep ──bound to──▶ AnimationDriver ──apply──▶ Effects
//! ```
//!
//! # Example
//!
//! ```
//! use cadence_stage::driver::Timing;
//! use cadence_stage::easing::Easing;
//! use cadence_stage::expr::{SizeConstant, SizeExpr};
//! use cadence_stage::rules::kinds::TweenRule;
//! use cadence_stage::section::RuleSection;
//! use cadence_stage::sequencer::Sequencer;
//! use cadence_stage::stage::{Stage, StageElement};
//! use cadence_core::{Rect, Size};
//!
//! let mut stage = Stage::new();
//! stage
//!     .insert(
//!         StageElement::new("root")
//!             .with_measured(Size::new(400.0, 300.0))
//!             .with_frame(Rect::from_edges(0.0, 0.0, 400.0, 300.0)),
//!         None,
//!     )
//!     .unwrap();
//! stage
//!     .insert(
//!         StageElement::new("card")
//!             .with_measured(Size::new(100.0, 60.0))
//!             .with_frame(Rect::from_edges(20.0, 20.0, 120.0, 80.0)),
//!         Some("root"),
//!     )
//!     .unwrap();
//!
//! // Slide the card to half the parent width over 100ms.
//! let section = RuleSection::new()
//!     .with_timing(Timing::new(100.0).with_easing(Easing::Linear))
//!     .with_rule(TweenRule::new(
//!         "left",
//!         SizeExpr::of(SizeConstant::ParentWidth).div(2.0),
//!     ))
//!     .into_handle();
//!
//! let mut sequencer = Sequencer::new("card").with_section(section);
//! sequencer.start(&mut stage).unwrap();
//! while sequencer.is_active() {
//!     sequencer.tick(&mut stage, 16.0);
//! }
//! assert_eq!(stage.get("card").unwrap().frame().left, 200.0);
//! ```

/// Re-export the geometry crate for downstream crates, avoiding a direct
/// dependency.
pub use cadence_core;

pub mod driver;
pub mod easing;
pub mod effects;
pub mod error;
pub mod events;
pub mod expr;
pub mod rules;
pub mod schema;
pub mod section;
pub mod sequencer;
pub mod snapshot;
pub mod stage;

pub use driver::{AnimationDriver, AnimationTask, CompositeStep, TaskState, TickDriver, Timing};
pub use easing::Easing;
pub use effects::{Effect, EffectRef, EffectRegistry, SetProperty};
pub use error::{Result, StageError};
pub use events::{EventQueue, PlaybackEvent, SequencerListener};
pub use expr::{EvalContext, FoldOp, Operand, SizeConstant, SizeExpr, SnapshotRef};
pub use rules::decorator::{DecoratedRule, Duty};
pub use rules::kinds::{GroupRule, InstantRule, SubSequenceRule, TweenRule};
pub use rules::{ActivationContext, Rule, RuleBase, RuleHandle, RulePhase, Scratch};
pub use schema::{CompositionSpec, RuleSpec, SectionSpec, TimingSpec};
pub use section::{ReversedSection, RuleSection, Section, SectionHandle, SectionHook};
pub use sequencer::{RepeatCount, RepeatMode, RepeatSpec, Sequencer, SequencerState};
pub use snapshot::{Edge, EdgeSource, Gravity, LayoutSnapshot, SnapshotRegistry};
pub use stage::{Stage, StageElement};
