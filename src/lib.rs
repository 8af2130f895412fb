//! cadence: staged animation playback for tree-structured visual elements.
//!
//! This facade re-exports the stage crate, which contains the whole
//! sequencing core: size expressions, layout snapshots, rules, sections,
//! the sequencer, and the tick driver.

pub use cadence_stage::*;
