//! Symbolic size expressions, resolved lazily against live geometry.
//!
//! A [`SizeExpr`] is a two-level, left-folded arithmetic structure: an outer
//! ordered sequence of groups combined by `+ - * /`, where each group is an
//! ordered sequence of atomic operands combined by `+ - * /`. There is no
//! operator precedence beyond this explicit two-level grouping.
//!
//! A group stays "open" (appendable) until [`SizeExpr::close`] is called;
//! the next append after a close starts a fresh group, and the operator used
//! for that append becomes the outer operator joining the groups.
//! Evaluation always closes the current open group first.
//!
//! ```
//! use cadence_stage::expr::{EvalContext, SizeExpr};
//! use cadence_stage::snapshot::Gravity;
//!
//! // (2 + 3) * (4 - 1) — close() splits the groups
//! let mut expr = SizeExpr::of(2.0).plus(3.0).closed().times(4.0).minus(1.0);
//! let value = expr.evaluate(&EvalContext::default(), Gravity::Left);
//! assert_eq!(value, 15.0);
//! ```

use serde::{Deserialize, Serialize};

use cadence_core::Size;

use crate::snapshot::{Axis, Gravity, LayoutSnapshot, SnapshotRegistry};

/// Operator used for left-folding terms and groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoldOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl FoldOp {
    /// Fold one value into the accumulator.
    ///
    /// Division by a resolved zero propagates IEEE inf/NaN; it never panics.
    pub fn apply(&self, acc: f64, rhs: f64) -> f64 {
        match self {
            Self::Add => acc + rhs,
            Self::Sub => acc - rhs,
            Self::Mul => acc * rhs,
            Self::Div => acc / rhs,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }
}

/// Named size constant, resolved from the evaluation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeConstant {
    /// The parent extent along the contextual gravity's axis.
    MatchParent,
    /// The measured extent along the contextual gravity's axis.
    WrapContent,
    ContentWidth,
    ContentHeight,
    ParentWidth,
    ParentHeight,
}

impl SizeConstant {
    pub fn resolve(&self, ctx: &EvalContext<'_>, gravity: Gravity) -> f64 {
        match self {
            Self::MatchParent => axis_extent(ctx.parent_size, gravity.axis()),
            Self::WrapContent => axis_extent(ctx.measured, gravity.axis()),
            Self::ContentWidth => ctx.measured.width,
            Self::ContentHeight => ctx.measured.height,
            Self::ParentWidth => ctx.parent_size.width,
            Self::ParentHeight => ctx.parent_size.height,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::MatchParent => "match_parent",
            Self::WrapContent => "wrap_content",
            Self::ContentWidth => "content_width",
            Self::ContentHeight => "content_height",
            Self::ParentWidth => "parent_width",
            Self::ParentHeight => "parent_height",
        }
    }
}

fn axis_extent(size: Size, axis: Axis) -> f64 {
    match axis {
        Axis::Horizontal => size.width,
        Axis::Vertical => size.height,
    }
}

/// Which prepared snapshot a snapshot-edge operand reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotRef {
    Parent,
    Target,
    Original,
}

impl SnapshotRef {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Parent => "parent",
            Self::Target => "target",
            Self::Original => "original",
        }
    }
}

/// Atomic operand of a size expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operand {
    /// A plain number.
    Literal { value: f64 },
    /// A named size constant.
    Constant { constant: SizeConstant },
    /// An edge of one of the three prepared snapshots. `gravity` defaults to
    /// the contextual gravity of the evaluate call.
    Snapshot {
        source: SnapshotRef,
        gravity: Option<Gravity>,
    },
    /// An edge of another element's registered snapshot.
    Element {
        element: String,
        gravity: Option<Gravity>,
    },
}

impl Operand {
    pub fn literal(value: f64) -> Self {
        Self::Literal { value }
    }

    pub fn constant(constant: SizeConstant) -> Self {
        Self::Constant { constant }
    }

    pub fn snapshot(source: SnapshotRef, gravity: impl Into<Option<Gravity>>) -> Self {
        Self::Snapshot {
            source,
            gravity: gravity.into(),
        }
    }

    pub fn element(element: impl Into<String>, gravity: impl Into<Option<Gravity>>) -> Self {
        Self::Element {
            element: element.into(),
            gravity: gravity.into(),
        }
    }

    fn resolve(&self, ctx: &EvalContext<'_>, contextual: Gravity) -> f64 {
        match self {
            Self::Literal { value } => *value,
            Self::Constant { constant } => constant.resolve(ctx, contextual),
            Self::Snapshot { source, gravity } => {
                let snap = match source {
                    SnapshotRef::Parent => ctx.parent,
                    SnapshotRef::Target => ctx.target,
                    SnapshotRef::Original => ctx.original,
                };
                match snap {
                    Some(snap) => snap.get(gravity.unwrap_or(contextual)),
                    None => {
                        tracing::warn!(source = source.name(), "snapshot missing from context");
                        NEUTRAL
                    }
                }
            }
            Self::Element { element, gravity } => {
                match ctx.registry.and_then(|r| r.get(element)) {
                    Some(snap) => snap.get(gravity.unwrap_or(contextual)),
                    // No snapshot registered for the element yet: substitute
                    // the multiplicative identity. Intentional leniency.
                    None => {
                        log::debug!("no snapshot registered for '{element}', substituting 1");
                        NEUTRAL
                    }
                }
            }
        }
    }

    fn describe(&self, contextual: Gravity) -> String {
        match self {
            Self::Literal { value } => format!("{value}"),
            Self::Constant { constant } => constant.name().to_string(),
            Self::Snapshot { source, gravity } => format!(
                "{}.{}",
                source.name(),
                gravity.unwrap_or(contextual).name()
            ),
            Self::Element { element, gravity } => {
                format!("@{}.{}", element, gravity.unwrap_or(contextual).name())
            }
        }
    }
}

/// Neutral substitute for unresolvable references.
const NEUTRAL: f64 = 1.0;

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Self::Literal { value }
    }
}

impl From<SizeConstant> for Operand {
    fn from(constant: SizeConstant) -> Self {
        Self::Constant { constant }
    }
}

/// Everything operand resolution may read.
///
/// `parent_size` is carried separately from the parent snapshot so constants
/// stay resolvable while the parent snapshot itself is being prepared.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvalContext<'a> {
    /// Measured extent of the target element.
    pub measured: Size,
    /// Extent of the target's container.
    pub parent_size: Size,
    pub parent: Option<&'a LayoutSnapshot>,
    pub target: Option<&'a LayoutSnapshot>,
    pub original: Option<&'a LayoutSnapshot>,
    pub registry: Option<&'a SnapshotRegistry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Term {
    op: FoldOp,
    operand: Operand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TermGroup {
    /// Operator joining this group into the outer fold. Ignored for the
    /// first group.
    op: FoldOp,
    terms: Vec<Term>,
}

impl TermGroup {
    fn evaluate(&self, ctx: &EvalContext<'_>, contextual: Gravity) -> f64 {
        let mut acc = None;
        for term in &self.terms {
            let value = term.operand.resolve(ctx, contextual);
            acc = Some(match acc {
                None => value,
                Some(folded) => term.op.apply(folded, value),
            });
        }
        acc.unwrap_or(0.0)
    }

    fn describe(&self, contextual: Gravity) -> String {
        let mut out = String::new();
        for (index, term) in self.terms.iter().enumerate() {
            if index > 0 {
                out.push(' ');
                out.push_str(term.op.symbol());
                out.push(' ');
            }
            out.push_str(&term.operand.describe(contextual));
        }
        if self.terms.len() > 1 {
            format!("({out})")
        } else {
            out
        }
    }
}

/// A two-level, left-folded size expression.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SizeExpr {
    groups: Vec<TermGroup>,
    /// Whether the last group still accepts appends.
    open: bool,
}

impl SizeExpr {
    /// Empty expression; evaluates to 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expression starting from a single operand.
    pub fn of(operand: impl Into<Operand>) -> Self {
        let mut expr = Self::new();
        expr.append(FoldOp::Add, operand);
        expr
    }

    /// Append an operand with the given operator.
    ///
    /// Appends into the open group; after a close, starts a fresh group and
    /// `op` becomes the outer operator joining it to the previous groups.
    pub fn append(&mut self, op: FoldOp, operand: impl Into<Operand>) {
        let term = Term {
            op,
            operand: operand.into(),
        };
        match self.groups.last_mut() {
            Some(group) if self.open => group.terms.push(term),
            _ => {
                self.groups.push(TermGroup {
                    op,
                    terms: vec![term],
                });
                self.open = true;
            }
        }
    }

    /// Finalize the open group. Idempotent; the next append reopens a fresh
    /// group.
    pub fn close(&mut self) {
        self.open = false;
    }

    /// Builder-style [`Self::close`].
    pub fn closed(mut self) -> Self {
        self.close();
        self
    }

    pub fn plus(mut self, operand: impl Into<Operand>) -> Self {
        self.append(FoldOp::Add, operand);
        self
    }

    pub fn minus(mut self, operand: impl Into<Operand>) -> Self {
        self.append(FoldOp::Sub, operand);
        self
    }

    pub fn times(mut self, operand: impl Into<Operand>) -> Self {
        self.append(FoldOp::Mul, operand);
        self
    }

    pub fn div(mut self, operand: impl Into<Operand>) -> Self {
        self.append(FoldOp::Div, operand);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Resolve the expression to a number.
    ///
    /// Operands within a group left-fold with each term's operator; group
    /// results left-fold with each group's outer operator. `contextual` is
    /// the gravity substituted into operands that carry none (during
    /// snapshot preparation it is the edge's own direction).
    pub fn evaluate(&mut self, ctx: &EvalContext<'_>, contextual: Gravity) -> f64 {
        self.close();
        let mut acc = None;
        for group in &self.groups {
            let value = group.evaluate(ctx, contextual);
            acc = Some(match acc {
                None => value,
                Some(folded) => group.op.apply(folded, value),
            });
        }
        acc.unwrap_or(0.0)
    }

    /// Render the expression symbolically, in the exact order and grouping
    /// `evaluate` uses. Diagnostic only; never drives behavior.
    pub fn describe(&mut self, contextual: Gravity) -> String {
        self.close();
        let mut out = String::new();
        for (index, group) in self.groups.iter().enumerate() {
            if index > 0 {
                out.push(' ');
                out.push_str(group.op.symbol());
                out.push(' ');
            }
            out.push_str(&group.describe(contextual));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::Rect;

    fn ctx<'a>() -> EvalContext<'a> {
        EvalContext::default()
    }

    #[test]
    fn test_literal_left_fold_ignores_precedence() {
        // 10 + 2 * 3 folds left: (10 + 2) * 3 = 36
        let mut expr = SizeExpr::of(10.0).plus(2.0).times(3.0);
        assert_eq!(expr.evaluate(&ctx(), Gravity::Left), 36.0);
    }

    #[test]
    fn test_two_level_grouping() {
        // (2 + 3) * (4 - 1) = 15
        let mut expr = SizeExpr::of(2.0).plus(3.0).closed().times(4.0).minus(1.0);
        assert_eq!(expr.evaluate(&ctx(), Gravity::Left), 15.0);
    }

    #[test]
    fn test_close_changes_grouping() {
        // Without close: (2 * 3) + 1 = 7. With close: 2 * (3 + 1) = 8.
        let mut flat = SizeExpr::of(2.0).times(3.0).plus(1.0);
        assert_eq!(flat.evaluate(&ctx(), Gravity::Left), 7.0);

        let mut grouped = SizeExpr::of(2.0).closed().times(3.0).plus(1.0);
        assert_eq!(grouped.evaluate(&ctx(), Gravity::Left), 8.0);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut expr = SizeExpr::of(5.0).closed().closed().closed().plus(2.0);
        assert_eq!(expr.evaluate(&ctx(), Gravity::Left), 7.0);
    }

    #[test]
    fn test_empty_expression() {
        let mut expr = SizeExpr::new();
        assert!(expr.is_empty());
        assert_eq!(expr.evaluate(&ctx(), Gravity::Left), 0.0);
    }

    #[test]
    fn test_division_by_zero_is_infinite() {
        let mut expr = SizeExpr::of(1.0).div(0.0);
        assert!(expr.evaluate(&ctx(), Gravity::Left).is_infinite());
    }

    #[test]
    fn test_parent_width_over_two() {
        // Measured width 200, parent width 300: parent_width / 2 = 150.
        let parent = LayoutSnapshot::from_rect(Rect::from_edges(0.0, 0.0, 300.0, 100.0));
        let ctx = EvalContext {
            measured: Size::new(200.0, 100.0),
            parent_size: parent.size(),
            parent: Some(&parent),
            ..Default::default()
        };
        let mut expr = SizeExpr::of(SizeConstant::ParentWidth).div(2.0);
        assert_eq!(expr.evaluate(&ctx, Gravity::Left), 150.0);
    }

    #[test]
    fn test_match_parent_follows_contextual_axis() {
        let ctx = EvalContext {
            parent_size: Size::new(320.0, 180.0),
            ..Default::default()
        };
        let mut expr = SizeExpr::of(SizeConstant::MatchParent);
        assert_eq!(expr.evaluate(&ctx, Gravity::Right), 320.0);
        assert_eq!(expr.evaluate(&ctx, Gravity::Bottom), 180.0);
    }

    #[test]
    fn test_snapshot_operand_reads_edge() {
        let target = LayoutSnapshot::from_rect(Rect::from_edges(10.0, 0.0, 60.0, 40.0));
        let ctx = EvalContext {
            target: Some(&target),
            ..Default::default()
        };
        let mut expr = SizeExpr::of(Operand::snapshot(SnapshotRef::Target, Gravity::Right));
        assert_eq!(expr.evaluate(&ctx, Gravity::Left), 60.0);

        // Without explicit gravity, the contextual gravity selects the edge.
        let mut expr = SizeExpr::of(Operand::snapshot(SnapshotRef::Target, None));
        assert_eq!(expr.evaluate(&ctx, Gravity::CenterHorizontal), 35.0);
    }

    #[test]
    fn test_unregistered_element_substitutes_one() {
        // Leniency: an unregistered element reference resolves to the
        // multiplicative identity instead of failing.
        let mut expr = SizeExpr::of(Operand::element("ghost", Gravity::Left)).times(5.0);
        assert_eq!(expr.evaluate(&ctx(), Gravity::Left), 5.0);
    }

    #[test]
    fn test_registered_element_reads_snapshot() {
        let mut registry = SnapshotRegistry::new();
        registry.register(
            "anchor",
            LayoutSnapshot::from_rect(Rect::from_edges(0.0, 0.0, 80.0, 20.0)),
        );
        let ctx = EvalContext {
            registry: Some(&registry),
            ..Default::default()
        };
        let mut expr = SizeExpr::of(Operand::element("anchor", Gravity::Right)).plus(5.0);
        assert_eq!(expr.evaluate(&ctx, Gravity::Left), 85.0);
    }

    #[test]
    fn test_describe_matches_evaluation_order() {
        let mut expr = SizeExpr::of(2.0)
            .plus(SizeConstant::ParentWidth)
            .closed()
            .times(4.0)
            .minus(Operand::element("anchor", Gravity::Left));
        let text = expr.describe(Gravity::Left);
        assert_eq!(text, "(2 + parent_width) * (4 - @anchor.left)");
    }

    #[test]
    fn test_describe_operator_count() {
        // Operator count per group equals operand count - 1, composed at the
        // outer level: 4 operands in 2 groups -> 2 in-group + 1 outer.
        let mut expr = SizeExpr::of(1.0).plus(2.0).plus(3.0).closed().times(4.0);
        let text = expr.describe(Gravity::Left);
        let operators = text.matches(['+', '*']).count();
        assert_eq!(operators, 3);
        assert_eq!(text, "(1 + 2 + 3) * 4");
    }

    #[test]
    fn test_serde_round_trip() {
        let expr = SizeExpr::of(SizeConstant::ParentWidth)
            .div(2.0)
            .closed()
            .plus(Operand::element("anchor", Gravity::Top));
        let json = serde_json::to_string(&expr).unwrap();
        let mut parsed: SizeExpr = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, expr);

        let ctx = EvalContext {
            parent_size: Size::new(100.0, 50.0),
            ..Default::default()
        };
        // anchor is unregistered here, so the second group contributes 1.
        assert_eq!(parsed.evaluate(&ctx, Gravity::Left), 51.0);
    }
}
