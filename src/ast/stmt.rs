//! Statement node kinds (spec.md §3; the `SC_*_STATEMENT` family and
//! `SC_COMPOUND_STATEMENT`/`SC_EXPRESSION_STATEMENT` of the reference).

use super::NodeId;

#[derive(Debug)]
pub enum StmtKind {
    Labeled { label: String, statement: NodeId },
    /// `case`/`default` use `label: None` to mean "default"; `value` holds
    /// the unlowered constant expression, evaluated by the
    /// constant-expression evaluator during constraint checking
    /// (spec.md §4.3: "non-constant case expressions").
    CaseLabeled { value: Option<NodeId>, statement: NodeId },
    Compound { block_items: Vec<NodeId> },
    Expression { expr: Option<NodeId> },
    If { cond: NodeId, then_stmt: NodeId, else_stmt: Option<NodeId> },
    Switch { controlling_expr: NodeId, body: NodeId },
    Do { body: NodeId, cond: NodeId },
    While { cond: NodeId, body: NodeId },
    For { init: Option<NodeId>, cond: Option<NodeId>, post: Option<NodeId>, body: NodeId },
    Goto { label: String },
    Continue,
    Break,
    Return { expr: Option<NodeId> },
}
