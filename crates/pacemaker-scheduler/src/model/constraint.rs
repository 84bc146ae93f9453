use crate::ids::{ConstraintId, NodeId, ResourceId, TicketId};
use crate::model::action::Task;
use crate::model::resource::Role;
use crate::model::score::ScoreValue;
use crate::rules::RuleExpr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BooleanOp {
    And,
    Or,
}

/// One child rule of a location constraint, carrying its own score so an
/// `boolean-op=or` set can accumulate per-rule contributions.
#[derive(Clone, Debug)]
pub struct RuleClause {
    pub expr: RuleExpr,
    pub score: ScoreValue,
}

/// `resource -> (node | rule) -> score`. When `node` is set this is a plain
/// pin/ban; otherwise `rules` is evaluated per candidate node.
#[derive(Clone, Debug)]
pub struct LocationConstraint {
    pub id: ConstraintId,
    pub resource: ResourceId,
    pub node: Option<NodeId>,
    pub score: ScoreValue,
    pub role: Option<Role>,
    pub rules: Vec<RuleClause>,
    pub boolean_op: BooleanOp,
    /// Reads the effective score from a per-node attribute instead of the
    /// literal `score` above, optionally with a `%N` back-reference filled
    /// in from a regex match against the resource id.
    pub score_attribute: Option<String>,
    pub score_attribute_pattern: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeAttributeEquivalence {
    /// Two nodes are equivalent when the named attribute has the same
    /// value on both; defaults to `#uname`, i.e. node identity.
    Named,
}

#[derive(Clone, Debug)]
pub struct ColocationConstraint {
    pub id: ConstraintId,
    pub dependent: ResourceId,
    pub primary: ResourceId,
    pub score: ScoreValue,
    pub dependent_role: Option<Role>,
    pub primary_role: Option<Role>,
    pub node_attribute: String,
    pub influence: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderKind {
    Mandatory,
    Optional,
    Serialize,
}

#[derive(Clone, Debug)]
pub struct OrderingConstraint {
    pub id: ConstraintId,
    pub first: ResourceId,
    pub first_task: Task,
    pub then: ResourceId,
    pub then_task: Task,
    pub kind: OrderKind,
    pub symmetric: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LossPolicy {
    Stop,
    Demote,
    Freeze,
    Fence,
}

#[derive(Clone, Debug)]
pub struct TicketConstraint {
    pub id: ConstraintId,
    pub resource: ResourceId,
    pub ticket: TicketId,
    pub role: Option<Role>,
    pub loss_policy: LossPolicy,
}

/// One member of a resource-set based ordering/colocation constraint, after
/// tag/template expansion has replaced any tag reference in place with its
/// members in declaration order.
#[derive(Clone, Debug)]
pub struct ResourceSet {
    pub members: Vec<ResourceId>,
    pub sequential: bool,
    pub role: Option<Role>,
    pub action: Option<Task>,
    pub require_all: bool,
}

impl Default for ResourceSet {
    fn default() -> Self {
        Self {
            members: Vec::new(),
            sequential: true,
            role: None,
            action: None,
            require_all: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct OrderingSetConstraint {
    pub id: ConstraintId,
    pub sets: Vec<ResourceSet>,
    pub kind: OrderKind,
    pub symmetric: bool,
}

#[derive(Clone, Debug)]
pub struct ColocationSetConstraint {
    pub id: ConstraintId,
    pub sets: Vec<ResourceSet>,
    pub score: ScoreValue,
}

#[derive(Clone, Debug)]
pub struct Ticket {
    pub id: TicketId,
    pub granted: bool,
    pub standby: bool,
    pub last_granted: Option<crate::time::Timestamp>,
}
