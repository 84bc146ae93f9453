//! Typed representation of the cluster: nodes, resources, actions,
//! constraints and the working set that owns them all for one pass.

pub mod action;
pub mod cluster_options;
pub mod constraint;
pub mod node;
pub mod resource;
pub mod score;
pub mod working_set;

pub use action::{Action, ActionFlags, ActionKey, ActionSubject, OrderFlags, OrderingEdge, PseudoKind, Task};
pub use cluster_options::{ClusterOptions, NodeHealthStrategy, NoQuorumPolicy, PlacementStrategy};
pub use constraint::{
    BooleanOp, ColocationConstraint, ColocationSetConstraint, LocationConstraint, LossPolicy,
    NodeAttributeEquivalence, OrderKind, OrderingConstraint, OrderingSetConstraint, ResourceSet,
    RuleClause, Ticket, TicketConstraint,
};
pub use node::{HealthLevel, Node, NodeKind};
pub use resource::{
    CloneInstance, CloneSpec, ColocationNodeEquivalence, OperationDef, ResourceFlags,
    ResourceVariant, RestartType, Role,
};
pub use score::{
    is_banned, is_forced, score_add, score_sum, Score, ScoreValue, SCORE_INFINITY,
    SCORE_NEG_INFINITY,
};
pub use working_set::{Constraints, WorkingSet};
