use std::collections::{BTreeMap, BTreeSet};

use crate::ids::{NodeId, ResourceId};
use crate::model::score::ScoreValue;

/// Per-node-per-role transition state. `Unknown` means the scheduler has no
/// status record for this (resource, node) pair — the trigger for a startup
/// probe. `Promoted` is only reachable from `Unpromoted`, never directly
/// from `Stopped`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    Unknown,
    Stopped,
    Started,
    Unpromoted,
    Promoted,
    Failed,
}

impl Role {
    /// Whether `self -> next` is a transition the role matrix permits.
    /// Pacemaker's matrix is permissive about dropping back to `Stopped`
    /// (always allowed, it's how failures and intentional stops both end)
    /// but only allows `Promoted` once a resource is `Unpromoted`.
    pub fn can_transition_to(self, next: Role) -> bool {
        match next {
            Role::Promoted => self == Role::Unpromoted,
            _ => true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestartType {
    /// Default: an in-place reload is attempted before falling back to
    /// stop+start.
    Normal,
    /// `restart-type=restart` forces stop+start even when a reload would
    /// suffice.
    Restart,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColocationNodeEquivalence {
    /// Nodes are equivalent when the named attribute has the same value.
    /// Defaults to `#uname`, i.e. plain node identity.
    Attribute,
}

/// What a revoked ticket does to the resources bound to it, per the
/// binding's `loss-policy`. Computed once, before placement, from the live
/// ticket state so placement and action generation don't need to know
/// anything about tickets themselves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TicketEffect {
    /// Treated exactly like "no viable node": the resource is banned from
    /// every node and, if running, stopped.
    Stop,
    /// Only meaningful for a promotable resource: caps its promoted count
    /// at zero this pass without otherwise touching its placement.
    Demote,
    /// The resource is left exactly where it is — no action is scheduled,
    /// whatever role it is currently in.
    Freeze,
    /// The node(s) currently running the resource are fenced; the stop this
    /// implies is folded into the ordinary fencing machinery.
    Fence,
}

#[derive(Clone, Debug, Default)]
pub struct ResourceFlags {
    pub managed: bool,
    pub orphan: bool,
    pub failed: bool,
    pub allow_migrate: bool,
    pub critical: bool,
    pub unique: bool,
    pub notify: bool,
    pub promotable: bool,
}

impl Default for RestartType {
    fn default() -> Self {
        RestartType::Normal
    }
}

/// A configured recurring (or probe, interval 0) operation.
#[derive(Clone, Debug)]
pub struct OperationDef {
    pub name: String,
    pub interval_ms: u64,
    pub timeout_ms: u64,
    /// The role this operation should run in, e.g. a promoted-only monitor.
    /// `None` means it applies in whatever role the resource is started in.
    pub role: Option<Role>,
}

#[derive(Clone, Debug)]
pub struct CloneSpec {
    pub clone_max: u32,
    pub clone_node_max: u32,
    /// Minimum instance count that must be runnable before a `then` action
    /// ordered after this clone may run; gates the `relaxed-clone:<id>`
    /// pseudo-action rather than the clone's own allocation.
    pub clone_min: u32,
    pub promoted_max: u32,
    pub promoted_node_max: u32,
    pub interleave: bool,
    pub ordered: bool,
    pub globally_unique: bool,
}

impl Default for CloneSpec {
    fn default() -> Self {
        Self {
            clone_max: 1,
            clone_node_max: 1,
            clone_min: 0,
            promoted_max: 1,
            promoted_node_max: 1,
            interleave: false,
            ordered: false,
            globally_unique: false,
        }
    }
}

/// One instance of a clone or promotable clone, synthesized by the
/// placement engine rather than read from the CIB — the configuration names
/// the clone once, with `clone-max` instances implied by count alone.
#[derive(Clone, Debug)]
pub struct CloneInstance {
    pub index: u32,
    pub allocated_node: Option<NodeId>,
    pub current_role: Role,
    pub next_role: Role,
    pub running_on: Option<NodeId>,
    /// Per-node promotion score, consulted only for promotable clones.
    pub promotion_scores: BTreeMap<NodeId, ScoreValue>,
}

impl CloneInstance {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            allocated_node: None,
            current_role: Role::Unknown,
            next_role: Role::Stopped,
            running_on: None,
            promotion_scores: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub enum ResourceVariant {
    Primitive,
    Group {
        ordered: bool,
    },
    Clone {
        spec: CloneSpec,
        instances: Vec<CloneInstance>,
    },
    PromotableClone {
        spec: CloneSpec,
        instances: Vec<CloneInstance>,
    },
    Bundle,
}

impl ResourceVariant {
    /// Processing-order rank used by the placement engine: clones before
    /// groups before primitives, within equal priority. Bundles are placed
    /// alongside clones since they share the "many instances" shape.
    pub fn allocation_rank(&self) -> u8 {
        match self {
            ResourceVariant::Clone { .. } | ResourceVariant::PromotableClone { .. } => 0,
            ResourceVariant::Bundle => 1,
            ResourceVariant::Group { .. } => 2,
            ResourceVariant::Primitive => 3,
        }
    }

    pub fn is_promotable(&self) -> bool {
        matches!(self, ResourceVariant::PromotableClone { .. })
    }

    pub fn is_clone(&self) -> bool {
        matches!(
            self,
            ResourceVariant::Clone { .. } | ResourceVariant::PromotableClone { .. }
        )
    }
}

/// A resource: `ResourceId` unique across the working set, variant-specific
/// payload, and the mutable allocation fields (`allocated_node`, `next_role`)
/// the placement engine fills in. Parent/child links reference sibling
/// `ResourceId`s directly; the working set resolves them through its arena
/// rather than this struct owning any back-pointers.
#[derive(Clone, Debug)]
pub struct Resource {
    pub id: ResourceId,
    pub variant: ResourceVariant,
    pub parent: Option<ResourceId>,
    pub children: Vec<ResourceId>,

    pub allowed_nodes: BTreeMap<NodeId, ScoreValue>,
    pub current_role: Role,
    pub next_role: Option<Role>,
    pub allocated_node: Option<NodeId>,
    pub running_on: BTreeSet<NodeId>,
    /// Set when status shows the resource in an unexpected role/node with no
    /// corresponding CIB entry — an orphan is always scheduled to stop.
    pub flags: ResourceFlags,

    pub meta: BTreeMap<String, String>,
    pub instance_attrs: BTreeMap<String, String>,
    pub restart_type: RestartType,
    pub stickiness: ScoreValue,
    pub priority: i64,
    pub migration_threshold: u32,
    pub fail_counts: BTreeMap<NodeId, u32>,
    pub operations: Vec<OperationDef>,
    /// Set by ticket-loss handling, before placement runs, when this
    /// resource is bound to a ticket that is not currently granted.
    pub ticket_effect: Option<TicketEffect>,
}

impl Resource {
    pub fn new(id: ResourceId, variant: ResourceVariant) -> Self {
        Self {
            id,
            variant,
            parent: None,
            children: Vec::new(),
            allowed_nodes: BTreeMap::new(),
            current_role: Role::Unknown,
            next_role: None,
            allocated_node: None,
            running_on: BTreeSet::new(),
            flags: ResourceFlags {
                managed: true,
                ..ResourceFlags::default()
            },
            meta: BTreeMap::new(),
            instance_attrs: BTreeMap::new(),
            restart_type: RestartType::Normal,
            stickiness: 0,
            priority: 0,
            migration_threshold: 1_000_000,
            fail_counts: BTreeMap::new(),
            operations: Vec::new(),
            ticket_effect: None,
        }
    }

    pub fn fail_count(&self, node: &NodeId) -> u32 {
        self.fail_counts.get(node).copied().unwrap_or(0)
    }

    pub fn is_running_anywhere(&self) -> bool {
        !self.running_on.is_empty()
    }
}
