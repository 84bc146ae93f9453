use std::collections::{BTreeMap, BTreeSet};

use crate::ids::{ActionId, InstanceId, NodeId, ResourceId};

/// What an action does. Pseudo-actions never reach an executor; they exist
/// purely as ordering anchors (notification phases, fence barriers,
/// clone-min gates, the one-or-more join for `require-all=false`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Task {
    Start,
    Stop,
    Promote,
    Demote,
    Monitor,
    MigrateTo,
    MigrateFrom,
    Notify,
    Notified,
    Cancel,
    Fence,
    Pseudo(PseudoKind),
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PseudoKind {
    PreNotify,
    PreNotifyDone,
    PostNotify,
    PostNotifyDone,
    RelaxedCloneMin,
    OneOrMore,
    Stonith,
}

impl Task {
    /// The task reached by inverting a symmetric ordering or colocation
    /// constraint.
    pub fn inverted(&self) -> Task {
        match self {
            Task::Start => Task::Stop,
            Task::Stop => Task::Start,
            Task::Promote => Task::Demote,
            Task::Demote => Task::Promote,
            other => other.clone(),
        }
    }

    pub fn is_pseudo(&self) -> bool {
        matches!(self, Task::Pseudo(_))
    }
}

/// The real-world subject of an action. Most actions belong to a resource or
/// resource instance; fencing and the notification joins belong to a node or
/// to nothing in particular (a pure ordering anchor).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionSubject {
    Resource(ResourceId),
    Instance(InstanceId),
    Node(NodeId),
    /// A constraint- or clone-scoped anchor with no single owning entity,
    /// e.g. `relaxed-clone:<id>` or the notify phase joins.
    Anchor(String),
}

/// Action identity: `(subject, task, interval)`. `subject` plays the role of
/// "resource" for non-resource actions so the same dedup-by-key machinery
/// covers fencing and pseudo-actions uniformly.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ActionKey {
    pub subject: ActionSubject,
    pub task: Task,
    pub interval_ms: u64,
}

impl ActionKey {
    pub fn resource(resource: ResourceId, task: Task) -> Self {
        Self {
            subject: ActionSubject::Resource(resource),
            task,
            interval_ms: 0,
        }
    }

    pub fn instance(instance: InstanceId, task: Task) -> Self {
        Self {
            subject: ActionSubject::Instance(instance),
            task,
            interval_ms: 0,
        }
    }

    pub fn monitor(resource: ResourceId, interval_ms: u64) -> Self {
        Self {
            subject: ActionSubject::Resource(resource),
            task: Task::Monitor,
            interval_ms,
        }
    }

    pub fn node(node: NodeId, task: Task) -> Self {
        Self {
            subject: ActionSubject::Node(node),
            task,
            interval_ms: 0,
        }
    }

    pub fn anchor(name: impl Into<String>, task: Task) -> Self {
        Self {
            subject: ActionSubject::Anchor(name.into()),
            task,
            interval_ms: 0,
        }
    }

    pub fn with_interval(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ActionFlags {
    pub optional: bool,
    pub runnable: bool,
    pub pseudo: bool,
    /// Gated by a `one-or-more`/clone-min join rather than a simple AND of
    /// its direct predecessors.
    pub requires_any: bool,
    pub migrate_runnable: bool,
    /// Set when a stop was synthesized because its node is being fenced —
    /// downstream consumers must not send this to the executor, the fencer
    /// owns cleaning up the node.
    pub implied_by_fencing: bool,
    /// Set on the phantom stop/start mirrors a migration replaces, so the
    /// ordering engine can still use them to compute edges without an
    /// executor ever seeing them.
    pub phantom: bool,
}

#[derive(Clone, Debug)]
pub struct Action {
    pub id: ActionId,
    pub key: ActionKey,
    pub node: Option<NodeId>,
    pub flags: ActionFlags,
    pub priority: i64,
    pub timeout_ms: u64,
    pub meta: BTreeMap<String, String>,
    pub predecessors: BTreeSet<ActionId>,
}

impl Action {
    pub fn new(id: ActionId, key: ActionKey, node: Option<NodeId>) -> Self {
        Self {
            id,
            key,
            node,
            flags: ActionFlags::default(),
            priority: 0,
            timeout_ms: 20_000,
            meta: BTreeMap::new(),
            predecessors: BTreeSet::new(),
        }
    }

    pub fn is_pseudo(&self) -> bool {
        self.flags.pseudo || self.key.task.is_pseudo()
    }
}

/// Flags carried on an [`OrderingEdge`], independent from `ActionFlags`.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrderFlags {
    pub optional: bool,
    pub implies_then: bool,
    pub implies_first: bool,
    pub runnable_left: bool,
    pub one_or_more: bool,
    pub anti_colocation: bool,
    pub serialize_only: bool,
    pub apply_first_non_migratable: bool,
    pub asymmetrical: bool,
}

#[derive(Clone, Debug)]
pub struct OrderingEdge {
    pub from: ActionId,
    pub to: ActionId,
    pub flags: OrderFlags,
}
