//! The root container threaded through every stage of a scheduling pass.
//!
//! A `WorkingSet` is built fresh from the two input documents on every run
//! and discarded at the end of it; nothing here survives between passes
//! except the `next_recheck` value the caller reads back out. Resources,
//! nodes and actions are keyed by their ID in ordered maps rather than
//! linked by owning pointers, so parent/child and predecessor/successor
//! relationships are always just another lookup away and never dangle.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::Diagnostics;
use crate::ids::{ActionId, ConstraintId, NodeId, OrderId, ResourceId, TagId, TicketId};
use crate::model::action::{Action, OrderingEdge};
use crate::model::cluster_options::ClusterOptions;
use crate::model::constraint::{
    ColocationConstraint, ColocationSetConstraint, LocationConstraint, OrderingConstraint,
    OrderingSetConstraint, Ticket, TicketConstraint,
};
use crate::model::node::Node;
use crate::model::resource::Resource;
use crate::time::Timestamp;

#[derive(Debug, Default)]
pub struct Constraints {
    pub locations: Vec<LocationConstraint>,
    pub colocations: Vec<ColocationConstraint>,
    pub orderings: Vec<OrderingConstraint>,
    pub ordering_sets: Vec<OrderingSetConstraint>,
    pub colocation_sets: Vec<ColocationSetConstraint>,
    pub tickets: Vec<TicketConstraint>,
}

/// All of a scheduling pass's state: parsed input, derived constraints, the
/// action/ordering graph under construction, and bookkeeping (counters,
/// diagnostics, the recheck accumulator).
#[derive(Debug)]
pub struct WorkingSet {
    pub now: Timestamp,

    pub nodes: BTreeMap<NodeId, Node>,
    pub resources: BTreeMap<ResourceId, Resource>,
    pub tickets: BTreeMap<TicketId, Ticket>,
    pub options: ClusterOptions,

    /// Tag and template membership, consulted only by the constraint
    /// unpacker to expand a tag reference in a resource set into its
    /// members; nothing downstream of unpacking looks a tag up again.
    pub tags: BTreeMap<TagId, Vec<ResourceId>>,

    pub constraints: Constraints,

    pub actions: BTreeMap<ActionId, Action>,
    pub action_keys: BTreeMap<crate::model::action::ActionKey, ActionId>,
    pub ordering_edges: Vec<OrderingEdge>,

    pub diagnostics: Diagnostics,
    pub next_recheck: Option<Timestamp>,

    next_action_id: u64,
    next_order_id: u64,
}

impl WorkingSet {
    pub fn new(now: Timestamp, options: ClusterOptions) -> Self {
        Self {
            now,
            nodes: BTreeMap::new(),
            resources: BTreeMap::new(),
            tickets: BTreeMap::new(),
            options,
            tags: BTreeMap::new(),
            constraints: Constraints::default(),
            actions: BTreeMap::new(),
            action_keys: BTreeMap::new(),
            ordering_edges: Vec::new(),
            diagnostics: Diagnostics::default(),
            next_recheck: None,
            next_action_id: 0,
            next_order_id: 0,
        }
    }

    pub fn alloc_action_id(&mut self) -> ActionId {
        let id = ActionId(self.next_action_id);
        self.next_action_id += 1;
        id
    }

    pub fn alloc_order_id(&mut self) -> OrderId {
        let id = OrderId(self.next_order_id);
        self.next_order_id += 1;
        id
    }

    /// Inserts `action` unless its key already exists, returning the id of
    /// whichever action now owns that key either way. Actions are never
    /// duplicated by key: a second attempt to create `(resource, task,
    /// interval)` just hands back the original.
    pub fn get_or_create_action(
        &mut self,
        key: crate::model::action::ActionKey,
        make: impl FnOnce(ActionId) -> Action,
    ) -> ActionId {
        if let Some(existing) = self.action_keys.get(&key) {
            return *existing;
        }
        let id = self.alloc_action_id();
        let action = make(id);
        self.action_keys.insert(key, id);
        self.actions.insert(id, action);
        id
    }

    pub fn add_ordering_edge(&mut self, edge: OrderingEdge) {
        self.ordering_edges.push(edge);
    }

    /// Folds a fresh next-recheck candidate into the running minimum, per
    /// the monotonicity requirement: the reported time is always the
    /// earliest future instant any rule evaluated during the pass implied.
    pub fn note_recheck(&mut self, candidate: Option<Timestamp>) {
        self.next_recheck = match (self.next_recheck, candidate) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };
    }

    pub fn constraint_ids_in_use(&self) -> BTreeSet<ConstraintId> {
        let mut ids = BTreeSet::new();
        ids.extend(self.constraints.locations.iter().map(|c| c.id.clone()));
        ids.extend(self.constraints.colocations.iter().map(|c| c.id.clone()));
        ids.extend(self.constraints.orderings.iter().map(|c| c.id.clone()));
        ids.extend(self.constraints.ordering_sets.iter().map(|c| c.id.clone()));
        ids.extend(self.constraints.colocation_sets.iter().map(|c| c.id.clone()));
        ids.extend(self.constraints.tickets.iter().map(|c| c.id.clone()));
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::action::{Action, ActionKey, Task};

    #[test]
    fn action_creation_is_idempotent_by_key() {
        let mut ws = WorkingSet::new(Timestamp(0), ClusterOptions::default());
        let key = ActionKey::resource(ResourceId::new("A"), Task::Start);
        let first = ws.get_or_create_action(key.clone(), |id| Action::new(id, key.clone(), None));
        let second = ws.get_or_create_action(key.clone(), |id| Action::new(id, key.clone(), None));
        assert_eq!(first, second);
        assert_eq!(ws.actions.len(), 1);
    }

    #[test]
    fn recheck_accumulates_the_minimum() {
        let mut ws = WorkingSet::new(Timestamp(0), ClusterOptions::default());
        ws.note_recheck(Some(Timestamp(100)));
        ws.note_recheck(Some(Timestamp(50)));
        ws.note_recheck(None);
        assert_eq!(ws.next_recheck, Some(Timestamp(50)));
    }
}
