//! Assembles the finished action/ordering graph into the flat, serializable
//! shape the XML writer consumes: one record per surviving action, with its
//! hard predecessor set resolved to concrete IDs.

use std::collections::{BTreeMap, BTreeSet};

use crate::ids::ActionId;
use crate::model::action::{ActionSubject, PseudoKind, Task};
use crate::model::working_set::WorkingSet;

#[derive(Clone, Debug)]
pub struct EmittedAction {
    pub id: ActionId,
    pub subject: String,
    pub task: String,
    pub node: Option<String>,
    pub interval_ms: u64,
    pub priority: i64,
    pub timeout_ms: u64,
    pub meta: BTreeMap<String, String>,
    pub predecessors: Vec<ActionId>,
}

/// Builds the emitted action list from a working set whose actions and
/// ordering edges are fully resolved. Pseudo-actions left with neither a
/// predecessor nor a successor are pure dead ordering anchors and are
/// dropped; every other action, real or pseudo, survives into the output.
pub fn emit(ws: &WorkingSet) -> Vec<EmittedAction> {
    let mut predecessors: BTreeMap<ActionId, BTreeSet<ActionId>> = BTreeMap::new();
    let mut has_successor: BTreeSet<ActionId> = BTreeSet::new();

    for edge in &ws.ordering_edges {
        if !crate::ordering::is_hard_edge(&edge.flags) {
            continue;
        }
        predecessors.entry(edge.to).or_default().insert(edge.from);
        has_successor.insert(edge.from);
    }

    let mut emitted = Vec::new();
    for (id, action) in &ws.actions {
        let mut preds = predecessors.get(id).cloned().unwrap_or_default();
        // Fencing rewrites a stop into a pseudo-action ordered after the
        // fence directly on the action, bypassing the ordering-edge list.
        preds.extend(&action.predecessors);
        if !action.predecessors.is_empty() {
            has_successor.extend(action.predecessors.iter().copied());
        }
        if action.is_pseudo() && preds.is_empty() && !has_successor.contains(id) {
            continue;
        }
        emitted.push(EmittedAction {
            id: *id,
            subject: format_subject(&action.key.subject),
            task: format_task(&action.key.task),
            node: action.node.as_ref().map(|n| n.to_string()),
            interval_ms: action.key.interval_ms,
            priority: action.priority,
            timeout_ms: action.timeout_ms,
            meta: action.meta.clone(),
            predecessors: preds.into_iter().collect(),
        });
    }
    emitted.sort_by_key(|a| a.id);
    emitted
}

fn format_subject(subject: &ActionSubject) -> String {
    match subject {
        ActionSubject::Resource(id) => id.to_string(),
        ActionSubject::Instance(id) => id.to_string(),
        ActionSubject::Node(id) => format!("node:{id}"),
        ActionSubject::Anchor(name) => name.clone(),
    }
}

fn format_task(task: &Task) -> String {
    match task {
        Task::Start => "start".to_string(),
        Task::Stop => "stop".to_string(),
        Task::Promote => "promote".to_string(),
        Task::Demote => "demote".to_string(),
        Task::Monitor => "monitor".to_string(),
        Task::MigrateTo => "migrate_to".to_string(),
        Task::MigrateFrom => "migrate_from".to_string(),
        Task::Notify => "notify".to_string(),
        Task::Notified => "notified".to_string(),
        Task::Cancel => "cancel".to_string(),
        Task::Fence => "stonith".to_string(),
        Task::Pseudo(kind) => format!("pseudo:{}", format_pseudo(kind)),
    }
}

fn format_pseudo(kind: &PseudoKind) -> &'static str {
    match kind {
        PseudoKind::PreNotify => "pre-notify",
        PseudoKind::PreNotifyDone => "pre-notify-done",
        PseudoKind::PostNotify => "post-notify",
        PseudoKind::PostNotifyDone => "post-notify-done",
        PseudoKind::RelaxedCloneMin => "relaxed-clone-min",
        PseudoKind::OneOrMore => "one-or-more",
        PseudoKind::Stonith => "stonith-complete",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{NodeId, ResourceId};
    use crate::model::action::{Action, ActionFlags, ActionKey};
    use crate::model::cluster_options::ClusterOptions;
    use crate::time::Timestamp;

    #[test]
    fn dangling_pseudo_action_is_dropped() {
        let mut ws = WorkingSet::new(Timestamp(0), ClusterOptions::default());
        let key = ActionKey::anchor("orphan", Task::Pseudo(PseudoKind::OneOrMore));
        let id = ws.alloc_action_id();
        let mut action = Action::new(id, key, None);
        action.flags = ActionFlags { pseudo: true, ..ActionFlags::default() };
        ws.actions.insert(id, action);

        assert!(emit(&ws).is_empty());
    }

    #[test]
    fn real_action_with_no_edges_survives() {
        let mut ws = WorkingSet::new(Timestamp(0), ClusterOptions::default());
        let key = ActionKey::resource(ResourceId::new("A"), Task::Start);
        let id = ws.alloc_action_id();
        let action = Action::new(id, key, Some(NodeId::new("n1")));
        ws.actions.insert(id, action);

        let emitted = emit(&ws);
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].node.as_deref(), Some("n1"));
    }
}
