//! Notification pseudo-actions for clones and promotable clones.
//!
//! A clone configured with `notify=true` wraps each role-transition task
//! (start/stop/promote/demote) that has at least one instance action this
//! pass in four pseudo-action phases — `pre-notify`, `pre-notify-done`, the
//! original instance actions, `post-notify`, `post-notify-done` — and emits
//! one `Notify` action per online instance per phase, carrying the
//! `notify_*_{resource,uname}` meta-attribute lists every instance's RA
//! invocation expects to see.

use std::collections::BTreeSet;

use crate::ids::{InstanceId, ResourceId};
use crate::model::action::{Action, ActionKey, PseudoKind, Task};
use crate::model::resource::{CloneInstance, Resource, ResourceVariant, Role};
use crate::model::working_set::WorkingSet;

pub fn build(ws: &mut WorkingSet) {
    let clone_ids: Vec<ResourceId> = ws
        .resources
        .iter()
        .filter(|(_, r)| r.variant.is_clone() && notify_enabled(r))
        .map(|(id, _)| id.clone())
        .collect();

    for clone_id in clone_ids {
        build_for_clone(ws, &clone_id);
    }
}

fn notify_enabled(r: &Resource) -> bool {
    r.flags.notify || r.meta.get("notify").map(|v| v == "true").unwrap_or(false)
}

fn build_for_clone(ws: &mut WorkingSet, clone_id: &ResourceId) {
    let Some(resource) = ws.resources.get(clone_id).cloned() else { return };
    let (child_id, instances) = match &resource.variant {
        ResourceVariant::Clone { instances, .. } | ResourceVariant::PromotableClone { instances, .. } => {
            let Some(child) = resource.children.first().cloned() else { return };
            (child, instances.clone())
        }
        _ => return,
    };

    for task in [Task::Start, Task::Stop, Task::Promote, Task::Demote] {
        let instance_actions: Vec<(InstanceId, crate::ids::ActionId)> = instances
            .iter()
            .filter_map(|instance| {
                let iid = InstanceId::new(&child_id, instance.index);
                let key = ActionKey::instance(iid.clone(), task.clone());
                ws.action_keys.get(&key).map(|id| (iid, *id))
            })
            .collect();
        if instance_actions.is_empty() {
            continue;
        }
        emit_notify_phase(ws, clone_id, &child_id, &task, &instances, &instance_actions);
    }
}

fn emit_notify_phase(
    ws: &mut WorkingSet,
    clone_id: &ResourceId,
    child_id: &ResourceId,
    task: &Task,
    instances: &[CloneInstance],
    instance_actions: &[(InstanceId, crate::ids::ActionId)],
) {
    let phase_name = format!("{clone_id}:{task:?}");

    let pre = anchor_action(ws, &format!("{phase_name}:pre-notify"), PseudoKind::PreNotify);
    let pre_done = anchor_action(ws, &format!("{phase_name}:pre-notify-done"), PseudoKind::PreNotifyDone);
    let post = anchor_action(ws, &format!("{phase_name}:post-notify"), PseudoKind::PostNotify);
    let post_done = anchor_action(ws, &format!("{phase_name}:post-notify-done"), PseudoKind::PostNotifyDone);

    link(ws, pre, pre_done);
    link(ws, pre_done, post);
    link(ws, post, post_done);

    for &(_, action_id) in instance_actions {
        link(ws, pre_done, action_id);
        link(ws, action_id, post);
    }

    let meta = notification_meta(child_id, task, instances);

    for instance in instances {
        let node_online = instance
            .allocated_node
            .as_ref()
            .or(instance.running_on.as_ref())
            .and_then(|n| ws.nodes.get(n))
            .map(|n| n.online)
            .unwrap_or(false);
        if !node_online {
            continue;
        }
        let iid = InstanceId::new(child_id, instance.index);

        let pre_notify_action = notify_action(ws, &iid, "pre", &meta);
        link(ws, pre, pre_notify_action);
        link(ws, pre_notify_action, pre_done);

        let post_notify_action = notify_action(ws, &iid, "post", &meta);
        link(ws, post, post_notify_action);
        link(ws, post_notify_action, post_done);
    }

    if matches!(task, Task::Stop) {
        order_fencing_stops_after_fence(ws, instance_actions, pre);
    }

    order_recurring_monitors_after(ws, child_id, instances, post_done);
}

fn anchor_action(ws: &mut WorkingSet, name: &str, kind: PseudoKind) -> crate::ids::ActionId {
    let key = ActionKey::anchor(name.to_string(), Task::Pseudo(kind));
    ws.get_or_create_action(key.clone(), |id| {
        let mut action = Action::new(id, key.clone(), None);
        action.flags.pseudo = true;
        action
    })
}

fn notify_action(ws: &mut WorkingSet, iid: &InstanceId, phase: &str, meta: &std::collections::BTreeMap<String, String>) -> crate::ids::ActionId {
    let anchor = format!("{iid}:notify:{phase}");
    let key = ActionKey::anchor(anchor, Task::Notify);
    ws.get_or_create_action(key.clone(), |id| {
        let mut action = Action::new(id, key.clone(), None);
        action.meta = meta.clone();
        action.meta.insert("notify_type".to_string(), phase.to_string());
        action
    })
}

fn link(ws: &mut WorkingSet, from: crate::ids::ActionId, to: crate::ids::ActionId) {
    ws.add_ordering_edge(crate::model::action::OrderingEdge {
        from,
        to,
        flags: crate::model::action::OrderFlags {
            implies_then: true,
            ..crate::model::action::OrderFlags::default()
        },
    });
}

/// Builds the ten `notify_*_{resource,uname}` list pairs broadcast to every
/// instance's notify action: the four task-indexed lists (which instances
/// are about to start/stop/promote/demote), the role-indexed lists (active,
/// inactive, promoted, unpromoted), and the availability lists (available,
/// all).
fn notification_meta(child_id: &ResourceId, task: &Task, instances: &[CloneInstance]) -> std::collections::BTreeMap<String, String> {
    let mut meta = std::collections::BTreeMap::new();
    meta.insert("notify_operation".to_string(), format!("{task:?}").to_lowercase());

    insert_category(&mut meta, "start", child_id, instances, |i| i.next_role == Role::Started && i.current_role != Role::Started);
    insert_category(&mut meta, "stop", child_id, instances, |i| i.next_role == Role::Stopped && i.current_role != Role::Stopped);
    insert_category(&mut meta, "promote", child_id, instances, |i| i.next_role == Role::Promoted && i.current_role != Role::Promoted);
    insert_category(&mut meta, "demote", child_id, instances, |i| i.current_role == Role::Promoted && i.next_role != Role::Promoted);
    insert_category(&mut meta, "active", child_id, instances, |i| matches!(i.next_role, Role::Started | Role::Unpromoted | Role::Promoted));
    insert_category(&mut meta, "inactive", child_id, instances, |i| i.next_role == Role::Stopped);
    insert_category(&mut meta, "promoted", child_id, instances, |i| i.next_role == Role::Promoted);
    insert_category(&mut meta, "unpromoted", child_id, instances, |i| i.next_role == Role::Unpromoted);
    insert_category(&mut meta, "available", child_id, instances, |i| i.allocated_node.is_some());
    insert_category(&mut meta, "all", child_id, instances, |_| true);

    meta
}

fn insert_category(
    meta: &mut std::collections::BTreeMap<String, String>,
    category: &str,
    child_id: &ResourceId,
    instances: &[CloneInstance],
    pred: impl Fn(&CloneInstance) -> bool,
) {
    let mut resources = BTreeSet::new();
    let mut unames = BTreeSet::new();
    for instance in instances.iter().filter(|i| pred(i)) {
        resources.insert(InstanceId::new(child_id, instance.index).to_string());
        if let Some(node) = instance.allocated_node.as_ref().or(instance.running_on.as_ref()) {
            unames.insert(node.to_string());
        }
    }
    meta.insert(format!("notify_{category}_resource"), resources.into_iter().collect::<Vec<_>>().join(" "));
    meta.insert(format!("notify_{category}_uname"), unames.into_iter().collect::<Vec<_>>().join(" "));
}

/// Stops rewritten into fencing pseudo-actions must still be notified, but
/// the notification phase itself waits for the fence to actually complete —
/// there is no point asking a fenced node's peers to prepare for a stop that
/// hasn't happened yet.
fn order_fencing_stops_after_fence(ws: &mut WorkingSet, instance_actions: &[(InstanceId, crate::ids::ActionId)], pre: crate::ids::ActionId) {
    let fence_nodes: Vec<crate::ids::NodeId> = instance_actions
        .iter()
        .filter_map(|(_, id)| {
            let action = ws.actions.get(id)?;
            if action.flags.implied_by_fencing {
                action.node.clone()
            } else {
                None
            }
        })
        .collect();
    for node in fence_nodes {
        let fence_key = ActionKey::node(node, Task::Fence);
        if let Some(fence_id) = ws.action_keys.get(&fence_key).copied() {
            link(ws, fence_id, pre);
        }
    }
}

fn order_recurring_monitors_after(ws: &mut WorkingSet, child_id: &ResourceId, instances: &[CloneInstance], post_done: crate::ids::ActionId) {
    for instance in instances {
        let iid = InstanceId::new(child_id, instance.index);
        let monitor_ids: Vec<crate::ids::ActionId> = ws
            .action_keys
            .iter()
            .filter(|(key, _)| key.subject == crate::model::action::ActionSubject::Instance(iid.clone()) && key.task == Task::Monitor && key.interval_ms > 0)
            .map(|(_, id)| *id)
            .collect();
        for monitor_id in monitor_ids {
            link(ws, post_done, monitor_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::NodeId;
    use crate::model::cluster_options::ClusterOptions;
    use crate::model::node::{Node, NodeKind};
    use crate::model::resource::{CloneSpec, ResourceFlags};
    use crate::time::Timestamp;

    fn make_clone(ws: &mut WorkingSet) -> ResourceId {
        let clone_id = ResourceId::new("web-clone");
        let child_id = ResourceId::new("web");
        let node = NodeId::new("n1");
        ws.nodes.insert(node.clone(), {
            let mut n = Node::new(node.clone(), NodeKind::ClusterMember);
            n.online = true;
            n
        });

        let mut child = Resource::new(child_id.clone(), ResourceVariant::Primitive);
        child.parent = Some(clone_id.clone());
        ws.resources.insert(child_id.clone(), child);

        let mut instance = CloneInstance::new(0);
        instance.allocated_node = Some(node.clone());
        instance.current_role = Role::Stopped;
        instance.next_role = Role::Started;

        let mut clone_resource = Resource::new(clone_id.clone(), ResourceVariant::Clone {
            spec: CloneSpec::default(),
            instances: vec![instance],
        });
        clone_resource.children = vec![child_id.clone()];
        clone_resource.flags = ResourceFlags { notify: true, ..ResourceFlags::default() };
        ws.resources.insert(clone_id.clone(), clone_resource);

        let start_key = ActionKey::instance(InstanceId::new(&child_id, 0), Task::Start);
        ws.get_or_create_action(start_key.clone(), |id| Action::new(id, start_key.clone(), Some(node.clone())));

        clone_id
    }

    #[test]
    fn notify_enabled_clone_gets_four_phase_pseudo_actions() {
        let mut ws = WorkingSet::new(Timestamp(0), ClusterOptions::default());
        make_clone(&mut ws);

        build(&mut ws);

        let pseudo_count = ws
            .actions
            .values()
            .filter(|a| matches!(a.key.task, Task::Pseudo(_)))
            .count();
        assert_eq!(pseudo_count, 4);

        let notify_count = ws.actions.values().filter(|a| a.key.task == Task::Notify).count();
        assert_eq!(notify_count, 2);
    }

    #[test]
    fn notify_disabled_clone_gets_nothing() {
        let mut ws = WorkingSet::new(Timestamp(0), ClusterOptions::default());
        let clone_id = make_clone(&mut ws);
        if let Some(r) = ws.resources.get_mut(&clone_id) {
            r.flags.notify = false;
        }

        build(&mut ws);

        assert!(ws.actions.values().all(|a| !matches!(a.key.task, Task::Pseudo(_))));
    }
}
