//! Produces the actions that move each resource from its current role to
//! its allocated next role: starts, stops, promotes, demotes, migrations,
//! startup probes, recurring monitors and fencing pseudo-actions.

use std::collections::BTreeSet;

use crate::ids::{InstanceId, NodeId, ResourceId};
use crate::model::action::{Action, ActionKey, Task};
use crate::model::resource::{ResourceVariant, Role};
use crate::model::working_set::WorkingSet;

/// Walks every resource in the working set and emits the actions implied by
/// its (current_role, next_role, running_on, allocated_node) state, plus
/// fencing pseudo-actions for any unclean node. Ordering edges between the
/// actions produced here are added later, by the ordering engine; this
/// stage only establishes which actions exist and on which node.
pub fn generate(ws: &mut WorkingSet) {
    generate_fencing(ws);

    let resource_ids: Vec<ResourceId> = ws.resources.keys().cloned().collect();
    for resource_id in resource_ids {
        let variant_is_clone = ws
            .resources
            .get(&resource_id)
            .map(|r| r.variant.is_clone())
            .unwrap_or(false);
        if variant_is_clone {
            generate_for_clone(ws, &resource_id);
        } else if ws
            .resources
            .get(&resource_id)
            .map(|r| r.parent.is_none())
            .unwrap_or(false)
        {
            generate_for_primitive_or_group(ws, &resource_id);
        }
    }
}

fn fenced_nodes(ws: &WorkingSet) -> BTreeSet<NodeId> {
    if !ws.options.stonith_enabled {
        return BTreeSet::new();
    }
    ws.nodes
        .iter()
        .filter(|(_, n)| n.unclean)
        .map(|(id, _)| id.clone())
        .collect()
}

fn generate_fencing(ws: &mut WorkingSet) {
    let fenced = fenced_nodes(ws);
    for node_id in fenced {
        let key = ActionKey::node(node_id.clone(), Task::Fence);
        ws.get_or_create_action(key, |id| {
            let mut action = Action::new(id, ActionKey::node(node_id.clone(), Task::Fence), Some(node_id.clone()));
            action.priority = i64::MAX;
            action
        });
    }
}

/// True when `node` is about to be fenced this pass, the trigger for
/// rewriting an in-flight stop into a pseudo-action implied by fencing.
fn node_is_fenced(ws: &WorkingSet, node: &NodeId) -> bool {
    ws.options.stonith_enabled && ws.nodes.get(node).map(|n| n.unclean).unwrap_or(false)
}

fn generate_for_primitive_or_group(ws: &mut WorkingSet, resource_id: &ResourceId) {
    let children: Vec<ResourceId> = ws
        .resources
        .get(resource_id)
        .map(|r| r.children.clone())
        .unwrap_or_default();

    if children.is_empty() {
        generate_transition(ws, resource_id, None);
        let (node, rest_role) = ws
            .resources
            .get(resource_id)
            .map(|r| (r.allocated_node.clone(), r.next_role.unwrap_or(Role::Stopped)))
            .unwrap_or((None, Role::Stopped));
        generate_probes_and_monitors(ws, resource_id, None, node, rest_role);
    } else {
        for child_id in &children {
            generate_transition(ws, child_id, None);
            let (node, rest_role) = ws
                .resources
                .get(child_id)
                .map(|r| (r.allocated_node.clone(), r.next_role.unwrap_or(Role::Stopped)))
                .unwrap_or((None, Role::Stopped));
            generate_probes_and_monitors(ws, child_id, None, node, rest_role);
        }
    }
}

fn generate_for_clone(ws: &mut WorkingSet, resource_id: &ResourceId) {
    let instances = match ws.resources.get(resource_id).map(|r| r.variant.clone()) {
        Some(ResourceVariant::Clone { instances, .. })
        | Some(ResourceVariant::PromotableClone { instances, .. }) => instances,
        _ => return,
    };
    let child_id = ws
        .resources
        .get(resource_id)
        .and_then(|r| r.children.first().cloned());

    let Some(child_id) = child_id else { return };

    for instance in &instances {
        let instance_id = InstanceId::new(&child_id, instance.index);
        generate_transition(
            ws,
            &child_id,
            Some((instance_id.clone(), instance.allocated_node.clone(), instance.next_role)),
        );
        generate_probes_and_monitors(ws, &child_id, Some(instance_id), instance.allocated_node.clone(), instance.next_role);
    }

    // A clone instance that used to run on a node no longer in this pass's
    // assignment (the clone shrank, or the node went away) has no
    // surviving `InstanceId` to hang a stop off of; it gets a plain
    // resource-keyed stop instead, same as a singleton leaving its node.
    let assigned: BTreeSet<NodeId> = instances.iter().filter_map(|i| i.allocated_node.clone()).collect();
    let orphaned: Vec<NodeId> = ws
        .resources
        .get(&child_id)
        .map(|r| r.running_on.iter().filter(|n| !assigned.contains(*n)).cloned().collect())
        .unwrap_or_default();
    for node in orphaned {
        emit_stop(ws, ActionKey::resource(child_id.clone(), Task::Stop), node);
    }
}

/// Emits the actions for one resource's role transition per the standard
/// matrix: stop/start/promote/demote, migration in place of stop+start when
/// permitted, and a probe first when the resource's state on a node is
/// unknown.
fn generate_transition(
    ws: &mut WorkingSet,
    resource_id: &ResourceId,
    instance: Option<(InstanceId, Option<NodeId>, Role)>,
) {
    let Some(resource) = ws.resources.get(resource_id).cloned() else {
        return;
    };

    // A clone instance's current role is derived per-node: the shared
    // `Resource.running_on`/`current_role` fields describe the resource as a
    // whole across every node it's reported on, which is meaningless once
    // more than one instance can be running. An instance is only "already
    // there" if its own target node is among the nodes the resource is
    // actually running on; every other instance starts from `Stopped` and
    // never migrates, since a clone instance's node never moves out from
    // under it — allocation either keeps it or drops it.
    let (current_role, next_role, target_node, running_elsewhere): (Role, Role, Option<NodeId>, Vec<NodeId>) = match &instance {
        Some((_, node, inst_next_role)) => {
            let running_here = node.as_ref().map(|n| resource.running_on.contains(n)).unwrap_or(false);
            let current = if running_here { resource.current_role } else { Role::Stopped };
            (current, *inst_next_role, node.clone(), Vec::new())
        }
        None => {
            let next = resource.next_role.unwrap_or(Role::Stopped);
            let target = resource.allocated_node.clone();
            let elsewhere = resource
                .running_on
                .iter()
                .filter(|n| Some((*n).clone()) != target)
                .cloned()
                .collect();
            (resource.current_role, next, target, elsewhere)
        }
    };

    let subject = |task: Task| -> ActionKey {
        match &instance {
            Some((instance_id, _, _)) => ActionKey::instance(instance_id.clone(), task),
            None => ActionKey::resource(resource_id.clone(), task),
        }
    };

    match (current_role, next_role) {
        (Role::Stopped, Role::Started)
        | (Role::Unknown, Role::Started)
        | (Role::Stopped, Role::Unpromoted)
        | (Role::Unknown, Role::Unpromoted) => {
            if let Some(node) = &target_node {
                create_action(ws, subject(Task::Start), Some(node.clone()));
            }
        }
        (Role::Stopped, Role::Promoted) | (Role::Unknown, Role::Promoted) => {
            if let Some(node) = &target_node {
                create_action(ws, subject(Task::Start), Some(node.clone()));
                create_action(ws, subject(Task::Promote), Some(node.clone()));
            }
        }
        (Role::Started, Role::Stopped) | (Role::Promoted, Role::Stopped) | (Role::Unpromoted, Role::Stopped) => {
            for node in &running_elsewhere {
                emit_stop(ws, subject(Task::Stop), node.clone());
            }
        }
        (Role::Unpromoted, Role::Promoted) => {
            if let Some(node) = &target_node {
                create_action(ws, subject(Task::Promote), Some(node.clone()));
            }
        }
        (Role::Promoted, Role::Unpromoted) => {
            if let Some(node) = &target_node {
                create_action(ws, subject(Task::Demote), Some(node.clone()));
            }
        }
        _ => {
            if let (Some(node), true) = (&target_node, !running_elsewhere.is_empty()) {
                if resource.flags.allow_migrate && running_elsewhere.len() == 1 {
                    let instance_id = instance.as_ref().map(|(iid, _, _)| iid.clone());
                    emit_migration(ws, resource_id, instance_id, running_elsewhere[0].clone(), node.clone());
                } else {
                    for old_node in &running_elsewhere {
                        emit_stop(ws, subject(Task::Stop), old_node.clone());
                    }
                    create_action(ws, subject(Task::Start), Some(node.clone()));
                }
            }
        }
    }
}

fn emit_stop(ws: &mut WorkingSet, key: ActionKey, node: NodeId) {
    if node_is_fenced(ws, &node) {
        let id = ws.get_or_create_action(key.clone(), |id| {
            let mut action = Action::new(id, key.clone(), Some(node.clone()));
            action.flags.implied_by_fencing = true;
            action.flags.pseudo = true;
            action
        });
        let fence_key = ActionKey::node(node.clone(), Task::Fence);
        if let Some(fence_id) = ws.action_keys.get(&fence_key).copied() {
            if let Some(action) = ws.actions.get_mut(&id) {
                action.predecessors.insert(fence_id);
            }
        }
    } else {
        create_action(ws, key, Some(node));
    }
}

fn emit_migration(
    ws: &mut WorkingSet,
    resource_id: &ResourceId,
    instance: Option<InstanceId>,
    from: NodeId,
    to: NodeId,
) {
    let subject = |task: Task| -> ActionKey {
        match &instance {
            Some(instance_id) => ActionKey::instance(instance_id.clone(), task),
            None => ActionKey::resource(resource_id.clone(), task),
        }
    };

    create_action(ws, subject(Task::MigrateTo), Some(from.clone()));
    create_action(ws, subject(Task::MigrateFrom), Some(to.clone()));

    // Phantom stop/start mirrors: ordering consults these to reproduce the
    // constraint edges a plain stop+start would have had, but they are
    // flagged so no executor ever receives them.
    let stop_id = ws.get_or_create_action(subject(Task::Stop), |id| {
        let mut action = Action::new(id, subject(Task::Stop), Some(from));
        action.flags.phantom = true;
        action
    });
    let start_id = ws.get_or_create_action(subject(Task::Start), |id| {
        let mut action = Action::new(id, subject(Task::Start), Some(to));
        action.flags.phantom = true;
        action
    });
    let _ = (stop_id, start_id);
}

fn create_action(ws: &mut WorkingSet, key: ActionKey, node: Option<NodeId>) -> crate::ids::ActionId {
    ws.get_or_create_action(key.clone(), |id| Action::new(id, key.clone(), node))
}

fn generate_probes_and_monitors(
    ws: &mut WorkingSet,
    resource_id: &ResourceId,
    instance: Option<InstanceId>,
    target_node: Option<NodeId>,
    rest_role: Role,
) {
    let Some(resource) = ws.resources.get(resource_id).cloned() else {
        return;
    };

    // A clone instance names one specific (resource, node) slot, unlike a
    // singleton, which may still be running on any node it's allowed on
    // until a probe says otherwise — so a clone instance only ever probes
    // its own assigned node, never the child resource's whole allowed set.
    if ws.options.enable_startup_probes && resource.current_role == Role::Unknown {
        match &instance {
            Some(instance_id) => {
                if let Some(node) = &target_node {
                    create_action(ws, ActionKey::instance(instance_id.clone(), Task::Monitor), Some(node.clone()));
                }
            }
            None => {
                for (node_id, _) in resource.allowed_nodes.iter() {
                    create_action(ws, ActionKey::monitor(resource_id.clone(), 0), Some(node_id.clone()));
                }
            }
        }
    }

    let Some(rest_node) = target_node else {
        return;
    };
    if rest_role == Role::Stopped {
        return;
    }

    for op in resource
        .operations
        .iter()
        .filter(|op| op.interval_ms > 0)
        .filter(|op| op.role.map(|r| r == rest_role).unwrap_or(true))
    {
        let key = match &instance {
            Some(instance_id) => ActionKey::instance(instance_id.clone(), Task::Monitor).with_interval(op.interval_ms),
            None => ActionKey::monitor(resource_id.clone(), op.interval_ms),
        };
        create_action(ws, key, Some(rest_node.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::NodeId as Nid;
    use crate::model::cluster_options::ClusterOptions;
    use crate::model::node::{Node, NodeKind};
    use crate::model::resource::{Resource, ResourceVariant};
    use crate::time::Timestamp;

    #[test]
    fn stopped_resource_with_allocation_gets_a_start() {
        let mut ws = WorkingSet::new(Timestamp(0), ClusterOptions::default());
        ws.nodes.insert(Nid::new("n1"), Node::new(Nid::new("n1"), NodeKind::ClusterMember));
        let id = ResourceId::new("A");
        let mut resource = Resource::new(id.clone(), ResourceVariant::Primitive);
        resource.allocated_node = Some(Nid::new("n1"));
        resource.next_role = Some(Role::Started);
        ws.resources.insert(id.clone(), resource);

        generate(&mut ws);

        let has_start = ws
            .actions
            .values()
            .any(|a| a.key.task == Task::Start && a.node == Some(Nid::new("n1")));
        assert!(has_start);
    }
}
