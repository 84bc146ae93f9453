//! Turns the raw constraints the XML layer produced into the form the
//! placement and ordering engines consume: tag references expanded into
//! concrete resource members, and any constraint naming a resource that
//! doesn't exist dropped with a diagnostic rather than carried forward to
//! trip up a later stage.

use crate::ids::{ResourceId, TagId};
use crate::model::constraint::{LossPolicy, ResourceSet};
use crate::model::resource::TicketEffect;
use crate::model::working_set::WorkingSet;

/// Runs tag expansion and reference validation over every constraint kind.
/// Order matters: sets must be expanded before validation, since validation
/// only ever looks at concrete resource IDs. Ticket loss-policy runs last,
/// since it stamps resources with the (already-validated) tickets bound to
/// them, for placement to consult without any ticket-specific logic of its
/// own.
pub fn unpack(ws: &mut WorkingSet) {
    expand_tags(ws);
    validate_references(ws);
    apply_ticket_effects(ws);
}

/// A ticket is active when it is granted and not held in standby; anything
/// else (including a ticket never reported by status at all) is a loss for
/// every resource bound to it, per the ticket state machine: `Granted ->
/// Active`, `Revoked -> {Stop | Demote | Freeze | Fence}` per loss-policy.
fn ticket_is_active(ws: &WorkingSet, ticket_id: &crate::ids::TicketId) -> bool {
    ws.tickets
        .get(ticket_id)
        .map(|t| t.granted && !t.standby)
        .unwrap_or(false)
}

fn apply_ticket_effects(ws: &mut WorkingSet) {
    let bindings = ws.constraints.tickets.clone();
    for binding in &bindings {
        if ticket_is_active(ws, &binding.ticket) {
            continue;
        }
        let effect = match binding.loss_policy {
            LossPolicy::Stop => TicketEffect::Stop,
            LossPolicy::Demote => TicketEffect::Demote,
            LossPolicy::Freeze => TicketEffect::Freeze,
            LossPolicy::Fence => TicketEffect::Fence,
        };
        if let Some(resource) = ws.resources.get_mut(&binding.resource) {
            resource.ticket_effect = Some(effect);
        }
        if matches!(effect, TicketEffect::Fence) {
            mark_running_nodes_unclean(ws, &binding.resource);
        }
    }
}

/// `loss-policy=fence` folds into the ordinary fencing machinery: the
/// node(s) currently running the resource are marked unclean so the action
/// factory's existing fencing path (stonith pseudo-action, stop rewritten
/// to "implied by fencing") picks them up without any ticket-specific code
/// downstream of this pass.
fn mark_running_nodes_unclean(ws: &mut WorkingSet, resource_id: &ResourceId) {
    let running_on: Vec<_> = ws
        .resources
        .get(resource_id)
        .map(|r| r.running_on.iter().cloned().collect())
        .unwrap_or_default();
    for node_id in running_on {
        if let Some(node) = ws.nodes.get_mut(&node_id) {
            node.unclean = true;
        }
    }
}

fn expand_set(set: &mut ResourceSet, ws: &WorkingSet) {
    let mut expanded = Vec::with_capacity(set.members.len());
    for member in &set.members {
        let tag_id = TagId::new(member.as_str());
        match ws.tags.get(&tag_id) {
            Some(members) => expanded.extend(members.iter().cloned()),
            None => expanded.push(member.clone()),
        }
    }
    set.members = expanded;
}

fn expand_tags(ws: &mut WorkingSet) {
    let mut ordering_sets = std::mem::take(&mut ws.constraints.ordering_sets);
    for constraint in &mut ordering_sets {
        for set in &mut constraint.sets {
            expand_set(set, ws);
        }
    }
    ws.constraints.ordering_sets = ordering_sets;

    let mut colocation_sets = std::mem::take(&mut ws.constraints.colocation_sets);
    for constraint in &mut colocation_sets {
        for set in &mut constraint.sets {
            expand_set(set, ws);
        }
    }
    ws.constraints.colocation_sets = colocation_sets;
}

fn resource_exists(ws: &WorkingSet, id: &ResourceId) -> bool {
    ws.resources.contains_key(id)
}

fn validate_references(ws: &mut WorkingSet) {
    let mut diagnostics = Vec::new();

    ws.constraints.locations.retain(|c| {
        let ok = resource_exists(ws, &c.resource);
        if !ok {
            diagnostics.push((c.id.clone(), format!("rsc_location references unknown resource {}", c.resource)));
        }
        ok
    });

    ws.constraints.colocations.retain(|c| {
        let ok = resource_exists(ws, &c.dependent) && resource_exists(ws, &c.primary);
        if !ok {
            diagnostics.push((
                c.id.clone(),
                format!(
                    "rsc_colocation references unknown resource ({}, {})",
                    c.dependent, c.primary
                ),
            ));
        }
        ok
    });

    ws.constraints.orderings.retain(|c| {
        let ok = resource_exists(ws, &c.first) && resource_exists(ws, &c.then);
        if !ok {
            diagnostics.push((
                c.id.clone(),
                format!("rsc_order references unknown resource ({}, {})", c.first, c.then),
            ));
        }
        ok
    });

    ws.constraints.tickets.retain(|c| {
        let ok = resource_exists(ws, &c.resource);
        if !ok {
            diagnostics.push((c.id.clone(), format!("rsc_ticket references unknown resource {}", c.resource)));
        }
        ok
    });

    for set_constraint in &ws.constraints.ordering_sets {
        for set in &set_constraint.sets {
            for member in &set.members {
                if !resource_exists(ws, member) {
                    diagnostics.push((
                        set_constraint.id.clone(),
                        format!("rsc_order resource_set references unknown resource {member}"),
                    ));
                }
            }
        }
    }
    for set_constraint in &ws.constraints.colocation_sets {
        for set in &set_constraint.sets {
            for member in &set.members {
                if !resource_exists(ws, member) {
                    diagnostics.push((
                        set_constraint.id.clone(),
                        format!("rsc_colocation resource_set references unknown resource {member}"),
                    ));
                }
            }
        }
    }

    for (id, message) in diagnostics {
        ws.diagnostics.config_error(Some(id), message);
    }
}
