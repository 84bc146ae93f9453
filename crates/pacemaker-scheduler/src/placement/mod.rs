//! Allocates each resource to a node: the location score vector, stickiness,
//! failure penalties, node health, colocation propagation and, for clones,
//! per-instance and per-role assignment.

use std::collections::BTreeMap;

use regex::Regex;

use crate::ids::{NodeId, ResourceId};
use crate::model::cluster_options::NodeHealthStrategy;
use crate::model::constraint::{ColocationConstraint, LocationConstraint};
use crate::model::node::Node;
use crate::model::resource::{CloneInstance, Resource, ResourceVariant, Role};
use crate::model::score::{is_banned, score_add, ScoreValue, SCORE_INFINITY, SCORE_NEG_INFINITY};
use crate::model::working_set::WorkingSet;
use crate::rules::RuleOutcome;

/// Runs placement over every resource in the working set, in priority order.
/// Resource `allocated_node` (and, for clones, per-instance assignment) is
/// filled in directly on `ws.resources`; resources with no viable node are
/// left unallocated and a diagnostic is recorded.
pub fn allocate(ws: &mut WorkingSet) {
    let order = processing_order(ws);
    let mut placed_on: BTreeMap<ResourceId, Vec<NodeId>> = BTreeMap::new();

    for resource_id in order {
        if apply_ticket_override(ws, &resource_id, &mut placed_on) {
            continue;
        }

        let candidates = candidate_nodes(ws, &resource_id, &placed_on);
        let variant_is_clone = ws
            .resources
            .get(&resource_id)
            .map(|r| r.variant.is_clone())
            .unwrap_or(false);

        if variant_is_clone {
            allocate_clone(ws, &resource_id, candidates, &mut placed_on);
        } else {
            allocate_singleton(ws, &resource_id, candidates, &mut placed_on);
        }
    }
}

/// Handles `Stop`/`Freeze`/`Fence` ticket effects (stamped by the constraint
/// unpacker) before any score is computed, bypassing the ordinary placement
/// entirely. Returns `true` when the resource is fully handled and should
/// not go through [`candidate_nodes`]/[`allocate_singleton`]/[`allocate_clone`]
/// at all. `Demote` is not handled here: it only changes a promotable
/// clone's role assignment, so it is left for `allocate_clone` to apply
/// after ordinary scoring runs; on a non-clone resource (which has no
/// demoted role to fall back to) it is treated the same as `Stop`.
fn apply_ticket_override(
    ws: &mut WorkingSet,
    resource_id: &ResourceId,
    placed_on: &mut BTreeMap<ResourceId, Vec<NodeId>>,
) -> bool {
    let Some(resource) = ws.resources.get(resource_id) else {
        return false;
    };
    let Some(effect) = resource.ticket_effect else {
        return false;
    };
    let is_clone = resource.variant.is_clone();

    match effect {
        crate::model::resource::TicketEffect::Demote if is_clone => false,
        crate::model::resource::TicketEffect::Demote
        | crate::model::resource::TicketEffect::Stop
        | crate::model::resource::TicketEffect::Fence => {
            placed_on.insert(resource_id.clone(), Vec::new());
            if let Some(resource) = ws.resources.get_mut(resource_id) {
                resource.allocated_node = None;
                resource.next_role = Some(Role::Stopped);
            }
            true
        }
        crate::model::resource::TicketEffect::Freeze => {
            let current_node = resource.running_on.iter().next().cloned();
            let current_role = resource.current_role;
            placed_on.insert(resource_id.clone(), current_node.iter().cloned().collect());
            if let Some(resource) = ws.resources.get_mut(resource_id) {
                resource.allocated_node = current_node;
                resource.next_role = Some(if current_role == Role::Unknown {
                    Role::Stopped
                } else {
                    current_role
                });
            }
            true
        }
    }
}

fn processing_order(ws: &WorkingSet) -> Vec<ResourceId> {
    let mut ids: Vec<ResourceId> = ws
        .resources
        .iter()
        .filter(|(_, r)| r.parent.is_none())
        .map(|(id, _)| id.clone())
        .collect();
    ids.sort_by(|a, b| {
        let ra = &ws.resources[a];
        let rb = &ws.resources[b];
        rb.priority
            .cmp(&ra.priority)
            .then(ra.variant.allocation_rank().cmp(&rb.variant.allocation_rank()))
            .then(a.cmp(b))
    });
    ids
}

/// Computes the final score for every node the cluster knows about, for a
/// single (non-clone) resource, honoring location constraints (literal and
/// rule-evaluated), stickiness, failure penalties, node health and
/// colocation with already-placed primaries.
fn candidate_nodes(
    ws: &mut WorkingSet,
    resource_id: &ResourceId,
    placed_on: &BTreeMap<ResourceId, Vec<NodeId>>,
) -> BTreeMap<NodeId, ScoreValue> {
    let mut scores: BTreeMap<NodeId, ScoreValue> = ws
        .nodes
        .iter()
        .filter(|(_, n)| n.can_run_new_work())
        .map(|(id, _)| (id.clone(), 0))
        .collect();

    apply_location_constraints(ws, resource_id, &mut scores);
    apply_stickiness_and_health(ws, resource_id, &mut scores);
    apply_colocation(ws, resource_id, placed_on, &mut scores);

    scores
}

fn apply_location_constraints(
    ws: &mut WorkingSet,
    resource_id: &ResourceId,
    scores: &mut BTreeMap<NodeId, ScoreValue>,
) {
    let locations: Vec<LocationConstraint> = ws
        .constraints
        .locations
        .iter()
        .filter(|c| &c.resource == resource_id)
        .cloned()
        .collect();

    for location in &locations {
        if let Some(node) = &location.node {
            if let Some(score) = scores.get_mut(node) {
                *score = score_add(*score, location.score);
            }
            continue;
        }

        let node_ids: Vec<NodeId> = scores.keys().cloned().collect();
        let mut per_node_score: BTreeMap<NodeId, Option<ScoreValue>> = BTreeMap::new();
        for node_id in &node_ids {
            let attributes = ws
                .nodes
                .get(node_id)
                .map(|n| n.attributes.clone())
                .unwrap_or_default();
            let mut combined_pass = true;
            let mut accumulated: ScoreValue = 0;
            let mut any_pass = false;
            for clause in &location.rules {
                let outcome: RuleOutcome = clause.expr.evaluate(ws.now, &attributes);
                ws.note_recheck(outcome.next_change);
                match location.boolean_op {
                    crate::model::constraint::BooleanOp::And => {
                        if !outcome.value {
                            combined_pass = false;
                        }
                    }
                    crate::model::constraint::BooleanOp::Or => {
                        if outcome.value {
                            any_pass = true;
                            accumulated = score_add(accumulated, clause.score);
                        }
                    }
                }
            }
            let final_score = match location.boolean_op {
                crate::model::constraint::BooleanOp::And => {
                    if combined_pass {
                        Some(location.rules.iter().fold(0, |acc, c| score_add(acc, c.score)))
                    } else {
                        None
                    }
                }
                crate::model::constraint::BooleanOp::Or => {
                    if any_pass {
                        Some(accumulated)
                    } else {
                        None
                    }
                }
            };
            per_node_score.insert(node_id.clone(), final_score);
        }

        for (node_id, maybe_score) in per_node_score {
            let Some(mut rule_score) = maybe_score else { continue };
            if let Some(attribute) = &location.score_attribute {
                rule_score = score_attribute_value(ws, resource_id, &node_id, attribute, location.score_attribute_pattern.as_deref())
                    .unwrap_or(0);
            }
            if let Some(score) = scores.get_mut(&node_id) {
                *score = score_add(*score, rule_score);
            }
        }
    }
}

/// Reads a per-node attribute as the effective score for a rule-based
/// location constraint's `score-attribute`. When `pattern` is set, it is
/// matched against the resource id and any `%N` back-reference in
/// `attribute` is filled in from the pattern's capture groups before the
/// attribute lookup — e.g. `score-attribute-pattern="(.*)-vip"` with
/// `score-attribute="prefer-%1"` on resource `cluster-vip` reads the node
/// attribute `prefer-cluster`.
fn score_attribute_value(
    ws: &WorkingSet,
    resource_id: &ResourceId,
    node_id: &NodeId,
    attribute: &str,
    pattern: Option<&str>,
) -> Option<ScoreValue> {
    let resolved_name = match pattern.and_then(|p| Regex::new(p).ok()) {
        Some(re) => match re.captures(resource_id.as_str()) {
            Some(caps) => {
                let mut name = attribute.to_string();
                for i in 1..caps.len() {
                    if let Some(group) = caps.get(i) {
                        name = name.replace(&format!("%{i}"), group.as_str());
                    }
                }
                name
            }
            None => attribute.to_string(),
        },
        None => attribute.to_string(),
    };
    ws.nodes
        .get(node_id)?
        .attributes
        .get(&resolved_name)
        .map(|v| crate::model::score::parse_score_str(v))
}

fn apply_stickiness_and_health(
    ws: &WorkingSet,
    resource_id: &ResourceId,
    scores: &mut BTreeMap<NodeId, ScoreValue>,
) {
    let Some(resource) = ws.resources.get(resource_id) else {
        return;
    };

    for (node_id, score) in scores.iter_mut() {
        if resource.running_on.contains(node_id) && resource.flags.managed {
            *score = score_add(*score, resource.stickiness);
        }
        let fail_count = resource.fail_count(node_id);
        if resource.migration_threshold > 0 && fail_count >= resource.migration_threshold {
            *score = SCORE_NEG_INFINITY;
        }
        if let Some(node) = ws.nodes.get(node_id) {
            *score = score_add(*score, health_contribution(node, ws.options.node_health_strategy));
        }
    }
}

fn health_contribution(node: &Node, strategy: NodeHealthStrategy) -> ScoreValue {
    use crate::model::node::HealthLevel;
    match strategy {
        NodeHealthStrategy::None => 0,
        NodeHealthStrategy::MigrateOnRed => {
            if node.worst_health_level() == HealthLevel::Red {
                SCORE_NEG_INFINITY
            } else {
                0
            }
        }
        NodeHealthStrategy::OnlyGreen => {
            if node.worst_health_level() == HealthLevel::Green {
                0
            } else {
                SCORE_NEG_INFINITY
            }
        }
        NodeHealthStrategy::Progressive | NodeHealthStrategy::Custom => match node.worst_health_level() {
            HealthLevel::Red => SCORE_NEG_INFINITY,
            HealthLevel::Yellow => -1,
            HealthLevel::Green => 0,
        },
    }
}

fn apply_colocation(
    ws: &WorkingSet,
    resource_id: &ResourceId,
    placed_on: &BTreeMap<ResourceId, Vec<NodeId>>,
    scores: &mut BTreeMap<NodeId, ScoreValue>,
) {
    let colocations: Vec<&ColocationConstraint> = ws
        .constraints
        .colocations
        .iter()
        .filter(|c| &c.dependent == resource_id)
        .collect();

    for colocation in colocations {
        let Some(primary_nodes) = placed_on.get(&colocation.primary) else {
            continue;
        };
        if primary_nodes.is_empty() {
            if colocation.score == SCORE_NEG_INFINITY {
                continue;
            }
            for score in scores.values_mut() {
                *score = SCORE_NEG_INFINITY;
            }
            continue;
        }

        for (node_id, score) in scores.iter_mut() {
            let equivalent = primary_nodes.contains(node_id);
            if colocation.score == SCORE_INFINITY {
                if !equivalent {
                    *score = SCORE_NEG_INFINITY;
                }
            } else if colocation.score == SCORE_NEG_INFINITY {
                if equivalent {
                    *score = SCORE_NEG_INFINITY;
                }
            } else if equivalent {
                *score = score_add(*score, colocation.score);
            }
        }
    }
}

/// Picks the best candidate, breaking ties by (a) currently running there,
/// then (b) fewest resources already placed there, then (c) node name.
fn pick_best(
    resource: &Resource,
    scores: &BTreeMap<NodeId, ScoreValue>,
    placed_on: &BTreeMap<ResourceId, Vec<NodeId>>,
    exclude: &[NodeId],
) -> Option<NodeId> {
    let mut load: BTreeMap<NodeId, usize> = BTreeMap::new();
    for nodes in placed_on.values() {
        for node in nodes {
            *load.entry(node.clone()).or_insert(0) += 1;
        }
    }

    let candidates: Vec<(NodeId, ScoreValue)> = scores
        .iter()
        .filter(|(node_id, score)| !is_banned(**score) && !exclude.contains(*node_id))
        .map(|(id, score)| (id.clone(), *score))
        .collect();

    candidates
        .into_iter()
        .max_by(|(a_id, a_score), (b_id, b_score)| {
            let a_running = resource.running_on.contains(a_id);
            let b_running = resource.running_on.contains(b_id);
            let a_load = load.get(a_id).copied().unwrap_or(0);
            let b_load = load.get(b_id).copied().unwrap_or(0);
            a_score
                .cmp(b_score)
                .then(a_running.cmp(&b_running))
                .then(b_load.cmp(&a_load))
                // lexicographically smaller node name wins ties: reverse the
                // ordering since `max_by` picks the greatest element.
                .then_with(|| b_id.as_str().cmp(a_id.as_str()))
        })
        .map(|(id, _)| id)
}

fn allocate_singleton(
    ws: &mut WorkingSet,
    resource_id: &ResourceId,
    scores: BTreeMap<NodeId, ScoreValue>,
    placed_on: &mut BTreeMap<ResourceId, Vec<NodeId>>,
) {
    let children: Vec<ResourceId> = ws
        .resources
        .get(resource_id)
        .map(|r| r.children.clone())
        .unwrap_or_default();

    let chosen = {
        let resource = ws.resources.get(resource_id).expect("resource listed in processing order");
        pick_best(resource, &scores, placed_on, &[])
    };

    if let Some(resource) = ws.resources.get_mut(resource_id) {
        resource.allowed_nodes = scores.clone();
        resource.allocated_node = chosen.clone();
        resource.next_role = Some(if chosen.is_some() { Role::Started } else { Role::Stopped });
        if chosen.is_none() && resource.is_running_anywhere() {
            ws.diagnostics
                .insufficient_capacity(resource_id.clone(), "no viable node for running resource");
        }
    }

    placed_on.insert(resource_id.clone(), chosen.into_iter().collect());

    // Groups: every child inherits the group's allocated node directly; the
    // group's own location/colocation score vector governs all of them.
    let inherited = placed_on.get(resource_id).cloned().unwrap_or_default();
    for child_id in children {
        if let Some(child) = ws.resources.get_mut(&child_id) {
            child.allowed_nodes = scores.clone();
            child.allocated_node = inherited.first().cloned();
            child.next_role = Some(if inherited.first().is_some() {
                Role::Started
            } else {
                Role::Stopped
            });
        }
        placed_on.insert(child_id, inherited.clone());
    }
}

fn allocate_clone(
    ws: &mut WorkingSet,
    resource_id: &ResourceId,
    scores: BTreeMap<NodeId, ScoreValue>,
    placed_on: &mut BTreeMap<ResourceId, Vec<NodeId>>,
) {
    let (clone_max, clone_node_max, promotable, mut promoted_max, promoted_node_max) = {
        let Some(resource) = ws.resources.get(resource_id) else {
            return;
        };
        match &resource.variant {
            ResourceVariant::Clone { spec, .. } => {
                (spec.clone_max, spec.clone_node_max, false, 0, 0)
            }
            ResourceVariant::PromotableClone { spec, .. } => (
                spec.clone_max,
                spec.clone_node_max,
                true,
                spec.promoted_max,
                spec.promoted_node_max,
            ),
            _ => return,
        }
    };
    // A `loss-policy=demote` ticket loss caps this pass's promotions at
    // zero without otherwise touching instance placement.
    if matches!(
        ws.resources.get(resource_id).and_then(|r| r.ticket_effect),
        Some(crate::model::resource::TicketEffect::Demote)
    ) {
        promoted_max = 0;
    }

    let child_id = ws.resources.get(resource_id).and_then(|r| r.children.first().cloned());
    if let Some(child_id) = &child_id {
        if let Some(child) = ws.resources.get_mut(child_id) {
            child.allowed_nodes = scores.clone();
        }
    }

    let mut ranked: Vec<(NodeId, ScoreValue)> = scores
        .into_iter()
        .filter(|(_, score)| !is_banned(*score))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));

    let mut assigned_nodes: Vec<NodeId> = Vec::new();
    let mut per_node_count: BTreeMap<NodeId, u32> = BTreeMap::new();
    'outer: for _ in 0..clone_max {
        for (node_id, _) in &ranked {
            let count = per_node_count.entry(node_id.clone()).or_insert(0);
            if *count < clone_node_max {
                *count += 1;
                assigned_nodes.push(node_id.clone());
                continue 'outer;
            }
        }
        break;
    }

    let (running_on, aggregate_current_role) = ws
        .resources
        .get(resource_id)
        .map(|r| (r.running_on.clone(), r.current_role))
        .unwrap_or((Default::default(), Role::Unknown));

    let mut instances = Vec::new();
    for (index, node) in assigned_nodes.iter().enumerate() {
        let mut instance = CloneInstance::new(index as u32);
        instance.allocated_node = Some(node.clone());
        instance.running_on = if running_on.contains(node) { Some(node.clone()) } else { None };
        instance.current_role = if running_on.contains(node) { aggregate_current_role } else { Role::Stopped };
        instance.next_role = Role::Started;
        instances.push(instance);
    }

    if promotable {
        let mut promotion_order: Vec<usize> = (0..instances.len()).collect();
        promotion_order.sort_by(|&a, &b| {
            let node_a = instances[a].allocated_node.as_ref();
            let node_b = instances[b].allocated_node.as_ref();
            let score_a = node_a.and_then(|n| promotion_score(ws, resource_id, n)).unwrap_or(0);
            let score_b = node_b.and_then(|n| promotion_score(ws, resource_id, n)).unwrap_or(0);
            score_b.cmp(&score_a).then(a.cmp(&b))
        });

        let mut promoted = 0u32;
        let mut promoted_per_node: BTreeMap<NodeId, u32> = BTreeMap::new();
        for idx in promotion_order {
            if promoted >= promoted_max {
                break;
            }
            let Some(node) = instances[idx].allocated_node.clone() else {
                continue;
            };
            let slot = promoted_per_node.entry(node).or_insert(0);
            if *slot < promoted_node_max {
                *slot += 1;
                promoted += 1;
                instances[idx].next_role = Role::Promoted;
            } else {
                instances[idx].next_role = Role::Unpromoted;
            }
        }
        for instance in &mut instances {
            if instance.next_role == Role::Started {
                instance.next_role = Role::Unpromoted;
            }
        }
    }

    placed_on.insert(resource_id.clone(), assigned_nodes);

    if let Some(resource) = ws.resources.get_mut(resource_id) {
        match &mut resource.variant {
            ResourceVariant::Clone { instances: slot, .. }
            | ResourceVariant::PromotableClone { instances: slot, .. } => {
                *slot = instances;
            }
            _ => {}
        }
        if placed_on.get(resource_id).map(|v| v.is_empty()).unwrap_or(true) {
            ws.diagnostics
                .insufficient_capacity(resource_id.clone(), "no viable node for any clone instance");
        }
    }
}

fn promotion_score(ws: &WorkingSet, resource_id: &ResourceId, node: &NodeId) -> Option<ScoreValue> {
    let resource = ws.resources.get(resource_id)?;
    let attribute_name = format!("master-{resource_id}") ;
    let node_score = ws
        .nodes
        .get(node)
        .and_then(|n| n.attributes.get(&attribute_name))
        .and_then(|v| v.parse::<ScoreValue>().ok())
        .unwrap_or(0);
    Some(score_add(node_score, resource.stickiness))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::NodeId;
    use crate::model::cluster_options::ClusterOptions;
    use crate::model::node::NodeKind;
    use crate::model::resource::ResourceVariant;
    use crate::time::Timestamp;

    fn online_node(ws: &mut WorkingSet, name: &str) {
        let id = NodeId::new(name);
        let mut node = Node::new(id.clone(), NodeKind::ClusterMember);
        node.online = true;
        ws.nodes.insert(id, node);
    }

    #[test]
    fn single_resource_no_constraints_picks_lexicographically_first_node() {
        let mut ws = WorkingSet::new(Timestamp(0), ClusterOptions::default());
        online_node(&mut ws, "n1");
        online_node(&mut ws, "n2");
        let id = ResourceId::new("A");
        ws.resources.insert(id.clone(), Resource::new(id.clone(), ResourceVariant::Primitive));

        allocate(&mut ws);

        assert_eq!(ws.resources[&id].allocated_node, Some(NodeId::new("n1")));
    }

    #[test]
    fn anti_colocation_bans_equivalent_node() {
        let mut ws = WorkingSet::new(Timestamp(0), ClusterOptions::default());
        online_node(&mut ws, "n1");
        online_node(&mut ws, "n2");
        let a = ResourceId::new("A");
        let b = ResourceId::new("B");
        ws.resources.insert(a.clone(), Resource::new(a.clone(), ResourceVariant::Primitive));
        ws.resources.insert(b.clone(), Resource::new(b.clone(), ResourceVariant::Primitive));
        ws.constraints.colocations.push(ColocationConstraint {
            id: crate::ids::ConstraintId::new("col1"),
            dependent: b.clone(),
            primary: a.clone(),
            score: SCORE_NEG_INFINITY,
            dependent_role: None,
            primary_role: None,
            node_attribute: "#uname".into(),
            influence: true,
        });

        allocate(&mut ws);

        assert_ne!(ws.resources[&a].allocated_node, ws.resources[&b].allocated_node);
    }
}
