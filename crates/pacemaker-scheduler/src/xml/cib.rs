//! Parses the CIB configuration subtree and the live status document into a
//! [`WorkingSet`]. This is the only place in the crate that looks at an XML
//! tag name or attribute; everything past this module works with typed
//! structures.

use std::collections::BTreeMap;

use roxmltree::{Document, Node as XmlNode};

use crate::error::{SchedulerError, Result};
use crate::ids::{ConstraintId, NodeId, ResourceId, TagId, TicketId};
use crate::model::action::Task;
use crate::model::cluster_options::{ClusterOptions, NodeHealthStrategy, NoQuorumPolicy, PlacementStrategy};
use crate::model::constraint::{
    BooleanOp, ColocationConstraint, ColocationSetConstraint, LocationConstraint, LossPolicy,
    OrderKind, OrderingConstraint, OrderingSetConstraint, ResourceSet, RuleClause, Ticket,
    TicketConstraint,
};
use crate::model::node::{Node, NodeKind};
use crate::model::resource::{
    CloneSpec, OperationDef, Resource, ResourceVariant, RestartType, Role,
};
use crate::model::score::ScoreValue;
use crate::model::working_set::WorkingSet;
use crate::rules::{AttrOp, DateOperation, DateSpec, RuleExpr};
use crate::time::Timestamp;

/// Parses `configuration_xml` and `status_xml` into a fresh working set
/// evaluated against `now`. Malformed XML or a missing structurally required
/// root element is fatal ([`SchedulerError::MalformedInput`]); everything
/// else — unknown references, invalid enum values, invalid rules — is
/// recorded as a diagnostic and the offending entry is skipped.
pub fn parse(configuration_xml: &str, status_xml: &str, now: Timestamp) -> Result<WorkingSet> {
    let config_doc = Document::parse(configuration_xml).map_err(|err| SchedulerError::MalformedInput {
        message: format!("configuration_xml: {err}"),
    })?;
    let status_doc = Document::parse(status_xml).map_err(|err| SchedulerError::MalformedInput {
        message: format!("status_xml: {err}"),
    })?;

    let config_root = config_doc.root_element();
    let options = parse_cluster_options(&config_root);
    let mut ws = WorkingSet::new(now, options);

    parse_nodes(&config_root, &mut ws);
    parse_resources(&config_root, &mut ws);
    parse_tags(&config_root, &mut ws);
    parse_constraints(&config_root, &mut ws);

    parse_status(&status_doc.root_element(), &mut ws);

    Ok(ws)
}

fn child<'a, 'input>(node: &XmlNode<'a, 'input>, name: &str) -> Option<XmlNode<'a, 'input>> {
    node.children().find(|c| c.is_element() && c.has_tag_name(name))
}

fn children<'a, 'input>(
    node: &XmlNode<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = XmlNode<'a, 'input>> {
    node.children()
        .filter(move |c| c.is_element() && c.has_tag_name(name))
}

fn attr(node: &XmlNode, name: &str) -> Option<String> {
    node.attribute(name).map(str::to_string)
}

fn attr_bool(node: &XmlNode, name: &str, default: bool) -> bool {
    node.attribute(name)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

fn nvpairs(node: &XmlNode, set_name: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if let Some(set) = child(node, set_name) {
        for nvpair in children(&set, "nvpair") {
            if let (Some(name), Some(value)) = (attr(&nvpair, "name"), attr(&nvpair, "value")) {
                out.insert(name, value);
            }
        }
    }
    out
}

fn parse_cluster_options(config_root: &XmlNode) -> ClusterOptions {
    let mut options = ClusterOptions::default();
    let Some(crm_config) = child(config_root, "crm_config") else {
        return options;
    };
    let props = nvpairs(&crm_config, "cluster_property_set");
    for (key, value) in &props {
        match key.as_str() {
            "no-quorum-policy" => {
                options.no_quorum_policy = match value.as_str() {
                    "freeze" => NoQuorumPolicy::Freeze,
                    "ignore" => NoQuorumPolicy::Ignore,
                    "demote" => NoQuorumPolicy::Demote,
                    "suicide" => NoQuorumPolicy::Suicide,
                    _ => NoQuorumPolicy::Stop,
                };
            }
            "symmetric-cluster" => options.symmetric_cluster = value == "true",
            "maintenance-mode" => options.maintenance_mode = value == "true",
            "start-failure-is-fatal" => options.start_failure_is_fatal = value == "true",
            "stonith-enabled" => options.stonith_enabled = value == "true",
            "concurrent-fencing" => options.concurrent_fencing = value == "true",
            "priority-fencing-delay" => {
                options.priority_fencing_delay_ms = parse_duration_ms(value).unwrap_or(0);
            }
            "node-health-strategy" => {
                options.node_health_strategy = match value.as_str() {
                    "migrate-on-red" => NodeHealthStrategy::MigrateOnRed,
                    "only-green" => NodeHealthStrategy::OnlyGreen,
                    "progressive" => NodeHealthStrategy::Progressive,
                    "custom" => NodeHealthStrategy::Custom,
                    _ => NodeHealthStrategy::None,
                };
            }
            "placement-strategy" => {
                options.placement_strategy = match value.as_str() {
                    "utilization" => PlacementStrategy::Utilization,
                    "balanced" => PlacementStrategy::Balanced,
                    "minimal" => PlacementStrategy::MinimalResources,
                    _ => PlacementStrategy::Default,
                };
            }
            "batch-limit" => options.batch_limit = value.parse().unwrap_or(0),
            "migration-limit" => options.migration_limit = value.parse().unwrap_or(-1),
            "shutdown-lock" => options.shutdown_lock = value == "true",
            "shutdown-lock-limit" => {
                options.shutdown_lock_limit_ms = parse_duration_ms(value).unwrap_or(0);
            }
            "cluster-recheck-interval" => {
                if let Some(ms) = parse_duration_ms(value) {
                    options.cluster_recheck_interval_ms = ms;
                }
            }
            "enable-startup-probes" => options.enable_startup_probes = value == "true",
            _ => {
                options.extra.insert(key.clone(), value.clone());
            }
        }
    }
    options
}

/// Parses a duration string in Pacemaker's usual `<n>` (seconds), `<n>s`,
/// `<n>ms`, or `<n>m` form into milliseconds.
fn parse_duration_ms(value: &str) -> Option<u64> {
    let value = value.trim();
    if let Some(stripped) = value.strip_suffix("ms") {
        return stripped.trim().parse().ok();
    }
    if let Some(stripped) = value.strip_suffix('s') {
        return stripped.trim().parse::<u64>().ok().map(|s| s * 1000);
    }
    if let Some(stripped) = value.strip_suffix('m') {
        return stripped.trim().parse::<u64>().ok().map(|m| m * 60_000);
    }
    value.parse::<u64>().ok().map(|s| s * 1000)
}

fn parse_nodes(config_root: &XmlNode, ws: &mut WorkingSet) {
    let Some(nodes_el) = child(config_root, "nodes") else {
        return;
    };
    for node_el in children(&nodes_el, "node") {
        let Some(uname) = attr(&node_el, "uname").or_else(|| attr(&node_el, "id")) else {
            continue;
        };
        let kind = match attr(&node_el, "type").as_deref() {
            Some("remote") => NodeKind::Remote,
            Some("guest") => NodeKind::Guest,
            Some("bundle") => NodeKind::Bundle,
            _ => NodeKind::ClusterMember,
        };
        let mut node = Node::new(NodeId::new(&uname), kind);
        node.attributes = nvpairs(&node_el, "instance_attributes");
        for (key, value) in nvpairs(&node_el, "utilization") {
            if let Ok(parsed) = value.parse::<i64>() {
                node.utilization.insert(key, parsed);
            }
        }
        ws.nodes.insert(node.id.clone(), node);
    }
}

fn parse_operations(primitive: &XmlNode) -> Vec<OperationDef> {
    let mut ops = Vec::new();
    if let Some(operations) = child(primitive, "operations") {
        for op in children(&operations, "op") {
            let Some(name) = attr(&op, "name") else {
                continue;
            };
            let interval_ms = attr(&op, "interval")
                .and_then(|v| parse_duration_ms(&v))
                .unwrap_or(0);
            let timeout_ms = attr(&op, "timeout")
                .and_then(|v| parse_duration_ms(&v))
                .unwrap_or(20_000);
            let role = attr(&op, "role").and_then(|r| parse_role(&r));
            ops.push(OperationDef {
                name,
                interval_ms,
                timeout_ms,
                role,
            });
        }
    }
    ops
}

fn parse_role(value: &str) -> Option<Role> {
    match value {
        "Stopped" => Some(Role::Stopped),
        "Started" => Some(Role::Started),
        "Unpromoted" | "Slave" => Some(Role::Unpromoted),
        "Promoted" | "Master" => Some(Role::Promoted),
        _ => None,
    }
}

fn parse_primitive(el: &XmlNode, ws: &mut WorkingSet, parent: Option<ResourceId>) -> ResourceId {
    let id = ResourceId::new(attr(el, "id").unwrap_or_default());
    let mut resource = Resource::new(id.clone(), ResourceVariant::Primitive);
    resource.parent = parent;
    apply_primitive_common(el, &mut resource);
    ws.resources.insert(id.clone(), resource);
    id
}

fn apply_primitive_common(el: &XmlNode, resource: &mut Resource) {
    resource.meta = nvpairs(el, "meta_attributes");
    resource.instance_attrs = nvpairs(el, "instance_attributes");
    resource.operations = parse_operations(el);

    if let Some(v) = resource.meta.get("allow-migrate") {
        resource.flags.allow_migrate = v == "true";
    }
    if let Some(v) = resource.meta.get("critical") {
        resource.flags.critical = v == "true";
    }
    if let Some(v) = resource.meta.get("globally-unique") {
        resource.flags.unique = v == "true";
    }
    if let Some(v) = resource.meta.get("notify") {
        resource.flags.notify = v == "true";
    }
    resource.flags.managed = resource
        .meta
        .get("is-managed")
        .map(|v| v == "true")
        .unwrap_or(true);
    if let Some(v) = resource.meta.get("restart-type") {
        if v == "restart" {
            resource.restart_type = RestartType::Restart;
        }
    }
    if let Some(v) = resource.meta.get("resource-stickiness") {
        resource.stickiness = v.parse::<ScoreValue>().unwrap_or(0);
    }
    if let Some(v) = resource.meta.get("priority") {
        resource.priority = v.parse::<i64>().unwrap_or(0);
    }
    if let Some(v) = resource.meta.get("migration-threshold") {
        resource.migration_threshold = v.parse::<u32>().unwrap_or(1_000_000);
    }
}

fn parse_clone_spec(el: &XmlNode) -> CloneSpec {
    let meta = nvpairs(el, "meta_attributes");
    let mut spec = CloneSpec::default();
    if let Some(v) = meta.get("clone-max") {
        spec.clone_max = v.parse().unwrap_or(spec.clone_max);
    }
    if let Some(v) = meta.get("clone-node-max") {
        spec.clone_node_max = v.parse().unwrap_or(spec.clone_node_max);
    }
    if let Some(v) = meta.get("clone-min") {
        spec.clone_min = v.parse().unwrap_or(spec.clone_min);
    }
    if let Some(v) = meta.get("promoted-max").or_else(|| meta.get("master-max")) {
        spec.promoted_max = v.parse().unwrap_or(spec.promoted_max);
    }
    if let Some(v) = meta
        .get("promoted-node-max")
        .or_else(|| meta.get("master-node-max"))
    {
        spec.promoted_node_max = v.parse().unwrap_or(spec.promoted_node_max);
    }
    spec.interleave = meta.get("interleave").map(|v| v == "true").unwrap_or(false);
    spec.ordered = meta.get("ordered").map(|v| v == "true").unwrap_or(false);
    spec.globally_unique = meta
        .get("globally-unique")
        .map(|v| v == "true")
        .unwrap_or(false);
    spec
}

fn parse_resources(config_root: &XmlNode, ws: &mut WorkingSet) {
    let Some(resources_el) = child(config_root, "resources") else {
        return;
    };
    for el in resources_el.children().filter(|c| c.is_element()) {
        match el.tag_name().name() {
            "primitive" => {
                parse_primitive(&el, ws, None);
            }
            "group" => {
                let group_id = ResourceId::new(attr(&el, "id").unwrap_or_default());
                let ordered = nvpairs(&el, "meta_attributes")
                    .get("ordered")
                    .map(|v| v != "false")
                    .unwrap_or(true);
                let mut group = Resource::new(group_id.clone(), ResourceVariant::Group { ordered });
                let mut child_ids = Vec::new();
                for child_el in children(&el, "primitive") {
                    child_ids.push(parse_primitive(&child_el, ws, Some(group_id.clone())));
                }
                group.children = child_ids;
                ws.resources.insert(group_id, group);
            }
            "clone" | "master" => {
                let clone_id = ResourceId::new(attr(&el, "id").unwrap_or_default());
                let spec = parse_clone_spec(&el);
                let meta = nvpairs(&el, "meta_attributes");
                let promotable = el.has_tag_name("master")
                    || meta.get("promotable").map(|v| v == "true").unwrap_or(false);
                let variant = if promotable {
                    ResourceVariant::PromotableClone { spec, instances: Vec::new() }
                } else {
                    ResourceVariant::Clone { spec, instances: Vec::new() }
                };
                let mut clone = Resource::new(clone_id.clone(), variant);
                clone.meta = meta;
                clone.flags.promotable = promotable;
                let template = children(&el, "primitive")
                    .next()
                    .or_else(|| children(&el, "group").next());
                if let Some(template) = template {
                    if template.has_tag_name("primitive") {
                        let child_id = parse_primitive(&template, ws, Some(clone_id.clone()));
                        clone.children = vec![child_id];
                    }
                }
                ws.resources.insert(clone_id, clone);
            }
            "bundle" => {
                let bundle_id = ResourceId::new(attr(&el, "id").unwrap_or_default());
                let bundle = Resource::new(bundle_id.clone(), ResourceVariant::Bundle);
                ws.resources.insert(bundle_id, bundle);
            }
            _ => {}
        }
    }
}

fn parse_tags(config_root: &XmlNode, ws: &mut WorkingSet) {
    let Some(tags_el) = child(config_root, "tags") else {
        return;
    };
    for tag_el in children(&tags_el, "tag") {
        let Some(id) = attr(&tag_el, "id") else {
            continue;
        };
        let members = children(&tag_el, "obj_ref")
            .filter_map(|r| attr(&r, "id"))
            .map(ResourceId::new)
            .collect::<Vec<_>>();
        ws.tags.insert(TagId::new(id), members);
    }
}

fn parse_date_spec(el: &XmlNode) -> Option<DateSpec> {
    let operation = match attr(el, "operation").as_deref() {
        Some("gt") => DateOperation::Gt,
        Some("lt") => DateOperation::Lt,
        Some("in_range") | None => DateOperation::InRange,
        Some(_) => DateOperation::InRange,
    };
    let start = attr(el, "start").and_then(|v| v.parse::<i64>().ok()).map(Timestamp);
    let end = attr(el, "end").and_then(|v| v.parse::<i64>().ok()).map(Timestamp);
    Some(DateSpec { start, end, operation })
}

fn parse_expression(el: &XmlNode) -> Option<RuleExpr> {
    let attribute = attr(el, "attribute")?;
    let operation = match attr(el, "operation").as_deref() {
        Some("defined") => AttrOp::Defined,
        Some("not_defined") => AttrOp::NotDefined,
        Some("ne") => AttrOp::Ne,
        Some("gt") => AttrOp::Gt,
        Some("gte") => AttrOp::Gte,
        Some("lt") => AttrOp::Lt,
        Some("lte") => AttrOp::Lte,
        _ => AttrOp::Eq,
    };
    Some(RuleExpr::AttrExpr {
        attribute,
        operation,
        value: attr(el, "value"),
    })
}

/// A `<rule>` element may itself nest `<rule>` children (for `and`/`or`
/// composition) alongside leaf `<expression>`/`<date_expression>` elements.
fn parse_rule_expr(rule_el: &XmlNode) -> RuleExpr {
    let boolean_op = attr(rule_el, "boolean-op").as_deref() == Some("or");
    let mut children_exprs = Vec::new();
    for el in rule_el.children().filter(|c| c.is_element()) {
        let expr = match el.tag_name().name() {
            "expression" => parse_expression(&el),
            "date_expression" => parse_date_spec(&el).map(RuleExpr::DateExpr),
            "rule" => Some(parse_rule_expr(&el)),
            _ => None,
        };
        if let Some(expr) = expr {
            children_exprs.push(expr);
        }
    }
    if boolean_op {
        RuleExpr::Or(children_exprs)
    } else {
        RuleExpr::And(children_exprs)
    }
}

fn parse_location(el: &XmlNode, ws: &mut WorkingSet) {
    let Some(id) = attr(el, "id") else { return };
    let Some(resource) = attr(el, "rsc") else {
        ws.diagnostics
            .config_error(Some(ConstraintId::new(&id)), "rsc_location missing rsc reference");
        return;
    };
    let role = attr(el, "role").and_then(|r| parse_role(&r));
    let score_attribute = attr(el, "score-attribute");
    let score_attribute_pattern = attr(el, "score-attribute-pattern");

    if let Some(node_name) = attr(el, "node") {
        let score = parse_score(attr(el, "score").as_deref().unwrap_or("0"));
        ws.constraints.locations.push(LocationConstraint {
            id: ConstraintId::new(&id),
            resource: ResourceId::new(&resource),
            node: Some(NodeId::new(&node_name)),
            score,
            role,
            rules: Vec::new(),
            boolean_op: BooleanOp::And,
            score_attribute,
            score_attribute_pattern,
        });
        return;
    }

    let mut rules = Vec::new();
    let mut boolean_op = BooleanOp::And;
    for rule_el in children(el, "rule") {
        boolean_op = if attr(&rule_el, "boolean-op").as_deref() == Some("or") {
            BooleanOp::Or
        } else {
            BooleanOp::And
        };
        let score = parse_score(attr(&rule_el, "score").as_deref().unwrap_or("0"));
        rules.push(RuleClause {
            expr: parse_rule_expr(&rule_el),
            score,
        });
    }
    if rules.is_empty() {
        ws.diagnostics.config_error(
            Some(ConstraintId::new(&id)),
            "rsc_location has neither a node nor a rule",
        );
        return;
    }
    ws.constraints.locations.push(LocationConstraint {
        id: ConstraintId::new(&id),
        resource: ResourceId::new(&resource),
        node: None,
        score: 0,
        role,
        rules,
        boolean_op,
        score_attribute,
        score_attribute_pattern,
    });
}

fn parse_score(value: &str) -> ScoreValue {
    crate::model::score::parse_score_str(value)
}

fn parse_task(value: &str) -> Task {
    match value {
        "stop" => Task::Stop,
        "promote" => Task::Promote,
        "demote" => Task::Demote,
        "monitor" => Task::Monitor,
        _ => Task::Start,
    }
}

fn parse_resource_set(el: &XmlNode) -> ResourceSet {
    let members = children(el, "resource_ref")
        .filter_map(|r| attr(&r, "id"))
        .map(ResourceId::new)
        .collect();
    ResourceSet {
        members,
        sequential: attr_bool(el, "sequential", true),
        role: attr(el, "role").and_then(|r| parse_role(&r)),
        action: attr(el, "action").map(|a| parse_task(&a)),
        require_all: attr_bool(el, "require-all", true),
    }
}

fn parse_colocation(el: &XmlNode, ws: &mut WorkingSet) {
    let Some(id) = attr(el, "id") else { return };
    let sets: Vec<ResourceSet> = children(el, "resource_set").map(|s| parse_resource_set(&s)).collect();
    if !sets.is_empty() {
        let score = parse_score(attr(el, "score").as_deref().unwrap_or("0"));
        ws.constraints.colocation_sets.push(ColocationSetConstraint {
            id: ConstraintId::new(&id),
            sets,
            score,
        });
        return;
    }
    let (Some(dependent), Some(primary)) = (attr(el, "rsc"), attr(el, "with-rsc")) else {
        ws.diagnostics.config_error(
            Some(ConstraintId::new(&id)),
            "rsc_colocation missing rsc or with-rsc",
        );
        return;
    };
    let score = parse_score(attr(el, "score").as_deref().unwrap_or("0"));
    if score == 0 {
        ws.diagnostics.push(crate::error::Diagnostic {
            severity: crate::error::Severity::Trace,
            kind: crate::error::DiagnosticKind::ConfigError,
            message: format!("colocation {id} has score 0, discarded"),
            constraint_id: Some(ConstraintId::new(&id)),
            resource_id: None,
        });
        return;
    }
    let influence = attr(el, "influence")
        .map(|v| v == "true")
        .unwrap_or_else(|| {
            ws.resources
                .get(&ResourceId::new(&dependent))
                .map(|r| r.flags.critical)
                .unwrap_or(false)
        });
    ws.constraints.colocations.push(ColocationConstraint {
        id: ConstraintId::new(&id),
        dependent: ResourceId::new(&dependent),
        primary: ResourceId::new(&primary),
        score,
        dependent_role: attr(el, "rsc-role").and_then(|r| parse_role(&r)),
        primary_role: attr(el, "with-rsc-role").and_then(|r| parse_role(&r)),
        node_attribute: attr(el, "node-attribute").unwrap_or_else(|| "#uname".to_string()),
        influence,
    });
}

fn parse_order(el: &XmlNode, ws: &mut WorkingSet) {
    let Some(id) = attr(el, "id") else { return };
    let sets: Vec<ResourceSet> = children(el, "resource_set").map(|s| parse_resource_set(&s)).collect();
    let symmetric = attr_bool(el, "symmetrical", true);
    if !sets.is_empty() {
        let kind = parse_order_kind(el);
        ws.constraints.ordering_sets.push(OrderingSetConstraint {
            id: ConstraintId::new(&id),
            sets,
            kind,
            symmetric,
        });
        return;
    }
    let (Some(first), Some(then)) = (attr(el, "first"), attr(el, "then")) else {
        ws.diagnostics
            .config_error(Some(ConstraintId::new(&id)), "rsc_order missing first or then");
        return;
    };
    let kind = parse_order_kind(el);
    let default_symmetric = !matches!(kind, OrderKind::Serialize);
    ws.constraints.orderings.push(OrderingConstraint {
        id: ConstraintId::new(&id),
        first: ResourceId::new(&first),
        first_task: attr(el, "first-action").map(|a| parse_task(&a)).unwrap_or(Task::Start),
        then: ResourceId::new(&then),
        then_task: attr(el, "then-action").map(|a| parse_task(&a)).unwrap_or(Task::Start),
        kind,
        symmetric: attr(el, "symmetrical").map(|v| v == "true").unwrap_or(default_symmetric),
    });
}

fn parse_order_kind(el: &XmlNode) -> OrderKind {
    if let Some(kind) = attr(el, "kind") {
        return match kind.as_str() {
            "Optional" => OrderKind::Optional,
            "Serialize" => OrderKind::Serialize,
            _ => OrderKind::Mandatory,
        };
    }
    match attr(el, "score").as_deref() {
        Some("0") => OrderKind::Optional,
        _ => OrderKind::Mandatory,
    }
}

fn parse_ticket_constraint(el: &XmlNode, ws: &mut WorkingSet) {
    let Some(id) = attr(el, "id") else { return };
    let (Some(resource), Some(ticket)) = (attr(el, "rsc"), attr(el, "ticket")) else {
        ws.diagnostics
            .config_error(Some(ConstraintId::new(&id)), "rsc_ticket missing rsc or ticket");
        return;
    };
    let loss_policy = match attr(el, "loss-policy").as_deref() {
        Some("demote") => LossPolicy::Demote,
        Some("freeze") => LossPolicy::Freeze,
        Some("fence") => LossPolicy::Fence,
        _ => LossPolicy::Stop,
    };
    ws.constraints.tickets.push(TicketConstraint {
        id: ConstraintId::new(&id),
        resource: ResourceId::new(&resource),
        ticket: TicketId::new(&ticket),
        role: attr(el, "role").and_then(|r| parse_role(&r)),
        loss_policy,
    });
    ws.tickets
        .entry(TicketId::new(&ticket))
        .or_insert_with(|| Ticket {
            id: TicketId::new(&ticket),
            granted: false,
            standby: false,
            last_granted: None,
        });
}

fn parse_constraints(config_root: &XmlNode, ws: &mut WorkingSet) {
    let Some(constraints_el) = child(config_root, "constraints") else {
        return;
    };
    for el in constraints_el.children().filter(|c| c.is_element()) {
        match el.tag_name().name() {
            "rsc_location" => parse_location(&el, ws),
            "rsc_colocation" => parse_colocation(&el, ws),
            "rsc_order" => parse_order(&el, ws),
            "rsc_ticket" => parse_ticket_constraint(&el, ws),
            _ => {}
        }
    }
}

fn parse_status(status_root: &XmlNode, ws: &mut WorkingSet) {
    for node_state in children(status_root, "node_state") {
        let Some(uname) = attr(&node_state, "uname").or_else(|| attr(&node_state, "id")) else {
            continue;
        };
        let id = NodeId::new(&uname);
        let node = ws
            .nodes
            .entry(id.clone())
            .or_insert_with(|| Node::new(id.clone(), NodeKind::ClusterMember));
        node.online = attr_bool(&node_state, "online", false);
        node.unclean = attr_bool(&node_state, "unclean", false);
        node.shutdown = attr_bool(&node_state, "shutdown", false);
        node.standby = matches!(attr(&node_state, "standby").as_deref(), Some("true") | Some("on"));
        node.maintenance = attr_bool(&node_state, "maintenance", false);
        node.pending = attr_bool(&node_state, "pending", false);

        if let Some(transient) = child(&node_state, "transient_attributes") {
            for (key, value) in nvpairs(&transient, "instance_attributes") {
                node.attributes.insert(key, value);
            }
        }

        if let Some(lrm) = child(&node_state, "lrm") {
            if let Some(lrm_resources) = child(&lrm, "lrm_resources") {
                for lrm_resource in children(&lrm_resources, "lrm_resource") {
                    apply_lrm_resource(&lrm_resource, &id, ws);
                }
            }
        }
    }

    if let Some(tickets_el) = child(status_root, "tickets") {
        for ticket_el in children(&tickets_el, "ticket") {
            let Some(id) = attr(&ticket_el, "id") else { continue };
            let ticket = Ticket {
                id: TicketId::new(&id),
                granted: attr_bool(&ticket_el, "granted", false),
                standby: attr_bool(&ticket_el, "standby", false),
                last_granted: attr(&ticket_el, "last-granted")
                    .and_then(|v| v.parse::<i64>().ok())
                    .map(Timestamp),
            };
            ws.tickets.insert(ticket.id.clone(), ticket);
        }
    }
}

/// Applies the single latest `lrm_rsc_op` for a resource on a node, per the
/// reduced operation-history retention (only the most recent result per
/// resource/node/operation/interval is kept).
fn apply_lrm_resource(lrm_resource: &XmlNode, node_id: &NodeId, ws: &mut WorkingSet) {
    let Some(resource_id_str) = attr(lrm_resource, "id") else {
        return;
    };
    let resource_id = ResourceId::new(&resource_id_str);

    let mut latest: Option<(i64, XmlNode)> = None;
    for op in children(lrm_resource, "lrm_rsc_op") {
        let call_id = attr(&op, "call-id").and_then(|v| v.parse::<i64>().ok()).unwrap_or(0);
        if latest.as_ref().map(|(id, _)| call_id > *id).unwrap_or(true) {
            latest = Some((call_id, op));
        }
    }
    let Some((_, op)) = latest else { return };

    let Some(resource) = ws.resources.get_mut(&resource_id) else {
        return;
    };

    let rc_code = attr(&op, "rc-code").and_then(|v| v.parse::<i32>().ok()).unwrap_or(0);
    let operation = attr(&op, "operation").unwrap_or_default();
    let interval_ms = attr(&op, "interval")
        .and_then(|v| parse_duration_ms(&v))
        .unwrap_or(0);

    if rc_code != 0 && operation != "monitor" {
        *resource.fail_counts.entry(node_id.clone()).or_insert(0) += 1;
        resource.flags.failed = true;
    }

    match operation.as_str() {
        "start" if rc_code == 0 => {
            resource.running_on.insert(node_id.clone());
            resource.current_role = Role::Started;
        }
        "stop" if rc_code == 0 => {
            resource.running_on.remove(node_id);
            if resource.running_on.is_empty() {
                resource.current_role = Role::Stopped;
            }
        }
        "promote" if rc_code == 0 => {
            resource.running_on.insert(node_id.clone());
            resource.current_role = Role::Promoted;
        }
        "demote" if rc_code == 0 => {
            resource.running_on.insert(node_id.clone());
            resource.current_role = Role::Unpromoted;
        }
        "monitor" if interval_ms == 0 => {
            // a probe result: rc 7 (not running) leaves current_role alone
            // at Stopped; rc 0 confirms it is running here.
            if rc_code == 0 {
                resource.running_on.insert(node_id.clone());
                if resource.current_role == Role::Unknown {
                    resource.current_role = Role::Started;
                }
            }
        }
        _ => {}
    }
}
