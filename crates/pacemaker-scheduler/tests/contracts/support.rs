//! Shared black-box helpers for the contract tests: drive `Scheduler::schedule`
//! over hand-written CIB fixtures and inspect the emitted transition graph XML
//! through `roxmltree` rather than substring matching, the same library the
//! scheduler itself uses to read the CIB.

#![allow(dead_code)]

use pacemaker_scheduler::time::Timestamp;
use pacemaker_scheduler::{ScheduleOutcome, Scheduler};

#[derive(Debug, Clone)]
pub struct EmittedAction {
    pub id: String,
    pub subject: String,
    pub operation: String,
    pub on_node: String,
    pub interval_ms: u64,
    pub predecessors: Vec<String>,
}

pub fn schedule(configuration_xml: &str, status_xml: &str) -> ScheduleOutcome {
    Scheduler::schedule(configuration_xml, status_xml, Timestamp(0)).expect("scheduling pass should succeed")
}

pub fn actions(outcome: &ScheduleOutcome) -> Vec<EmittedAction> {
    let doc = roxmltree::Document::parse(&outcome.transition_graph_xml).expect("transition graph must be well-formed xml");
    let mut out = Vec::new();
    for synapse in doc.descendants().filter(|n| n.has_tag_name("synapse")) {
        let Some(action_el) = synapse.children().find(|n| n.has_tag_name("action")) else {
            continue;
        };
        let predecessors = synapse
            .children()
            .find(|n| n.has_tag_name("inputs"))
            .into_iter()
            .flat_map(|inputs| inputs.descendants())
            .filter(|n| n.has_tag_name("pseudo_event"))
            .filter_map(|n| n.attribute("id").map(str::to_string))
            .collect();
        out.push(EmittedAction {
            id: action_el.attribute("id").unwrap_or_default().to_string(),
            subject: action_el.attribute("subject").unwrap_or_default().to_string(),
            operation: action_el.attribute("operation").unwrap_or_default().to_string(),
            on_node: action_el.attribute("on_node").unwrap_or_default().to_string(),
            interval_ms: action_el.attribute("interval_ms").and_then(|v| v.parse().ok()).unwrap_or(0),
            predecessors,
        });
    }
    out
}

pub fn find<'a>(actions: &'a [EmittedAction], subject: &str, operation: &str) -> Option<&'a EmittedAction> {
    actions.iter().find(|a| a.subject == subject && a.operation == operation)
}

pub fn is_ordered_after(actions: &[EmittedAction], before_subject: &str, before_op: &str, after_subject: &str, after_op: &str) -> bool {
    let Some(before) = find(actions, before_subject, before_op) else {
        return false;
    };
    let Some(after) = find(actions, after_subject, after_op) else {
        return false;
    };
    after.predecessors.iter().any(|id| id == &before.id)
}
