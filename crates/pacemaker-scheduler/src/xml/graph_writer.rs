//! Serializes the emitted action graph to the transition-graph XML wire
//! format. The only place in the crate that constructs XML events; callers
//! get back a plain `String`.

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use crate::graph::EmittedAction;

/// Writes `<transition_graph>` with one `<synapse>` per emitted action,
/// predecessors as nested `<trigger>` children and operation metadata as
/// `<nvpair>` children of an `<attributes>` element, matching the CIB's own
/// nvpair convention so downstream tooling doesn't need a second parser.
pub fn write(actions: &[EmittedAction]) -> String {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    let mut root = BytesStart::new("transition_graph");
    root.push_attribute(("batch-limit", "0"));
    writer
        .write_event(Event::Start(root))
        .expect("writing to an in-memory buffer cannot fail");

    for action in actions {
        write_synapse(&mut writer, action);
    }

    writer
        .write_event(Event::End(BytesEnd::new("transition_graph")))
        .expect("writing to an in-memory buffer cannot fail");

    String::from_utf8(writer.into_inner()).expect("quick-xml only ever writes valid UTF-8")
}

fn write_synapse(writer: &mut Writer<Vec<u8>>, action: &EmittedAction) {
    let mut synapse = BytesStart::new("synapse");
    synapse.push_attribute(("id", action.id.0.to_string().as_str()));
    writer.write_event(Event::Start(synapse)).unwrap();

    if !action.predecessors.is_empty() {
        writer
            .write_event(Event::Start(BytesStart::new("inputs")))
            .unwrap();
        for predecessor in &action.predecessors {
            writer
                .write_event(Event::Start(BytesStart::new("trigger")))
                .unwrap();
            let mut id_ref = BytesStart::new("pseudo_event");
            id_ref.push_attribute(("id", predecessor.0.to_string().as_str()));
            writer.write_event(Event::Empty(id_ref)).unwrap();
            writer
                .write_event(Event::End(BytesEnd::new("trigger")))
                .unwrap();
        }
        writer.write_event(Event::End(BytesEnd::new("inputs"))).unwrap();
    }

    let mut action_el = BytesStart::new("action");
    action_el.push_attribute(("id", action.id.0.to_string().as_str()));
    action_el.push_attribute(("operation", action.task.as_str()));
    action_el.push_attribute(("on_node", action.node.as_deref().unwrap_or("")));
    action_el.push_attribute(("subject", action.subject.as_str()));
    action_el.push_attribute(("interval_ms", action.interval_ms.to_string().as_str()));
    action_el.push_attribute(("priority", action.priority.to_string().as_str()));
    action_el.push_attribute(("timeout_ms", action.timeout_ms.to_string().as_str()));
    writer.write_event(Event::Start(action_el)).unwrap();

    if !action.meta.is_empty() {
        writer
            .write_event(Event::Start(BytesStart::new("attributes")))
            .unwrap();
        for (key, value) in &action.meta {
            let mut nvpair = BytesStart::new("nvpair");
            nvpair.push_attribute(("name", key.as_str()));
            nvpair.push_attribute(("value", value.as_str()));
            writer.write_event(Event::Empty(nvpair)).unwrap();
        }
        writer
            .write_event(Event::End(BytesEnd::new("attributes")))
            .unwrap();
    }

    writer.write_event(Event::End(BytesEnd::new("action"))).unwrap();
    writer.write_event(Event::End(BytesEnd::new("synapse"))).unwrap();
}
