//! A pure, deterministic scheduler core modeled on a Pacemaker-style cluster
//! resource manager: given the cluster's configuration and current status as
//! two XML documents and a timestamp, compute the transition graph of
//! actions that moves every resource to its desired state.
//!
//! [`Scheduler::schedule`] is the only entry point. It never reads the real
//! clock, never touches the filesystem or network, and never panics on
//! malformed input — recoverable problems are recorded in
//! [`error::Diagnostics`] and scheduling continues; only malformed XML or an
//! internal invariant violation escalates to [`error::SchedulerError`].

pub mod actions;
pub mod constraints;
pub mod error;
pub mod graph;
pub mod ids;
pub mod model;
pub mod notify;
pub mod ordering;
pub mod placement;
pub mod rules;
pub mod time;
pub mod xml;

use error::{Diagnostic, Result, SchedulerError};
use time::Timestamp;

/// The result of one scheduling pass: the transition graph as serialized
/// XML, every diagnostic collected along the way, and the earliest instant
/// (if any) the caller should re-invoke the scheduler even with no status
/// change, per the rules that were evaluated this pass.
#[derive(Debug)]
pub struct ScheduleOutcome {
    pub transition_graph_xml: String,
    pub diagnostics: Vec<Diagnostic>,
    pub next_recheck: Option<Timestamp>,
}

/// Entry point wrapper; holds no state of its own; every call to
/// [`Scheduler::schedule`] builds and discards its own
/// [`model::WorkingSet`].
pub struct Scheduler;

impl Scheduler {
    /// Runs one full scheduling pass over `configuration_xml` and
    /// `status_xml`, evaluated as of `now`.
    ///
    /// Pipeline: parse both documents into a working set, unpack
    /// constraints (tag expansion, reference validation), allocate
    /// resources to nodes, generate the actions each allocation implies,
    /// materialize the ordering graph (intrinsic transitions, constraints,
    /// anti-colocation, migration mirroring), wrap clone notifications
    /// around it, check the result is acyclic, and emit it as transition
    /// graph XML.
    ///
    /// Returns `Err` only for malformed input, an ordering cycle, or an
    /// internal invariant violation; everything else is reported through
    /// [`ScheduleOutcome::diagnostics`] with scheduling still completing.
    pub fn schedule(configuration_xml: &str, status_xml: &str, now: Timestamp) -> Result<ScheduleOutcome> {
        let mut ws = xml::cib::parse(configuration_xml, status_xml, now)?;

        constraints::unpack(&mut ws);
        placement::allocate(&mut ws);
        actions::generate(&mut ws);
        ordering::build(&mut ws);
        notify::build(&mut ws);
        ordering::check_acyclic(&ws)?;

        if ws.diagnostics.has_invariant_violation() {
            let message = ws
                .diagnostics
                .iter()
                .find(|d| d.kind == error::DiagnosticKind::Invariant)
                .map(|d| d.message.clone())
                .unwrap_or_else(|| "unspecified invariant violation".to_string());
            return Err(SchedulerError::Invariant { message });
        }

        let emitted = graph::emit(&ws);
        let transition_graph_xml = xml::graph_writer::write(&emitted);

        Ok(ScheduleOutcome {
            transition_graph_xml,
            diagnostics: ws.diagnostics.into_vec(),
            next_recheck: ws.next_recheck,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
        <configuration>
          <crm_config>
            <cluster_property_set id="cib-bootstrap-options">
              <nvpair id="cbo-probes" name="enable-startup-probes" value="false"/>
            </cluster_property_set>
          </crm_config>
          <nodes>
            <node id="n1" uname="n1"/>
            <node id="n2" uname="n2"/>
          </nodes>
          <resources>
            <primitive id="A" class="ocf" provider="pacemaker" type="Dummy"/>
          </resources>
          <constraints/>
        </configuration>
    "#;

    const STATUS: &str = r#"
        <status>
          <node_state id="n1" uname="n1" online="true"/>
          <node_state id="n2" uname="n2" online="true"/>
        </status>
    "#;

    #[test]
    fn schedule_starts_a_stopped_resource() {
        let outcome = Scheduler::schedule(CONFIG, STATUS, Timestamp(0)).expect("schedule should succeed");
        assert!(outcome.transition_graph_xml.contains("start"));
    }

    #[test]
    fn malformed_configuration_is_reported_as_an_error() {
        let result = Scheduler::schedule("<not-xml", STATUS, Timestamp(0));
        assert!(matches!(result, Err(SchedulerError::MalformedInput { .. })));
    }
}
