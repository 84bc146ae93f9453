//! Universal invariants that must hold for every scheduling pass, independent
//! of any one scenario: determinism, acyclicity, bounded promotion, resolved
//! anti-colocation, unique action identity and a sane next-recheck time.

#[path = "contracts/support.rs"]
mod support;

use pacemaker_scheduler::error::SchedulerError;
use pacemaker_scheduler::time::Timestamp;
use pacemaker_scheduler::Scheduler;

const SINGLE_CONFIG: &str = r#"
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

const SINGLE_STATUS: &str = r#"
<status>
  <node_state id="n1" uname="n1" online="true"/>
  <node_state id="n2" uname="n2" online="true"/>
</status>
"#;

#[test]
fn same_inputs_produce_byte_identical_output() {
    let first = support::schedule(SINGLE_CONFIG, SINGLE_STATUS);
    let second = support::schedule(SINGLE_CONFIG, SINGLE_STATUS);
    assert_eq!(first.transition_graph_xml, second.transition_graph_xml);
}

const CYCLE_CONFIG: &str = r#"
<configuration>
  <crm_config>
    <cluster_property_set id="cib-bootstrap-options">
      <nvpair id="cbo-probes" name="enable-startup-probes" value="false"/>
    </cluster_property_set>
  </crm_config>
  <nodes>
    <node id="n1" uname="n1"/>
  </nodes>
  <resources>
    <primitive id="A" class="ocf" provider="pacemaker" type="Dummy"/>
    <primitive id="B" class="ocf" provider="pacemaker" type="Dummy"/>
  </resources>
  <constraints>
    <rsc_order id="a-then-b" first="A" first-action="start" then="B" then-action="start" kind="Mandatory" symmetrical="false"/>
    <rsc_order id="b-then-a" first="B" first-action="start" then="A" then-action="start" kind="Mandatory" symmetrical="false"/>
  </constraints>
</configuration>
"#;

#[test]
fn a_genuine_ordering_cycle_is_reported_rather_than_silently_dropped() {
    let result = Scheduler::schedule(CYCLE_CONFIG, SINGLE_STATUS, Timestamp(0));
    assert!(matches!(result, Err(SchedulerError::OrderingCycle { .. })), "expected a cycle error, got {result:?}");
}

const PROMOTABLE_CONFIG: &str = r#"
<configuration>
  <crm_config>
    <cluster_property_set id="cib-bootstrap-options">
      <nvpair id="cbo-probes" name="enable-startup-probes" value="false"/>
    </cluster_property_set>
  </crm_config>
  <nodes>
    <node id="n1" uname="n1"/>
    <node id="n2" uname="n2"/>
    <node id="n3" uname="n3"/>
  </nodes>
  <resources>
    <clone id="ms">
      <meta_attributes id="ms-meta">
        <nvpair id="ms-promotable" name="promotable" value="true"/>
        <nvpair id="ms-clone-max" name="clone-max" value="3"/>
        <nvpair id="ms-clone-node-max" name="clone-node-max" value="1"/>
        <nvpair id="ms-promoted-max" name="promoted-max" value="1"/>
      </meta_attributes>
      <primitive id="db" class="ocf" provider="pacemaker" type="Dummy"/>
    </clone>
  </resources>
  <constraints/>
</configuration>
"#;

#[test]
fn promoted_count_never_exceeds_promoted_max() {
    let outcome = support::schedule(PROMOTABLE_CONFIG, SINGLE_STATUS);
    let actions = support::actions(&outcome);
    let promoted = actions.iter().filter(|a| a.operation == "promote").count();
    assert!(promoted <= 1, "promoted-max=1 but got {promoted} promotions: {actions:?}");
}

const ANTI_COLOCATION_CONFIG: &str = r#"
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
    <primitive id="B" class="ocf" provider="pacemaker" type="Dummy"/>
  </resources>
  <constraints>
    <rsc_colocation id="anti-b-a" rsc="B" with-rsc="A" score="-INFINITY"/>
  </constraints>
</configuration>
"#;

#[test]
fn anti_colocated_resources_never_share_a_node() {
    let outcome = support::schedule(ANTI_COLOCATION_CONFIG, SINGLE_STATUS);
    let actions = support::actions(&outcome);
    let node_a = support::find(&actions, "A", "start").map(|a| a.on_node.clone());
    let node_b = support::find(&actions, "B", "start").map(|a| a.on_node.clone());
    if let (Some(a), Some(b)) = (node_a, node_b) {
        assert_ne!(a, b, "anti-colocated resources must not land on the same node");
    }
}

#[test]
fn every_emitted_action_has_a_unique_subject_operation_interval() {
    let outcome = support::schedule(PROMOTABLE_CONFIG, SINGLE_STATUS);
    let actions = support::actions(&outcome);
    let mut seen = std::collections::BTreeSet::new();
    for action in &actions {
        let key = (action.subject.clone(), action.operation.clone(), action.interval_ms);
        assert!(seen.insert(key.clone()), "duplicate action key emitted: {key:?}");
    }
}

const FUTURE_RULE_CONFIG: &str = r#"
<configuration>
  <crm_config>
    <cluster_property_set id="cib-bootstrap-options">
      <nvpair id="cbo-probes" name="enable-startup-probes" value="false"/>
    </cluster_property_set>
  </crm_config>
  <nodes>
    <node id="n1" uname="n1"/>
  </nodes>
  <resources>
    <primitive id="A" class="ocf" provider="pacemaker" type="Dummy"/>
  </resources>
  <constraints>
    <rsc_location id="loc-a" rsc="A">
      <rule id="loc-a-rule" score="100">
        <date_expression id="loc-a-date" operation="gt" start="1000"/>
      </rule>
    </rsc_location>
  </constraints>
</configuration>
"#;

const ONE_NODE_STATUS: &str = r#"
<status>
  <node_state id="n1" uname="n1" online="true"/>
</status>
"#;

#[test]
fn next_recheck_when_present_is_strictly_after_now() {
    let outcome = Scheduler::schedule(FUTURE_RULE_CONFIG, ONE_NODE_STATUS, Timestamp(0)).expect("schedule should succeed");
    let recheck = outcome.next_recheck.expect("a not-yet-true date rule should imply a recheck time");
    assert!(recheck.0 > 0, "next_recheck must be strictly after now, got {recheck:?}");
}
