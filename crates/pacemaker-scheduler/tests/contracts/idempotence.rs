//! Testable property #8: once a transition has actually run, re-scheduling
//! from the resulting status is a no-op — the scheduler never re-issues an
//! action for a resource that is already where it was told to go.

#[path = "support.rs"]
mod support;

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

const BEFORE_STATUS: &str = r#"
<status>
  <node_state id="n1" uname="n1" online="true"/>
  <node_state id="n2" uname="n2" online="true"/>
</status>
"#;

const AFTER_STATUS: &str = r#"
<status>
  <node_state id="n1" uname="n1" online="true">
    <lrm>
      <lrm_resources>
        <lrm_resource id="A">
          <lrm_rsc_op call-id="2" operation="start" rc-code="0"/>
        </lrm_resource>
      </lrm_resources>
    </lrm>
  </node_state>
  <node_state id="n2" uname="n2" online="true"/>
</status>
"#;

#[test]
fn rescheduling_after_the_graph_ran_produces_no_further_actions() {
    let first = support::schedule(CONFIG, BEFORE_STATUS);
    let first_actions = support::actions(&first);
    assert_eq!(first_actions.len(), 1);
    assert_eq!(first_actions[0].subject, "A");
    assert_eq!(first_actions[0].operation, "start");
    assert_eq!(first_actions[0].on_node, "n1");

    let second = support::schedule(CONFIG, AFTER_STATUS);
    assert!(second.diagnostics.is_empty(), "unexpected diagnostics: {:?}", second.diagnostics);
    let second_actions = support::actions(&second);
    assert!(second_actions.is_empty(), "expected no further actions once the graph ran, got {second_actions:?}");
}
