//! S6: a resource bound to a ticket via `loss-policy=fence` gets its running
//! node fenced, and stays stopped, once the ticket is no longer granted.

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
  <constraints>
    <rsc_ticket id="a-needs-tkt" rsc="A" ticket="tkt" loss-policy="fence"/>
  </constraints>
</configuration>
"#;

const STATUS: &str = r#"
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
  <tickets>
    <ticket id="tkt" granted="false"/>
  </tickets>
</status>
"#;

#[test]
fn revoked_fencing_ticket_fences_the_running_node_and_stays_stopped() {
    let outcome = support::schedule(CONFIG, STATUS);
    let actions = support::actions(&outcome);

    let fence = support::find(&actions, "node:n1", "stonith").expect("n1 should be fenced when the ticket is lost");
    let stop = support::find(&actions, "A", "stop").expect("A should stop on the fenced node");
    assert!(stop.predecessors.contains(&fence.id), "the stop must wait for the fence to complete");

    assert!(support::find(&actions, "A", "start").is_none(), "A has nowhere granted to run, so it should not restart");
}

const GRANTED_STATUS: &str = r#"
<status>
  <node_state id="n1" uname="n1" online="true"/>
  <node_state id="n2" uname="n2" online="true"/>
  <tickets>
    <ticket id="tkt" granted="true"/>
  </tickets>
</status>
"#;

#[test]
fn granted_ticket_lets_the_resource_start_normally() {
    let outcome = support::schedule(CONFIG, GRANTED_STATUS);
    let actions = support::actions(&outcome);

    support::find(&actions, "A", "start").expect("a granted ticket should not block placement");
    assert!(support::find(&actions, "node:n1", "stonith").is_none());
}
