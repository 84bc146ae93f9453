//! S3: a symmetric mandatory order constraint `start A then start B` implies
//! `start A -> start B` when both start, and the mirrored `stop B -> stop A`
//! when both are scheduled to stop.

#[path = "support.rs"]
mod support;

const START_CONFIG: &str = r#"
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
    <rsc_order id="a-then-b" first="A" first-action="start" then="B" then-action="start" kind="Mandatory" symmetrical="true"/>
  </constraints>
</configuration>
"#;

const START_STATUS: &str = r#"
<status>
  <node_state id="n1" uname="n1" online="true"/>
  <node_state id="n2" uname="n2" online="true"/>
</status>
"#;

#[test]
fn both_starting_gets_the_forward_edge() {
    let outcome = support::schedule(START_CONFIG, START_STATUS);
    let actions = support::actions(&outcome);

    support::find(&actions, "A", "start").expect("A should start");
    support::find(&actions, "B", "start").expect("B should start");
    assert!(support::is_ordered_after(&actions, "A", "start", "B", "start"));
}

const STOP_CONFIG: &str = r#"
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
    <rsc_order id="a-then-b" first="A" first-action="start" then="B" then-action="start" kind="Mandatory" symmetrical="true"/>
  </constraints>
</configuration>
"#;

const STOP_STATUS: &str = r#"
<status>
  <node_state id="n1" uname="n1" online="false">
    <lrm>
      <lrm_resources>
        <lrm_resource id="A">
          <lrm_rsc_op call-id="2" operation="start" rc-code="0"/>
        </lrm_resource>
        <lrm_resource id="B">
          <lrm_rsc_op call-id="2" operation="start" rc-code="0"/>
        </lrm_resource>
      </lrm_resources>
    </lrm>
  </node_state>
</status>
"#;

#[test]
fn both_stopping_gets_the_mirrored_edge() {
    let outcome = support::schedule(STOP_CONFIG, STOP_STATUS);
    let actions = support::actions(&outcome);

    support::find(&actions, "A", "stop").expect("A should stop");
    support::find(&actions, "B", "stop").expect("B should stop");
    assert!(support::is_ordered_after(&actions, "B", "stop", "A", "stop"));
}
