//! S5: a resource running on an unclean node is fenced before it is stopped,
//! and only starts elsewhere once the fencing pseudo-action has run.

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

const STATUS: &str = r#"
<status>
  <node_state id="n1" uname="n1" online="false" unclean="true">
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
fn unclean_node_is_fenced_before_the_resource_restarts_elsewhere() {
    let outcome = support::schedule(CONFIG, STATUS);
    let actions = support::actions(&outcome);

    let fence = support::find(&actions, "node:n1", "stonith").expect("n1 should be fenced");
    let stop = support::find(&actions, "A", "stop").expect("A should stop on the fenced node");
    let start = support::find(&actions, "A", "start").expect("A should start elsewhere");

    assert_eq!(start.on_node, "n2");
    assert!(stop.predecessors.contains(&fence.id), "the stop must wait for the fence to complete");
    assert!(support::is_ordered_after(&actions, "A", "stop", "A", "start"));
}
