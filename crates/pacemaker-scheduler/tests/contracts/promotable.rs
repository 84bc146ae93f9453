//! S4: a promotable clone with `clone-max=3`, `clone-node-max=1` and
//! `promoted-max=1` spreads one instance per node and promotes only the
//! instance on the node with the highest `master-<id>` score.

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
    <node id="n3" uname="n3"/>
  </nodes>
  <resources>
    <clone id="ms">
      <meta_attributes id="ms-meta">
        <nvpair id="ms-promotable" name="promotable" value="true"/>
        <nvpair id="ms-clone-max" name="clone-max" value="3"/>
        <nvpair id="ms-clone-node-max" name="clone-node-max" value="1"/>
        <nvpair id="ms-promoted-max" name="promoted-max" value="1"/>
        <nvpair id="ms-promoted-node-max" name="promoted-node-max" value="1"/>
      </meta_attributes>
      <primitive id="db" class="ocf" provider="pacemaker" type="Dummy"/>
    </clone>
  </resources>
  <constraints/>
</configuration>
"#;

const STATUS: &str = r#"
<status>
  <node_state id="n1" uname="n1" online="true">
    <transient_attributes id="n1">
      <instance_attributes id="n1-attrs">
        <nvpair id="n1-master-ms" name="master-ms" value="10"/>
      </instance_attributes>
    </transient_attributes>
  </node_state>
  <node_state id="n2" uname="n2" online="true">
    <transient_attributes id="n2">
      <instance_attributes id="n2-attrs">
        <nvpair id="n2-master-ms" name="master-ms" value="20"/>
      </instance_attributes>
    </transient_attributes>
  </node_state>
  <node_state id="n3" uname="n3" online="true">
    <transient_attributes id="n3">
      <instance_attributes id="n3-attrs">
        <nvpair id="n3-master-ms" name="master-ms" value="5"/>
      </instance_attributes>
    </transient_attributes>
  </node_state>
</status>
"#;

#[test]
fn only_the_highest_scoring_instance_is_promoted() {
    let outcome = support::schedule(CONFIG, STATUS);
    assert!(outcome.diagnostics.is_empty(), "unexpected diagnostics: {:?}", outcome.diagnostics);
    let actions = support::actions(&outcome);

    let starts: Vec<_> = actions.iter().filter(|a| a.operation == "start").collect();
    assert_eq!(starts.len(), 3, "expected one start per instance, got {actions:?}");

    let promotes: Vec<_> = actions.iter().filter(|a| a.operation == "promote").collect();
    assert_eq!(promotes.len(), 1, "expected exactly one promotion, got {actions:?}");
    assert_eq!(promotes[0].on_node, "n2", "the node with the highest master-ms score should be promoted");

    // the promoted instance starts before it is promoted
    assert!(support::is_ordered_after(&actions, promotes[0].subject.as_str(), "start", promotes[0].subject.as_str(), "promote"));

    let demotes: Vec<_> = actions.iter().filter(|a| a.operation == "demote").collect();
    assert!(demotes.is_empty(), "nothing was previously promoted, so nothing should demote");
}
