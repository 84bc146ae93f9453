//! S2: an anti-colocation (`score=-INFINITY`) between two stopped primitives
//! forces them onto different nodes, with no ordering implied between their
//! starts.

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
    <primitive id="B" class="ocf" provider="pacemaker" type="Dummy"/>
  </resources>
  <constraints>
    <rsc_colocation id="anti-b-a" rsc="B" with-rsc="A" score="-INFINITY"/>
  </constraints>
</configuration>
"#;

const STATUS: &str = r#"
<status>
  <node_state id="n1" uname="n1" online="true"/>
  <node_state id="n2" uname="n2" online="true"/>
</status>
"#;

#[test]
fn anti_colocated_resources_land_on_different_nodes_unordered() {
    let outcome = support::schedule(CONFIG, STATUS);
    let actions = support::actions(&outcome);

    let start_a = support::find(&actions, "A", "start").expect("A should start");
    let start_b = support::find(&actions, "B", "start").expect("B should start");

    assert_eq!(start_a.on_node, "n1");
    assert_eq!(start_b.on_node, "n2");
    assert_ne!(start_a.on_node, start_b.on_node);

    assert!(!support::is_ordered_after(&actions, "A", "start", "B", "start"));
    assert!(!support::is_ordered_after(&actions, "B", "start", "A", "start"));
}
