//! S1: a single unconstrained primitive on two online nodes starts on the
//! lexicographically first node and nothing else is scheduled.

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
  <node_state id="n1" uname="n1" online="true"/>
  <node_state id="n2" uname="n2" online="true"/>
</status>
"#;

#[test]
fn stopped_resource_starts_on_first_node_with_no_other_actions() {
    let outcome = support::schedule(CONFIG, STATUS);
    assert!(outcome.diagnostics.is_empty(), "unexpected diagnostics: {:?}", outcome.diagnostics);

    let actions = support::actions(&outcome);
    assert_eq!(actions.len(), 1, "expected exactly one action, got {actions:?}");

    let start = &actions[0];
    assert_eq!(start.subject, "A");
    assert_eq!(start.operation, "start");
    assert_eq!(start.on_node, "n1");
    assert!(start.predecessors.is_empty());
}
