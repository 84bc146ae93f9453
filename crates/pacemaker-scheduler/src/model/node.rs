use std::collections::BTreeMap;

use crate::ids::NodeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    ClusterMember,
    Remote,
    Guest,
    Bundle,
}

/// A node as reported by live status, plus its CIB attributes. Nodes carry
/// no back-reference to the resources running on them — `Resource::running_on`
/// and `Resource::allocated_node` are the only links, kept on the resource
/// side so a node can be dropped from status without invalidating anything.
#[derive(Clone, Debug)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub online: bool,
    pub unclean: bool,
    pub shutdown: bool,
    pub standby: bool,
    pub maintenance: bool,
    pub pending: bool,
    pub attributes: BTreeMap<String, String>,
    pub utilization: BTreeMap<String, i64>,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            online: false,
            unclean: false,
            shutdown: false,
            standby: false,
            maintenance: false,
            pending: false,
            attributes: BTreeMap::new(),
            utilization: BTreeMap::new(),
        }
    }

    /// A node is eligible to host new work if it is online, clean, not
    /// shutting down, not in standby and not under maintenance. Maintenance
    /// nodes still count as "running" their current resources (the scheduler
    /// must not touch them) but never receive new allocations.
    pub fn can_run_new_work(&self) -> bool {
        self.online && !self.unclean && !self.shutdown && !self.standby && !self.maintenance
    }

    /// Reads a `#health-*` attribute as an ordered health level, used by the
    /// node-health placement strategies. Pacemaker's convention is
    /// `red < yellow < green`; an absent or unrecognized value is `green`
    /// (healthy) so health strategies are opt-in per attribute.
    pub fn health_level(&self, attribute: &str) -> HealthLevel {
        match self.attributes.get(attribute).map(String::as_str) {
            Some("red") => HealthLevel::Red,
            Some("yellow") => HealthLevel::Yellow,
            _ => HealthLevel::Green,
        }
    }

    pub fn worst_health_level(&self) -> HealthLevel {
        self.attributes
            .keys()
            .filter(|key| key.starts_with("#health"))
            .map(|key| self.health_level(key))
            .min()
            .unwrap_or(HealthLevel::Green)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthLevel {
    Red,
    Yellow,
    Green,
}
