use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoQuorumPolicy {
    Stop,
    Freeze,
    Ignore,
    Demote,
    Suicide,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeHealthStrategy {
    None,
    MigrateOnRed,
    OnlyGreen,
    Progressive,
    Custom,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlacementStrategy {
    Default,
    Utilization,
    Balanced,
    MinimalResources,
}

/// Cluster-wide property options, read verbatim off the CIB's `crm_config`
/// section and given typed defaults here. Anything not recognized stays
/// reachable through `extra` rather than being dropped, so a future option
/// this type doesn't yet model can still round-trip through diagnostics.
#[derive(Clone, Debug)]
pub struct ClusterOptions {
    pub no_quorum_policy: NoQuorumPolicy,
    pub symmetric_cluster: bool,
    pub maintenance_mode: bool,
    pub start_failure_is_fatal: bool,
    pub stonith_enabled: bool,
    pub concurrent_fencing: bool,
    pub priority_fencing_delay_ms: u64,
    pub node_health_strategy: NodeHealthStrategy,
    pub placement_strategy: PlacementStrategy,
    pub batch_limit: u32,
    pub migration_limit: i32,
    pub shutdown_lock: bool,
    pub shutdown_lock_limit_ms: u64,
    pub cluster_recheck_interval_ms: u64,
    pub enable_startup_probes: bool,
    pub extra: BTreeMap<String, String>,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            no_quorum_policy: NoQuorumPolicy::Stop,
            symmetric_cluster: true,
            maintenance_mode: false,
            start_failure_is_fatal: true,
            stonith_enabled: true,
            concurrent_fencing: false,
            priority_fencing_delay_ms: 0,
            node_health_strategy: NodeHealthStrategy::None,
            placement_strategy: PlacementStrategy::Default,
            batch_limit: 0,
            migration_limit: -1,
            shutdown_lock: false,
            shutdown_lock_limit_ms: 0,
            cluster_recheck_interval_ms: 15 * 60 * 1000,
            enable_startup_probes: true,
            extra: BTreeMap::new(),
        }
    }
}
