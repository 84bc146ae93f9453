//! Stable identifier newtypes shared across the working set.
//!
//! Every entity the scheduler reasons about — nodes, resources, constraints,
//! tickets, actions — is named by one of these types rather than a bare
//! `String`, so that call sites can't accidentally compare a node name
//! against a resource id. All of them sort and hash by their string value,
//! which is what lets `BTreeMap`/`BTreeSet` keyed by these types double as
//! the deterministic-iteration-by-id the scheduler's determinism invariant
//! requires.

use std::fmt;
use std::sync::Arc;

macro_rules! string_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn new(value: impl AsRef<str>) -> Self {
                Self(Arc::from(value.as_ref()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(NodeId, "Identifies a cluster node, remote node, guest, or bundle host.");
string_id!(ResourceId, "Identifies a primitive, group, clone, promotable clone, or bundle.");
string_id!(ConstraintId, "Identifies a location, colocation, ordering, or ticket constraint.");
string_id!(TicketId, "Identifies a cluster-wide ticket.");
string_id!(TagId, "Identifies a tag or template, before expansion into concrete resource ids.");

/// A clone or promotable clone instance id, formatted `<resource>:<index>`
/// (e.g. `C:0`). Distinct from [`ResourceId`] because instances are
/// synthesized by the placement engine, not read from the CIB.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(Arc<str>);

impl InstanceId {
    pub fn new(resource: &ResourceId, index: u32) -> Self {
        Self(Arc::from(format!("{resource}:{index}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Monotonically assigned action id, unique within one scheduling pass.
/// Unlike the other identifiers this one has no meaning across passes: the
/// working set is rebuilt from scratch every run (see the lifecycle note in
/// `working_set`), so action ids are simply allocated 0, 1, 2, ... in the
/// deterministic order actions are first created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActionId(pub u64);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonically assigned ordering-constraint id, surfaced in diagnostics so
/// `order_id="42"` in the emitted graph traces back to a specific constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
