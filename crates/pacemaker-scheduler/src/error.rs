//! Diagnostics sink and the fatal error path.
//!
//! Per the error handling design: configuration errors, unsupported/deprecated
//! syntax and insufficient capacity are all *recoverable* — they are recorded
//! as [`Diagnostic`]s and scheduling continues. Only an [`Invariant`]
//! diagnostic escalates to a [`SchedulerError`], which aborts the pass before
//! graph emission. Nothing here is ever thrown as a panic or an exception;
//! `Scheduler::schedule` is the only public entry point and it always
//! returns, never unwinds.

use std::fmt;

use thiserror::Error;

use crate::ids::{ConstraintId, ResourceId};

/// Severity of a single diagnostic, ordered least to most serious.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Trace,
    Info,
    Warn,
    Error,
    ConfigError,
}

/// Which part of the error taxonomy a diagnostic belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticKind {
    /// Malformed XML, unknown reference, invalid rule, invalid enum, cycle.
    ConfigError,
    /// Deprecated syntax that is still parseable, signalled once per run.
    UnsupportedFeature,
    /// No viable node for a resource; it is scheduled to stop instead.
    InsufficientCapacity,
    /// Would indicate a scheduler bug; aborts the pass with no graph.
    Invariant,
}

/// One diagnostic message, optionally tied to the constraint or resource that
/// produced it so callers (and tests) can correlate without string matching.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    pub constraint_id: Option<ConstraintId>,
    pub resource_id: Option<ResourceId>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.severity, self.message)?;
        if let Some(id) = &self.constraint_id {
            write!(f, " (constraint={id})")?;
        }
        if let Some(id) = &self.resource_id {
            write!(f, " (resource={id})")?;
        }
        Ok(())
    }
}

/// Collected diagnostics for one scheduling pass, plus a "warn once" gate for
/// deprecated-syntax notices. The gate lives on this value, which is owned by
/// the in-progress pass and dropped at its end, so no global mutable state
/// survives between runs.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    warned_once: std::collections::BTreeSet<&'static str>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        #[cfg(feature = "tracing-events")]
        emit_tracing_event(&diagnostic);
        self.entries.push(diagnostic);
    }

    pub fn config_error(
        &mut self,
        constraint_id: Option<ConstraintId>,
        message: impl Into<String>,
    ) {
        self.push(Diagnostic {
            severity: Severity::ConfigError,
            kind: DiagnosticKind::ConfigError,
            message: message.into(),
            constraint_id,
            resource_id: None,
        });
    }

    pub fn insufficient_capacity(&mut self, resource_id: ResourceId, message: impl Into<String>) {
        self.push(Diagnostic {
            severity: Severity::Warn,
            kind: DiagnosticKind::InsufficientCapacity,
            message: message.into(),
            constraint_id: None,
            resource_id: Some(resource_id),
        });
    }

    pub fn invariant(&mut self, message: impl Into<String>) {
        self.push(Diagnostic {
            severity: Severity::Error,
            kind: DiagnosticKind::Invariant,
            message: message.into(),
            constraint_id: None,
            resource_id: None,
        });
    }

    /// Signals a deprecated-but-still-parseable feature exactly once per
    /// run, keyed by a caller-chosen stable tag (e.g. `"restart-type"`).
    pub fn unsupported_once(&mut self, tag: &'static str, message: impl Into<String>) {
        if self.warned_once.insert(tag) {
            self.push(Diagnostic {
                severity: Severity::Warn,
                kind: DiagnosticKind::UnsupportedFeature,
                message: message.into(),
                constraint_id: None,
                resource_id: None,
            });
        }
    }

    pub fn has_invariant_violation(&self) -> bool {
        self.entries
            .iter()
            .any(|d| d.kind == DiagnosticKind::Invariant)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

#[cfg(feature = "tracing-events")]
fn emit_tracing_event(diagnostic: &Diagnostic) {
    match diagnostic.severity {
        Severity::Trace => tracing::trace!(message = %diagnostic.message),
        Severity::Info => tracing::info!(message = %diagnostic.message),
        Severity::Warn => tracing::warn!(message = %diagnostic.message),
        Severity::Error | Severity::ConfigError => tracing::error!(message = %diagnostic.message),
    }
}

/// The only error type returned from the public entry point. Configuration
/// problems never reach here — see [`Diagnostics`] — this is reserved for
/// malformed input the parser cannot recover from and for invariant
/// violations discovered mid-pass.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// `configuration_xml` or `status_xml` did not parse as well-formed XML,
    /// or was missing a structurally required element.
    #[error("malformed input: {message}")]
    MalformedInput { message: String },
    /// A cycle was found in the ordering graph after all edges were added.
    /// Unlike other configuration errors this aborts the entire pass: no
    /// partial graph is ever returned.
    #[error("cycle in ordering graph: {}", members.join(" -> "))]
    OrderingCycle { members: Vec<String> },
    /// An internal invariant (never an external input problem) did not hold.
    #[error("invariant violation: {message}")]
    Invariant { message: String },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
