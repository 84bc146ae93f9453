//! Boolean rule trees: date specifications and attribute expressions,
//! evaluated against a target time and a node's attribute map.
//!
//! Every evaluation also reports the earliest future time at which its
//! truth value could change, if any — the per-rule contribution to the
//! working set's next-recheck time. A rule whose truth value can never
//! change again (e.g. a plain attribute equality with no date component)
//! reports `None`.

use std::collections::BTreeMap;

use crate::time::Timestamp;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttrOp {
    Defined,
    NotDefined,
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateOperation {
    Gt,
    Lt,
    InRange,
}

#[derive(Clone, Debug)]
pub struct DateSpec {
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
    pub operation: DateOperation,
}

#[derive(Clone, Debug)]
pub enum RuleExpr {
    DateExpr(DateSpec),
    AttrExpr {
        attribute: String,
        operation: AttrOp,
        value: Option<String>,
    },
    And(Vec<RuleExpr>),
    Or(Vec<RuleExpr>),
}

/// The result of evaluating a rule once: its truth value "now", plus the
/// earliest future instant (if any) at which re-evaluating would flip it.
#[derive(Clone, Copy, Debug)]
pub struct RuleOutcome {
    pub value: bool,
    pub next_change: Option<Timestamp>,
}

fn min_opt(a: Option<Timestamp>, b: Option<Timestamp>) -> Option<Timestamp> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

impl RuleExpr {
    pub fn evaluate(&self, now: Timestamp, attributes: &BTreeMap<String, String>) -> RuleOutcome {
        match self {
            RuleExpr::DateExpr(spec) => evaluate_date(spec, now),
            RuleExpr::AttrExpr {
                attribute,
                operation,
                value,
            } => RuleOutcome {
                value: evaluate_attr(attributes, attribute, *operation, value.as_deref()),
                // attribute expressions are re-checked only when status
                // changes, never on a timer, so they contribute no
                // next-recheck hint.
                next_change: None,
            },
            RuleExpr::And(children) => combine(children, now, attributes, true),
            RuleExpr::Or(children) => combine(children, now, attributes, false),
        }
    }
}

fn combine(
    children: &[RuleExpr],
    now: Timestamp,
    attributes: &BTreeMap<String, String>,
    all: bool,
) -> RuleOutcome {
    let mut value = all;
    let mut next_change = None;
    for child in children {
        let outcome = child.evaluate(now, attributes);
        value = if all {
            value && outcome.value
        } else {
            value || outcome.value
        };
        next_change = min_opt(next_change, outcome.next_change);
    }
    RuleOutcome { value, next_change }
}

fn evaluate_date(spec: &DateSpec, now: Timestamp) -> RuleOutcome {
    match spec.operation {
        DateOperation::Gt => {
            let start = spec.start.unwrap_or(Timestamp(i64::MIN));
            RuleOutcome {
                value: now > start,
                next_change: if now > start {
                    None
                } else {
                    start.checked_add_seconds(1)
                },
            }
        }
        DateOperation::Lt => {
            let end = spec.end.unwrap_or(Timestamp::MAX);
            RuleOutcome {
                value: now < end,
                next_change: if now < end { Some(end) } else { None },
            }
        }
        DateOperation::InRange => {
            let start = spec.start.unwrap_or(Timestamp(i64::MIN));
            let end = spec.end.unwrap_or(Timestamp::MAX);
            let value = now >= start && now < end;
            let next_change = if now < start {
                Some(start)
            } else if value {
                Some(end)
            } else {
                None
            };
            RuleOutcome { value, next_change }
        }
    }
}

fn evaluate_attr(
    attributes: &BTreeMap<String, String>,
    attribute: &str,
    operation: AttrOp,
    value: Option<&str>,
) -> bool {
    let current = attributes.get(attribute).map(String::as_str);
    match operation {
        AttrOp::Defined => current.is_some(),
        AttrOp::NotDefined => current.is_none(),
        AttrOp::Eq => current == value,
        AttrOp::Ne => current != value,
        AttrOp::Gt | AttrOp::Gte | AttrOp::Lt | AttrOp::Lte => {
            compare_numeric_or_lexical(current, value, operation)
        }
    }
}

fn compare_numeric_or_lexical(current: Option<&str>, rhs: Option<&str>, op: AttrOp) -> bool {
    let (Some(current), Some(rhs)) = (current, rhs) else {
        return false;
    };
    let ordering = match (current.parse::<f64>(), rhs.parse::<f64>()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b),
        _ => Some(current.cmp(rhs)),
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        AttrOp::Gt => ordering.is_gt(),
        AttrOp::Gte => ordering.is_ge(),
        AttrOp::Lt => ordering.is_lt(),
        AttrOp::Lte => ordering.is_le(),
        _ => unreachable!(),
    }
}

/// Folds the next-recheck contribution of many independent rule evaluations
/// into the single smallest future instant. `None` means no rule in this
/// pass implied a future change.
pub fn fold_recheck(current: Option<Timestamp>, outcome: &RuleOutcome) -> Option<Timestamp> {
    min_opt(current, outcome.next_change)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_gt_reports_next_change_at_boundary() {
        let spec = DateSpec {
            start: Some(Timestamp(100)),
            end: None,
            operation: DateOperation::Gt,
        };
        let outcome = spec_eval(&spec, Timestamp(50));
        assert!(!outcome.value);
        assert_eq!(outcome.next_change, Some(Timestamp(101)));
    }

    #[test]
    fn date_in_range_true_recheck_at_end() {
        let spec = DateSpec {
            start: Some(Timestamp(0)),
            end: Some(Timestamp(100)),
            operation: DateOperation::InRange,
        };
        let outcome = spec_eval(&spec, Timestamp(50));
        assert!(outcome.value);
        assert_eq!(outcome.next_change, Some(Timestamp(100)));
    }

    #[test]
    fn attr_eq_has_no_recheck_hint() {
        let mut attrs = BTreeMap::new();
        attrs.insert("role".to_string(), "primary".to_string());
        let expr = RuleExpr::AttrExpr {
            attribute: "role".into(),
            operation: AttrOp::Eq,
            value: Some("primary".into()),
        };
        let outcome = expr.evaluate(Timestamp(0), &attrs);
        assert!(outcome.value);
        assert!(outcome.next_change.is_none());
    }

    fn spec_eval(spec: &DateSpec, now: Timestamp) -> RuleOutcome {
        RuleExpr::DateExpr(spec.clone()).evaluate(now, &BTreeMap::new())
    }
}
