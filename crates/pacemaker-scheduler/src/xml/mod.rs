//! XML at the boundary only. `cib` turns the two input documents into a
//! [`crate::model::WorkingSet`]; `graph_writer` turns a finished action graph
//! back into the transition-graph wire format. Nothing between the two talks
//! XML — the core matches on typed enums, never tag names.

pub mod cib;
pub mod graph_writer;
