//! Fragmented tool-call assembly (spec.md §4.4 "State", "Per chunk").

use serde_json::{Map, Value};

use crate::traits::FunctionCallArgs;

/// A function call as it accumulates across streamed chunks.
#[derive(Debug, Clone, Default)]
pub struct AssembledCall {
    pub name: String,
    pub args: Map<String, Value>,
}

/// In-order, name-indexed accumulator (spec.md §4.4 `name -> assembled function-call`).
#[derive(Debug, Default)]
pub struct CallAssembler {
    order: Vec<AssembledCall>,
    index: std::collections::HashMap<String, usize>,
}

impl CallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one chunk's function-call fragment into the assembled state.
    pub fn merge(&mut self, name: String, args: FunctionCallArgs) {
        let idx = *self.index.entry(name.clone()).or_insert_with(|| {
            self.order.push(AssembledCall {
                name: name.clone(),
                args: Map::new(),
            });
            self.order.len() - 1
        });
        let slot = &mut self.order[idx];
        match args {
            FunctionCallArgs::Null => {}
            FunctionCallArgs::Map(m) => merge_dict(&mut slot.args, m),
            FunctionCallArgs::List(records) => {
                for record in records {
                    merge_dict(&mut slot.args, record);
                }
            }
        }
    }

    pub fn into_calls(self) -> Vec<AssembledCall> {
        self.order
    }
}

/// Shallow-merge `incoming` into `target`. Adjacent string fragments for the
/// same key are concatenated (the common shape for a streamed string
/// argument arriving one piece at a time); any other type replaces the prior
/// value outright (spec.md §4.4 "replacing non-dict args on update").
fn merge_dict(target: &mut Map<String, Value>, incoming: Map<String, Value>) {
    for (key, value) in incoming {
        match (target.get(&key), &value) {
            (Some(Value::String(existing)), Value::String(addition)) => {
                let merged = format!("{existing}{addition}");
                target.insert(key, Value::String(merged));
            }
            _ => {
                target.insert(key, value);
            }
        }
    }
}
