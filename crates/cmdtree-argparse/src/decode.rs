use std::collections::HashMap;

use tracing::debug;

use crate::error::ParseError;
use crate::matcher::BindingTable;
use crate::spec::{ArgKind, ArgumentSpec, Arity};
use crate::tree::{CommandTree, SpecRef};
use crate::value::Value;

/// Decode every spec declared along the bound path.
///
/// Failures do not stop decoding; all of them are returned together.
pub(crate) fn decode(
    tree: &CommandTree,
    table: &BindingTable<'_>,
) -> Result<HashMap<SpecRef, Value>, ParseError> {
    let command = tree.command_names(table.path());
    let mut decoded = HashMap::new();
    let mut errors = Vec::new();

    for &node in table.path() {
        for (index, spec) in tree.node(node).args().specs().iter().enumerate() {
            let spec_ref = SpecRef { node, index };
            let binding = table.get(spec_ref);
            let result = match spec.kind() {
                ArgKind::Flag => Ok(Value::Bool(binding.is_some_and(|b| b.occurrences > 0))),
                _ => {
                    let raw: Vec<&str> = binding.map(|b| b.values.clone()).unwrap_or_default();
                    decode_values(spec, &raw, &command)
                }
            };
            match result {
                Ok(value) => {
                    decoded.insert(spec_ref, value);
                }
                Err(mut errs) => errors.append(&mut errs),
            }
        }
    }

    if errors.is_empty() {
        Ok(decoded)
    } else {
        Err(ParseError::from_many(errors))
    }
}

fn decode_values(
    spec: &ArgumentSpec,
    raw: &[&str],
    command: &[String],
) -> Result<Value, Vec<ParseError>> {
    let arity = spec.arity();
    if let Arity::Exactly(expected) = arity {
        if !raw.is_empty() && raw.len() != expected {
            return Err(vec![ParseError::ArityMismatch {
                spec: spec.id().clone(),
                display: spec.display_name(),
                expected,
                found: raw.len(),
                command: command.to_vec(),
            }]);
        }
    }

    let defaults: Vec<&str>;
    let raw = if raw.is_empty() {
        defaults = spec.default_values().iter().map(String::as_str).collect();
        defaults.as_slice()
    } else {
        raw
    };

    let mut values = Vec::with_capacity(raw.len());
    let mut errors = Vec::new();
    for text in raw {
        match spec.parser().decode(text) {
            Ok(value) => values.push(value),
            Err(reason) => {
                debug!(spec = %spec.id(), value = *text, %reason, "value rejected");
                errors.push(ParseError::InvalidValue {
                    spec: spec.id().clone(),
                    display: spec.display_name(),
                    value: text.to_string(),
                    reason,
                    command: command.to_vec(),
                });
            }
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    if arity.is_multiple() {
        Ok(Value::List(values))
    } else {
        Ok(values.pop().unwrap_or(Value::Absent))
    }
}
