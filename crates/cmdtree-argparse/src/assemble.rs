use std::collections::HashMap;

use indexmap::IndexMap;

use crate::error::FieldError;
use crate::set::Slot;
use crate::tree::{CommandTree, NodeId, SpecRef};
use crate::value::{FromValue, Value};

/// One entry of a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Value(Value),
    Group(Record),
}

/// Decoded values of one command, shaped like its declaration: own fields
/// and embedded groups in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: IndexMap<String, Field>,
}

impl Record {
    /// Look up a field by dotted path (`"foo.verbose"`).
    pub fn field(&self, path: &str) -> Option<&Field> {
        let mut segments = path.split('.');
        let mut field = self.fields.get(segments.next()?)?;
        for segment in segments {
            let Field::Group(group) = field else {
                return None;
            };
            field = group.fields.get(segment)?;
        }
        Some(field)
    }

    pub fn value(&self, path: &str) -> Result<&Value, FieldError> {
        match self.field(path) {
            Some(Field::Value(value)) => Ok(value),
            Some(Field::Group(_)) => Err(FieldError::NotAValue(path.to_string())),
            None => Err(FieldError::Missing(path.to_string())),
        }
    }

    pub fn group(&self, path: &str) -> Result<&Record, FieldError> {
        match self.field(path) {
            Some(Field::Group(group)) => Ok(group),
            Some(Field::Value(_)) => Err(FieldError::NotAGroup(path.to_string())),
            None => Err(FieldError::Missing(path.to_string())),
        }
    }

    /// Typed read of a value field.
    pub fn get<T: FromValue>(&self, path: &str) -> Result<T, FieldError> {
        T::from_value(self.value(path)?).map_err(|reason| FieldError::Type {
            field: path.to_string(),
            reason,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Conversion from a decoded record into a caller-defined type.
pub trait FromRecord: Sized {
    fn from_record(record: &Record) -> Result<Self, FieldError>;
}

impl FromRecord for Record {
    fn from_record(record: &Record) -> Result<Self, FieldError> {
        Ok(record.clone())
    }
}

/// A successful parse: the selected command path and one record per command
/// on it, root first.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    nodes: Vec<NodeId>,
    command: Vec<String>,
    records: Vec<Record>,
}

impl Parsed {
    /// Command names from the root to the selected leaf.
    pub fn command_path(&self) -> &[String] {
        &self.command
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Whether the selected command is `path` (names below the root).
    pub fn is(&self, path: &[&str]) -> bool {
        self.command.len() == path.len() + 1
            && self.command[1..].iter().zip(path).all(|(a, b)| a == b)
    }

    pub fn leaf(&self) -> &Record {
        &self.records[self.records.len() - 1]
    }

    pub fn root(&self) -> &Record {
        &self.records[0]
    }

    /// Record of the command called `name` on the selected path.
    pub fn scope(&self, name: &str) -> Option<&Record> {
        self.command
            .iter()
            .position(|c| c == name)
            .map(|i| &self.records[i])
    }

    pub fn scopes(&self) -> impl Iterator<Item = (&str, &Record)> {
        self.command
            .iter()
            .map(String::as_str)
            .zip(self.records.iter())
    }

    pub fn leaf_as<T: FromRecord>(&self) -> Result<T, FieldError> {
        T::from_record(self.leaf())
    }
}

fn build_record(
    node: NodeId,
    slots: &[Slot],
    decoded: &mut HashMap<SpecRef, Value>,
    tree: &CommandTree,
) -> Record {
    let args = tree.node(node).args();
    let mut fields = IndexMap::with_capacity(slots.len());
    for slot in slots {
        match slot {
            Slot::Spec(index) => {
                let spec = SpecRef { node, index: *index };
                let value = decoded.remove(&spec).unwrap_or(Value::Absent);
                fields.insert(args.specs()[*index].field().to_string(), Field::Value(value));
            }
            Slot::Group { field, slots } => {
                let group = build_record(node, slots, decoded, tree);
                fields.insert(field.clone(), Field::Group(group));
            }
        }
    }
    Record { fields }
}

/// Shape decoded values into one record per command on `path`.
pub(crate) fn assemble(
    tree: &CommandTree,
    path: &[NodeId],
    mut decoded: HashMap<SpecRef, Value>,
) -> Parsed {
    let records = path
        .iter()
        .map(|&node| build_record(node, tree.node(node).args().layout(), &mut decoded, tree))
        .collect();
    Parsed {
        nodes: path.to_vec(),
        command: tree.command_names(path),
        records,
    }
}
