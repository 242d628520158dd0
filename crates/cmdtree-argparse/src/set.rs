use std::collections::{HashMap, HashSet};

use crate::error::DefinitionError;
use crate::spec::{ArgumentSpec, NameForm, SpecId};

/// Where a spec or an embedded group sits in the record a set decodes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// Index into [`ArgumentSet::specs`].
    Spec(usize),
    Group { field: String, slots: Vec<Slot> },
}

impl Slot {
    fn shifted(&self, offset: usize) -> Self {
        match self {
            Self::Spec(index) => Self::Spec(index + offset),
            Self::Group { field, slots } => Self::Group {
                field: field.clone(),
                slots: slots.iter().map(|s| s.shifted(offset)).collect(),
            },
        }
    }
}

/// The flattened arguments of one command.
///
/// Own declarations and embedded groups are laid out in declaration order;
/// `layout` remembers the nesting so the decoded values can be reassembled
/// into nested records.
#[derive(Debug, Clone, Default)]
pub struct ArgumentSet {
    specs: Vec<ArgumentSpec>,
    layout: Vec<Slot>,
}

impl ArgumentSet {
    pub fn builder() -> ArgumentSetBuilder {
        ArgumentSetBuilder::default()
    }

    pub fn specs(&self) -> &[ArgumentSpec] {
        &self.specs
    }

    pub fn layout(&self) -> &[Slot] {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn get(&self, id: &SpecId) -> Option<&ArgumentSpec> {
        self.specs.iter().find(|s| s.id() == id)
    }

    /// Positional specs with their indices, in declaration order.
    pub fn positionals(&self) -> impl Iterator<Item = (usize, &ArgumentSpec)> {
        self.specs
            .iter()
            .enumerate()
            .filter(|(_, spec)| spec.is_positional())
    }
}

#[derive(Debug, Clone)]
enum Item {
    Spec(ArgumentSpec),
    Group(String, ArgumentSet),
}

/// Collects own specs and embedded groups for an [`ArgumentSet`].
#[derive(Debug, Clone, Default)]
pub struct ArgumentSetBuilder {
    items: Vec<Item>,
}

impl ArgumentSetBuilder {
    pub fn arg(mut self, spec: ArgumentSpec) -> Self {
        self.items.push(Item::Spec(spec));
        self
    }

    /// Embed a shared group under `field`. Each embedding decodes into its
    /// own sub-record.
    pub fn group(mut self, field: impl Into<String>, set: &ArgumentSet) -> Self {
        self.items.push(Item::Group(field.into(), set.clone()));
        self
    }

    pub fn build(self) -> Result<ArgumentSet, DefinitionError> {
        let mut specs: Vec<ArgumentSpec> = Vec::new();
        let mut layout: Vec<Slot> = Vec::new();
        let mut fields: HashSet<String> = HashSet::new();

        for item in self.items {
            match item {
                Item::Spec(mut spec) => {
                    spec.finalize()?;
                    if !fields.insert(spec.field().to_string()) {
                        return Err(DefinitionError::DuplicateId(spec.id().clone()));
                    }
                    layout.push(Slot::Spec(specs.len()));
                    specs.push(spec);
                }
                Item::Group(field, set) => {
                    if field.trim().is_empty() {
                        return Err(DefinitionError::EmptyField);
                    }
                    if !fields.insert(field.clone()) {
                        return Err(DefinitionError::DuplicateId(SpecId::new(field)));
                    }
                    let offset = specs.len();
                    layout.push(Slot::Group {
                        field: field.clone(),
                        slots: set.layout.iter().map(|s| s.shifted(offset)).collect(),
                    });
                    for mut spec in set.specs {
                        let id = spec.id().prefixed(&field);
                        spec.set_id(id);
                        specs.push(spec);
                    }
                }
            }
        }

        validate_names(&specs)?;
        validate_positionals(&specs)?;
        Ok(ArgumentSet { specs, layout })
    }
}

fn validate_names(specs: &[ArgumentSpec]) -> Result<(), DefinitionError> {
    let mut seen: HashMap<&NameForm, &SpecId> = HashMap::new();
    for spec in specs {
        for name in spec.names() {
            if let Some(first) = seen.insert(name, spec.id()) {
                return Err(DefinitionError::DuplicateName {
                    name: name.spelling(),
                    first: first.clone(),
                    second: spec.id().clone(),
                });
            }
        }
    }
    Ok(())
}

fn validate_positionals(specs: &[ArgumentSpec]) -> Result<(), DefinitionError> {
    let mut unbounded: Option<&SpecId> = None;
    for spec in specs.iter().filter(|s| s.is_positional()) {
        if let Some(prev) = unbounded {
            return Err(DefinitionError::PositionalAfterUnbounded {
                unbounded: prev.clone(),
                later: spec.id().clone(),
            });
        }
        if spec.arity().max().is_none() {
            unbounded = Some(spec.id());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Arity;

    fn verbose_group() -> ArgumentSet {
        ArgumentSet::builder()
            .arg(ArgumentSpec::flag("verbose").short('v'))
            .build()
            .unwrap()
    }

    #[test]
    fn embedded_groups_get_prefixed_ids_and_layout() {
        let set = ArgumentSet::builder()
            .group("foo", &verbose_group())
            .arg(ArgumentSpec::positional("input"))
            .build()
            .unwrap();

        let ids: Vec<&str> = set.specs().iter().map(|s| s.id().as_str()).collect();
        assert_eq!(ids, ["foo.verbose", "input"]);
        assert_eq!(
            set.layout(),
            [
                Slot::Group {
                    field: "foo".to_string(),
                    slots: vec![Slot::Spec(0)],
                },
                Slot::Spec(1),
            ]
        );
    }

    #[test]
    fn nested_embedding_shifts_indices() {
        let inner = ArgumentSet::builder()
            .arg(ArgumentSpec::option("level"))
            .group("foo", &verbose_group())
            .build()
            .unwrap();
        let outer = ArgumentSet::builder()
            .arg(ArgumentSpec::flag("quiet").short('q'))
            .group("inner", &inner)
            .build()
            .unwrap();

        let ids: Vec<&str> = outer.specs().iter().map(|s| s.id().as_str()).collect();
        assert_eq!(ids, ["quiet", "inner.level", "inner.foo.verbose"]);
        let Slot::Group { slots, .. } = &outer.layout()[1] else {
            panic!("expected group slot");
        };
        assert_eq!(slots[0], Slot::Spec(1));
        assert!(matches!(&slots[1], Slot::Group { slots, .. } if slots == &[Slot::Spec(2)]));
    }

    #[test]
    fn duplicate_names_across_groups_are_rejected() {
        let err = ArgumentSet::builder()
            .arg(ArgumentSpec::flag("version").short('v'))
            .group("foo", &verbose_group())
            .build()
            .unwrap_err();
        match err {
            DefinitionError::DuplicateName { name, first, second } => {
                assert_eq!(name, "-v");
                assert_eq!(first.as_str(), "version");
                assert_eq!(second.as_str(), "foo.verbose");
            }
            other => panic!("expected DuplicateName, got: {other:?}"),
        }
    }

    #[test]
    fn duplicate_fields_are_rejected() {
        let err = ArgumentSet::builder()
            .arg(ArgumentSpec::option("name"))
            .arg(ArgumentSpec::positional("name"))
            .build()
            .unwrap_err();
        assert_eq!(err, DefinitionError::DuplicateId(SpecId::new("name")));
    }

    #[test]
    fn unbounded_positional_must_be_last() {
        let err = ArgumentSet::builder()
            .arg(ArgumentSpec::positional("files").with_arity(Arity::Unbounded))
            .arg(ArgumentSpec::positional("dest"))
            .build()
            .unwrap_err();
        assert!(matches!(err, DefinitionError::PositionalAfterUnbounded { .. }));

        let ok = ArgumentSet::builder()
            .arg(ArgumentSpec::positional("dest"))
            .arg(ArgumentSpec::option("mode"))
            .arg(ArgumentSpec::positional("files").with_arity(Arity::AtLeastOne))
            .build();
        assert!(ok.is_ok());
    }
}
