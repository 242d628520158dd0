//! JSON description of a command tree.
//!
//! These types are plain data: they say which commands exist, what arguments
//! each one declares, and which shared groups they embed. Turning a document
//! into a parser is the job of the consumer (the `cmdtree` binary does it
//! with `cmdtree-argparse`).

use serde::{Deserialize, Serialize};

/// Current value of [`SchemaDocument::format_version`].
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ArgKind {
    #[default]
    Flag,
    Option,
    Positional,
}

/// How many values an argument takes.
///
/// Serialized as `"one"`, `"optional"`, `{"exactly": n}`, `"many"` or
/// `"one-or-more"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArityField {
    One,
    Optional,
    Exactly(usize),
    Many,
    OneOrMore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ValueType {
    #[default]
    String,
    Int,
    Uint,
    Float,
    Bool,
    Path,
}

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct ArgSchema {
    pub name: String,
    #[serde(default)]
    pub kind: ArgKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<char>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long: Option<String>,
    /// Extra `--long` spellings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// `-name` spellings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub single_dash: Vec<String>,
    /// Defaults to `optional` for flags and options, `one` for positionals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arity: Option<ArityField>,
    #[serde(default, skip_serializing_if = "is_default")]
    pub value_type: ValueType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub possible_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_name: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub help: String,
}

/// A reusable set of arguments that commands embed under a field name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct GroupSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<ArgSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct EmbedSchema {
    /// Field name of the sub-record.
    pub field: String,
    /// Name of a [`GroupSchema`] in the same document.
    pub group: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct CommandSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<ArgSchema>,
    /// Groups embedded after `args`, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embed: Vec<EmbedSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subcommands: Vec<CommandSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_subcommand: Option<String>,
    #[serde(default)]
    pub subcommand_required: bool,
}

/// Top-level JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SchemaDocument {
    pub format_version: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupSchema>,
    pub command: CommandSchema,
}

impl SchemaDocument {
    pub fn new(command: CommandSchema) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            groups: Vec::new(),
            command,
        }
    }

    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn find_group(&self, name: &str) -> Option<&GroupSchema> {
        self.groups.iter().find(|g| g.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kebab_case_document() {
        let doc = SchemaDocument::from_json_str(
            r#"{
                "format-version": 1,
                "groups": [{ "name": "common", "args": [{ "name": "verbose", "short": "v" }] }],
                "command": {
                    "name": "tool",
                    "embed": [{ "field": "common", "group": "common" }],
                    "subcommands": [{
                        "name": "run",
                        "subcommand-required": false,
                        "args": [
                            {
                                "name": "jobs",
                                "kind": "option",
                                "value-type": "uint",
                                "default-value": "2"
                            },
                            { "name": "points", "kind": "option", "arity": { "exactly": 2 } },
                            { "name": "files", "kind": "positional", "arity": "one-or-more" }
                        ]
                    }]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(doc.format_version, FORMAT_VERSION);
        let verbose = &doc.find_group("common").unwrap().args[0];
        assert_eq!(verbose.kind, ArgKind::Flag);
        assert_eq!(verbose.short, Some('v'));
        assert!(doc.find_group("missing").is_none());

        let run = &doc.command.subcommands[0];
        assert_eq!(run.args[0].value_type, ValueType::Uint);
        assert_eq!(run.args[1].arity, Some(ArityField::Exactly(2)));
        assert_eq!(run.args[2].arity, Some(ArityField::OneOrMore));
    }

    #[test]
    fn serialization_omits_defaults() {
        let doc = SchemaDocument::new(CommandSchema {
            name: "tool".to_string(),
            args: vec![ArgSchema {
                name: "name".to_string(),
                kind: ArgKind::Option,
                ..Default::default()
            }],
            ..Default::default()
        });
        let json = doc.to_json_pretty().unwrap();
        assert!(json.contains("\"format-version\": 1"), "{json}");
        assert!(!json.contains("value-type"), "{json}");
        assert!(!json.contains("groups"), "{json}");
        assert_eq!(SchemaDocument::from_json_str(&json).unwrap(), doc);
    }
}
