use cmdtree_argparse::{CommandTree, Field, ParseError, ParseOutcome, Parsed, Record, Value};
use serde::Serialize;
use serde_json::{Map, Number, Value as JsonValue};

pub fn value_json(value: &Value) -> JsonValue {
    match value {
        Value::Absent => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Int(n) => JsonValue::from(*n),
        Value::UInt(n) => JsonValue::from(*n),
        Value::Float(n) => Number::from_f64(*n).map_or(JsonValue::Null, JsonValue::Number),
        Value::Str(s) => JsonValue::String(s.clone()),
        Value::Path(p) => JsonValue::String(p.display().to_string()),
        Value::List(items) => JsonValue::Array(items.iter().map(value_json).collect()),
    }
}

pub fn record_json(record: &Record) -> JsonValue {
    let fields: Map<String, JsonValue> = record
        .iter()
        .map(|(name, field)| {
            let value = match field {
                Field::Value(value) => value_json(value),
                Field::Group(group) => record_json(group),
            };
            (name.to_string(), value)
        })
        .collect();
    JsonValue::Object(fields)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ErrorReport {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl From<&ParseError> for ErrorReport {
    fn from(err: &ParseError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            spec: err.spec().map(ToString::to_string),
            token: err.token().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeKind {
    Matches,
    Help,
    Version,
    Error,
}

/// JSON document printed by `cmdtree parse`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ParseReport {
    pub ok: bool,
    pub outcome: OutcomeKind,
    pub command: Vec<String>,
    /// Leaf record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<JsonValue>,
    /// Record of every command on the path, keyed by the command path up to
    /// it (`"foo package"`), so repeated names stay distinct.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub scopes: Map<String, JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Individual failures when several were found at once.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorReport>,
}

impl ParseReport {
    fn empty(ok: bool, outcome: OutcomeKind, command: Vec<String>) -> Self {
        Self {
            ok,
            outcome,
            command,
            values: None,
            scopes: Map::new(),
            version: None,
            kind: None,
            message: None,
            errors: Vec::new(),
        }
    }

    pub fn matches(parsed: &Parsed) -> Self {
        let mut report = Self::empty(true, OutcomeKind::Matches, parsed.command_path().to_vec());
        report.values = Some(record_json(parsed.leaf()));
        let mut path = String::new();
        for (name, record) in parsed.scopes() {
            if !path.is_empty() {
                path.push(' ');
            }
            path.push_str(name);
            report.scopes.insert(path.clone(), record_json(record));
        }
        report
    }

    pub fn from_outcome(outcome: &ParseOutcome) -> Self {
        match outcome {
            ParseOutcome::Matches(parsed) => Self::matches(parsed),
            ParseOutcome::Help { command, .. } => {
                Self::empty(true, OutcomeKind::Help, command.clone())
            }
            ParseOutcome::Version { command, version } => {
                let mut report = Self::empty(true, OutcomeKind::Version, command.clone());
                report.version = Some(version.clone());
                report
            }
        }
    }

    pub fn from_error(err: &ParseError) -> Self {
        let mut report = Self::empty(false, OutcomeKind::Error, err.command_path().to_vec());
        report.kind = Some(err.kind().to_string());
        report.message = Some(err.to_string());
        if matches!(err, ParseError::Multiple(_)) {
            report.errors = err.iter().map(ErrorReport::from).collect();
        }
        report
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ArgSummary {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub help: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CommandSummary {
    pub path: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// Own and embedded arguments, flattened.
    pub args: Vec<ArgSummary>,
    pub subcommands: usize,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub subcommand_required: bool,
}

/// JSON document printed by `cmdtree check --json`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CheckReport {
    pub schema: String,
    pub commands: Vec<CommandSummary>,
}

impl CheckReport {
    pub fn new(schema: String, tree: &CommandTree) -> Self {
        let commands = tree
            .node_ids()
            .map(|id| {
                let node = tree.node(id);
                CommandSummary {
                    path: tree.command_names(&tree.path_to(id)),
                    aliases: node.aliases().to_vec(),
                    args: node
                        .args()
                        .specs()
                        .iter()
                        .map(|spec| ArgSummary {
                            name: spec.display_name(),
                            help: spec.help_text().to_string(),
                        })
                        .collect(),
                    subcommands: node.children().len(),
                    subcommand_required: node.subcommand_required(),
                }
            })
            .collect();
        Self { schema, commands }
    }
}
