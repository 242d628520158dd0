use std::fmt;

use crate::error::DefinitionError;
use crate::value::{Value, ValueParser};

/// Stable identity of an argument inside a flattened [`ArgumentSet`].
///
/// Embedded groups prefix their members with the group's field name, so two
/// identically shaped groups stay distinguishable (`foo.verbose`,
/// `package.force`).
///
/// [`ArgumentSet`]: crate::ArgumentSet
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpecId(String);

impl SpecId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last path segment, i.e. the record field name.
    pub fn field(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    pub(crate) fn prefixed(&self, prefix: &str) -> Self {
        Self(format!("{prefix}.{}", self.0))
    }
}

impl fmt::Display for SpecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One spelling under which a flag or option can be written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NameForm {
    /// `--name`
    Long(String),
    /// `-c`
    Short(char),
    /// `-name`
    SingleDashLong(String),
}

impl NameForm {
    pub fn spelling(&self) -> String {
        match self {
            Self::Long(name) => format!("--{name}"),
            Self::Short(c) => format!("-{c}"),
            Self::SingleDashLong(name) => format!("-{name}"),
        }
    }
}

impl fmt::Display for NameForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spelling())
    }
}

/// How many raw values an argument consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    ExactlyOne,
    Optional,
    Exactly(usize),
    Unbounded,
    AtLeastOne,
}

impl Arity {
    pub fn is_required(&self) -> bool {
        matches!(self, Self::ExactlyOne | Self::Exactly(_) | Self::AtLeastOne)
    }

    /// Upper bound on bound values; `None` when unbounded.
    pub fn max(&self) -> Option<usize> {
        match self {
            Self::ExactlyOne | Self::Optional => Some(1),
            Self::Exactly(n) => Some(*n),
            Self::Unbounded | Self::AtLeastOne => None,
        }
    }

    /// Whether the decoded value is a list.
    pub fn is_multiple(&self) -> bool {
        matches!(self, Self::Exactly(_) | Self::Unbounded | Self::AtLeastOne)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Flag,
    Option,
    Positional,
}

/// Description of one bindable argument.
///
/// Specs are plain data; they are validated and given their final identity
/// when added to an [`ArgumentSet`](crate::ArgumentSet).
#[derive(Debug, Clone)]
pub struct ArgumentSpec {
    id: SpecId,
    field: String,
    names: Vec<NameForm>,
    arity: Arity,
    kind: ArgKind,
    parser: ValueParser,
    default_values: Vec<String>,
    value_name: Option<String>,
    help: String,
    arity_set: bool,
}

impl ArgumentSpec {
    fn new(field: impl Into<String>, kind: ArgKind, arity: Arity) -> Self {
        let field = field.into();
        Self {
            id: SpecId::new(field.clone()),
            field,
            names: Vec::new(),
            arity,
            kind,
            parser: ValueParser::string(),
            default_values: Vec::new(),
            value_name: None,
            help: String::new(),
            arity_set: false,
        }
    }

    /// A presence flag. Without explicit names it is spelled `--<field>`.
    pub fn flag(field: impl Into<String>) -> Self {
        Self::new(field, ArgKind::Flag, Arity::Optional)
    }

    /// A named option taking one value (optional unless told otherwise).
    pub fn option(field: impl Into<String>) -> Self {
        Self::new(field, ArgKind::Option, Arity::Optional)
    }

    /// A positional value, required by default.
    pub fn positional(field: impl Into<String>) -> Self {
        Self::new(field, ArgKind::Positional, Arity::ExactlyOne)
    }

    pub fn short(mut self, short: char) -> Self {
        self.names.push(NameForm::Short(short));
        self
    }

    /// Add a `--long` spelling. Leading dashes are ignored.
    pub fn long(mut self, long: impl Into<String>) -> Self {
        let long = long.into();
        self.names
            .push(NameForm::Long(long.trim().trim_start_matches('-').to_string()));
        self
    }

    /// Add a `-long` spelling (single dash, whole word).
    pub fn single_dash(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.names.push(NameForm::SingleDashLong(
            name.trim().trim_start_matches('-').to_string(),
        ));
        self
    }

    pub fn with_arity(mut self, arity: Arity) -> Self {
        self.arity = arity;
        self.arity_set = true;
        self
    }

    /// Shorthand for `ExactlyOne` / `Optional`.
    pub fn required(self, required: bool) -> Self {
        self.with_arity(if required {
            Arity::ExactlyOne
        } else {
            Arity::Optional
        })
    }

    pub fn value_parser(mut self, parser: ValueParser) -> Self {
        self.parser = parser;
        self
    }

    /// Raw text used when the argument is not given. May be repeated for
    /// list arities.
    pub fn default_value(mut self, raw: impl Into<String>) -> Self {
        self.default_values.push(raw.into());
        self
    }

    pub fn value_name(mut self, value_name: impl Into<String>) -> Self {
        self.value_name = Some(value_name.into());
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn id(&self) -> &SpecId {
        &self.id
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn names(&self) -> &[NameForm] {
        &self.names
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn kind(&self) -> ArgKind {
        self.kind
    }

    pub fn parser(&self) -> &ValueParser {
        &self.parser
    }

    pub fn default_values(&self) -> &[String] {
        &self.default_values
    }

    pub fn value_name_or_default(&self) -> String {
        self.value_name
            .clone()
            .unwrap_or_else(|| self.field.to_ascii_uppercase())
    }

    pub fn help_text(&self) -> &str {
        &self.help
    }

    pub fn takes_value(&self) -> bool {
        self.kind == ArgKind::Option
    }

    pub fn is_positional(&self) -> bool {
        self.kind == ArgKind::Positional
    }

    /// Required and without a fallback.
    pub fn is_required(&self) -> bool {
        self.arity.is_required() && self.default_values.is_empty()
    }

    /// The preferred spelling: first long, then single-dash, then short.
    pub fn primary_name(&self) -> Option<&NameForm> {
        self.names
            .iter()
            .find(|n| matches!(n, NameForm::Long(_)))
            .or_else(|| {
                self.names
                    .iter()
                    .find(|n| matches!(n, NameForm::SingleDashLong(_)))
            })
            .or_else(|| self.names.first())
    }

    /// Name used in messages: `--name`, `-n` or `<VALUE>`.
    pub fn display_name(&self) -> String {
        match self.primary_name() {
            Some(name) => name.spelling(),
            None => format!("<{}>", self.value_name_or_default()),
        }
    }

    /// Render `value` as the raw tokens that would bind it again.
    ///
    /// Flags emit their name when `true`; options emit name/value pairs (the
    /// inline form when the value itself starts with `-`); positionals emit
    /// their values, after `--` when one of them starts with `-`.
    ///
    /// Positional tokens switch the parser to literal mode, so they must be
    /// placed after every named token of the same invocation.
    /// [`CommandTree::encode`](crate::CommandTree::encode) does that for a
    /// whole record.
    pub fn encode(&self, value: &Value) -> Vec<String> {
        match self.kind {
            ArgKind::Flag => match (value, self.primary_name()) {
                (Value::Bool(true), Some(name)) => vec![name.spelling()],
                _ => Vec::new(),
            },
            ArgKind::Positional => {
                let raw = self.encode_values(value);
                if raw.iter().any(|r| reads_as_option(r)) {
                    std::iter::once("--".to_string()).chain(raw).collect()
                } else {
                    raw
                }
            }
            ArgKind::Option => {
                let Some(name) = self.primary_name() else {
                    return Vec::new();
                };
                let mut out = Vec::new();
                for raw in self.encode_values(value) {
                    if raw.starts_with('-') {
                        match name {
                            NameForm::Short(c) => out.push(format!("-{c}{raw}")),
                            _ => out.push(format!("{}={raw}", name.spelling())),
                        }
                    } else {
                        out.push(name.spelling());
                        out.push(raw);
                    }
                }
                out
            }
        }
    }

    /// Raw text of each scalar in `value`, without any names.
    pub(crate) fn encode_values(&self, value: &Value) -> Vec<String> {
        let scalars: Vec<&Value> = match value {
            Value::Absent => Vec::new(),
            Value::List(items) => items.iter().collect(),
            other => vec![other],
        };
        scalars.into_iter().filter_map(|v| self.parser.encode(v)).collect()
    }

    pub(crate) fn set_id(&mut self, id: SpecId) {
        self.id = id;
    }

    /// Validate a freshly declared spec and fill in its default long name.
    pub(crate) fn finalize(&mut self) -> Result<(), DefinitionError> {
        if self.field.trim().is_empty() {
            return Err(DefinitionError::EmptyField);
        }
        self.id = SpecId::new(self.field.clone());

        match self.kind {
            ArgKind::Positional if !self.names.is_empty() => {
                return Err(DefinitionError::NamedPositional(self.id.clone()));
            }
            ArgKind::Flag if self.arity_set => {
                return Err(DefinitionError::FlagArity(self.id.clone()));
            }
            ArgKind::Flag | ArgKind::Option if self.names.is_empty() => {
                self.names.push(NameForm::Long(self.field.replace('_', "-")));
            }
            _ => {}
        }
        if self.arity == Arity::Exactly(0) {
            return Err(DefinitionError::ZeroArity(self.id.clone()));
        }

        for name in &self.names {
            match name {
                NameForm::Short(c) => {
                    if *c == '-' || *c == '=' || c.is_whitespace() || c.is_control() {
                        return Err(DefinitionError::InvalidShort(*c));
                    }
                }
                NameForm::Long(long) | NameForm::SingleDashLong(long) => {
                    if long.is_empty() || long.contains('=') || long.contains(char::is_whitespace) {
                        return Err(DefinitionError::InvalidLong(long.clone()));
                    }
                }
            }
        }

        for raw in &self.default_values {
            if let Err(reason) = self.parser.decode(raw) {
                return Err(DefinitionError::InvalidDefault {
                    spec: self.id.clone(),
                    value: raw.clone(),
                    reason,
                });
            }
        }
        Ok(())
    }
}

/// Whether `raw` would be scanned as a named token outside literal mode.
pub(crate) fn reads_as_option(raw: &str) -> bool {
    raw.starts_with('-') && raw != "-"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_derives_long_name_from_field() {
        let mut spec = ArgumentSpec::flag("dry_run");
        spec.finalize().unwrap();
        assert_eq!(spec.names(), [NameForm::Long("dry-run".to_string())]);
        assert_eq!(spec.display_name(), "--dry-run");
    }

    #[test]
    fn finalize_keeps_explicit_short_only() {
        let mut spec = ArgumentSpec::flag("verbose").short('v');
        spec.finalize().unwrap();
        assert_eq!(spec.names(), [NameForm::Short('v')]);
        assert_eq!(spec.display_name(), "-v");
    }

    #[test]
    fn finalize_rejects_bad_declarations() {
        let mut named = ArgumentSpec::positional("input").short('i');
        assert!(matches!(
            named.finalize(),
            Err(DefinitionError::NamedPositional(_))
        ));

        let mut flag = ArgumentSpec::flag("force").with_arity(Arity::ExactlyOne);
        assert!(matches!(flag.finalize(), Err(DefinitionError::FlagArity(_))));

        let mut bad_long = ArgumentSpec::option("out").long("out put");
        assert!(matches!(
            bad_long.finalize(),
            Err(DefinitionError::InvalidLong(_))
        ));

        let mut bad_default = ArgumentSpec::option("jobs")
            .value_parser(ValueParser::uint())
            .default_value("many");
        assert!(matches!(
            bad_default.finalize(),
            Err(DefinitionError::InvalidDefault { .. })
        ));
    }

    #[test]
    fn encode_renders_tokens() {
        let mut flag = ArgumentSpec::flag("verbose").short('v');
        flag.finalize().unwrap();
        assert_eq!(flag.encode(&Value::Bool(true)), ["-v"]);
        assert!(flag.encode(&Value::Bool(false)).is_empty());

        let mut opt = ArgumentSpec::option("offset").value_parser(ValueParser::int());
        opt.finalize().unwrap();
        assert_eq!(opt.encode(&Value::Int(3)), ["--offset", "3"]);
        assert_eq!(opt.encode(&Value::Int(-3)), ["--offset=-3"]);

        let mut files = ArgumentSpec::positional("files").with_arity(Arity::Unbounded);
        files.finalize().unwrap();
        assert_eq!(
            files.encode(&Value::List(vec![Value::from("a"), Value::from("b")])),
            ["a", "b"]
        );
        assert_eq!(
            files.encode(&Value::List(vec![Value::from("-x.rs"), Value::from("b")])),
            ["--", "-x.rs", "b"]
        );
        assert_eq!(files.encode(&Value::from("-")), ["-"]);
    }

    #[test]
    fn spec_id_field_is_last_segment() {
        let id = SpecId::new("verbose").prefixed("foo");
        assert_eq!(id.as_str(), "foo.verbose");
        assert_eq!(id.field(), "verbose");
    }
}
