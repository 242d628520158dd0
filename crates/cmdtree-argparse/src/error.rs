use std::fmt;

use thiserror::Error;

use crate::spec::SpecId;

/// Broad classification of a [`ParseError`].
///
/// Presentation layers usually switch on this to pick wording and an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnknownOption,
    AmbiguousOption,
    MissingValue,
    UnexpectedValue,
    MissingSubcommand,
    MissingRequiredArgument,
    InvalidValue,
    ArityMismatch,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownOption => "unknown-option",
            Self::AmbiguousOption => "ambiguous-option",
            Self::MissingValue => "missing-value",
            Self::UnexpectedValue => "unexpected-value",
            Self::MissingSubcommand => "missing-subcommand",
            Self::MissingRequiredArgument => "missing-required-argument",
            Self::InvalidValue => "invalid-value",
            Self::ArityMismatch => "arity-mismatch",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed parse.
///
/// Every variant carries the command path (root to the deepest command that
/// was entered) so callers can render context without re-walking the tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown option: {token}")]
    UnknownOption { token: String, command: Vec<String> },

    #[error("ambiguous option: {token} could be {}", .candidates.join(", "))]
    AmbiguousOption {
        token: String,
        candidates: Vec<String>,
        command: Vec<String>,
    },

    #[error("missing value for {option}")]
    MissingValue {
        option: String,
        spec: SpecId,
        command: Vec<String>,
    },

    #[error("unexpected value: {value}")]
    UnexpectedValue { value: String, command: Vec<String> },

    #[error("'{}' requires a subcommand: {}", .command.join(" "), .available.join(", "))]
    MissingSubcommand {
        available: Vec<String>,
        command: Vec<String>,
    },

    #[error("missing required argument: {display}")]
    MissingRequiredArgument {
        spec: SpecId,
        display: String,
        command: Vec<String>,
    },

    #[error("invalid value '{value}' for {display}: {reason}")]
    InvalidValue {
        spec: SpecId,
        display: String,
        value: String,
        reason: String,
        command: Vec<String>,
    },

    #[error("{display} expects {expected} value(s), found {found}")]
    ArityMismatch {
        spec: SpecId,
        display: String,
        expected: usize,
        found: usize,
        command: Vec<String>,
    },

    /// Several independent violations found in the same pass.
    #[error("{}", join_messages(.0))]
    Multiple(Vec<ParseError>),
}

fn join_messages(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ParseError {
    /// Collapse a list of errors: a single error stays as-is.
    pub(crate) fn from_many(mut errors: Vec<ParseError>) -> Self {
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            Self::Multiple(errors)
        }
    }

    /// The kind of this error (the first one, for [`ParseError::Multiple`]).
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownOption { .. } => ErrorKind::UnknownOption,
            Self::AmbiguousOption { .. } => ErrorKind::AmbiguousOption,
            Self::MissingValue { .. } => ErrorKind::MissingValue,
            Self::UnexpectedValue { .. } => ErrorKind::UnexpectedValue,
            Self::MissingSubcommand { .. } => ErrorKind::MissingSubcommand,
            Self::MissingRequiredArgument { .. } => ErrorKind::MissingRequiredArgument,
            Self::InvalidValue { .. } => ErrorKind::InvalidValue,
            Self::ArityMismatch { .. } => ErrorKind::ArityMismatch,
            Self::Multiple(errors) => errors
                .first()
                .map(|e| e.kind())
                .unwrap_or(ErrorKind::InvalidValue),
        }
    }

    /// Command names from the root to the command being parsed when the
    /// failure was detected.
    pub fn command_path(&self) -> &[String] {
        match self {
            Self::UnknownOption { command, .. }
            | Self::AmbiguousOption { command, .. }
            | Self::MissingValue { command, .. }
            | Self::UnexpectedValue { command, .. }
            | Self::MissingSubcommand { command, .. }
            | Self::MissingRequiredArgument { command, .. }
            | Self::InvalidValue { command, .. }
            | Self::ArityMismatch { command, .. } => command,
            Self::Multiple(errors) => errors.first().map(|e| e.command_path()).unwrap_or(&[]),
        }
    }

    /// Identity of the argument involved, when the failure is tied to one.
    pub fn spec(&self) -> Option<&SpecId> {
        match self {
            Self::MissingValue { spec, .. }
            | Self::MissingRequiredArgument { spec, .. }
            | Self::InvalidValue { spec, .. }
            | Self::ArityMismatch { spec, .. } => Some(spec),
            Self::Multiple(errors) => errors.first().and_then(|e| e.spec()),
            _ => None,
        }
    }

    /// The raw input text that triggered the failure, if any.
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::UnknownOption { token, .. } | Self::AmbiguousOption { token, .. } => {
                Some(token)
            }
            Self::MissingValue { option, .. } => Some(option),
            Self::UnexpectedValue { value, .. } | Self::InvalidValue { value, .. } => Some(value),
            Self::Multiple(errors) => errors.first().and_then(|e| e.token()),
            _ => None,
        }
    }

    /// Iterate over the individual errors (one item unless this is `Multiple`).
    pub fn iter(&self) -> impl Iterator<Item = &ParseError> {
        let errors: Vec<&ParseError> = match self {
            Self::Multiple(errors) => errors.iter().collect(),
            other => vec![other],
        };
        errors.into_iter()
    }
}

/// Problems in a command declaration, detected when the set or tree is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("argument field name cannot be empty")]
    EmptyField,

    #[error("command name cannot be empty")]
    EmptyCommandName,

    #[error("duplicate argument: {0}")]
    DuplicateId(SpecId),

    #[error("arg definition conflict: {name} maps to both '{first}' and '{second}'")]
    DuplicateName {
        name: String,
        first: SpecId,
        second: SpecId,
    },

    #[error("invalid short name: {0:?}")]
    InvalidShort(char),

    #[error("invalid long name: {0:?}")]
    InvalidLong(String),

    #[error("positional argument '{0}' cannot have option names")]
    NamedPositional(SpecId),

    #[error("flag '{0}' cannot declare an arity")]
    FlagArity(SpecId),

    #[error("argument '{0}' declares an arity of zero values")]
    ZeroArity(SpecId),

    #[error("positional '{later}' follows unbounded positional '{unbounded}'")]
    PositionalAfterUnbounded { unbounded: SpecId, later: SpecId },

    #[error("invalid default value '{value}' for '{spec}': {reason}")]
    InvalidDefault {
        spec: SpecId,
        value: String,
        reason: String,
    },

    #[error("duplicate subcommand '{name}' under '{parent}'")]
    DuplicateSubcommand { parent: String, name: String },

    #[error(
        "alias conflict under '{parent}': '{alias}' refers to '{command}' and another subcommand"
    )]
    AliasConflict {
        parent: String,
        alias: String,
        command: String,
    },

    #[error("default subcommand '{name}' is not a subcommand of '{parent}'")]
    UnknownDefaultSubcommand { parent: String, name: String },
}

/// Failure to read a typed value out of a parsed record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("no such field: {0}")]
    Missing(String),

    #[error("field '{0}' is a group, not a value")]
    NotAValue(String),

    #[error("field '{0}' is a value, not a group")]
    NotAGroup(String),

    #[error("field '{field}': {reason}")]
    Type { field: String, reason: String },
}
