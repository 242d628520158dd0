//! Declarative argument matching for nested command trees.
//!
//! Commands declare their arguments as [`ArgumentSpec`]s collected into an
//! [`ArgumentSet`] (optionally embedding shared groups), and are wired into an
//! immutable [`CommandTree`]. A parse call walks raw arguments through the
//! tree and either returns the decoded records of the selected command path
//! or a [`ParseError`] carrying its [`ErrorKind`], the offending token and the
//! command path.
//!
//! The tree is built once and can be shared between threads; every parse
//! owns its own state.
//!
//! ```
//! use cmdtree_argparse::{ArgumentSet, ArgumentSpec, CommandBuilder, ParseOutcome};
//!
//! let tree = CommandBuilder::new("tool")
//!     .args(
//!         ArgumentSet::builder()
//!             .arg(ArgumentSpec::flag("verbose").short('v'))
//!             .build()
//!             .unwrap(),
//!     )
//!     .subcommand(CommandBuilder::new("run").args(
//!         ArgumentSet::builder()
//!             .arg(ArgumentSpec::positional("target"))
//!             .build()
//!             .unwrap(),
//!     ))
//!     .build()
//!     .unwrap();
//!
//! let ParseOutcome::Matches(parsed) = tree.parse(&["run", "-v", "all"]).unwrap() else {
//!     panic!("expected matches");
//! };
//! assert!(parsed.is(&["run"]));
//! assert_eq!(parsed.root().get::<bool>("verbose"), Ok(true));
//! assert_eq!(parsed.leaf().get::<String>("target"), Ok("all".to_string()));
//! ```

mod assemble;
mod decode;
mod error;
mod matcher;
mod set;
mod spec;
mod token;
mod tree;
mod value;

use thiserror::Error;

pub use assemble::{Field, FromRecord, Parsed, Record};
pub use error::{DefinitionError, ErrorKind, FieldError, ParseError};
pub use set::{ArgumentSet, ArgumentSetBuilder, Slot};
pub use spec::{ArgKind, ArgumentSpec, Arity, NameForm, SpecId};
pub use token::{Token, Tokenizer, classify};
pub use tree::{CommandBuilder, CommandNode, CommandTree, NodeId, ParserSettings, SpecRef};
pub use value::{FromValue, Value, ValueParser};

use matcher::{MatchOutcome, Matcher};

pub type ParseResult<T> = Result<T, ParseError>;

/// What a successful parse produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome<T = Parsed> {
    Matches(T),
    /// `-h` / `--help` was given; `command` names the command it applies to.
    Help { command: Vec<String>, node: NodeId },
    /// `-V` / `--version` was given and the root declares a version.
    Version { command: Vec<String>, version: String },
}

impl<T> ParseOutcome<T> {
    pub fn map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<ParseOutcome<U>, E> {
        Ok(match self {
            Self::Matches(value) => ParseOutcome::Matches(f(value)?),
            Self::Help { command, node } => ParseOutcome::Help { command, node },
            Self::Version { command, version } => ParseOutcome::Version { command, version },
        })
    }
}

/// Failure of [`CommandTree::try_parse_leaf`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeafError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Field(#[from] FieldError),
}

impl CommandTree {
    /// Parse raw arguments (without the program name).
    pub fn parse<S: AsRef<str>>(&self, args: &[S]) -> ParseResult<ParseOutcome> {
        let table = match Matcher::new(self, args).run()? {
            MatchOutcome::Bound(table) => table,
            MatchOutcome::Help(path) => {
                let node = path.last().copied().unwrap_or(NodeId::ROOT);
                return Ok(ParseOutcome::Help {
                    command: self.command_names(&path),
                    node,
                });
            }
            MatchOutcome::Version(path) => {
                let version = self.node(self.root()).version().unwrap_or_default();
                return Ok(ParseOutcome::Version {
                    command: self.command_names(&path),
                    version: version.to_string(),
                });
            }
        };
        let decoded = decode::decode(self, &table)?;
        Ok(ParseOutcome::Matches(assemble::assemble(self, table.path(), decoded)))
    }

    /// Parse and convert the selected command's record into `T`.
    pub fn try_parse_leaf<T: FromRecord, S: AsRef<str>>(
        &self,
        args: &[S],
    ) -> Result<ParseOutcome<T>, LeafError> {
        Ok(self.parse(args)?.map(|parsed| parsed.leaf_as::<T>())?)
    }

    /// Render `record`, as assembled for `node`, back into the arguments that
    /// follow `node` on a command line.
    ///
    /// Named arguments come first. Positionals follow, behind `--` when one of
    /// them would otherwise read as an option or as a subcommand of `node`.
    pub fn encode(&self, node: NodeId, record: &Record) -> Result<Vec<String>, FieldError> {
        let mut named = Vec::new();
        let mut positional = Vec::new();
        for spec in self.node(node).args().specs() {
            let value = record.value(spec.id().as_str())?;
            if spec.is_positional() {
                positional.extend(spec.encode_values(value));
            } else {
                named.extend(spec.encode(value));
            }
        }
        let literal = positional
            .iter()
            .any(|raw| spec::reads_as_option(raw) || self.child_named(node, raw).is_some());
        if literal {
            named.push("--".to_string());
        }
        named.extend(positional);
        Ok(named)
    }

    /// Check `args` without keeping the result.
    pub fn validate<S: AsRef<str>>(&self, args: &[S]) -> ParseResult<()> {
        self.parse(args).map(|_| ())
    }
}
