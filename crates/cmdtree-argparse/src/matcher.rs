use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::error::ParseError;
use crate::spec::ArgKind;
use crate::token::{Token, Tokenizer, classify, is_negative_number};
use crate::tree::{CommandTree, Lookup, NodeId, SpecRef};

/// Raw values collected for one spec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Binding<'a> {
    pub occurrences: usize,
    pub values: Vec<&'a str>,
}

/// Everything one parse bound, plus the command path it resolved.
#[derive(Debug, Clone)]
pub(crate) struct BindingTable<'a> {
    path: Vec<NodeId>,
    bound: IndexMap<SpecRef, Binding<'a>>,
}

impl<'a> BindingTable<'a> {
    fn new() -> Self {
        Self {
            path: vec![NodeId::ROOT],
            bound: IndexMap::new(),
        }
    }

    pub fn path(&self) -> &[NodeId] {
        &self.path
    }

    pub fn leaf(&self) -> NodeId {
        self.path.last().copied().unwrap_or(NodeId::ROOT)
    }

    pub fn get(&self, spec: SpecRef) -> Option<&Binding<'a>> {
        self.bound.get(&spec)
    }

    /// Values bound to `spec`, or occurrences for a flag.
    fn count(&self, spec: SpecRef) -> usize {
        self.bound
            .get(&spec)
            .map(|b| b.values.len().max(b.occurrences))
            .unwrap_or(0)
    }

    fn record(&mut self, spec: SpecRef, value: Option<&'a str>) {
        let binding = self.bound.entry(spec).or_default();
        binding.occurrences += 1;
        binding.values.extend(value);
    }
}

#[derive(Debug)]
pub(crate) enum MatchOutcome<'a> {
    Bound(BindingTable<'a>),
    Help(Vec<NodeId>),
    Version(Vec<NodeId>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Help,
    Version,
}

#[derive(Debug, Clone, Copy)]
enum NameRef<'a> {
    Long(&'a str),
    Short(char),
    SingleDash(&'a str),
}

impl NameRef<'_> {
    fn spelling(&self) -> String {
        match self {
            Self::Long(name) => format!("--{name}"),
            Self::Short(c) => format!("-{c}"),
            Self::SingleDash(name) => format!("-{name}"),
        }
    }
}

enum Scan {
    Spec(SpecRef),
    Builtin(Request),
}

/// A named token seen during the walk, bound once the leaf is known.
#[derive(Debug)]
struct Deferred<'a> {
    name: NameRef<'a>,
    value: Option<&'a str>,
    /// Spec the token resolved to when it was scanned.
    scanned: SpecRef,
}

fn looks_like_option(raw: &str, negative_numbers: bool) -> bool {
    raw == "--"
        || (raw.starts_with('-')
            && raw != "-"
            && !(negative_numbers && is_negative_number(raw)))
}

/// One parse attempt over one tree.
///
/// Named tokens are resolved in two steps. While walking, a token is scanned
/// against the current command's scope and its subtree, which decides whether
/// it consumes a value. After the walk it is bound against the leaf's scope,
/// so a flag written before the subcommand that declares it still lands on
/// that subcommand's spec.
pub(crate) struct Matcher<'t, 'a, S> {
    tree: &'t CommandTree,
    tokens: Tokenizer<'a, S>,
    table: BindingTable<'a>,
    deferred: Vec<Deferred<'a>>,
    request: Option<Request>,
}

impl<'t, 'a, S: AsRef<str>> Matcher<'t, 'a, S> {
    pub(crate) fn new(tree: &'t CommandTree, args: &'a [S]) -> Self {
        Self {
            tree,
            tokens: Tokenizer::new(args),
            table: BindingTable::new(),
            deferred: Vec::new(),
            request: None,
        }
    }

    pub(crate) fn run(mut self) -> Result<MatchOutcome<'a>, ParseError> {
        match self.walk() {
            Ok(()) => self.finish(),
            Err(err) => match self.request.or_else(|| self.requested_later()) {
                Some(request) => Ok(self.outcome(request)),
                None => Err(err),
            },
        }
    }

    fn node(&self) -> NodeId {
        self.table.leaf()
    }

    fn command(&self) -> Vec<String> {
        self.tree.command_names(&self.table.path)
    }

    fn walk(&mut self) -> Result<(), ParseError> {
        while let Some((index, token)) = self.tokens.next() {
            match token {
                Token::Terminator => {}
                Token::Long { name, value } => self.long(NameRef::Long(name), value)?,
                Token::ShortCluster(cluster) => self.short_cluster(index, cluster)?,
                Token::Positional(text) => self.positional(text)?,
            }
        }
        Ok(())
    }

    fn long(&mut self, name: NameRef<'a>, inline: Option<&'a str>) -> Result<(), ParseError> {
        match self.scan(name)? {
            Scan::Builtin(request) => {
                self.request.get_or_insert(request);
            }
            Scan::Spec(spec) => {
                let value = match inline {
                    Some(value) => Some(value),
                    None if self.tree.spec(spec).takes_value() => {
                        Some(self.next_value(name, spec)?)
                    }
                    None => None,
                };
                self.defer(name, value, spec);
            }
        }
        Ok(())
    }

    fn short_cluster(&mut self, index: usize, cluster: &'a str) -> Result<(), ParseError> {
        if self.tree.settings().negative_numbers {
            if let Some(raw) = self.tokens.raw_at(index) {
                let digit = cluster.chars().next().map(NameRef::Short);
                if is_negative_number(raw) && digit.is_some_and(|d| self.scan_exact(d).is_none()) {
                    return self.positional(raw);
                }
            }
        }

        let (word, inline) = match cluster.split_once('=') {
            Some((word, value)) => (word, Some(value)),
            None => (cluster, None),
        };
        let single_dash = NameRef::SingleDash(word);
        if self.scan_exact(single_dash).is_some() {
            return self.long(single_dash, inline);
        }

        for (offset, c) in cluster.char_indices() {
            let name = NameRef::Short(c);
            match self.scan(name)? {
                Scan::Builtin(request) => {
                    self.request.get_or_insert(request);
                }
                Scan::Spec(spec) if self.tree.spec(spec).takes_value() => {
                    let rest = &cluster[offset + c.len_utf8()..];
                    let value = if rest.is_empty() {
                        self.next_value(name, spec)?
                    } else {
                        rest.strip_prefix('=').unwrap_or(rest)
                    };
                    self.defer(name, Some(value), spec);
                    return Ok(());
                }
                Scan::Spec(spec) => {
                    let rest = &cluster[offset + c.len_utf8()..];
                    if let Some(value) = rest.strip_prefix('=') {
                        self.defer(name, Some(value), spec);
                        return Ok(());
                    }
                    self.defer(name, None, spec);
                }
            }
        }
        Ok(())
    }

    fn positional(&mut self, text: &'a str) -> Result<(), ParseError> {
        let here = self.node();
        if !self.tokens.is_literal() {
            if let Some(child) = self.tree.child_named(here, text) {
                self.descend(child);
                return Ok(());
            }
        }

        let next = self
            .tree
            .node(here)
            .args()
            .positionals()
            .map(|(index, _)| SpecRef { node: here, index })
            .find(|&spec| {
                self.tree
                    .spec(spec)
                    .arity()
                    .max()
                    .is_none_or(|max| self.table.count(spec) < max)
            });
        match (next, self.tree.node(here).default_child()) {
            (Some(spec), _) => {
                self.table.record(spec, Some(text));
                Ok(())
            }
            (None, Some(child)) => {
                self.descend(child);
                self.positional(text)
            }
            (None, None) => Err(ParseError::UnexpectedValue {
                value: text.to_string(),
                command: self.command(),
            }),
        }
    }

    fn descend(&mut self, child: NodeId) {
        debug!(command = self.tree.node(child).name(), "entering subcommand");
        self.table.path.push(child);
    }

    fn defer(&mut self, name: NameRef<'a>, value: Option<&'a str>, scanned: SpecRef) {
        trace!(token = %name.spelling(), value, "named token deferred");
        self.deferred.push(Deferred { name, value, scanned });
    }

    /// The next raw argument as an option value, unless it looks like an
    /// option itself.
    fn next_value(&mut self, name: NameRef<'a>, spec: SpecRef) -> Result<&'a str, ParseError> {
        let negative_numbers = self.tree.settings().negative_numbers;
        if let Some(raw) = self
            .tokens
            .peek_raw()
            .filter(|raw| !looks_like_option(raw, negative_numbers))
        {
            self.tokens.next_raw();
            return Ok(raw);
        }
        Err(ParseError::MissingValue {
            option: name.spelling(),
            spec: self.tree.spec(spec).id().clone(),
            command: self.command(),
        })
    }

    fn resolve_exact(&self, node: NodeId, name: NameRef<'_>) -> Option<SpecRef> {
        match name {
            NameRef::Long(long) => match self.tree.lookup_long(node, long, false) {
                Lookup::Found(spec) => Some(spec),
                _ => None,
            },
            NameRef::Short(c) => self.tree.lookup_short(node, c),
            NameRef::SingleDash(word) => self.tree.lookup_single_dash(node, word),
        }
    }

    /// Exact match in the current scope, else every distinct match below
    /// it, breadth-first.
    fn exact_hits(&self, name: NameRef<'_>) -> Vec<SpecRef> {
        let here = self.node();
        if let Some(spec) = self.resolve_exact(here, name) {
            return vec![spec];
        }
        let mut hits = Vec::new();
        for node in self.tree.descendants(here) {
            if let Some(spec) = self.resolve_exact(node, name) {
                if !hits.contains(&spec) {
                    hits.push(spec);
                }
            }
        }
        hits
    }

    fn scan_exact(&self, name: NameRef<'_>) -> Option<SpecRef> {
        self.exact_hits(name).first().copied()
    }

    /// Pick one of several subtree matches for `name`.
    ///
    /// Matches that agree on taking a value are interchangeable; binding
    /// happens later anyway. When they disagree, the subcommands named
    /// further along the input narrow the candidates until they agree.
    fn settle(&self, name: NameRef<'_>, hits: &[SpecRef]) -> Result<SpecRef, ParseError> {
        let takes_value = |spec: SpecRef| self.tree.spec(spec).takes_value();
        let agree = |specs: &[SpecRef]| match specs {
            [first, rest @ ..] if rest.iter().all(|&s| takes_value(s) == takes_value(*first)) => {
                Some(*first)
            }
            _ => None,
        };
        if let Some(spec) = agree(hits) {
            return Ok(spec);
        }

        let mut node = self.node();
        let mut candidates = hits.to_vec();
        let later = (self.tokens.position()..)
            .map_while(|index| self.tokens.raw_at(index))
            .take_while(|raw| *raw != "--");
        for raw in later {
            let Some(child) = self.tree.child_named(node, raw) else {
                continue;
            };
            node = child;
            candidates.retain(|spec| {
                self.tree.is_within(node, spec.node) || self.tree.is_within(spec.node, node)
            });
            if candidates.is_empty() {
                break;
            }
            if let Some(spec) = agree(&candidates) {
                return Ok(spec);
            }
        }

        Err(ParseError::AmbiguousOption {
            token: name.spelling(),
            candidates: hits
                .iter()
                .map(|spec| {
                    let owner = self.tree.command_names(&self.tree.path_to(spec.node));
                    format!("{} ({})", name.spelling(), owner.join(" "))
                })
                .collect(),
            command: self.command(),
        })
    }

    fn builtin(&self, name: NameRef<'_>) -> Option<Request> {
        let help = self.tree.settings().builtin_help;
        let version = self.tree.node(self.tree.root()).version().is_some();
        match name {
            NameRef::Long("help") | NameRef::Short('h') if help => Some(Request::Help),
            NameRef::Long("version") | NameRef::Short('V') if version => Some(Request::Version),
            _ => None,
        }
    }

    fn scan(&self, name: NameRef<'a>) -> Result<Scan, ParseError> {
        let hits = self.exact_hits(name);
        if !hits.is_empty() {
            return self.settle(name, &hits).map(Scan::Spec);
        }
        if let Some(request) = self.builtin(name) {
            return Ok(Scan::Builtin(request));
        }
        if let NameRef::Long(long) = name {
            if self.tree.settings().abbreviations {
                let here = self.node();
                match self.tree.lookup_long(here, long, true) {
                    Lookup::Found(spec) => return Ok(Scan::Spec(spec)),
                    Lookup::Ambiguous(hits) => return Err(self.ambiguous(name, hits)),
                    Lookup::NotFound => {}
                }
                let mut hits = Vec::new();
                for node in self.tree.descendants(here) {
                    if let Lookup::Found(spec) = self.tree.lookup_long(node, long, true) {
                        if !hits.contains(&spec) {
                            hits.push(spec);
                        }
                    }
                }
                if !hits.is_empty() {
                    return self.settle(name, &hits).map(Scan::Spec);
                }
            }
        }
        Err(ParseError::UnknownOption {
            token: name.spelling(),
            command: self.command(),
        })
    }

    fn ambiguous(&self, name: NameRef<'_>, hits: Vec<(String, SpecRef)>) -> ParseError {
        ParseError::AmbiguousOption {
            token: name.spelling(),
            candidates: hits.into_iter().map(|(spelling, _)| spelling).collect(),
            command: self.command(),
        }
    }

    /// A help or version request among the arguments not yet read.
    fn requested_later(&self) -> Option<Request> {
        if self.tokens.is_literal() {
            return None;
        }
        (self.tokens.position()..)
            .map_while(|index| self.tokens.raw_at(index))
            .take_while(|raw| *raw != "--")
            .find_map(|raw| {
                let name = match classify(raw) {
                    Token::Long { name, .. } => NameRef::Long(name),
                    Token::ShortCluster(cluster) => {
                        let mut chars = cluster.chars();
                        match (chars.next(), chars.next()) {
                            (Some(c), None) => NameRef::Short(c),
                            _ => return None,
                        }
                    }
                    _ => return None,
                };
                if self.scan_exact(name).is_some() {
                    return None;
                }
                self.builtin(name)
            })
    }

    fn outcome(self, request: Request) -> MatchOutcome<'a> {
        match request {
            Request::Help => MatchOutcome::Help(self.table.path),
            Request::Version => MatchOutcome::Version(self.table.path),
        }
    }

    fn finish(mut self) -> Result<MatchOutcome<'a>, ParseError> {
        if let Some(request) = self.request {
            return Ok(self.outcome(request));
        }
        while let Some(child) = self.tree.node(self.node()).default_child() {
            self.descend(child);
        }

        self.bind_deferred()?;
        self.check_required()?;

        let leaf = self.tree.node(self.node());
        if leaf.subcommand_required() && !leaf.children().is_empty() {
            return Err(ParseError::MissingSubcommand {
                available: leaf
                    .children()
                    .iter()
                    .map(|&child| self.tree.node(child).name().to_string())
                    .collect(),
                command: self.command(),
            });
        }
        Ok(MatchOutcome::Bound(self.table))
    }

    /// Bind every deferred named token against the leaf's visible scope.
    ///
    /// The leaf's spec is used when it agrees with the scanned one on taking
    /// a value. Otherwise the scanned spec keeps the token, provided its
    /// command was entered.
    fn bind_deferred(&mut self) -> Result<(), ParseError> {
        let leaf = self.node();
        let abbreviations = self.tree.settings().abbreviations;
        for Deferred { name, value, scanned } in std::mem::take(&mut self.deferred) {
            let at_leaf = match name {
                NameRef::Long(long) => match self.tree.lookup_long(leaf, long, abbreviations) {
                    Lookup::Found(spec) => Some(spec),
                    Lookup::Ambiguous(hits) => return Err(self.ambiguous(name, hits)),
                    Lookup::NotFound => None,
                },
                NameRef::Short(c) => self.tree.lookup_short(leaf, c),
                NameRef::SingleDash(word) => self.tree.lookup_single_dash(leaf, word),
            };
            let scanned_takes_value = self.tree.spec(scanned).takes_value();
            let spec = match at_leaf {
                Some(spec) if self.tree.spec(spec).takes_value() == scanned_takes_value => spec,
                _ if self.table.path.contains(&scanned.node) => scanned,
                Some(spec) => spec,
                None => {
                    return Err(ParseError::UnknownOption {
                        token: name.spelling(),
                        command: self.command(),
                    });
                }
            };

            let decl = self.tree.spec(spec);
            match (decl.kind(), value) {
                (ArgKind::Flag, Some(value)) => {
                    return Err(ParseError::UnexpectedValue {
                        value: value.to_string(),
                        command: self.command(),
                    });
                }
                (ArgKind::Option, None) => {
                    return Err(ParseError::MissingValue {
                        option: name.spelling(),
                        spec: decl.id().clone(),
                        command: self.command(),
                    });
                }
                _ => {}
            }
            trace!(spec = %decl.id(), command = self.tree.node(spec.node).name(), "bound");
            self.table.record(spec, value);
        }
        Ok(())
    }

    /// Report every required spec on the path that is unbound and still
    /// reachable from the leaf.
    fn check_required(&self) -> Result<(), ParseError> {
        let leaf = self.node();
        let mut missing = Vec::new();
        for &node in &self.table.path {
            for (index, decl) in self.tree.node(node).args().specs().iter().enumerate() {
                let spec = SpecRef { node, index };
                if decl.is_required()
                    && self.table.count(spec) == 0
                    && self.tree.is_reachable_from(leaf, spec)
                {
                    missing.push(ParseError::MissingRequiredArgument {
                        spec: decl.id().clone(),
                        display: decl.display_name(),
                        command: self.command(),
                    });
                }
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ParseError::from_many(missing))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::set::ArgumentSet;
    use crate::spec::{ArgumentSpec, Arity};
    use crate::tree::CommandBuilder;

    fn tool() -> CommandTree {
        CommandBuilder::new("tool")
            .version("1.2.3")
            .args(
                ArgumentSet::builder()
                    .arg(ArgumentSpec::flag("verbose").short('v').long("verbose"))
                    .arg(ArgumentSpec::option("output").short('o').long("output"))
                    .arg(ArgumentSpec::option("offset").long("offset").single_dash("off"))
                    .build()
                    .unwrap(),
            )
            .subcommand(
                CommandBuilder::new("copy").args(
                    ArgumentSet::builder()
                        .arg(ArgumentSpec::flag("force").short('f'))
                        .arg(ArgumentSpec::positional("src"))
                        .arg(ArgumentSpec::positional("rest").with_arity(Arity::Unbounded))
                        .build()
                        .unwrap(),
                ),
            )
            .build()
            .unwrap()
    }

    fn bound<'a>(tree: &CommandTree, args: &'a [&'a str]) -> BindingTable<'a> {
        match Matcher::new(tree, args).run() {
            Ok(MatchOutcome::Bound(table)) => table,
            other => panic!("expected bindings, got: {other:?}"),
        }
    }

    fn values<'t>(
        tree: &CommandTree,
        table: &'t BindingTable<'_>,
        path: &[&str],
        index: usize,
    ) -> Vec<&'t str> {
        let node = tree.find(path).unwrap();
        table
            .get(SpecRef { node, index })
            .map(|b| b.values.clone())
            .unwrap_or_default()
    }

    #[test]
    fn cluster_value_consumes_rest_of_token() {
        let tree = tool();
        let table = bound(&tree, &["-vofile.txt"]);
        assert_eq!(values(&tree, &table, &[], 1), ["file.txt"]);
        assert_eq!(table.get(SpecRef { node: NodeId::ROOT, index: 0 }).unwrap().occurrences, 1);

        let table = bound(&tree, &["-o=x", "-o", "y"]);
        assert_eq!(values(&tree, &table, &[], 1), ["x", "y"]);
    }

    #[test]
    fn single_dash_long_wins_over_cluster() {
        let tree = tool();
        let table = bound(&tree, &["-off", "3"]);
        assert_eq!(values(&tree, &table, &[], 2), ["3"]);
        let table = bound(&tree, &["-off=-3"]);
        assert_eq!(values(&tree, &table, &[], 2), ["-3"]);
    }

    #[test]
    fn negative_numbers_are_values() {
        let tree = tool();
        let table = bound(&tree, &["--offset", "-5", "copy", "-1", "-2.5"]);
        assert_eq!(values(&tree, &table, &[], 2), ["-5"]);
        assert_eq!(values(&tree, &table, &["copy"], 1), ["-1"]);
        assert_eq!(values(&tree, &table, &["copy"], 2), ["-2.5"]);
    }

    #[test]
    fn option_value_must_not_look_like_option() {
        let tree = tool();
        let err = Matcher::new(&tree, &["--output", "-v"]).run().unwrap_err();
        match err {
            ParseError::MissingValue { option, spec, .. } => {
                assert_eq!(option, "--output");
                assert_eq!(spec.as_str(), "output");
            }
            other => panic!("expected MissingValue, got: {other:?}"),
        }
    }

    #[test]
    fn child_flag_before_subcommand_binds_to_child() {
        let tree = tool();
        let table = bound(&tree, &["-f", "copy", "a"]);
        let copy = tree.find(&["copy"]).unwrap();
        assert_eq!(table.path(), [NodeId::ROOT, copy]);
        assert_eq!(table.get(SpecRef { node: copy, index: 0 }).unwrap().occurrences, 1);

        let err = Matcher::new(&tree, &["-f"]).run().unwrap_err();
        assert!(matches!(err, ParseError::UnknownOption { ref token, .. } if token == "-f"));
    }

    #[test]
    fn flag_with_inline_value_is_unexpected() {
        let tree = tool();
        let err = Matcher::new(&tree, &["--verbose=yes"]).run().unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedValue { ref value, .. } if value == "yes"));

        let err = Matcher::new(&tree, &["-v=x"]).run().unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedValue { ref value, .. } if value == "x"));
    }

    #[test]
    fn unbounded_positional_absorbs_after_terminator() {
        let tree = tool();
        let table = bound(&tree, &["copy", "a", "--", "-f", "copy"]);
        assert_eq!(values(&tree, &table, &["copy"], 1), ["a"]);
        assert_eq!(values(&tree, &table, &["copy"], 2), ["-f", "copy"]);
    }

    #[test]
    fn help_and_version_requests_override_errors() {
        let tree = tool();
        let copy = tree.find(&["copy"]).unwrap();
        match Matcher::new(&tree, &["copy", "--help"]).run() {
            Ok(MatchOutcome::Help(path)) => assert_eq!(path, [NodeId::ROOT, copy]),
            other => panic!("expected Help, got: {other:?}"),
        }
        match Matcher::new(&tree, &["--bogus", "-h"]).run() {
            Ok(MatchOutcome::Help(path)) => assert_eq!(path, [NodeId::ROOT]),
            other => panic!("expected Help, got: {other:?}"),
        }
        assert!(matches!(
            Matcher::new(&tree, &["-V"]).run(),
            Ok(MatchOutcome::Version(_))
        ));
        assert!(matches!(
            Matcher::new(&tree, &["copy", "--", "--help"]).run(),
            Ok(MatchOutcome::Bound(_))
        ));
    }
}
