use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::error::DefinitionError;
use crate::set::ArgumentSet;
use crate::spec::{ArgumentSpec, NameForm};

/// Index of a command in its [`CommandTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Tree-wide identity of a spec: the command that declares it and its index
/// in that command's [`ArgumentSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpecRef {
    pub node: NodeId,
    pub index: usize,
}

/// Knobs shared by every parse against a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserSettings {
    /// Accept a unique case-insensitive prefix of a long name.
    pub abbreviations: bool,
    /// Treat undeclared `-h` / `--help` as a help request.
    pub builtin_help: bool,
    /// Accept `-5`, `-0.5` as values when no short name claims the digit.
    pub negative_numbers: bool,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            abbreviations: true,
            builtin_help: true,
            negative_numbers: true,
        }
    }
}

/// Result of resolving a name against a command's visible scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Lookup {
    Found(SpecRef),
    /// Several long names share the prefix; sorted by name.
    Ambiguous(Vec<(String, SpecRef)>),
    NotFound,
}

/// Names visible from one command: its own specs shadow its ancestors'.
#[derive(Debug, Clone, Default)]
struct ScopeIndex {
    long: BTreeMap<String, SpecRef>,
    short: BTreeMap<char, SpecRef>,
    single_dash: BTreeMap<String, SpecRef>,
}

impl ScopeIndex {
    fn extend_own(&mut self, node: NodeId, args: &ArgumentSet) {
        for (index, spec) in args.specs().iter().enumerate() {
            let spec_ref = SpecRef { node, index };
            for name in spec.names() {
                match name {
                    NameForm::Long(long) => {
                        self.long.insert(long.clone(), spec_ref);
                    }
                    NameForm::Short(c) => {
                        self.short.insert(*c, spec_ref);
                    }
                    NameForm::SingleDashLong(long) => {
                        self.single_dash.insert(long.clone(), spec_ref);
                    }
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct CommandNode {
    name: String,
    aliases: Vec<String>,
    args: ArgumentSet,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    default_child: Option<NodeId>,
    subcommand_required: bool,
    version: Option<String>,
    scope: ScopeIndex,
}

impl CommandNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn args(&self) -> &ArgumentSet {
        &self.args
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn default_child(&self) -> Option<NodeId> {
        self.default_child
    }

    pub fn subcommand_required(&self) -> bool {
        self.subcommand_required
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

/// An immutable tree of commands, built once and shared by every parse.
///
/// Nodes live in an arena; parent and child links are indices, so there is
/// no shared ownership between commands.
#[derive(Debug)]
pub struct CommandTree {
    nodes: Vec<CommandNode>,
    settings: ParserSettings,
}

impl CommandTree {
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn node(&self, id: NodeId) -> &CommandNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn settings(&self) -> ParserSettings {
        self.settings
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + use<> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn spec(&self, spec: SpecRef) -> &ArgumentSpec {
        &self.nodes[spec.node.0].args.specs()[spec.index]
    }

    /// Child of `parent` called `name` (or aliased to it). Exact and
    /// case-sensitive.
    pub fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let children = &self.node(parent).children;
        children
            .iter()
            .copied()
            .find(|&c| self.node(c).name == name)
            .or_else(|| {
                children
                    .iter()
                    .copied()
                    .find(|&c| self.node(c).aliases.iter().any(|a| a == name))
            })
    }

    /// Resolve a command by its names below the root.
    pub fn find(&self, path: &[&str]) -> Option<NodeId> {
        path.iter()
            .try_fold(self.root(), |node, name| self.child_named(node, name))
    }

    /// Root-to-`id` chain of commands.
    pub fn path_to(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut cur = id;
        while let Some(parent) = self.node(cur).parent {
            path.push(parent);
            cur = parent;
        }
        path.reverse();
        path
    }

    pub fn command_names(&self, path: &[NodeId]) -> Vec<String> {
        path.iter().map(|&id| self.node(id).name.clone()).collect()
    }

    /// Every command below `id`, breadth-first in declaration order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut queue: VecDeque<NodeId> = self.node(id).children.iter().copied().collect();
        while let Some(next) = queue.pop_front() {
            out.push(next);
            queue.extend(self.node(next).children.iter().copied());
        }
        out
    }

    /// Resolve `--name` from `node`. With `allow_prefix`, a unique
    /// case-insensitive prefix is accepted when there is no exact match.
    pub(crate) fn lookup_long(&self, node: NodeId, name: &str, allow_prefix: bool) -> Lookup {
        let scope = &self.node(node).scope;
        if let Some(&spec) = scope.long.get(name) {
            return Lookup::Found(spec);
        }
        if !allow_prefix || name.is_empty() {
            return Lookup::NotFound;
        }

        let needle = name.to_lowercase();
        let hits: Vec<(String, SpecRef)> = scope
            .long
            .iter()
            .filter(|(long, _)| long.to_lowercase().starts_with(&needle))
            .map(|(long, &spec)| (format!("--{long}"), spec))
            .collect();
        let distinct: HashSet<SpecRef> = hits.iter().map(|(_, spec)| *spec).collect();
        match distinct.len() {
            0 => Lookup::NotFound,
            1 => Lookup::Found(hits[0].1),
            _ => Lookup::Ambiguous(hits),
        }
    }

    pub(crate) fn lookup_short(&self, node: NodeId, c: char) -> Option<SpecRef> {
        self.node(node).scope.short.get(&c).copied()
    }

    pub(crate) fn lookup_single_dash(&self, node: NodeId, name: &str) -> Option<SpecRef> {
        self.node(node).scope.single_dash.get(name).copied()
    }

    /// Whether `spec` can still be reached by name (or position) from `node`.
    ///
    /// Ancestor options fully shadowed by a nearer declaration are not.
    pub(crate) fn is_reachable_from(&self, node: NodeId, spec: SpecRef) -> bool {
        let decl = self.spec(spec);
        if decl.is_positional() {
            return true;
        }
        let scope = &self.node(node).scope;
        decl.names().iter().any(|name| {
            let hit = match name {
                NameForm::Long(long) => scope.long.get(long),
                NameForm::Short(c) => scope.short.get(c),
                NameForm::SingleDashLong(long) => scope.single_dash.get(long),
            };
            hit == Some(&spec)
        })
    }

    /// Whether `node` is `ancestor` or lies below it.
    pub(crate) fn is_within(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.node(id).parent;
        }
        false
    }

    fn insert(
        &mut self,
        builder: CommandBuilder,
        parent: Option<NodeId>,
    ) -> Result<NodeId, DefinitionError> {
        let CommandBuilder {
            name,
            aliases,
            args,
            subcommands,
            default_subcommand,
            subcommand_required,
            version,
            settings: _,
        } = builder;

        if name.trim().is_empty() {
            return Err(DefinitionError::EmptyCommandName);
        }
        validate_subcommand_names(&name, &subcommands)?;

        let id = NodeId(self.nodes.len());
        let mut scope = match parent {
            Some(p) => self.node(p).scope.clone(),
            None => ScopeIndex::default(),
        };
        scope.extend_own(id, &args);

        self.nodes.push(CommandNode {
            name: name.clone(),
            aliases,
            args,
            parent,
            children: Vec::new(),
            default_child: None,
            subcommand_required,
            version,
            scope,
        });

        for sub in subcommands {
            let child = self.insert(sub, Some(id))?;
            self.nodes[id.0].children.push(child);
        }

        if let Some(default) = default_subcommand {
            let child = self
                .child_named(id, &default)
                .ok_or_else(|| DefinitionError::UnknownDefaultSubcommand {
                    parent: name.clone(),
                    name: default.clone(),
                })?;
            self.nodes[id.0].default_child = Some(child);
        }

        Ok(id)
    }
}

/// Detect duplicate subcommand names and aliases that collide with a sibling
/// name or with another sibling's alias.
fn validate_subcommand_names(
    parent: &str,
    subcommands: &[CommandBuilder],
) -> Result<(), DefinitionError> {
    let mut names: HashSet<&str> = HashSet::new();
    for sub in subcommands {
        if !names.insert(sub.name.as_str()) {
            return Err(DefinitionError::DuplicateSubcommand {
                parent: parent.to_string(),
                name: sub.name.clone(),
            });
        }
    }

    let mut alias_map: HashMap<&str, &str> = HashMap::new();
    for sub in subcommands {
        for alias in &sub.aliases {
            let alias = alias.trim();
            if alias.is_empty() || alias == sub.name {
                continue;
            }
            let clashes_with_name = names.contains(alias);
            let clashes_with_alias = alias_map
                .insert(alias, sub.name.as_str())
                .is_some_and(|prev| prev != sub.name);
            if clashes_with_name || clashes_with_alias {
                return Err(DefinitionError::AliasConflict {
                    parent: parent.to_string(),
                    alias: alias.to_string(),
                    command: sub.name.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Declares one command and, recursively, its subcommands.
///
/// ```
/// use cmdtree_argparse::{ArgumentSet, ArgumentSpec, CommandBuilder};
///
/// let tree = CommandBuilder::new("tool")
///     .args(
///         ArgumentSet::builder()
///             .arg(ArgumentSpec::flag("verbose").short('v'))
///             .build()
///             .unwrap(),
///     )
///     .subcommand(CommandBuilder::new("run").alias("r"))
///     .build()
///     .unwrap();
/// assert!(tree.find(&["r"]).is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CommandBuilder {
    name: String,
    aliases: Vec<String>,
    args: ArgumentSet,
    subcommands: Vec<CommandBuilder>,
    default_subcommand: Option<String>,
    subcommand_required: bool,
    version: Option<String>,
    settings: ParserSettings,
}

impl CommandBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn args(mut self, args: ArgumentSet) -> Self {
        self.args = args;
        self
    }

    pub fn subcommand(mut self, sub: CommandBuilder) -> Self {
        self.subcommands.push(sub);
        self
    }

    /// Subcommand entered when input ends without naming one.
    pub fn default_subcommand(mut self, name: impl Into<String>) -> Self {
        self.default_subcommand = Some(name.into());
        self
    }

    pub fn subcommand_required(mut self, required: bool) -> Self {
        self.subcommand_required = required;
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Parser settings; only the root command's settings are used.
    pub fn settings(mut self, settings: ParserSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> Result<CommandTree, DefinitionError> {
        let mut tree = CommandTree {
            nodes: Vec::new(),
            settings: self.settings,
        };
        tree.insert(self, None)?;
        Ok(tree)
    }
}
