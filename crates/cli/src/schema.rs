use anyhow::{Context, Result, bail};
use cmdtree_argparse::{ArgumentSet, ArgumentSpec, Arity, CommandBuilder, CommandTree, ValueParser};
use cmdtree_metadata::{
    ArgKind, ArgSchema, ArityField, CommandSchema, EmbedSchema, FORMAT_VERSION, GroupSchema,
    SchemaDocument, ValueType,
};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SCHEMA_NAME: &str = "cmdtree.json";

#[derive(Debug, Clone)]
pub struct LoadedSchema {
    pub path: PathBuf,
    pub document: SchemaDocument,
}

/// Read the schema at `schema_path`, or `cmdtree.json` in the current
/// directory.
pub fn load_schema(schema_path: Option<&Path>) -> Result<LoadedSchema> {
    let cwd = std::env::current_dir().context("failed to get current directory")?;
    let path = match schema_path {
        Some(p) => resolve_against(&cwd, p),
        None => cwd.join(DEFAULT_SCHEMA_NAME),
    };
    if !path.exists() {
        bail!(
            "schema not found: {} (run `cmdtree init` to create one)",
            path.display()
        );
    }

    let contents = fs::read_to_string(&path)
        .with_context(|| format!("failed to read schema: {}", path.display()))?;
    let document = SchemaDocument::from_json_str(&contents)
        .with_context(|| format!("failed to parse schema JSON: {}", path.display()))?;
    if document.format_version != FORMAT_VERSION {
        bail!(
            "unsupported schema format-version {} in {} (expected {FORMAT_VERSION})",
            document.format_version,
            path.display()
        );
    }
    tracing::debug!(path = %path.display(), "schema loaded");
    Ok(LoadedSchema { path, document })
}

fn arity(field: ArityField) -> Arity {
    match field {
        ArityField::One => Arity::ExactlyOne,
        ArityField::Optional => Arity::Optional,
        ArityField::Exactly(n) => Arity::Exactly(n),
        ArityField::Many => Arity::Unbounded,
        ArityField::OneOrMore => Arity::AtLeastOne,
    }
}

fn value_parser(arg: &ArgSchema) -> ValueParser {
    if !arg.possible_values.is_empty() {
        return ValueParser::choice(arg.possible_values.iter().cloned());
    }
    match arg.value_type {
        ValueType::String => ValueParser::string(),
        ValueType::Int => ValueParser::int(),
        ValueType::Uint => ValueParser::uint(),
        ValueType::Float => ValueParser::float(),
        ValueType::Bool => ValueParser::boolean(),
        ValueType::Path => ValueParser::path(),
    }
}

fn arg_spec(arg: &ArgSchema) -> ArgumentSpec {
    let mut spec = match arg.kind {
        ArgKind::Flag => ArgumentSpec::flag(&arg.name),
        ArgKind::Option => ArgumentSpec::option(&arg.name).value_parser(value_parser(arg)),
        ArgKind::Positional => ArgumentSpec::positional(&arg.name).value_parser(value_parser(arg)),
    };
    if let Some(short) = arg.short {
        spec = spec.short(short);
    }
    for long in arg.long.iter().chain(&arg.aliases) {
        spec = spec.long(long);
    }
    for name in &arg.single_dash {
        spec = spec.single_dash(name);
    }
    if let Some(field) = arg.arity {
        spec = spec.with_arity(arity(field));
    }
    if let Some(default) = &arg.default_value {
        spec = spec.default_value(default);
    }
    if let Some(value_name) = &arg.value_name {
        spec = spec.value_name(value_name);
    }
    spec.help(&arg.help)
}

fn build_group(group: &GroupSchema) -> Result<ArgumentSet> {
    group
        .args
        .iter()
        .fold(ArgumentSet::builder(), |b, arg| b.arg(arg_spec(arg)))
        .build()
        .with_context(|| format!("invalid group '{}'", group.name))
}

fn command_builder(
    command: &CommandSchema,
    groups: &HashMap<&str, ArgumentSet>,
) -> Result<CommandBuilder> {
    let mut args = command
        .args
        .iter()
        .fold(ArgumentSet::builder(), |b, arg| b.arg(arg_spec(arg)));
    for EmbedSchema { field, group } in &command.embed {
        let Some(set) = groups.get(group.as_str()) else {
            bail!("command '{}' embeds unknown group '{group}'", command.name);
        };
        args = args.group(field, set);
    }
    let args = args
        .build()
        .with_context(|| format!("invalid arguments for command '{}'", command.name))?;

    let mut builder = CommandBuilder::new(&command.name)
        .args(args)
        .subcommand_required(command.subcommand_required);
    for alias in &command.aliases {
        builder = builder.alias(alias);
    }
    if let Some(version) = &command.version {
        builder = builder.version(version);
    }
    if let Some(default) = &command.default_subcommand {
        builder = builder.default_subcommand(default);
    }
    for sub in &command.subcommands {
        builder = builder.subcommand(command_builder(sub, groups)?);
    }
    Ok(builder)
}

/// Turn a schema document into a parser tree.
pub fn build_tree(document: &SchemaDocument) -> Result<CommandTree> {
    let mut groups = HashMap::new();
    for group in &document.groups {
        if groups.insert(group.name.as_str(), build_group(group)?).is_some() {
            bail!("duplicate group '{}'", group.name);
        }
    }
    command_builder(&document.command, &groups)?
        .build()
        .context("invalid command tree")
}

fn flag(name: &str, short: char) -> ArgSchema {
    ArgSchema {
        name: name.to_string(),
        kind: ArgKind::Flag,
        short: Some(short),
        ..Default::default()
    }
}

fn embed(field: &str) -> EmbedSchema {
    EmbedSchema {
        field: field.to_string(),
        group: field.to_string(),
    }
}

/// `foo [-v] (build <input> | package [-f] (clean | config))`
pub fn sample_document() -> SchemaDocument {
    let leaf = |name: &str| CommandSchema {
        name: name.to_string(),
        embed: vec![embed("foo"), embed("package")],
        ..Default::default()
    };

    let mut document = SchemaDocument::new(CommandSchema {
        name: "foo".to_string(),
        version: Some("0.1.0".to_string()),
        args: vec![flag("verbose", 'v')],
        subcommands: vec![
            CommandSchema {
                name: "build".to_string(),
                args: vec![ArgSchema {
                    name: "input".to_string(),
                    kind: ArgKind::Positional,
                    help: "File to build".to_string(),
                    ..Default::default()
                }],
                embed: vec![embed("foo")],
                ..Default::default()
            },
            CommandSchema {
                name: "package".to_string(),
                args: vec![flag("force", 'f')],
                subcommands: vec![leaf("clean"), leaf("config")],
                subcommand_required: true,
                ..Default::default()
            },
        ],
        ..Default::default()
    });
    document.groups = vec![
        GroupSchema {
            name: "foo".to_string(),
            args: vec![flag("verbose", 'v')],
        },
        GroupSchema {
            name: "package".to_string(),
            args: vec![flag("force", 'f')],
        },
    ];
    document
}

/// Write the sample schema into `dir`. An existing file is only replaced
/// when `overwrite` is set.
pub fn write_default_schema(dir: &Path, overwrite: bool) -> Result<PathBuf> {
    let dest = dir.join(DEFAULT_SCHEMA_NAME);
    if dest.exists() && !overwrite {
        bail!(
            "{} already exists in {} (use --force to overwrite)",
            DEFAULT_SCHEMA_NAME,
            dir.display()
        );
    }

    let mut out = sample_document()
        .to_json_pretty()
        .context("failed to serialize schema")?;
    out.push('\n');

    let tmp = dest.with_extension("tmp");
    fs::write(&tmp, out.as_bytes())
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, &dest)
        .with_context(|| format!("failed to move {} into place", dest.display()))?;
    Ok(dest)
}

fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdtree_argparse::ParseOutcome;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn make_temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let pid = std::process::id();
        let dir = std::env::temp_dir().join(format!("cmdtree-{prefix}-{pid}-{nanos}"));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn sample_document_builds_nested_tree() {
        let tree = build_tree(&sample_document()).unwrap();
        assert!(tree.find(&["package", "config"]).is_some());

        let ParseOutcome::Matches(parsed) = tree.parse(&["-f", "package", "clean"]).unwrap() else {
            panic!("expected matches");
        };
        assert_eq!(parsed.leaf().get::<bool>("package.force"), Ok(true));
        assert_eq!(parsed.leaf().get::<bool>("foo.verbose"), Ok(false));
    }

    #[test]
    fn arg_schema_maps_onto_spec() {
        let arg = ArgSchema {
            name: "level".to_string(),
            kind: ArgKind::Option,
            short: Some('l'),
            long: Some("level".to_string()),
            aliases: vec!["lvl".to_string()],
            arity: Some(ArityField::Optional),
            value_type: ValueType::Uint,
            default_value: Some("3".to_string()),
            ..Default::default()
        };
        let set = ArgumentSet::builder().arg(arg_spec(&arg)).build().unwrap();
        let spec = &set.specs()[0];
        assert_eq!(spec.names().len(), 3);
        assert_eq!(spec.parser().name(), "unsigned integer");
        assert_eq!(spec.default_values(), ["3"]);
        assert!(!spec.is_required());
    }

    #[test]
    fn build_tree_reports_unknown_group_and_conflicts() {
        let mut doc = sample_document();
        doc.command.embed.push(embed("missing"));
        let err = build_tree(&doc).unwrap_err();
        assert!(err.to_string().contains("unknown group 'missing'"), "{err:#}");

        let mut doc = sample_document();
        doc.command.args.push(flag("version", 'v'));
        let err = build_tree(&doc).unwrap_err();
        assert!(format!("{err:#}").contains("-v"), "{err:#}");
    }

    #[test]
    fn write_default_schema_refuses_to_clobber() {
        let dir = make_temp_dir("schema-defaults");
        let dest = write_default_schema(&dir, false).unwrap();
        let loaded = load_schema(Some(&dest)).unwrap();
        assert_eq!(loaded.document, sample_document());

        assert!(write_default_schema(&dir, false).is_err());
        assert!(write_default_schema(&dir, true).is_ok());

        let _ = fs::remove_dir_all(&dir);
    }
}
