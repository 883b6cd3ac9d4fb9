mod config;
mod tracing_setup;

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value as JsonValue;
use tracing::info;
use tsm_core::catalog::{CatalogSource, CategoryFilters, JsonCatalog};
use tsm_core::core_api::{Engine, Session};
use tsm_core::group_path::GroupPath;
use tsm_core::item_string::{self, Dialect, ItemIdentity};
use tsm_core::merge::{
    Assignment, DeleteOptions, DeleteScope, MergeOptions, MergeReport, OrphanPolicy,
};
use tsm_core::persist;
use tsm_core::profile::{DEFAULT_PROFILE, ProfileSelector};
use tsm_render::{
    JsonStyle, TextRenderOptions, render_groups_json, render_groups_text, render_items_json,
    render_items_text, render_report_json, render_report_text, render_summary_json,
    render_summary_text,
};

use crate::config::MergeConfig;
use crate::tracing_setup::Verbosity;

const EXIT_FAILURE: i32 = 1;
const EXIT_USAGE: i32 = 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum DialectArg {
    Legacy,
    Compact,
}

impl From<DialectArg> for Dialect {
    fn from(value: DialectArg) -> Self {
        match value {
            DialectArg::Legacy => Dialect::Legacy,
            DialectArg::Compact => Dialect::Compact,
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Profile inside the SavedVariables file.
    #[arg(long, global = true)]
    profile: Option<String>,
    /// Global table holding the profiles, e.g. AscensionTSMDB.
    #[arg(long, global = true)]
    database: Option<String>,
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    json: bool,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show counts and the groups holding the most items.
    Info {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
    /// List the group tree.
    Groups {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
    /// List item assignments.
    Items {
        #[arg(value_name = "FILE")]
        path: PathBuf,
        #[arg(long, value_name = "PATH", value_parser = parse_group_path)]
        group: Option<GroupPath>,
    },
    /// Assign items to a group, creating it and its parents as needed.
    Import {
        #[arg(value_name = "FILE")]
        path: PathBuf,
        #[arg(long, value_name = "PATH", value_parser = parse_group_path)]
        group: GroupPath,
        /// Comma separated ids or item strings, or @FILE.
        #[arg(
            long,
            value_name = "LIST",
            required_unless_present = "records",
            conflicts_with = "records"
        )]
        items: Option<String>,
        /// JSON item record file.
        #[arg(long, value_name = "JSON")]
        records: Option<PathBuf>,
        #[arg(long, value_name = "KEY", requires = "records")]
        category: Option<String>,
        #[arg(long, value_name = "N", requires = "records")]
        limit: Option<usize>,
        /// Key style for items not yet in the profile.
        #[arg(long)]
        dialect: Option<DialectArg>,
        /// Clear groupTreeCollapsedStatus.
        #[arg(long = "reset-collapsed")]
        reset_collapsed: bool,
        #[command(flatten)]
        write: WriteArgs,
    },
    /// Drop the group assignment of the given items.
    Remove {
        #[arg(value_name = "FILE")]
        path: PathBuf,
        #[arg(long, value_name = "LIST")]
        items: String,
        #[command(flatten)]
        write: WriteArgs,
    },
    /// Delete a group.
    DeleteGroup {
        #[arg(value_name = "FILE")]
        path: PathBuf,
        #[arg(long, value_name = "PATH", value_parser = parse_group_path)]
        group: GroupPath,
        /// What happens to the group's items.
        #[arg(long, value_name = "ungroup|parent|move-to:PATH", value_parser = parse_orphan_policy)]
        orphans: OrphanPolicy,
        /// Also delete every subgroup.
        #[arg(long)]
        recursive: bool,
        #[command(flatten)]
        write: WriteArgs,
    },
    /// Move a group and its subgroups to a new path.
    RenameGroup {
        #[arg(value_name = "FILE")]
        path: PathBuf,
        #[arg(long, value_name = "PATH", value_parser = parse_group_path)]
        from: GroupPath,
        #[arg(long, value_name = "PATH", value_parser = parse_group_path)]
        to: GroupPath,
        #[command(flatten)]
        write: WriteArgs,
    },
}

#[derive(Debug, Args)]
struct WriteArgs {
    /// Report what would change without writing.
    #[arg(long = "dry-run")]
    dry_run: bool,
    /// Write here instead of replacing FILE.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    #[arg(long = "no-backup")]
    no_backup: bool,
}

fn main() {
    let cli = Cli::parse();
    tracing_setup::init_subscriber(Verbosity::from_flags(cli.verbose, cli.quiet));

    let config = MergeConfig::load(cli.config.as_deref())
        .unwrap_or_else(|e| exit_with(EXIT_FAILURE, format!("Error loading config: {e:#}")));
    let selector = ProfileSelector {
        profile: cli
            .profile
            .clone()
            .or_else(|| config.profile.clone())
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string()),
        database: cli.database.clone().or_else(|| config.database.clone()),
    };
    let style = JsonStyle::CanonicalV1;

    match &cli.command {
        Command::Info { path } => {
            let session = open_session(path, &selector);
            let summary = session.summary();
            if cli.json {
                print_json(&render_summary_json(&summary, style));
            } else {
                print!("{}", render_summary_text(&summary));
            }
        }
        Command::Groups { path } => {
            let session = open_session(path, &selector);
            let groups = session.groups();
            if cli.json {
                print_json(&render_groups_json(&groups, style));
            } else {
                print!("{}", render_groups_text(&groups));
            }
        }
        Command::Items { path, group } => {
            let session = open_session(path, &selector);
            let items = session
                .items(group.as_ref())
                .unwrap_or_else(|e| exit_with(EXIT_FAILURE, format!("Error: {}", e.message)));
            if cli.json {
                print_json(&render_items_json(&items, style));
            } else {
                print!("{}", render_items_text(&items));
            }
        }
        Command::Import {
            path,
            group,
            items,
            records,
            category,
            limit,
            dialect,
            reset_collapsed,
            write,
        } => {
            let mut session = open_session(path, &selector);
            let options = MergeOptions {
                dialect: dialect
                    .map(Dialect::from)
                    .or(config.dialect)
                    .or_else(|| session.detected_dialect())
                    .unwrap_or(Dialect::Legacy),
                operation_modules: config.operation_modules.clone(),
                reset_collapsed_status: *reset_collapsed,
            };
            let result = match (items, records) {
                (Some(list), _) => {
                    let assignments: Vec<Assignment> = read_item_list(list)
                        .into_iter()
                        .map(|item| Assignment {
                            item,
                            group: group.clone(),
                        })
                        .collect();
                    session.apply(&assignments, &options)
                }
                (None, Some(records_path)) => {
                    let catalog = JsonCatalog::load(records_path).unwrap_or_else(|e| {
                        exit_with(EXIT_FAILURE, format!("Error: {}", e.message))
                    });
                    let records = match category {
                        Some(category) => catalog.fetch_category(
                            category,
                            &CategoryFilters {
                                slot: None,
                                limit: *limit,
                            },
                        ),
                        None => Ok(catalog
                            .records()
                            .take(limit.unwrap_or(usize::MAX))
                            .cloned()
                            .collect()),
                    }
                    .unwrap_or_else(|e| exit_with(EXIT_FAILURE, format!("Error: {}", e.message)));
                    info!("importing {} record(s) into {group}", records.len());
                    session.import_records(&records, group, &options)
                }
                (None, None) => exit_with(EXIT_USAGE, "import needs --items or --records"),
            };
            finish(&cli, &config, path, session, result, write);
        }
        Command::Remove { path, items, write } => {
            let mut session = open_session(path, &selector);
            let ids: Vec<u32> = read_item_list(items).iter().map(ItemIdentity::id).collect();
            let result = session.remove_items(&ids);
            finish(&cli, &config, path, session, result, write);
        }
        Command::DeleteGroup {
            path,
            group,
            orphans,
            recursive,
            write,
        } => {
            let mut session = open_session(path, &selector);
            let options = DeleteOptions {
                scope: if *recursive {
                    DeleteScope::WithDescendants
                } else {
                    DeleteScope::GroupOnly
                },
                orphans: orphans.clone(),
            };
            let result = session.delete_group(group, &options);
            finish(&cli, &config, path, session, result, write);
        }
        Command::RenameGroup {
            path,
            from,
            to,
            write,
        } => {
            let mut session = open_session(path, &selector);
            let result = session.rename_group(from, to, &config.operation_modules);
            finish(&cli, &config, path, session, result, write);
        }
    }
}

fn open_session(path: &Path, selector: &ProfileSelector) -> Session {
    Engine::new().open_path(path, selector).unwrap_or_else(|e| {
        eprintln!("Error loading profile {:?} from {}", selector.profile, path.display());
        eprintln!("  {}", e.message);
        process::exit(EXIT_FAILURE);
    })
}

/// Report the batch outcome and persist the session unless this is a dry run.
fn finish(
    cli: &Cli,
    config: &MergeConfig,
    input: &Path,
    session: Session,
    result: Result<MergeReport, tsm_core::CoreError>,
    write: &WriteArgs,
) {
    let report =
        result.unwrap_or_else(|e| exit_with(EXIT_FAILURE, format!("Error: {}", e.message)));

    if !write.dry_run {
        let target = write.output.as_deref().unwrap_or(input);
        let replaces_input = target == input;
        if session.is_modified() || !replaces_input {
            if config.backup && !write.no_backup && target.exists() {
                let backup_dir = config.backup_dir.as_deref();
                persist::create_backup(target, backup_dir).unwrap_or_else(|e| {
                    exit_with(EXIT_FAILURE, format!("Error creating backup: {}", e.message))
                });
            }
            session.save(target).unwrap_or_else(|e| {
                let message = format!("Error writing {}: {}", target.display(), e.message);
                exit_with(EXIT_FAILURE, message)
            });
            info!("wrote {}", target.display());
        }
    }

    if cli.json {
        print_json(&render_report_json(&report, write.dry_run, JsonStyle::CanonicalV1));
    } else {
        let options = TextRenderOptions {
            verbose: cli.verbose,
        };
        print!("{}", render_report_text(&report, write.dry_run, options));
    }
}

fn read_item_list(raw: &str) -> Vec<ItemIdentity> {
    let text = match raw.strip_prefix('@') {
        Some(file) => fs::read_to_string(file)
            .unwrap_or_else(|e| exit_with(EXIT_FAILURE, format!("Error reading {file}: {e}"))),
        None => raw.to_string(),
    };
    let items: Vec<ItemIdentity> = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            parse_item_token(token).unwrap_or_else(|e| {
                exit_with(EXIT_USAGE, format!("Invalid item {token:?}: {e}"))
            })
        })
        .collect();
    if items.is_empty() {
        exit_with(EXIT_USAGE, "No items given");
    }
    items
}

/// A bare number is an item id; anything else must be an item string.
fn parse_item_token(token: &str) -> Result<ItemIdentity, String> {
    if token.bytes().all(|b| b.is_ascii_digit()) {
        let id: u32 = token
            .parse()
            .map_err(|_| format!("item id out of range: {token}"))?;
        return ItemIdentity::new(id).map_err(|e| e.to_string());
    }
    item_string::parse(token).map_err(|e| e.to_string())
}

fn parse_group_path(value: &str) -> Result<GroupPath, String> {
    GroupPath::parse(value).map_err(|e| e.to_string())
}

fn parse_orphan_policy(value: &str) -> Result<OrphanPolicy, String> {
    match value {
        "ungroup" => Ok(OrphanPolicy::Ungroup),
        "parent" => Ok(OrphanPolicy::MoveToParent),
        other => match other.strip_prefix("move-to:") {
            Some(path) => parse_group_path(path).map(OrphanPolicy::MoveTo),
            None => Err(format!(
                "invalid orphan policy '{value}', expected one of: ungroup, parent, move-to:PATH"
            )),
        },
    }
}

fn print_json(value: &JsonValue) {
    let rendered = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| exit_with(EXIT_FAILURE, format!("Error rendering JSON output: {e}")));
    println!("{rendered}");
}

fn exit_with(code: i32, message: impl Display) -> ! {
    eprintln!("{message}");
    process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orphan_policy_values() {
        assert_eq!(parse_orphan_policy("ungroup"), Ok(OrphanPolicy::Ungroup));
        assert_eq!(parse_orphan_policy("parent"), Ok(OrphanPolicy::MoveToParent));
        assert_eq!(
            parse_orphan_policy("move-to:A`B"),
            Ok(OrphanPolicy::MoveTo(GroupPath::parse("A`B").expect("valid path")))
        );
        assert!(parse_orphan_policy("move-to:").is_err());
        assert!(parse_orphan_policy("drop").is_err());
    }

    #[test]
    fn item_tokens_accept_ids_and_item_strings() {
        let plain = parse_item_token("2447").expect("id");
        assert_eq!(plain, ItemIdentity::new(2447).expect("valid"));
        assert_eq!(parse_item_token("i:2447").expect("compact"), plain);
        assert!(parse_item_token("0").is_err());
        assert!(parse_item_token("99999999999").is_err());
        assert!(parse_item_token("herb").is_err());
    }
}
