use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use revfs_dag::RevisionOrder;
use revfs_fs::{Archive, FsResult, FsView, WorkingTree};
use revfs_merge::{builtin, merge, merge_tips, DiffSet};
use revfs_types::{RevisionTag, TemporalAnchor};
use tracing::info;

use crate::archive_file;
use crate::cli::*;
use crate::config::CliConfig;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let path = cli.archive.as_path();
    match cli.command {
        Command::Init => cmd_init(path),
        Command::Write(args) => modify(path, &args.on, format!("write {}", args.path), |t| {
            t.write_file(&args.path, args.content.as_bytes()).map(|_| ())
        }),
        Command::Mkdir(args) => modify(path, &args.on, format!("mkdir {}", args.path), |t| {
            t.mkdir(&args.path).map(|_| ())
        }),
        Command::Rm(args) => modify(path, &args.on, format!("rm {}", args.path), |t| {
            match t.inode_for_path(&args.path)? {
                Some(inode) if inode.is_directory() => t.rmdir(&args.path),
                _ => t.unlink(&args.path),
            }
        }),
        Command::Mv(args) => modify(
            path,
            &args.on,
            format!("mv {} {}", args.from, args.to),
            |t| t.rename(&args.from, &args.to),
        ),
        Command::Tips => cmd_tips(path),
        Command::Log(args) => cmd_log(path, args),
        Command::Ls(args) => cmd_ls(path, args),
        Command::Cat(args) => cmd_cat(path, args),
        Command::Diff(args) => cmd_diff(path, args),
        Command::Merge(args) => {
            let config = CliConfig::load(cli.config.as_deref(), path)?;
            cmd_merge(path, args, &config)
        }
    }
}

// ---------------------------------------------------------------------------
// Revision addressing
// ---------------------------------------------------------------------------

/// Find a revision by the long `<hex>@<height>` form or a unique hex prefix
/// of its id.
pub fn resolve_revision(archive: &Archive, name: &str) -> anyhow::Result<RevisionTag> {
    if let Ok(tag) = name.parse::<RevisionTag>() {
        archive.revision_info(&tag)?;
        return Ok(tag);
    }
    let prefix = name.split('@').next().unwrap_or(name);
    let matches: Vec<RevisionTag> = archive
        .revisions()
        .into_iter()
        .filter(|tag| tag.id.has_hex_prefix(prefix))
        .collect();
    match matches.as_slice() {
        [] => bail!("no revision matches {name}"),
        [only] => Ok(*only),
        many => bail!("{name} is ambiguous ({} revisions match)", many.len()),
    }
}

/// The revision a change applies to: the one named, else the only tip.
pub fn parent_revision(archive: &Archive, on: &OnRevision) -> anyhow::Result<RevisionTag> {
    if let Some(name) = &on.on {
        return resolve_revision(archive, name);
    }
    match archive.tips().as_slice() {
        [] => bail!("the archive holds no revisions; run `revfs init`"),
        [only] => Ok(*only),
        many => bail!(
            "{} tips; pass --on REV or run `revfs merge` first",
            many.len()
        ),
    }
}

fn revision_or_tip(archive: &Archive, name: Option<&str>) -> anyhow::Result<RevisionTag> {
    match name {
        Some(name) => resolve_revision(archive, name),
        None => parent_revision(archive, &OnRevision { on: None }),
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_init(path: &Path) -> anyhow::Result<()> {
    let (_, root) = archive_file::create(path)?;
    println!(
        "{} Initialized archive {}",
        "✓".green().bold(),
        path.display().to_string().bold()
    );
    println!("  Root revision: {}", root.to_string().yellow());
    Ok(())
}

fn modify(
    path: &Path,
    on: &OnRevision,
    message: String,
    edit: impl FnOnce(&mut WorkingTree) -> FsResult<()>,
) -> anyhow::Result<()> {
    let archive = archive_file::load(path)?;
    let parent = parent_revision(&archive, on)?;
    let mut tree = archive.open_revision(&parent)?;
    edit(&mut tree).with_context(|| message.clone())?;
    let tag = tree.commit(&[parent], Some(message.clone()))?;
    archive_file::save(&archive, path)?;
    info!(revision = %tag, parent = %parent, "committed");
    println!("{} {} {}", "✓".green(), tag.to_string().yellow(), message);
    Ok(())
}

fn cmd_tips(path: &Path) -> anyhow::Result<()> {
    let archive = archive_file::load(path)?;
    let mut tips = archive.tips();
    archive.sort(&mut tips);
    for tag in tips.iter().rev() {
        let info = archive.revision_info(tag)?;
        println!(
            "{}  {}  {}",
            tag.to_string().yellow().bold(),
            format_time(&info.timestamp).dimmed(),
            info.message.unwrap_or_default()
        );
    }
    Ok(())
}

fn cmd_log(path: &Path, args: LogArgs) -> anyhow::Result<()> {
    let archive = archive_file::load(path)?;
    let mut revisions = archive.revisions();
    archive.sort(&mut revisions);
    for tag in revisions.iter().rev().take(args.limit) {
        let info = archive.revision_info(tag)?;
        let parents: Vec<String> = info.parents.iter().map(|p| p.short_hex()).collect();
        let label = if parents.len() > 1 {
            "merge".magenta().to_string()
        } else {
            String::new()
        };
        println!(
            "{}  {}  {}",
            tag.to_string().yellow().bold(),
            format_time(&info.timestamp).dimmed(),
            label
        );
        if !parents.is_empty() {
            println!("  parents: {}", parents.join(" "));
        }
        if let Some(message) = &info.message {
            println!("  {message}");
        }
    }
    Ok(())
}

fn cmd_ls(path: &Path, args: LsArgs) -> anyhow::Result<()> {
    let archive = archive_file::load(path)?;
    let tag = revision_or_tip(&archive, args.revision.as_deref())?;
    let view = archive.read_only_fs(&tag)?;
    for (entry, id) in view.walk_tree()? {
        let Some(inode) = view.inode(id)? else {
            continue;
        };
        let name = if inode.is_directory() {
            entry.blue().bold().to_string()
        } else {
            entry
        };
        println!(
            "{:>6} {:<9} {:>8}  {}",
            id.to_string().dimmed(),
            inode.kind().to_string(),
            inode.stat.size,
            name
        );
    }
    Ok(())
}

fn cmd_cat(path: &Path, args: CatArgs) -> anyhow::Result<()> {
    let archive = archive_file::load(path)?;
    let tag = revision_or_tip(&archive, args.revision.as_deref())?;
    let data = archive.read_only_fs(&tag)?.read_file(&args.path)?;
    std::io::stdout().write_all(&data)?;
    Ok(())
}

fn cmd_diff(path: &Path, args: DiffArgs) -> anyhow::Result<()> {
    let archive = archive_file::load(path)?;
    let tags = args
        .revisions
        .iter()
        .map(|name| resolve_revision(&archive, name))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let set = DiffSet::build(&archive, &tags)?;
    if set.is_empty() {
        println!("No conflicts.");
        return Ok(());
    }

    for (path, diff) in set.path_diffs() {
        println!("{}", path.bold());
        for group in diff.groups() {
            let target = match group.value {
                Some(id) => format!("inode {id}").green().to_string(),
                None => "absent".red().to_string(),
            };
            println!("  {:<14} {}", target, short_list(&group.revisions));
        }
    }
    for (id, diff) in set.inode_diffs() {
        println!("{}", format!("inode {id}").bold());
        for group in diff.groups() {
            let value = match &group.value {
                Some(inode) => format!(
                    "{} {}B mtime {}",
                    inode.kind(),
                    inode.stat.size,
                    inode.stat.mtime
                )
                .green()
                .to_string(),
                None => "absent".red().to_string(),
            };
            println!("  {:<30} {}", value, short_list(&group.revisions));
        }
    }
    if !set.id_map().is_empty() {
        println!(
            "{} inode id(s) renumbered for colliding objects",
            set.id_map().len().to_string().yellow()
        );
    }
    Ok(())
}

fn cmd_merge(path: &Path, args: MergeArgs, config: &CliConfig) -> anyhow::Result<()> {
    let archive = archive_file::load(path)?;
    let kind = args.policy.unwrap_or(config.merge.policy);
    let policy = builtin(kind);

    let merged = if args.revisions.is_empty() {
        if archive.tips().len() < 2 {
            println!("Nothing to merge.");
            return Ok(());
        }
        merge_tips(&archive, policy.as_ref(), &config.merge)?
    } else {
        let candidates = args
            .revisions
            .iter()
            .map(|name| resolve_revision(&archive, name))
            .collect::<anyhow::Result<Vec<_>>>()?;
        merge(&archive, &candidates, policy.as_ref(), &config.merge)?
    };
    archive_file::save(&archive, path)?;

    let parents = archive.revision_info(&merged)?.parents.len();
    println!(
        "{} Merged {} revisions into {} ({} policy)",
        "✓".green().bold(),
        parents,
        merged.to_string().yellow(),
        kind.to_string().cyan()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

fn format_time(anchor: &TemporalAnchor) -> String {
    chrono::DateTime::from_timestamp_millis(anchor.physical_ms as i64)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| anchor.physical_ms.to_string())
}

fn short_list(tags: &[RevisionTag]) -> String {
    tags.iter().map(|t| t.short_hex()).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn run(archive: &Path, args: &[&str]) -> anyhow::Result<()> {
        let mut argv = vec!["revfs", "--archive", archive.to_str().unwrap()];
        argv.extend_from_slice(args);
        run_command(Cli::try_parse_from(argv).unwrap())
    }

    #[test]
    fn edits_require_a_single_tip_or_on() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("revfs.json");
        run(&path, &["init"]).unwrap();
        run(&path, &["write", "/a", "one"]).unwrap();

        let archive = archive_file::load(&path).unwrap();
        let tip = archive.tips()[0];
        let prefix = tip.id.to_hex()[..10].to_string();
        run(&path, &["write", "/b", "left", "--on", prefix.as_str()]).unwrap();
        run(&path, &["write", "/c", "right", "--on", prefix.as_str()]).unwrap();

        let err = run(&path, &["write", "/d", "x"]).unwrap_err();
        assert!(err.to_string().contains("2 tips"));
    }

    #[test]
    fn merge_joins_divergent_branches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("revfs.json");
        run(&path, &["init"]).unwrap();
        run(&path, &["mkdir", "/docs"]).unwrap();
        let base = archive_file::load(&path).unwrap().tips()[0].id.to_hex();
        run(&path, &["write", "/docs/a", "a", "--on", base.as_str()]).unwrap();
        run(&path, &["write", "/docs/b", "b", "--on", base.as_str()]).unwrap();

        run(&path, &["diff", base.as_str(), base.as_str()]).unwrap();
        run(&path, &["merge"]).unwrap();

        let archive = archive_file::load(&path).unwrap();
        let tips = archive.tips();
        assert_eq!(tips.len(), 1);
        let view = archive.read_only_fs(&tips[0]).unwrap();
        assert_eq!(view.read_file("/docs/a").unwrap(), b"a");
        assert_eq!(view.read_file("/docs/b").unwrap(), b"b");
        assert_eq!(archive.revision_info(&tips[0]).unwrap().parents.len(), 2);

        run(&path, &["merge"]).unwrap();
        assert_eq!(archive_file::load(&path).unwrap().tips(), tips);
    }

    #[test]
    fn rm_and_mv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("revfs.json");
        run(&path, &["init"]).unwrap();
        run(&path, &["mkdir", "/d"]).unwrap();
        run(&path, &["write", "/d/f", "x"]).unwrap();
        run(&path, &["mv", "/d/f", "/g"]).unwrap();
        run(&path, &["rm", "/d"]).unwrap();

        let archive = archive_file::load(&path).unwrap();
        let view = archive.read_only_fs(&archive.tips()[0]).unwrap();
        assert_eq!(view.list_all_paths().unwrap(), vec!["/", "/g"]);
        assert!(run(&path, &["rm", "/missing"]).is_err());
    }

    #[test]
    fn unknown_and_ambiguous_revisions() {
        let archive = Archive::in_memory();
        let root = archive.open_blank().commit(&[], None).unwrap();
        assert_eq!(resolve_revision(&archive, &root.id.to_hex()).unwrap(), root);
        assert_eq!(resolve_revision(&archive, &root.short_hex()).unwrap(), root);
        let long = format!("{}@{}", root.id.to_hex(), root.height);
        assert_eq!(resolve_revision(&archive, &long).unwrap(), root);
        assert!(resolve_revision(&archive, "zz").is_err());
        assert!(resolve_revision(&archive, "").is_err());
    }
}
