use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use nest_service::{CommentNode, CommentService, NestConfig, Replies, WalRecordStore};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(cli.config.as_deref(), cli.data_dir.as_deref())?;
    let format = cli.format;
    match cli.command {
        Command::List => cmd_list(&config, format).await,
        Command::Add(args) => cmd_add(&config, format, &args.content, None).await,
        Command::Reply(args) => {
            cmd_add(&config, format, &args.content, Some(&args.parent_id)).await
        }
        Command::Delete(args) => cmd_delete(&config, format, &args.id).await,
        Command::Compact => cmd_compact(&config, format),
    }
}

/// Config file (or defaults), then the `--data-dir` override.
pub fn resolve_config(path: Option<&Path>, data_dir: Option<&Path>) -> anyhow::Result<NestConfig> {
    let mut config = match path {
        Some(path) => NestConfig::load(path)?,
        None => NestConfig::default(),
    };
    if let Some(dir) = data_dir {
        config.data_dir = dir.to_path_buf();
    }
    Ok(config)
}

async fn cmd_list(config: &NestConfig, format: OutputFormat) -> anyhow::Result<()> {
    let service = CommentService::open(config)?;
    let tree = service.get_comments().await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tree)?),
        OutputFormat::Text if tree.is_empty() => println!("No comments."),
        OutputFormat::Text => print!("{}", render_tree(&tree)),
    }
    Ok(())
}

async fn cmd_add(
    config: &NestConfig,
    format: OutputFormat,
    content: &str,
    parent_id: Option<&str>,
) -> anyhow::Result<()> {
    let service = CommentService::open(config)?;
    let node = service.add_comment(content, parent_id).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&node)?),
        OutputFormat::Text => {
            let what = if parent_id.is_some() { "reply" } else { "comment" };
            println!("{} Added {} {}", "✓".green().bold(), what, node.id.yellow());
        }
    }
    Ok(())
}

async fn cmd_delete(config: &NestConfig, format: OutputFormat, id: &str) -> anyhow::Result<()> {
    let service = CommentService::open(config)?;
    let removed = service.delete_comment(id).await?;
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "id": id, "removed": removed }))
        }
        OutputFormat::Text if removed == 0 => println!("No comment {}.", id.yellow()),
        OutputFormat::Text => println!(
            "{} Deleted {} ({} comment{})",
            "✓".green().bold(),
            id.yellow(),
            removed,
            if removed == 1 { "" } else { "s" }
        ),
    }
    Ok(())
}

fn cmd_compact(config: &NestConfig, format: OutputFormat) -> anyhow::Result<()> {
    let store = WalRecordStore::open(&config.data_dir, config.wal.clone())
        .with_context(|| format!("opening {}", config.data_dir.display()))?;
    let before = store.log_size();
    store.compact().context("compacting comment log")?;
    let after = store.log_size();
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "records": store.len(), "before": before, "after": after })
        ),
        OutputFormat::Text => println!(
            "{} Compacted {} comments: {} -> {} bytes",
            "✓".green().bold(),
            store.len(),
            before,
            after.to_string().bold()
        ),
    }
    Ok(())
}

/// One line per comment, indented two spaces per level.
pub fn render_tree(tree: &Replies) -> String {
    let mut out = String::new();
    for (depth, node) in tree.depth_first() {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&render_node(node));
        out.push('\n');
    }
    out
}

fn render_node(node: &CommentNode) -> String {
    format!(
        "{} {} {}",
        node.id.yellow(),
        node.created_at.as_str().dimmed(),
        node.content
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use nest_service::{build_tree, CommentRecord, Timestamp};

    fn record(id: &str, parent: Option<&str>, at: &str) -> CommentRecord {
        CommentRecord {
            id: id.into(),
            content: format!("text {id}"),
            created_at: Timestamp::from(at),
            parent_id: parent.map(str::to_string),
        }
    }

    #[test]
    fn render_indents_by_depth() {
        colored::control::set_override(false);
        let tree = build_tree(vec![
            record("1", None, "2024-01-01T00:00:00.000Z"),
            record("2", Some("1"), "2024-01-01T00:00:01.000Z"),
            record("3", Some("2"), "2024-01-01T00:00:02.000Z"),
            record("4", None, "2024-01-01T00:00:03.000Z"),
        ]);
        let text = render_tree(&tree);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "1 2024-01-01T00:00:00.000Z text 1",
                "  2 2024-01-01T00:00:01.000Z text 2",
                "    3 2024-01-01T00:00:02.000Z text 3",
                "4 2024-01-01T00:00:03.000Z text 4",
            ]
        );
    }

    #[test]
    fn config_defaults_without_file() {
        let config = resolve_config(None, None).unwrap();
        assert_eq!(config, NestConfig::default());
    }

    #[test]
    fn data_dir_flag_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nest.toml");
        std::fs::write(&path, "data_dir = \"from-file\"\n[wal]\ncompact_after_bytes = 7\n")
            .unwrap();

        let config = resolve_config(Some(&path), None).unwrap();
        assert_eq!(config.data_dir, Path::new("from-file"));

        let config = resolve_config(Some(&path), Some(Path::new("from-flag"))).unwrap();
        assert_eq!(config.data_dir, Path::new("from-flag"));
        assert_eq!(config.wal.compact_after_bytes, 7);
    }

    #[tokio::test]
    async fn commands_round_trip_through_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = resolve_config(None, Some(dir.path())).unwrap();

        cmd_add(&config, OutputFormat::Json, "first", None).await.unwrap();
        let service = CommentService::open(&config).unwrap();
        let tree = service.get_comments().await.unwrap();
        let root_id = tree[0].id.clone();
        drop(service);

        cmd_add(&config, OutputFormat::Text, "second", Some(&root_id))
            .await
            .unwrap();
        cmd_compact(&config, OutputFormat::Text).unwrap();
        cmd_delete(&config, OutputFormat::Text, &root_id).await.unwrap();
        cmd_list(&config, OutputFormat::Text).await.unwrap();

        let service = CommentService::open(&config).unwrap();
        assert!(service.get_comments().await.unwrap().is_empty());
    }
}
