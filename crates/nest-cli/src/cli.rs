use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "nest", about = "Nest: threaded comments on disk", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding the comment log (overrides the config file)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Path to a TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the whole comment thread
    List,
    /// Post a top-level comment
    Add(AddArgs),
    /// Reply to a comment
    Reply(ReplyArgs),
    /// Delete a comment and all of its replies
    Delete(DeleteArgs),
    /// Rewrite the comment log down to the live comments
    Compact,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    pub content: String,
}

#[derive(Args, Debug)]
pub struct ReplyArgs {
    pub parent_id: String,
    pub content: String,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_with_defaults() {
        let cli = Cli::try_parse_from(["nest", "list"]).unwrap();
        assert!(matches!(cli.command, Command::List));
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(!cli.verbose);
        assert!(cli.data_dir.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn parse_reply() {
        let cli = Cli::try_parse_from(["nest", "reply", "abc", "nice point"]).unwrap();
        match cli.command {
            Command::Reply(args) => {
                assert_eq!(args.parent_id, "abc");
                assert_eq!(args.content, "nice point");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "nest", "delete", "abc", "--data-dir", "/tmp/c", "--format", "json", "-v",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Delete(ref a) if a.id == "abc"));
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/c")));
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.verbose);
    }

    #[test]
    fn add_requires_content() {
        assert!(Cli::try_parse_from(["nest", "add"]).is_err());
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(Cli::try_parse_from(["nest", "list", "--format", "xml"]).is_err());
    }
}
