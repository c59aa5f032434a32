use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "curator")]
#[command(about = "Stage TV releases from RSS feeds for review before they reach qBittorrent")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Fetch the feeds once and stage new matches
    #[command(alias = "scan")]
    Check,

    /// List staged torrents
    #[command(alias = "ls")]
    List {
        /// pending, approved or rejected
        #[arg(default_value = "pending")]
        status: String,
    },

    /// Send staged torrents to qBittorrent
    Approve {
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Mark staged torrents as rejected
    Reject {
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Walk through pending torrents interactively
    Review,

    /// Check the qBittorrent connection and the configured feeds
    Test,

    /// Pause approved torrents in qBittorrent
    Pause {
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Resume approved torrents in qBittorrent
    Resume {
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Delete pending torrents whose link matches a SQL LIKE pattern
    Cleanup {
        /// Defaults to tracker info-page links (%/t/%)
        patterns: Vec<String>,
    },

    /// Delete approved and rejected torrents older than a number of days
    Prune {
        /// Defaults to RETENTION_DAYS
        #[arg(long)]
        days: Option<u32>,
    },

    /// Poll the feeds on a schedule and serve the HTTP API
    Serve,

    /// Print the version
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases() {
        let cli = Cli::try_parse_from(["curator", "scan"]).unwrap();
        assert!(matches!(cli.command, Command::Check));

        let cli = Cli::try_parse_from(["curator", "ls", "approved"]).unwrap();
        assert!(matches!(cli.command, Command::List { status } if status == "approved"));
    }

    #[test]
    fn test_list_defaults_to_pending() {
        let cli = Cli::try_parse_from(["curator", "list"]).unwrap();
        assert!(matches!(cli.command, Command::List { status } if status == "pending"));
    }

    #[test]
    fn test_approve_takes_several_ids() {
        let cli = Cli::try_parse_from(["curator", "approve", "3", "7"]).unwrap();
        assert!(matches!(cli.command, Command::Approve { ids } if ids == vec![3, 7]));
        assert!(Cli::try_parse_from(["curator", "approve"]).is_err());
        assert!(Cli::try_parse_from(["curator", "approve", "x"]).is_err());
    }

    #[test]
    fn test_prune_days() {
        let cli = Cli::try_parse_from(["curator", "prune", "--days", "7"]).unwrap();
        assert!(matches!(cli.command, Command::Prune { days: Some(7) }));
        let cli = Cli::try_parse_from(["curator", "prune"]).unwrap();
        assert!(matches!(cli.command, Command::Prune { days: None }));
    }
}
