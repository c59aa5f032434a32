//! Terminal output and the interactive review loop

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::curator::Curator;
use crate::models::{StagedTorrent, TorrentStatus};

const MAX_TITLE: usize = 60;

/// Operator choice for one item during review
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReviewChoice {
    Approve,
    Reject,
    Skip,
}

impl ReviewChoice {
    /// Anything that is not an approve or reject answer skips the item.
    fn parse(input: &str) -> Self {
        match input.trim().to_lowercase().as_str() {
            "a" | "approve" => Self::Approve,
            "r" | "reject" => Self::Reject,
            _ => Self::Skip,
        }
    }
}

pub fn print_torrents(torrents: &[StagedTorrent]) {
    println!("{:<6}{:<62}{:<12}{:<50}DATE", "ID", "TITLE", "SIZE", "REASON");
    println!("{:<6}{:<62}{:<12}{:<50}----", "--", "-----", "----", "------");

    for t in torrents {
        println!(
            "{:<6}{:<62}{:<12}{:<50}{}",
            t.id,
            truncate(&t.feed_item.title, MAX_TITLE),
            format!("{:.2} GB", t.size_gb()),
            t.match_reason,
            t.staged_at.format("%b %d %H:%M")
        );
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max - 3).collect();
    format!("{head}...")
}

/// Walk through pending torrents one by one, asking what to do with each.
pub async fn review(curator: &Curator) -> Result<()> {
    let torrents = curator
        .database()
        .list(Some(TorrentStatus::Pending))
        .await?;

    if torrents.is_empty() {
        println!("No pending torrents to review");
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let total = torrents.len();

    for (i, t) in torrents.iter().enumerate() {
        println!("\n[{}/{}] {}", i + 1, total, t.feed_item.title);
        println!("      Size: {:.2} GB | Match: {}", t.size_gb(), t.match_reason);
        println!("      Link: {}", t.feed_item.link);

        stdout
            .write_all(b"      (a)pprove / (r)eject / (s)kip: ")
            .await?;
        stdout.flush().await?;

        let Some(answer) = lines.next_line().await? else {
            break;
        };

        match ReviewChoice::parse(&answer) {
            ReviewChoice::Approve => match curator.approve(t.id).await {
                Ok(_) => println!("Approved"),
                Err(e) => eprintln!("Error approving torrent {}: {}", t.id, e),
            },
            ReviewChoice::Reject => match curator.reject(t.id).await {
                Ok(_) => println!("Rejected"),
                Err(e) => eprintln!("Error rejecting torrent {}: {}", t.id, e),
            },
            ReviewChoice::Skip => println!("Skipped"),
        }
    }

    println!("\nReview complete!");
    Ok(())
}
