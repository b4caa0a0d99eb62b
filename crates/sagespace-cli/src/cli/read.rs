/*
[INPUT]:  Query hooks and command arguments
[OUTPUT]: Feed, sage and notification listings printed to stdout
[POS]:    CLI command layer - read-only queries
[UPDATE]: When list output or query parameters change
*/

use anyhow::{Result, anyhow};
use console::style;
use sagespace_client::{FeedQueries, Notification, Paginator, Post, Sage};

/// Print up to `pages` feed pages.
pub async fn run_feed(queries: &FeedQueries, pages: usize, limit: Option<u32>) -> Result<()> {
    let mut pager = queries.feed_pager(limit);
    load_pages(&mut pager, pages).await?;

    if pager.items().is_empty() {
        println!("{}", style("The feed is empty.").dim());
    }
    for post in pager.items() {
        print_post(post);
    }
    print_more_hint(&pager);
    Ok(())
}

pub async fn run_sages(queries: &FeedQueries, recommended: bool) -> Result<()> {
    let sages = if recommended {
        queries.recommended_sages().await.into_result()
    } else {
        queries.sages(None).await.into_result().map(|page| page.items)
    }
    .map_err(|message| anyhow!(message))?;

    if sages.is_empty() {
        println!("{}", style("No sages found.").dim());
    }
    for sage in &sages {
        print_sage(sage);
    }
    Ok(())
}

pub async fn run_notifications(queries: &FeedQueries, unread_only: bool, mark_all: bool) -> Result<()> {
    let mut pager = queries.notifications_pager(unread_only);
    load_pages(&mut pager, 1).await?;

    for notification in pager.items() {
        print_notification(notification);
    }
    if pager.items().is_empty() {
        println!("{}", style("No notifications.").dim());
    }

    if mark_all {
        queries
            .api()
            .mark_all_notifications_read()
            .await
            .into_result()
            .map_err(|message| anyhow!(message))?;
        queries.cache().invalidate_prefix("notifications:").await;
        println!("{}", style("All notifications marked as read.").green());
    }
    Ok(())
}

async fn load_pages<T: Send + 'static>(pager: &mut Paginator<T>, pages: usize) -> Result<()> {
    for _ in 0..pages.max(1) {
        if !pager.load_more().await {
            break;
        }
    }
    match pager.error() {
        // Keep what was loaded; only fail when nothing came back.
        Some(error) if pager.items().is_empty() => Err(anyhow!(error.to_string())),
        Some(error) => {
            eprintln!("{} {}", style("warning:").yellow(), error);
            Ok(())
        }
        None => Ok(()),
    }
}

fn print_more_hint<T: Send + 'static>(pager: &Paginator<T>) {
    if pager.has_more() {
        println!("{}", style("… more posts available (use --pages)").dim());
    }
}

fn print_post(post: &Post) {
    let author = post
        .author
        .as_ref()
        .map(|author| author.name.as_str())
        .unwrap_or(post.author_id.as_str());
    println!(
        "{} {} {}",
        style(post.created_at.format("%Y-%m-%d %H:%M")).dim(),
        style(author).bold(),
        style(format!("♥ {}  💬 {}", post.like_count, post.comment_count)).dim()
    );
    println!("  {}\n", post.content);
}

fn print_sage(sage: &Sage) {
    let category = sage.category.as_deref().unwrap_or("general");
    println!(
        "{} {} {}",
        style(&sage.name).bold().cyan(),
        style(format!("[{category}]")).dim(),
        style(&sage.id).dim()
    );
    if let Some(description) = &sage.description {
        println!("  {}", description);
    }
}

fn print_notification(notification: &Notification) {
    let marker = if notification.read {
        style("·").dim()
    } else {
        style("●").green()
    };
    println!(
        "{} {} {}",
        marker,
        style(notification.created_at.format("%Y-%m-%d %H:%M")).dim(),
        notification.message
    );
}
