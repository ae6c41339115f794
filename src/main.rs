//! Replays a timeline dump through the tile pipeline and prints what each tile would render.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use eyeball::SharedObservable;
use roomview::{
    config::RoomViewConfig,
    power_levels::UserPowerLevels,
    timeline::{Tile, TileList, TileOptions, TimelineEntry, TimelineHandle, default_tile_kind_for_entry},
};
use ruma::{RoomId, UserId};
use tracing_subscriber::EnvFilter;


#[derive(Parser, Debug)]
struct Cli {
    /// A JSON file containing an array of timeline entries, oldest first.
    #[clap(short, long, value_parser)]
    timeline: PathBuf,

    /// The user ID of the viewing user.
    #[clap(short, long, value_parser)]
    user: String,

    /// The room the timeline belongs to, used for permalinks.
    #[clap(short, long, value_parser, default_value = "!room:localhost")]
    room: String,

    /// A JSON config file overriding the default limits.
    #[clap(short, long, value_parser)]
    config: Option<PathBuf>,

    /// Enable verbose logging output.
    #[clap(short, long, action)]
    verbose: bool,
}


fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = if cli.verbose { "roomview=debug" } else { "roomview=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let config = match &cli.config {
        Some(path) => RoomViewConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => RoomViewConfig::default(),
    };
    let json = std::fs::read_to_string(&cli.timeline)
        .with_context(|| format!("failed to read timeline from {}", cli.timeline.display()))?;
    let entries: Vec<TimelineEntry> = serde_json::from_str(&json).context("failed to parse timeline entries")?;
    tracing::debug!(entries = entries.len(), "Loaded timeline");

    let own_user_id = UserId::parse(&cli.user).with_context(|| format!("invalid user ID {:?}", cli.user))?;
    let room_id = RoomId::parse(&cli.room).with_context(|| format!("invalid room ID {:?}", cli.room))?;

    let (actions, _action_receiver) = crossbeam_channel::unbounded();
    let options = TileOptions {
        room_id,
        own_user_id,
        power_levels: SharedObservable::new(UserPowerLevels::all()),
        tile_kind_for_entry: default_tile_kind_for_entry,
        config: Arc::new(config),
        actions,
    };
    // No further updates will arrive for a static dump.
    let (_update_sender, updates) = crossbeam_channel::unbounded();
    let timeline = TimelineHandle { entries: entries.into_iter().map(Arc::new).collect(), updates };
    let tile_list = TileList::new(timeline, Arc::new(options));

    for tile in tile_list.tiles() {
        println!("{}", describe(tile));
    }
    Ok(())
}

fn describe(tile: &Tile) -> String {
    let mut line = format!(
        "{:<12} {:<28} {:<10}",
        tile.shape(),
        tile.display_name(),
        tile.time().unwrap_or_else(|| "pending".to_owned()),
    );
    let flags = [
        ("continuation", tile.is_continuation()),
        ("same-day", tile.is_same_day()),
        ("new-own", tile.is_new_own()),
        ("own", tile.is_own()),
    ];
    for (name, _) in flags.iter().filter(|(_, set)| *set) {
        line.push_str(&format!(" +{name}"));
    }
    if !tile.is_same_day() && let Some(date) = tile.date() {
        line.push_str(&format!(" [{date}]"));
    }
    if let Some(body) = tile.body() {
        line.push_str(&format!(" {body:?}"));
    }
    if let Some(reactions) = tile.reactions().filter(|r| !r.is_empty()) {
        let rendered: Vec<_> = reactions.reactions().iter()
            .map(|r| format!("{}×{}{}", r.key(), r.count(), if r.is_pending() { "…" } else { "" }))
            .collect();
        line.push_str(&format!(" reactions=[{}]", rendered.join(" ")));
    }
    if let Some(thread) = tile.thread_anchor() {
        line.push_str(&format!(" thread={thread}"));
    }
    if let Some(reply) = tile.reply_tile() {
        line.push_str(&format!(" ↪ {}: {:?}", reply.display_name(), reply.body().unwrap_or(reply.shape())));
    }
    line
}
