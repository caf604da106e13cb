use crate::Context;
use ddtrack_bot::store::StoredSettings;
use ddtrack_core::{TickOutcome, TrackerStatus};
use poise::CreateReply;
use poise::command;
use poise::serenity_prelude::{CreateEmbed, CreateEmbedFooter};

pub(crate) type Error = Box<dyn std::error::Error + Send + Sync>;

/// Show what the tracker is watching and whether it is working
#[command(slash_command, prefix_command)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    let status = data.status.borrow().clone();
    let settings = data.store.read().await.unwrap_or_else(|err| {
        tracing::warn!("Failed to read watch file for /status: {}", err);
        StoredSettings::default()
    });
    ctx.send(CreateReply::default().embed(status_embed(&status, &settings)))
        .await?;
    Ok(())
}

fn status_embed(status: &TrackerStatus, settings: &StoredSettings) -> CreateEmbed {
    let (status_icon, color) = if status.last_tick_at.is_none() {
        ("⏳", 0xFEE75C)
    } else if status.source_reachable() {
        ("🟢", 0x57F287)
    } else {
        ("🔴", 0xED4245)
    };

    let players = if settings.tracked_players.is_empty() {
        "None".to_string()
    } else {
        settings
            .tracked_players
            .iter()
            .map(|p| format!("- {}", p))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let channel = settings
        .notification_channel_id
        .map(|id| format!("<#{}>", id))
        .unwrap_or_else(|| "Not configured".to_string());
    let last_tick = match status.last_tick_at {
        Some(at) => format!("<t:{}:R>", at),
        None => "Never".to_string(),
    };

    CreateEmbed::default()
        .title(format!("{} DDNet Tracker", status_icon))
        .color(color)
        .field("Tracked Players", players, false)
        .field("Channel", channel, true)
        .field(
            "Active Notifications",
            status.active_notifications.to_string(),
            true,
        )
        .field("Last Check", last_tick, true)
        .field("Last Result", describe_outcome(status.last_outcome.as_ref()), false)
        .footer(CreateEmbedFooter::new(format!(
            "Checking every {}s",
            settings.check_interval().as_secs()
        )))
}

fn describe_outcome(outcome: Option<&TickOutcome>) -> String {
    match outcome {
        None => "No check has run yet".to_string(),
        Some(TickOutcome::Unchanged) => "No changes".to_string(),
        Some(TickOutcome::Skipped(reason)) => format!("Skipped: {}", reason),
        Some(TickOutcome::Applied(report)) => format!(
            "{} sent, {} edited, {} deleted, {} failed",
            report.sent, report.edited, report.deleted, report.failed
        ),
    }
}
