use crate::channel::SerenityChannel;
use crate::report::{RefreshSummary, ReportReconciler};
use crate::{Context, Error};
use humantime::parse_duration;
use tracing::info;

const MIN_INTERVAL_SECS: u64 = 60;

/// Demand report management
#[poise::command(slash_command, subcommands("start", "now", "interval"), guild_only)]
pub async fn report(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Post demand reports in this channel from now on
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn start(ctx: Context<'_>) -> Result<(), Error> {
    let channel_id = ctx.channel_id();
    ctx.data()
        .db
        .run_blocking(move |db| db.set_report_channel(channel_id.get()))
        .await?;
    info!("Report channel set to {} by {}", channel_id, ctx.author().id);

    ctx.send(
        poise::CreateReply::default()
            .content("Channel registered for reports.")
            .ephemeral(true),
    )
    .await?;

    refresh_here(ctx).await?;
    Ok(())
}

/// Refresh the demand reports in this channel
#[poise::command(slash_command, guild_only)]
pub async fn now(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let summary = refresh_here(ctx).await?;
    ctx.say(format!(
        "Reports refreshed. {} updated, {} posted, {} removed{}.",
        summary.edited,
        summary.created,
        summary.removed,
        if summary.failed > 0 {
            format!(", {} failed", summary.failed)
        } else {
            String::new()
        }
    ))
    .await?;
    Ok(())
}

/// Change how often reports refresh (examples: 15m, 1h, 2h 30m)
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn interval(
    ctx: Context<'_>,
    #[description = "Refresh interval (e.g., 30m, 1h)"] every: String,
) -> Result<(), Error> {
    let duration = match parse_duration(every.trim()) {
        Ok(duration) => duration,
        Err(_) => {
            ctx.send(
                poise::CreateReply::default()
                    .content("❌ Invalid duration. Examples: `15m`, `1h`, `2h 30m`.")
                    .ephemeral(true),
            )
            .await?;
            return Ok(());
        }
    };
    if duration.as_secs() < MIN_INTERVAL_SECS {
        ctx.send(
            poise::CreateReply::default()
                .content("❌ The report interval must be at least 1 minute.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    let minutes = duration.as_secs() / 60;
    ctx.data()
        .db
        .run_blocking(move |db| db.set_report_interval_minutes(minutes))
        .await?;
    info!("Report interval set to {} minute(s)", minutes);

    ctx.send(
        poise::CreateReply::default()
            .content(format!(
                "✅ Reports will refresh every {} minute(s), starting after the next refresh.",
                minutes
            ))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

async fn refresh_here(ctx: Context<'_>) -> Result<RefreshSummary, Error> {
    let channel = SerenityChannel::new(ctx.serenity_context().http.clone(), ctx.channel_id());
    let reconciler = ReportReconciler::new(ctx.data().db.clone());
    Ok(reconciler.refresh(&channel).await?)
}
