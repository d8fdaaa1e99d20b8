use crate::sheet::SyncOutcome;
use crate::{Context, Error};

/// Resource catalogue management
#[poise::command(
    slash_command,
    subcommands("sync"),
    guild_only,
    required_permissions = "MANAGE_GUILD"
)]
pub async fn resources(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Re-import resources from the sheet now
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn sync(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;

    let outcome = ctx.data().sheet_importer().sync(&ctx.data().db).await;
    let message = match outcome {
        SyncOutcome::Synced(summary) => format!(
            "✅ Imported {} resources ({} new, {} removed, {} kept their demand).",
            summary.total, summary.added, summary.removed, summary.preserved
        ),
        SyncOutcome::Skipped => "❌ No sheet URL is configured.".to_string(),
        SyncOutcome::Empty => {
            "⚠️ The sheet had no usable rows. Local data was left unchanged.".to_string()
        }
        SyncOutcome::Failed => {
            "⚠️ The sheet could not be imported. Local data was left unchanged.".to_string()
        }
    };

    ctx.say(message).await?;
    Ok(())
}
