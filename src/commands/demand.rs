use super::matching_choices;
use crate::channel::SerenityChannel;
use crate::db::DemandLevel;
use crate::overrides::{apply_override, DemandOverride};
use crate::report::ReportReconciler;
use crate::{Context, Error};
use tracing::warn;

/// Resource demand
#[poise::command(slash_command, subcommands("set"), guild_only)]
pub async fn demand(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

async fn autocomplete_item(ctx: Context<'_>, partial: &str) -> Vec<String> {
    let resources = match ctx.data().db.run_blocking(|db| db.get_all_resources()).await {
        Ok(resources) => resources,
        Err(e) => {
            warn!("Resource autocomplete failed: {:#}", e);
            return Vec::new();
        }
    };
    matching_choices(resources.iter().map(|r| r.name.as_str()), partial)
}

/// Set the demand level of a resource
#[poise::command(slash_command, guild_only)]
pub async fn set(
    ctx: Context<'_>,
    #[description = "Resource name"]
    #[autocomplete = "autocomplete_item"]
    item: String,
    #[description = "New demand level"] level: DemandLevel,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;

    let name = item.trim().to_string();
    let resource = ctx
        .data()
        .db
        .run_blocking(move |db| db.get_resource_by_name(&name))
        .await?;
    let Some(resource) = resource else {
        ctx.say("Item not found.").await?;
        return Ok(());
    };

    let channel = SerenityChannel::new(ctx.serenity_context().http.clone(), ctx.channel_id());
    let reconciler = ReportReconciler::new(ctx.data().db.clone());
    let event = DemandOverride {
        resource_id: resource.id,
        level,
    };
    let reply = match apply_override(&ctx.data().db, &reconciler, &channel, event).await? {
        Some(receipt) => receipt.acknowledgement,
        None => "Item not found.".to_string(),
    };

    ctx.say(reply).await?;
    Ok(())
}
