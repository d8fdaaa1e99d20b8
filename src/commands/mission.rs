use crate::mission::{
    local_now, resolve_local_time, HttpMissionBoard, MissionDraft, MissionService,
};
use crate::{ApplicationContext, Context, Error};
use poise::serenity_prelude as serenity;
use poise::Modal as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const CONFIRM_TIMEOUT: Duration = Duration::from_secs(300);

/// Mission planning
#[poise::command(slash_command, subcommands("create"), guild_only)]
pub async fn mission(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

#[derive(Debug, Default, poise::Modal)]
#[name = "Create a new mission"]
struct MissionModal {
    #[name = "Mission Details"]
    #[paragraph]
    #[max_length = 1500]
    details: String,
    #[name = "Date (YYYY-MM-DD)"]
    date: String,
    #[name = "Time (24-hour format)"]
    time: String,
}

/// Plan a mission and post it to this channel
#[poise::command(slash_command, guild_only)]
pub async fn create(app_ctx: ApplicationContext<'_>) -> Result<(), Error> {
    let ctx = poise::Context::Application(app_ctx);
    let user_id = ctx.author().id.get();
    let timezone = ctx
        .data()
        .db
        .run_blocking(move |db| db.get_user_timezone(user_id))
        .await?;
    let Some(timezone) = timezone else {
        ctx.send(
            poise::CreateReply::default()
                .content(
                    "To create a mission, you must first set your timezone. Use the \
                     `/user set_timezone` command. This is a one-time setup.",
                )
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    };

    let (date, time) = match local_now(&timezone) {
        Ok(now) => now,
        Err(e) => {
            ctx.send(poise::CreateReply::default().content(e.to_string()).ephemeral(true))
                .await?;
            return Ok(());
        }
    };
    let defaults = MissionModal {
        details: String::new(),
        date,
        time,
    };
    let Some(form) = MissionModal::execute_with_defaults(app_ctx, defaults).await? else {
        return Ok(());
    };

    let scheduled_at = match resolve_local_time(&timezone, &form.date, &form.time) {
        Ok(at) => at,
        Err(e) => {
            ctx.send(poise::CreateReply::default().content(e.to_string()).ephemeral(true))
                .await?;
            return Ok(());
        }
    };

    let draft = MissionDraft {
        channel_id: ctx.channel_id().get(),
        creator_id: user_id,
        details: form.details.trim().to_string(),
        scheduled_at,
        timezone,
    };
    confirm_and_post(ctx, draft).await
}

/// Show the creator a private preview and post only on confirmation.
async fn confirm_and_post(ctx: Context<'_>, draft: MissionDraft) -> Result<(), Error> {
    let confirm_id = format!("{}confirm", ctx.id());
    let cancel_id = format!("{}cancel", ctx.id());
    let row = serenity::CreateActionRow::Buttons(vec![
        serenity::CreateButton::new(&confirm_id)
            .label("Confirm & Post")
            .style(serenity::ButtonStyle::Success),
        serenity::CreateButton::new(&cancel_id)
            .label("Cancel")
            .style(serenity::ButtonStyle::Danger),
    ]);

    let preview = ctx
        .send(
            poise::CreateReply::default()
                .embed(draft.preview().embed())
                .components(vec![row])
                .ephemeral(true),
        )
        .await?;

    let prefix = ctx.id().to_string();
    let Some(press) = serenity::ComponentInteractionCollector::new(ctx.serenity_context())
        .author_id(ctx.author().id)
        .channel_id(ctx.channel_id())
        .timeout(CONFIRM_TIMEOUT)
        .filter(move |press| press.data.custom_id.starts_with(&prefix))
        .await
    else {
        let _ = preview
            .edit(
                ctx,
                poise::CreateReply::default()
                    .content("Mission creation timed out.")
                    .components(vec![]),
            )
            .await;
        return Ok(());
    };

    let status = if press.data.custom_id == confirm_id {
        let service = MissionService::new(
            ctx.data().db.clone(),
            Arc::new(HttpMissionBoard::new(ctx.serenity_context().http.clone())),
            ctx.data().config.mission_grace_hours,
        );
        match service.post(draft).await {
            Ok(mission) => {
                info!("Mission {} created by {}", mission.id, mission.creator_id);
                "Mission posted."
            }
            Err(e) => {
                warn!("Failed to post mission: {:#}", e);
                "The mission could not be posted. Please try again."
            }
        }
    } else {
        "Mission creation cancelled."
    };

    press
        .create_response(
            ctx.serenity_context(),
            serenity::CreateInteractionResponse::UpdateMessage(
                serenity::CreateInteractionResponseMessage::new()
                    .content(status)
                    .embeds(vec![])
                    .components(vec![]),
            ),
        )
        .await?;
    Ok(())
}
