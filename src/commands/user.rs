use super::matching_choices;
use crate::mission::parse_timezone;
use crate::{Context, Error};
use tracing::info;

/// Personal settings
#[poise::command(slash_command, subcommands("set_timezone"))]
pub async fn user(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

async fn autocomplete_timezone(_ctx: Context<'_>, partial: &str) -> Vec<String> {
    matching_choices(chrono_tz::TZ_VARIANTS.iter().map(|tz| tz.name()), partial)
}

/// Set your timezone (needed to schedule missions)
#[poise::command(slash_command)]
pub async fn set_timezone(
    ctx: Context<'_>,
    #[description = "IANA timezone, e.g. Europe/Berlin"]
    #[autocomplete = "autocomplete_timezone"]
    timezone: String,
) -> Result<(), Error> {
    let reply = match parse_timezone(&timezone) {
        Ok(tz) => {
            let user_id = ctx.author().id.get();
            let name = tz.name().to_string();
            let stored = name.clone();
            ctx.data()
                .db
                .run_blocking(move |db| db.set_user_timezone(user_id, &stored))
                .await?;
            info!("User {} set timezone {}", user_id, name);
            format!(
                "Your timezone has been set to {}. You can now use `/mission create`.",
                name
            )
        }
        Err(_) => "Invalid timezone. Please select a valid timezone from the list.".to_string(),
    };

    ctx.send(poise::CreateReply::default().content(reply).ephemeral(true))
        .await?;
    Ok(())
}
