use mentat::channel::HttpDirectory;
use mentat::commands::{demand, mission, report, resources, user};
use mentat::mission::{HttpMissionBoard, MissionService};
use mentat::scheduler::{MissionSweeper, ReportLoop};
use mentat::{config::Config, db::Database, interactions, Data};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration: {:?}", config);
    let discord_token = config.discord_token.clone();

    let db = Database::new(&config)?;
    db.execute_init()?;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                report::report(),
                demand::demand(),
                resources::resources(),
                mission::mission(),
                user::user(),
            ],
            event_handler: |ctx, event, _framework, data| {
                Box::pin(interactions::handle_event(ctx, event, data))
            },
            on_error: |err| {
                Box::pin(async move {
                    match err {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!("Command /{} failed: {}", ctx.command().qualified_name, error);
                            let _ = ctx
                                .send(
                                    poise::CreateReply::default()
                                        .content("❌ Something went wrong. Please try again.")
                                        .ephemeral(true),
                                )
                                .await;
                        }
                        other => {
                            if let Err(e) = poise::builtins::on_error(other).await {
                                error!("Error while handling error: {}", e);
                            }
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                info!("Bot is ready!");
                match config.dev_guild_id {
                    Some(guild_id) => {
                        poise::builtins::register_in_guild(
                            ctx,
                            &framework.options().commands,
                            serenity::GuildId::new(guild_id),
                        )
                        .await?;
                        info!("Registered commands in guild {}", guild_id);
                    }
                    None => {
                        poise::builtins::register_globally(ctx, &framework.options().commands)
                            .await?;
                    }
                }

                // Set bot status
                ctx.set_activity(Some(serenity::ActivityData::custom(&config.status_message)));

                let data = Data {
                    config,
                    http_client: reqwest::Client::new(),
                    db,
                };
                data.sheet_importer().sync(&data.db).await;

                let report_loop = ReportLoop::new(
                    data.db.clone(),
                    Arc::new(HttpDirectory::new(ctx.http.clone())),
                    data.config.report_interval_minutes,
                );
                tokio::spawn(report_loop.run());

                let sweeper = MissionSweeper::new(
                    MissionService::new(
                        data.db.clone(),
                        Arc::new(HttpMissionBoard::new(ctx.http.clone())),
                        data.config.mission_grace_hours,
                    ),
                    data.config.mission_sweep_interval_secs,
                );
                tokio::spawn(sweeper.run());

                Ok(data)
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged();

    let mut client = serenity::ClientBuilder::new(&discord_token, intents)
        .framework(framework)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    info!("Starting bot...");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}
