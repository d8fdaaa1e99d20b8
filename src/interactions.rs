//! Routes component interactions that outlive any single command: the
//! demand selectors on report messages and the buttons on mission messages.

use crate::channel::SerenityChannel;
use crate::mission::{
    HttpMissionBoard, MissionService, MISSION_CANCEL_ID, MISSION_JOIN_ID, MISSION_LEAVE_ID,
};
use crate::overrides::{apply_override, DemandOverride};
use crate::report::ReportReconciler;
use crate::{Data, Error};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{debug, warn};

/// What a component interaction asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Demand(DemandOverride),
    JoinMission,
    LeaveMission,
    CancelMission,
}

impl Route {
    /// `None` for components owned by something else, such as a command's
    /// own collector.
    pub fn parse(custom_id: &str, values: &[String]) -> Option<Self> {
        match custom_id {
            MISSION_JOIN_ID => Some(Route::JoinMission),
            MISSION_LEAVE_ID => Some(Route::LeaveMission),
            MISSION_CANCEL_ID => Some(Route::CancelMission),
            _ => DemandOverride::from_selection(custom_id, values).map(Route::Demand),
        }
    }
}

pub async fn handle_event(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    data: &Data,
) -> Result<(), Error> {
    if let serenity::FullEvent::InteractionCreate {
        interaction: serenity::Interaction::Component(component),
    } = event
    {
        handle_component(ctx, component, data).await?;
    }
    Ok(())
}

async fn handle_component(
    ctx: &serenity::Context,
    component: &serenity::ComponentInteraction,
    data: &Data,
) -> Result<(), Error> {
    let values = match &component.data.kind {
        serenity::ComponentInteractionDataKind::StringSelect { values } => values.clone(),
        _ => Vec::new(),
    };
    let Some(route) = Route::parse(&component.data.custom_id, &values) else {
        return Ok(());
    };
    debug!(
        "Component {} from user {} routed to {:?}",
        component.data.custom_id, component.user.id, route
    );

    component.defer_ephemeral(&ctx.http).await?;
    let reply = match route {
        Route::Demand(event) => {
            let channel = SerenityChannel::new(ctx.http.clone(), component.channel_id);
            let reconciler = ReportReconciler::new(data.db.clone());
            match apply_override(&data.db, &reconciler, &channel, event).await? {
                Some(receipt) => receipt.acknowledgement,
                None => "Item not found.".to_string(),
            }
        }
        Route::JoinMission => {
            let (service, message_id, user_id) = mission_target(ctx, component, data);
            service.join(message_id, user_id).await?.reply().to_string()
        }
        Route::LeaveMission => {
            let (service, message_id, user_id) = mission_target(ctx, component, data);
            service.leave(message_id, user_id).await?.reply().to_string()
        }
        Route::CancelMission => {
            let (service, message_id, user_id) = mission_target(ctx, component, data);
            service.cancel(message_id, user_id).await?.reply().to_string()
        }
    };

    if let Err(e) = component
        .edit_response(&ctx.http, serenity::EditInteractionResponse::new().content(reply))
        .await
    {
        warn!("Failed to answer component interaction: {}", e);
    }
    Ok(())
}

/// The mission a button belongs to is the message carrying it.
fn mission_target(
    ctx: &serenity::Context,
    component: &serenity::ComponentInteraction,
    data: &Data,
) -> (MissionService, u64, u64) {
    let service = MissionService::new(
        data.db.clone(),
        Arc::new(HttpMissionBoard::new(ctx.http.clone())),
        data.config.mission_grace_hours,
    );
    (service, component.message.id.get(), component.user.id.get())
}
