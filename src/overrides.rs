//! Demand overrides coming from the per-resource selector.
//!
//! A selection is turned into a [`DemandOverride`] event first, so the
//! handler never sees transport objects. Applying it writes the new level and
//! reconciles that one resource only.

use crate::channel::MessageChannel;
use crate::db::{Database, DemandLevel};
use crate::render::{override_acknowledgement, DEMAND_SELECT_PREFIX};
use crate::report::{Reconciliation, ReportReconciler};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemandOverride {
    pub resource_id: String,
    pub level: DemandLevel,
}

impl DemandOverride {
    /// Build an event from a selector's custom id and selected values.
    /// `None` when the control is not a demand selector or the value is
    /// outside the offered set.
    pub fn from_selection(custom_id: &str, values: &[String]) -> Option<Self> {
        let resource_id = custom_id.strip_prefix(DEMAND_SELECT_PREFIX)?;
        if resource_id.is_empty() {
            return None;
        }
        let level = values.first()?.parse().ok()?;
        Some(Self {
            resource_id: resource_id.to_string(),
            level,
        })
    }
}

/// What the user is told, and what happened to the message.
#[derive(Debug)]
pub struct OverrideReceipt {
    pub acknowledgement: String,
    pub reconciliation: anyhow::Result<Reconciliation>,
}

/// Store the new level, then reconcile the resource in `channel`.
///
/// Returns `Ok(None)` for an unknown resource; nothing is written then.
/// A failed reconciliation does not undo the demand change: the next refresh
/// picks it up.
pub async fn apply_override(
    db: &Database,
    reconciler: &ReportReconciler,
    channel: &dyn MessageChannel,
    event: DemandOverride,
) -> anyhow::Result<Option<OverrideReceipt>> {
    let DemandOverride { resource_id, level } = event;

    let id = resource_id.clone();
    let resource = db
        .run_blocking(move |db| {
            if db.set_demand(&id, level)? {
                db.get_resource(&id)
            } else {
                Ok(None)
            }
        })
        .await?;
    let Some(resource) = resource else {
        return Ok(None);
    };
    info!("Demand for {} set to {}", resource.id, level);

    let reconciliation = reconciler.reconcile_one(channel, &resource.id).await;
    if let Err(e) = &reconciliation {
        warn!("Override for {} stored but not displayed: {:#}", resource.id, e);
    }

    Ok(Some(OverrideReceipt {
        acknowledgement: override_acknowledgement(&resource.name, level),
        reconciliation,
    }))
}
