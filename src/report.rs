//! Demand-report reconciliation.
//!
//! Makes the live messages of a channel match the stored demand state: one
//! message per resource at high or medium demand, none for anything else.
//! A stored binding only says which message we *think* represents a
//! resource; every use of it is followed by a live fetch. Reconciliation is
//! idempotent, so overlapping triggers can only cause a redundant edit.

use crate::channel::{fetch_and_delete, ChannelError, MessageChannel};
use crate::db::{Database, DemandLevel, Resource};
use crate::render::ReportCard;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// What a single-resource reconciliation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The bound message was edited in place.
    Edited { message_id: u64 },
    /// A new message was sent. `replaced` is the binding it superseded, if the
    /// bound message had disappeared.
    Created {
        message_id: u64,
        replaced: Option<u64>,
    },
    /// The resource is low or gone; its binding was dropped.
    TornDown { message_id: u64, deleted: bool },
    /// Nothing to display and nothing bound.
    Idle,
}

/// Tally of one full refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub edited: usize,
    pub created: usize,
    pub removed: usize,
    pub failed: usize,
}

impl RefreshSummary {
    fn record(&mut self, outcome: &anyhow::Result<Reconciliation>) {
        match outcome {
            Ok(Reconciliation::Edited { .. }) => self.edited += 1,
            Ok(Reconciliation::Created { .. }) => self.created += 1,
            Ok(Reconciliation::TornDown { .. }) => self.removed += 1,
            Ok(Reconciliation::Idle) => {}
            Err(_) => self.failed += 1,
        }
    }
}

/// Display order: high before medium, then by name. Correctness never
/// depends on it.
fn display_order(a: &Resource, b: &Resource) -> std::cmp::Ordering {
    let rank = |r: &Resource| match r.demand {
        DemandLevel::High => 0,
        DemandLevel::Medium => 1,
        DemandLevel::Low => 2,
    };
    rank(a).cmp(&rank(b)).then_with(|| a.name.cmp(&b.name))
}

#[derive(Clone)]
pub struct ReportReconciler {
    db: Database,
}

impl ReportReconciler {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Full reconciliation of `channel` against the store.
    ///
    /// Each resource is reconciled on its own; one failure never blocks the
    /// others and leaves that resource's binding as it was.
    pub async fn refresh(&self, channel: &dyn MessageChannel) -> anyhow::Result<RefreshSummary> {
        let mut displayed = self
            .db
            .run_blocking(|db| db.get_by_demand(&DemandLevel::DISPLAYED))
            .await?;
        let bindings = self.db.run_blocking(|db| db.list_bindings()).await?;
        let mut summary = RefreshSummary::default();

        if displayed.is_empty() {
            for (resource_id, message_id) in bindings {
                let deleted = self.tear_down(channel, &resource_id, message_id).await;
                if let Err(e) = &deleted {
                    warn!("Failed to clear stale report for {}: {:#}", resource_id, e);
                }
                summary.record(&deleted.map(|deleted| Reconciliation::TornDown {
                    message_id,
                    deleted,
                }));
            }
            info!(
                "Report refresh in channel {}: nothing in demand, removed {} stale message(s)",
                channel.id(),
                summary.removed
            );
            return Ok(summary);
        }

        displayed.sort_by(display_order);
        let wanted: HashSet<&str> = displayed.iter().map(|r| r.id.as_str()).collect();

        for resource in &displayed {
            let outcome = self.reconcile_one(channel, &resource.id).await;
            if let Err(e) = &outcome {
                warn!("Failed to reconcile report for {}: {:#}", resource.id, e);
            }
            summary.record(&outcome);
        }

        // Orphans: bindings for resources that dropped to low or left the store.
        for (resource_id, _) in bindings {
            if wanted.contains(resource_id.as_str()) {
                continue;
            }
            let outcome = self.reconcile_one(channel, &resource_id).await;
            if let Err(e) = &outcome {
                warn!("Failed to clear stale report for {}: {:#}", resource_id, e);
            }
            summary.record(&outcome);
        }

        info!(
            "Report refresh in channel {}: {} edited, {} created, {} removed, {} failed",
            channel.id(),
            summary.edited,
            summary.created,
            summary.removed,
            summary.failed
        );
        Ok(summary)
    }

    /// Reconcile the message for a single resource.
    pub async fn reconcile_one(
        &self,
        channel: &dyn MessageChannel,
        resource_id: &str,
    ) -> anyhow::Result<Reconciliation> {
        let id = resource_id.to_string();
        let (resource, binding) = self
            .db
            .run_blocking(move |db| Ok((db.get_resource(&id)?, db.get_binding(&id)?)))
            .await?;

        let resource = match resource {
            Some(resource) if resource.demand.is_displayed() => resource,
            _ => {
                let Some(message_id) = binding else {
                    return Ok(Reconciliation::Idle);
                };
                let deleted = self.tear_down(channel, resource_id, message_id).await?;
                return Ok(Reconciliation::TornDown {
                    message_id,
                    deleted,
                });
            }
        };

        let card = ReportCard::for_resource(&resource);

        if let Some(message_id) = binding {
            match Self::edit_in_place(channel, message_id, &card).await {
                Ok(()) => {
                    debug!("Edited report message {} for {}", message_id, resource_id);
                    return Ok(Reconciliation::Edited { message_id });
                }
                Err(e) if e.is_absent() => {
                    debug!(
                        "Report message {} for {} is gone ({}), sending a new one",
                        message_id, resource_id, e
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        let handle = channel.send(&card).await?;
        let id = resource_id.to_string();
        self.db
            .run_blocking(move |db| db.set_binding(&id, handle.id))
            .await?;
        info!(
            "Posted report message {} for {} ({})",
            handle.id, resource_id, resource.demand
        );
        Ok(Reconciliation::Created {
            message_id: handle.id,
            replaced: binding,
        })
    }

    async fn edit_in_place(
        channel: &dyn MessageChannel,
        message_id: u64,
        card: &ReportCard,
    ) -> Result<(), ChannelError> {
        let handle = channel.fetch(message_id).await?;
        channel.edit(&handle, card).await
    }

    /// Delete the bound message if it still exists, then forget the binding
    /// whatever the delete did. Returns whether a live message was deleted.
    async fn tear_down(
        &self,
        channel: &dyn MessageChannel,
        resource_id: &str,
        message_id: u64,
    ) -> anyhow::Result<bool> {
        let deleted = match fetch_and_delete(channel, message_id).await {
            Ok(deleted) => deleted,
            Err(e) => {
                warn!(
                    "Could not delete report message {} for {}: {}",
                    message_id, resource_id, e
                );
                false
            }
        };
        let id = resource_id.to_string();
        self.db.run_blocking(move |db| db.remove_binding(&id)).await?;
        debug!("Cleared report binding for {} (message {})", resource_id, message_id);
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::testing::{FakeChannel, Op};
    use crate::db::{record, test_db};

    fn seeded(levels: &[(&str, DemandLevel)]) -> Database {
        let db = test_db();
        let records: Vec<_> = levels
            .iter()
            .enumerate()
            .map(|(tier, (name, _))| record(name, tier as i64 + 1))
            .collect();
        db.replace_resources(&records).unwrap();
        for (name, level) in levels {
            let id = crate::db::ResourceRecord::id_for_name(name);
            db.set_demand(&id, *level).unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_low_to_high_sends_one_message_and_binds() {
        let db = seeded(&[("Spice", DemandLevel::Low)]);
        let reconciler = ReportReconciler::new(db.clone());
        let channel = FakeChannel::new(1);

        db.set_demand("spice", DemandLevel::High).unwrap();
        let outcome = reconciler.reconcile_one(&channel, "spice").await.unwrap();

        let Reconciliation::Created {
            message_id,
            replaced: None,
        } = outcome
        else {
            panic!("expected a fresh message, got {:?}", outcome);
        };
        assert_eq!(channel.sends(), 1);
        let card = channel.message(message_id).unwrap();
        assert!(card.description.contains("**Demand:** High"));
        assert!(card.description.contains("Tier 1"));
        assert_eq!(db.get_binding("spice").unwrap(), Some(message_id));
    }

    #[tokio::test]
    async fn test_missing_bound_message_is_replaced() {
        let db = seeded(&[("Water", DemandLevel::High)]);
        db.set_binding("water", 555).unwrap();
        let reconciler = ReportReconciler::new(db.clone());
        let channel = FakeChannel::new(1);

        let outcome = reconciler.reconcile_one(&channel, "water").await.unwrap();

        let Reconciliation::Created {
            message_id,
            replaced: Some(555),
        } = outcome
        else {
            panic!("expected replacement, got {:?}", outcome);
        };
        assert_eq!(channel.ops(), vec![Op::Fetch(555), Op::Send(message_id)]);
        assert_eq!(db.get_binding("water").unwrap(), Some(message_id));
    }

    #[tokio::test]
    async fn test_forbidden_bound_message_is_replaced() {
        let db = seeded(&[("Water", DemandLevel::Medium)]);
        db.set_binding("water", 555).unwrap();
        let reconciler = ReportReconciler::new(db.clone());
        let channel = FakeChannel::new(1);
        channel.fail_fetch(555, ChannelError::Forbidden);

        let outcome = reconciler.reconcile_one(&channel, "water").await.unwrap();
        assert!(matches!(outcome, Reconciliation::Created { replaced: Some(555), .. }));
        assert_ne!(db.get_binding("water").unwrap(), Some(555));
    }

    #[tokio::test]
    async fn test_live_binding_is_edited_in_place() {
        let db = seeded(&[("Spice", DemandLevel::High)]);
        let reconciler = ReportReconciler::new(db.clone());
        let channel = FakeChannel::new(1);

        let first = reconciler.reconcile_one(&channel, "spice").await.unwrap();
        let Reconciliation::Created { message_id, .. } = first else {
            panic!("expected creation, got {:?}", first);
        };

        db.set_demand("spice", DemandLevel::Medium).unwrap();
        channel.clear_ops();
        let second = reconciler.reconcile_one(&channel, "spice").await.unwrap();

        assert_eq!(second, Reconciliation::Edited { message_id });
        assert_eq!(channel.ops(), vec![Op::Fetch(message_id), Op::Edit(message_id)]);
        assert!(channel
            .message(message_id)
            .unwrap()
            .description
            .contains("**Demand:** Medium"));
        assert_eq!(db.get_binding("spice").unwrap(), Some(message_id));
    }

    #[tokio::test]
    async fn test_transient_edit_failure_keeps_binding_and_sends_nothing() {
        let db = seeded(&[("Spice", DemandLevel::High)]);
        db.set_binding("spice", 777).unwrap();
        let reconciler = ReportReconciler::new(db.clone());
        let channel = FakeChannel::new(1);
        channel.fail_fetch(777, ChannelError::Api("502".to_string()));

        assert!(reconciler.reconcile_one(&channel, "spice").await.is_err());
        assert_eq!(channel.sends(), 0);
        assert_eq!(db.get_binding("spice").unwrap(), Some(777));
    }

    #[tokio::test]
    async fn test_low_or_unknown_resource_is_torn_down() {
        let db = seeded(&[("Spice", DemandLevel::High)]);
        let reconciler = ReportReconciler::new(db.clone());
        let channel = FakeChannel::new(1);

        let Reconciliation::Created { message_id, .. } =
            reconciler.reconcile_one(&channel, "spice").await.unwrap()
        else {
            panic!("expected creation");
        };

        db.set_demand("spice", DemandLevel::Low).unwrap();
        let outcome = reconciler.reconcile_one(&channel, "spice").await.unwrap();
        assert_eq!(
            outcome,
            Reconciliation::TornDown {
                message_id,
                deleted: true
            }
        );
        assert!(channel.live_ids().is_empty());
        assert_eq!(db.get_binding("spice").unwrap(), None);

        // Dangling binding for a resource that no longer exists.
        db.set_binding("ghost", 4242).unwrap();
        let outcome = reconciler.reconcile_one(&channel, "ghost").await.unwrap();
        assert_eq!(
            outcome,
            Reconciliation::TornDown {
                message_id: 4242,
                deleted: false
            }
        );
        assert_eq!(db.get_binding("ghost").unwrap(), None);

        assert_eq!(
            reconciler.reconcile_one(&channel, "ghost").await.unwrap(),
            Reconciliation::Idle
        );
    }

    #[tokio::test]
    async fn test_refresh_displays_each_qualifying_resource_once() {
        let db = seeded(&[
            ("Spice", DemandLevel::High),
            ("Water", DemandLevel::Medium),
            ("Sand", DemandLevel::Low),
        ]);
        let reconciler = ReportReconciler::new(db.clone());
        let channel = FakeChannel::new(1);

        let summary = reconciler.refresh(&channel).await.unwrap();
        assert_eq!(
            summary,
            RefreshSummary {
                created: 2,
                ..Default::default()
            }
        );

        let mut live = channel.live_resources();
        live.sort();
        assert_eq!(live, vec!["spice", "water"]);

        let bindings = db.list_bindings().unwrap();
        assert_eq!(bindings.len(), 2);
        for (resource_id, message_id) in bindings {
            assert_eq!(channel.message(message_id).unwrap().resource_id, resource_id);
        }
    }

    #[tokio::test]
    async fn test_second_refresh_only_edits() {
        let db = seeded(&[("Spice", DemandLevel::High), ("Water", DemandLevel::Medium)]);
        let reconciler = ReportReconciler::new(db.clone());
        let channel = FakeChannel::new(1);

        reconciler.refresh(&channel).await.unwrap();
        let before = db.list_bindings().unwrap();
        channel.clear_ops();

        let summary = reconciler.refresh(&channel).await.unwrap();
        assert_eq!(
            summary,
            RefreshSummary {
                edited: 2,
                ..Default::default()
            }
        );
        assert_eq!(db.list_bindings().unwrap(), before);
        assert!(channel
            .ops()
            .iter()
            .all(|op| matches!(op, Op::Fetch(_) | Op::Edit(_))));
    }

    #[tokio::test]
    async fn test_refresh_with_nothing_displayed_clears_every_binding() {
        let db = seeded(&[("Spice", DemandLevel::Low)]);
        db.set_binding("msg_a", 111).unwrap();
        db.set_binding("msg_b", 222).unwrap();
        let reconciler = ReportReconciler::new(db.clone());
        let channel = FakeChannel::new(1);
        let card = ReportCard::for_resource(&db.get_resource("spice").unwrap().unwrap());
        channel.seed(111, card.clone());
        channel.seed(222, card);
        channel.fail_delete(222, ChannelError::Api("500".to_string()));

        let summary = reconciler.refresh(&channel).await.unwrap();

        assert_eq!(summary.removed, 2);
        assert!(channel.ops().contains(&Op::Delete(111)));
        assert!(channel.ops().contains(&Op::Delete(222)));
        assert!(db.list_bindings().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_clears_demoted_resources_alongside_displayed_ones() {
        let db = seeded(&[("Spice", DemandLevel::High), ("Water", DemandLevel::High)]);
        let reconciler = ReportReconciler::new(db.clone());
        let channel = FakeChannel::new(1);
        reconciler.refresh(&channel).await.unwrap();

        db.set_demand("water", DemandLevel::Low).unwrap();
        let summary = reconciler.refresh(&channel).await.unwrap();

        assert_eq!(summary.edited, 1);
        assert_eq!(summary.removed, 1);
        assert_eq!(channel.live_resources(), vec!["spice"]);
        assert_eq!(db.get_binding("water").unwrap(), None);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_others() {
        let db = seeded(&[("Spice", DemandLevel::High), ("Water", DemandLevel::High)]);
        db.set_binding("spice", 900).unwrap();
        let reconciler = ReportReconciler::new(db.clone());
        let channel = FakeChannel::new(1);
        channel.fail_fetch(900, ChannelError::Api("timeout".to_string()));

        let summary = reconciler.refresh(&channel).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.created, 1);
        assert_eq!(channel.live_resources(), vec!["water"]);
        assert_eq!(db.get_binding("spice").unwrap(), Some(900));
    }

    #[tokio::test]
    async fn test_overlapping_refreshes_never_duplicate() {
        let db = seeded(&[("Spice", DemandLevel::High)]);
        let reconciler = ReportReconciler::new(db.clone());
        let channel = FakeChannel::new(1);
        reconciler.refresh(&channel).await.unwrap();

        let (a, b) = tokio::join!(reconciler.refresh(&channel), reconciler.refresh(&channel));
        a.unwrap();
        b.unwrap();

        assert_eq!(channel.live_resources(), vec!["spice"]);
        assert_eq!(channel.sends(), 1);
    }
}
