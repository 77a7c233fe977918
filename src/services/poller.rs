//! Background completion of deferred per-group work: translations that
//! failed at upload time and durations that could not be probed.
//!
//! Every group a pass picks up is stamped as attempted, and each pass
//! starts with the least recently attempted groups. A group that keeps
//! failing therefore waits behind the rest instead of filling every batch.

use crate::services::{
    catalog::{CatalogResult, CatalogStore, PollTask},
    object_store::ObjectStore,
    probe::MediaProbe,
    translation::{Translator, translate_into},
};
use std::{sync::Arc, time::Duration};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, warn};

/// Outcome of one poll cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    /// Groups examined across both passes.
    pub scanned: usize,
    /// Groups that received at least one new translation.
    pub translated: usize,
    /// Groups whose duration was filled in.
    pub probed: usize,
    /// Groups left unchanged because of an error.
    pub failed: usize,
}

pub struct Poller {
    catalog: CatalogStore,
    objects: ObjectStore,
    translator: Arc<dyn Translator>,
    probe: Arc<dyn MediaProbe>,
    batch_size: i64,
}

impl Poller {
    pub fn new(
        catalog: CatalogStore,
        objects: ObjectStore,
        translator: Arc<dyn Translator>,
        probe: Arc<dyn MediaProbe>,
        batch_size: i64,
    ) -> Self {
        Self {
            catalog,
            objects,
            translator,
            probe,
            batch_size: batch_size.max(1),
        }
    }

    /// Run cycles forever, one per `every`.
    pub async fn run(&self, every: Duration) {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.run_cycle().await {
                Ok(report) => info!(
                    "poll cycle: scanned={} translated={} probed={} failed={}",
                    report.scanned, report.translated, report.probed, report.failed
                ),
                Err(err) => error!("poll cycle aborted: {}", err),
            }
        }
    }

    pub async fn run_cycle(&self) -> CatalogResult<PollReport> {
        let mut report = PollReport::default();
        self.complete_translations(&mut report).await?;
        self.fill_durations(&mut report).await?;
        Ok(report)
    }

    async fn complete_translations(&self, report: &mut PollReport) -> CatalogResult<()> {
        for mut group in self.catalog.pending_translations(self.batch_size).await? {
            report.scanned += 1;
            self.note_attempt(&group.group_id, PollTask::Translation).await;
            let missing = group.missing_languages();
            let translated =
                translate_into(self.translator.as_ref(), &group.group_name, &missing).await;
            if translated.is_empty() {
                report.failed += 1;
                continue;
            }

            group.merge_translations(translated);
            match self.catalog.update_translations(&group).await {
                Ok(()) => report.translated += 1,
                Err(err) => {
                    warn!("could not save translations for {}: {}", group.group_id, err);
                    report.failed += 1;
                }
            }
        }
        Ok(())
    }

    async fn fill_durations(&self, report: &mut PollReport) -> CatalogResult<()> {
        for group in self.catalog.missing_durations(self.batch_size).await? {
            report.scanned += 1;
            self.note_attempt(&group.group_id, PollTask::Duration).await;
            let path = self.objects.object_path(&group.video_key);
            let seconds = match self.probe.duration_seconds(&path).await {
                Ok(seconds) => seconds,
                Err(err) => {
                    warn!("could not probe video for {}: {}", group.group_id, err);
                    report.failed += 1;
                    continue;
                }
            };

            match self.catalog.update_duration(&group.group_id, seconds).await {
                Ok(()) => report.probed += 1,
                Err(err) => {
                    warn!("could not save duration for {}: {}", group.group_id, err);
                    report.failed += 1;
                }
            }
        }
        Ok(())
    }

    async fn note_attempt(&self, group_id: &str, task: PollTask) {
        if let Err(err) = self.catalog.record_attempt(group_id, task).await {
            warn!("could not record {:?} attempt for {}: {}", task, group_id, err);
        }
    }
}
