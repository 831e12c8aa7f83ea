use serde::Serialize;

/// What happened to a single input row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordOutcome {
    Created,
    Updated,
    Skipped,
    Failed,
}

/// Run-scoped tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ImportOutcome {
    pub fn record(&mut self, outcome: RecordOutcome) -> RecordOutcome {
        match outcome {
            RecordOutcome::Created => self.created += 1,
            RecordOutcome::Updated => self.updated += 1,
            RecordOutcome::Skipped => self.skipped += 1,
            RecordOutcome::Failed => self.failed += 1,
        }
        outcome
    }

    pub fn total(&self) -> usize {
        self.created + self.updated + self.skipped + self.failed
    }

    pub fn venue_summary(&self, dry_run: bool) -> String {
        if dry_run {
            format!(
                "[DRY RUN] Create: {}, Update: {}, Skip: {}, Geocode-failed: {}",
                self.created, self.updated, self.skipped, self.failed
            )
        } else {
            format!(
                "Created: {}, Updated: {}, Skipped: {}, Geocode-failed: {}",
                self.created, self.updated, self.skipped, self.failed
            )
        }
    }

    pub fn band_summary(&self, dry_run: bool) -> String {
        if dry_run {
            format!(
                "[DRY RUN] Would create: {}, update: {}, skip: {}",
                self.created, self.updated, self.skipped
            )
        } else {
            format!(
                "Created: {}, Updated: {}, Skipped: {}",
                self.created, self.updated, self.skipped
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tallies_and_formats_summaries() {
        let mut outcome = ImportOutcome::default();
        outcome.record(RecordOutcome::Created);
        outcome.record(RecordOutcome::Skipped);
        outcome.record(RecordOutcome::Failed);

        assert_eq!(outcome.total(), 3);
        assert_eq!(
            outcome.venue_summary(false),
            "Created: 1, Updated: 0, Skipped: 1, Geocode-failed: 1"
        );
        assert_eq!(
            outcome.venue_summary(true),
            "[DRY RUN] Create: 1, Update: 0, Skip: 1, Geocode-failed: 1"
        );
        assert_eq!(
            outcome.band_summary(true),
            "[DRY RUN] Would create: 1, update: 0, skip: 1"
        );
    }
}
