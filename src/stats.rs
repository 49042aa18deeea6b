use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::Error;

/// Result of processing one source item.
#[derive(Debug)]
pub enum ItemOutcome {
    Processed {
        written_boxes: usize,
        unknown_class: usize,
        invalid_geometry: usize,
    },
    Skipped {
        path: PathBuf,
        reason: String,
    },
    Failed {
        path: PathBuf,
        error: Error,
    },
}

// Struct to hold processing statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessingStats {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub written_boxes: usize,
    pub dropped_unknown_class: usize,
    pub dropped_invalid_geometry: usize,
    pub skip_reasons: BTreeMap<String, usize>,
    pub failure_reasons: BTreeMap<String, usize>,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Processed {
                written_boxes,
                unknown_class,
                invalid_geometry,
            } => {
                self.processed += 1;
                self.written_boxes += written_boxes;
                self.dropped_unknown_class += unknown_class;
                self.dropped_invalid_geometry += invalid_geometry;
            }
            ItemOutcome::Skipped { path, reason } => {
                log::warn!("Skipped {}: {}", path.display(), reason);
                self.skipped += 1;
                *self.skip_reasons.entry(reason).or_insert(0) += 1;
            }
            ItemOutcome::Failed { path, error } => {
                log::error!("Failed {}: {}", path.display(), error);
                self.failed += 1;
                *self.failure_reasons.entry(error.kind()).or_insert(0) += 1;
            }
        }
    }

    pub fn merge(&mut self, other: ProcessingStats) {
        self.processed += other.processed;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.written_boxes += other.written_boxes;
        self.dropped_unknown_class += other.dropped_unknown_class;
        self.dropped_invalid_geometry += other.dropped_invalid_geometry;
        for (reason, n) in other.skip_reasons {
            *self.skip_reasons.entry(reason).or_insert(0) += n;
        }
        for (reason, n) in other.failure_reasons {
            *self.failure_reasons.entry(reason).or_insert(0) += n;
        }
    }

    pub fn total(&self) -> usize {
        self.processed + self.skipped + self.failed
    }

    pub fn print_summary(&self) {
        log::info!("=== Processing Summary ===");
        log::info!("Total items: {}", self.total());
        log::info!("Processed: {}", self.processed);
        log::info!("Skipped: {}", self.skipped);
        log::info!("Failed: {}", self.failed);
        if self.written_boxes + self.dropped_unknown_class + self.dropped_invalid_geometry > 0 {
            log::info!(
                "Boxes written: {} (dropped: {} unknown class, {} invalid geometry)",
                self.written_boxes,
                self.dropped_unknown_class,
                self.dropped_invalid_geometry
            );
        }
        for (reason, n) in &self.skip_reasons {
            log::warn!("Skip reason '{}': {}", reason, n);
        }
        for (reason, n) in &self.failure_reasons {
            log::warn!("Failure reason '{}': {}", reason, n);
        }
    }
}

impl FromIterator<ItemOutcome> for ProcessingStats {
    fn from_iter<I: IntoIterator<Item = ItemOutcome>>(iter: I) -> Self {
        let mut stats = ProcessingStats::new();
        for outcome in iter {
            stats.record(outcome);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_merge() {
        let mut stats: ProcessingStats = vec![
            ItemOutcome::Processed {
                written_boxes: 2,
                unknown_class: 1,
                invalid_geometry: 0,
            },
            ItemOutcome::Skipped {
                path: "a.jpg".into(),
                reason: "missing annotation".into(),
            },
            ItemOutcome::Failed {
                path: "b.jpg".into(),
                error: Error::Decode {
                    path: "b.jpg".into(),
                    reason: "eof".into(),
                },
            },
            ItemOutcome::Failed {
                path: "c.jpg".into(),
                error: Error::Decode {
                    path: "c.jpg".into(),
                    reason: "bad marker".into(),
                },
            },
        ]
        .into_iter()
        .collect();

        assert_eq!((stats.processed, stats.skipped, stats.failed), (1, 1, 2));
        assert_eq!(stats.failure_reasons.get("image decode failed"), Some(&2));
        assert_eq!(stats.dropped_unknown_class, 1);

        let other = stats.clone();
        stats.merge(other);
        assert_eq!(stats.total(), 8);
        assert_eq!(stats.skip_reasons.get("missing annotation"), Some(&2));
    }
}
