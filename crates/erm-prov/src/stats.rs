use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One entry in the bounded rejection log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedEntity {
    pub name: String,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Snapshot of the running validation counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationStats {
    pub total_validations: u64,
    pub successful_validations: u64,
    pub failed_validations: u64,
    /// successful / total, or 0.0 before any validation ran.
    pub success_rate: f64,
    pub rejected_entities: Vec<RejectedEntity>,
}

#[derive(Debug)]
pub(crate) struct ValidationLedger {
    total: u64,
    successful: u64,
    failed: u64,
    rejected: VecDeque<RejectedEntity>,
    capacity: usize,
}

impl ValidationLedger {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            total: 0,
            successful: 0,
            failed: 0,
            rejected: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    pub(crate) fn record_success(&mut self) {
        self.total += 1;
        self.successful += 1;
    }

    /// Count a failure and append it to the log, evicting the oldest entry when full.
    pub(crate) fn record_failure(&mut self, name: &str, reason: String) {
        self.total += 1;
        self.failed += 1;
        if self.capacity == 0 {
            return;
        }
        if self.rejected.len() == self.capacity {
            self.rejected.pop_front();
        }
        self.rejected.push_back(RejectedEntity {
            name: name.to_string(),
            reason,
            at: Utc::now(),
        });
    }

    pub(crate) fn snapshot(&self) -> ValidationStats {
        let success_rate = if self.total == 0 {
            0.0
        } else {
            self.successful as f64 / self.total as f64
        };
        ValidationStats {
            total_validations: self.total,
            successful_validations: self.successful,
            failed_validations: self.failed,
            success_rate,
            rejected_entities: self.rejected.iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_is_zero_without_validations() {
        let ledger = ValidationLedger::new(4);
        assert_eq!(ledger.snapshot().success_rate, 0.0);
    }

    #[test]
    fn rejection_log_is_bounded() {
        let mut ledger = ValidationLedger::new(2);
        ledger.record_success();
        for name in ["a", "b", "c"] {
            ledger.record_failure(name, format!("{name} rejected"));
        }
        let stats = ledger.snapshot();
        assert_eq!(stats.total_validations, 4);
        assert_eq!(stats.failed_validations, 3);
        assert_eq!(stats.success_rate, 0.25);
        let names: Vec<_> = stats.rejected_entities.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
    }
}
