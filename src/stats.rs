//! 테이블별 발행 행 카운터

use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct TableStatsCounter {
    counts: Mutex<HashMap<String, u64>>,
}

impl TableStatsCounter {
    pub fn new() -> Self {
        TableStatsCounter::default()
    }

    pub fn increment(&self, table_key: &str) {
        *self.counts.lock().entry(table_key.to_string()).or_insert(0) += 1;
    }

    pub fn get(&self, table_key: &str) -> u64 {
        self.counts.lock().get(table_key).copied().unwrap_or(0)
    }

    /// 현재 카운트 스냅샷
    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.counts.lock().clone()
    }
}
