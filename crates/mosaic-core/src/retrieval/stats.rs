//! Running query statistics.

use chrono::{DateTime, Utc};

/// Query count, incremental mean latency and last-query time.
#[derive(Debug, Clone, Default)]
pub struct QueryStats {
    pub total_queries: u64,
    pub average_response_ms: f64,
    pub last_query_at: Option<DateTime<Utc>>,
}

impl QueryStats {
    /// Fold one query's duration into the running mean.
    pub fn record(&mut self, duration_ms: f64, at: DateTime<Utc>) {
        self.total_queries += 1;
        self.average_response_ms += (duration_ms - self.average_response_ms) / self.total_queries as f64;
        self.last_query_at = Some(at);
    }
}
