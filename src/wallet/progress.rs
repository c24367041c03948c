use tracing::{info, info_span, warn};

use crate::types::{AttemptResult, BatchReport, ProgressStats};

/// Tracks and reports progress of a running batch
pub struct ProgressManager {
    progress: ProgressStats,
}

impl ProgressManager {
    /// Creates a new ProgressManager for `total_operations` attempts
    pub fn new(total_operations: usize) -> Self {
        Self {
            progress: ProgressStats::new(total_operations),
        }
    }

    pub fn stats(&self) -> &ProgressStats {
        &self.progress
    }

    /// Updates progress statistics and prints current status
    pub fn update_progress(&mut self, success: bool) {
        let progress = &mut self.progress;
        progress.completed_operations += 1;
        if success {
            progress.successful_operations += 1;
        }

        let progress_percent = if progress.total_operations == 0 {
            100.0
        } else {
            (progress.completed_operations as f64 / progress.total_operations as f64) * 100.0
        };
        let time_remaining = progress
            .estimated_time_remaining()
            .map(|d| format!("{:.1} minutes", d.as_secs_f64() / 60.0))
            .unwrap_or_else(|| "calculating...".to_string());

        info!(
            completed = progress.completed_operations,
            total = progress.total_operations,
            progress_percent = format!("{:.1}%", progress_percent),
            success_rate = format!("{:.1}%", progress.success_rate()),
            ops_per_minute = format!("{:.1}", progress.operations_per_minute()),
            time_remaining,
            "Progress update"
        );
    }

    /// Prints the batch summary and one line per failed attempt
    pub fn print_statistics(&self, report: &BatchReport) {
        let stats_span = info_span!("execution_statistics");
        let _guard = stats_span.enter();

        info!(
            operation = %report.operation,
            started_at = %report.started_at.format("%Y-%m-%d %H:%M:%S"),
            duration = ?report.elapsed,
            attempts = report.attempts.len(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Execution completed"
        );

        if report.failed() == 0 {
            return;
        }

        let error_span = info_span!("error_summary");
        let _error_guard = error_span.enter();
        warn!(error_count = report.failed(), "Errors occurred during execution");

        for attempt in &report.attempts {
            match &attempt.result {
                AttemptResult::Confirmed(_) => {}
                AttemptResult::Aborted { stage, error } => warn!(
                    wallet = %attempt.wallet,
                    attempt = attempt.attempt,
                    ?stage,
                    %error,
                    "Attempt aborted"
                ),
                AttemptResult::Failed(outcome) => warn!(
                    wallet = %attempt.wallet,
                    attempt = attempt.attempt,
                    status = ?outcome.status,
                    hash = ?outcome.hash,
                    "Attempt failed"
                ),
            }
        }
    }
}
