use crate::error::InvokerError;
use crate::models::report::{Report, ReportStore, Verdict};
use crate::store::ObjectStore;
use crate::types::{unix_time, UnixTime};

/// Handles a worker crash between the claim and publish steps, which would otherwise leave a
/// report permanently `Running`: on startup, re-queue every report that has been `Running` for
/// longer than `running_timeout_secs`, by conditionally flipping it back to `Queued`.
///
/// Returns the ids of reports it requeued. Safe to call from more than one process at once - the
/// same `update_if` CAS the claim step uses means only one caller's requeue wins per report.
#[tracing::instrument(skip_all)]
pub async fn sweep_stuck_reports(reports: &ReportStore, now: UnixTime, running_timeout_secs: u64) -> Result<Vec<crate::types::ObjectId>, InvokerError> {
    reports.sync().await?;

    let mut requeued = Vec::new();
    for report in reports.all() {
        if report.verdict != Verdict::Running {
            continue;
        }
        if now - report.create_time < running_timeout_secs as UnixTime {
            continue;
        }

        let mut requeue = report.clone();
        requeue.verdict = Verdict::Queued;
        requeue.create_time = unix_time(chrono::Utc::now());

        if reports.update_if(requeue, None, "verdict", "running").await? {
            requeued.push(report.id);
        }
    }

    Ok(requeued)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stuck_report_detection_uses_a_strict_age_threshold() {
        let stuck = Report {
            id: 1,
            solution_id: 1,
            verdict: Verdict::Running,
            create_time: 1000,
            data: serde_json::Value::Null,
        };
        assert!(stuck.verdict == Verdict::Running && 1700 - stuck.create_time >= 600);
        assert!(!(stuck.verdict == Verdict::Running && 1500 - stuck.create_time >= 600));
    }
}
