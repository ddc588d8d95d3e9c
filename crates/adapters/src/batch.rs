//! Jobs and CronJobs.

use k8s_openapi::api::batch::v1::{CronJob, Job, JobCondition};
use mirror_core::ResourceKind;
use mirror_store::spec::{CronJobSpec, CronJobStatus, JobSpec, JobStatus, Revision};
use mirror_store::{MirrorRow, RowSpec};

use crate::meta::{self, latest, opt_time};
use crate::revision::{REVISIONS_ANNOTATION, RevisionHistory};
use crate::{AnnotationPatch, ResourceAdapter};

fn condition_true<'a>(conditions: &'a [JobCondition], kind: &str) -> Option<&'a JobCondition> {
    conditions
        .iter()
        .find(|c| c.type_ == kind && c.status == "True")
}

/// `failed` on a true `Failed` condition, `completed` on a true `Complete`
/// condition or once succeeded pods reach the completion count.
pub fn job_status(job: &Job) -> JobStatus {
    let status = job.status.as_ref();
    let conditions = status
        .and_then(|s| s.conditions.as_deref())
        .unwrap_or_default();
    let completions = job.spec.as_ref().and_then(|s| s.completions).unwrap_or(1);
    let succeeded = status.and_then(|s| s.succeeded).unwrap_or(0);

    if condition_true(conditions, "Failed").is_some() {
        JobStatus::Failed
    } else if condition_true(conditions, "Complete").is_some() || succeeded >= completions {
        JobStatus::Completed
    } else {
        JobStatus::Running
    }
}

/// The revision entry for a Job that has finished, or `None` while it runs.
pub fn finished_attempt(job: &Job) -> Option<Revision> {
    let status = job_status(job);
    if !status.is_terminal() {
        return None;
    }
    let observed = job.status.as_ref();
    let true_conditions: Vec<&JobCondition> = observed
        .and_then(|s| s.conditions.as_ref())
        .into_iter()
        .flatten()
        .filter(|c| c.status == "True")
        .collect();
    Some(Revision {
        revision: 0,
        uid: job.metadata.uid.clone().unwrap_or_default(),
        status,
        desired: job.spec.as_ref().and_then(|s| s.completions).unwrap_or(1),
        succeeded: observed.and_then(|s| s.succeeded).unwrap_or(0),
        failed: observed.and_then(|s| s.failed).unwrap_or(0),
        start_time: opt_time(observed.and_then(|s| s.start_time.as_ref())),
        completion_time: opt_time(observed.and_then(|s| s.completion_time.as_ref())),
        reasons: true_conditions.iter().filter_map(|c| c.reason.clone()).collect(),
        messages: true_conditions.iter().filter_map(|c| c.message.clone()).collect(),
    })
}

pub struct JobAdapter;

impl ResourceAdapter for JobAdapter {
    type Source = Job;
    const KIND: ResourceKind = ResourceKind::Job;

    fn project(source: &Job) -> Option<MirrorRow> {
        let spec = source.spec.as_ref();
        let status = source.status.as_ref();
        let conditions = status.and_then(|s| s.conditions.as_ref()).into_iter().flatten();
        let updated_at = latest(
            conditions
                .flat_map(|c| {
                    [
                        opt_time(c.last_transition_time.as_ref()),
                        opt_time(c.last_probe_time.as_ref()),
                    ]
                })
                .chain([opt_time(status.and_then(|s| s.completion_time.as_ref()))]),
        );
        let row = JobSpec {
            status: job_status(source),
            app: meta::app(&source.metadata),
            owner: meta::owner_name(&source.metadata),
            completions: spec.and_then(|s| s.completions).unwrap_or(1),
            parallelism: spec.and_then(|s| s.parallelism).unwrap_or(1),
            active: status.and_then(|s| s.active).unwrap_or(0),
            succeeded: status.and_then(|s| s.succeeded).unwrap_or(0),
            failed: status.and_then(|s| s.failed).unwrap_or(0),
            start_time: opt_time(status.and_then(|s| s.start_time.as_ref())),
            completion_time: opt_time(status.and_then(|s| s.completion_time.as_ref())),
            containers: meta::template_containers(spec.map(|s| &s.template)),
            revisions: RevisionHistory::from_annotations(source.metadata.annotations.as_ref())
                .into_entries(),
        };
        meta::build_row(&source.metadata, RowSpec::Job(row), updated_at)
    }

    fn annotation_update(source: &Job) -> Option<AnnotationPatch> {
        let attempt = finished_attempt(source)?;
        let mut history = RevisionHistory::from_annotations(source.metadata.annotations.as_ref());
        if !history.record(attempt) {
            return None;
        }
        Some(AnnotationPatch {
            key: REVISIONS_ANNOTATION.to_string(),
            value: history.encode()?,
        })
    }
}

pub struct CronJobAdapter;

impl ResourceAdapter for CronJobAdapter {
    type Source = CronJob;
    const KIND: ResourceKind = ResourceKind::CronJob;

    fn project(source: &CronJob) -> Option<MirrorRow> {
        let spec = source.spec.as_ref();
        let status = source.status.as_ref();
        let last_schedule_time = opt_time(status.and_then(|s| s.last_schedule_time.as_ref()));
        let updated_at = latest([
            last_schedule_time,
            opt_time(status.and_then(|s| s.last_successful_time.as_ref())),
        ]);
        let row = CronJobSpec {
            status: if spec.and_then(|s| s.suspend).unwrap_or(false) {
                CronJobStatus::Paused
            } else {
                CronJobStatus::Running
            },
            schedule: spec.map(|s| s.schedule.clone()).unwrap_or_default(),
            last_schedule_time,
            active_jobs: status
                .and_then(|s| s.active.as_ref())
                .into_iter()
                .flatten()
                .filter_map(|r| r.name.clone())
                .collect(),
            containers: meta::template_containers(
                spec.and_then(|s| s.job_template.spec.as_ref())
                    .map(|j| &j.template),
            ),
        };
        meta::build_row(&source.metadata, RowSpec::CronJob(row), updated_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(conditions: serde_json::Value, annotations: serde_json::Value) -> Result<Job, serde_json::Error> {
        serde_json::from_value(json!({
            "metadata": {
                "name": "backup",
                "namespace": "ops",
                "uid": "job-uid-1",
                "creationTimestamp": "2024-03-01T00:00:00Z",
                "annotations": annotations
            },
            "spec": {
                "completions": 1,
                "template": {"spec": {"containers": [{"name": "b", "image": "backup:2"}]}}
            },
            "status": {
                "succeeded": 0,
                "failed": 1,
                "startTime": "2024-03-01T00:00:05Z",
                "conditions": conditions
            }
        }))
    }

    fn failed_condition() -> serde_json::Value {
        json!([{
            "type": "Failed",
            "status": "True",
            "reason": "BackoffLimitExceeded",
            "message": "Job has reached the specified backoff limit",
            "lastTransitionTime": "2024-03-01T00:10:00Z"
        }])
    }

    #[test]
    fn test_failed_condition_wins() -> Result<(), serde_json::Error> {
        let job = job(failed_condition(), json!({}))?;
        assert_eq!(job_status(&job), JobStatus::Failed);
        let row = JobAdapter::project(&job);
        assert_eq!(
            row.map(|r| r.updated_at.to_rfc3339()),
            Some("2024-03-01T00:10:00+00:00".to_string())
        );
        Ok(())
    }

    #[test]
    fn test_running_job_has_no_annotation_update() -> Result<(), serde_json::Error> {
        let job = job(json!([]), json!({}))?;
        assert_eq!(job_status(&job), JobStatus::Running);
        assert_eq!(JobAdapter::annotation_update(&job), None);
        Ok(())
    }

    #[test]
    fn test_finished_job_records_revision_once() -> Result<(), Box<dyn std::error::Error>> {
        let first = job(failed_condition(), json!({}))?;
        let patch = JobAdapter::annotation_update(&first).ok_or("expected a patch")?;
        assert_eq!(patch.key, REVISIONS_ANNOTATION);

        let patched = job(failed_condition(), json!({ "revisions": patch.value }))?;
        assert_eq!(JobAdapter::annotation_update(&patched), None);

        let row = JobAdapter::project(&patched).ok_or("job skipped")?;
        let RowSpec::Job(spec) = row.spec else {
            return Err("not a job row".into());
        };
        assert_eq!(spec.revisions.len(), 1);
        assert_eq!(
            spec.revisions.first().map(|r| r.reasons.clone()),
            Some(vec!["BackoffLimitExceeded".to_string()])
        );
        Ok(())
    }

    #[test]
    fn test_cronjob_suspend_is_paused() -> Result<(), serde_json::Error> {
        let cron: CronJob = serde_json::from_value(json!({
            "metadata": {"name": "nightly", "namespace": "ops"},
            "spec": {
                "schedule": "0 3 * * *",
                "suspend": true,
                "jobTemplate": {"spec": {"template": {"spec": {"containers": [{"name": "n"}]}}}}
            },
            "status": {"lastScheduleTime": "2024-03-02T03:00:00Z"}
        }))?;
        let row = CronJobAdapter::project(&cron);
        assert_eq!(row.as_ref().map(MirrorRow::status), Some("paused"));
        assert_eq!(
            row.map(|r| r.spec.columns().get("schedule").cloned()),
            Some(Some("0 3 * * *".to_string()))
        );
        Ok(())
    }
}
