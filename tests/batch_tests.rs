//! Batch runner tests: ordering, isolation, the worker bound, and systemic
//! failure handling.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{Fault, FaultyStore};
use fnstore::executor::local::{CodeUnit, ModuleTable};
use fnstore::store::JobFilter;
use fnstore::{
    CollectionStatus, FailureKind, FunctionError, FunctionService, FunctionSpec, Job, JobId,
    JobStatus, LOCAL_CODE_TYPE,
};
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn three_inputs_two_workers_end_to_end() {
    let (service, _) = common::service();
    let function = common::register_add(&service).await;

    let run = service
        .batch(
            function.id,
            "sums",
            vec![
                json!({"x": 1, "y": 2}),
                json!({"x": 3, "y": 4}),
                json!({"x": 5, "y": 6}),
            ],
            Some(2),
        )
        .await
        .unwrap();

    let ids = run.handle.job_ids();
    assert_eq!(ids.len(), 3);
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(run.collection.job_ids, ids);
    assert_eq!(
        run.collection.description.as_deref(),
        Some(format!("Batch execution of function {}", function.id).as_str())
    );

    let report = run.handle.join().await.unwrap();
    let outputs: Vec<_> = report.jobs.iter().map(|j| j.output.clone()).collect();
    assert_eq!(
        outputs,
        vec![
            Some(json!({"result": 3})),
            Some(json!({"result": 7})),
            Some(json!({"result": 11})),
        ]
    );

    let status = service.collection_status(run.collection.id).await.unwrap();
    assert_eq!(status.status(), CollectionStatus::Completed);
}

#[tokio::test]
async fn created_jobs_follow_input_order_and_validation_applies() {
    let (service, _) = common::service();
    let function = common::register_add(&service).await;

    let handle = service
        .map(
            function.id,
            vec![
                json!({"x": 1, "y": 1}),
                json!({"x": "bad", "y": 1}),
                json!({"x": 2, "y": 2}),
            ],
            None,
        )
        .await
        .unwrap();

    let created: Vec<(serde_json::Value, JobStatus)> = handle
        .jobs()
        .iter()
        .map(|j| (j.input.clone(), j.status))
        .collect();
    assert_eq!(created[0], (json!({"x": 1, "y": 1}), JobStatus::Pending));
    assert_eq!(created[1], (json!({"x": "bad", "y": 1}), JobStatus::Failed));
    assert_eq!(created[2], (json!({"x": 2, "y": 2}), JobStatus::Pending));

    let report = handle.join().await.unwrap();
    assert_eq!(report.completed(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(
        report.jobs[1].failure.as_ref().map(|f| f.kind),
        Some(FailureKind::Validation)
    );
}

#[tokio::test]
async fn one_failure_does_not_touch_siblings() {
    let (service, _) = common::service();
    let function = service
        .register_function(FunctionSpec::new("add", LOCAL_CODE_TYPE, "math.rs:add"))
        .await
        .unwrap();

    let handle = service
        .map(
            function.id,
            vec![json!({"x": 1, "y": 1}), json!({"x": 1}), json!({"x": 4, "y": 4})],
            Some(3),
        )
        .await
        .unwrap();
    let report = handle.join().await.unwrap();

    let statuses: Vec<JobStatus> = report.jobs.iter().map(|j| j.status).collect();
    assert_eq!(
        statuses,
        vec![JobStatus::Completed, JobStatus::Failed, JobStatus::Completed]
    );
    assert_eq!(
        report.jobs[1].failure.as_ref().map(|f| f.kind),
        Some(FailureKind::Execution)
    );
}

#[tokio::test]
async fn worker_bound_limits_concurrency() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let modules = Arc::new(ModuleTable::new());
    {
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        modules.install(CodeUnit::new("slow.rs").with_symbol("work", move |_| {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(40));
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(json!(true))
        }));
    }
    let service = FunctionService::builder()
        .code_loader(modules)
        .build()
        .unwrap();
    let function = service
        .register_function(FunctionSpec::new("slow", LOCAL_CODE_TYPE, "slow.rs:work"))
        .await
        .unwrap();

    let handle = service
        .map(function.id, vec![json!({}); 8], Some(2))
        .await
        .unwrap();
    let report = handle.join().await.unwrap();

    assert_eq!(report.completed(), 8);
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert!(peak.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn configured_default_worker_bound_is_used() {
    let (service, _) = common::service();
    service.set_max_parallel_jobs(1).unwrap();
    let function = common::register_add(&service).await;

    let handle = service
        .map(function.id, vec![json!({"x": 1, "y": 1}); 3], None)
        .await
        .unwrap();
    assert_eq!(handle.join().await.unwrap().completed(), 3);
}

#[tokio::test]
async fn empty_batch_completes_immediately() {
    let (service, _) = common::service();
    let function = common::register_add(&service).await;

    let run = service
        .batch(function.id, "nothing", Vec::new(), None)
        .await
        .unwrap();
    assert!(run.handle.jobs().is_empty());
    assert!(run.handle.join().await.unwrap().jobs.is_empty());

    let status = service.collection_status(run.collection.id).await.unwrap();
    assert_eq!(status.status(), CollectionStatus::Completed);
}

#[tokio::test]
async fn zero_workers_rejected_synchronously() {
    let (service, _) = common::service();
    let function = common::register_add(&service).await;

    let err = service
        .map(function.id, vec![json!({"x": 1, "y": 1})], Some(0))
        .await
        .unwrap_err();
    assert!(matches!(err, FunctionError::InvalidInput(_)));
    assert!(service.list_jobs(&JobFilter::new()).await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_raw_input_rejects_whole_batch() {
    let (service, _) = common::service();
    let function = common::register_add(&service).await;

    let err = service
        .map_raw(function.id, &[r#"{"x": 1, "y": 2}"#, "{x: 1"], None)
        .await
        .unwrap_err();
    assert!(matches!(err, FunctionError::InvalidInput(_)));
    assert!(service.list_jobs(&JobFilter::new()).await.unwrap().is_empty());

    let handle = service
        .map_raw(function.id, &[r#"{"x": 1, "y": 2}"#], None)
        .await
        .unwrap();
    assert_eq!(handle.join().await.unwrap().completed(), 1);
}

#[tokio::test]
async fn dropped_handle_keeps_running() {
    let (service, _) = common::service();
    let function = common::register_add(&service).await;

    let handle = service
        .map(function.id, vec![json!({"x": 1, "y": 2})], None)
        .await
        .unwrap();
    let job_id = handle.job_ids()[0];
    drop(handle);

    let mut status = JobStatus::Pending;
    for _ in 0..100 {
        status = service.get_job(job_id).await.unwrap().status;
        if status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, JobStatus::Completed);
}

// ─── Systemic failure ───────────────────────────────────────────────────────

fn assert_systemic(job: &Job) {
    assert_eq!(job.status, JobStatus::Failed);
    let failure = job.failure.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::Systemic);
    assert!(failure.error.starts_with("Background task error: "));
}

#[tokio::test]
async fn store_failure_is_systemic_and_sweeps_stragglers() {
    // Jobs are numbered from 1; the second input's job is the victim.
    let store = FaultyStore::new(Fault::StartOnce(JobId::new(2)));
    let service = common::service_with_store(store);
    let function = common::register_add(&service).await;

    let handle = service
        .map(
            function.id,
            vec![
                json!({"x": 1, "y": 1}),
                json!({"x": 2, "y": 2}),
                json!({"x": 3, "y": 3}),
            ],
            Some(1),
        )
        .await
        .unwrap();
    let ids = handle.job_ids();
    assert_eq!(ids[1], JobId::new(2));

    let err = handle.join().await.unwrap_err();
    assert!(matches!(err, FunctionError::SystemicBatch { .. }));

    assert_systemic(&service.get_job(ids[1]).await.unwrap());

    // Every other job reached a terminal state on its own.
    for id in [ids[0], ids[2]] {
        assert_eq!(service.get_job(id).await.unwrap().status, JobStatus::Completed);
    }
}

#[tokio::test]
async fn failed_job_creation_fails_jobs_created_before_it() {
    let store = FaultyStore::new(Fault::SaveJob(3));
    let service = common::service_with_store(store);
    let function = common::register_add(&service).await;

    let err = service
        .map(
            function.id,
            vec![
                json!({"x": 1, "y": 1}),
                json!({"x": 2, "y": 2}),
                json!({"x": 3, "y": 3}),
            ],
            Some(2),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FunctionError::SystemicBatch { .. }));

    let jobs = service.list_jobs(&JobFilter::new()).await.unwrap();
    assert_eq!(jobs.len(), 2);
    for job in &jobs {
        assert_systemic(job);
    }
}

#[tokio::test]
async fn panicking_driver_still_fails_unfinished_jobs() {
    // The worker's read panics, then the driver's read while handling it.
    let store = FaultyStore::new(Fault::PanicOnRead(2));
    let service = common::service_with_store(store);
    let function = common::register_add(&service).await;

    let handle = service
        .map(function.id, vec![json!({"x": 1, "y": 1})], Some(1))
        .await
        .unwrap();
    let job_id = handle.job_ids()[0];

    let err = handle.join().await.unwrap_err();
    assert!(matches!(err, FunctionError::SystemicBatch { .. }));
    assert_systemic(&service.get_job(job_id).await.unwrap());
}
