//! Property-based tests using proptest.
//!
//! Properties cover the job state machine, the collection status reducer,
//! batch ordering for arbitrary input counts, and the output-schema
//! guarantee. Fuzz-style cases check that record deserialization never
//! panics on arbitrary input.

mod common;

use proptest::prelude::*;
use serde_json::{json, Value};

use fnstore::executor::local::{CodeUnit, ModuleTable};
use fnstore::{
    CollectionStatus, FunctionService, FunctionSpec, Job, JobStatus, LOCAL_CODE_TYPE,
};

// ─── Arbitrary Strategies ───────────────────────────────────────────────────

fn arb_job_status() -> impl Strategy<Value = JobStatus> {
    prop::sample::select(JobStatus::ALL.to_vec())
}

fn arb_output() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(|n| json!(n)),
        "[a-z]{0,8}".prop_map(|s| json!(s)),
        any::<bool>().prop_map(|b| json!(b)),
        Just(Value::Null),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

// ─── Property Tests: State Machine Invariants ───────────────────────────────

proptest! {
    /// Completed and Failed reject every transition.
    #[test]
    fn terminal_states_reject_all_transitions(
        from in prop::sample::select(vec![JobStatus::Completed, JobStatus::Failed]),
        to in arb_job_status(),
    ) {
        prop_assert!(!from.can_transition_to(to));
    }

    /// No status can transition to itself.
    #[test]
    fn no_self_transitions(status in arb_job_status()) {
        prop_assert!(!status.can_transition_to(status));
    }

    /// is_terminal() holds exactly when no transition is allowed.
    #[test]
    fn is_terminal_iff_no_valid_transitions(status in arb_job_status()) {
        let has_any = JobStatus::ALL.iter().any(|&t| status.can_transition_to(t));
        prop_assert_eq!(status.is_terminal(), !has_any);
    }

    /// Nothing ever transitions back to Pending.
    #[test]
    fn pending_is_never_a_target(from in arb_job_status()) {
        prop_assert!(!from.can_transition_to(JobStatus::Pending));
    }
}

// ─── Property Tests: Collection Reducer ─────────────────────────────────────

proptest! {
    /// FAILED exactly when at least one member failed.
    #[test]
    fn failed_iff_any_member_failed(
        statuses in proptest::collection::vec(arb_job_status(), 0..32),
    ) {
        let derived = CollectionStatus::derive(statuses.iter().copied());
        let any_failed = statuses.contains(&JobStatus::Failed);
        prop_assert_eq!(derived == CollectionStatus::Failed, any_failed);
    }

    /// COMPLETED exactly when every member completed.
    #[test]
    fn completed_iff_all_members_completed(
        statuses in proptest::collection::vec(arb_job_status(), 0..32),
    ) {
        let derived = CollectionStatus::derive(statuses.iter().copied());
        let all_completed = statuses.iter().all(|s| *s == JobStatus::Completed);
        prop_assert_eq!(derived == CollectionStatus::Completed, all_completed);
    }

    /// Members that are all pending derive RUNNING.
    #[test]
    fn all_pending_is_running(n in 1usize..32) {
        let derived = CollectionStatus::derive(std::iter::repeat_n(JobStatus::Pending, n));
        prop_assert_eq!(derived, CollectionStatus::Running);
    }

    /// Member order never changes the derived status.
    #[test]
    fn reducer_ignores_member_order(
        statuses in proptest::collection::vec(arb_job_status(), 0..16),
    ) {
        let mut reversed = statuses.clone();
        reversed.reverse();
        prop_assert_eq!(
            CollectionStatus::derive(statuses),
            CollectionStatus::derive(reversed)
        );
    }
}

// ─── Property Tests: Engine Behaviour ───────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Batch job ids follow input order for any batch size and worker bound.
    #[test]
    fn batch_ids_follow_input_order(len in 0usize..24, workers in 1usize..6) {
        let rt = runtime();
        let (ids, inputs, created) = rt.block_on(async {
            let (service, _) = common::service();
            let function = common::register_add(&service).await;
            let inputs: Vec<Value> = (0..len)
                .map(|i| json!({"x": i, "y": 0}))
                .collect();
            let handle = service
                .map(function.id, inputs.clone(), Some(workers))
                .await
                .unwrap();
            let created: Vec<Value> = handle.jobs().iter().map(|j| j.input.clone()).collect();
            let ids = handle.job_ids();
            let report = handle.join().await.unwrap();
            assert!(report.jobs.iter().all(Job::is_terminal));
            (ids, inputs, created)
        });

        prop_assert_eq!(ids.len(), len);
        prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(inputs, created);
    }

    /// A job is never COMPLETED with output that violates its output schema.
    #[test]
    fn completed_output_always_satisfies_schema(output in arb_output()) {
        let rt = runtime();
        let job = rt.block_on(async {
            let modules = std::sync::Arc::new(ModuleTable::new());
            modules.install(CodeUnit::new("echo.rs").with_symbol("value", |args| {
                Ok(args.get("value").cloned().unwrap_or(Value::Null))
            }));
            let service = FunctionService::builder().code_loader(modules).build().unwrap();
            let function = service
                .register_function(
                    FunctionSpec::new("value", LOCAL_CODE_TYPE, "echo.rs:value")
                        .with_output_schema(common::numeric_result_schema()),
                )
                .await
                .unwrap();
            service.run(function.id, json!({"value": output})).await.unwrap()
        });

        prop_assert!(job.is_terminal());
        if job.status == JobStatus::Completed {
            let result = job.output.as_ref().and_then(|o| o.get("result"));
            prop_assert!(result.is_some_and(Value::is_number));
        } else {
            prop_assert!(job.output.is_none());
        }
    }
}

// ─── Fuzz Deserialization ───────────────────────────────────────────────────

proptest! {
    /// Deserializing arbitrary strings as a JobStatus must not panic.
    #[test]
    fn fuzz_job_status_deserialization(s in "\\PC*") {
        let json_str = format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""));
        let _ = serde_json::from_str::<JobStatus>(&json_str);
    }

    /// Deserializing arbitrary bytes as a Job must not panic.
    #[test]
    fn fuzz_job_deserialization_from_bytes(
        bytes in proptest::collection::vec(any::<u8>(), 0..1024)
    ) {
        let _ = serde_json::from_slice::<Job>(&bytes);
    }

    /// Deserializing arbitrary strings as a FunctionSpec must not panic.
    #[test]
    fn fuzz_function_spec_deserialization(s in "\\PC{0,512}") {
        let _ = serde_json::from_str::<FunctionSpec>(&s);
    }
}
