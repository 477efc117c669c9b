//! Property-based tests for the orchestration invariants.
//!
//! - Formatting a valid unit answer is a pure function
//! - The fallback plan covers exactly the requested documents
//! - The executor returns one result per task, whatever fails
//! - A bundle never holds a file that was not requested
//! - The circuit breaker trips after consecutive failures
//!
//! ## Configuration
//!
//! - `PROPTEST_CASES`: Number of test cases per property (default: 64)
//!
//! ```bash
//! PROPTEST_CASES=256 cargo test --test property_based_tests
//! ```

mod common;

use proptest::prelude::*;
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use ideaforge::error::LlmError;
use ideaforge::llm::{ApiRequest, CircuitBreaker, LlmBackend, ResilientClient};
use ideaforge::templates::TemplateCatalog;
use ideaforge::types::{
    DevelopmentPlan, DocumentType, ExecutionMode, Task, TechStack, UnitName,
};
use ideaforge::units::spec_for;
use ideaforge::{Executor, ExecutorOptions, Planner};
use ideaforge_engine::test_support::answer;
use ideaforge_engine::{bundle_from_response, expected_documents, fallback_plan};
use ideaforge_llm::test_support::ScriptedBackend;

use common::{fast_options, scripted_client};

/// Default number of test cases per property.
const DEFAULT_PROPTEST_CASES: u32 = 64;

fn proptest_config() -> ProptestConfig {
    let cases = env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PROPTEST_CASES);
    ProptestConfig {
        cases,
        ..ProptestConfig::default()
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn all_documents() -> Vec<DocumentType> {
    DocumentType::all().collect()
}

fn all_units() -> Vec<UnitName> {
    UnitName::all().collect()
}

fn text() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 ,.'|*#-]{0,40}"
}

fn brief_json() -> impl Strategy<Value = Value> {
    (
        text(),
        text(),
        text(),
        text(),
        proptest::option::of(text()),
        prop::collection::vec((text(), text()), 0..5),
        prop::collection::vec(text(), 0..4),
    )
        .prop_map(|(title, summary, problem, solution, audience, features, metrics)| {
            let features: Vec<Value> = features
                .into_iter()
                .map(|(name, description)| json!({"name": name, "description": description}))
                .collect();
            let mut value = json!({
                "title": title,
                "summary": summary,
                "problemStatement": problem,
                "solution": solution,
                "coreFeatures": features,
                "successMetrics": metrics,
            });
            if let Some(audience) = audience {
                value["targetAudience"] = Value::String(audience);
            }
            value
        })
}

fn schema_json() -> impl Strategy<Value = Value> {
    (
        prop::collection::vec(
            (text(), prop::collection::vec((text(), text(), any::<bool>()), 0..5)),
            0..4,
        ),
        prop::collection::vec((text(), text(), text()), 0..3),
    )
        .prop_map(|(entities, relationships)| {
            let entities: Vec<Value> = entities
                .into_iter()
                .map(|(name, fields)| {
                    let fields: Vec<Value> = fields
                        .into_iter()
                        .map(|(f, t, r)| json!({"name": f, "type": t, "required": r}))
                        .collect();
                    json!({"name": name, "fields": fields})
                })
                .collect();
            let relationships: Vec<Value> = relationships
                .into_iter()
                .map(|(from, to, kind)| json!({"from": from, "to": to, "type": kind}))
                .collect();
            json!({"entities": entities, "relationships": relationships})
        })
}

fn roadmap_json() -> impl Strategy<Value = Value> {
    prop::collection::vec((text(), text(), prop::collection::vec(text(), 0..4), proptest::option::of(text())), 0..5)
        .prop_map(|phases| {
            let phases: Vec<Value> = phases
                .into_iter()
                .map(|(name, duration, deliverables, milestone)| {
                    let mut phase = json!({"name": name, "duration": duration, "deliverables": deliverables});
                    if let Some(milestone) = milestone {
                        phase["milestone"] = Value::String(milestone);
                    }
                    phase
                })
                .collect();
            json!({"phases": phases})
        })
}

fn requested_documents() -> impl Strategy<Value = Vec<DocumentType>> {
    prop::sample::subsequence(all_documents(), 1..=8).prop_shuffle()
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn prop_brief_formatting_is_pure(value in brief_json()) {
        let spec = spec_for(UnitName::ProjectBrief);
        let first = spec.format(&value).unwrap();
        let second = spec.format(&value).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert!(first.starts_with("# Project Brief: "));
    }

    #[test]
    fn prop_schema_formatting_is_pure(value in schema_json()) {
        let spec = spec_for(UnitName::Schema);
        prop_assert_eq!(spec.format(&value).unwrap(), spec.format(&value.clone()).unwrap());
    }

    #[test]
    fn prop_roadmap_formatting_is_pure(value in roadmap_json()) {
        let spec = spec_for(UnitName::Roadmap);
        let first = spec.format(&value).unwrap();
        prop_assert_eq!(first, spec.format(&value).unwrap());
    }

    #[test]
    fn prop_fallback_plan_covers_requested(requested in requested_documents()) {
        let tasks = fallback_plan(&requested);
        let covered: BTreeSet<DocumentType> = tasks.iter().map(|t| t.unit.document()).collect();
        let wanted: BTreeSet<DocumentType> = requested.iter().copied().collect();
        prop_assert_eq!(covered, wanted);
        prop_assert_eq!(tasks.len(), requested.len());
        prop_assert!(tasks.iter().all(|t| !t.goal.is_empty() && !t.focus.is_empty()));
    }

    #[test]
    fn prop_failed_planning_still_plans(requested in requested_documents()) {
        let backend = ScriptedBackend::new("down")
            .always_err(LlmError::ProviderOutage("HTTP 500".into()));
        let (_backend, client) = scripted_client(backend);
        let planner = Planner::new(client, Arc::new(TemplateCatalog::builtin()));

        let planned = runtime().block_on(planner.plan(
            "A simple todo app",
            &TechStack::new("React", "Convex"),
            &requested,
        ));

        prop_assert!(planned.source.is_fallback());
        prop_assert_eq!(planned.tasks, fallback_plan(&requested));
    }

    #[test]
    fn prop_executor_returns_one_result_per_task(
        spec in prop::collection::vec((prop::sample::select(all_units()), any::<bool>()), 0..10),
        batch_size in 1usize..5,
        sequential in any::<bool>(),
    ) {
        let failing: BTreeSet<UnitName> = spec.iter().filter(|(_, fail)| *fail).map(|(u, _)| *u).collect();
        let backend = ScriptedBackend::new("scripted").with_responder(move |inv| {
            match inv.label.parse::<UnitName>() {
                Ok(unit) if failing.contains(&unit) => Err(LlmError::Transport("reset".into())),
                _ => answer(inv),
            }
        });
        let (_backend, client) = scripted_client(backend);
        let mode = if sequential { ExecutionMode::Sequential } else { ExecutionMode::Parallel };
        let executor = Executor::new(client, Arc::new(TemplateCatalog::builtin()))
            .with_options(ExecutorOptions { mode, batch_size, inter_task_delay: Duration::ZERO });
        let tasks: Vec<Task> = spec.iter().map(|(unit, _)| Task::new(*unit, "goal", "focus")).collect();
        let plan = DevelopmentPlan::new("A simple todo app", TechStack::new("React", "Convex"));

        let report = runtime().block_on(executor.run(&tasks, &plan, mode));

        prop_assert_eq!(report.results.len(), tasks.len());
        for (task, result) in tasks.iter().zip(&report.results) {
            prop_assert_eq!(task.unit, result.unit());
            prop_assert_eq!(result.success(), result.output().is_some());
            prop_assert_eq!(result.success(), result.error().is_none());
        }
    }

    #[test]
    fn prop_bundle_is_subset_of_requested(
        requested in requested_documents(),
        drafted in prop::sample::subsequence(all_documents(), 0..=8),
        answered in prop::sample::subsequence(all_documents(), 0..=8),
        junk in prop::collection::vec("[A-Za-z_]{1,12}\\.md", 0..4),
    ) {
        let mut plan = DevelopmentPlan::new("A simple todo app", TechStack::new("React", "Convex"));
        for doc in &drafted {
            plan.record(*doc, format!("# {}", doc.title())).unwrap();
        }
        let mut files = Map::new();
        for doc in &answered {
            files.insert(doc.filename().to_string(), Value::String("# Assembled".into()));
        }
        for name in junk {
            files.insert(name, Value::String("# Junk".into()));
        }
        let expected = expected_documents(&plan, &requested);

        let bundle = bundle_from_response(&Value::Object(files), &plan, &expected).unwrap();

        let allowed: BTreeSet<&str> = requested.iter().map(|d| d.filename()).collect();
        for name in bundle.filenames() {
            prop_assert!(allowed.contains(name), "unexpected file {}", name);
        }
        // Every drafted, requested document survives.
        for doc in &expected {
            prop_assert!(bundle.contains(doc.filename()));
        }
    }
}

#[tokio::test]
async fn test_breaker_trips_after_five_failures() {
    let backend = Arc::new(
        ScriptedBackend::new("down").always_err(LlmError::ProviderOutage("HTTP 500".into())),
    );
    let primary: Arc<dyn LlmBackend> = backend.clone();
    let breaker = Arc::new(CircuitBreaker::new(5, Duration::from_millis(200)));
    let client = ResilientClient::new(primary, Arc::clone(&breaker)).with_options(fast_options());

    for _ in 0..5 {
        let err = client.execute(ApiRequest::new("probe", "hi")).await.unwrap_err();
        assert!(matches!(err, LlmError::ProviderOutage(_)), "{err:?}");
    }
    assert_eq!(backend.calls(), 5);

    let err = client.execute(ApiRequest::new("probe", "hi")).await.unwrap_err();
    match err {
        LlmError::ServiceUnavailable { retry_after } => {
            assert!(retry_after <= Duration::from_millis(200));
        }
        other => panic!("Expected ServiceUnavailable, got {:?}", other),
    }
    assert_eq!(backend.calls(), 5, "an open circuit must not reach the provider");

    tokio::time::sleep(Duration::from_millis(250)).await;
    let err = client.execute(ApiRequest::new("probe", "hi")).await.unwrap_err();
    assert!(matches!(err, LlmError::ProviderOutage(_)));
    assert_eq!(backend.calls(), 6, "the cooldown lets one probe through");
}
