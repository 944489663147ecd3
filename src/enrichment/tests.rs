use super::*;
use crate::config::DetectConfig;
use crate::error::{DetectError, EnrichmentError};
use crate::events::{DetectEvent, EventBus};
use crate::results::{
    DetectionItem, RecordId, ResultRecord, ResultStore, SharedResultStore, Summary, UsesSource,
};
use crate::service::fake::{batch, use_case, ScriptedService};
use std::sync::Arc;

fn record(classes: &[&str]) -> ResultRecord {
    ResultRecord {
        id: RecordId::new(),
        original_handle: "staged://test/image.jpg".to_string(),
        processed_handle: "http://localhost:5001/static/detected.jpg".to_string(),
        description: "Starfield".to_string(),
        detailed_analysis: "No detailed analysis available".to_string(),
        detections: classes
            .iter()
            .map(|class| DetectionItem::new(*class, 0.8))
            .collect(),
        summary: Summary {
            total_objects: classes.len() as u32,
            unique_classes: classes.len() as u32,
        },
        timestamp: "2026-10-16 12:00:00".to_string(),
    }
}

async fn create_test_scheduler(
    service: Arc<ScriptedService>,
    records: Vec<ResultRecord>,
) -> (EnrichmentScheduler, SharedResultStore, Arc<EventBus>) {
    let store = ResultStore::shared();
    {
        let mut guard = store.write().await;
        for record in records.into_iter().rev() {
            guard.prepend(record);
        }
    }
    let event_bus = Arc::new(EventBus::new(64));
    let scheduler = EnrichmentScheduler::new(
        service,
        Arc::clone(&store),
        Arc::clone(&event_bus),
        DetectConfig::default().enrichment,
    );
    (scheduler, store, event_bus)
}

async fn wait_until_loading(scheduler: &EnrichmentScheduler, key: EnrichmentKey) {
    while !scheduler.is_loading(&key) {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_enrich_one_updates_only_target_detection() {
    let service = Arc::new(ScriptedService::new());
    service.push_single("OxygenTank", Ok(use_case("pressurized storage", "ai")));
    let (scheduler, store, _bus) =
        create_test_scheduler(service, vec![record(&["OxygenTank", "FireAlarm"])]).await;

    let outcome = scheduler.enrich_one(0, 0).await.unwrap();
    assert_eq!(outcome, EnrichmentOutcome::Applied(vec![0]));

    let store = store.read().await;
    let record = store.get(0).unwrap();
    assert_eq!(record.detections[0].uses.as_deref(), Some("pressurized storage"));
    assert_eq!(record.detections[0].uses_source, Some(UsesSource::Ai));
    assert!(record.detections[1].uses.is_none());
    assert!(record.detections[1].uses_source.is_none());
    assert!(scheduler.loading_snapshot().is_empty());
}

#[tokio::test]
async fn test_enrich_one_out_of_range_is_noop() {
    let service = Arc::new(ScriptedService::new());
    let (scheduler, _store, _bus) =
        create_test_scheduler(service, vec![record(&["OxygenTank"])]).await;

    assert_eq!(
        scheduler.enrich_one(0, 3).await.unwrap(),
        EnrichmentOutcome::Skipped
    );
    assert_eq!(
        scheduler.enrich_one(4, 0).await.unwrap(),
        EnrichmentOutcome::Skipped
    );
    assert!(scheduler.loading_snapshot().is_empty());
}

#[tokio::test]
async fn test_enrich_one_failure_keeps_previous_uses() {
    let service = Arc::new(ScriptedService::new());
    service.push_single("OxygenTank", Ok(use_case("pressurized storage", "ai")));
    service.push_single("OxygenTank", Err("upstream timeout".to_string()));
    let (scheduler, store, event_bus) =
        create_test_scheduler(service, vec![record(&["OxygenTank"])]).await;
    let mut receiver = event_bus.subscribe();

    scheduler.enrich_one(0, 0).await.unwrap();
    match scheduler.enrich_one(0, 0).await {
        Err(DetectError::Enrichment(EnrichmentError::Failed { object, .. })) => {
            assert_eq!(object, "OxygenTank")
        }
        other => panic!("Expected Failed, got {:?}", other),
    }

    let detection = store.read().await.get(0).unwrap().detections[0].clone();
    assert_eq!(detection.uses.as_deref(), Some("pressurized storage"));
    assert!(scheduler.loading_snapshot().is_empty());

    let mut notices = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        if let DetectEvent::EnrichmentFailed { message, .. } = event {
            notices.push(message);
        }
    }
    assert_eq!(notices, vec!["Failed to fetch use cases. Please try again."]);
}

#[tokio::test]
async fn test_enrich_all_merges_by_class_label() {
    let service = Arc::new(ScriptedService::new());
    service.push_batch(Ok(batch(
        &[("OxygenTank", "pressurized storage"), ("FireAlarm", "alerts crew")],
        "fallback",
    )));
    let (scheduler, store, _bus) = create_test_scheduler(
        service.clone(),
        vec![record(&["OxygenTank", "FireAlarm", "OxygenTank", "SafetySwitchPanel"])],
    )
    .await;

    let outcome = scheduler.enrich_all(0).await.unwrap();
    assert_eq!(outcome, EnrichmentOutcome::Applied(vec![0, 1, 2]));

    // Distinct labels, first-seen order
    assert_eq!(
        service.batch_requests(),
        vec![vec![
            "OxygenTank".to_string(),
            "FireAlarm".to_string(),
            "SafetySwitchPanel".to_string()
        ]]
    );

    let store = store.read().await;
    let detections = &store.get(0).unwrap().detections;
    assert_eq!(detections[0].uses.as_deref(), Some("pressurized storage"));
    assert_eq!(detections[2].uses.as_deref(), Some("pressurized storage"));
    assert_eq!(detections[1].uses.as_deref(), Some("alerts crew"));
    assert_eq!(detections[0].uses_source, Some(UsesSource::ModelDefault));
    // Absent from the response: untouched
    assert!(detections[3].uses.is_none());
    assert!(scheduler.loading_snapshot().is_empty());
}

#[tokio::test]
async fn test_enrich_all_keeps_existing_uses_for_absent_class() {
    let service = Arc::new(ScriptedService::new());
    service.push_single("FireAlarm", Ok(use_case("alerts crew", "ai")));
    service.push_batch(Ok(batch(&[("OxygenTank", "pressurized storage")], "gemini")));
    let (scheduler, store, _bus) =
        create_test_scheduler(service, vec![record(&["OxygenTank", "FireAlarm"])]).await;

    scheduler.enrich_one(0, 1).await.unwrap();
    scheduler.enrich_all(0).await.unwrap();

    let store = store.read().await;
    let detections = &store.get(0).unwrap().detections;
    assert_eq!(detections[0].uses.as_deref(), Some("pressurized storage"));
    assert_eq!(detections[1].uses.as_deref(), Some("alerts crew"));
}

#[tokio::test]
async fn test_blank_batch_text_keeps_earlier_use_case() {
    let service = Arc::new(ScriptedService::new());
    service.push_single("OxygenTank", Ok(use_case("pressurized storage", "ai")));
    service.push_batch(Ok(batch(
        &[("OxygenTank", ""), ("FireAlarm", "alerts crew")],
        "gemini",
    )));
    let (scheduler, store, _bus) =
        create_test_scheduler(service, vec![record(&["OxygenTank", "FireAlarm"])]).await;

    scheduler.enrich_one(0, 0).await.unwrap();
    let outcome = scheduler.enrich_all(0).await.unwrap();
    assert_eq!(outcome, EnrichmentOutcome::Applied(vec![1]));

    let store = store.read().await;
    let detections = &store.get(0).unwrap().detections;
    assert_eq!(detections[0].uses.as_deref(), Some("pressurized storage"));
    assert_eq!(detections[0].uses_source, Some(UsesSource::Ai));
    assert_eq!(detections[1].uses.as_deref(), Some("alerts crew"));
}

#[tokio::test]
async fn test_blank_single_text_leaves_detection_unenriched() {
    let service = Arc::new(ScriptedService::new());
    service.push_single("OxygenTank", Ok(use_case("  ", "ai")));
    let (scheduler, store, _bus) =
        create_test_scheduler(service, vec![record(&["OxygenTank"])]).await;

    let outcome = scheduler.enrich_one(0, 0).await.unwrap();
    assert_eq!(outcome, EnrichmentOutcome::Applied(Vec::new()));

    let store = store.read().await;
    assert!(store.get(0).unwrap().detections[0].uses.is_none());
    assert!(scheduler.loading_snapshot().is_empty());
}

#[tokio::test]
async fn test_enrich_all_failure_modifies_nothing() {
    let service = Arc::new(ScriptedService::new());
    service.push_batch(Err("service unavailable".to_string()));
    let (scheduler, store, _bus) =
        create_test_scheduler(service, vec![record(&["OxygenTank", "FireAlarm"])]).await;

    assert!(scheduler.enrich_all(0).await.is_err());

    let store = store.read().await;
    assert!(store.get(0).unwrap().detections.iter().all(|d| d.uses.is_none()));
    assert!(scheduler.loading_snapshot().is_empty());
}

#[tokio::test]
async fn test_enrich_all_without_detections_is_noop() {
    let service = Arc::new(ScriptedService::new());
    let (scheduler, _store, _bus) = create_test_scheduler(service.clone(), vec![record(&[])]).await;

    assert_eq!(
        scheduler.enrich_all(0).await.unwrap(),
        EnrichmentOutcome::Skipped
    );
    assert!(service.batch_requests().is_empty());
}

#[tokio::test]
async fn test_concurrent_lookups_are_independent() {
    let service = Arc::new(ScriptedService::new());
    service.push_single("OxygenTank", Ok(use_case("pressurized storage", "ai")));
    service.push_single("FireAlarm", Err("upstream timeout".to_string()));
    let slow = service.gate("single:OxygenTank");
    let failing = service.gate("single:FireAlarm");
    let (scheduler, store, _bus) =
        create_test_scheduler(service, vec![record(&["OxygenTank", "FireAlarm"])]).await;
    let id = store.read().await.get(0).unwrap().id;

    let first = scheduler.spawn_enrich_one(0, 0);
    let second = scheduler.spawn_enrich_one(0, 1);
    wait_until_loading(&scheduler, EnrichmentKey::new(id, 0)).await;
    wait_until_loading(&scheduler, EnrichmentKey::new(id, 1)).await;

    // The failing lookup finishes first; the slow one stays loading
    failing.notify_one();
    assert!(second.await.unwrap().is_err());
    assert!(!scheduler.is_loading(&EnrichmentKey::new(id, 1)));
    assert!(scheduler.is_loading(&EnrichmentKey::new(id, 0)));

    slow.notify_one();
    assert_eq!(
        first.await.unwrap().unwrap(),
        EnrichmentOutcome::Applied(vec![0])
    );

    let store = store.read().await;
    let detections = &store.get(0).unwrap().detections;
    assert_eq!(detections[0].uses.as_deref(), Some("pressurized storage"));
    assert!(detections[1].uses.is_none());
    assert!(scheduler.loading_snapshot().is_empty());
}

#[tokio::test]
async fn test_overlapping_requests_for_same_key_are_counted() {
    let service = Arc::new(ScriptedService::new());
    service.push_batch(Ok(batch(&[("OxygenTank", "from batch")], "ai")));
    service.push_single("OxygenTank", Ok(use_case("from single", "ai")));
    let batch_gate = service.gate("batch");
    let (scheduler, store, _bus) =
        create_test_scheduler(service, vec![record(&["OxygenTank"])]).await;
    let key = EnrichmentKey::new(store.read().await.get(0).unwrap().id, 0);

    let all = scheduler.spawn_enrich_all(0);
    wait_until_loading(&scheduler, key).await;

    // The single lookup completes while the batch is still out
    scheduler.enrich_one(0, 0).await.unwrap();
    assert!(scheduler.is_loading(&key));

    batch_gate.notify_one();
    all.await.unwrap().unwrap();
    assert!(!scheduler.is_loading(&key));
}

#[tokio::test]
async fn test_result_for_removed_record_is_discarded() {
    let service = Arc::new(ScriptedService::new());
    service.push_single("OxygenTank", Ok(use_case("pressurized storage", "ai")));
    let gate = service.gate("single:OxygenTank");
    let (scheduler, store, event_bus) = create_test_scheduler(
        service,
        vec![record(&["OxygenTank"]), record(&["OxygenTank"])],
    )
    .await;
    let mut receiver = event_bus.subscribe();
    let target = store.read().await.get(0).unwrap().id;
    let key = EnrichmentKey::new(target, 0);

    let pending = scheduler.spawn_enrich_one(0, 0);
    wait_until_loading(&scheduler, key).await;

    store.write().await.remove_at(0);
    gate.notify_one();

    assert_eq!(pending.await.unwrap().unwrap(), EnrichmentOutcome::Stale);
    assert!(!scheduler.is_loading(&key));

    // The record that shifted into index 0 was not touched
    let store = store.read().await;
    assert_eq!(store.len(), 1);
    assert!(store.get(0).unwrap().detections[0].uses.is_none());

    let mut stale = false;
    while let Ok(event) = receiver.try_recv() {
        stale |= matches!(event, DetectEvent::StaleResultDiscarded { .. });
    }
    assert!(stale);
}

#[test]
fn test_loading_guard_clears_keys_on_drop() {
    let state = Arc::new(LoadingState::new());
    let record = RecordId::new();
    let a = EnrichmentKey::new(record, 0);
    let b = EnrichmentKey::new(record, 1);

    let first = state.begin(vec![a, b]);
    let second = state.begin(vec![a]);
    assert!(state.is_loading(&a));
    assert!(state.is_record_loading(record));
    assert_eq!(first.keys().len(), 2);

    drop(first);
    assert!(state.is_loading(&a));
    assert!(!state.is_loading(&b));

    drop(second);
    assert!(state.is_empty());
    assert!(!state.is_record_loading(record));
}
