use super::*;
use crate::camera::MockCameraDevice;
use crate::capture::CaptureState;
use crate::config::DetectConfig;
use crate::enrichment::EnrichmentOutcome;
use crate::error::{CaptureError, DetectError};
use crate::service::fake::{batch, ScriptedService};
use crate::service::{DetectResponse, WireDetection, WireSummary};
use bytes::Bytes;
use std::sync::Arc;

fn create_test_session() -> (DetectionSession, Arc<ScriptedService>, Arc<MockCameraDevice>) {
    let service = Arc::new(ScriptedService::new());
    let device = Arc::new(MockCameraDevice::new((32, 24), 80));
    let session = DetectionSession::new(DetectConfig::default(), device.clone(), service.clone());
    (session, service, device)
}

fn response(description: &str, classes: &[&str]) -> DetectResponse {
    DetectResponse {
        image_url: Some(format!("/static/{}.jpg", description)),
        detections: Some(
            classes
                .iter()
                .map(|class| WireDetection {
                    class: class.to_string(),
                    confidence: 0.8,
                    class_id: None,
                    bbox: None,
                    estimated_depth: None,
                    estimated_width_cm: None,
                    estimated_height_cm: None,
                    size_estimation_method: None,
                })
                .collect(),
        ),
        summary: Some(WireSummary {
            description: Some(description.to_string()),
            detailed_analysis: Some("analysis".to_string()),
            total_objects: Some(classes.len() as u32),
            unique_classes: Some(classes.len() as u32),
        }),
        timestamp: None,
        api_status: None,
    }
}

async fn stage_file(session: &DetectionSession, name: &str) {
    let mut controller = session.controller().lock().await;
    controller.open();
    controller
        .pick_file(name, Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9]))
        .unwrap();
}

#[tokio::test]
async fn test_submissions_are_stored_newest_first() {
    let (session, service, _device) = create_test_session();
    service.push_detect(Ok(response("first", &["OxygenTank"])));
    service.push_detect(Ok(response("second", &["FireAlarm"])));

    stage_file(&session, "a.jpg").await;
    session.submit().await.unwrap();
    stage_file(&session, "b.jpg").await;
    session.submit().await.unwrap();

    let results = session.results().await;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].description, "second");
    assert_eq!(results[1].description, "first");
    assert_eq!(
        session.controller().lock().await.state(),
        CaptureState::Idle
    );
}

#[tokio::test]
async fn test_submit_without_staged_image_fails() {
    let (session, _service, _device) = create_test_session();
    session.controller().lock().await.open();

    match session.submit().await {
        Err(DetectError::Capture(CaptureError::InvalidState { .. })) => {}
        other => panic!("Expected InvalidState, got {:?}", other),
    }
    assert!(session.results().await.is_empty());
}

#[tokio::test]
async fn test_failed_submission_keeps_image_and_stores_nothing() {
    let (session, service, _device) = create_test_session();
    service.push_detect(Err("Invalid image format".to_string()));
    stage_file(&session, "a.jpg").await;

    assert!(session.submit().await.is_err());

    let controller = session.controller().lock().await;
    assert_eq!(controller.state(), CaptureState::FilePicked);
    assert!(controller.staged_image().is_some());
    assert_eq!(
        controller.last_notice(),
        Some("Error processing image: Invalid image format")
    );
    drop(controller);
    assert!(session.results().await.is_empty());
    assert!(!session.coordinator().is_processing());
}

#[tokio::test]
async fn test_close_during_submission_still_stores_record() {
    let (session, service, _device) = create_test_session();
    let session = Arc::new(session);
    service.push_detect(Ok(response("late", &["OxygenTank"])));
    let gate = service.gate("detect");
    stage_file(&session, "a.jpg").await;

    let pending = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.submit().await })
    };
    while !session.coordinator().is_processing() {
        tokio::task::yield_now().await;
    }

    session.controller().lock().await.close();
    gate.notify_one();
    pending.await.unwrap().unwrap();

    let controller = session.controller().lock().await;
    assert_eq!(controller.state(), CaptureState::Closed);
    assert!(controller.staged_image().is_none());
    drop(controller);

    let results = session.results().await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].description, "late");
}

#[tokio::test]
async fn test_camera_capture_then_enrich_all() {
    let (session, service, device) = create_test_session();
    service.push_detect(Ok(response("deck", &["OxygenTank", "FireAlarm"])));
    service.push_batch(Ok(batch(
        &[("OxygenTank", "pressurized storage"), ("FireAlarm", "alerts crew")],
        "gemini",
    )));

    {
        let mut controller = session.controller().lock().await;
        controller.open();
        controller.start_camera().await.unwrap();
        controller.capture().await.unwrap();
    }
    assert_eq!(device.open_handles(), 0);

    let record = session.submit().await.unwrap();
    assert_eq!(service.uploads()[0].file_name, "captured-image.jpg");

    let outcome = session.scheduler().enrich_all(0).await.unwrap();
    assert_eq!(outcome, EnrichmentOutcome::Applied(vec![0, 1]));

    let results = session.results().await;
    assert_eq!(results[0].id, record.id);
    assert!(results[0].detections.iter().all(|d| d.is_enriched()));
}

#[tokio::test]
async fn test_remove_result_out_of_range_is_ignored() {
    let (session, service, _device) = create_test_session();
    service.push_detect(Ok(response("only", &[])));
    stage_file(&session, "a.jpg").await;
    session.submit().await.unwrap();

    assert!(session.remove_result(3).await.is_none());
    assert_eq!(session.results().await.len(), 1);
    assert!(session.remove_result(0).await.is_some());
    assert!(session.results().await.is_empty());
}

#[test]
fn test_from_config_rejects_zero_event_bus_capacity() {
    let mut config = DetectConfig::default();
    config.system.event_bus_capacity = 0;

    match DetectionSession::from_config(config, true) {
        Err(DetectError::Config(_)) => {}
        Err(other) => panic!("Expected Config error, got {:?}", other),
        Ok(_) => panic!("Expected Config error, got a session"),
    }
}

#[tokio::test]
async fn test_session_with_zero_capacity_bus_still_publishes() {
    let mut config = DetectConfig::default();
    config.system.event_bus_capacity = 0;
    config.system.log_events = true;
    let service = Arc::new(ScriptedService::new());
    let device = Arc::new(MockCameraDevice::new((32, 24), 80));
    let session = DetectionSession::new(config, device, service);

    let mut events = session.event_bus().subscribe();
    stage_file(&session, "a.jpg").await;

    let event = events.recv().await.unwrap();
    assert_eq!(event.event_type(), "image_staged");
}
