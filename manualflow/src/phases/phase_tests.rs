//! Tests for the phase modules over mock collaborators.

use super::*;
use crate::cancellation::CancellationToken;
use crate::config::PipelineConfig;
use crate::core::{BoundingBox, TextBlock};
use crate::errors::ServiceError;
use crate::events::{CollectingEventSink, NoOpEventSink};
use crate::gateway::{CleanupRequest, Correction, SiteMeta};
use crate::testing::{
    MockCleanupService, MockOcrService, MockSiteRenderer, MockTranslationService, TestServices,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn context(services: &TestServices) -> PhaseContext {
    context_with(services, PipelineConfig::default())
}

fn context_with(services: &TestServices, config: PipelineConfig) -> PhaseContext {
    services.phase_context(
        config,
        Arc::new(NoOpEventSink),
        Arc::new(CancellationToken::new()),
    )
}

fn cleanup_request() -> CleanupRequest {
    CleanupRequest {
        json_path: "manuals/TR-808/translated.json".to_string(),
        product_name: "TR-808".to_string(),
        product_description: "Rhythm composer".to_string(),
        idempotency_key: "idem:abc".to_string(),
    }
}

#[tokio::test]
async fn test_ocr_tolerates_one_failed_page() {
    let services = TestServices::new(5).with_ocr(MockOcrService::new(5).failing_page(2));
    let output = OcrPhase::new(&context(&services)).run("manual.pdf").await;

    assert!(output.success);
    assert_eq!(output.page_count, 5);
    assert_eq!(output.failed_pages, vec![2]);
    let pages: Vec<usize> = output.blocks.iter().map(|b| b.page).collect();
    assert_eq!(pages, vec![0, 0, 1, 1, 3, 3, 4, 4]);
    assert_eq!(services.ocr.page_calls(2), 1, "permanent errors are not retried");
    assert_eq!(services.ocr.page_count_calls(), 1);
}

#[tokio::test]
async fn test_ocr_fails_when_every_page_fails() {
    let ocr = (0..3).fold(MockOcrService::new(3), MockOcrService::failing_page);
    let services = TestServices::new(3).with_ocr(ocr);
    let output = OcrPhase::new(&context(&services)).run("manual.pdf").await;

    assert!(!output.success);
    assert_eq!(output.error.as_deref(), Some(NO_TEXT_BLOCKS));
    assert!(output.blocks.is_empty());
    assert!(output.failed_pages.is_empty());
}

#[tokio::test]
async fn test_ocr_issues_exactly_one_task_per_page() {
    for pages in [0, 1, 7, 32] {
        let services = TestServices::new(pages);
        let output = OcrPhase::new(&context(&services)).run("manual.pdf").await;

        assert_eq!(services.ocr.pages_called(), pages);
        assert_eq!(services.ocr.total_page_calls(), pages);
        assert_eq!(output.success, pages > 0);
        assert!(output.blocks.iter().all(|b| b.page < pages.max(1)));
    }
}

#[tokio::test(start_paused = true)]
async fn test_blocks_follow_page_order_not_completion_order() {
    let ocr = MockOcrService::new(4)
        .with_blocks_per_page(1)
        .delayed_page(0, Duration::from_secs(3))
        .delayed_page(1, Duration::from_secs(2))
        .delayed_page(2, Duration::from_secs(1));
    let services = TestServices::new(4).with_ocr(ocr);
    let output = OcrPhase::new(&context(&services)).run("manual.pdf").await;

    let pages: Vec<usize> = output.blocks.iter().map(|b| b.page).collect();
    assert_eq!(pages, vec![0, 1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_flaky_page_recovers_under_retry() {
    let services = TestServices::new(3).with_ocr(MockOcrService::new(3).flaky_page(1, 2));
    let output = OcrPhase::new(&context(&services)).run("manual.pdf").await;

    assert!(output.success);
    assert!(output.failed_pages.is_empty());
    assert_eq!(services.ocr.page_calls(1), 3);
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_limit_bounds_in_flight_pages() {
    let ocr = (0..8).fold(MockOcrService::new(8), |ocr, page| {
        ocr.delayed_page(page, Duration::from_secs(1))
    });
    let services = TestServices::new(8).with_ocr(ocr);
    let config = PipelineConfig::default().with_max_concurrent_pages(2);
    let output = OcrPhase::new(&context_with(&services, config)).run("manual.pdf").await;

    assert!(output.success);
    assert_eq!(services.ocr.pages_called(), 8);
    assert!(services.ocr.max_in_flight() <= 2);
}

#[tokio::test]
async fn test_failed_pages_are_reported_as_events() {
    let services = TestServices::new(3).with_ocr(MockOcrService::new(3).failing_page(0));
    let events = Arc::new(CollectingEventSink::new());
    let ctx = services.phase_context(
        PipelineConfig::default(),
        events.clone(),
        Arc::new(CancellationToken::new()),
    );
    OcrPhase::new(&ctx).run("manual.pdf").await;

    let failures = events.events_of_type("ocr.page_failed");
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].1.as_ref().unwrap()["page"], 0);
}

#[tokio::test]
async fn test_translation_success_and_failure() {
    let blocks = vec![TextBlock::new("電源", 0, BoundingBox::default(), 0.9)];

    let services = TestServices::new(1);
    let output = TranslationPhase::new(&context(&services))
        .run(&blocks, "ja", "en")
        .await;
    assert!(output.success);
    assert_eq!(output.blocks[0].translated, "[en] 電源");

    let services = TestServices::new(1).with_translation(MockTranslationService::failing(
        ServiceError::permanent("unsupported language pair"),
    ));
    let output = TranslationPhase::new(&context(&services))
        .run(&blocks, "ja", "xx")
        .await;
    assert!(!output.success);
    assert_eq!(output.error.as_deref(), Some("unsupported language pair"));
    assert!(output.blocks.is_empty());
}

#[tokio::test]
async fn test_site_passes_idempotency_key() {
    let services = TestServices::new(1);
    let output = SitePhase::new(&context(&services))
        .run(SiteInput {
            document: "manual.pdf".to_string(),
            blocks: Vec::new(),
            output_dir: "manuals/TR-808".to_string(),
            meta: SiteMeta::default(),
            idempotency_key: "idem:site".to_string(),
        })
        .await;

    assert!(output.success);
    assert_eq!(output.html_path, "manuals/TR-808/index.html");
    assert_eq!(services.renderer.requests()[0].idempotency_key, "idem:site");
}

#[tokio::test]
async fn test_site_failure_has_empty_payload() {
    let services = TestServices::new(1)
        .with_renderer(MockSiteRenderer::failing(ServiceError::permanent("disk full")));
    let output = SitePhase::new(&context(&services))
        .run(SiteInput {
            document: "manual.pdf".to_string(),
            blocks: Vec::new(),
            output_dir: "out".to_string(),
            meta: SiteMeta::default(),
            idempotency_key: "idem:site".to_string(),
        })
        .await;

    assert!(!output.success);
    assert_eq!(output.error.as_deref(), Some("disk full"));
    assert!(output.json_path.is_empty());
}

#[tokio::test]
async fn test_cleanup_runs_stages_in_order() {
    let services = TestServices::new(1).with_cleanup(MockCleanupService::new().with_correction(
        Ok(Correction {
            corrections: 9,
            corrected_name: Some("TR-808 Rhythm Composer".to_string()),
            tags: vec!["drum machine".to_string()],
        }),
    ));
    let output = CleanupPhase::new(&context(&services))
        .run(&cleanup_request())
        .await;

    assert_eq!(services.cleanup.calls(), vec!["normalize", "noise", "correct"]);
    assert_eq!(
        services.cleanup.keys(),
        vec!["idem:abc:normalize", "idem:abc:noise", "idem:abc:llm"]
    );
    assert!(output.success);
    assert!(output.warnings.is_empty());
    assert_eq!(output.llm_corrections, 9);
    assert_eq!(
        output.corrected_product_name.as_deref(),
        Some("TR-808 Rhythm Composer")
    );
    assert_eq!(
        output.status_line(),
        "Complete: 3 encoding fixes, 1 noise removals, 9 AI corrections"
    );
}

#[tokio::test]
async fn test_cleanup_absorbs_stage_failures() {
    let services = TestServices::new(1).with_cleanup(
        MockCleanupService::new()
            .with_normalize(Err(ServiceError::permanent("bad encoding table")))
            .with_correction(Err(ServiceError::validation("response was not JSON"))),
    );
    let output = CleanupPhase::new(&context(&services))
        .run(&cleanup_request())
        .await;

    assert!(output.success);
    assert_eq!(output.normalization_fixes, 0);
    assert_eq!(output.noise_removals, 1);
    assert_eq!(output.llm_corrections, 0);
    assert_eq!(output.error.as_deref(), Some("response was not JSON"));
    assert_eq!(
        output.warnings,
        vec![
            "Encoding normalization failed: bad encoding table".to_string(),
            "LLM correction failed: response was not JSON".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_cleanup_skips_llm_when_configured() {
    let services = TestServices::new(1);
    let config = PipelineConfig::default().with_skip_llm_correction(true);
    let output = CleanupPhase::new(&context_with(&services, config))
        .run(&cleanup_request())
        .await;

    assert_eq!(services.cleanup.calls(), vec!["normalize", "noise"]);
    assert_eq!(output.warnings, vec![NO_LLM_WARNING.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_silent_llm_call_becomes_warning() {
    let services = TestServices::new(1).with_cleanup(
        MockCleanupService::new().with_llm_duration(Duration::from_secs(200), None),
    );
    let output = CleanupPhase::new(&context(&services))
        .run(&cleanup_request())
        .await;

    assert!(output.success);
    assert_eq!(output.llm_corrections, 0);
    assert_eq!(services.cleanup.calls().iter().filter(|c| *c == "correct").count(), 3);
    assert!(output.warnings[0].starts_with("LLM correction failed"));
}

#[tokio::test(start_paused = true)]
async fn test_beating_llm_call_completes() {
    let services = TestServices::new(1).with_cleanup(
        MockCleanupService::new()
            .with_llm_duration(Duration::from_secs(240), Some(Duration::from_secs(30))),
    );
    let output = CleanupPhase::new(&context(&services))
        .run(&cleanup_request())
        .await;

    assert!(output.warnings.is_empty());
    assert_eq!(output.llm_corrections, 5);
}
