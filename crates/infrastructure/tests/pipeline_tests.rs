//! Integration tests for infrastructure crate
//!
//! Tests cover:
//! - A full run against a wiremock speech endpoint
//! - Retry and abort decisions with the JSONL checkpoint ledger
//! - Resuming an aborted run or a damaged ledger

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use ai_speech::SpeechConfig;
use application::{
    ApplicationError, CatalogConfig, ConversionClient, ConversionPipeline, ConversionSettings,
    DecisionPort, FileCatalog, PipelineOptions, PipelineOutcome, ProgressReporter, RunReport,
};
use domain::{Adjustment, RecoveryDecision};
use infrastructure::{AlwaysAccept, JsonlCheckpointStore, ScriptedDecisions, SpeechAdapter};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const AUDIO_BYTES: usize = 4096;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(ids: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("in")).unwrap();
        for id in ids {
            std::fs::write(dir.path().join("in").join(format!("{id}.txt")), format!("text {id}"))
                .unwrap();
        }
        Self { dir }
    }

    fn output(&self, id: &str) -> PathBuf {
        self.dir.path().join("out").join(format!("{id}.mp3"))
    }

    fn ledger(&self) -> PathBuf {
        self.dir.path().join(".breakpointfile")
    }

    fn pipeline(&self, server: &MockServer, decisions: Arc<dyn DecisionPort>) -> ConversionPipeline {
        let speech = SpeechAdapter::new(SpeechConfig {
            base_url: format!("{}/v1", server.uri()),
            timeout_ms: 5_000,
            ..SpeechConfig::default()
        })
        .unwrap();

        let catalog = FileCatalog::new(CatalogConfig {
            input_dir: self.dir.path().join("in"),
            output_dir: self.dir.path().join("out"),
            text_extension: "txt".to_string(),
            audio_extension: "mp3".to_string(),
        });
        let client = ConversionClient::new(
            Arc::new(speech),
            ConversionSettings {
                voice: "zh-CN-XiaoxiaoNeural".to_string(),
                rate: Adjustment::NEUTRAL,
                volume: Adjustment::NEUTRAL,
                min_output_bytes: 1024,
            },
        );

        ConversionPipeline::new(
            catalog,
            client,
            Arc::new(JsonlCheckpointStore::new(self.ledger())),
            decisions,
            ProgressReporter::disabled(),
            PipelineOptions {
                batch_size: NonZeroUsize::new(2).unwrap(),
                min_output_bytes: 1024,
            },
        )
    }
}

fn audio() -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "audio/mpeg")
        .set_body_bytes(vec![0u8; AUDIO_BYTES])
}

async fn mount_models(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(server)
        .await;
}

async fn mount_failure_once(server: &MockServer, text: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .and(body_partial_json(json!({ "input": text })))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(server)
        .await;
}

async fn mount_speech(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .respond_with(audio())
        .mount(server)
        .await;
}

fn report(outcome: PipelineOutcome) -> RunReport {
    match outcome {
        PipelineOutcome::Completed(report) => report,
        PipelineOutcome::Declined(plan) => panic!("declined: {plan:?}"),
    }
}

async fn speech_requests_for(server: &MockServer, text: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/v1/audio/speech")
        .filter(|r| {
            serde_json::from_slice::<serde_json::Value>(&r.body)
                .map(|body| body["input"] == text)
                .unwrap_or(false)
        })
        .count()
}

#[tokio::test]
async fn clean_run_writes_every_output_and_removes_the_ledger() {
    let server = MockServer::start().await;
    mount_models(&server).await;
    mount_speech(&server).await;
    let ws = Workspace::new(&["1", "2", "10"]);

    let report = report(ws.pipeline(&server, Arc::new(AlwaysAccept)).run().await.unwrap());

    assert!(report.is_clean());
    assert_eq!(report.summary.success_count(), 3);
    assert_eq!(report.batches_executed, 2);
    for id in ["1", "2", "10"] {
        assert_eq!(std::fs::metadata(ws.output(id)).unwrap().len(), AUDIO_BYTES as u64);
    }
    assert!(!ws.ledger().exists());
}

#[tokio::test]
async fn retry_recovers_a_transient_failure() {
    let server = MockServer::start().await;
    mount_models(&server).await;
    mount_failure_once(&server, "text 2").await;
    mount_speech(&server).await;
    let ws = Workspace::new(&["1", "2", "3"]);

    let decisions = Arc::new(ScriptedDecisions::fixed(RecoveryDecision::Retry));
    let report = report(ws.pipeline(&server, decisions).run().await.unwrap());

    assert!(report.is_clean());
    assert_eq!(speech_requests_for(&server, "text 2").await, 2);
    assert!(ws.output("2").exists());
    assert!(!ws.ledger().exists());
}

#[tokio::test]
async fn abort_then_resume_converts_only_the_rest() {
    let server = MockServer::start().await;
    mount_models(&server).await;
    mount_failure_once(&server, "text 1").await;
    mount_speech(&server).await;
    let ws = Workspace::new(&["1", "2", "3"]);

    let aborting = Arc::new(ScriptedDecisions::fixed(RecoveryDecision::Abort));
    let first = report(ws.pipeline(&server, aborting).run().await.unwrap());

    assert!(first.aborted);
    assert_eq!(first.summary.total(), 2);
    assert!(!ws.output("1").exists());
    assert!(ws.output("2").exists());
    assert!(!ws.output("3").exists());
    let ledger = std::fs::read_to_string(ws.ledger()).unwrap();
    assert!(ledger.contains(r#""id":"2""#));

    let second = report(ws.pipeline(&server, Arc::new(AlwaysAccept)).run().await.unwrap());

    assert!(second.resumed);
    assert_eq!(second.run_id, first.run_id);
    assert_eq!(second.skipped, 1);
    assert!(second.is_clean());
    assert_eq!(second.summary.success_count(), 3);
    assert_eq!(speech_requests_for(&server, "text 2").await, 1);
    assert!(!ws.ledger().exists());
}

#[tokio::test]
async fn continued_failures_still_remove_the_ledger() {
    let server = MockServer::start().await;
    mount_models(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .and(body_partial_json(json!({ "input": "text 2" })))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    mount_speech(&server).await;
    let ws = Workspace::new(&["1", "2"]);

    let report = report(ws.pipeline(&server, Arc::new(AlwaysAccept)).run().await.unwrap());

    assert!(!report.is_clean());
    assert!(!report.aborted);
    let reason = &report.summary.failed()[&domain::WorkItemId::new("2").unwrap()];
    assert!(reason.contains("500"), "{reason}");
    assert!(!ws.output("2").exists());
    assert!(!ws.ledger().exists());
}

#[tokio::test]
async fn empty_ledger_counts_as_an_interrupted_run() {
    let server = MockServer::start().await;
    mount_models(&server).await;
    mount_speech(&server).await;
    let ws = Workspace::new(&["1", "2"]);
    std::fs::write(ws.ledger(), "").unwrap();

    let report = report(ws.pipeline(&server, Arc::new(AlwaysAccept)).run().await.unwrap());

    assert!(report.resumed);
    assert_eq!(report.skipped, 0);
    assert!(report.is_clean());
    assert_eq!(report.summary.success_count(), 2);
    assert!(!ws.ledger().exists());
}

#[tokio::test]
async fn declined_run_leaves_nothing_behind() {
    let server = MockServer::start().await;
    mount_models(&server).await;
    let ws = Workspace::new(&["1"]);

    let decline = Arc::new(ScriptedDecisions::sequence(false, Vec::new(), RecoveryDecision::Continue));
    let outcome = ws.pipeline(&server, decline).run().await.unwrap();

    assert!(matches!(outcome, PipelineOutcome::Declined(_)));
    assert!(!ws.ledger().exists());
    assert_eq!(speech_requests_for(&server, "text 1").await, 0);
}

#[tokio::test]
async fn missing_input_is_reported() {
    let server = MockServer::start().await;
    let ws = Workspace::new(&[]);
    std::fs::remove_dir(ws.dir.path().join("in")).unwrap();

    let err = ws.pipeline(&server, Arc::new(AlwaysAccept)).run().await.unwrap_err();

    assert!(matches!(err, ApplicationError::MissingInput(_)));
}
