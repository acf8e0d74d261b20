use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use deckgen_batch::{
    preview_record, run_with, AbortKind, BatchError, ConvertError, Converter, RecordStatus,
    RenderOutcome, RunOptions, Step,
};
use deckgen_core::{BatchConfig, SourceError};
use deckgen_template::sample::{sample_deck, SampleSlide};
use deckgen_template::{PptxPackage, TextNodes};
use tempfile::TempDir;

const DATA: &str =
    "NOM_COMPLET,AUTRE\nAlice,Security\nBob,Cloud\nCarol,Data\nDan,Networks\nEve,Audit\n";

const CONVERTER_STDERR: &str =
    "Error: source file could not be loaded\n  at filter detection\n  javaldx: none\n";

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Plan {
    Unavailable,
    ExitNonZero,
    NoOutput,
}

/// Converter double. The n-th call (1-based) follows `plan[n]`; every other
/// call writes `<out_dir>/<stem>.pdf` and succeeds. A clean exit that writes
/// nothing is judged by whether the expected file exists, as `soffice` is.
#[derive(Default)]
struct FakeConverter {
    plan: HashMap<usize, Plan>,
    calls: RefCell<Vec<PathBuf>>,
}

impl FakeConverter {
    fn with(call: usize, plan: Plan) -> Self {
        FakeConverter {
            plan: HashMap::from([(call, plan)]),
            ..FakeConverter::default()
        }
    }

    fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl Converter for FakeConverter {
    fn render(&self, source: &Path, out_dir: &Path) -> Result<RenderOutcome, ConvertError> {
        self.calls.borrow_mut().push(source.to_path_buf());
        let call = self.call_count();
        let stem = source.file_stem().expect("stem").to_string_lossy().into_owned();
        let expected = out_dir.join(format!("{stem}.pdf"));
        match self.plan.get(&call) {
            Some(Plan::Unavailable) => Err(ConvertError::Unavailable {
                program: "soffice".to_string(),
                source: std::io::Error::from(ErrorKind::NotFound),
            }),
            Some(Plan::ExitNonZero) => Ok(RenderOutcome::Failed {
                code: Some(1),
                stdout: String::new(),
                stderr: CONVERTER_STDERR.to_string(),
            }),
            Some(Plan::NoOutput) if expected.exists() => {
                Ok(RenderOutcome::Rendered { path: expected })
            }
            Some(Plan::NoOutput) => Ok(RenderOutcome::Incomplete { expected }),
            None => {
                fs::write(&expected, b"%PDF-1.4").expect("write render");
                Ok(RenderOutcome::Rendered { path: expected })
            }
        }
    }
}

struct Workspace {
    root: TempDir,
    staging: TempDir,
    config: BatchConfig,
}

impl Workspace {
    fn new() -> Self {
        let root = TempDir::new().expect("root");
        let staging = TempDir::new().expect("staging");
        let deck = sample_deck(&[
            SampleSlide::new(vec!["Hello [[VOTRE_BALISE]]".to_string()]),
            SampleSlide::new(vec!["Topic: [[SUJET]]".to_string(), "R&D".to_string()]),
        ])
        .expect("deck");
        fs::write(root.path().join("template.pptx"), deck).expect("write template");
        fs::write(root.path().join("data.csv"), DATA).expect("write data");
        let config = BatchConfig::default().resolve(root.path());
        Workspace {
            root,
            staging,
            config,
        }
    }

    fn options(&self, render: bool) -> RunOptions {
        RunOptions {
            render,
            staging_dir: Some(self.staging.path().to_path_buf()),
        }
    }

    fn document(&self, n: usize) -> PathBuf {
        self.config.artifact(n - 1).document
    }

    fn render(&self, n: usize) -> PathBuf {
        self.config.artifact(n - 1).render
    }

    /// Leave a render behind as an earlier run would have.
    fn seed_render(&self, n: usize) {
        fs::create_dir_all(&self.config.output.renders).expect("mkdir renders");
        fs::write(self.render(n), b"%PDF-1.4 old").expect("seed render");
    }

    fn staged_files(&self) -> usize {
        fs::read_dir(self.staging.path()).expect("read staging").count()
    }
}

fn texts(path: &Path) -> Vec<String> {
    PptxPackage::open(path)
        .expect("open document")
        .text_nodes()
        .map(|n| n.text().to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// 1. Happy path
// ---------------------------------------------------------------------------

#[test]
fn every_record_gets_document_and_render() {
    let ws = Workspace::new();
    let converter = FakeConverter::default();

    let report = run_with(&ws.config, &converter, &ws.options(true)).expect("run");

    assert_eq!(report.total, 5);
    assert_eq!(report.completed(), 5);
    assert_eq!(report.skipped(), 0);
    assert!(report.aborted.is_none());
    for n in 1..=5 {
        assert!(ws.document(n).exists(), "document {n}");
        assert!(ws.render(n).exists(), "render {n}");
    }
    assert_eq!(
        texts(&ws.document(1)),
        ["Hello Alice", "Topic: Security", "R&D"]
    );
    assert_eq!(texts(&ws.document(5)), ["Hello Eve", "Topic: Audit", "R&D"]);
    assert_eq!(
        texts(&ws.root.path().join("template.pptx"))[0],
        "Hello [[VOTRE_BALISE]]"
    );
    assert_eq!(ws.staged_files(), 0);
    assert!(report.finished_at >= report.started_at);
}

#[test]
fn documents_only_run_skips_converter() {
    let ws = Workspace::new();
    let converter = FakeConverter::default();

    let report = run_with(&ws.config, &converter, &ws.options(false)).expect("run");

    assert_eq!(report.completed(), 5);
    assert!(report
        .records
        .iter()
        .all(|r| r.status == RecordStatus::Completed { rendered: false }));
    assert_eq!(converter.call_count(), 0);
    assert!(ws.document(3).exists());
    assert!(!ws.config.output.renders.exists());
}

#[test]
fn rerun_overwrites_without_leftovers() {
    let ws = Workspace::new();
    run_with(&ws.config, &FakeConverter::default(), &ws.options(true)).expect("first run");
    let report =
        run_with(&ws.config, &FakeConverter::default(), &ws.options(true)).expect("second run");

    assert_eq!(report.completed(), 5);
    let names: Vec<String> = fs::read_dir(&ws.config.output.documents)
        .expect("read documents")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 5, "unexpected files: {names:?}");
    assert!(names.iter().all(|n| !n.ends_with(".deckgen.tmp")));
}

#[test]
fn missing_field_leaves_token_in_document() {
    let ws = Workspace::new();
    fs::write(
        &ws.config.records.path,
        "NOM_COMPLET\nAlice\n",
    )
    .expect("write data");

    let report = run_with(&ws.config, &FakeConverter::default(), &ws.options(false)).expect("run");
    assert_eq!(report.records[0].replacements, 1);
    assert_eq!(texts(&ws.document(1))[1], "Topic: [[SUJET]]");
}

// ---------------------------------------------------------------------------
// 2. Record-level failures
// ---------------------------------------------------------------------------

#[test]
fn converter_unavailable_on_second_record_aborts_batch() {
    let ws = Workspace::new();
    let converter = FakeConverter::with(2, Plan::Unavailable);

    let report = run_with(&ws.config, &converter, &ws.options(true)).expect("run");

    let abort = report.aborted.as_ref().expect("aborted");
    assert_eq!(abort.record, 2);
    assert_eq!(abort.kind, AbortKind::ConverterUnavailable);
    assert!(abort.reason.contains("unavailable"), "reason: {}", abort.reason);
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.completed(), 1);

    assert!(ws.render(1).exists());
    assert!(ws.document(2).exists());
    assert!(!ws.render(2).exists());
    for n in 3..=5 {
        assert!(!ws.document(n).exists(), "document {n} must not exist");
    }
    assert_eq!(converter.call_count(), 2);
    assert_eq!(ws.staged_files(), 0);
}

#[test]
fn converter_failure_on_third_record_skips_only_that_record() {
    let ws = Workspace::new();
    let converter = FakeConverter::with(3, Plan::ExitNonZero);

    let report = run_with(&ws.config, &converter, &ws.options(true)).expect("run");

    assert!(report.aborted.is_none());
    assert_eq!(report.completed(), 4);
    assert_eq!(report.skipped(), 1);
    match &report.records[2].status {
        RecordStatus::Skipped { step, reason } => {
            assert_eq!(*step, Step::Render);
            assert!(reason.contains("could not be loaded"), "reason: {reason}");
        }
        other => panic!("expected skip, got {other:?}"),
    }
    assert!(ws.document(3).exists());
    assert!(!ws.render(3).exists());
    assert!(ws.render(4).exists());
    assert!(ws.render(5).exists());
}

#[test]
fn converter_failure_keeps_full_output_in_report() {
    let ws = Workspace::new();
    let converter = FakeConverter::with(3, Plan::ExitNonZero);

    let report = run_with(&ws.config, &converter, &ws.options(true)).expect("run");

    let output = report.records[2]
        .converter_output
        .as_ref()
        .expect("captured output");
    assert_eq!(output.stderr, CONVERTER_STDERR);
    assert!(output.stderr.contains("javaldx: none"));
    assert!(report.records[1].converter_output.is_none());

    let json: serde_json::Value =
        serde_json::from_str(&report.to_json_pretty().expect("json")).expect("parse");
    assert_eq!(json["records"][2]["converter_output"]["stderr"], CONVERTER_STDERR);
}

#[test]
fn previous_render_does_not_hide_missing_output() {
    let ws = Workspace::new();
    ws.seed_render(1);
    let converter = FakeConverter::with(1, Plan::NoOutput);

    let report = run_with(&ws.config, &converter, &ws.options(true)).expect("run");

    assert!(matches!(
        report.records[0].status,
        RecordStatus::Skipped {
            step: Step::Render,
            ..
        }
    ));
    assert!(!ws.render(1).exists());
    assert_eq!(report.completed(), 4);
}

#[test]
fn previous_render_is_gone_after_converter_failure() {
    let ws = Workspace::new();
    ws.seed_render(2);
    let converter = FakeConverter::with(2, Plan::ExitNonZero);

    let report = run_with(&ws.config, &converter, &ws.options(true)).expect("run");

    assert!(!report.records[1].is_completed());
    assert!(ws.document(2).exists());
    assert!(!ws.render(2).exists());
}

#[test]
fn unremovable_previous_render_skips_record() {
    let ws = Workspace::new();
    fs::create_dir_all(ws.render(1)).expect("block render path with a directory");
    let converter = FakeConverter::default();

    let report = run_with(&ws.config, &converter, &ws.options(true)).expect("run");

    match &report.records[0].status {
        RecordStatus::Skipped { step, reason } => {
            assert_eq!(*step, Step::Render);
            assert!(reason.contains("previous render"), "reason: {reason}");
        }
        other => panic!("expected skip, got {other:?}"),
    }
    assert!(ws.document(1).exists());
    assert_eq!(converter.call_count(), 4);
}

#[cfg(unix)]
#[test]
fn soffice_exiting_cleanly_without_output_is_skipped_on_rerun() {
    use std::os::unix::fs::PermissionsExt;

    use deckgen_batch::SofficeConverter;
    use deckgen_core::config::ConverterConfig;

    let ws = Workspace::new();
    ws.seed_render(1);
    let script = ws.root.path().join("fake-soffice");
    fs::write(&script, "#!/bin/sh\nexit 0\n").expect("write script");
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod");
    let converter = SofficeConverter::new(ConverterConfig {
        program: script.to_string_lossy().into_owned(),
        format: "pdf".to_string(),
    });

    let report = run_with(&ws.config, &converter, &ws.options(true)).expect("run");

    assert_eq!(report.completed(), 0);
    assert!(report.records.iter().all(|r| matches!(
        r.status,
        RecordStatus::Skipped {
            step: Step::Render,
            ..
        }
    )));
    assert!(!ws.render(1).exists());
}

#[test]
fn missing_render_output_is_skipped_not_fatal() {
    let ws = Workspace::new();
    let converter = FakeConverter::with(1, Plan::NoOutput);

    let report = run_with(&ws.config, &converter, &ws.options(true)).expect("run");

    assert!(matches!(
        report.records[0].status,
        RecordStatus::Skipped {
            step: Step::Render,
            ..
        }
    ));
    assert_eq!(report.completed(), 4);
}

#[test]
fn persist_failure_skips_record_and_cleans_up() {
    let ws = Workspace::new();
    fs::create_dir_all(ws.document(2)).expect("block destination with a directory");
    let converter = FakeConverter::default();

    let report = run_with(&ws.config, &converter, &ws.options(true)).expect("run");

    assert!(matches!(
        report.records[1].status,
        RecordStatus::Skipped {
            step: Step::Persist,
            ..
        }
    ));
    assert_eq!(report.completed(), 4);
    assert_eq!(converter.call_count(), 4);
    let tmp = PathBuf::from(format!("{}.deckgen.tmp", ws.document(2).display()));
    assert!(!tmp.exists());
    assert_eq!(ws.staged_files(), 0);
}

// ---------------------------------------------------------------------------
// 3. Startup failures
// ---------------------------------------------------------------------------

#[test]
fn missing_template_is_fatal_before_any_record() {
    let ws = Workspace::new();
    fs::remove_file(&ws.config.template).expect("remove template");
    let converter = FakeConverter::default();

    let err = run_with(&ws.config, &converter, &ws.options(true)).unwrap_err();
    assert!(matches!(err, BatchError::TemplateNotFound { .. }), "got: {err}");
    assert_eq!(converter.call_count(), 0);
    assert!(!ws.config.output.documents.exists());
}

#[test]
fn missing_records_file_is_fatal() {
    let ws = Workspace::new();
    fs::remove_file(&ws.config.records.path).expect("remove data");

    let err = run_with(&ws.config, &FakeConverter::default(), &ws.options(true)).unwrap_err();
    assert!(
        matches!(err, BatchError::Source(SourceError::NotFound { .. })),
        "got: {err}"
    );
}

#[test]
fn header_only_records_file_is_fatal() {
    let ws = Workspace::new();
    fs::write(&ws.config.records.path, "NOM_COMPLET,AUTRE\n").expect("write data");

    let err = run_with(&ws.config, &FakeConverter::default(), &ws.options(true)).unwrap_err();
    assert!(
        matches!(err, BatchError::Source(SourceError::Empty { .. })),
        "got: {err}"
    );
}

#[test]
fn uncreatable_output_dir_is_fatal() {
    let ws = Workspace::new();
    fs::write(&ws.config.output.documents, "a file in the way").expect("write blocker");

    let err = run_with(&ws.config, &FakeConverter::default(), &ws.options(true)).unwrap_err();
    assert!(matches!(err, BatchError::Io { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// 4. Preview
// ---------------------------------------------------------------------------

#[test]
fn preview_reports_changed_nodes_without_writing() {
    let ws = Workspace::new();

    let preview = preview_record(&ws.config, 2).expect("preview");

    assert_eq!(preview.record, 2);
    assert_eq!(preview.total, 5);
    assert_eq!(preview.changes.len(), 2);
    assert_eq!(preview.changes[0].slide, 1);
    assert_eq!(preview.changes[0].after, "Hello Bob");
    assert!(preview.changes[1].unified_diff.contains("+Topic: Cloud"));
    assert!(preview.unresolved.is_empty());
    assert!(!ws.config.output.documents.exists());
}

#[test]
fn preview_lists_unresolved_tokens() {
    let ws = Workspace::new();
    fs::write(&ws.config.records.path, "NOM_COMPLET\nAlice\n").expect("write data");

    let preview = preview_record(&ws.config, 1).expect("preview");
    let unresolved: Vec<&str> = preview.unresolved.iter().map(|t| t.as_str()).collect();
    assert_eq!(unresolved, ["[[SUJET]]"]);
}

#[test]
fn preview_rejects_out_of_range_rows() {
    let ws = Workspace::new();
    for row in [0, 6] {
        let err = preview_record(&ws.config, row).unwrap_err();
        assert!(
            matches!(err, BatchError::RowOutOfRange { total: 5, .. }),
            "row {row}: {err}"
        );
    }
}
