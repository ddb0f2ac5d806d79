//! Integration tests for `UltralyticsBackend` using a fake interpreter.
//!
//! The fake interpreter is a shell script that ignores the deployed Python
//! script and speaks the JSON progress protocol directly.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use webexport_core::{
    ExportBackend, ExportError, ExportPreset, ExportRequest, ModelExporter, ProjectLayout,
    UltralyticsBackend,
};

const WORKING_INTERPRETER: &str = r#"
case "$2" in
  --check)
    echo '{"stage":"ready","message":"ultralytics 8.3.40"}'
    ;;
  --inspect)
    printf '{"stage":"complete","output_path":"%s","output_size":15,"inputs":[{"name":"images","shape":[1,3,640,640],"elem_type":1}],"outputs":[],"opset":11}\n' "$3"
    ;;
  --checkpoint)
    out="$(dirname "$3")/best.onnx"
    printf 'fake onnx graph' > "$out"
    echo 'Ultralytics 8.3.40 Python-3.11.9 torch-2.4.0 CPU'
    echo 'ONNX: starting export with onnx 1.16.1 opset 11...' >&2
    echo '{"stage":"loading","message":"Loading YOLO model"}'
    echo '{"stage":"exporting","message":"Exporting model to ONNX format"}'
    printf '{"stage":"complete","output_path":"%s","output_size":15,"names":["L1","L2","L3","L4","L5"],"inputs":[{"name":"images","shape":[1,3,640,640],"elem_type":1}],"outputs":[{"name":"output0","shape":[1,9,8400],"elem_type":1}],"opset":11}\n' "$out"
    ;;
esac
"#;

const MISSING_ULTRALYTICS: &str = r#"
echo '{"stage":"error","kind":"dependency","message":"Failed to import: No module named '"'"'ultralytics'"'"'"}'
exit 3
"#;

const FAILING_EXPORT: &str = r#"
case "$2" in
  --check)
    echo '{"stage":"ready","message":"ultralytics 8.3.40"}'
    ;;
  *)
    echo 'Traceback (most recent call last):' >&2
    echo '{"stage":"loading"}'
    echo '{"stage":"error","kind":"export","message":"Unsupported ONNX opset version: 99"}'
    exit 1
    ;;
esac
"#;

const CRASHING_EXPORT: &str = r#"
case "$2" in
  --check)
    echo '{"stage":"ready"}'
    ;;
  *)
    echo 'Illegal instruction (core dumped)' >&2
    exit 132
    ;;
esac
"#;

fn write_fake_python(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn create_test_env() -> (TempDir, ProjectLayout) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let layout = ProjectLayout::new(temp_dir.path().join("web").join("site"));
    std::fs::create_dir_all(layout.root()).unwrap();

    let checkpoint = layout.checkpoint_path(ExportPreset::Browser);
    std::fs::create_dir_all(checkpoint.parent().unwrap()).unwrap();
    std::fs::write(&checkpoint, b"torch checkpoint").unwrap();

    (temp_dir, layout)
}

// Scenarios share one test so no other thread forks while a fake
// interpreter is being written (exec would fail with ETXTBSY).
#[tokio::test]
async fn test_ultralytics_backend_scenarios() {
    let bin = TempDir::new().unwrap();
    let working = write_fake_python(bin.path(), "python-ok", WORKING_INTERPRETER);
    let missing = write_fake_python(bin.path(), "python-missing", MISSING_ULTRALYTICS);
    let failing = write_fake_python(bin.path(), "python-fail", FAILING_EXPORT);
    let crashing = write_fake_python(bin.path(), "python-crash", CRASHING_EXPORT);

    probe_and_export(&working).await;
    end_to_end_export(&working).await;
    inspect_existing_artifact(&working).await;
    missing_dependency(&missing).await;
    failing_export(&failing).await;
    crashing_export(&crashing).await;
}

async fn probe_and_export(python: &Path) {
    let (_temp, layout) = create_test_env();
    let backend = UltralyticsBackend::for_layout(&layout, Some(python.to_path_buf()));
    backend.probe().await.unwrap();

    let request = ExportRequest::for_preset(&layout, ExportPreset::Browser);
    let exported = backend.export(&request).await.unwrap();

    assert_eq!(exported.output_path, request.checkpoint.with_file_name("best.onnx"));
    assert_eq!(exported.output_size, Some(15));
    assert_eq!(exported.class_names.len(), 5);
    let graph = exported.graph.unwrap();
    assert_eq!(graph.primary_input().unwrap().shape, vec![1, 3, 640, 640]);
    assert_eq!(graph.opset, Some(11));

    // The script was deployed into the project tooling directory.
    assert!(layout.scripts_dir().join("export_yolo_onnx.py").exists());
}

async fn end_to_end_export(python: &Path) {
    let (_temp, layout) = create_test_env();
    let exporter = ModelExporter::new(UltralyticsBackend::for_layout(
        &layout,
        Some(python.to_path_buf()),
    ));
    let request = ExportRequest::for_preset(&layout, ExportPreset::Browser);

    let report = exporter.run(&request).await.unwrap();

    assert_eq!(std::fs::read(layout.artifact_path()).unwrap(), b"fake onnx graph");
    assert_eq!(report.size_bytes, 15);
    assert_eq!(report.class_names[4], "L5");
    assert!(!request.checkpoint.with_file_name("best.onnx").exists());
}

async fn inspect_existing_artifact(python: &Path) {
    let (_temp, layout) = create_test_env();
    std::fs::create_dir_all(layout.output_dir()).unwrap();
    std::fs::write(layout.artifact_path(), b"fake onnx graph").unwrap();

    let backend = UltralyticsBackend::for_layout(&layout, Some(python.to_path_buf()));
    let described = backend.inspect(&layout.artifact_path()).await.unwrap();

    assert_eq!(described.output_path, layout.artifact_path());
    assert_eq!(described.graph.unwrap().inputs[0].name, "images");
}

async fn missing_dependency(python: &Path) {
    let (_temp, layout) = create_test_env();
    let exporter = ModelExporter::new(UltralyticsBackend::for_layout(
        &layout,
        Some(python.to_path_buf()),
    ));

    let err = exporter
        .run(&ExportRequest::for_preset(&layout, ExportPreset::Browser))
        .await
        .unwrap_err();

    match &err {
        ExportError::DependencyUnavailable { message } => {
            assert!(message.contains("ultralytics"), "message: {message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!layout.output_dir().exists());
}

async fn failing_export(python: &Path) {
    let (_temp, layout) = create_test_env();
    let backend = UltralyticsBackend::for_layout(&layout, Some(python.to_path_buf()));

    let err = backend
        .export(&ExportRequest::for_preset(&layout, ExportPreset::Browser))
        .await
        .unwrap_err();

    match err {
        ExportError::ExportFailed { message } => {
            assert_eq!(message, "Unsupported ONNX opset version: 99");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

async fn crashing_export(python: &Path) {
    let (_temp, layout) = create_test_env();
    let backend = UltralyticsBackend::for_layout(&layout, Some(python.to_path_buf()));

    let err = backend
        .export(&ExportRequest::for_preset(&layout, ExportPreset::Browser))
        .await
        .unwrap_err();

    match err {
        ExportError::ExportFailed { message } => {
            assert!(message.contains("Illegal instruction"), "message: {message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
