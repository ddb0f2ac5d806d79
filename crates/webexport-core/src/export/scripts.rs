//! Embedded Python export script and deployment utilities.
//!
//! The script is stored as a string constant and written to disk on first use
//! or when the embedded version changes (detected via hash comparison).

use crate::error::IoResultExt;
use crate::Result;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the deployed export script.
pub const EXPORT_SCRIPT_NAME: &str = "export_yolo_onnx.py";

/// File name of the deployed requirements list.
pub const REQUIREMENTS_NAME: &str = "requirements.txt";

/// Exit status the script uses when a dependency cannot be imported.
pub const EXIT_MISSING_DEPENDENCY: i32 = 3;

/// Python requirements for the export virtual environment.
pub const REQUIREMENTS: &str = "\
ultralytics>=8.0.0
onnx>=1.12.0
";

/// Python script that exports a YOLO checkpoint to ONNX.
///
/// Modes: `--check` (import probe), `--inspect FILE` (graph introspection),
/// default (export). Reports progress as JSON lines on stdout.
pub const EXPORT_SCRIPT: &str = r#"#!/usr/bin/env python3
"""Export an Ultralytics YOLO checkpoint to ONNX for browser inference.

Reports progress as JSON lines on stdout. Exits with status 3 when a
required package cannot be imported.
"""
import argparse
import json
import os
import sys

EXIT_MISSING_DEPENDENCY = 3


def progress(stage, **kwargs):
    """Emit a JSON progress line to stdout."""
    print(json.dumps({"stage": stage, **kwargs}), flush=True)


def missing_dependency(exc):
    progress("error", kind="dependency", message=f"Failed to import: {exc}")
    sys.exit(EXIT_MISSING_DEPENDENCY)


def describe_graph(path):
    """Return inputs, outputs and opset of an ONNX file, or {} if it cannot be read."""
    try:
        return _describe_graph(path)
    except Exception as e:
        print(f"Graph introspection failed: {e}", file=sys.stderr, flush=True)
        return {}


def _describe_graph(path):
    try:
        import onnx
    except ImportError:
        return {}

    model = onnx.load(path)
    initializers = {init.name for init in model.graph.initializer}

    def tensors(values):
        out = []
        for value in values:
            if value.name in initializers:
                continue
            tensor_type = value.type.tensor_type
            shape = [
                dim.dim_value if dim.HasField("dim_value") else -1
                for dim in tensor_type.shape.dim
            ]
            out.append({"name": value.name, "shape": shape, "elem_type": tensor_type.elem_type})
        return out

    opsets = [o.version for o in model.opset_import if o.domain in ("", "ai.onnx")]
    return {
        "inputs": tensors(model.graph.input),
        "outputs": tensors(model.graph.output),
        "opset": max(opsets) if opsets else None,
    }


def inspect(path):
    if not os.path.exists(path):
        progress("error", kind="usage", message=f"No such file: {path}")
        sys.exit(2)
    try:
        import onnx  # noqa: F401
    except ImportError as e:
        missing_dependency(e)
    progress("complete", output_path=path, output_size=os.path.getsize(path), **describe_graph(path))


def main():
    parser = argparse.ArgumentParser(description="Export a YOLO checkpoint to ONNX")
    parser.add_argument("--check", action="store_true", help="Only verify that ultralytics imports")
    parser.add_argument("--inspect", default=None, help="Describe an existing ONNX file")
    parser.add_argument("--checkpoint", default=None, help="Path to the .pt checkpoint")
    parser.add_argument("--imgsz", type=int, default=640)
    parser.add_argument("--batch", type=int, default=1)
    parser.add_argument("--opset", type=int, default=11)
    parser.add_argument("--simplify", action="store_true")
    parser.add_argument("--dynamic", action="store_true")
    parser.add_argument("--half", action="store_true")
    parser.add_argument("--int8", action="store_true")
    parser.add_argument("--optimize", action="store_true")
    parser.add_argument("--verbose", action="store_true")
    args = parser.parse_args()

    if args.inspect:
        inspect(args.inspect)
        return

    try:
        import ultralytics
        from ultralytics import YOLO
    except ImportError as e:
        missing_dependency(e)

    if args.check:
        progress("ready", message=f"ultralytics {ultralytics.__version__}")
        return

    if not args.checkpoint:
        progress("error", kind="usage", message="--checkpoint is required")
        sys.exit(2)

    try:
        progress("loading", message=f"Loading YOLO model from {args.checkpoint}")
        model = YOLO(args.checkpoint)
        names = [model.names[i] for i in sorted(model.names)]

        progress("exporting", message="Exporting model to ONNX format")
        output_path = model.export(
            format="onnx",
            imgsz=args.imgsz,
            optimize=args.optimize,
            half=args.half,
            int8=args.int8,
            dynamic=args.dynamic,
            simplify=args.simplify,
            opset=args.opset,
            verbose=args.verbose,
            batch=args.batch,
        )
    except Exception as e:
        progress("error", kind="export", message=str(e))
        sys.exit(1)

    output_path = str(output_path)
    progress(
        "complete",
        output_path=output_path,
        output_size=os.path.getsize(output_path),
        names=names,
        **describe_graph(output_path),
    )


if __name__ == "__main__":
    main()
"#;

/// Compute a short hash of a string for staleness checking.
fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let hash = hasher.finalize();
    hex::encode(&hash[..8])
}

/// Deploy the embedded script and requirements if missing or outdated.
///
/// Returns the path of the deployed export script.
pub fn ensure_scripts_deployed(scripts_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(scripts_dir).with_path(scripts_dir)?;

    let script = deploy_script(scripts_dir, EXPORT_SCRIPT_NAME, EXPORT_SCRIPT)?;
    deploy_script(scripts_dir, REQUIREMENTS_NAME, REQUIREMENTS)?;

    debug!("Export scripts available in {}", scripts_dir.display());
    Ok(script)
}

/// Uses a `.hash` sidecar file to skip rewriting an unchanged script.
fn deploy_script(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let script_path = dir.join(filename);
    let hash_path = dir.join(format!("{}.hash", filename));
    let current_hash = content_hash(content);

    if script_path.exists() {
        if let Ok(stored_hash) = std::fs::read_to_string(&hash_path) {
            if stored_hash.trim() == current_hash {
                return Ok(script_path);
            }
        }
    }

    std::fs::write(&script_path, content).with_path(&script_path)?;
    std::fs::write(&hash_path, &current_hash).with_path(&hash_path)?;
    info!("Deployed {}", script_path.display());
    Ok(script_path)
}
