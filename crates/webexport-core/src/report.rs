//! Summary of a finished export.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::export::GraphSummary;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// What a successful run produced, printed to the console.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportReport {
    /// Absolute path of the relocated artifact
    pub artifact_path: PathBuf,
    pub size_bytes: u64,
    /// Configured square input resolution
    pub input_size: u32,
    /// Class labels ordered by class index
    pub class_names: Vec<String>,
    pub graph: Option<GraphSummary>,
}

impl ExportReport {
    pub fn size_mib(&self) -> f64 {
        self.size_bytes as f64 / BYTES_PER_MIB
    }

    pub fn class_count(&self) -> usize {
        self.class_names.len()
    }
}

/// `{0: 'L1', 1: 'L2'}`, the way Ultralytics prints `model.names`.
pub struct ClassLabels<'a>(pub &'a [String]);

impl fmt::Display for ClassLabels<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (index, name) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{index}: {}", Quoted(name))?;
        }
        f.write_str("}")
    }
}

/// Python `repr` of a string: single quotes unless only double quotes avoid escaping.
struct Quoted<'a>(&'a str);

impl fmt::Display for Quoted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quote = if self.0.contains('\'') && !self.0.contains('"') {
            '"'
        } else {
            '\''
        };
        write!(f, "{quote}")?;
        for c in self.0.chars() {
            match c {
                '\\' => f.write_str("\\\\")?,
                '\n' => f.write_str("\\n")?,
                '\t' => f.write_str("\\t")?,
                c if c == quote => write!(f, "\\{c}")?,
                c => write!(f, "{c}")?,
            }
        }
        write!(f, "{quote}")
    }
}

/// `[1, 3, 640, 640]` with `?` for symbolic dimensions.
pub struct Shape<'a>(pub &'a [i64]);

impl fmt::Display for Shape<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, dim) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if *dim < 0 {
                f.write_str("?")?;
            } else {
                write!(f, "{dim}")?;
            }
        }
        f.write_str("]")
    }
}

impl fmt::Display for GraphSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in &self.inputs {
            writeln!(f, "- Input {}: {}", input.name, Shape(&input.shape))?;
        }
        for output in &self.outputs {
            writeln!(f, "- Output {}: {}", output.name, Shape(&output.shape))?;
        }
        match self.opset {
            Some(opset) => write!(f, "- Opset: {opset}"),
            None => write!(f, "- Opset: unknown"),
        }
    }
}

impl fmt::Display for ExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "✓ Model successfully converted to: {}",
            self.artifact_path.display()
        )?;
        writeln!(f, "✓ Model size: {:.2} MB", self.size_mib())?;
        writeln!(f)?;
        writeln!(f, "Model Information:")?;
        writeln!(f, "- Input size: {0}x{0}", self.input_size)?;
        writeln!(f, "- Classes: {}", ClassLabels(&self.class_names))?;
        write!(f, "- Number of classes: {}", self.class_count())?;
        if let Some(graph) = &self.graph {
            write!(f, "\n{graph}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::GraphTensor;

    fn report() -> ExportReport {
        ExportReport {
            artifact_path: PathBuf::from("/site/public/models/best.onnx"),
            size_bytes: 3 * 1024 * 1024 + 512 * 1024,
            input_size: 640,
            class_names: ["L1", "L2", "L3", "L4", "L5"].map(String::from).to_vec(),
            graph: None,
        }
    }

    #[test]
    fn test_report_text() {
        let text = report().to_string();
        assert!(text.starts_with("✓ Model successfully converted to: /site/public/models/best.onnx\n"));
        assert!(text.contains("✓ Model size: 3.50 MB\n"));
        assert!(text.contains("- Input size: 640x640\n"));
        assert!(text.contains("- Classes: {0: 'L1', 1: 'L2', 2: 'L3', 3: 'L4', 4: 'L5'}\n"));
        assert!(text.ends_with("- Number of classes: 5"));
    }

    #[test]
    fn test_report_with_graph() {
        let mut report = report();
        report.graph = Some(GraphSummary {
            inputs: vec![GraphTensor {
                name: "images".into(),
                shape: vec![1, 3, 640, 640],
                elem_type: Some(1),
            }],
            outputs: vec![GraphTensor {
                name: "output0".into(),
                shape: vec![1, 9, -1],
                elem_type: Some(1),
            }],
            opset: Some(11),
        });
        let text = report.to_string();
        assert!(text.contains("- Input images: [1, 3, 640, 640]"));
        assert!(text.contains("- Output output0: [1, 9, ?]"));
        assert!(text.ends_with("- Opset: 11"));
    }

    #[test]
    fn test_empty_class_labels() {
        assert_eq!(ClassLabels(&[]).to_string(), "{}");
    }

    #[test]
    fn test_class_labels_quote_like_python() {
        let names = ["it's", "say \"hi\"", "both ' \"", "a\\b"].map(String::from);
        assert_eq!(
            ClassLabels(&names).to_string(),
            r#"{0: "it's", 1: 'say "hi"', 2: 'both \' "', 3: 'a\\b'}"#
        );
    }
}
