//! ONNX isolation forest loader

use crate::models::classifier::{OutlierClassifier, Verdict};
use anyhow::{anyhow, Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Isolation forest exported from a fitted scikit-learn model.
///
/// Takes a `[1, 1]` float input and yields a `label` output of `-1`
/// (outlier) or `1` (inlier), plus a `scores` output that is negative for
/// outliers.
pub struct IsolationForestModel {
    /// Model name
    name: String,
    /// ONNX Runtime session (`run` needs exclusive access)
    session: Mutex<Session>,
    /// Input name for the model
    input_name: String,
    /// Output carrying the -1/1 label
    label_output: String,
    /// Output carrying the decision score, if exported
    score_output: Option<String>,
}

impl OutlierClassifier for IsolationForestModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn classify(&self, amount: f64) -> Result<Verdict> {
        let input_tensor = Tensor::from_array((vec![1_i64, 1], vec![amount as f32]))
            .context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow!("Lock error: {}", e))?;
        let outputs = session.run(ort::inputs![&self.input_name => input_tensor])?;

        if let Some(output) = outputs.get(&self.label_output) {
            if let Ok((_, labels)) = output.try_extract_tensor::<i64>() {
                if let Some(&label) = labels.first() {
                    debug!(model = %self.name, amount = amount, label = label, "Isolation forest label");
                    return Ok(Verdict::from_label(label));
                }
            }
        }

        // Some exports only keep the decision function
        if let Some(output) = self.score_output.as_deref().and_then(|name| outputs.get(name)) {
            if let Ok((_, scores)) = output.try_extract_tensor::<f32>() {
                if let Some(&score) = scores.first() {
                    debug!(model = %self.name, amount = amount, score = score, "Isolation forest score");
                    return Ok(if score < 0.0 {
                        Verdict::Outlier
                    } else {
                        Verdict::Inlier
                    });
                }
            }
        }

        Err(anyhow!("Model {} produced no label or score", self.name))
    }
}

/// Loader for ONNX classifiers
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Result<Self> {
        ort::init().commit()?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    /// Load an isolation forest from file
    pub fn load_isolation_forest<P: AsRef<Path>>(
        &self,
        path: P,
        name: &str,
    ) -> Result<IsolationForestModel> {
        let path = path.as_ref();

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "X".to_string());

        let label_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("label"))
            .or_else(|| session.outputs.first())
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "label".to_string());

        let score_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("score"))
            .map(|o| o.name.clone());

        info!(
            model = %name,
            input = %input_name,
            label = %label_output,
            score = ?score_output,
            "Model loaded successfully"
        );

        Ok(IsolationForestModel {
            name: name.to_string(),
            session: Mutex::new(session),
            input_name,
            label_output,
            score_output,
        })
    }
}
