//! Scaler / classifier traits and the one-time inference context.

use std::sync::{Arc, OnceLock};

use thiserror::Error;

// ---------------------------------------------------------------------------
// ModelError
// ---------------------------------------------------------------------------

/// All errors that can arise from the inference subsystem.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    /// No inference context has been installed yet.
    #[error("model unavailable: {0}")]
    Unavailable(String),

    /// The scaler or classifier rejected the input or failed internally.
    #[error("inference failed: {0}")]
    Inference(String),

    /// [`ModelSlot::install`] was called twice.
    #[error("an inference context is already installed")]
    AlreadyLoaded,

    /// A persisted model artifact could not be read or parsed.
    #[error("model artifact error: {0}")]
    Artifact(String),
}

// ---------------------------------------------------------------------------
// FeatureMatrix
// ---------------------------------------------------------------------------

/// Row-major `rows × cols` matrix of `f64`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl FeatureMatrix {
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, ModelError> {
        if data.len() != rows * cols {
            return Err(ModelError::Inference(format!(
                "matrix data has {} values, expected {rows} × {cols}",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Single-row matrix.
    pub fn from_row(row: Vec<f64>) -> Self {
        Self {
            rows: 1,
            cols: row.len(),
            data: row,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, r: usize) -> &[f64] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub fn get(&self, r: usize, c: usize) -> Option<f64> {
        (r < self.rows && c < self.cols).then(|| self.data[r * self.cols + c])
    }

    pub fn column(&self, c: usize) -> Option<Vec<f64>> {
        (c < self.cols).then(|| (0..self.rows).map(|r| self.data[r * self.cols + c]).collect())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Feature standardization fitted at training time.
pub trait FeatureScaler: Send + Sync {
    /// Map raw feature rows to the space the classifier was trained in.
    fn transform(&self, features: &FeatureMatrix) -> Result<FeatureMatrix, ModelError>;
}

/// Classifier producing one probability column per class.
pub trait ProbabilisticClassifier: Send + Sync {
    /// `rows × n_classes` class probabilities.
    fn predict_probability(&self, features: &FeatureMatrix) -> Result<FeatureMatrix, ModelError>;
}

// Compile-time assertion: both traits must be usable as trait objects.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn FeatureScaler>, _: Box<dyn ProbabilisticClassifier>) {}
};

// ---------------------------------------------------------------------------
// InferenceContext
// ---------------------------------------------------------------------------

/// A fitted scaler paired with the classifier trained on its output.
pub struct InferenceContext {
    scaler: Box<dyn FeatureScaler>,
    model: Box<dyn ProbabilisticClassifier>,
}

impl std::fmt::Debug for InferenceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceContext").finish_non_exhaustive()
    }
}

impl InferenceContext {
    pub fn new(
        scaler: impl FeatureScaler + 'static,
        model: impl ProbabilisticClassifier + 'static,
    ) -> Self {
        Self {
            scaler: Box::new(scaler),
            model: Box::new(model),
        }
    }

    /// Scale `features` and return the class probabilities.
    pub fn predict(&self, features: &FeatureMatrix) -> Result<FeatureMatrix, ModelError> {
        let scaled = self.scaler.transform(features)?;
        let probabilities = self.model.predict_probability(&scaled)?;
        if probabilities.rows() != features.rows() {
            return Err(ModelError::Inference(format!(
                "model returned {} rows for {} inputs",
                probabilities.rows(),
                features.rows()
            )));
        }
        Ok(probabilities)
    }

    /// Probability of class `class` for a single feature row.
    pub fn class_probability(&self, row: Vec<f64>, class: usize) -> Result<f64, ModelError> {
        let probabilities = self.predict(&FeatureMatrix::from_row(row))?;
        probabilities.get(0, class).ok_or_else(|| {
            ModelError::Inference(format!(
                "model returned {} class columns, need column {class}",
                probabilities.cols()
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// ModelSlot
// ---------------------------------------------------------------------------

/// Write-once holder for the shared [`InferenceContext`].
///
/// Installation happens once at startup; afterwards every reader gets a
/// cheap `Arc` clone without locking.
///
/// ```rust
/// use cough_screen::model::{IdentityScaler, InferenceContext, ModelSlot};
/// # use cough_screen::model::{FeatureMatrix, ModelError, ProbabilisticClassifier};
/// # struct Half;
/// # impl ProbabilisticClassifier for Half {
/// #     fn predict_probability(&self, x: &FeatureMatrix) -> Result<FeatureMatrix, ModelError> {
/// #         FeatureMatrix::new(x.rows(), 2, vec![0.5; x.rows() * 2])
/// #     }
/// # }
///
/// let slot = ModelSlot::new();
/// assert!(slot.get().is_err());
/// slot.install(InferenceContext::new(IdentityScaler, Half)).unwrap();
/// assert!(slot.get().is_ok());
/// ```
#[derive(Debug, Default)]
pub struct ModelSlot {
    inner: OnceLock<Arc<InferenceContext>>,
}

impl ModelSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot that is already populated.
    pub fn loaded(context: InferenceContext) -> Self {
        let slot = Self::new();
        let _ = slot.inner.set(Arc::new(context));
        slot
    }

    /// Install the context. Fails with [`ModelError::AlreadyLoaded`] if a
    /// context is already present.
    pub fn install(&self, context: InferenceContext) -> Result<(), ModelError> {
        self.inner
            .set(Arc::new(context))
            .map_err(|_| ModelError::AlreadyLoaded)?;
        log::info!("inference context installed");
        Ok(())
    }

    pub fn get(&self) -> Result<Arc<InferenceContext>, ModelError> {
        self.inner
            .get()
            .cloned()
            .ok_or_else(|| ModelError::Unavailable("no inference context installed".into()))
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.get().is_some()
    }
}

// ---------------------------------------------------------------------------
// MockClassifier  (test-only)
// ---------------------------------------------------------------------------

/// Test double computing the positive-class probability from each row.
#[cfg(test)]
pub struct MockClassifier {
    positive: fn(&[f64]) -> f64,
}

#[cfg(test)]
impl MockClassifier {
    pub fn new(positive: fn(&[f64]) -> f64) -> Self {
        Self { positive }
    }

    /// Always fails with [`ModelError::Inference`].
    pub fn failing() -> impl ProbabilisticClassifier {
        struct Failing;
        impl ProbabilisticClassifier for Failing {
            fn predict_probability(&self, _: &FeatureMatrix) -> Result<FeatureMatrix, ModelError> {
                Err(ModelError::Inference("mock failure".into()))
            }
        }
        Failing
    }
}

#[cfg(test)]
impl ProbabilisticClassifier for MockClassifier {
    fn predict_probability(&self, features: &FeatureMatrix) -> Result<FeatureMatrix, ModelError> {
        let data = (0..features.rows())
            .flat_map(|r| {
                let p = (self.positive)(features.row(r));
                [1.0 - p, p]
            })
            .collect();
        FeatureMatrix::new(features.rows(), 2, data)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
