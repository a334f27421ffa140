//! Synchronous cough detection: preprocess → features → scaler → model.
//!
//! [`CoughDetectionPipeline`] owns no mutable state apart from an optional
//! bounded memo cache keyed by [`RawAudio::content_hash`] plus the shape of
//! the recording. The inference
//! context is read from a shared [`ModelSlot`].

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::audio::{RawAudio, SignalPreprocessor};
use crate::config::{AppConfig, DetectionConfig};
use crate::features::{FeatureExtractor, FeatureFamily};
use crate::model::{ModelError, ModelSlot};

use super::PipelineError;

/// Column of the classifier output holding the "cough present" probability.
const POSITIVE_CLASS: usize = 1;

// ---------------------------------------------------------------------------
// CoughVerdict
// ---------------------------------------------------------------------------

/// What the caller should do with a recording, given its confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoughVerdict {
    /// No cough heard.
    NoCough,
    /// Possibly a cough; ask the user to record again.
    WeakRetry,
    /// Cough detected.
    Accepted,
}

impl CoughVerdict {
    /// Band `confidence` using the configured thresholds.
    ///
    /// ```
    /// use cough_screen::config::DetectionConfig;
    /// use cough_screen::pipeline::CoughVerdict;
    ///
    /// let bands = DetectionConfig::default();
    /// assert_eq!(CoughVerdict::from_confidence(0.1, &bands), CoughVerdict::NoCough);
    /// assert_eq!(CoughVerdict::from_confidence(0.2, &bands), CoughVerdict::WeakRetry);
    /// assert_eq!(CoughVerdict::from_confidence(0.55, &bands), CoughVerdict::Accepted);
    /// ```
    pub fn from_confidence(confidence: f64, thresholds: &DetectionConfig) -> Self {
        if confidence >= thresholds.accept_at {
            CoughVerdict::Accepted
        } else if confidence >= thresholds.no_cough_below {
            CoughVerdict::WeakRetry
        } else {
            CoughVerdict::NoCough
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CoughVerdict::NoCough => "No cough detected",
            CoughVerdict::WeakRetry => "Weak cough, please retry",
            CoughVerdict::Accepted => "Cough detected",
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Result of classifying one recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Probability that the recording contains a cough, in `[0, 1]`.
    pub confidence: f64,
    pub verdict: CoughVerdict,
    /// Why the confidence is the `0.0` sentinel, when it is.
    pub diagnostic: Option<String>,
}

impl Classification {
    pub fn new(confidence: f64, thresholds: &DetectionConfig) -> Self {
        Self {
            confidence,
            verdict: CoughVerdict::from_confidence(confidence, thresholds),
            diagnostic: None,
        }
    }

    /// The `0.0` stand-in returned when classification failed.
    pub fn sentinel(diagnostic: impl Into<String>) -> Self {
        Self {
            confidence: 0.0,
            verdict: CoughVerdict::NoCough,
            diagnostic: Some(diagnostic.into()),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.diagnostic.is_some()
    }
}

// ---------------------------------------------------------------------------
// MemoCache
// ---------------------------------------------------------------------------

/// Cache key: the in-process content hash together with the recording's
/// shape, so a hash collision alone cannot alias two recordings of
/// different length, rate or layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct MemoKey {
    hash: u64,
    samples: usize,
    sample_rate: u32,
    channels: u16,
}

impl MemoKey {
    fn of(audio: &RawAudio) -> Self {
        Self {
            hash: audio.content_hash(),
            samples: audio.samples.len(),
            sample_rate: audio.sample_rate,
            channels: audio.channels,
        }
    }
}

/// Bounded confidence cache with first-in first-out eviction.
#[derive(Debug)]
struct MemoCache {
    capacity: usize,
    entries: HashMap<MemoKey, f64>,
    order: VecDeque<MemoKey>,
}

impl MemoCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    fn get(&self, key: MemoKey) -> Option<f64> {
        self.entries.get(&key).copied()
    }

    fn insert(&mut self, key: MemoKey, confidence: f64) {
        if self.entries.insert(key, confidence).is_some() {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

// ---------------------------------------------------------------------------
// CoughDetectionPipeline
// ---------------------------------------------------------------------------

/// Classifies recordings as cough / no cough.
///
/// ```rust
/// use std::sync::Arc;
/// use cough_screen::audio::RawAudio;
/// use cough_screen::model::ModelSlot;
/// use cough_screen::pipeline::CoughDetectionPipeline;
///
/// // No model installed: classification degrades to the sentinel.
/// let pipeline = CoughDetectionPipeline::new(Arc::new(ModelSlot::new()));
/// let result = pipeline.classify(&RawAudio::mono(vec![0.0; 44_100], 44_100));
/// assert_eq!(result.confidence, 0.0);
/// assert!(result.diagnostic.is_some());
/// ```
#[derive(Debug)]
pub struct CoughDetectionPipeline {
    model: Arc<ModelSlot>,
    preprocessor: SignalPreprocessor,
    extractor: FeatureExtractor,
    thresholds: DetectionConfig,
    cache: Option<Mutex<MemoCache>>,
}

impl CoughDetectionPipeline {
    /// Pipeline with default preprocessing, bands and thresholds.
    pub fn new(model: Arc<ModelSlot>) -> Self {
        let thresholds = DetectionConfig::default();
        Self {
            model,
            preprocessor: SignalPreprocessor::default(),
            extractor: FeatureExtractor::detection(),
            cache: Self::make_cache(thresholds.cache_capacity),
            thresholds,
        }
    }

    /// Pipeline configured from the `preprocess`, `features` and
    /// `detection` sections.
    pub fn from_config(config: &AppConfig, model: Arc<ModelSlot>) -> Result<Self, PipelineError> {
        let extractor =
            FeatureExtractor::new(config.features.bands.clone(), &FeatureFamily::DETECTION)?;
        Ok(Self {
            model,
            preprocessor: SignalPreprocessor::new(config.preprocess),
            extractor,
            cache: Self::make_cache(config.detection.cache_capacity),
            thresholds: config.detection.clone(),
        })
    }

    fn make_cache(capacity: usize) -> Option<Mutex<MemoCache>> {
        (capacity > 0).then(|| Mutex::new(MemoCache::new(capacity)))
    }

    pub fn thresholds(&self) -> &DetectionConfig {
        &self.thresholds
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Number of memoized confidences (always `0` with the cache disabled).
    pub fn cached_len(&self) -> usize {
        self.cache
            .as_ref()
            .and_then(|c| c.lock().ok().map(|c| c.len()))
            .unwrap_or(0)
    }

    /// Classify `audio`, downgrading every failure to the `0.0` sentinel.
    pub fn classify(&self, audio: &RawAudio) -> Classification {
        match self.try_classify(audio) {
            Ok(confidence) => Classification::new(confidence, &self.thresholds),
            Err(e) => {
                log::error!("cough detection failed: {e}");
                Classification::sentinel(e.to_string())
            }
        }
    }

    /// Positive-class probability for `audio`.
    pub fn try_classify(&self, audio: &RawAudio) -> Result<f64, PipelineError> {
        let key = MemoKey::of(audio);
        if let Some(hit) = self.cached(key) {
            log::debug!("cough detection: cache hit {:016x}", key.hash);
            return Ok(hit);
        }

        let context = self.model.get()?;
        let preprocessed = self.preprocessor.process(audio)?;
        let features = self.extractor.extract(&preprocessed)?;
        let confidence = context.class_probability(features.into_values(), POSITIVE_CLASS)?;

        if !(0.0..=1.0).contains(&confidence) {
            return Err(ModelError::Inference(format!(
                "probability {confidence} is outside [0, 1]"
            ))
            .into());
        }

        log::debug!("cough detection: confidence {confidence:.3}");
        self.remember(key, confidence);
        Ok(confidence)
    }

    fn cached(&self, key: MemoKey) -> Option<f64> {
        let cache = self.cache.as_ref()?;
        cache.lock().ok()?.get(key)
    }

    fn remember(&self, key: MemoKey, confidence: f64) {
        if let Some(cache) = &self.cache {
            match cache.lock() {
                Ok(mut c) => c.insert(key, confidence),
                Err(e) => log::warn!("cough detection: memo cache poisoned: {e}"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
