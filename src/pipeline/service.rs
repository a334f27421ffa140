//! Async front for [`CoughDetectionPipeline`].
//!
//! [`ClassificationService`] bounds how many recordings are classified at
//! once, runs each one on tokio's blocking pool and enforces a caller-side
//! deadline.
//!
//! # Request flow
//!
//! ```text
//! classify(audio)
//!   └─▶ RecordingQuality::check           [reject → sentinel]
//!   └─▶ timeout(
//!         acquire permit                  [Semaphore(workers)]
//!         └─▶ spawn_blocking(pipeline.try_classify)
//!       )                                  [elapsed → sentinel]
//! ```
//!
//! The permit moves into the blocking task, so a request that outlives its
//! deadline still holds its worker slot until the computation finishes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::audio::{RawAudio, RecordingQuality};
use crate::config::ServiceConfig;

use super::detector::{Classification, CoughDetectionPipeline};
use super::PipelineError;

// ---------------------------------------------------------------------------
// ClassificationService
// ---------------------------------------------------------------------------

/// Bounded, deadline-aware classification worker pool.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use cough_screen::audio::RawAudio;
/// use cough_screen::config::ServiceConfig;
/// use cough_screen::model::ModelSlot;
/// use cough_screen::pipeline::{ClassificationService, CoughDetectionPipeline};
///
/// # async fn example() {
/// let pipeline = Arc::new(CoughDetectionPipeline::new(Arc::new(ModelSlot::new())));
/// let service = ClassificationService::new(pipeline, &ServiceConfig::default());
/// let result = service.classify(RawAudio::mono(vec![0.0; 44_100], 44_100)).await;
/// println!("{:.2} ({})", result.confidence, result.verdict.label());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ClassificationService {
    pipeline: Arc<CoughDetectionPipeline>,
    permits: Arc<Semaphore>,
    workers: usize,
    timeout: Duration,
    review: RecordingQuality,
}

impl ClassificationService {
    pub fn new(pipeline: Arc<CoughDetectionPipeline>, config: &ServiceConfig) -> Self {
        let workers = config.worker_count();
        log::info!(
            "classification service: {workers} workers, {} ms timeout",
            config.timeout_ms
        );
        Self {
            pipeline,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            timeout: Duration::from_millis(config.timeout_ms),
            review: RecordingQuality::new(config.min_recording_secs, config.max_recording_secs),
        }
    }

    /// Maximum number of concurrent classifications.
    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn pipeline(&self) -> &Arc<CoughDetectionPipeline> {
        &self.pipeline
    }

    /// Classify `audio`; every failure resolves to the sentinel.
    pub async fn classify(&self, audio: RawAudio) -> Classification {
        match self.try_classify(audio).await {
            Ok(confidence) => Classification::new(confidence, self.pipeline.thresholds()),
            Err(e @ PipelineError::Rejected(_)) => {
                log::warn!("classification service: {e}");
                Classification::sentinel(e.to_string())
            }
            Err(e) => {
                log::error!("classification service: {e}");
                Classification::sentinel(e.to_string())
            }
        }
    }

    /// Positive-class probability for `audio`, or the reason there is none.
    pub async fn try_classify(&self, audio: RawAudio) -> Result<f64, PipelineError> {
        self.review.check(&audio)?;

        let timeout_ms = self.timeout.as_millis() as u64;
        match tokio::time::timeout(self.timeout, self.run(audio)).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout { timeout_ms }),
        }
    }

    async fn run(&self, audio: RawAudio) -> Result<f64, PipelineError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| PipelineError::Internal(e.to_string()))?;

        let pipeline = Arc::clone(&self.pipeline);
        let joined = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            pipeline.try_classify(&audio)
        })
        .await;

        match joined {
            Ok(result) => result,
            Err(e) => Err(PipelineError::Internal(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::QualityIssue;
    use crate::model::{
        FeatureMatrix, IdentityScaler, InferenceContext, ModelError, ModelSlot,
        ProbabilisticClassifier,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Sleeps, records how many calls overlap, then answers `0.8`.
    struct SlowModel {
        delay: Duration,
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl ProbabilisticClassifier for SlowModel {
        fn predict_probability(&self, features: &FeatureMatrix) -> Result<FeatureMatrix, ModelError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.active.fetch_sub(1, Ordering::SeqCst);
            FeatureMatrix::new(features.rows(), 2, vec![0.2, 0.8].repeat(features.rows()))
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn service(delay_ms: u64, config: ServiceConfig) -> (ClassificationService, Arc<AtomicUsize>) {
        let peak = Arc::new(AtomicUsize::new(0));
        let model = SlowModel {
            delay: Duration::from_millis(delay_ms),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::clone(&peak),
        };
        let slot = Arc::new(ModelSlot::loaded(InferenceContext::new(IdentityScaler, model)));
        let mut app = crate::config::AppConfig::default();
        app.detection.cache_capacity = 0;
        let pipeline = CoughDetectionPipeline::from_config(&app, slot).unwrap();
        (ClassificationService::new(Arc::new(pipeline), &config), peak)
    }

    /// One second of a low tone at 44.1 kHz, varied by `seed` so no two
    /// recordings hash alike.
    fn recording(seed: usize) -> RawAudio {
        let samples = (0..44_100)
            .map(|i| {
                let t = i as f32 / 44_100.0;
                0.3 * (2.0 * std::f32::consts::PI * (200.0 + seed as f32) * t).sin()
            })
            .collect();
        RawAudio::mono(samples, 44_100)
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn classifies_through_blocking_pool() {
        let (svc, _) = service(0, ServiceConfig::default());
        let out = svc.classify(recording(0)).await;
        assert_eq!(out.confidence, 0.8, "{:?}", out.diagnostic);
        assert!(!out.is_sentinel());
    }

    #[tokio::test]
    async fn short_recording_is_rejected_before_processing() {
        let (svc, peak) = service(0, ServiceConfig::default());
        let short = RawAudio::mono(vec![0.1; 4_410], 44_100);

        let err = svc.try_classify(short.clone()).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Rejected(QualityIssue::TooShort { .. })
        ));
        let out = svc.classify(short).await;
        assert_eq!(out.confidence, 0.0);
        assert!(out.diagnostic.unwrap().contains("too short"));
        assert_eq!(peak.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn long_recording_is_rejected() {
        let (svc, _) = service(0, ServiceConfig::default());
        let long = RawAudio::mono(vec![0.1; 44_100 * 11], 44_100);
        assert!(matches!(
            svc.try_classify(long).await,
            Err(PipelineError::Rejected(QualityIssue::TooLong { .. }))
        ));
    }

    #[tokio::test]
    async fn stereo_duration_is_measured_in_frames() {
        let (svc, peak) = service(0, ServiceConfig::default());
        // 0.4 s of stereo: long enough only if channels were counted twice.
        let stereo = RawAudio::new(vec![0.1; 35_280], 44_100, 2);
        assert!(matches!(
            svc.try_classify(stereo).await,
            Err(PipelineError::Rejected(QualityIssue::TooShort { .. }))
        ));
        assert_eq!(peak.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn slow_model_times_out_to_sentinel() {
        let config = ServiceConfig {
            timeout_ms: 20,
            ..ServiceConfig::default()
        };
        let (svc, _) = service(300, config);

        let err = svc.try_classify(recording(1)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Timeout { timeout_ms: 20 }));

        let out = svc.classify(recording(2)).await;
        assert_eq!(out.confidence, 0.0);
        assert!(out.diagnostic.unwrap().contains("timed out"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrency_is_bounded_by_worker_count() {
        let config = ServiceConfig {
            workers: Some(2),
            ..ServiceConfig::default()
        };
        let (svc, peak) = service(50, config);
        assert_eq!(svc.workers(), 2);
        let svc = Arc::new(svc);

        let handles: Vec<_> = (0..6)
            .map(|seed| {
                let svc = Arc::clone(&svc);
                tokio::spawn(async move { svc.classify(recording(seed)).await })
            })
            .collect();

        for handle in handles {
            let out = handle.await.unwrap();
            assert_eq!(out.confidence, 0.8, "{:?}", out.diagnostic);
        }
        let observed = peak.load(Ordering::SeqCst);
        assert!((1..=2).contains(&observed), "peak concurrency {observed}");
    }
}
