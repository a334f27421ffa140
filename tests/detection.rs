//! End-to-end checks of the public cough-detection API.

use std::f64::consts::PI;
use std::sync::Arc;

use cough_screen::audio::{
    segment_cough, MicrophoneQuality, PreprocessConfig, RawAudio, SegmentationParams,
    SignalPreprocessor,
};
use cough_screen::config::{AppConfig, ServiceConfig};
use cough_screen::features::{extract_features, FeatureExtractor};
use cough_screen::model::{
    FeatureMatrix, IdentityScaler, InferenceContext, ModelError, ModelSlot,
    ProbabilisticClassifier,
};
use cough_screen::pipeline::{ClassificationService, CoughDetectionPipeline, CoughVerdict};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `1.0` when the `rms_power` feature exceeds `0.01`, else `0.0`.
struct RmsGate {
    index: usize,
}

impl RmsGate {
    fn new() -> Self {
        let index = FeatureExtractor::detection()
            .feature_names()
            .iter()
            .position(|n| n == "rms_power")
            .expect("rms_power is a detection feature");
        Self { index }
    }
}

impl ProbabilisticClassifier for RmsGate {
    fn predict_probability(&self, x: &FeatureMatrix) -> Result<FeatureMatrix, ModelError> {
        let data = (0..x.rows())
            .flat_map(|r| {
                let p = if x.row(r)[self.index] > 0.01 { 1.0 } else { 0.0 };
                [1.0 - p, p]
            })
            .collect();
        FeatureMatrix::new(x.rows(), 2, data)
    }
}

fn loaded_slot() -> Arc<ModelSlot> {
    Arc::new(ModelSlot::loaded(InferenceContext::new(
        IdentityScaler,
        RmsGate::new(),
    )))
}

/// One and a half seconds at 44.1 kHz with a cough-like burst at 0.5 s.
fn cough_recording() -> RawAudio {
    let fs = 44_100.0;
    let samples = (0..66_150)
        .map(|i| {
            let t = i as f64 / fs;
            if (0.5..0.8).contains(&t) {
                let local = t - 0.5;
                let envelope = (-local * 10.0).exp();
                (0.7 * envelope
                    * ((2.0 * PI * 300.0 * t).sin() + 0.4 * (2.0 * PI * 1_700.0 * t).sin()))
                    as f32
            } else {
                0.0
            }
        })
        .collect();
    RawAudio::mono(samples, 44_100)
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

#[test]
fn zero_recording_preprocesses_to_zero_at_target_rate() {
    let out = SignalPreprocessor::default()
        .process(&RawAudio::mono(vec![0.0; 30_000], 44_100))
        .unwrap();
    assert_eq!(out.sample_rate, 12_000);
    assert_eq!(out.samples.len(), 10_000);
    assert!(out.samples.iter().all(|&s| s == 0.0));
}

#[test]
fn decimated_length_is_ceiling_of_a_third() {
    let pre = SignalPreprocessor::new(PreprocessConfig::default());
    for n in [44_100, 44_101, 44_102] {
        let out = pre.process(&RawAudio::mono(vec![0.1; n], 44_100)).unwrap();
        assert_eq!(out.samples.len(), n.div_ceil(3), "n = {n}");
    }
}

#[test]
fn stereo_is_downmixed_before_processing() {
    let stereo: Vec<f32> = (0..44_100).flat_map(|_| [0.25, -0.25]).collect();
    let out = SignalPreprocessor::default()
        .process(&RawAudio::new(stereo, 44_100, 2))
        .unwrap();
    assert_eq!(out.samples.len(), 14_700);
    assert!(out.samples.iter().all(|s| s.abs() < 1e-6));
}

// ---------------------------------------------------------------------------
// Segmentation
// ---------------------------------------------------------------------------

#[test]
fn one_burst_one_padded_segment() {
    let fs = 16_000;
    let mut audio = vec![0.0_f32; 32_000];
    audio[10_000..14_000].iter_mut().for_each(|s| *s = 0.6);

    let seg = segment_cough(&audio, fs, &SegmentationParams::default()).unwrap();
    assert_eq!(seg.segments.len(), 1);
    let s = seg.segments[0];
    // 0.2 s padding = 3200 samples; 10 ms tolerance = 160 samples.
    assert_eq!(s.start, 10_000 - 3_200);
    assert_eq!(s.end, 14_000 + 160 + 3_200);
    assert!(seg.mask[s.start] && seg.mask[s.end]);
    assert!(!seg.mask[s.start - 1] && !seg.mask[s.end + 1]);
}

#[test]
fn quiet_noise_has_no_segments() {
    let audio: Vec<f32> = (0..16_000)
        .map(|i| 0.02 * ((i as f32 * 12.9898).sin() * 43_758.547).fract())
        .collect();
    let seg = segment_cough(&audio, 16_000, &SegmentationParams::default()).unwrap();
    assert!(seg.segments.is_empty());
    assert!(seg.mask.iter().all(|&m| !m));
}

// ---------------------------------------------------------------------------
// Features
// ---------------------------------------------------------------------------

#[test]
fn feature_layout_is_independent_of_duration() {
    let short = extract_features(&cough_recording()).unwrap();
    let mut longer = cough_recording();
    longer.samples.extend(vec![0.0; 44_100]);
    let long = extract_features(&longer).unwrap();

    assert_eq!(short.names(), long.names());
    assert_eq!(short.len(), FeatureExtractor::detection().len());
    assert_eq!(short.len(), 68);
    assert!(short.values().iter().all(|v| v.is_finite()));
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[test]
fn zero_recording_classifies_to_finite_value() {
    for slot in [Arc::new(ModelSlot::new()), loaded_slot()] {
        let pipeline = CoughDetectionPipeline::new(slot);
        let out = pipeline.classify(&RawAudio::mono(vec![0.0; 44_100], 44_100));
        assert!(out.confidence.is_finite());
        assert_eq!(out.confidence, 0.0);
        assert_eq!(out.verdict, CoughVerdict::NoCough);
    }
}

#[test]
fn rms_gate_separates_cough_from_silence() {
    let pipeline = CoughDetectionPipeline::new(loaded_slot());

    let cough = pipeline.classify(&cough_recording());
    assert_eq!(cough.confidence, 1.0, "{:?}", cough.diagnostic);
    assert_eq!(cough.verdict, CoughVerdict::Accepted);

    let silence = pipeline.classify(&RawAudio::mono(vec![0.0; 66_150], 44_100));
    assert_eq!(silence.confidence, 0.0);
}

#[test]
fn configured_pipeline_memoizes_results() {
    let mut config = AppConfig::default();
    config.detection.cache_capacity = 4;
    let pipeline = CoughDetectionPipeline::from_config(&config, loaded_slot()).unwrap();

    let audio = cough_recording();
    let first = pipeline.classify(&audio);
    let second = pipeline.classify(&audio);
    assert_eq!(first, second);
    assert_eq!(pipeline.cached_len(), 1);
}

#[tokio::test]
async fn service_rejects_short_clips_and_classifies_the_rest() {
    let pipeline = Arc::new(CoughDetectionPipeline::new(loaded_slot()));
    let service = ClassificationService::new(pipeline, &ServiceConfig::default());

    let short = service
        .classify(RawAudio::mono(vec![0.5; 1_000], 44_100))
        .await;
    assert_eq!(short.confidence, 0.0);
    assert!(short.is_sentinel());

    let cough = service.classify(cough_recording()).await;
    assert_eq!(cough.confidence, 1.0, "{:?}", cough.diagnostic);
}

// ---------------------------------------------------------------------------
// Recording review
// ---------------------------------------------------------------------------

#[test]
fn microphone_grades_follow_sample_rate() {
    assert_eq!(MicrophoneQuality::from_sample_rate(8_000), MicrophoneQuality::Poor);
    assert_eq!(MicrophoneQuality::from_sample_rate(16_000), MicrophoneQuality::Poor);
    assert_eq!(MicrophoneQuality::from_sample_rate(22_050), MicrophoneQuality::Fair);
    assert_eq!(MicrophoneQuality::from_sample_rate(22_100), MicrophoneQuality::Fair);
    assert_eq!(MicrophoneQuality::from_sample_rate(44_100), MicrophoneQuality::Good);
}
