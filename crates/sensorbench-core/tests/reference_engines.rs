//! Reference engine and precision validation tests
//!
//! Exercise the CPU reference engines end to end on generated data, and the
//! software backend against them.

use sensorbench_core::fft::dft_magnitudes;
use sensorbench_core::validation::{
    compare_fft, run_precision_sweep, validate_fft, validate_mad, SweepConfig,
};
use sensorbench_core::{
    build_fft_input, compute_mad, generate, readings_from_channel, select_backend, BackendConfig,
    BackendKind, DefaultBackendFactory, ErrorMetricsAccumulator, FftCpuProcessor, MemorySink,
    Verdict,
};
use std::f32::consts::PI;

#[test]
fn pure_tone_concentrates_in_one_bin() {
    let n = 1024;
    let k = 37;
    #[allow(clippy::cast_precision_loss)]
    let signal: Vec<f32> = (0..n)
        .map(|i| (2.0 * PI * k as f32 * i as f32 / n as f32).sin())
        .collect();
    let weights = vec![vec![1.0; n / 2 + 1]];

    let mut fft = FftCpuProcessor::new(1, n).unwrap();
    let out = fft.process(&[signal], &weights).unwrap();

    let energy: f64 = out.magnitudes[0].iter().map(|&m| f64::from(m).powi(2)).sum();
    let peak = f64::from(out.magnitudes[0][k]).powi(2);
    assert!(peak / energy > 0.95, "peak share {}", peak / energy);
    assert!((out.magnitudes[0][k] - 512.0).abs() < 0.5);
}

#[test]
fn reference_matches_direct_dft() {
    let batch = generate(1, 48, 7).unwrap();
    let input = build_fft_input(&batch, 48).unwrap();
    let mut fft = FftCpuProcessor::new(1, 48).unwrap();
    let out = fft.process(&input.samples, &input.weights).unwrap();

    let direct = dft_magnitudes(&input.samples[0]);
    assert_eq!(direct.len(), out.magnitudes[0].len());
    for (bin, (&expected, &got)) in direct.iter().zip(&out.magnitudes[0]).enumerate() {
        let tol = 1e-4 * expected.max(1.0);
        assert!(
            (expected - f64::from(got)).abs() <= tol,
            "bin {bin}: {expected} vs {got}"
        );
    }
}

#[test]
fn mad_matches_manual_block_reduction() {
    // 20 ms steps: 250 readings per 5 s window, the last window partial
    let batch = generate(1, 4096, 1234).unwrap();
    let readings = readings_from_channel(&batch.channels[0]);
    let result = compute_mad(&readings);

    #[allow(clippy::cast_precision_loss)]
    let blocks: Vec<f64> = readings
        .chunks(250)
        .map(|c| c.iter().map(|r| r.magnitude).sum::<f64>() / c.len() as f64)
        .collect();
    assert_eq!(blocks.len(), 17);

    #[allow(clippy::cast_precision_loss)]
    let n = blocks.len() as f64;
    let mean = blocks.iter().sum::<f64>() / n;
    let std = (blocks.iter().map(|b| (b - mean).powi(2)).sum::<f64>() / n).sqrt();
    let min = blocks.iter().copied().fold(f64::INFINITY, f64::min);
    let max = blocks.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    assert!((result.mean - mean).abs() < 1e-6);
    assert!((result.std_dev - std).abs() < 1e-6);
    assert!((result.min - min).abs() < 1e-6);
    assert!((result.max - max).abs() < 1e-6);

    let again = compute_mad(&readings_from_channel(&generate(1, 4096, 1234).unwrap().channels[0]));
    assert_eq!(result, again);
}

#[test]
fn software_backend_fft_within_tolerance() {
    let batch = generate(4, 4096, 99).unwrap();
    let input = build_fft_input(&batch, 4096).unwrap();
    let mut backend = select_backend(&BackendConfig::new(BackendKind::Software, 4, 4096)).unwrap();
    let mut reference = FftCpuProcessor::new(4, 4096).unwrap();

    let record = validate_fft(backend.as_mut(), &mut reference, &input).unwrap();
    backend.close();

    assert_eq!(record.backend, BackendKind::Software);
    assert_eq!(record.verdict, Verdict::Pass);
    assert!(record.metrics.max_relative_error < 1e-2, "{:?}", record.metrics);
}

#[test]
fn software_backend_mad_within_tolerance() {
    let batch = generate(1, 16_384, 5).unwrap();
    let mut backend =
        select_backend(&BackendConfig::new(BackendKind::Software, 1, 16_384)).unwrap();
    let record = validate_mad(backend.as_mut(), &batch.channels[0]).unwrap();
    backend.close();

    assert_eq!(record.verdict, Verdict::Pass);
    assert!(record.relative_mean < 1e-4);
    assert!(record.absolute_min < 1.0);
}

#[test]
fn streamed_comparison_equals_materialized_accumulation() {
    let batch = generate(3, 2048, 17).unwrap();
    let input = build_fft_input(&batch, 2048).unwrap();
    let mut backend = select_backend(&BackendConfig::new(BackendKind::Software, 3, 2048)).unwrap();
    let candidate = backend.process_fft(&input).unwrap().value;

    let mut reference = FftCpuProcessor::new(3, 2048).unwrap();
    let streamed = compare_fft(&mut reference, &input, &candidate).unwrap();

    let full = reference.process(&input.samples, &input.weights).unwrap();
    let flat_ref: Vec<f32> = full.weighted_magnitudes.concat();
    let flat_cand: Vec<f32> = candidate.weighted_magnitudes.concat();
    let mut acc = ErrorMetricsAccumulator::new();
    acc.consume(&flat_ref, &flat_cand).unwrap();
    let materialized = acc.build();

    assert!((streamed.max_relative_error - materialized.max_relative_error).abs() < 1e-12);
    assert!((streamed.max_absolute_error - materialized.max_absolute_error).abs() < 1e-9);
    assert!((streamed.rmse - materialized.rmse).abs() < 1e-9);
}

#[test]
fn precision_sweep_records_every_run() {
    let config = SweepConfig::default()
        .with_lengths(vec![512, 1024])
        .with_repeats(2)
        .with_num_channels(2);
    let mut sink = MemorySink::default();

    let stats = run_precision_sweep(&DefaultBackendFactory, &config, &mut sink).unwrap();

    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].signal_length, 512);
    assert_eq!(stats[1].repeats, 2);
    assert_eq!(sink.precision.len(), 4);
    assert_eq!(
        sink.precision.iter().map(|r| r.run_index).collect::<Vec<_>>(),
        vec![0, 1, 0, 1]
    );
    assert!(sink.precision.iter().all(|r| r.verdict == Verdict::Pass));
}

#[test]
fn precision_sweep_reports_unavailable_backend() {
    let config = SweepConfig::default()
        .with_backend(BackendKind::Npu)
        .with_lengths(vec![512]);
    let err = run_precision_sweep(&DefaultBackendFactory, &config, &mut MemorySink::default())
        .unwrap_err();
    assert!(err.is_backend_failure());
}
