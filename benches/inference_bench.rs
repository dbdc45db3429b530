use criterion::{black_box, criterion_group, criterion_main, Criterion};

use chrono::Utc;
use ndarray::Array2;
use softsensor::{
    model::{ModelArtifact, RecurrentNet, ScalerParameters, SequenceModel},
    pipeline::{Frame, InferenceEngine},
};

fn bench_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("recurrent_forward");
    for &(inputs, lag) in &[(4usize, 8usize), (8, 16), (16, 32)] {
        let net = RecurrentNet::seeded(inputs, 2, 16, 42);
        let window = Array2::from_shape_fn((lag, inputs), |(i, j)| (i + j) as f64 * 0.1);
        let history = Array2::zeros((lag, 2));
        group.bench_function(format!("in{inputs}_lag{lag}"), |b| {
            b.iter(|| net.forward(black_box(&window), black_box(&history)))
        });
    }
    group.finish();
}

fn bench_engine_step(c: &mut Criterion) {
    let artifact = ModelArtifact::untrained(8, 2, 16, 7);
    let mut engine = InferenceEngine::new(
        Box::new(artifact.net),
        ScalerParameters::identity(8),
        ScalerParameters::identity(2),
        16,
    )
    .unwrap();

    // Warm the window so the steady-state path is measured.
    for seq in 0..16u64 {
        let frame = Frame {
            seq,
            timestamp: Utc::now(),
            values: vec![0.5; 8],
        };
        engine.step(frame);
    }

    let mut seq = 16u64;
    c.bench_function("engine_step_warm", |b| {
        b.iter(|| {
            seq += 1;
            let frame = Frame {
                seq,
                timestamp: Utc::now(),
                values: vec![0.5; 8],
            };
            black_box(engine.step(frame))
        })
    });
}

criterion_group!(benches, bench_forward, bench_engine_step);
criterion_main!(benches);
