//! Throughput of command interpretation
//!
//! Run with: cargo bench

use bed_usage::interpreter::{parse_words, CommandInterpreter};
use bed_usage::SessionAccumulator;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Generate a sliced-looking job with the given number of layers
fn generate_gcode(layers: usize, moves_per_layer: usize) -> Vec<String> {
    let mut lines = vec![
        "M140 S60".to_string(),
        "M190 S60".to_string(),
        "M104 S210".to_string(),
        "G28".to_string(),
        "M82".to_string(),
    ];

    let mut e = 0.0f64;
    for layer in 0..layers {
        lines.push(format!(";LAYER:{}", layer));
        lines.push(format!("G0 Z{:.2}", 0.2 * (layer + 1) as f64));
        for i in 0..moves_per_layer {
            e += 0.05;
            lines.push(format!("G1 X{:.3} Y{:.3} E{:.5} ; perimeter", i as f64 * 0.5, layer as f64, e));
        }
        lines.push("M106 S255".to_string());
    }

    lines
}

fn bench_interpreter(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpreter");

    for layers in [10, 100] {
        let lines = generate_gcode(layers, 200);
        group.bench_with_input(BenchmarkId::new("process", layers), &lines, |b, lines| {
            b.iter(|| {
                let mut interpreter = CommandInterpreter::new();
                let mut cumulative = 0.0;
                for line in lines {
                    if let Ok(Some(delta)) = interpreter.process(black_box(line), cumulative) {
                        cumulative += delta.material;
                    }
                }
                cumulative
            })
        });
    }

    group.finish();
}

fn bench_session(c: &mut Criterion) {
    let lines = generate_gcode(50, 200);

    c.bench_function("session_handle_command", |b| {
        b.iter(|| {
            let session = SessionAccumulator::new();
            for line in &lines {
                let _ = session.handle_command(black_box(line));
            }
            session.flush_pending()
        })
    });
}

fn bench_parse_words(c: &mut Criterion) {
    c.bench_function("parse_words", |b| {
        b.iter(|| parse_words(black_box("G1 X120.512 Y87.003 Z0.3 E1.23456 F1800 ; infill")))
    });
}

criterion_group!(benches, bench_interpreter, bench_session, bench_parse_words);
criterion_main!(benches);
