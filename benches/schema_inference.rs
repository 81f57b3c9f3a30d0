use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fastframe::dialect::{self, Dialect, Eol};
use fastframe::options::ReadOptions;
use fastframe::sampler;

fn make_csv(rows: usize, cols: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity(rows * cols * 6);
    for r in 0..rows {
        for c in 0..cols {
            if c > 0 {
                buf.push(b',');
            }
            buf.extend_from_slice((r * cols + c).to_string().as_bytes());
        }
        buf.push(b'\n');
    }
    buf
}

fn comma_dialect() -> Dialect {
    Dialect {
        sep: b',',
        eol: Eol::Lf,
        quote: b'"',
        quote_rule: 0,
        dec: b'.',
    }
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let data = make_csv(1_000_000, 8);
    let opts = ReadOptions::from_bytes(Vec::new());

    c.bench_function("dialect detection on 1M-row file", |b| {
        b.iter(|| dialect::detect(black_box(&data), 0, &opts).unwrap())
    });

    c.bench_function("sample & infer types on 1M-row file", |b| {
        b.iter(|| sampler::sample(black_box(&data), 0, 8, &comma_dialect(), &opts))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
