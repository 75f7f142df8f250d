#![allow(missing_docs)]

use std::hint::black_box;

use strand_benchmark::{readings, ring, spread_integers};
use strand_integration_test::{Person, Reading, ReadingSerializer, people};
use strand_serialize::{
    Marshaler, MaxLength, Ptr, Session, SliceSerializer, Unmarshaler, Varint,
    from_slice, to_vec,
};

#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn bench_varint(c: &mut criterion::Criterion) {
    let mut group = c.benchmark_group("varint");
    let values = spread_integers(1024);

    let codec = Varint::<u64>::new();

    let mut encoded = Vec::new();
    for value in &values {
        codec.marshal(value, &mut encoded, &mut Session::new()).unwrap();
    }

    group.bench_function("marshal_u64", |b| {
        let mut buffer = Vec::with_capacity(encoded.len());
        b.iter(|| {
            buffer.clear();
            let mut session = Session::new();
            for value in &values {
                codec
                    .marshal(black_box(value), &mut buffer, &mut session)
                    .unwrap();
            }
        });
    });
    group.bench_function("unmarshal_u64", |b| {
        b.iter(|| {
            let mut reader: &[u8] = black_box(&encoded);
            let mut session = Session::new();
            for _ in 0..values.len() {
                let (value, _): (u64, usize) =
                    codec.unmarshal(&mut reader, &mut session).unwrap();
                black_box(value);
            }
        });
    });

    group.finish();
}

fn bench_collections(c: &mut criterion::Criterion) {
    let mut group = c.benchmark_group("collections");

    let numbers = spread_integers(4096);
    let number_codec = SliceSerializer::new(Varint::<u64>::new());
    let number_bytes = to_vec(&number_codec, &numbers).unwrap();

    group.bench_function("slice_to_vec", |b| {
        b.iter(|| to_vec(&number_codec, black_box(&numbers)).unwrap());
    });
    group.bench_function("slice_from_slice", |b| {
        b.iter(|| {
            let (decoded, _): (Vec<u64>, usize) =
                from_slice(&number_codec, black_box(&number_bytes)).unwrap();
            decoded
        });
    });

    let batch = readings(256, 16);
    let reading_codec = SliceSerializer::new(ReadingSerializer::new(32, 64));
    let reading_bytes = to_vec(&reading_codec, &batch).unwrap();

    group.bench_function("validated_readings", |b| {
        b.iter(|| {
            let (decoded, _): (Vec<Reading>, usize) =
                from_slice(&reading_codec, black_box(&reading_bytes)).unwrap();
            decoded
        });
    });

    // the whole batch is rejected and skipped
    let strict_codec = SliceSerializer::new(ReadingSerializer::new(32, 64))
        .with_length_validator(MaxLength(8))
        .recover_with(ReadingSerializer::new(32, 64));

    group.bench_function("rejected_readings", |b| {
        b.iter(|| {
            from_slice::<Vec<Reading>, _>(
                &strict_codec,
                black_box(&reading_bytes),
            )
            .unwrap_err()
        });
    });

    group.finish();
}

fn bench_pointer_graph(c: &mut criterion::Criterion) {
    let mut group = c.benchmark_group("pointer_graph");
    let codec = people();
    let graph = Some(ring(256));
    let bytes = to_vec(&codec, &graph).unwrap();

    group.bench_function("marshal_ring", |b| {
        b.iter(|| to_vec(&codec, black_box(&graph)).unwrap());
    });
    group.bench_function("unmarshal_ring", |b| {
        b.iter(|| {
            let (decoded, _): (Option<Ptr<Person>>, usize) =
                from_slice(&codec, black_box(&bytes)).unwrap();
            decoded
        });
    });

    group.finish();
}

criterion::criterion_group!(
    benches,
    bench_varint,
    bench_collections,
    bench_pointer_graph
);
criterion::criterion_main!(benches);
