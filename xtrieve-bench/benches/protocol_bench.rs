//! Codec and resync benchmarks.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use xtrieve_protocol::{
    Decoder, Encoder, Operation, PositionBlock, Request, Response, StatusCode, SyncScanner,
};

fn create_test_request(data_size: usize) -> Request {
    Request::new(Operation::Insert)
        .with_position_block(PositionBlock::from_bytes([0x11; 128]))
        .with_data(Bytes::from(vec![0x42u8; data_size]))
        .with_key(&b"CUSTOMER0001"[..])
        .with_key_number(0)
}

fn create_test_response(data_size: usize) -> Response {
    Response::new(StatusCode::Success)
        .with_position_block(PositionBlock::from_bytes([0x22; 128]))
        .with_data(Bytes::from(vec![0x42u8; data_size]))
        .with_key(&b"CUSTOMER0001"[..])
}

fn bench_request_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_encode");

    for size in [100, 1000, 10000] {
        let request = create_test_request(size);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &request, |b, request| {
            b.iter(|| black_box(Encoder::encode_request(request).unwrap()));
        });
    }

    group.finish();
}

fn bench_request_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_decode");

    for size in [100, 1000, 10000] {
        let request = create_test_request(size);
        let encoded = Encoder::encode_request(&request).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &encoded, |b, encoded| {
            b.iter(|| {
                let mut decoder = Decoder::new();
                decoder.extend(encoded);
                black_box(decoder.decode_request().unwrap())
            });
        });
    }

    group.finish();
}

fn bench_response_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("response_encode");

    for size in [100, 1000, 10000] {
        let response = create_test_response(size);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(size),
            &response,
            |b, response| {
                b.iter(|| black_box(Encoder::encode_response(response).unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_response_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("response_decode");

    for size in [100, 1000, 10000] {
        let response = create_test_response(size);
        let encoded = Encoder::encode_response(&response).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &encoded, |b, encoded| {
            b.iter(|| {
                let mut decoder = Decoder::new();
                decoder.extend(encoded);
                black_box(decoder.decode_response().unwrap())
            });
        });
    }

    group.finish();
}

/// Byte-at-a-time arrival, as on a slow serial line.
fn bench_request_decode_trickle(c: &mut Criterion) {
    let request = create_test_request(1000);
    let encoded = Encoder::encode_request(&request).unwrap();

    c.bench_function("request_decode_trickle", |b| {
        b.iter(|| {
            let mut decoder = Decoder::new();
            for byte in encoded.iter() {
                decoder.extend(std::slice::from_ref(byte));
                if let Some(request) = decoder.decode_request().unwrap() {
                    return black_box(request);
                }
            }
            unreachable!("frame never completed")
        });
    });
}

fn bench_resync_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("resync_scan");

    for garbage in [16, 1024, 65536] {
        // Noise with lone 0xBB bytes, then the marker.
        let mut line: Vec<u8> = (0..garbage)
            .map(|i| if i % 7 == 0 { 0xBB } else { (i % 128) as u8 })
            .collect();
        line.extend_from_slice(&[0xBB, 0xBB]);

        group.throughput(Throughput::Bytes(line.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(garbage), &line, |b, line| {
            b.iter(|| {
                let mut scanner = SyncScanner::new();
                black_box(scanner.scan(line))
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_request_encode,
    bench_request_decode,
    bench_response_encode,
    bench_response_decode,
    bench_request_decode_trickle,
    bench_resync_scan,
);

criterion_main!(benches);
