use std::hint::black_box;
use bencher::{TestCase, TestFile};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use micro_multipart::codec::MultipartDecoder;
use micro_multipart::DEFAULT_MAX_HEADERS_SIZE;
use tokio_util::bytes::BytesMut;
use tokio_util::codec::Decoder;

static SMALL_FORM: TestFile = TestFile::new("small_form.txt", "XYZ", include_str!("../resources/form/small_form.txt"));
static LARGE_FORM: TestFile = TestFile::new(
    "large_form.txt",
    "---------------------------9051914041544843365972754266",
    include_str!("../resources/form/large_form.txt"),
);

fn create_test_cases() -> Vec<TestCase> {
    vec![TestCase::small("small_form_decoder", SMALL_FORM), TestCase::large("large_form_decoder", LARGE_FORM)]
}

fn benchmark_multipart_decoder(criterion: &mut Criterion) {
    let test_cases = create_test_cases();
    let mut group = criterion.benchmark_group("multipart_decoder");

    for case in test_cases {
        let wire_bytes = case.file().wire_bytes();
        group.throughput(Throughput::Bytes(wire_bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            b.iter_batched_ref(
                || (MultipartDecoder::new(case.file().boundary(), DEFAULT_MAX_HEADERS_SIZE), BytesMut::from(&wire_bytes[..])),
                |(decoder, bytes_mut)| {
                    let mut tokens = 0usize;
                    while let Some(token) = decoder.decode_eof(bytes_mut).expect("input should be a valid multipart body") {
                        black_box(token);
                        tokens += 1;
                    }
                    assert!(decoder.is_disposed(), "{} should end with the final boundary", case.file().file_name());
                    black_box(tokens);
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(decoder, benchmark_multipart_decoder);
criterion_main!(decoder);
