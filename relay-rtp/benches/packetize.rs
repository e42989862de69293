use bytes::Bytes;
use criterion::{criterion_group, criterion_main, Criterion};
use relay_rtp::fua::fragment_fu_a;
use relay_rtp::header::RtpHeader;
use relay_shared::marshal::{Marshal, Unmarshal};

fn benchmark_rtp_header(c: &mut Criterion) {
    let header = RtpHeader::new(96, 1000, 90000, 0xDEADBEEF, true);
    let raw = header.marshal().unwrap();

    c.bench_function("RtpHeader Marshal", |b| {
        b.iter(|| header.marshal().unwrap())
    });

    c.bench_function("RtpHeader Unmarshal", |b| {
        b.iter(|| {
            let mut buf = raw.clone();
            RtpHeader::unmarshal(&mut buf).unwrap()
        })
    });
}

fn benchmark_fu_a_fragment(c: &mut Criterion) {
    let mut raw = vec![0x65u8];
    raw.extend((0..60_000u32).map(|i| (i % 256) as u8));
    let nalu = Bytes::from(raw);

    c.bench_function("FU-A fragment 60KB NALU", |b| {
        b.iter(|| fragment_fu_a(&nalu, 1200).unwrap())
    });
}

criterion_group!(benches, benchmark_rtp_header, benchmark_fu_a_fragment);
criterion_main!(benches);
