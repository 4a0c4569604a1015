// ABOUTME: Micro-benchmarks for PDU encode and decode hot paths

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use smpp34::codec::{Encodable, Pdu};
use smpp34::datatypes::*;

fn sample_submit_sm() -> SubmitSm {
    SubmitSm {
        sequence_number: 1,
        source_addr_ton: TypeOfNumber::International,
        source_addr_npi: NumericPlanIndicator::Isdn,
        source_addr: "12345".parse().unwrap(),
        dest_addr_ton: TypeOfNumber::International,
        dest_addr_npi: NumericPlanIndicator::Isdn,
        destination_addr: "67890".parse().unwrap(),
        short_message: b"Hello World".to_vec(),
        ..SubmitSm::default()
    }
}

fn sample_bind_transceiver() -> BindTransceiver {
    BindTransceiver {
        sequence_number: 1,
        system_id: "test_system".parse().unwrap(),
        password: "password".parse().unwrap(),
        interface_version: InterfaceVersion::SmppV34,
        ..BindTransceiver::default()
    }
}

fn bench_encode(c: &mut Criterion) {
    let submit = sample_submit_sm();
    let bind = sample_bind_transceiver();
    let enquire = EnquireLink::new(1);

    c.bench_function("encode_submit_sm", |b| {
        b.iter(|| black_box(&submit).to_bytes().unwrap())
    });
    c.bench_function("encode_bind_transceiver", |b| {
        b.iter(|| black_box(&bind).to_bytes().unwrap())
    });
    c.bench_function("encode_enquire_link", |b| {
        b.iter(|| black_box(&enquire).to_bytes().unwrap())
    });
}

fn bench_decode(c: &mut Criterion) {
    let submit = sample_submit_sm().to_bytes().unwrap();
    let bind = sample_bind_transceiver().to_bytes().unwrap();
    let enquire = EnquireLink::new(1).to_bytes().unwrap();

    c.bench_function("decode_submit_sm", |b| {
        b.iter(|| Pdu::from_bytes(black_box(&submit)).unwrap())
    });
    c.bench_function("decode_bind_transceiver", |b| {
        b.iter(|| Pdu::from_bytes(black_box(&bind)).unwrap())
    });
    c.bench_function("decode_enquire_link", |b| {
        b.iter(|| Pdu::from_bytes(black_box(&enquire)).unwrap())
    });
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
