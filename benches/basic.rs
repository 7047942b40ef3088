use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serial_duplex::{
    normalize_port_name, MockOpener, MockSerialPort, Notification, PortConfig, PortSession,
    SessionOptions,
};
use std::hint::black_box;
use std::sync::mpsc::Receiver;
use std::time::Duration;

fn loopback() -> (PortSession, PortSession, Receiver<Notification>) {
    let (a, b) = MockSerialPort::pair("BENCH-A", "BENCH-B");
    let opener = MockOpener::new()
        .with_port("BENCH-A", a)
        .with_port("BENCH-B", b);
    let options = SessionOptions {
        poll_interval: Duration::from_micros(50),
        ..SessionOptions::default()
    };

    let (tx, _tx_events) = PortSession::builder()
        .opener(opener.clone())
        .options(options)
        .build();
    let (rx, rx_events) = PortSession::builder()
        .opener(opener)
        .options(options)
        .build();
    assert!(tx.open("BENCH-A", PortConfig::new(115200)));
    assert!(rx.open("BENCH-B", PortConfig::new(115200)));
    (tx, rx, rx_events)
}

pub fn bench_loopback_round_trip(c: &mut Criterion) {
    let (tx, _rx, events) = loopback();
    let mut group = c.benchmark_group("loopback");

    for size in [16usize, 1024, 4096] {
        let payload = vec![0x5Au8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| {
                tx.send(payload.clone());
                let mut received = 0;
                while received < payload.len() {
                    match events.recv_timeout(Duration::from_secs(1)) {
                        Ok(Notification::DataReceived(chunk)) => received += chunk.len(),
                        other => panic!("unexpected {other:?}"),
                    }
                }
                black_box(received);
            })
        });
    }
    group.finish();
}

pub fn bench_port_names(c: &mut Criterion) {
    c.bench_function("normalize_port_name", |b| {
        b.iter(|| {
            black_box(normalize_port_name(black_box("COM3")));
            black_box(normalize_port_name(black_box("COM128")));
        })
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_millis(300))
        .measurement_time(Duration::from_secs(2));
    targets = bench_loopback_round_trip, bench_port_names
}
criterion_main!(benches);
