use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nestrace_core::cartridge::build_ines;
use nestrace_core::mapper::PRG_BANK_SIZE;
use nestrace_core::system::NesSystem;

fn criterion_config() -> Criterion {
    match std::env::var("NESTRACE_BENCH_PROFILE").as_deref() {
        Ok("ci") => Criterion::default()
            .warm_up_time(Duration::from_millis(150))
            .measurement_time(Duration::from_millis(400))
            .sample_size(20),
        _ => Criterion::default()
            .warm_up_time(Duration::from_secs(1))
            .measurement_time(Duration::from_secs(3))
            .sample_size(50),
    }
}

/// A busy loop touching RAM, the stack and indexed addressing:
///
/// ```text
/// loop: INX; LDA $0200,X; ADC #$01; STA $0200,X; PHA; PLA; JMP loop
/// ```
fn busy_system() -> NesSystem {
    let program = [
        0xE8, 0xBD, 0x00, 0x02, 0x69, 0x01, 0x9D, 0x00, 0x02, 0x48, 0x68, 0x4C, 0x00, 0xC0,
    ];
    let mut prg = vec![0xEA; PRG_BANK_SIZE];
    prg[..program.len()].copy_from_slice(&program);
    prg[0x3FFC] = 0x00;
    prg[0x3FFD] = 0xC0;
    let mut system = NesSystem::new();
    if let Err(e) = system.load_rom(&build_ines(0, 0, &prg, &[])) {
        panic!("bench image rejected: {}", e);
    }
    system.reset();
    system
}

fn bench_frame(c: &mut Criterion) {
    let mut system = busy_system();
    c.bench_function("run_one_frame", |b| {
        b.iter(|| black_box(system.run_one_frame()))
    });

    let mut system = busy_system();
    c.bench_function("trace_line_nestest", |b| {
        b.iter(|| {
            let line = system.trace_line().nestest();
            system.step();
            black_box(line)
        })
    });

    let mut system = busy_system();
    system.enable_profiling();
    c.bench_function("run_one_frame_profiled", |b| {
        b.iter(|| black_box(system.run_one_frame()))
    });
}

criterion_group! {
    name = benches;
    config = criterion_config();
    targets = bench_frame
}
criterion_main!(benches);
