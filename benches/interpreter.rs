//! Benchmarks for program decoding, execution and one GA generation.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use brainplus_evolve::{
    compute::evolution::{EvolutionEngine, GenomeRng, ProgramRunner, TargetStringFitness},
    compute::{Interpreter, ProgramDecoder},
    schema::{DecoderConfig, EvolutionConfig, PopulationConfig, VmOptions},
};

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let classic = ProgramDecoder::classic();
    let extended = ProgramDecoder::from_config(&DecoderConfig::extended(4)).unwrap();

    for length in [100, 500, 2000] {
        let genes = GenomeRng::new(1).random_genome(length).genes;

        group.bench_with_input(BenchmarkId::new("classic", length), &genes, |b, genes| {
            b.iter(|| classic.decode(black_box(genes)));
        });
        group.bench_with_input(BenchmarkId::new("extended", length), &genes, |b, genes| {
            b.iter(|| extended.decode(black_box(genes)));
        });
    }

    group.finish();
}

fn bench_interpreter(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpreter");

    let programs = [
        ("hello_cells", "++++++++[>++++++++<-]>+.+.+.+."),
        ("infinite_loop", "+[>+<]"),
        ("function_calls", "++++[>aa<-]>!.@,>,[-<+>]<$@"),
    ];

    for max_instructions in [1000, 10_000] {
        for (name, source) in programs {
            group.bench_with_input(
                BenchmarkId::new(name, max_instructions),
                &max_instructions,
                |b, &max| {
                    b.iter(|| {
                        let mut output = 0u8;
                        let mut vm = Interpreter::new(
                            black_box(source),
                            || 0,
                            |v| output = output.wrapping_add(v),
                            VmOptions::default(),
                        );
                        let _ = vm.run(max);
                        vm.ticks()
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("generation");
    group.sample_size(20);

    for size in [50, 200] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let runner = ProgramRunner::new(ProgramDecoder::classic(), 2000);
                let fitness = TargetStringFitness::new("hi", runner);
                let config = EvolutionConfig {
                    population: PopulationConfig {
                        size,
                        genome_length: 150,
                        max_generations: 1,
                        ..Default::default()
                    },
                    random_seed: Some(42),
                    ..Default::default()
                };
                let mut engine = EvolutionEngine::new(config, fitness);
                engine.run().unwrap().stats.best_fitness
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_decode, bench_interpreter, bench_generation);
criterion_main!(benches);
