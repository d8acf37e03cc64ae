//! BrainPlus Evolve CLI - Evolve a program that prints a target string.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;

use brainplus_evolve::{
    checkpoint::{self, CompressionType},
    compute::ProgramDecoder,
    compute::evolution::{EvolutionEngine, ProgramRunner, TargetStringFitness},
    schema::RunConfig,
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <run.json> [checkpoint.bpga]", args[0]);
        eprintln!();
        eprintln!("Evolve a BrainPlus program from a JSON run file.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  run.json         Path to run configuration file");
        eprintln!("  checkpoint.bpga  Resume from this file if it exists, save to it when done");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let checkpoint_path = args.get(2).map(PathBuf::from);

    // Load configuration
    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let config: RunConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = config.validate() {
        eprintln!("Invalid config: {}", e);
        std::process::exit(1);
    }

    let decoder = ProgramDecoder::from_config(&config.decoder).unwrap_or_else(|e| {
        eprintln!("Invalid decoder: {}", e);
        std::process::exit(1);
    });

    let mut runner = ProgramRunner::new(decoder, config.max_instructions).with_options(config.vm);
    if let Some(code) = &config.append_code {
        runner = runner.with_appended_code(code.clone());
    }
    let fitness = TargetStringFitness::new(config.target.clone(), runner);

    println!("BrainPlus Evolve");
    println!("================");
    println!("Target: {:?}", config.target);
    println!(
        "Population: {} x {} genes",
        config.evolution.population.size, config.evolution.population.genome_length
    );
    println!("Max generations: {}", config.evolution.population.max_generations);
    println!("Instruction budget: {}", config.max_instructions);
    println!();

    // Resume or start fresh
    let resumed = checkpoint_path
        .as_ref()
        .filter(|p| p.exists())
        .map(|p| {
            checkpoint::load(p).unwrap_or_else(|e| {
                eprintln!("Error loading checkpoint: {}", e);
                std::process::exit(1);
            })
        });

    let mut engine = match resumed {
        Some(mut snapshot) => {
            println!(
                "Resuming from generation {} ({} genes)",
                snapshot.params.generation, snapshot.params.genome_length
            );
            snapshot.params.config.population.max_generations =
                config.evolution.population.max_generations;
            EvolutionEngine::from_snapshot(snapshot, fitness).unwrap_or_else(|e| {
                eprintln!("Error resuming: {}", e);
                std::process::exit(1);
            })
        }
        None => EvolutionEngine::new(config.evolution.clone(), fitness),
    };

    let report_every = config.evolution.population.log_interval;
    let result = engine
        .run_with_callback(|progress| {
            if progress.generation % report_every == 0 {
                println!(
                    "  Generation {}: best={:.2}, avg={:.2}, target={:.0}, genes={}",
                    progress.generation,
                    progress.best_fitness,
                    progress.avg_fitness,
                    progress.target_fitness,
                    progress.genome_length
                );
            }
        })
        .unwrap_or_else(|e| {
            eprintln!("Evolution failed: {}", e);
            std::process::exit(1);
        });

    if let Some(path) = &checkpoint_path {
        let snapshot = engine.snapshot();
        if let Err(e) = checkpoint::save(path, &snapshot, CompressionType::Lz4) {
            eprintln!("Error saving checkpoint: {}", e);
        }
    }

    let best = &result.best;
    println!();
    println!("Stopped: {:?}", result.stats.stop_reason);
    println!("Generations: {}", result.stats.generations);
    println!(
        "Evaluations: {} ({:.0}/s)",
        result.stats.total_evaluations, result.stats.evaluations_per_second
    );
    println!("Best fitness: {:.2} (true {:.2})", best.fitness, best.true_fitness);
    println!("Program: {}", best.program);
    println!("Output: {:?}", best.output);
    println!("Ticks: {}", best.ticks);
    if let Some(fault) = &best.fault {
        println!("Fault: {}", fault);
    }
}

fn print_example_config() {
    let config = RunConfig::default();

    println!("Example configuration (run.json):");
    println!("{}", serde_json::to_string_pretty(&config).unwrap());
}
