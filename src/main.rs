//! Solution evolution CLI - Validate evolution configurations.

use std::fs;
use std::path::PathBuf;

use solution_evolution::schema::EvolutionConfig;

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json>", args[0]);
        eprintln!();
        eprintln!("Validate an evolution configuration and print its generation budget.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to evolution configuration file");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);

    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let config: EvolutionConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }
    log::debug!("Loaded configuration from {}", config_path.display());

    let budget = config.budget();

    println!("Solution Evolution Configuration");
    println!("================================");
    println!("Population size: {}", budget.population_size);
    println!(
        "Elite fitness floor: {} (tournament size {}, per-cluster cap {})",
        config.elite_fitness_floor, config.tournament_size, config.per_cluster_breeding_cap
    );
    println!(
        "Clustering: radius {}, min points {}, {} dimensions",
        config.clustering.radius,
        config.clustering.min_points,
        config.clustering.projection_dimensions
    );
    println!(
        "Concurrency: {} sub-populations at once, {}",
        config.max_concurrent_sub_populations,
        match config.max_sub_problems {
            Some(n) => format!("at most {} per run", n),
            None => "no sub-problem cap".to_string(),
        }
    );
    println!();
    println!("Generation budget:");
    println!("  Top elites:  up to {}", budget.elite_limit);
    println!("  Mutants:     {}", budget.mutation_count);
    println!("  Crossovers:  {}", budget.crossover_count);
    println!(
        "  Immigrants:  {} planned, absorbs remaining slots",
        budget.planned_immigration_count
    );

    let planned = budget.elite_limit + budget.mutation_count + budget.crossover_count;
    if planned > budget.population_size {
        println!();
        println!(
            "Warning: elites, mutants and crossovers plan {} slots for {}; later phases will be clamped",
            planned, budget.population_size
        );
    }
}

fn print_example_config() {
    let config = EvolutionConfig::default();

    match serde_json::to_string_pretty(&config) {
        Ok(json) => {
            println!("Example configuration (config.json):");
            println!("{}", json);
        }
        Err(e) => {
            eprintln!("Error serializing config: {}", e);
            std::process::exit(1);
        }
    }
}
