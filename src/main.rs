// Sync Sweep - run the simulator over an (N, F) grid and tabulate TotalDuration
//
// Usage:
//   cargo run --release
//   cargo run --release -- sweeps/sol1_scaling.yaml
//   cargo run --release -- sweeps/sol1_scaling.yaml --output results.txt
//   cargo run --release -- --dry-run

use std::env;
use std::path::PathBuf;
use std::process;

use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;

use sync_sweep::{run_sweep, SweepConfig, SweepError};

struct Args {
    sweep_file: Option<PathBuf>,
    output: Option<PathBuf>,
    dry_run: bool,
}

fn main() {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()
        .unwrap_or_else(|e| {
            eprintln!("Failed to initialise logger: {}", e);
            process::exit(1);
        });

    let args = parse_args();

    if let Err(e) = run(args) {
        error!("{}", e);
        process::exit(1);
    }
}

fn parse_args() -> Args {
    let argv: Vec<String> = env::args().collect();
    let mut args = Args {
        sweep_file: None,
        output: None,
        dry_run: false,
    };

    let mut rest = argv.iter().skip(1);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--output" | "-o" => match rest.next() {
                Some(path) => args.output = Some(PathBuf::from(path)),
                None => usage(&argv[0], "--output needs a path"),
            },
            "--dry-run" => args.dry_run = true,
            "--help" | "-h" => usage(&argv[0], ""),
            flag if flag.starts_with('-') => usage(&argv[0], &format!("unknown flag {}", flag)),
            path if args.sweep_file.is_none() => args.sweep_file = Some(PathBuf::from(path)),
            extra => usage(&argv[0], &format!("unexpected argument {}", extra)),
        }
    }

    args
}

fn usage(program: &str, problem: &str) -> ! {
    if !problem.is_empty() {
        eprintln!("Error: {}\n", problem);
    }
    eprintln!("Usage: {} [sweep.yaml] [--output PATH] [--dry-run]", program);
    eprintln!("\nExamples:");
    eprintln!("  {}                              (built-in sweep: N=25, 0..33%)", program);
    eprintln!("  {} sweeps/sol1_scaling.yaml", program);
    eprintln!("  {} sweeps/sol1_scaling.yaml --output scaling.txt", program);
    process::exit(if problem.is_empty() { 0 } else { 1 });
}

fn run(args: Args) -> Result<(), SweepError> {
    let mut config = match args.sweep_file {
        Some(ref path) => {
            info!("Loading sweep from: {}", path.display());
            SweepConfig::load(path)?
        }
        None => SweepConfig::default(),
    };
    if let Some(output) = args.output {
        config.output = output;
    }
    config.validate()?;

    let plan = config.plan();

    println!("\n╔════════════════════════════════════════════════════════╗");
    match config.name {
        Some(ref name) => println!("║  {}", name),
        None => println!("║  SYNC SWEEP"),
    }
    println!("╚════════════════════════════════════════════════════════╝\n");

    if let Some(ref desc) = config.description {
        println!("{}\n", desc);
    }

    println!("Configuration:");
    println!("  Simulator: {}", config.simulator.base());
    if let Some(ref dir) = config.simulator.working_dir {
        println!("  Working dir: {}", dir.display());
    }
    println!("  Scales (N): {:?}", config.scales);
    println!("  Percentages: {:?}", config.percentages);
    println!("  Runs: {}", plan.len());
    println!("  Deadline: {:?} per run", config.deadline);
    println!("  Output: {}", config.output.display());

    if args.dry_run {
        println!("\nPlanned runs:");
        for point in plan.points() {
            println!("  {}", config.simulator.display(point.scale, point.faults));
        }
        return Ok(());
    }

    println!("\nStarting sweep...\n");

    let mut executor = config.executor();
    let matrix = run_sweep(&plan, &mut executor, config.matrix())?;

    matrix.summary().print_summary();
    matrix.write_report(&config.output)?;

    println!("✓ Sweep complete!\n");
    Ok(())
}
