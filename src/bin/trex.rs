use clap::{Parser, Subcommand};
use std::time::Instant;
use trex::context::install_simulation_panic_hook;
use trex::io::deck::DeckIO;
use trex::io::echo::append_error;

#[derive(Parser)]
#[command(name = "trex")]
#[command(about = "A command line interface for the TREX watershed simulation engine")]
#[command(version = env!("TREX_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation
    #[command(visible_alias = "sim")]
    Simulate {
        /// Path to the control file
        input_file: String,
        /// Report execution time profile
        #[arg(short = 'p', long)]
        profile: bool,
    },
}

fn main() {
    install_simulation_panic_hook();
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate { input_file, profile } => {
            let total_start = Instant::now();

            //Load the control deck and every auxiliary file
            let load_start = Instant::now();
            let mut sim = match DeckIO::new().read_deck_file(input_file.as_str()) {
                Ok(sim) => sim,
                Err(e) => {
                    eprintln!("Error! {}", e);
                    std::process::exit(1);
                }
            };
            if let Err(e) = sim.configure() {
                eprintln!("Error! {}", e);
                append_error(&sim.ctl.echofile, &e);
                std::process::exit(1);
            }
            let load_time = load_start.elapsed();

            //Run the simulation to tend
            let sim_start = Instant::now();
            if let Err(e) = sim.run() {
                eprintln!("Error! {}", e);
                append_error(&sim.ctl.echofile, &e);
                std::process::exit(1);
            }
            let sim_time = sim_start.elapsed();

            //Finalize: balances, summary, and reports
            let output_start = Instant::now();
            if let Err(e) = sim.finalize() {
                eprintln!("Error! {}", e);
                append_error(&sim.ctl.echofile, &e);
                std::process::exit(1);
            }
            let output_time = output_start.elapsed();

            let total_time = total_start.elapsed();
            println!("Done!");

            if profile {
                let misc_time = total_time.saturating_sub(load_time + sim_time + output_time);
                println!("\n=== Execution Profile ===");
                println!("  Loading time:    {:>10.3} ms", load_time.as_secs_f64() * 1000.0);
                println!("  Simulation time: {:>10.3} ms", sim_time.as_secs_f64() * 1000.0);
                println!("  Output time:     {:>10.3} ms", output_time.as_secs_f64() * 1000.0);
                println!("  Misc:            {:>10.3} ms", misc_time.as_secs_f64() * 1000.0);
                println!("  ─────────────────────────────");
                println!("  Total time:      {:>10.3} ms", total_time.as_secs_f64() * 1000.0);
            }
        }
    }
}
