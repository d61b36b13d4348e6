//! `atlas-cli` – Atlas operator console
//!
//! This binary drives a single navigation agent by hand.  It:
//!
//! 1. Checks for `~/.atlas/config.toml`; runs a **First-Run Wizard** when the
//!    file is absent.
//! 2. Prints the effective world and planner settings.
//! 3. Drops the user into an **interactive REPL** with slash-commands
//!    (`/sense`, `/goal`, `/plan`, `/frame`, `/fleet`, `/help`, …).
//! 4. Intercepts **Ctrl-C** to stop the REPL and exit safely.

mod config;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

fn main() {
    // RUST_LOG selects the filter, ATLAS_LOG_FORMAT=json switches to JSON
    // lines and OTEL_EXPORTER_OTLP_ENDPOINT enables span export.  The guard
    // flushes spans when main returns.
    let _telemetry = atlas_runtime::init_tracing("atlas");

    print_banner();

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => run_first_run_wizard(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };

    let world = &cfg.session.world;
    println!(
        "  Device {} │ world {}×{} m @ {} cm │ inflation {} cell(s)",
        cfg.device_id.bold(),
        world.world_width_m,
        world.world_height_m,
        world.resolution_cm,
        cfg.session.planner.obstacle_inflation_cells
    );
    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    repl::run(cfg, shutdown);
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║        Atlas First-Run Wizard        ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's describe the arena.\n");

    let mut cfg = config::Config::default();

    let id = prompt_line(&format!("  Device id [{}]: ", cfg.device_id), &cfg.device_id);
    cfg.device_id = id;

    let world = &mut cfg.session.world;
    world.world_width_m = prompt_positive(
        &format!("  Arena width in metres [{}]: ", world.world_width_m),
        world.world_width_m,
    );
    world.world_height_m = prompt_positive(
        &format!("  Arena height in metres [{}]: ", world.world_height_m),
        world.world_height_m,
    );
    world.resolution_cm = prompt_positive(
        &format!("  Cell size in centimetres [{}]: ", world.resolution_cm),
        world.resolution_cm,
    );

    let inflation = prompt_line(
        &format!(
            "  Obstacle inflation in cells [{}]: ",
            cfg.session.planner.obstacle_inflation_cells
        ),
        &cfg.session.planner.obstacle_inflation_cells.to_string(),
    );
    if let Ok(cells) = inflation.trim().parse::<u32>() {
        cfg.session.planner.obstacle_inflation_cells = cells;
    }

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"    ___   __  __"#.bold().cyan());
    println!("{}", r#"   /   | / /_/ /___ ______"#.bold().cyan());
    println!("{}", r#"  / /| |/ __/ / __ `/ ___/"#.bold().cyan());
    println!("{}", r#" / ___ / /_/ / /_/ (__  )"#.bold().cyan());
    println!("{}", r#"/_/  |_\__/_/\__,_/____/"#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Atlas".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Spatial world model & navigation core");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}

/// Prompt for a positive number.  Returns `default` on Enter or bad input.
fn prompt_positive(msg: &str, default: f32) -> f32 {
    let raw = prompt_line(msg, &default.to_string());
    match raw.parse::<f32>() {
        Ok(v) if v.is_finite() && v > 0.0 => v,
        _ => {
            println!(
                "  {} '{}' is not a positive number, keeping {}",
                "Warning:".yellow(),
                raw,
                default
            );
            default
        }
    }
}
