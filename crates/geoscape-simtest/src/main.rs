//! Geoscape Headless Campaign Harness
//!
//! Runs seeded campaigns entirely in-process and checks the engine's
//! invariants along the way. No rendering, no tactical battles: detected
//! UFOs are intercepted automatically and dogfights are settled with dice.
//!
//! Usage:
//!   cargo run -p geoscape-simtest
//!   cargo run -p geoscape-simtest -- --days 90 --seed 7 --verbose
//!   RUST_LOG=geoscape_core=debug cargo run -p geoscape-simtest

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Parser;
use geoscape_core::components::CraftStatus;
use geoscape_core::prelude::*;
use hecs::Entity;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "geoscape-simtest", about = "Headless Geoscape campaign harness")]
struct Args {
    /// Campaign length in game days
    #[arg(long, default_value_t = 30)]
    days: u64,

    /// Seed for the campaign and for the automatic player
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// JSON file with GeoConfig overrides
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print every check, not just failures
    #[arg(long)]
    verbose: bool,
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn main() {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("=== Geoscape Campaign Harness ===\n");

    let config = match &args.config {
        Some(path) => match GeoConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("failed to load {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => GeoConfig::default(),
    };

    let mut results = Vec::new();

    // 1. Configuration
    results.extend(validate_config(&config));

    // 2. Full campaign with an automatic player
    results.extend(run_campaign(&config, args.seed, args.days, args.verbose));

    // 3. Save/load equivalence
    results.extend(validate_save_load(&config, args.seed));

    // 4. Determinism
    results.extend(validate_determinism(&config, args.seed));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || args.verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Configuration ────────────────────────────────────────────────────

fn validate_config(config: &GeoConfig) -> Vec<TestResult> {
    println!("--- Configuration ---");
    let mut results = Vec::new();

    let valid = config.validate();
    results.push(TestResult {
        name: "config_valid".into(),
        passed: valid.is_ok(),
        detail: match &valid {
            Ok(()) => format!("time ratio {}x", config.time_ratio),
            Err(e) => e.to_string(),
        },
    });

    let roundtrip = config
        .to_json_string()
        .and_then(|json| GeoConfig::from_json_str(&json));
    results.push(TestResult {
        name: "config_json_roundtrip".into(),
        passed: matches!(&roundtrip, Ok(c) if c == config),
        detail: match &roundtrip {
            Ok(_) => "config survives JSON".into(),
            Err(e) => e.to_string(),
        },
    });

    results
}

// ── 2. Campaign ─────────────────────────────────────────────────────────

#[derive(Default)]
struct CampaignStats {
    events: BTreeMap<&'static str, usize>,
    intercepts_launched: usize,
    dogfights_resolved: usize,
    max_ufos: usize,
}

fn run_campaign(config: &GeoConfig, seed: u64, days: u64, verbose: bool) -> Vec<TestResult> {
    println!("--- Campaign ({} days, seed {}) ---", days, seed);
    let mut results = Vec::new();

    let mut geo = match Geoscape::new_game(config.clone(), seed) {
        Ok(geo) => geo,
        Err(e) => {
            results.push(TestResult {
                name: "campaign_start".into(),
                passed: false,
                detail: e.to_string(),
            });
            return results;
        }
    };

    let mut player = StdRng::seed_from_u64(seed ^ 0x5eed);
    let mut stats = CampaignStats::default();
    let mut clock_ok = true;
    let mut inconsistent_at = None;

    let mut previous = geo.now();
    for _ in 0..(days * 24 * 60) {
        geo.advance(MS_PER_MINUTE);
        if geo.now() <= previous {
            clock_ok = false;
        }
        previous = geo.now();

        play(&mut geo, &mut player, &mut stats);
        stats.max_ufos = stats.max_ufos.max(geo.ufos().len());

        if inconsistent_at.is_none() && !geo.is_consistent() {
            inconsistent_at = Some(geo.now());
        }
    }

    results.push(TestResult {
        name: "clock_monotonic".into(),
        passed: clock_ok && geo.now() == GameTime::from_millis(days * MS_PER_DAY),
        detail: format!("ended at {}", geo.now()),
    });
    results.push(TestResult {
        name: "roster_consistent".into(),
        passed: inconsistent_at.is_none(),
        detail: match inconsistent_at {
            None => format!("{} UFOs on the map at most", stats.max_ufos),
            Some(at) => format!("roster and world disagree at {}", at),
        },
    });

    let tasks_started = stats.events.get("InvasionTaskStarted").copied().unwrap_or(0);
    results.push(TestResult {
        name: "aliens_active".into(),
        passed: tasks_started > 0,
        detail: format!("{} invasion tasks started", tasks_started),
    });
    results.push(TestResult {
        name: "player_active".into(),
        passed: days < 7 || stats.intercepts_launched > 0,
        detail: format!(
            "{} intercepts launched, {} dogfights resolved",
            stats.intercepts_launched, stats.dogfights_resolved
        ),
    });

    if verbose {
        for (name, count) in &stats.events {
            println!("  {:>24}: {}", name, count);
        }
    }
    info!(
        interceptors = geo.interceptors().len(),
        ufos = geo.ufos().len(),
        tasks = geo.overmind().tasks().len(),
        "campaign finished"
    );

    results
}

/// The automatic player: intercept what radar sees, settle fights with dice
fn play(geo: &mut Geoscape, rng: &mut StdRng, stats: &mut CampaignStats) {
    for event in geo.drain_events() {
        *stats.events.entry(event_name(&event.kind)).or_default() += 1;

        match event.kind {
            GeoEventKind::UfoDetected { ufo } => {
                let Some(craft) = ready_interceptor(geo) else {
                    continue;
                };
                match geo.launch_intercept(craft, ufo) {
                    Ok(()) => stats.intercepts_launched += 1,
                    Err(e) => warn!(%e, "intercept not launched"),
                }
            }
            GeoEventKind::DogfightStarted { hunter, prey } => {
                let hunter_fate = roll_fate(rng, 0.15, 0.0);
                let prey_fate = roll_fate(rng, 0.4, 0.35);
                match geo.resolve_dogfight(hunter, prey, hunter_fate, prey_fate) {
                    Ok(()) => stats.dogfights_resolved += 1,
                    Err(e) => warn!(%e, "dogfight not resolved"),
                }
            }
            _ => {}
        }
    }
}

/// First docked interceptor with at least half a tank
fn ready_interceptor(geo: &Geoscape) -> Option<Entity> {
    geo.interceptors().into_iter().find(|e| {
        geo.craft(*e).is_some_and(|c| {
            c.status == CraftStatus::Docked && c.fuel.is_some_and(|f| f.level >= 0.5)
        })
    })
}

fn roll_fate(rng: &mut StdRng, destroyed: f64, crashed: f64) -> CombatFate {
    let roll: f64 = rng.gen();
    if roll < destroyed {
        CombatFate::Destroyed
    } else if roll < destroyed + crashed {
        CombatFate::Crashed
    } else {
        CombatFate::Intact
    }
}

fn event_name(kind: &GeoEventKind) -> &'static str {
    match kind {
        GeoEventKind::UfoDetected { .. } => "UfoDetected",
        GeoEventKind::TrackingLost { .. } => "TrackingLost",
        GeoEventKind::FuelLow { .. } => "FuelLow",
        GeoEventKind::DogfightStarted { .. } => "DogfightStarted",
        GeoEventKind::DogfightResolved { .. } => "DogfightResolved",
        GeoEventKind::UfoCrashed { .. } => "UfoCrashed",
        GeoEventKind::TerrorAttack { .. } => "TerrorAttack",
        GeoEventKind::BaseAssault { .. } => "BaseAssault",
        GeoEventKind::OutpostSupplied { .. } => "OutpostSupplied",
        GeoEventKind::CityInfiltrated { .. } => "CityInfiltrated",
        GeoEventKind::OutpostEstablished { .. } => "OutpostEstablished",
        GeoEventKind::LandedUfoReached { .. } => "LandedUfoReached",
        GeoEventKind::CraftReturned { .. } => "CraftReturned",
        GeoEventKind::CraftDestroyed { .. } => "CraftDestroyed",
        GeoEventKind::UfoDeparted { .. } => "UfoDeparted",
        GeoEventKind::ShipmentArrived { .. } => "ShipmentArrived",
        GeoEventKind::InvasionTaskStarted { .. } => "InvasionTaskStarted",
        GeoEventKind::SiteDestroyed { .. } => "SiteDestroyed",
    }
}

// ── 3. Save / Load ──────────────────────────────────────────────────────

fn validate_save_load(config: &GeoConfig, seed: u64) -> Vec<TestResult> {
    println!("--- Save / Load ---");
    let mut results = Vec::new();

    let Ok(mut geo) = Geoscape::new_game(config.clone(), seed) else {
        results.push(TestResult {
            name: "save_load_setup".into(),
            passed: false,
            detail: "campaign did not start".into(),
        });
        return results;
    };
    for _ in 0..(2 * 24 * 60) {
        geo.advance(MS_PER_MINUTE);
    }
    geo.drain_events();

    let mut first = Vec::new();
    let reloaded = geo
        .save(&mut first)
        .and_then(|()| Geoscape::load(&first[..]));
    let mut loaded = match reloaded {
        Ok(loaded) => loaded,
        Err(e) => {
            results.push(TestResult {
                name: "save_load_roundtrip".into(),
                passed: false,
                detail: e.to_string(),
            });
            return results;
        }
    };

    let mut second = Vec::new();
    let resaved = loaded.save(&mut second).is_ok() && first == second;
    results.push(TestResult {
        name: "save_load_roundtrip".into(),
        passed: resaved && loaded.is_consistent(),
        detail: format!("{} bytes, identical when saved again: {}", first.len(), resaved),
    });

    // Both copies must keep running the same way
    let mut original_events = 0;
    let mut loaded_events = 0;
    for _ in 0..(24 * 60) {
        geo.advance(MS_PER_MINUTE);
        loaded.advance(MS_PER_MINUTE);
        original_events += geo.drain_events().len();
        loaded_events += loaded.drain_events().len();
    }
    let same = geo.now() == loaded.now()
        && original_events == loaded_events
        && geo.ufos().len() == loaded.ufos().len()
        && geo.overmind().tasks().len() == loaded.overmind().tasks().len();
    results.push(TestResult {
        name: "save_load_continuation".into(),
        passed: same,
        detail: format!(
            "{} vs {} events over the following day",
            original_events, loaded_events
        ),
    });

    results
}

// ── 4. Determinism ──────────────────────────────────────────────────────

fn validate_determinism(config: &GeoConfig, seed: u64) -> Vec<TestResult> {
    println!("--- Determinism ---");

    let run = || -> Option<Vec<GeoEvent>> {
        let mut geo = Geoscape::new_game(config.clone(), seed).ok()?;
        let mut events = Vec::new();
        for _ in 0..(3 * 24 * 6) {
            geo.advance(10 * MS_PER_MINUTE);
            events.extend(geo.drain_events());
        }
        Some(events)
    };

    let (a, b) = (run(), run());
    vec![TestResult {
        name: "same_seed_same_events".into(),
        passed: a.is_some() && a == b,
        detail: format!("{} events over three days", a.map(|e| e.len()).unwrap_or(0)),
    }]
}
