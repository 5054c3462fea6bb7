use anyhow::{Context, Result};
use kinscape_core::{CultureRecord, Engine, EngineConfig, ScopeLevel, VisualMode};
use tracing::{info, warn};

fn main() -> Result<()> {
    init_tracing();
    let mut engine = bootstrap_engine()?;
    info!("Starting Kinscape simulation shell");

    run_choreography(&mut engine)?;

    if let Some(summary) = engine.history().last() {
        info!(
            tick = summary.tick.0,
            cultures = summary.culture_count,
            contained = summary.contained,
            exchanges = summary.exchanges_applied,
            "Run complete",
        );
    } else {
        warn!("Run completed without tick summaries");
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn bootstrap_engine() -> Result<Engine> {
    let config = EngineConfig {
        rng_seed: Some(0xFACA_DE01),
        history_capacity: 600,
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(config).context("engine configuration rejected")?;
    let loaded = engine.load_dataset(&demo_records());
    engine.set_viewport(1_600.0, 900.0);
    info!(cultures = loaded, particles = engine.particles().len(), "Dataset loaded");
    Ok(engine)
}

fn run_choreography(engine: &mut Engine) -> Result<()> {
    // Settle the layout.
    run_ticks(engine, 120);

    // Focus an inner culture and let the flow episode play out.
    let focus = engine
        .culture_id("Tidewrights")
        .context("demo dataset is missing its focus culture")?;
    engine.focus(focus)?;
    engine.move_camera_to(focus)?;
    run_ticks(engine, 300);
    if let Some(summary) = engine.history().last() {
        info!(
            flowing = summary.flowing,
            returning = summary.returning,
            exchanges = summary.exchanges_applied,
            "Focus episode sampled",
        );
    }

    // Exit through the phased sequence.
    engine.exit_focus();
    let limit = engine.config().exit_sequence_ticks() as usize + 60;
    let mut finished = false;
    for _ in 0..limit {
        if engine.step().sequence_finished {
            finished = true;
            break;
        }
    }
    if !finished {
        warn!("exit sequence did not finish within its budget");
    }

    // Narrow to the local level so parent groups aggregate, then clear.
    engine.set_scope_filter(Some(ScopeLevel::Local));
    run_ticks(engine, 120);
    let synthetic = engine.snapshot().cultures.iter().filter(|c| c.synthetic).count();
    info!(groups = synthetic, "Scope filter active");
    engine.set_scope_filter(None);

    engine.set_visual_mode(VisualMode::Borderless);
    run_ticks(engine, 60);
    engine.set_visual_mode(VisualMode::Bordered);
    engine.reset_positions();
    run_ticks(engine, 60);
    Ok(())
}

fn run_ticks(engine: &mut Engine, count: usize) {
    for _ in 0..count {
        engine.step();
    }
}

fn demo_records() -> Vec<CultureRecord> {
    let rec = |name: &str,
               scope: ScopeLevel,
               kin: &[&str],
               parents: &[&str],
               hue: f32,
               interior: usize,
               per_edge: usize| CultureRecord {
        name: name.to_string(),
        kinships: kin.iter().map(|s| s.to_string()).collect(),
        affiliations: parents.iter().map(|s| s.to_string()).collect(),
        knowledge: 0.6,
        openness: 0.5,
        language: 0.5,
        sides: kin.len().max(3) as u32,
        hue,
        scope,
        interior_particles: interior,
        particles_per_edge: per_edge,
    };

    vec![
        rec(
            "Tidewrights",
            ScopeLevel::Local,
            &["Mirefolk", "Emberline", "Gleaners"],
            &["Saltmarsh Union"],
            16.0,
            120,
            3,
        ),
        rec(
            "Mirefolk",
            ScopeLevel::Local,
            &["Tidewrights", "Gleaners"],
            &["Saltmarsh Union"],
            88.0,
            90,
            2,
        ),
        rec(
            "Gleaners",
            ScopeLevel::Local,
            &["Tidewrights", "Mirefolk"],
            &["Saltmarsh Union"],
            140.0,
            80,
            2,
        ),
        rec(
            "Emberline",
            ScopeLevel::Local,
            &["Tidewrights"],
            &["Kiln Assembly"],
            32.0,
            100,
            4,
        ),
        rec(
            "Kiln Assembly",
            ScopeLevel::Regional,
            &["Saltmarsh Union"],
            &[],
            52.0,
            70,
            2,
        ),
        rec(
            "Saltmarsh Union",
            ScopeLevel::Regional,
            &["Kiln Assembly"],
            &["Commons Accord"],
            200.0,
            70,
            2,
        ),
        rec(
            "Commons Accord",
            ScopeLevel::National,
            &[],
            &[],
            260.0,
            60,
            2,
        ),
        rec(
            "Drift Archive",
            ScopeLevel::Global,
            &[],
            &[],
            310.0,
            60,
            2,
        ),
    ]
}
