//! Heatmesh grid demo: a 2×2 chip machine with driven edges.
//!
//! Demonstrates:
//!   1. Laying out cells and keys with `GridLayout`
//!   2. Encoding startup blocks and starting a `Machine`
//!   3. Driving edge temperatures through host commands
//!   4. Rebuilding a heat map from staggered chip reports
//!   5. Joining the machine and reading its shutdown report
//!
//! Run with:
//!   RUST_LOG=heatmesh=debug cargo run --example grid_demo

use std::time::Duration;

use heatmesh_core::Fix16;
use heatmesh_fabric::{Direction, GridLayout, Heatmap, HostError, Machine, MachineConfig};
use tracing_subscriber::EnvFilter;

// ─── Parameters ─────────────────────────────────────────────────

const CHIPS_X: u8 = 2;
const CHIPS_Y: u8 = 2;
const SIM_LENGTH: u32 = 2000;
const DIFFUSIVITY: f64 = 0.04;

const EDGES: [(Direction, f64); 4] = [
    (Direction::East, 100.0),
    (Direction::West, 0.0),
    (Direction::North, 50.0),
    (Direction::South, 25.0),
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let layout = GridLayout::new(CHIPS_X, CHIPS_Y, 16)?;
    let source = layout.config_source(SIM_LENGTH, Fix16::from_f64(DIFFUSIVITY));
    let (machine, host) = Machine::start(&layout, &source, MachineConfig::default())?;

    for (direction, temperature) in EDGES {
        host.set_edge_temperature(direction, Fix16::from_f64(temperature))?;
    }

    let mut map = Heatmap::for_layout(&layout);
    let mut reports = 0u64;
    loop {
        match host.recv_report(Duration::from_millis(500)) {
            Ok(report) => {
                map.apply(&report);
                reports += 1;
            }
            Err(HostError::Transport(_)) if machine.is_finished() => break,
            Err(HostError::Transport(_)) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    let shutdown = machine.join();
    println!(
        "{} agents, {} ticks, {} reports received, {} dropped",
        shutdown.agents_joined,
        shutdown.metrics.ticks,
        reports,
        shutdown.metrics.reports_dropped
    );

    for y in (0..map.height()).rev() {
        let row = map.row(y).unwrap_or(&[]);
        let line: Vec<String> = row.iter().map(|v| format!("{v:6.1}")).collect();
        println!("{}", line.join(" "));
    }
    Ok(())
}
