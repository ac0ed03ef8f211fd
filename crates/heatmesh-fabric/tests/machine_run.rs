//! Integration test: full machine runs over the in-process fabric.
//!
//! Agents run on real threads with a real timer, so assertions are about
//! counts and bounds that hold regardless of scheduling.

use std::time::Duration;

use heatmesh_agent::{BlockConfigSource, ConfigError};
use heatmesh_core::{ChipCoord, Fix16, REPORT_PERIOD};
use heatmesh_fabric::{
    Direction, GridLayout, Heatmap, HostError, Machine, MachineConfig, MachineError,
};

fn quiet_config() -> MachineConfig {
    MachineConfig {
        jitter_us: 0..0,
        ..Default::default()
    }
}

#[test]
fn run_completes_with_exact_step_and_report_counts() {
    let sim_length: u32 = 200;
    let layout = GridLayout::new(2, 1, 4).unwrap();
    let source = layout.config_source(sim_length, Fix16::from_f64(0.25));
    let (machine, host) = Machine::start(&layout, &source, quiet_config()).unwrap();
    assert_eq!(machine.len(), 8);

    let report = machine.join();
    assert_eq!(report.agents_joined, 8);
    assert_eq!(report.agents_finished, 8);
    assert_eq!(report.metrics.ticks, 8 * u64::from(sim_length));

    // Chip (0, 0) reports at phase 0 and chip (1, 0) at phase 8.
    let ticks = 0..u64::from(sim_length);
    let expected_reports = ticks.clone().filter(|t| t % REPORT_PERIOD == 0).count()
        + ticks.filter(|t| t % REPORT_PERIOD == 8).count();
    assert_eq!(report.metrics.reports_sent as usize, expected_reports);
    assert_eq!(report.metrics.reports_dropped, 0);

    let mut received = 0;
    while let Ok(Some(r)) = host.try_recv_report() {
        assert_eq!(r.values.len(), 4);
        received += 1;
    }
    assert_eq!(received, expected_reports);
    assert!(matches!(
        host.try_recv_report(),
        Err(HostError::Transport(_))
    ));
}

#[test]
fn driven_edges_warm_the_grid() {
    let layout = GridLayout::new(1, 1, 16).unwrap();
    let source = layout.config_source(300, Fix16::from_f64(0.5));
    let (machine, host) = Machine::start(&layout, &source, quiet_config()).unwrap();

    for direction in Direction::ALL {
        host.set_edge_temperature(direction, Fix16::from_int(10))
            .unwrap();
    }

    let report = machine.join();
    assert_eq!(report.metrics.commands_injected, 4);
    assert_eq!(report.router.routed, 4);
    for exit in &report.exits {
        assert!(exit.finished);
        assert!(exit.value > Fix16::ZERO, "{} never warmed", exit.id);
        assert!(exit.value <= Fix16::from_int(10), "{} overshot", exit.id);
    }

    let mut map = Heatmap::for_layout(&layout);
    while let Ok(Some(r)) = host.try_recv_report() {
        map.apply(&r);
    }
    let corner = map.get(0, 0).unwrap();
    assert!((0.0..=10.0).contains(&corner));
}

#[test]
fn shutdown_stops_long_runs() {
    let layout = GridLayout::new(1, 1, 4).unwrap();
    let source = layout.config_source(u32::MAX, Fix16::from_f64(0.1));
    let (machine, _host) = Machine::start(&layout, &source, MachineConfig::default()).unwrap();

    std::thread::sleep(Duration::from_millis(20));
    let report = machine.shutdown();
    assert_eq!(report.agents_joined, 4);
    assert_eq!(report.agents_finished, 0);
    assert!(report.exits.iter().all(|e| e.ticks.0 < u64::from(u32::MAX)));
}

#[test]
fn missing_configuration_refuses_to_start() {
    let layout = GridLayout::new(1, 1, 4).unwrap();
    let mut source = layout.config_source(10, Fix16::ONE);
    let partial = {
        let mut s = BlockConfigSource::new();
        for cell in layout.cells().skip(1) {
            let id = cell.agent;
            s.insert_agent_block(id, layout.agent_config(id, 10, Fix16::ONE).unwrap().encode_block());
            s.insert_node_block(id, layout.node_config(id).unwrap().encode_block());
        }
        s
    };
    let first = layout.injector();

    match Machine::start(&layout, &partial, quiet_config()) {
        Err(MachineError::Config(ConfigError::MissingAgentBlock { agent })) => {
            assert_eq!(agent, first)
        }
        other => panic!("expected a missing block, got {:?}", other.map(|_| ())),
    }

    // A corrupt diffusivity is caught the same way.
    let mut bad = layout.agent_config(first, 10, Fix16::ONE).unwrap();
    bad.diffusivity = Fix16::from_int(2);
    source.insert_agent_block(first, bad.encode_block());
    assert!(matches!(
        Machine::start(&layout, &source, quiet_config()),
        Err(MachineError::Config(ConfigError::DiffusivityOutOfRange { .. }))
    ));
}

#[test]
fn invalid_machine_config_refuses_to_start() {
    let layout = GridLayout::new(1, 1, 1).unwrap();
    let source = layout.config_source(10, Fix16::ONE);
    let config = MachineConfig {
        packet_capacity: 0,
        ..Default::default()
    };
    assert!(matches!(
        Machine::start(&layout, &source, config),
        Err(MachineError::ZeroCapacity { what: "packet" })
    ));
}

#[test]
fn reports_are_addressed_from_each_chip_reporter() {
    let layout = GridLayout::new(2, 2, 1).unwrap();
    let source = layout.config_source(REPORT_PERIOD as u32, Fix16::from_f64(0.5));
    let (machine, host) = Machine::start(&layout, &source, quiet_config()).unwrap();
    let report = machine.join();
    assert_eq!(report.metrics.reports_sent, 4);

    let mut chips = Vec::new();
    while let Ok(Some(r)) = host.try_recv_report() {
        assert_eq!(r.source.core.0, 1);
        assert_eq!(r.dest, ChipCoord::ORIGIN);
        chips.push(r.source.chip);
    }
    chips.sort();
    assert_eq!(
        chips,
        vec![
            ChipCoord::new(0, 0),
            ChipCoord::new(0, 1),
            ChipCoord::new(1, 0),
            ChipCoord::new(1, 1)
        ]
    );
}
