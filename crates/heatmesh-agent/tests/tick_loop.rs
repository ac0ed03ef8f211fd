//! Integration test: the per-tick control step driven against recording
//! transports.
//!
//! Covers the update/broadcast/report sequence, run-length termination,
//! neighbour freshness, and the staggered reporting schedule.

use heatmesh_agent::{
    Agent, BlockConfigSource, NodeConfig, ReportBuffer, TickContext, TickOutcome, REPORT_TIMEOUT,
};
use heatmesh_core::{BroadcastKey, Fix16, McPacket, TickId, TransportError, REPORT_PERIOD};
use heatmesh_test_utils::fixtures::{agent_id, build_agent, keyed_config, reporting_node};
use heatmesh_test_utils::{RecordingBus, RecordingHostLink};

fn run_ticks(agent: &mut Agent, bus: &RecordingBus, host: &RecordingHostLink, n: u64) -> u64 {
    let mut stepped = 0;
    for _ in 0..n {
        let mut ctx = TickContext::new(bus, host);
        if let TickOutcome::Stepped(_) = agent.on_tick(&mut ctx) {
            stepped += 1;
        }
    }
    stepped
}

fn feed_all_neighbours(agent: &mut Agent, value: Fix16) {
    for key in *agent.neighbour_keys() {
        assert!(agent.on_receive(McPacket::with_value(key, value)));
    }
}

// ── Update through the tick ──────────────────────────────────────────

#[test]
fn warm_neighbours_raise_value_and_broadcast_it() {
    let (mut agent, _) = build_agent(
        agent_id(0, 0, 1),
        &keyed_config(10, 0.5, 100),
        &NodeConfig::silent(),
    );
    agent.set_value(Fix16::from_bits(0x0001_0000));
    feed_all_neighbours(&mut agent, Fix16::from_bits(0x0002_0000));

    let bus = RecordingBus::new();
    let host = RecordingHostLink::new();
    let outcome = agent.on_tick(&mut TickContext::new(&bus, &host));

    assert_eq!(outcome, TickOutcome::Stepped(TickId(0)));
    assert_eq!(agent.value().to_bits(), 0x0001_8000);
    assert_eq!(
        bus.packets(),
        vec![McPacket::with_payload(BroadcastKey(100), 0x0001_8000)]
    );
}

#[test]
fn last_received_value_wins() {
    let (mut agent, _) = build_agent(
        agent_id(0, 0, 1),
        &keyed_config(10, 1.0, 100),
        &NodeConfig::silent(),
    );
    let east = agent.neighbour_keys()[0];
    agent.on_receive(McPacket::with_value(east, Fix16::from_int(40)));
    agent.on_receive(McPacket::with_value(east, Fix16::from_int(4)));
    agent.on_receive(McPacket::with_value(east, Fix16::from_int(4)));
    assert_eq!(agent.neighbour_values()[0], Fix16::from_int(4));

    let bus = RecordingBus::new();
    let host = RecordingHostLink::new();
    agent.on_tick(&mut TickContext::new(&bus, &host));
    // (4 + 0 + 0 + 0) / 4 * 1.0
    assert_eq!(agent.value(), Fix16::ONE);
}

#[test]
fn own_broadcast_is_ignored_on_receive() {
    let (mut agent, _) = build_agent(
        agent_id(0, 0, 1),
        &keyed_config(10, 0.5, 100),
        &NodeConfig::silent(),
    );
    assert!(!agent.on_receive(McPacket::with_value(BroadcastKey(100), Fix16::ONE)));
    assert!(!agent.on_receive(McPacket::with_value(BroadcastKey(999), Fix16::ONE)));
    assert!(!agent.on_receive(McPacket {
        key: BroadcastKey(101),
        payload: None,
    }));
    assert_eq!(agent.neighbour_values(), &[Fix16::ZERO; 4]);
    assert_eq!(agent.metrics().packets_received, 3);
    assert_eq!(agent.metrics().packets_matched, 0);
}

#[test]
fn duplicated_neighbour_key_fills_every_matching_slot() {
    let config = heatmesh_test_utils::fixtures::agent_config(10, 0.5, 100, [1, 1, 2, 3]);
    let (mut agent, _) = build_agent(agent_id(0, 0, 1), &config, &NodeConfig::silent());
    agent.on_receive(McPacket::with_value(BroadcastKey(1), Fix16::ONE));
    assert_eq!(
        agent.neighbour_values(),
        &[Fix16::ONE, Fix16::ONE, Fix16::ZERO, Fix16::ZERO]
    );
}

// ── Termination ──────────────────────────────────────────────────────

#[test]
fn run_performs_exactly_sim_length_steps() {
    let (mut agent, _) = build_agent(
        agent_id(0, 0, 1),
        &keyed_config(25, 0.25, 100),
        &NodeConfig::silent(),
    );
    feed_all_neighbours(&mut agent, Fix16::from_int(8));

    let bus = RecordingBus::new();
    let host = RecordingHostLink::new();
    assert_eq!(run_ticks(&mut agent, &bus, &host, 25), 25);
    assert_eq!(agent.tick(), TickId(25));
    assert_eq!(bus.len(), 25);

    let frozen = agent.value();
    let mut ctx = TickContext::new(&bus, &host);
    for _ in 0..10 {
        assert_eq!(agent.on_tick(&mut ctx), TickOutcome::Finished);
    }
    assert!(agent.is_finished());
    assert_eq!(agent.value(), frozen);
    assert_eq!(agent.tick(), TickId(25));
    assert_eq!(agent.metrics().ticks, 25);
    assert_eq!(bus.len(), 25);
}

#[test]
fn zero_length_run_never_steps() {
    let (mut agent, _) = build_agent(
        agent_id(0, 0, 1),
        &keyed_config(0, 0.5, 100),
        &NodeConfig::silent(),
    );
    let bus = RecordingBus::new();
    let host = RecordingHostLink::new();
    assert_eq!(
        agent.on_tick(&mut TickContext::new(&bus, &host)),
        TickOutcome::Finished
    );
    assert!(bus.is_empty());
    assert_eq!(agent.metrics().ticks, 0);
}

#[test]
fn refused_broadcast_does_not_stop_the_solver() {
    let (mut agent, _) = build_agent(
        agent_id(0, 0, 1),
        &keyed_config(4, 0.5, 100),
        &NodeConfig::silent(),
    );
    feed_all_neighbours(&mut agent, Fix16::from_int(2));
    let bus = RecordingBus::new();
    bus.set_refusing(true);
    let host = RecordingHostLink::new();

    assert_eq!(run_ticks(&mut agent, &bus, &host, 4), 4);
    assert!(agent.value() > Fix16::ZERO);
    assert_eq!(agent.metrics().broadcasts_dropped, 4);
    assert_eq!(agent.metrics().broadcasts_sent, 0);
}

// ── Reporting ────────────────────────────────────────────────────────

#[test]
fn non_reporting_agent_never_touches_host_link() {
    let (mut agent, buffer) = build_agent(
        agent_id(0, 0, 3),
        &keyed_config(200, 0.5, 100),
        &NodeConfig::silent(),
    );
    feed_all_neighbours(&mut agent, Fix16::ONE);
    let bus = RecordingBus::new();
    let host = RecordingHostLink::new();

    run_ticks(&mut agent, &bus, &host, 3 * REPORT_PERIOD + 1);
    assert_eq!(host.attempts(), 0);
    // The slot write still happens.
    assert_eq!(buffer.snapshot(3)[2], agent.value());
}

#[test]
fn reporter_sends_once_per_period_at_its_phase() {
    // Chip (2, 1) reports at phase 17.
    let (mut agent, _) = build_agent(
        agent_id(2, 1, 1),
        &keyed_config(1000, 0.5, 100),
        &reporting_node(4),
    );
    let bus = RecordingBus::new();
    let host = RecordingHostLink::new();

    run_ticks(&mut agent, &bus, &host, 17);
    assert_eq!(host.attempts(), 0);
    run_ticks(&mut agent, &bus, &host, 1);
    assert_eq!(host.attempts(), 1);
    run_ticks(&mut agent, &bus, &host, REPORT_PERIOD - 1);
    assert_eq!(host.attempts(), 1);
    run_ticks(&mut agent, &bus, &host, 1);
    assert_eq!(host.attempts(), 2);

    let reports = host.reports();
    assert_eq!(reports[0].source, agent_id(2, 1, 1));
    assert_eq!(reports[0].values.len(), 4);
    assert!(host.timeouts().iter().all(|&t| t == REPORT_TIMEOUT));
    assert_eq!(agent.metrics().reports_sent, 2);
}

#[test]
fn report_carries_co_located_slots() {
    let id = agent_id(0, 0, 1);
    let buffer = ReportBuffer::shared(3);
    let mut reporter = Agent::new(
        id,
        &keyed_config(10, 0.5, 100),
        &reporting_node(3),
        std::sync::Arc::clone(&buffer),
    )
    .unwrap();
    // Stand-in for the agent on core 3.
    ReportBuffer::slot(&buffer, 2)
        .unwrap()
        .write(Fix16::from_int(7));

    reporter.set_value(Fix16::from_int(3));
    let bus = RecordingBus::new();
    let host = RecordingHostLink::new();
    // Phase 0: the first tick reports.
    reporter.on_tick(&mut TickContext::new(&bus, &host));

    let reports = host.reports();
    assert_eq!(reports.len(), 1);
    // Own slot holds the post-update value; no neighbours heard, so it decays.
    assert_eq!(reports[0].values[0], reporter.value());
    assert_eq!(reports[0].values[1], Fix16::ZERO);
    assert_eq!(reports[0].values[2], Fix16::from_int(7));
}

#[test]
fn failed_report_is_dropped_without_disturbing_the_solver() {
    let config = keyed_config(130, 0.5, 100);
    let (mut failing, _) = build_agent(agent_id(0, 0, 1), &config, &reporting_node(1));
    let (mut control, _) = build_agent(agent_id(0, 0, 1), &config, &reporting_node(1));
    feed_all_neighbours(&mut failing, Fix16::from_int(5));
    feed_all_neighbours(&mut control, Fix16::from_int(5));

    let bus = RecordingBus::new();
    let dead = RecordingHostLink::failing(TransportError::Timeout { timeout_ms: 100 });
    let live = RecordingHostLink::new();
    assert_eq!(run_ticks(&mut failing, &bus, &dead, 130), 130);
    assert_eq!(run_ticks(&mut control, &bus, &live, 130), 130);

    // Phase 0 over ticks 0..130: ticks 0, 64 and 128.
    assert_eq!(dead.attempts(), 3);
    assert!(dead.reports().is_empty());
    assert_eq!(failing.metrics().reports_dropped, 3);
    assert_eq!(live.reports().len(), 3);
    assert_eq!(failing.value(), control.value());
}

// ── Configuration ────────────────────────────────────────────────────

#[test]
fn agent_builds_from_block_source() {
    let id = agent_id(1, 2, 1);
    let config = keyed_config(64, 0.125, 40);
    let mut source = BlockConfigSource::new();
    source.insert_agent_block(id, config.encode_block());
    source.insert_node_block(id, reporting_node(2).encode_block());

    let agent = Agent::from_source(id, &source, ReportBuffer::shared(4)).unwrap();
    assert_eq!(agent.sim_length(), 64);
    assert_eq!(agent.diffusivity(), Fix16::from_f64(0.125));
    assert_eq!(agent.own_key(), BroadcastKey(40));
    assert_eq!(agent.reporter().map(|r| r.num_reported()), Some(2));
    assert_eq!(agent.reporter().map(|r| r.phase()), Some((1 << 3) | 2));
}

#[test]
fn missing_node_block_refuses_to_start() {
    let id = agent_id(1, 2, 1);
    let mut source = BlockConfigSource::new();
    source.insert_agent_block(id, keyed_config(64, 0.125, 40).encode_block());
    assert!(Agent::from_source(id, &source, ReportBuffer::shared(4)).is_err());
}
