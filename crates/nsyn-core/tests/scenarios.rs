//! End-to-end connection scenarios: establishment, delay limits,
//! recalibration and checkpoint output

use nsyn_core::{
    establish,
    test_utils::{BareEdge, StubUnit},
    ConnectRequest, Connection, ConnectionError, Connector, KernelConfig, Network, NodeAddress,
    NodeId, Resolution, SignalType, SimulationContext, StaticSynapse, SynapseTypeId,
    TargetIdentifier, ThreadId, TimeConverter, MAX_DELAY_STEPS,
};
use nsyn_storage::{CheckpointSink, ChunkedSink, StreamSink};
use std::error::Error;

fn syn(id: u16) -> SynapseTypeId {
    SynapseTypeId::new(id).unwrap()
}

fn address(slot: u32) -> NodeAddress {
    NodeAddress::new(ThreadId::new(0), nsyn_core::LocalSlot::new(slot))
}

#[test]
fn spiking_edge_gets_requested_receptor_and_default_delay() -> Result<(), Box<dyn Error>> {
    let ctx = SimulationContext::default();
    let source = StubUnit::spiking(NodeId::new(1));
    let target = StubUnit::spiking(NodeId::new(2)).with_receptors(1..=4);
    let request = ConnectRequest::new(syn(3)).receptor(2);

    let edge: StaticSynapse = establish(&ctx, &source, &target, address(1), &request)?;
    assert_eq!(edge.core().rport(), 2);
    assert_eq!(edge.core().synapse_type_id(), syn(3));
    assert_eq!(edge.core().delay_steps(), 1);

    let mut connector = Connector::new(NodeId::new(1), ThreadId::new(0), syn(3));
    assert_eq!(connector.append(edge)?, 0);
    Ok(())
}

#[test]
fn spike_source_cannot_reach_rate_target() -> Result<(), Box<dyn Error>> {
    let mut net = Network::new(&KernelConfig::default())?;
    let syn = net.register_synapse::<StaticSynapse>("static_synapse")?;
    let target = StubUnit::spiking(NodeId::new(2)).with_signals(SignalType::RATE, SignalType::RATE);
    net.add_node(ThreadId::new(0), Box::new(StubUnit::spiking(NodeId::new(1))))?;
    net.add_node(ThreadId::new(0), Box::new(target))?;

    for _ in 0..2 {
        let err = net
            .connect::<StaticSynapse>(NodeId::new(1), NodeId::new(2), ConnectRequest::new(syn))
            .unwrap_err();
        assert!(matches!(err, ConnectionError::IllegalConnection { .. }));
        assert_eq!(net.num_connections(), 0);
        assert!(net.partition(ThreadId::new(0)).unwrap().connections().is_empty());
        assert_eq!(net.context().delay_checker().extrema(), None);
    }
    Ok(())
}

#[test]
fn rejected_connection_leaves_network_unchanged() -> Result<(), Box<dyn Error>> {
    let mut net = Network::new(&KernelConfig::default())?;
    let syn = net.register_synapse::<StaticSynapse>("static_synapse")?;
    let source = StubUnit::spiking(NodeId::new(2)).with_signals(SignalType::RATE, SignalType::RATE);
    net.add_node(ThreadId::new(0), Box::new(StubUnit::spiking(NodeId::new(1))))?;
    net.add_node(ThreadId::new(0), Box::new(source))?;

    // test events pass, only the signal masks are disjoint
    for _ in 0..2 {
        let request = ConnectRequest::new(syn).delay_ms(2.0);
        let err = net
            .connect::<StaticSynapse>(NodeId::new(2), NodeId::new(1), request)
            .unwrap_err();
        assert!(matches!(err, ConnectionError::IllegalConnection { .. }));
        assert_eq!(net.num_connections(), 0);
        assert!(net.partition(ThreadId::new(0)).unwrap().connections().is_empty());
        assert_eq!(net.context().delay_checker().extrema(), None);
    }
    Ok(())
}

#[test]
fn delay_one_past_the_field_is_rejected() {
    let target = TargetIdentifier::Direct {
        slot: nsyn_core::LocalSlot::new(0),
        rport: 0,
    };
    let mut edge = StaticSynapse::from_core(nsyn_core::EdgeCore::new(target, syn(0)));
    edge.core_mut().set_delay_steps(40).unwrap();

    let err = edge.core_mut().set_delay_steps(2_097_152).unwrap_err();
    assert!(matches!(err, ConnectionError::Configuration { .. }));
    assert_eq!(edge.core().delay_steps(), 40);
    assert_eq!(MAX_DELAY_STEPS, 2_097_151);
}

#[test]
fn halving_the_step_doubles_stored_delays() -> Result<(), Box<dyn Error>> {
    let target = TargetIdentifier::Direct {
        slot: nsyn_core::LocalSlot::new(0),
        rport: 0,
    };
    let mut connector = Connector::new(NodeId::new(1), ThreadId::new(0), syn(0));
    let mut edge = BareEdge::from_core(nsyn_core::EdgeCore::new(target, syn(0)));
    edge.core_mut().set_delay_steps(5)?;
    connector.append(edge)?;

    let conv = TimeConverter::new(Resolution::from_ms(0.2, 1000)?, Resolution::from_ms(0.1, 1000)?);
    connector.calibrate(&conv)?;
    assert_eq!(connector.get(0)?.core().delay_steps(), 10);
    Ok(())
}

#[test]
fn network_resolution_change_recalibrates_every_thread() -> Result<(), Box<dyn Error>> {
    let config = KernelConfig {
        resolution_ms: 0.2,
        num_threads: 2,
        ..Default::default()
    };
    let mut net = Network::new(&config)?;
    let syn = net.register_synapse::<StaticSynapse>("static_synapse")?;
    for id in 0..4u64 {
        net.add_node(net.thread_for(NodeId::new(id)), Box::new(StubUnit::spiking(NodeId::new(id))))?;
    }
    let mut ids = Vec::new();
    for target in 1..4u64 {
        ids.push(net.connect::<StaticSynapse>(
            NodeId::new(0),
            NodeId::new(target),
            ConnectRequest::new(syn).delay_ms(1.0),
        )?);
    }
    assert_eq!(net.edge_status(&ids[0])?.delay_steps, 5);

    net.change_resolution(Resolution::from_ms(0.1, 1000)?)?;
    for id in &ids {
        let status = net.edge_status(id)?;
        assert_eq!(status.delay_steps, 10);
        assert!((status.delay_ms - 1.0).abs() < 1e-12);
    }
    assert_eq!(net.context().delay_checker().min_delay(), Some(10));
    Ok(())
}

fn three_edges() -> Connector<StaticSynapse> {
    let res = Resolution::default();
    let mut connector = Connector::new(NodeId::new(9), ThreadId::new(0), syn(0));
    for (slot, weight) in [1.0, 2.5, -0.3].into_iter().enumerate() {
        let target = TargetIdentifier::Direct {
            slot: nsyn_core::LocalSlot::new(slot as u32),
            rport: 0,
        };
        let mut edge = StaticSynapse::from_core(nsyn_core::EdgeCore::new(target, syn(0)));
        edge.set_weight(weight).unwrap();
        edge.core_mut().set_delay_ms(1.0, &res).unwrap();
        connector.append(edge).unwrap();
    }
    connector
}

#[test]
fn chunked_dump_matches_plain_dump() -> Result<(), Box<dyn Error>> {
    let mut nodes = nsyn_core::ThreadNodes::new(ThreadId::new(0));
    for id in 0..3 {
        nodes.push(Box::new(StubUnit::spiking(NodeId::new(id))));
    }
    let table = nsyn_core::NodeTable::new();
    let res = Resolution::default();
    let connector = three_edges();

    let mut plain = StreamSink::new(Vec::new());
    connector.dump(&mut plain, &nodes, &table, &res)?;
    plain.finish()?;
    let plain = plain.into_inner();
    assert_eq!(plain.len(), 3 * 21);

    // two records per chunk, so the third forces a flush mid-sequence
    let mut chunked = ChunkedSink::new(Vec::new(), 42, 42)?;
    connector.dump(&mut chunked, &nodes, &table, &res)?;
    assert!(chunked.flush_count() >= 1);
    chunked.finish()?;
    assert_eq!(chunked.into_inner(), plain);
    Ok(())
}
