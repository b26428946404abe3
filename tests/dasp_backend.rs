use std::cell::RefCell;
use std::rc::Rc;

use patchbay::backend::dasp::{DaspBackend, DaspConfig, BLOCK_SIZE};
use patchbay::{AudioGraph, Composer, GraphId, LinkOptions, Node, NodeId, ProcessingContext, Transport};
use rtrb::Consumer;

struct Rig {
    backend: Rc<RefCell<DaspBackend>>,
    output: Consumer<f32>,
    composer: Composer,
    transport: Transport,
    graph: GraphId,
    osc: NodeId,
}

/// oscillator -> gain -> output port, mono output.
fn rig() -> Rig {
    let backend = Rc::new(RefCell::new(DaspBackend::new(
        DaspConfig::new(48_000).with_channels(1),
    )));
    let output = backend.borrow_mut().take_output().unwrap();
    let mut composer = Composer::new(ProcessingContext::from_shared(backend.clone()));

    let graph = composer.create_new_graph();
    let osc = graph
        .add_audio_node(Node::oscillator().with_parameters([("type", "square")]))
        .unwrap();
    let gain = graph.add_audio_node(Node::gain()).unwrap();
    let out = graph.add_audio_node(Node::output("main")).unwrap();
    graph.link_nodes(osc, gain, LinkOptions::new()).unwrap();
    graph.link_nodes(gain, out, LinkOptions::new()).unwrap();
    let graph = graph.id();

    Rig {
        backend,
        output,
        composer,
        transport: Transport::new(),
        graph,
        osc,
    }
}

fn render_block(rig: &mut Rig) -> Vec<f32> {
    rig.backend.borrow_mut().process();
    (0..BLOCK_SIZE).filter_map(|_| rig.output.pop().ok()).collect()
}

#[test]
fn silent_until_the_transport_starts() {
    let mut rig = rig();
    let block = render_block(&mut rig);
    assert_eq!(block.len(), BLOCK_SIZE);
    assert!(block.iter().all(|s| *s == 0.0));
}

#[test]
fn playing_graph_reaches_the_output() {
    let mut rig = rig();
    rig.transport.set_active_graph(&mut rig.composer, rig.graph).unwrap();
    rig.transport.start(&mut rig.composer).unwrap();

    let block = render_block(&mut rig);
    // square wave at full scale through the default gain of 0.5
    let peak = block.iter().fold(0.0f32, |peak, s| peak.max(s.abs()));
    assert!(peak > 0.4 && peak <= 0.5, "peak was {}", peak);

    rig.transport.stop(&mut rig.composer);
    let block = render_block(&mut rig);
    assert!(block.iter().all(|s| *s == 0.0));
}

#[test]
fn live_frequency_applies_from_the_next_block() {
    let mut rig = rig();
    rig.transport.set_active_graph(&mut rig.composer, rig.graph).unwrap();
    rig.transport.start(&mut rig.composer).unwrap();
    render_block(&mut rig);

    let objects = rig.backend.borrow().object_count();
    rig.composer
        .graph_mut(rig.graph)
        .unwrap()
        .set_parameters(rig.osc, [("frequency", 0.0)])
        .unwrap();

    // no rebuild happened
    assert_eq!(rig.backend.borrow().object_count(), objects);
    assert!(rig.composer.graph(rig.graph).unwrap().is_playing());

    // a 0 Hz square holds its level for the whole block
    let block = render_block(&mut rig);
    assert!(block.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn cyclic_links_are_dropped_but_the_graph_plays() {
    let mut rig = rig();
    let graph = rig.composer.graph_mut(rig.graph).unwrap();
    let a = graph.add_audio_node(Node::gain()).unwrap();
    let b = graph.add_audio_node(Node::gain()).unwrap();
    graph.link_nodes(a, b, LinkOptions::new()).unwrap();
    graph.link_nodes(b, a, LinkOptions::new()).unwrap();

    rig.transport.set_active_graph(&mut rig.composer, rig.graph).unwrap();
    rig.transport.start(&mut rig.composer).unwrap();

    let block = render_block(&mut rig);
    assert!(block.iter().any(|s| *s != 0.0));
}

#[test]
fn unrouted_oscillator_takes_live_edits_without_restarting() {
    let backend = Rc::new(RefCell::new(DaspBackend::new(DaspConfig::default())));
    let mut graph = AudioGraph::new(ProcessingContext::from_shared(backend.clone()));
    let osc = graph.add_audio_node(Node::oscillator()).unwrap();
    let gain = graph.add_audio_node(Node::gain()).unwrap();
    graph.link_nodes(osc, gain, LinkOptions::new()).unwrap();
    graph.start();

    let restarts = Rc::new(RefCell::new(0));
    let counter = restarts.clone();
    graph.playback_changed().subscribe(move |playing: &bool| {
        if !*playing {
            *counter.borrow_mut() += 1;
        }
    });
    let objects = backend.borrow().object_count();

    for step in 0..200 {
        let freq = 220.0 + step as f32;
        graph.set_parameters(osc, [("frequency", freq)]).unwrap();
        backend.borrow_mut().process();
    }

    assert_eq!(*restarts.borrow(), 0);
    assert_eq!(backend.borrow().object_count(), objects);
    assert!(graph.find_audio_node(osc).unwrap().is_playing());
}
