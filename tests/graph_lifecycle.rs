use std::cell::RefCell;
use std::rc::Rc;

use patchbay::backend::recording::RecordingBackend;
use patchbay::{AudioGraph, GraphError, LinkOptions, Node, NodeId, NodeType, ObjectId, ProcessingContext};

fn recording_graph() -> (Rc<RefCell<RecordingBackend>>, AudioGraph) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let backend = Rc::new(RefCell::new(RecordingBackend::new()));
    let graph = AudioGraph::new(ProcessingContext::from_shared(backend.clone()));
    (backend, graph)
}

fn object(graph: &AudioGraph, id: NodeId) -> ObjectId {
    graph.find_audio_node(id).unwrap().object().unwrap()
}

fn playback_log(graph: &AudioGraph) -> Rc<RefCell<Vec<bool>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    graph
        .playback_changed()
        .subscribe(move |playing: &bool| sink.borrow_mut().push(*playing));
    log
}

/// A graph with an "in" port through a gain to an "out" port.
fn effect_graph(context: ProcessingContext) -> (AudioGraph, NodeId) {
    let mut inner = AudioGraph::new(context).with_name("Effect");
    let input = inner.add_audio_node(Node::input("in")).unwrap();
    let gain = inner.add_audio_node(Node::gain()).unwrap();
    let output = inner.add_audio_node(Node::output("out")).unwrap();
    inner.link_nodes(input, gain, LinkOptions::new()).unwrap();
    inner.link_nodes(gain, output, LinkOptions::new()).unwrap();
    (inner, gain)
}

#[test]
fn link_then_unlink_restores_the_link_set() {
    let (_backend, mut graph) = recording_graph();
    let a = graph.add_audio_node(Node::oscillator()).unwrap();
    let b = graph.add_audio_node(Node::gain()).unwrap();
    let c = graph.add_audio_node(Node::destination()).unwrap();
    graph.link_nodes(b, c, LinkOptions::new()).unwrap();
    let before = graph.links().to_vec();

    graph.link_nodes(a, b, LinkOptions::new()).unwrap();
    let removed = graph.unlink_nodes(a, b).unwrap();

    assert_eq!((removed.from, removed.to), (a, b));
    assert_eq!(graph.links(), &before[..]);
}

#[test]
fn unlink_takes_the_newest_duplicate() {
    let (_backend, mut graph) = recording_graph();
    let a = graph.add_audio_node(Node::oscillator()).unwrap();
    let b = graph.add_audio_node(Node::gain()).unwrap();
    let first = graph.link_nodes(a, b, LinkOptions::new()).unwrap();
    let second = graph.link_nodes(a, b, LinkOptions::new().to_port("gain")).unwrap();

    assert_eq!(graph.unlink_nodes(a, b).unwrap().id, second);
    assert_eq!(graph.links().len(), 1);
    assert_eq!(graph.links()[0].id, first);
}

#[test]
fn missing_nodes_are_topology_errors() {
    let (_backend, mut graph) = recording_graph();
    let a = graph.add_audio_node(Node::oscillator()).unwrap();
    let ghost = NodeId::new();

    assert!(graph.find_audio_node(ghost).is_none());
    assert_eq!(graph.unlink_nodes(a, ghost), Err(GraphError::NodeNotFound(ghost)));
    assert_eq!(
        graph.set_parameters(ghost, [("gain", 1.0)]),
        Err(GraphError::NodeNotFound(ghost))
    );
    assert!(graph.links().is_empty());
}

#[test]
fn stopping_an_idle_node_does_nothing() {
    let (backend, mut graph) = recording_graph();
    let osc = graph.add_audio_node(Node::oscillator()).unwrap();
    let built = object(&graph, osc);
    backend.borrow_mut().clear();

    graph.stop_node(osc).unwrap();
    graph.stop();

    assert_eq!(object(&graph, osc), built);
    assert!(backend.borrow().calls().is_empty());
}

#[test]
fn starting_twice_rebuilds_every_object() {
    let (backend, mut graph) = recording_graph();
    let osc = graph.add_audio_node(Node::oscillator()).unwrap();
    let dest = graph.add_audio_node(Node::destination()).unwrap();
    graph.link_nodes(osc, dest, LinkOptions::new()).unwrap();
    let log = playback_log(&graph);

    graph.start();
    let first = object(&graph, osc);
    graph.start();

    assert_ne!(object(&graph, osc), first);
    assert_eq!(*log.borrow(), vec![true, false, true]);
    assert_eq!(backend.borrow().connects().len(), 2);
    assert_eq!(backend.borrow().live_objects(), 2);
}

#[test]
fn rejected_connections_are_skipped() {
    let (backend, mut graph) = recording_graph();
    let osc = graph.add_audio_node(Node::oscillator()).unwrap();
    let lfo = graph.add_audio_node(Node::oscillator()).unwrap();
    let gain = graph.add_audio_node(Node::gain()).unwrap();
    graph.link_nodes(osc, gain, LinkOptions::new()).unwrap();
    graph.link_nodes(lfo, gain, LinkOptions::new()).unwrap();
    backend.borrow_mut().reject_connections_into(object(&graph, gain));

    graph.start();

    assert!(graph.find_audio_node(gain).unwrap().is_playing());
    assert_eq!(backend.borrow().connects().len(), 2);
}

#[test]
fn parameter_links_target_the_parameter() {
    let (backend, mut graph) = recording_graph();
    let lfo = graph.add_audio_node(Node::oscillator()).unwrap();
    let gain = graph.add_audio_node(Node::gain()).unwrap();
    graph
        .link_nodes(lfo, gain, LinkOptions::new().to_port("gain"))
        .unwrap();

    graph.start();

    let calls = backend.borrow().calls().to_vec();
    assert!(calls.iter().any(|call| matches!(
        call,
        patchbay::backend::recording::BackendCall::Connect { param: Some(param), .. } if param == "gain"
    )));
}

#[test]
fn removing_a_node_drops_its_links() {
    let (backend, mut graph) = recording_graph();
    let a = graph.add_audio_node(Node::oscillator()).unwrap();
    let b = graph.add_audio_node(Node::gain()).unwrap();
    let c = graph.add_audio_node(Node::destination()).unwrap();
    graph.link_nodes(a, b, LinkOptions::new()).unwrap();
    graph.link_nodes(b, c, LinkOptions::new()).unwrap();

    let link_updates = Rc::new(RefCell::new(Vec::new()));
    let sink = link_updates.clone();
    graph
        .links_changed()
        .subscribe(move |links: &[patchbay::Link]| sink.borrow_mut().push(links.len()));

    let removed = graph.remove_audio_node(b).unwrap();

    assert_eq!(removed.node_type(), NodeType::Gain);
    assert!(graph.links().is_empty());
    assert_eq!(*link_updates.borrow(), vec![0]);
    assert_eq!(backend.borrow().live_objects(), 2);
}

#[test]
fn links_on_a_playing_graph_connect_live() {
    let (backend, mut graph) = recording_graph();
    let osc = graph.add_audio_node(Node::oscillator()).unwrap();
    let dest = graph.add_audio_node(Node::destination()).unwrap();
    graph.start();
    let log = playback_log(&graph);

    graph.link_nodes(osc, dest, LinkOptions::new()).unwrap();

    assert!(log.borrow().is_empty());
    assert_eq!(
        backend.borrow().connects(),
        vec![(object(&graph, osc), object(&graph, dest))]
    );
}

#[test]
fn unlinking_a_playing_graph_restarts_it() {
    let (backend, mut graph) = recording_graph();
    let osc = graph.add_audio_node(Node::oscillator()).unwrap();
    let dest = graph.add_audio_node(Node::destination()).unwrap();
    graph.link_nodes(osc, dest, LinkOptions::new()).unwrap();
    graph.start();
    let log = playback_log(&graph);
    backend.borrow_mut().clear();

    graph.unlink_nodes(osc, dest).unwrap();

    assert_eq!(*log.borrow(), vec![false, true]);
    assert!(backend.borrow().connects().is_empty());
}

#[test]
fn muted_links_stay_disconnected() {
    let (backend, mut graph) = recording_graph();
    let osc = graph.add_audio_node(Node::oscillator()).unwrap();
    let dest = graph.add_audio_node(Node::destination()).unwrap();
    let link = graph
        .link_nodes(osc, dest, LinkOptions::new().muted(true))
        .unwrap();

    graph.start();
    assert!(backend.borrow().connects().is_empty());

    graph.set_link_muted(link, false).unwrap();
    assert_eq!(backend.borrow().connects().len(), 1);
    assert!(graph.is_playing());
}

#[test]
fn nested_graphs_connect_through_named_ports() {
    let (backend, mut outer) = recording_graph();
    let (inner, _gain) = effect_graph(outer.context().clone());

    let osc = outer.add_audio_node(Node::oscillator()).unwrap();
    let fx = outer.add_audio_node(Node::graph(inner)).unwrap();
    let dest = outer.add_audio_node(Node::destination()).unwrap();
    outer
        .link_nodes(osc, fx, LinkOptions::new().to_port("in"))
        .unwrap();
    outer
        .link_nodes(fx, dest, LinkOptions::new().from_port("out"))
        .unwrap();

    outer.start();

    let inner = outer.find_audio_node(fx).unwrap().subgraph().unwrap();
    assert!(inner.is_playing());
    assert_eq!(outer.find_audio_node(fx).unwrap().label(), "Effect");

    let port_in = inner.input_port("in").unwrap().object().unwrap();
    let port_out = inner.output_port("out").unwrap().object().unwrap();
    let connects = backend.borrow().connects();
    assert_eq!(connects.len(), 4);
    assert!(connects.contains(&(object(&outer, osc), port_in)));
    assert!(connects.contains(&(port_out, object(&outer, dest))));

    outer.stop();
    assert!(!outer.find_audio_node(fx).unwrap().subgraph().unwrap().is_playing());
}

#[test]
fn unknown_ports_only_lose_their_link() {
    let (backend, mut outer) = recording_graph();
    let (inner, _gain) = effect_graph(outer.context().clone());

    let osc = outer.add_audio_node(Node::oscillator()).unwrap();
    let fx = outer.add_audio_node(Node::graph(inner)).unwrap();
    let dest = outer.add_audio_node(Node::destination()).unwrap();
    outer
        .link_nodes(osc, fx, LinkOptions::new().to_port("sidechain"))
        .unwrap();
    outer.link_nodes(fx, dest, LinkOptions::new()).unwrap();
    outer.link_nodes(osc, dest, LinkOptions::new()).unwrap();

    outer.start();

    assert!(outer.is_playing());
    assert!(outer.find_audio_node(dest).unwrap().is_playing());
    // the two inner links plus osc -> dest
    assert_eq!(backend.borrow().connects().len(), 3);
}

#[test]
fn nested_graphs_move_to_the_outer_backend() {
    let (backend, mut outer) = recording_graph();
    let elsewhere = Rc::new(RefCell::new(RecordingBackend::new()));
    let (inner, _gain) = effect_graph(ProcessingContext::from_shared(elsewhere.clone()));
    assert_eq!(elsewhere.borrow().live_objects(), 3);

    let fx = outer.add_audio_node(Node::graph(inner)).unwrap();

    assert_eq!(elsewhere.borrow().live_objects(), 0);
    assert_eq!(backend.borrow().live_objects(), 3);
    let inner = outer.find_audio_node(fx).unwrap().subgraph().unwrap();
    assert!(inner.context().same_as(outer.context()));
    assert_eq!(inner.input_ports(), vec!["in"]);
    assert_eq!(inner.output_ports(), vec!["out"]);
}

#[test]
fn editing_a_nested_graph() {
    let (backend, mut outer) = recording_graph();
    let (inner, gain) = effect_graph(outer.context().clone());
    let fx = outer.add_audio_node(Node::graph(inner)).unwrap();
    let osc = outer.add_audio_node(Node::oscillator()).unwrap();
    outer
        .link_nodes(osc, fx, LinkOptions::new().to_port("in"))
        .unwrap();
    outer.start();
    let log = playback_log(&outer);

    // streamed into the running gain: nothing restarts
    outer
        .edit_subgraph(fx, |inner| inner.set_parameters(gain, [("gain", 0.2)]))
        .unwrap()
        .unwrap();
    assert!(log.borrow().is_empty());
    assert_eq!(backend.borrow().schedules().len(), 1);

    // restarting the inner graph breaks the links into it, so the outer
    // graph restarts as well
    backend.borrow_mut().clear();
    outer.edit_subgraph(fx, |inner| inner.start()).unwrap();
    assert_eq!(*log.borrow(), vec![false, true]);
    let port_in = outer
        .find_audio_node(fx)
        .unwrap()
        .subgraph()
        .unwrap()
        .input_port("in")
        .unwrap()
        .object()
        .unwrap();
    assert!(backend
        .borrow()
        .connects()
        .contains(&(object(&outer, osc), port_in)));

    assert_eq!(
        outer.edit_subgraph(osc, |_| ()),
        Err(GraphError::NotAGraph(osc))
    );
}

#[test]
fn a_playing_graph_stops_when_nested_in_an_idle_one() {
    let (_backend, mut outer) = recording_graph();
    let mut inner = AudioGraph::new(outer.context().clone());
    let osc = inner.add_audio_node(Node::oscillator()).unwrap();
    inner.start();
    assert!(inner.find_audio_node(osc).unwrap().is_playing());

    let fx = outer.add_audio_node(Node::graph(inner)).unwrap();
    let node = outer.find_audio_node(fx).unwrap();
    let inner = node.subgraph().unwrap();
    assert!(!outer.is_playing());
    assert!(!node.is_playing());
    assert!(!inner.is_playing());
    assert!(!inner.find_audio_node(osc).unwrap().is_playing());

    // starting it through an edit doesn't stick either
    outer.edit_subgraph(fx, |inner| inner.start()).unwrap();
    assert!(!outer.find_audio_node(fx).unwrap().subgraph().unwrap().is_playing());
}

#[test]
fn node_edits_notify_the_nodes_channel_once() {
    let (_backend, mut graph) = recording_graph();
    let sizes = Rc::new(RefCell::new(Vec::new()));
    let sink = sizes.clone();
    graph
        .nodes_changed()
        .subscribe(move |nodes: &[Node]| sink.borrow_mut().push(nodes.len()));

    let osc = graph.add_audio_node(Node::oscillator()).unwrap();
    let gain = graph.add_audio_node(Node::gain()).unwrap();
    assert_eq!(*sizes.borrow(), vec![1, 2]);

    graph.set_label(osc, "lead").unwrap();
    graph.set_position(gain, 10.0, 20.0).unwrap();
    assert_eq!(*sizes.borrow(), vec![1, 2, 2, 2]);
    assert_eq!(graph.find_audio_node(osc).unwrap().label(), "lead");

    graph.link_nodes(osc, gain, LinkOptions::new()).unwrap();
    assert_eq!(sizes.borrow().len(), 4);

    graph.remove_audio_node(osc).unwrap();
    assert_eq!(*sizes.borrow(), vec![1, 2, 2, 2, 1]);
}

#[test]
fn regenerated_ids_are_fresh() {
    let (_backend, mut graph) = recording_graph();
    let id = graph.add_audio_node(Node::oscillator()).unwrap();
    let mut node = graph.remove_audio_node(id).unwrap();

    node.regenerate_id();
    assert_ne!(node.id(), id);

    let again = graph.add_audio_node(node).unwrap();
    assert_ne!(again, id);
    assert!(graph.find_audio_node(id).is_none());
    assert!(graph.find_audio_node(again).is_some());
}
