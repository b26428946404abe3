//! Nested graph example: an oscillator through a graph used as an effect
//!
//! Run with: cargo run --example nested_graph --features cpal_sink
//!
//! Sweeps the oscillator frequency live, then switches waveform every few
//! seconds (which rebuilds and restarts the graph).

use std::cell::RefCell;
use std::rc::Rc;
use std::thread::sleep;
use std::time::{Duration, Instant};

use patchbay::backend::dasp::{DaspBackend, BLOCK_SIZE};
use patchbay::{AudioGraph, Composer, CpalDevice, LinkOptions, Node, ProcessingContext, Transport, Waveform};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let Some(device) = CpalDevice::default_output() else {
        eprintln!("No audio output device found!");
        return;
    };
    println!("Using: {} @ {}Hz", device.name(), device.sample_rate());

    let config = device.config();
    let backend = Rc::new(RefCell::new(DaspBackend::new(config)));
    let Some(output) = backend.borrow_mut().take_output() else {
        return;
    };
    let _playback = device.play(output);

    let context = ProcessingContext::from_shared(backend.clone());
    let mut composer = Composer::new(context.clone());

    // the effect: in -> gain -> out
    let mut effect = AudioGraph::new(context).with_name("Quiet");
    let port_in = effect.add_audio_node(Node::input("in")).unwrap();
    let level = effect
        .add_audio_node(Node::gain().with_parameters([("gain", 0.3)]))
        .unwrap();
    let port_out = effect.add_audio_node(Node::output("out")).unwrap();
    effect.link_nodes(port_in, level, LinkOptions::new()).unwrap();
    effect.link_nodes(level, port_out, LinkOptions::new()).unwrap();

    let graph = composer.create_new_graph();
    let osc = graph.add_audio_node(Node::oscillator()).unwrap();
    let fx = graph.add_audio_node(Node::graph(effect)).unwrap();
    let out = graph.add_audio_node(Node::output("main")).unwrap();
    graph
        .link_nodes(osc, fx, LinkOptions::new().to_port("in"))
        .unwrap();
    graph
        .link_nodes(fx, out, LinkOptions::new().from_port("out"))
        .unwrap();
    let id = graph.id();

    let mut transport = Transport::new();
    transport.set_active_graph(&mut composer, id).unwrap();
    transport.start(&mut composer).unwrap();

    println!("Playing... Press Ctrl+C to stop\n");

    let samples_per_block = (BLOCK_SIZE * config.channels) as u64;
    let mut samples_generated: u64 = 0;
    let waveforms = [Waveform::Sine, Waveform::Triangle, Waveform::Sawtooth, Waveform::Square];
    let mut current = 0;
    let audio_start = Instant::now();

    loop {
        let elapsed = audio_start.elapsed().as_secs_f64();
        let samples_should_have_played = (elapsed * config.sample_rate as f64 * config.channels as f64) as u64;

        if samples_generated < samples_should_have_played + 1024 {
            backend.borrow_mut().process();
            samples_generated += samples_per_block;
        } else {
            sleep(Duration::from_micros(500));
        }

        let graph = composer.graph_mut(id).unwrap();
        let freq = 330.0 + 110.0 * (elapsed as f32 * 0.5 * std::f32::consts::PI).sin();
        graph.set_parameters(osc, [("frequency", freq)]).unwrap();

        let step = (elapsed / 3.0) as usize % waveforms.len();
        if step != current {
            current = step;
            println!("waveform: {}", waveforms[step].as_str());
            graph.set_parameters(osc, [("type", waveforms[step])]).unwrap();
        }
    }
}
