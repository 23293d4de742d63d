//! Integration tests for graph configuration, track setup and the render loops.

mod common;

use cadenza_core::{
    ComponentDescriptor, ComponentSubtype, Error, LiveMonitor, MonitorOutcome, OfflineRenderer,
    OverloadMonitor, PlayOptions, RenderMode, RenderParameters, Session, Silent, Status,
    SynthSettings, TrackSelection, configure_graph, initialize_tracks, locate_synth,
    session_length,
};
use common::{
    CountingSink, Event, MockGraph, MockSequence, MockTransport, Recorder, StepPacer, effect,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Graph configuration
// ---------------------------------------------------------------------------

#[test]
fn offline_replaces_device_with_generic_output() {
    let (mut graph, [synth, limiter, device]) = MockGraph::sequence_default(48000.0);
    let mut params = RenderParameters::offline(44100.0, 512);
    let overloads = Arc::new(OverloadMonitor::new());

    let output = configure_graph(&mut graph, &mut params, &overloads).unwrap();

    assert_eq!(graph.removed, vec![device]);
    assert_ne!(output.node, device);
    assert_eq!(
        graph.descriptor(output.node).subtype,
        ComponentSubtype::GenericOutput
    );
    assert_eq!(graph.ids().len(), 3, "node count unchanged by the swap");
    assert_eq!(graph.source_of(output.node), Some(limiter));
    assert_eq!(graph.source_of(limiter), Some(synth));
    assert_eq!(params.sample_rate, 44100.0, "offline rate is caller-chosen");
    assert_eq!(graph.state(output.node).borrow().sample_rate, Some(44100.0));
}

#[test]
fn offline_does_not_reconnect_the_synth() {
    let (mut graph, [synth, ..]) = MockGraph::sequence_default(48000.0);
    let mut params = RenderParameters::offline(44100.0, 256);
    configure_graph(&mut graph, &mut params, &Arc::new(OverloadMonitor::new())).unwrap();

    let feeds: Vec<_> = graph
        .connections
        .values()
        .filter(|(src, _)| *src == synth)
        .collect();
    assert_eq!(feeds.len(), 1, "synth keeps its single downstream edge");
}

#[test]
fn live_keeps_device_and_adopts_its_rate() {
    let (mut graph, [_, _, device]) = MockGraph::sequence_default(48000.0);
    let mut params = RenderParameters::live(256);
    let overloads = Arc::new(OverloadMonitor::new());

    let output = configure_graph(&mut graph, &mut params, &overloads).unwrap();

    assert_eq!(output.node, device);
    assert!(graph.removed.is_empty());
    assert_eq!(params.sample_rate, 48000.0);

    let state = graph.state(device);
    let state = state.borrow();
    assert_eq!(state.buffer_frame_size, Some(256));
    assert_eq!(state.listeners.len(), 1);
    assert!(Arc::ptr_eq(&state.listeners[0], &overloads));
}

#[test]
fn live_propagates_device_rate_to_every_other_node() {
    let (mut graph, [synth, limiter, device]) = MockGraph::sequence_default(96000.0);
    let mut params = RenderParameters::live(128);
    configure_graph(&mut graph, &mut params, &Arc::new(OverloadMonitor::new())).unwrap();

    assert_eq!(graph.state(synth).borrow().sample_rate, Some(96000.0));
    assert_eq!(graph.state(limiter).borrow().sample_rate, Some(96000.0));
    assert_eq!(
        graph.state(device).borrow().sample_rate,
        None,
        "device output rate is never written"
    );
}

#[test]
fn every_node_gets_the_slice_limit_exactly_once() {
    for mode in [RenderMode::Live, RenderMode::Offline] {
        let (mut graph, _) = MockGraph::sequence_default(44100.0);
        graph.push(effect(b"dely"));
        let mut params = match mode {
            RenderMode::Live => RenderParameters::live(1024),
            RenderMode::Offline => RenderParameters::offline(22050.0, 1024),
        };
        configure_graph(&mut graph, &mut params, &Arc::new(OverloadMonitor::new())).unwrap();

        for node in graph.ids() {
            let state = graph.state(node);
            let state = state.borrow();
            assert_eq!(state.max_frames, Some(1024), "{mode:?} {node}");
            assert_eq!(state.sets, 1, "{mode:?} {node}");
        }
    }
}

#[test]
fn extra_effects_are_routed_into_generic_output_offline() {
    let (mut graph, _) = MockGraph::sequence_default(44100.0);
    let extra = graph.push(effect(b"revb"));
    let mut params = RenderParameters::offline(44100.0, 512);
    let output =
        configure_graph(&mut graph, &mut params, &Arc::new(OverloadMonitor::new())).unwrap();

    // Single input bus: the last connected node wins.
    assert_eq!(graph.source_of(output.node), Some(extra));
}

#[test]
fn missing_output_is_not_found() {
    let mut graph = MockGraph::new(44100.0);
    graph.push(ComponentDescriptor::SYNTH);
    let mut params = RenderParameters::offline(44100.0, 512);

    let err = configure_graph(&mut graph, &mut params, &Arc::new(OverloadMonitor::new()))
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(graph.removed.is_empty());
}

#[test]
fn collaborator_failure_names_the_operation() {
    let (mut graph, _) = MockGraph::sequence_default(44100.0);
    graph.fail_on = Some("remove_node");
    let mut params = RenderParameters::offline(44100.0, 512);

    let err = configure_graph(&mut graph, &mut params, &Arc::new(OverloadMonitor::new()))
        .unwrap_err();
    assert_eq!(err.status(), Some(Status::PARAM));
    assert_eq!(err.to_string(), "GraphRemoveNode (-50)");
}

#[test]
fn locate_synth_finds_the_only_synth() {
    let (graph, [synth, ..]) = MockGraph::sequence_default(44100.0);
    assert_eq!(locate_synth(&graph).unwrap().node, synth);
}

#[test]
fn locate_synth_rejects_zero_or_many() {
    let mut graph = MockGraph::new(44100.0);
    graph.push(ComponentDescriptor::DEVICE_OUTPUT);
    assert!(matches!(
        locate_synth(&graph),
        Err(Error::NotFound("synthesizer"))
    ));

    graph.push(ComponentDescriptor::SYNTH);
    graph.push(ComponentDescriptor::SYNTH);
    assert!(matches!(
        locate_synth(&graph),
        Err(Error::MultipleSynths(2))
    ));
}

// ---------------------------------------------------------------------------
// Tracks
// ---------------------------------------------------------------------------

#[test]
fn selection_mutes_everything_else() {
    let mut sequence = MockSequence::new(&[4.0, 16.0, 8.0, 12.0]);
    let mut recorder = Recorder::default();

    let longest = initialize_tracks(
        &mut sequence,
        &TrackSelection::only([1, 3]),
        &mut recorder,
    )
    .unwrap();

    assert_eq!(longest, 16.0);
    assert_eq!(sequence.muted, vec![true, false, true, false]);
    assert_eq!(recorder.events, vec![Event::Audible(vec![1, 3])]);
}

#[test]
fn empty_selection_unmutes_everything() {
    let mut sequence = MockSequence::new(&[4.0, 6.0]);
    sequence.muted = vec![true, true];
    let mut recorder = Recorder::default();

    let longest = initialize_tracks(&mut sequence, &TrackSelection::all(), &mut recorder).unwrap();

    assert_eq!(longest, 6.0);
    assert_eq!(sequence.muted, vec![false, false]);
    assert!(recorder.events.is_empty());
}

#[test]
fn muted_tracks_still_count_toward_length() {
    let mut sequence = MockSequence::new(&[32.0, 2.0]);
    let longest =
        initialize_tracks(&mut sequence, &TrackSelection::only([1]), &mut Silent).unwrap();
    assert_eq!(session_length(longest), 40.0);
}

#[test]
fn no_tracks_gives_tail_only() {
    let mut sequence = MockSequence::new(&[]);
    let longest = initialize_tracks(&mut sequence, &TrackSelection::all(), &mut Silent).unwrap();
    assert_eq!(session_length(longest), 8.0);
}

// ---------------------------------------------------------------------------
// Offline render loop
// ---------------------------------------------------------------------------

#[test]
fn offline_render_stops_at_session_length() {
    let (mut graph, _) = MockGraph::sequence_default(44100.0);
    let mut params = RenderParameters::offline(44100.0, 512);
    let mut output =
        configure_graph(&mut graph, &mut params, &Arc::new(OverloadMonitor::new())).unwrap();
    // 120 BPM: 20 beats is ten seconds, 441000 frames.
    let transport = MockTransport::new(graph.rendered.clone(), 44100.0, 120.0);
    let mut sink = CountingSink::default();
    let mut recorder = Recorder::default();

    let summary = OfflineRenderer::new(&params)
        .render(&mut output.unit, &mut sink, &transport, 20.0, &mut recorder)
        .unwrap();

    assert_eq!(summary.blocks, 862);
    assert_eq!(summary.frames, 862 * 512);
    assert!(summary.final_time >= 20.0);
    assert_eq!(sink.writes, 862);
    assert_eq!(transport.polls.get(), 862);
    assert_eq!(recorder.count(|e| matches!(e, Event::Progress(_))), 1);
    assert!(sink.peak > 0.0);
}

#[test]
fn offline_render_always_renders_one_block() {
    let (mut graph, _) = MockGraph::sequence_default(44100.0);
    let mut params = RenderParameters::offline(44100.0, 64);
    let mut output =
        configure_graph(&mut graph, &mut params, &Arc::new(OverloadMonitor::new())).unwrap();
    let transport = MockTransport::new(graph.rendered.clone(), 44100.0, 120.0);
    let mut sink = CountingSink::default();

    let summary = OfflineRenderer::new(&params)
        .render(&mut output.unit, &mut sink, &transport, 0.0, &mut Silent)
        .unwrap();
    assert_eq!(summary.blocks, 1);
}

#[test]
fn offline_render_without_slice_limit_fails() {
    let (graph, _) = MockGraph::sequence_default(44100.0);
    let mut unit = cadenza_core::find_output(&graph).unwrap().unit;
    let transport = MockTransport::new(graph.rendered.clone(), 44100.0, 120.0);
    let params = RenderParameters::offline(44100.0, 512);

    let err = OfflineRenderer::new(&params)
        .render(&mut unit, &mut CountingSink::default(), &transport, 4.0, &mut Silent)
        .unwrap_err();
    assert_eq!(err.status(), Some(Status::UNINITIALIZED));
    assert!(err.to_string().starts_with("AudioUnitRender"));
}

// ---------------------------------------------------------------------------
// Live monitor loop
// ---------------------------------------------------------------------------

#[test]
fn cancellation_waits_one_more_tick_than_the_limit() {
    let (graph, _) = MockGraph::sequence_default(44100.0);
    let transport = MockTransport::new(graph.rendered.clone(), 44100.0, 120.0);
    let mut pacer = StepPacer::new(graph.rendered.clone(), 0);
    let mut recorder = Recorder::default();

    let outcome = LiveMonitor::new()
        .cancel_after(Some(10))
        .monitor_with(
            &mut pacer,
            &transport,
            Some(&graph),
            1000.0,
            &OverloadMonitor::new(),
            &mut recorder,
        )
        .unwrap();

    assert_eq!(outcome, MonitorOutcome::Cancelled { ticks: 11 });
    assert_eq!(pacer.waits, 11);
    assert_eq!(transport.polls.get(), 10, "cancelled tick does not poll");
    assert_eq!(recorder.count(|e| matches!(e, Event::Status(..))), 10);
}

#[test]
fn monitor_ends_when_position_reaches_length() {
    let (graph, _) = MockGraph::sequence_default(44100.0);
    let transport = MockTransport::new(graph.rendered.clone(), 44100.0, 120.0);
    // Two seconds of audio per tick is four beats.
    let mut pacer = StepPacer::new(graph.rendered.clone(), 88200);
    let mut recorder = Recorder::default();

    let outcome = LiveMonitor::new()
        .monitor_with(
            &mut pacer,
            &transport,
            Some(&graph),
            12.0,
            &OverloadMonitor::new(),
            &mut recorder,
        )
        .unwrap();

    assert_eq!(
        outcome,
        MonitorOutcome::ReachedEnd {
            ticks: 3,
            beats: 12.0
        }
    );
    assert_eq!(recorder.events.last(), Some(&Event::Status(12.0, Some(0.125))));
}

#[test]
fn overloads_are_reported_before_cancellation() {
    let (graph, _) = MockGraph::sequence_default(44100.0);
    let transport = MockTransport::new(graph.rendered.clone(), 44100.0, 120.0);
    let overloads = OverloadMonitor::new();
    overloads.mark_started();
    overloads.notify();
    overloads.notify();
    let mut recorder = Recorder::default();

    let outcome = LiveMonitor::new()
        .cancel_after(Some(0))
        .monitor_with(
            &mut StepPacer::new(graph.rendered.clone(), 0),
            &transport,
            Some(&graph),
            100.0,
            &overloads,
            &mut recorder,
        )
        .unwrap();

    assert_eq!(outcome.ticks(), 1);
    assert_eq!(recorder.events, vec![Event::Overload(2)]);
    assert_eq!(overloads.pending(), 0);
}

#[test]
fn concurrent_overloads_are_never_lost() {
    const NOTIFICATIONS: u64 = 20_000;

    let (graph, _) = MockGraph::sequence_default(44100.0);
    let transport = MockTransport::new(graph.rendered.clone(), 44100.0, 120.0);
    let overloads = Arc::new(OverloadMonitor::new());
    overloads.mark_started();
    let done = Arc::new(AtomicBool::new(false));

    let notifier = {
        let overloads = Arc::clone(&overloads);
        let done = Arc::clone(&done);
        std::thread::spawn(move || {
            for _ in 0..NOTIFICATIONS {
                overloads.notify();
            }
            done.store(true, Ordering::Release);
        })
    };

    let mut recorder = Recorder::default();
    while !done.load(Ordering::Acquire) {
        LiveMonitor::new()
            .interval(Duration::from_micros(50))
            .cancel_after(Some(4))
            .monitor(&transport, Some(&graph), 1000.0, &overloads, &mut recorder)
            .unwrap();
    }
    notifier.join().unwrap();
    let remaining = overloads.take().map_or(0, |r| r.count);

    assert_eq!(recorder.overload_total() + remaining, NOTIFICATIONS);
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[test]
fn offline_session_renders_selected_tracks() {
    let (mut graph, [synth, ..]) = MockGraph::sequence_default(48000.0);
    let rendered = graph.rendered.clone();
    let settings = SynthSettings {
        cpu_load_ceiling: 0.5,
        sound_bank: Some("bank.sf2".into()),
        stream_from_disk: true,
    };
    let mut recorder = Recorder::default();
    let mut session = Session::prepare(
        &mut graph,
        RenderParameters::offline(44100.0, 512),
        &settings,
        &mut recorder,
    )
    .unwrap();

    let mut sequence = MockSequence::new(&[2.0, 4.0]);
    let mut transport = MockTransport::new(rendered, 44100.0, 120.0);
    let mut sink = CountingSink::default();
    let options = PlayOptions {
        start_time: 0.0,
        selection: TrackSelection::only([0]),
    };
    let summary = session
        .render(&mut sequence, &mut transport, &mut sink, &options, &mut recorder)
        .unwrap();

    // 12 beats at 120 BPM is six seconds.
    drop(session);

    assert!(summary.final_time >= 12.0);
    assert_eq!(summary.frames, sink.frames);
    assert!(sink.finished);
    assert!(transport.prerolled && transport.started && transport.stopped);
    assert_eq!(sequence.muted, vec![false, true]);

    assert!(graph.opened && graph.initialized);
    let synth_state = graph.state(synth);
    let synth_state = synth_state.borrow();
    assert_eq!(synth_state.cpu_ceiling, Some(0.5));
    assert_eq!(
        synth_state.sound_bank.as_deref(),
        Some(std::path::Path::new("bank.sf2"))
    );
    assert!(synth_state.stream_from_disk);
    assert!(synth_state.offline_render);

    assert_eq!(
        recorder.events[..3],
        [
            Event::GraphReady(RenderParameters::offline(44100.0, 512)),
            Event::Audible(vec![0]),
            Event::Ready(12.0),
        ]
    );
    assert_eq!(recorder.events.last(), Some(&Event::Finished));
}

#[test]
fn live_session_cancels_and_stops_transport() {
    let (mut graph, [synth, ..]) = MockGraph::sequence_default(48000.0);
    let rendered = graph.rendered.clone();
    let mut session = Session::prepare(
        &mut graph,
        RenderParameters::live(512),
        &SynthSettings::default(),
        &mut Silent,
    )
    .unwrap();
    assert_eq!(session.params().sample_rate, 48000.0);

    let mut sequence = MockSequence::new(&[400.0]);
    let mut transport = MockTransport::new(rendered.clone(), 48000.0, 120.0);
    let mut pacer = StepPacer::new(rendered, 96000);
    let outcome = session
        .play_with(
            &mut pacer,
            &mut sequence,
            &mut transport,
            &PlayOptions::default(),
            &LiveMonitor::new().cancel_after(Some(10)),
            &mut Silent,
        )
        .unwrap();

    drop(session);

    assert_eq!(outcome, MonitorOutcome::Cancelled { ticks: 11 });
    assert!(transport.stopped);
    let synth_state = graph.state(synth);
    assert!(!synth_state.borrow().offline_render);
    assert_eq!(synth_state.borrow().cpu_ceiling, Some(0.8));
}

#[test]
fn session_without_synth_fails_before_configuring() {
    let mut graph = MockGraph::new(44100.0);
    let device = graph.push(ComponentDescriptor::DEVICE_OUTPUT);

    let result = Session::prepare(
        &mut graph,
        RenderParameters::offline(44100.0, 512),
        &SynthSettings::default(),
        &mut Silent,
    );
    assert!(matches!(result, Err(Error::NotFound("synthesizer"))));
    drop(result);
    assert!(graph.removed.is_empty());
    assert_eq!(graph.ids(), vec![device]);
}
