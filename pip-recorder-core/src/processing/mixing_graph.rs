use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::config::MixConfiguration;
use crate::models::media::{MediaSource, SourceKind};
use crate::processing::dsp::{BiquadFilter, CompressorSettings, DynamicsCompressor, Resampler};
use crate::traits::media_track::{AudioTrack, MediaTrack};

/// Rate at which the graph mixes; inputs at other rates are resampled.
pub const CONTEXT_SAMPLE_RATE: u32 = 48_000;

/// Cutoff of the rumble filter in the echo-dampening chain.
pub const HIGH_PASS_CUTOFF_HZ: f64 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct NodeId(usize);

/// A node in the audio routing topology.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphNode {
    Source { kind: SourceKind, track_id: String },
    HighPass { cutoff_hz: f64 },
    Compressor(CompressorSettings),
    Destination,
}

enum Stage {
    HighPass(BiquadFilter),
    Compressor(DynamicsCompressor),
}

impl Stage {
    fn process(&mut self, samples: &mut [f32]) {
        match self {
            Self::HighPass(filter) => filter.process(samples),
            Self::Compressor(comp) => comp.process(samples),
        }
    }
}

/// One input track and the stages between it and the destination.
struct Branch {
    input: Arc<dyn AudioTrack>,
    resampler: Resampler,
    stages: Vec<Stage>,
}

impl Branch {
    fn new(input: &Arc<dyn AudioTrack>, stages: Vec<Stage>) -> Self {
        Self {
            resampler: Resampler::new(input.sample_rate(), CONTEXT_SAMPLE_RATE),
            input: Arc::clone(input),
            stages,
        }
    }
}

struct GraphCore {
    branches: Vec<Branch>,
}

impl GraphCore {
    /// Pull pending input from every branch and sum into one buffer.
    /// Branches shorter than the longest are padded with silence.
    fn process(&mut self) -> Vec<f32> {
        let mut mixed: Vec<f32> = Vec::new();
        for branch in &mut self.branches {
            let raw = branch.input.read_samples();
            if raw.is_empty() {
                continue;
            }
            let mut samples = branch.resampler.process(&raw);
            for stage in &mut branch.stages {
                stage.process(&mut samples);
            }
            if mixed.len() < samples.len() {
                mixed.resize(samples.len(), 0.0);
            }
            for (out, sample) in mixed.iter_mut().zip(samples) {
                *out += sample;
            }
        }
        for sample in &mut mixed {
            *sample = sample.clamp(-1.0, 1.0);
        }
        mixed
    }
}

#[derive(Default)]
struct Topology {
    nodes: Vec<GraphNode>,
    edges: Vec<(NodeId, NodeId)>,
}

impl Topology {
    fn add(&mut self, node: GraphNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn add_source(&mut self, kind: SourceKind, track: &dyn AudioTrack) -> NodeId {
        self.add(GraphNode::Source {
            kind,
            track_id: track.id().to_string(),
        })
    }

    fn connect(&mut self, from: NodeId, to: NodeId) {
        self.edges.push((from, to));
    }
}

/// Audio routing graph mixing display and microphone tracks into a single
/// output track.
///
/// Display tracks always connect straight to the destination. Microphone
/// tracks do too, unless echo suppression is enabled, in which case each one
/// gets its own chain:
/// ```text
/// [Display track] ─────────────────────────────────┐
///                                                  ├→ [Destination] → output track
/// [Mic track] → [High-pass 120 Hz] → [Compressor] ─┘
/// ```
pub struct MixingGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<(NodeId, NodeId)>,
    destination: NodeId,
    config: MixConfiguration,
    output: Arc<MixedAudioTrack>,
}

impl MixingGraph {
    pub fn build(display: &MediaSource, camera: &MediaSource, config: MixConfiguration) -> Self {
        let sample_rate = CONTEXT_SAMPLE_RATE as f64;
        let mut topology = Topology::default();
        let destination = topology.add(GraphNode::Destination);
        let mut branches = Vec::new();

        for track in display.audio_tracks() {
            let source = topology.add_source(display.kind(), track.as_ref());
            topology.connect(source, destination);
            branches.push(Branch::new(track, Vec::new()));
        }

        for track in camera.audio_tracks() {
            let source = topology.add_source(camera.kind(), track.as_ref());
            if !config.echo_suppression_enabled {
                topology.connect(source, destination);
                branches.push(Branch::new(track, Vec::new()));
                continue;
            }

            let settings = CompressorSettings::ECHO_DAMPENING;
            let high_pass = topology.add(GraphNode::HighPass {
                cutoff_hz: HIGH_PASS_CUTOFF_HZ,
            });
            let compressor = topology.add(GraphNode::Compressor(settings));
            topology.connect(source, high_pass);
            topology.connect(high_pass, compressor);
            topology.connect(compressor, destination);
            branches.push(Branch::new(
                track,
                vec![
                    Stage::HighPass(BiquadFilter::high_pass(HIGH_PASS_CUTOFF_HZ, sample_rate)),
                    Stage::Compressor(DynamicsCompressor::new(settings, sample_rate)),
                ],
            ));
        }

        let graph = Self {
            nodes: topology.nodes,
            edges: topology.edges,
            destination,
            config,
            output: Arc::new(MixedAudioTrack {
                id: format!("mix-{}", uuid::Uuid::new_v4()),
                core: Arc::new(Mutex::new(GraphCore { branches })),
                live: AtomicBool::new(true),
            }),
        };
        log::info!(
            "Mixing graph built: {} inputs, {} echo chains (echo suppression {})",
            graph.input_count(),
            graph.echo_chain_count(),
            if config.echo_suppression_enabled { "on" } else { "off" }
        );
        graph
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(id.0)
    }

    /// Number of connected input tracks.
    pub fn input_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, GraphNode::Source { .. }))
            .count()
    }

    /// Number of high-pass → compressor chains feeding the destination.
    pub fn echo_chain_count(&self) -> usize {
        self.edges
            .iter()
            .filter(|(from, to)| {
                matches!(self.node(*from), Some(GraphNode::HighPass { .. }))
                    && matches!(self.node(*to), Some(GraphNode::Compressor(_)))
            })
            .count()
    }

    /// Number of sources wired straight into the destination.
    pub fn direct_connection_count(&self) -> usize {
        self.edges
            .iter()
            .filter(|(from, to)| {
                *to == self.destination && matches!(self.node(*from), Some(GraphNode::Source { .. }))
            })
            .count()
    }

    /// Nodes downstream of the source node for `track_id`, ending at the destination.
    pub fn path_from(&self, track_id: &str) -> Vec<&GraphNode> {
        let start = self.nodes.iter().position(|n| match n {
            GraphNode::Source { track_id: id, .. } => id == track_id,
            _ => false,
        });
        let mut path = Vec::new();
        let Some(mut current) = start.map(NodeId) else {
            return path;
        };
        while let Some((_, next)) = self.edges.iter().find(|(from, _)| *from == current) {
            if let Some(node) = self.node(*next) {
                path.push(node);
            }
            current = *next;
        }
        path
    }

    /// The single mixed output track.
    pub fn output_track(&self) -> Arc<MixedAudioTrack> {
        Arc::clone(&self.output)
    }

    /// Stop the output. Input tracks belong to their sources and are left alone.
    pub fn close(&self) {
        self.output.stop();
    }
}

impl fmt::Debug for MixingGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MixingGraph")
            .field("nodes", &self.nodes)
            .field("edges", &self.edges)
            .field("config", &self.config)
            .finish()
    }
}

/// Output of a [`MixingGraph`]. Reading it pulls and mixes pending input.
pub struct MixedAudioTrack {
    id: String,
    core: Arc<Mutex<GraphCore>>,
    live: AtomicBool,
}

impl MediaTrack for MixedAudioTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

impl AudioTrack for MixedAudioTrack {
    fn sample_rate(&self) -> u32 {
        CONTEXT_SAMPLE_RATE
    }

    fn read_samples(&self) -> Vec<f32> {
        if !self.is_live() {
            return Vec::new();
        }
        self.core.lock().process()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::processing::dsp;

    struct ConstTrack {
        id: String,
        value: f32,
        block: usize,
        rate: u32,
    }

    fn track(id: &str, value: f32, block: usize) -> Arc<dyn AudioTrack> {
        track_at(id, value, block, CONTEXT_SAMPLE_RATE)
    }

    fn track_at(id: &str, value: f32, block: usize, rate: u32) -> Arc<dyn AudioTrack> {
        Arc::new(ConstTrack {
            id: id.to_string(),
            value,
            block,
            rate,
        })
    }

    impl MediaTrack for ConstTrack {
        fn id(&self) -> &str {
            &self.id
        }
        fn stop(&self) {}
        fn is_live(&self) -> bool {
            true
        }
    }

    impl AudioTrack for ConstTrack {
        fn sample_rate(&self) -> u32 {
            self.rate
        }
        fn read_samples(&self) -> Vec<f32> {
            vec![self.value; self.block]
        }
    }

    fn display(tracks: Vec<Arc<dyn AudioTrack>>) -> MediaSource {
        MediaSource::new(SourceKind::Display, Vec::new(), tracks)
    }

    fn camera(tracks: Vec<Arc<dyn AudioTrack>>) -> MediaSource {
        MediaSource::new(SourceKind::CameraMic, Vec::new(), tracks)
    }

    fn echo(enabled: bool) -> MixConfiguration {
        MixConfiguration {
            echo_suppression_enabled: enabled,
        }
    }

    #[test]
    fn echo_off_connects_everything_directly() {
        let graph = MixingGraph::build(
            &display(vec![track("sys", 0.0, 1)]),
            &camera(vec![track("mic-a", 0.0, 1), track("mic-b", 0.0, 1)]),
            echo(false),
        );

        assert_eq!(graph.input_count(), 3);
        assert_eq!(graph.echo_chain_count(), 0);
        assert_eq!(graph.direct_connection_count(), 3);
        assert_eq!(graph.nodes().len(), 4);
        assert_eq!(graph.path_from("mic-a"), vec![&GraphNode::Destination]);
    }

    #[test]
    fn echo_on_chains_every_mic_track() {
        let graph = MixingGraph::build(
            &display(vec![track("sys", 0.0, 1)]),
            &camera(vec![track("mic-a", 0.0, 1), track("mic-b", 0.0, 1)]),
            echo(true),
        );

        assert_eq!(graph.echo_chain_count(), 2);
        assert_eq!(graph.direct_connection_count(), 1);
        // destination + 3 sources + 2 × (high-pass, compressor)
        assert_eq!(graph.nodes().len(), 8);

        assert_eq!(graph.path_from("sys"), vec![&GraphNode::Destination]);
        assert_eq!(
            graph.path_from("mic-b"),
            vec![
                &GraphNode::HighPass { cutoff_hz: 120.0 },
                &GraphNode::Compressor(CompressorSettings::ECHO_DAMPENING),
                &GraphNode::Destination,
            ]
        );
    }

    #[test]
    fn source_without_audio_contributes_nothing() {
        let graph = MixingGraph::build(&display(Vec::new()), &camera(vec![track("mic", 0.25, 4)]), echo(false));

        assert_eq!(graph.input_count(), 1);
        assert_eq!(graph.output_track().read_samples(), vec![0.25; 4]);
    }

    #[test]
    fn no_inputs_still_has_one_output() {
        let graph = MixingGraph::build(&display(Vec::new()), &camera(Vec::new()), echo(true));

        assert_eq!(graph.input_count(), 0);
        assert_eq!(graph.output_track().id(), graph.output_track().id());
        assert!(graph.output_track().read_samples().is_empty());
    }

    #[test]
    fn fan_in_sums_tracks() {
        let graph = MixingGraph::build(
            &display(vec![track("sys", 0.25, 3)]),
            &camera(vec![track("mic", 0.5, 5)]),
            echo(false),
        );

        let mixed = graph.output_track().read_samples();

        assert_eq!(mixed.len(), 5);
        assert_relative_eq!(mixed[0], 0.75);
        assert_relative_eq!(mixed[2], 0.75);
        // Display track ran out: silence-padded.
        assert_relative_eq!(mixed[4], 0.5);
    }

    #[test]
    fn mix_is_clamped() {
        let graph = MixingGraph::build(
            &display(vec![track("sys", 0.8, 2)]),
            &camera(vec![track("mic", 0.8, 2)]),
            echo(false),
        );

        assert_eq!(graph.output_track().read_samples(), vec![1.0, 1.0]);
    }

    #[test]
    fn echo_chain_removes_mic_rumble() {
        let graph = MixingGraph::build(&display(Vec::new()), &camera(vec![track("mic", 0.5, 48_000)]), echo(true));

        let mixed = graph.output_track().read_samples();

        // DC is rejected by the high-pass stage.
        assert!(dsp::peak_level(&mixed[24_000..]) < 1e-3);
    }

    #[test]
    fn inputs_are_resampled_to_context_rate() {
        let graph = MixingGraph::build(
            &display(Vec::new()),
            &camera(vec![track_at("mic", 0.1, 10, 24_000)]),
            echo(false),
        );

        let output = graph.output_track();

        // The last input sample is held back until the next block arrives.
        assert_eq!(output.read_samples().len(), 18);
        assert_eq!(output.read_samples().len(), 20);
    }

    #[test]
    fn closed_graph_output_is_silent() {
        let graph = MixingGraph::build(&display(vec![track("sys", 0.3, 4)]), &camera(Vec::new()), echo(false));

        graph.close();

        assert!(!graph.output_track().is_live());
        assert!(graph.output_track().read_samples().is_empty());
    }
}
