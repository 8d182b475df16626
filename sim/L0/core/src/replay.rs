//! In-memory replay ring.
//!
//! One frame holds every node's position and velocity and every beam's
//! broken and disabled bits. Frames are stored struct-of-arrays in flat
//! vectors sized once at spawn; the oldest frame is overwritten when the ring
//! is full.

use sim_types::{ReplayConfig, Vec3};

use crate::beam::Beam;
use crate::node::Node;

/// A recorded frame, borrowed from the ring.
#[derive(Debug, Clone, Copy)]
pub struct ReplayFrame<'a> {
    /// Simulated time of the frame.
    pub time: f64,
    /// Node positions.
    pub positions: &'a [Vec3],
    /// Node velocities.
    pub velocities: &'a [Vec3],
    /// Beam broken bits.
    pub broken: &'a [bool],
    /// Beam disabled bits.
    pub disabled: &'a [bool],
}

/// Replay ring of one actor.
#[derive(Debug, Clone)]
pub struct Replay {
    nodes: usize,
    beams: usize,
    depth: usize,
    steps_per_frame: usize,
    steps: usize,
    times: Vec<f64>,
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    broken: Vec<bool>,
    disabled: Vec<bool>,
    next: usize,
    len: usize,
}

impl Replay {
    /// Ring for an actor with `nodes` nodes and `beams` beams; `None` when
    /// recording is off.
    #[must_use]
    pub fn new(config: &ReplayConfig, nodes: usize, beams: usize) -> Option<Self> {
        if !config.enabled || config.length_frames == 0 {
            return None;
        }
        let depth = config.length_frames;
        Some(Self {
            nodes,
            beams,
            depth,
            steps_per_frame: config.steps_per_frame.max(1),
            steps: 0,
            times: vec![0.0; depth],
            positions: vec![Vec3::zeros(); depth * nodes],
            velocities: vec![Vec3::zeros(); depth * nodes],
            broken: vec![false; depth * beams],
            disabled: vec![false; depth * beams],
            next: 0,
            len: 0,
        })
    }

    /// Frames stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True before the first frame.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Ring capacity in frames.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Count one substep; records a frame every `steps_per_frame` substeps.
    pub fn step(&mut self, time: f64, nodes: &[Node], beams: &[Beam]) -> bool {
        self.steps += 1;
        if self.steps < self.steps_per_frame {
            return false;
        }
        self.steps = 0;
        self.record(time, nodes, beams);
        true
    }

    /// Store a frame now.
    pub fn record(&mut self, time: f64, nodes: &[Node], beams: &[Beam]) {
        let slot = self.next;
        self.times[slot] = time;
        let n = slot * self.nodes;
        for (i, node) in nodes.iter().take(self.nodes).enumerate() {
            self.positions[n + i] = node.position;
            self.velocities[n + i] = node.velocity;
        }
        let b = slot * self.beams;
        for (i, beam) in beams.iter().take(self.beams).enumerate() {
            self.broken[b + i] = beam.broken;
            self.disabled[b + i] = beam.disabled;
        }
        self.next = (self.next + 1) % self.depth;
        self.len = (self.len + 1).min(self.depth);
    }

    fn slot(&self, frames_ago: usize) -> Option<usize> {
        (frames_ago < self.len).then(|| (self.next + self.depth - 1 - frames_ago) % self.depth)
    }

    /// Frame `frames_ago` frames before the newest (0 is the newest).
    #[must_use]
    pub fn frame(&self, frames_ago: usize) -> Option<ReplayFrame<'_>> {
        let slot = self.slot(frames_ago)?;
        let (n, b) = (slot * self.nodes, slot * self.beams);
        Some(ReplayFrame {
            time: self.times[slot],
            positions: &self.positions[n..n + self.nodes],
            velocities: &self.velocities[n..n + self.nodes],
            broken: &self.broken[b..b + self.beams],
            disabled: &self.disabled[b..b + self.beams],
        })
    }

    /// Restore a frame into the live arrays; false when it does not exist.
    pub fn seek(&self, frames_ago: usize, nodes: &mut [Node], beams: &mut [Beam]) -> bool {
        let Some(frame) = self.frame(frames_ago) else {
            return false;
        };
        for ((node, p), v) in nodes.iter_mut().zip(frame.positions).zip(frame.velocities) {
            node.position = *p;
            node.velocity = *v;
            node.forces = Vec3::zeros();
        }
        for ((beam, broken), disabled) in beams.iter_mut().zip(frame.broken).zip(frame.disabled) {
            beam.broken = *broken;
            beam.disabled = *disabled;
        }
        true
    }

    /// Forget every frame.
    pub fn clear(&mut self) {
        self.len = 0;
        self.next = 0;
        self.steps = 0;
    }
}
