//! Predicting side of frame sync
//!
//! Two copies of the world are kept: `baseline` only ever sees authoritative
//! batches, `predicted` additionally sees local inputs the server has not
//! acknowledged yet. Each reconcile rewinds `predicted` to `baseline`,
//! applies the authoritative batch to both, then replays what is still
//! pending.

use std::collections::VecDeque;

use tracing::trace;

use crate::game::{EventBus, Input, SimulationState, StateEvent, WorldState};
use crate::ws::protocol::{ClientSync, ServerSync};

/// Presentation layer that draws a world snapshot
pub trait RenderSink {
    fn render(&mut self, snapshot: &WorldState);
}

pub struct Prediction {
    baseline: SimulationState,
    predicted: SimulationState,
    pending: VecDeque<ClientSync>,
    next_frame_id: u32,
}

impl Prediction {
    /// Only the predicted copy publishes events, so each explosion or hit
    /// is reported once.
    pub fn new(events: EventBus<StateEvent>) -> Self {
        Self {
            baseline: SimulationState::default(),
            predicted: SimulationState::default().with_events(events),
            pending: VecDeque::new(),
            next_frame_id: 1,
        }
    }

    /// Adopt a full snapshot, e.g. at game start
    pub fn load(&mut self, snapshot: &WorldState) {
        self.baseline.load(snapshot);
        self.predicted.load(snapshot);
        self.pending.clear();
    }

    /// Apply a local input immediately and tag it for the server. Only
    /// movement is kept for replay.
    pub fn issue(&mut self, input: Input) -> ClientSync {
        let sync = ClientSync {
            frame_id: self.next_frame_id,
            input,
        };
        self.next_frame_id = self.next_frame_id.wrapping_add(1);

        self.predicted.apply_input(&input);
        if input.is_replayable() {
            self.pending.push_back(sync);
        }
        sync
    }

    pub fn reconcile(&mut self, sync: &ServerSync) {
        self.predicted.load(self.baseline.world());

        for input in &sync.inputs {
            self.baseline.apply_input(input);
            self.predicted.apply_input(input);
        }

        while self
            .pending
            .front()
            .is_some_and(|p| p.frame_id <= sync.last_frame_id)
        {
            self.pending.pop_front();
        }

        for pending in &self.pending {
            self.predicted.apply_input(&pending.input);
        }

        trace!(
            applied = sync.inputs.len(),
            ack = sync.last_frame_id,
            replayed = self.pending.len(),
            "Reconciled"
        );
    }

    /// Drop all state; frame ids start over
    pub fn reset(&mut self) {
        self.baseline.reset();
        self.predicted.reset();
        self.pending.clear();
        self.next_frame_id = 1;
    }

    pub fn render(&self, sink: &mut dyn RenderSink) {
        sink.render(self.predicted.world());
    }

    pub fn baseline(&self) -> &SimulationState {
        &self.baseline
    }

    pub fn predicted(&self) -> &SimulationState {
        &self.predicted
    }

    pub fn pending_frame_ids(&self) -> Vec<u32> {
        self.pending.iter().map(|p| p.frame_id).collect()
    }

    pub fn next_frame_id(&self) -> u32 {
        self.next_frame_id
    }
}
