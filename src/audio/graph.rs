// Mixing graph - Looping playback nodes summed into one output bus
//
// The control side keeps a mirror of every node (gain automation, start
// state) and answers queries from it. Edits travel to the render side as
// commands over a ring buffer, so the audio callback never waits on the
// control side and never skips a block because of it. Whatever the render
// side lets go of travels back the same way and is dropped by the control
// side.

use std::collections::VecDeque;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use ringbuf::traits::{Consumer, Producer};

use crate::audio::automation::GainAutomation;
use crate::audio::buffer::AudioBuffer;
use crate::messaging::channels::{
    BusCommandConsumer, BusCommandProducer, RetiredConsumer, RetiredProducer,
    create_bus_command_channel, create_retired_channel,
};

/// Identifier of one playback node on a [`MixBus`]
pub type ChannelId = u64;

const BUS_COMMAND_CAPACITY: usize = 256;

/// Rejections from the host audio primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("Playback node {0} was already started")]
    AlreadyStarted(ChannelId),

    #[error("Playback node {0} is not connected")]
    Disconnected(ChannelId),

    #[error("Output bus has been released")]
    Released,
}

/// Edits applied by the render side at the start of a block
pub(crate) enum BusCommand {
    Connect {
        id: ChannelId,
        buffer: Arc<AudioBuffer>,
        gain: GainAutomation,
    },
    Start { id: ChannelId, time: f64 },
    Stop { id: ChannelId, time: f64 },
    SetGain { id: ChannelId, gain: GainAutomation },
    Disconnect { id: ChannelId },
    DisconnectAll,
}

impl BusCommand {
    fn channel(&self) -> Option<ChannelId> {
        match self {
            BusCommand::Connect { id, .. }
            | BusCommand::Start { id, .. }
            | BusCommand::Stop { id, .. }
            | BusCommand::SetGain { id, .. }
            | BusCommand::Disconnect { id } => Some(*id),
            BusCommand::DisconnectAll => None,
        }
    }
}

/// Render-side values handed back to be dropped off the audio thread
pub(crate) enum Retired {
    Voice(Voice),
    Gain(GainAutomation),
}

/// Control-side view of a connected node
struct ChannelMirror {
    id: ChannelId,
    buffer: Arc<AudioBuffer>,
    gain: GainAutomation,
    started: bool,
}

struct ControlState {
    channels: Vec<ChannelMirror>,
    next_id: ChannelId,
    released: bool,
    commands: BusCommandProducer,
    /// Commands the ring had no room for, in order, after everything in the ring
    backlog: VecDeque<BusCommand>,
    returned: RetiredConsumer,
}

impl ControlState {
    fn maintain(&mut self) {
        self.flush_backlog();
        while let Some(retired) = self.returned.try_pop() {
            drop(retired);
        }
    }

    fn send(&mut self, command: BusCommand) {
        if self.backlog.is_empty() {
            if let Err(command) = self.commands.try_push(command) {
                self.defer(command);
            }
        } else {
            self.defer(command);
        }
    }

    fn flush_backlog(&mut self) {
        while let Some(command) = self.backlog.pop_front() {
            if let Err(command) = self.commands.try_push(command) {
                self.backlog.push_front(command);
                break;
            }
        }
    }

    /// Queue a command the ring has no room for, folding it into what already waits
    fn defer(&mut self, command: BusCommand) {
        match command {
            BusCommand::DisconnectAll => {
                self.backlog.clear();
                self.backlog.push_back(command);
            }
            BusCommand::Disconnect { id } => {
                // A node the render side never saw needs no disconnect
                let unseen = self
                    .backlog
                    .iter()
                    .any(|c| matches!(c, BusCommand::Connect { id: queued, .. } if *queued == id));
                self.backlog.retain(|c| c.channel() != Some(id));
                if !unseen {
                    self.backlog.push_back(command);
                }
            }
            BusCommand::SetGain { .. } | BusCommand::Stop { .. } => {
                let kind = mem::discriminant(&command);
                let id = command.channel();
                match self
                    .backlog
                    .iter_mut()
                    .find(|c| mem::discriminant(&**c) == kind && c.channel() == id)
                {
                    Some(slot) => *slot = command,
                    None => self.backlog.push_back(command),
                }
            }
            _ => self.backlog.push_back(command),
        }
    }

    fn channel(&mut self, id: ChannelId) -> Result<&mut ChannelMirror, GraphError> {
        if self.released {
            return Err(GraphError::Released);
        }
        self.channels
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(GraphError::Disconnected(id))
    }
}

/// One looping playback node plus its gain envelope, owned by the render side
pub(crate) struct Voice {
    id: ChannelId,
    buffer: Arc<AudioBuffer>,
    gain: GainAutomation,
    start_time: Option<f64>,
    stop_time: Option<f64>,
    position: f64, // Fractional frame position inside the buffer
}

impl Voice {
    #[inline]
    fn is_audible_at(&self, time: f64) -> bool {
        match (self.start_time, self.stop_time) {
            (Some(start), Some(stop)) => time >= start && time < stop,
            (Some(start), None) => time >= start,
            _ => false,
        }
    }

    /// Linear interpolation between neighbouring frames, wrapping at the loop point
    #[inline]
    fn next_frame(&mut self, step: f64) -> (f32, f32) {
        let frames = self.buffer.frames();
        if frames == 0 {
            return (0.0, 0.0);
        }

        let index = self.position as usize;
        let fraction = self.position.fract() as f32;
        let (l1, r1) = self.buffer.frame(index);
        let (l2, r2) = self.buffer.frame(index + 1);

        self.position += step;
        if self.position >= frames as f64 {
            self.position %= frames as f64;
        }

        (l1 + (l2 - l1) * fraction, r1 + (r2 - r1) * fraction)
    }
}

struct RenderState {
    commands: BusCommandConsumer,
    voices: Vec<Voice>,
    returns: RetiredProducer,
    /// Values the return ring had no room for
    unreturned: Vec<Retired>,
}

impl RenderState {
    fn retire(&mut self, retired: Retired) {
        if let Err(retired) = self.returns.try_push(retired) {
            self.unreturned.push(retired);
        }
    }

    fn return_leftovers(&mut self) {
        while let Some(retired) = self.unreturned.pop() {
            if let Err(retired) = self.returns.try_push(retired) {
                self.unreturned.push(retired);
                break;
            }
        }
    }

    fn apply(&mut self, command: BusCommand) {
        match command {
            BusCommand::Connect { id, buffer, gain } => self.voices.push(Voice {
                id,
                buffer,
                gain,
                start_time: None,
                stop_time: None,
                position: 0.0,
            }),
            BusCommand::Start { id, time } => {
                if let Some(voice) = self.voice(id) {
                    voice.start_time = Some(time);
                }
            }
            BusCommand::Stop { id, time } => {
                if let Some(voice) = self.voice(id) {
                    voice.stop_time = Some(time);
                }
            }
            BusCommand::SetGain { id, gain } => {
                if let Some(voice) = self.voice(id) {
                    let previous = mem::replace(&mut voice.gain, gain);
                    self.retire(Retired::Gain(previous));
                } else {
                    self.retire(Retired::Gain(gain));
                }
            }
            BusCommand::Disconnect { id } => {
                if let Some(index) = self.voices.iter().position(|v| v.id == id) {
                    let voice = self.voices.swap_remove(index);
                    self.retire(Retired::Voice(voice));
                }
            }
            BusCommand::DisconnectAll => {
                while let Some(voice) = self.voices.pop() {
                    self.retire(Retired::Voice(voice));
                }
            }
        }
    }

    fn voice(&mut self, id: ChannelId) -> Option<&mut Voice> {
        self.voices.iter_mut().find(|v| v.id == id)
    }
}

/// Shared output mixing node
///
/// Cloning yields another handle to the same bus. Any number of handles may
/// edit and query it; one of them renders.
#[derive(Clone)]
pub struct MixBus {
    control: Arc<Mutex<ControlState>>,
    render: Arc<Mutex<RenderState>>,
}

impl MixBus {
    pub fn new() -> Self {
        let (producer, consumer) = create_bus_command_channel(BUS_COMMAND_CAPACITY);
        let (returns, returned) = create_retired_channel(BUS_COMMAND_CAPACITY);
        Self {
            control: Arc::new(Mutex::new(ControlState {
                channels: Vec::with_capacity(4),
                next_id: 1,
                released: false,
                commands: producer,
                backlog: VecDeque::new(),
                returned,
            })),
            render: Arc::new(Mutex::new(RenderState {
                commands: consumer,
                voices: Vec::with_capacity(8),
                returns,
                unreturned: Vec::with_capacity(16),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControlState> {
        let mut state = self.control.lock().unwrap_or_else(PoisonError::into_inner);
        state.maintain();
        state
    }

    /// Connect a new, not yet started playback node for `buffer`
    pub fn connect(&self, buffer: Arc<AudioBuffer>, initial_gain: f32) -> Result<ChannelId, GraphError> {
        let mut state = self.lock();
        if state.released {
            return Err(GraphError::Released);
        }

        let id = state.next_id;
        state.next_id += 1;
        let gain = GainAutomation::new(initial_gain);
        state.channels.push(ChannelMirror {
            id,
            buffer: Arc::clone(&buffer),
            gain: gain.clone(),
            started: false,
        });
        state.send(BusCommand::Connect { id, buffer, gain });
        Ok(id)
    }

    /// Begin playback at audio-clock `time`; a node can only be started once
    pub fn start_at(&self, id: ChannelId, time: f64) -> Result<(), GraphError> {
        let mut state = self.lock();
        let channel = state.channel(id)?;
        if channel.started {
            return Err(GraphError::AlreadyStarted(id));
        }
        channel.started = true;
        state.send(BusCommand::Start { id, time });
        Ok(())
    }

    /// End playback at audio-clock `time` (replaces any earlier stop)
    pub fn stop_at(&self, id: ChannelId, time: f64) -> Result<(), GraphError> {
        let mut state = self.lock();
        state.channel(id)?;
        state.send(BusCommand::Stop { id, time });
        Ok(())
    }

    /// Edit the gain automation of a connected node
    pub fn with_gain<R>(
        &self,
        id: ChannelId,
        edit: impl FnOnce(&mut GainAutomation) -> R,
    ) -> Result<R, GraphError> {
        let mut state = self.lock();
        let channel = state.channel(id)?;
        let result = edit(&mut channel.gain);
        let gain = channel.gain.clone();
        state.send(BusCommand::SetGain { id, gain });
        Ok(result)
    }

    /// Scheduled gain of a node at `time`, `None` once disconnected
    pub fn gain_at(&self, id: ChannelId, time: f64) -> Option<f32> {
        let state = self.lock();
        state
            .channels
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.gain.value_at(time))
    }

    pub fn is_started(&self, id: ChannelId) -> bool {
        let state = self.lock();
        state.channels.iter().any(|c| c.id == id && c.started)
    }

    /// Remove a node; its output stops at the next rendered block
    pub fn disconnect(&self, id: ChannelId) -> bool {
        let mut state = self.lock();
        let Some(index) = state.channels.iter().position(|c| c.id == id) else {
            return false;
        };
        state.channels.swap_remove(index);
        state.send(BusCommand::Disconnect { id });
        true
    }

    /// Tear the bus down; later connections are refused
    pub fn release(&self) {
        let mut state = self.lock();
        state.channels.clear();
        state.released = true;
        state.send(BusCommand::DisconnectAll);
    }

    pub fn is_released(&self) -> bool {
        self.lock().released
    }

    /// Number of connected playback nodes
    pub fn active_channels(&self) -> usize {
        self.lock().channels.len()
    }

    /// Mix every audible node into `output` (interleaved, `channels` wide)
    ///
    /// `block_start` is the audio-clock time of the first frame. Called from
    /// the audio callback: never blocks. Pending edits are applied before the
    /// block is mixed.
    pub fn render(&self, output: &mut [f32], channels: usize, block_start: f64, sample_rate: f64) {
        if channels == 0 || sample_rate <= 0.0 {
            return;
        }

        // Only another renderer can hold this lock
        let mut render = match self.render.try_lock() {
            Ok(render) => render,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return,
        };
        let render = &mut *render;
        render.return_leftovers();

        while let Some(command) = render.commands.try_pop() {
            render.apply(command);
        }
        // Overflowed edits, if the control side is not busy right now
        if let Ok(mut control) = self.control.try_lock() {
            while let Some(command) = render.commands.try_pop() {
                render.apply(command);
            }
            while let Some(command) = control.backlog.pop_front() {
                render.apply(command);
            }
        }

        for voice in render.voices.iter_mut() {
            let step = voice.buffer.sample_rate() as f64 / sample_rate;

            for (index, frame) in output.chunks_mut(channels).enumerate() {
                let time = block_start + index as f64 / sample_rate;
                if !voice.is_audible_at(time) {
                    continue;
                }

                let gain = voice.gain.value_at(time);
                let (left, right) = voice.next_frame(step);
                mix_stereo_into_frame((left * gain, right * gain), frame);
            }
        }
    }
}

impl Default for MixBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Add a stereo pair to one interleaved frame (mono outputs get the average)
#[inline]
pub fn mix_stereo_into_frame((left, right): (f32, f32), frame: &mut [f32]) {
    match frame {
        [] => {}
        [mono] => *mono += (left + right) * 0.5,
        [l, r, ..] => {
            *l += left;
            *r += right;
        }
    }
}
