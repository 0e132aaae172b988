// Lock-free channels into the audio callback
// Scheduler → metronome clicks, control side ↔ music bus commands and
// released render-side values

use crate::audio::graph::{BusCommand, Retired};
use crate::sequencer::metronome::ScheduledClick;
use ringbuf::{HeapRb, traits::Split};

pub type ClickProducer = ringbuf::HeapProd<ScheduledClick>;
pub type ClickConsumer = ringbuf::HeapCons<ScheduledClick>;

pub(crate) type BusCommandProducer = ringbuf::HeapProd<BusCommand>;
pub(crate) type BusCommandConsumer = ringbuf::HeapCons<BusCommand>;

pub(crate) type RetiredProducer = ringbuf::HeapProd<Retired>;
pub(crate) type RetiredConsumer = ringbuf::HeapCons<Retired>;

pub fn create_click_channel(capacity: usize) -> (ClickProducer, ClickConsumer) {
    let rb = HeapRb::<ScheduledClick>::new(capacity);
    rb.split()
}

pub(crate) fn create_bus_command_channel(
    capacity: usize,
) -> (BusCommandProducer, BusCommandConsumer) {
    let rb = HeapRb::<BusCommand>::new(capacity);
    rb.split()
}

pub(crate) fn create_retired_channel(capacity: usize) -> (RetiredProducer, RetiredConsumer) {
    let rb = HeapRb::<Retired>::new(capacity);
    rb.split()
}
