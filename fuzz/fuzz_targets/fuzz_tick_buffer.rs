//! Fuzz target for [`TickBuffer`] operation sequences.
//!
//! Whatever the sequence, ticks stay strictly increasing from head to tail and no
//! acknowledged tick survives.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use predictive_sync::{Tick, TickBuffer};

#[derive(Debug, Arbitrary)]
enum Op {
    Push(u16, u32),
    Acknowledge(u16),
    TakeAcknowledged(u16),
    PopOldest,
    Clear,
}

fuzz_target!(|ops: Vec<Op>| {
    let mut buffer = TickBuffer::<u32>::new();
    for op in ops {
        match op {
            Op::Push(tick, value) => {
                let tick = Tick::new(u64::from(tick));
                let tail = buffer.back_tick();
                let accepted = buffer.push(tick, value).is_ok();
                assert_eq!(accepted, tail.map_or(true, |tail| tick > tail));
            }
            Op::Acknowledge(ack) => {
                let ack = Tick::new(u64::from(ack));
                buffer.acknowledge(ack);
                assert!(buffer.front_tick().map_or(true, |front| front > ack));
            }
            Op::TakeAcknowledged(ack) => {
                let ack = Tick::new(u64::from(ack));
                assert!(buffer.take_acknowledged(ack).all(|(tick, _)| tick <= ack));
            }
            Op::PopOldest => {
                buffer.pop_oldest();
            }
            Op::Clear => buffer.clear(),
        }
        let ticks: Vec<Tick> = buffer.ticks().collect();
        assert!(ticks.windows(2).all(|pair| pair[0] < pair[1]));
    }
});
