//! Bounded input queues of a node.
//!
//! All input slots of a node share one mutex and two condition variables:
//! `data_ready` wakes the node's worker, `space_freed` wakes producers that
//! are blocked on a `BlockProducer` slot. Sharing the lock keeps the trigger
//! check ("are all blocking slots ready?") atomic across slots.

use crate::buffer::MediaBuffer;
use crate::pipeline::slot::{FetchMode, FullPolicy, InputSlot};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Result of pushing one buffer into an input slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queued after discarding the oldest buffer of the slot.
    DroppedOldest,
    /// Not queued: the node is stopping, the edge went away, or the slot does not exist.
    Rejected,
}

struct QueueState {
    queues: Vec<VecDeque<MediaBuffer>>,
    stopping: bool,
}

pub(crate) struct InputQueues {
    slots: Vec<InputSlot>,
    state: Mutex<QueueState>,
    data_ready: Condvar,
    space_freed: Condvar,
}

impl InputQueues {
    pub(crate) fn new(slots: Vec<InputSlot>) -> Self {
        let queues = slots
            .iter()
            .map(|s| VecDeque::with_capacity(s.max_depth))
            .collect();
        Self {
            slots,
            state: Mutex::new(QueueState {
                queues,
                stopping: false,
            }),
            data_ready: Condvar::new(),
            space_freed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Push a buffer into `slot` following the slot's full-queue policy.
    ///
    /// `keep_waiting` is polled while a `BlockProducer` push is waiting so that
    /// a disconnect or a stopping producer can release the wait. Whoever flips
    /// its answer must call [`wake_producers`](Self::wake_producers).
    pub(crate) fn push(
        &self,
        slot: usize,
        buffer: MediaBuffer,
        keep_waiting: &dyn Fn() -> bool,
    ) -> PushOutcome {
        let Some(config) = self.slots.get(slot).copied() else {
            return PushOutcome::Rejected;
        };
        let mut state = self.lock();
        if state.stopping {
            return PushOutcome::Rejected;
        }

        let mut outcome = PushOutcome::Queued;
        match config.when_full {
            FullPolicy::DropOldest => {
                if state.queues[slot].len() >= config.max_depth {
                    state.queues[slot].pop_front();
                    outcome = PushOutcome::DroppedOldest;
                }
            }
            FullPolicy::BlockProducer => {
                while state.queues[slot].len() >= config.max_depth {
                    if state.stopping || !keep_waiting() {
                        return PushOutcome::Rejected;
                    }
                    state = self
                        .space_freed
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }

        state.queues[slot].push_back(buffer);
        drop(state);
        self.data_ready.notify_all();
        outcome
    }

    fn is_ready(&self, state: &QueueState) -> bool {
        let mut any_blocking = false;
        for (slot, queue) in self.slots.iter().zip(&state.queues) {
            if slot.fetch == FetchMode::Blocking {
                any_blocking = true;
                if queue.is_empty() {
                    return false;
                }
            }
        }
        any_blocking || state.queues.iter().any(|q| !q.is_empty())
    }

    /// Block until the trigger condition holds, then take one buffer from each
    /// blocking slot and whatever is at the front of each best-effort slot.
    ///
    /// Returns `None` once the queues are stopping.
    pub(crate) fn wait_and_fetch(&self) -> Option<Vec<Option<MediaBuffer>>> {
        let mut state = self.lock();
        loop {
            if state.stopping {
                return None;
            }
            if self.is_ready(&state) {
                break;
            }
            state = self
                .data_ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        let inputs = state.queues.iter_mut().map(VecDeque::pop_front).collect();
        drop(state);
        self.space_freed.notify_all();
        Some(inputs)
    }

    /// Enter the stopping state, wake everyone, and discard queued buffers.
    /// Returns how many buffers were discarded.
    pub(crate) fn stop(&self) -> usize {
        let mut state = self.lock();
        state.stopping = true;
        let dropped = state.queues.iter().map(VecDeque::len).sum();
        for queue in &mut state.queues {
            queue.clear();
        }
        drop(state);
        self.data_ready.notify_all();
        self.space_freed.notify_all();
        dropped
    }

    /// Wake producers blocked on a full slot so they can re-check their edge.
    pub(crate) fn wake_producers(&self) {
        let _state = self.lock();
        self.space_freed.notify_all();
    }

    pub(crate) fn len(&self, slot: usize) -> usize {
        self.lock().queues.get(slot).map_or(0, VecDeque::len)
    }

    /// Copy of the buffers currently queued on `slot`, oldest first.
    pub(crate) fn queued(&self, slot: usize) -> Vec<MediaBuffer> {
        self.lock()
            .queues
            .get(slot)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferKind;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn buf(ts: u64) -> MediaBuffer {
        MediaBuffer::new(Vec::new(), BufferKind::Opaque).with_timestamp(ts)
    }

    fn stamps(buffers: &[MediaBuffer]) -> Vec<u64> {
        buffers.iter().map(MediaBuffer::timestamp_us).collect()
    }

    #[test]
    fn test_drop_oldest_keeps_latest() {
        let q = InputQueues::new(vec![InputSlot::frames(2)]);
        assert_eq!(q.push(0, buf(1), &|| true), PushOutcome::Queued);
        assert_eq!(q.push(0, buf(2), &|| true), PushOutcome::Queued);
        assert_eq!(q.push(0, buf(3), &|| true), PushOutcome::DroppedOldest);
        assert_eq!(stamps(&q.queued(0)), vec![2, 3]);
    }

    #[test]
    fn test_fetch_waits_for_all_blocking_slots() {
        let q = Arc::new(InputQueues::new(vec![
            InputSlot::frames(2),
            InputSlot::frames(2),
            InputSlot::latest(1),
        ]));
        q.push(0, buf(1), &|| true);
        q.push(2, buf(9), &|| true);

        let q2 = q.clone();
        let handle = thread::spawn(move || q2.wait_and_fetch());
        thread::sleep(Duration::from_millis(30));
        assert!(!handle.is_finished());

        q.push(1, buf(2), &|| true);
        let inputs = handle.join().unwrap().unwrap();
        assert_eq!(inputs[0].as_ref().map(MediaBuffer::timestamp_us), Some(1));
        assert_eq!(inputs[1].as_ref().map(MediaBuffer::timestamp_us), Some(2));
        assert_eq!(inputs[2].as_ref().map(MediaBuffer::timestamp_us), Some(9));
    }

    #[test]
    fn test_best_effort_slot_yields_none() {
        let q = InputQueues::new(vec![InputSlot::frames(2), InputSlot::latest(1)]);
        q.push(0, buf(1), &|| true);
        let inputs = q.wait_and_fetch().unwrap();
        assert!(inputs[0].is_some());
        assert!(inputs[1].is_none());
    }

    #[test]
    fn test_block_producer_waits_for_space() {
        let q = Arc::new(InputQueues::new(vec![InputSlot::lossless(1)]));
        q.push(0, buf(1), &|| true);

        let q2 = q.clone();
        let producer = thread::spawn(move || q2.push(0, buf(2), &|| true));
        thread::sleep(Duration::from_millis(30));
        assert!(!producer.is_finished());

        let first = q.wait_and_fetch().unwrap();
        assert_eq!(first[0].as_ref().map(MediaBuffer::timestamp_us), Some(1));
        assert_eq!(producer.join().unwrap(), PushOutcome::Queued);
        assert_eq!(stamps(&q.queued(0)), vec![2]);
    }

    #[test]
    fn test_disconnect_releases_blocked_producer() {
        let q = Arc::new(InputQueues::new(vec![InputSlot::lossless(1)]));
        let connected = Arc::new(AtomicBool::new(true));
        q.push(0, buf(1), &|| true);

        let (q2, c2) = (q.clone(), connected.clone());
        let producer =
            thread::spawn(move || q2.push(0, buf(2), &|| c2.load(Ordering::Acquire)));
        thread::sleep(Duration::from_millis(20));
        connected.store(false, Ordering::Release);
        q.wake_producers();
        assert_eq!(producer.join().unwrap(), PushOutcome::Rejected);
        assert_eq!(q.len(0), 1);
    }

    #[test]
    fn test_stop_drops_queued_and_rejects() {
        let q = InputQueues::new(vec![InputSlot::frames(4)]);
        q.push(0, buf(1), &|| true);
        q.push(0, buf(2), &|| true);
        assert_eq!(q.stop(), 2);
        assert_eq!(q.push(0, buf(3), &|| true), PushOutcome::Rejected);
        assert!(q.wait_and_fetch().is_none());
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_drop_oldest_holds_last_n(depth in 1usize..8, count in 0usize..40) {
            let q = InputQueues::new(vec![InputSlot::frames(depth)]);
            for ts in 0..count as u64 {
                q.push(0, buf(ts), &|| true);
            }
            // Property: the queue holds exactly the last `depth` buffers, in order
            let expected: Vec<u64> = (count.saturating_sub(depth)..count).map(|t| t as u64).collect();
            prop_assert_eq!(stamps(&q.queued(0)), expected);
        }
    }
}
