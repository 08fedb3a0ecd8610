use std::collections::VecDeque;

use slotmap::SecondaryMap;

use crate::keys::{CallIndex, FenceKey, QueueKey};

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ReadyExecutable<T> {
    pub call: CallIndex,
    pub queue: QueueKey,
    pub payload: T,
}

#[derive(Debug)]
enum QueueOp<T> {
    Wait {
        call: CallIndex,
        fence: FenceKey,
        value: u64,
    },
    Signal {
        call: CallIndex,
        fence: FenceKey,
        value: u64,
    },
    Execute {
        call: CallIndex,
        payload: T,
    },
}

#[derive(Debug)]
struct QueueState<T> {
    /// Work the queue has not reached yet. Empty means not waiting.
    pending: VecDeque<QueueOp<T>>,
}

impl<T> Default for QueueState<T> {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
        }
    }
}

/// Replays the fence signal/wait protocol to decide when submitted work has
/// actually happened on the GPU timeline.
///
/// Nothing here blocks: a queue waiting on a fence buffers what is submitted
/// to it, and the buffered work is handed out by [`get_ready_executables`]
/// once the fence reaches the awaited value.
///
/// [`get_ready_executables`]: ExecutionOrderTracker::get_ready_executables
#[derive(Debug)]
pub struct ExecutionOrderTracker<T> {
    queues: SecondaryMap<QueueKey, QueueState<T>>,
    fences: SecondaryMap<FenceKey, u64>,
    ready: Vec<ReadyExecutable<T>>,
}

impl<T> Default for ExecutionOrderTracker<T> {
    fn default() -> Self {
        Self {
            queues: SecondaryMap::new(),
            fences: SecondaryMap::new(),
            ready: Vec::new(),
        }
    }
}

impl<T> ExecutionOrderTracker<T> {
    pub fn create_fence(&mut self, fence: FenceKey, initial_value: u64) {
        self.fences.insert(fence, initial_value);
    }

    pub fn destroy_fence(&mut self, fence: FenceKey) {
        self.fences.remove(fence);
    }

    /// Last value the fence is known to have reached. Unknown fences read 0.
    pub fn fence_value(&self, fence: FenceKey) -> u64 {
        self.fences.get(fence).copied().unwrap_or(0)
    }

    pub fn is_waiting(&self, queue: QueueKey) -> bool {
        self.pending_count(queue) > 0
    }

    pub fn pending_count(&self, queue: QueueKey) -> usize {
        self.queues.get(queue).map_or(0, |q| q.pending.len())
    }

    pub fn destroy_queue(&mut self, queue: QueueKey) {
        if let Some(state) = self.queues.remove(queue)
            && !state.pending.is_empty()
        {
            log::warn!(
                "Queue {:?} destroyed with {} operations still waiting on a fence",
                queue,
                state.pending.len()
            );
        }
    }

    pub fn command_queue_wait(
        &mut self,
        call: CallIndex,
        queue: QueueKey,
        fence: FenceKey,
        value: u64,
    ) {
        if !self.is_waiting(queue) && self.fence_value(fence) >= value {
            return;
        }
        log::debug!(
            "[{}] queue {:?} waits for fence {:?} to reach {} (at {})",
            call,
            queue,
            fence,
            value,
            self.fence_value(fence)
        );
        self.queue_mut(queue)
            .pending
            .push_back(QueueOp::Wait { call, fence, value });
    }

    /// Queue-side signal. It lands behind whatever the queue is still waiting on.
    pub fn command_queue_signal(
        &mut self,
        call: CallIndex,
        queue: QueueKey,
        fence: FenceKey,
        value: u64,
    ) {
        if self.is_waiting(queue) {
            self.queue_mut(queue)
                .pending
                .push_back(QueueOp::Signal { call, fence, value });
            return;
        }
        self.fence_signal(call, fence, value);
    }

    /// CPU-side signal, visible immediately.
    pub fn fence_signal(&mut self, call: CallIndex, fence: FenceKey, value: u64) {
        self.advance_fence(call, fence, value);
        self.pump();
    }

    pub fn execute(&mut self, call: CallIndex, queue: QueueKey, payload: T) {
        if self.is_waiting(queue) {
            log::debug!("[{}] deferring execute on waiting queue {:?}", call, queue);
            self.queue_mut(queue)
                .pending
                .push_back(QueueOp::Execute { call, payload });
        } else {
            self.ready.push(ReadyExecutable {
                call,
                queue,
                payload,
            });
        }
    }

    /// Hands out everything that became runnable since the last call, in the
    /// order it became runnable.
    pub fn get_ready_executables(&mut self) -> Vec<ReadyExecutable<T>> {
        std::mem::take(&mut self.ready)
    }

    fn advance_fence(&mut self, call: CallIndex, fence: FenceKey, value: u64) {
        let Some(current) = self.fences.entry(fence).map(|e| e.or_insert(0)) else {
            log::warn!("[{}] signal on stale fence {:?} ignored", call, fence);
            return;
        };
        if value > *current {
            *current = value;
        } else if value < *current {
            log::debug!(
                "[{}] fence {:?} signaled to {} but already at {}",
                call,
                fence,
                value,
                current
            );
        }
    }

    /// Lets every queue run as far as the known fence values allow. A signal
    /// released from one queue can unblock another, so repeat until stable.
    fn pump(&mut self) {
        loop {
            let mut progressed = false;
            let queue_keys: Vec<QueueKey> = self.queues.keys().collect();
            for queue in queue_keys {
                while let Some(op) = self.pop_runnable(queue) {
                    progressed = true;
                    match op {
                        QueueOp::Wait { call, fence, value } => {
                            log::debug!(
                                "[{}] queue {:?} released by fence {:?} reaching {}",
                                call,
                                queue,
                                fence,
                                value
                            );
                        }
                        QueueOp::Signal { call, fence, value } => {
                            self.advance_fence(call, fence, value)
                        }
                        QueueOp::Execute { call, payload } => self.ready.push(ReadyExecutable {
                            call,
                            queue,
                            payload,
                        }),
                    }
                }
            }
            if !progressed {
                break;
            }
        }
    }

    fn pop_runnable(&mut self, queue: QueueKey) -> Option<QueueOp<T>> {
        let state = self.queues.get_mut(queue)?;
        if let Some(QueueOp::Wait { fence, value, .. }) = state.pending.front() {
            let reached = self.fences.get(*fence).copied().unwrap_or(0);
            if reached < *value {
                return None;
            }
        }
        state.pending.pop_front()
    }

    fn queue_mut(&mut self, queue: QueueKey) -> &mut QueueState<T> {
        self.queues
            .entry(queue)
            .expect("stale command queue key")
            .or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyArena;

    struct Fixture {
        tracker: ExecutionOrderTracker<&'static str>,
        queues: KeyArena<QueueKey>,
        fences: KeyArena<FenceKey>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                tracker: ExecutionOrderTracker::default(),
                queues: KeyArena::default(),
                fences: KeyArena::default(),
            }
        }

        fn drain(&mut self) -> Vec<&'static str> {
            self.tracker
                .get_ready_executables()
                .into_iter()
                .map(|e| e.payload)
                .collect()
        }
    }

    #[test]
    fn idle_queue_runs_immediately() {
        let mut fx = Fixture::new();
        let queue = fx.queues.allocate();
        fx.tracker.execute(0, queue, "a");
        fx.tracker.execute(1, queue, "b");
        assert_eq!(fx.drain(), vec!["a", "b"]);
        assert!(fx.drain().is_empty());
    }

    #[test]
    fn satisfied_wait_does_not_block() {
        let mut fx = Fixture::new();
        let queue = fx.queues.allocate();
        let fence = fx.fences.allocate();
        fx.tracker.create_fence(fence, 3);
        fx.tracker.command_queue_wait(0, queue, fence, 3);
        assert!(!fx.tracker.is_waiting(queue));
        fx.tracker.execute(1, queue, "a");
        assert_eq!(fx.drain(), vec!["a"]);
    }

    #[test]
    fn waiting_queue_buffers_until_signal() {
        let mut fx = Fixture::new();
        let queue = fx.queues.allocate();
        let fence = fx.fences.allocate();
        fx.tracker.create_fence(fence, 0);

        fx.tracker.command_queue_wait(0, queue, fence, 5);
        fx.tracker.execute(1, queue, "a");
        fx.tracker.execute(2, queue, "b");
        assert!(fx.drain().is_empty());
        assert_eq!(fx.tracker.pending_count(queue), 3);

        fx.tracker.fence_signal(3, fence, 4);
        assert!(fx.drain().is_empty());

        fx.tracker.fence_signal(4, fence, 5);
        assert_eq!(fx.drain(), vec!["a", "b"]);
        assert!(!fx.tracker.is_waiting(queue));
    }

    #[test]
    fn fence_values_never_decrease() {
        let mut fx = Fixture::new();
        let fence = fx.fences.allocate();
        fx.tracker.create_fence(fence, 0);
        fx.tracker.fence_signal(0, fence, 7);
        fx.tracker.fence_signal(1, fence, 2);
        assert_eq!(fx.tracker.fence_value(fence), 7);
    }

    #[test]
    fn queue_signal_behind_wait_is_deferred() {
        let mut fx = Fixture::new();
        let compute = fx.queues.allocate();
        let direct = fx.queues.allocate();
        let upload_done = fx.fences.allocate();
        let compute_done = fx.fences.allocate();

        fx.tracker.command_queue_wait(0, compute, upload_done, 1);
        fx.tracker.execute(1, compute, "compute");
        fx.tracker.command_queue_signal(2, compute, compute_done, 1);

        fx.tracker.command_queue_wait(3, direct, compute_done, 1);
        fx.tracker.execute(4, direct, "direct");
        assert_eq!(fx.tracker.fence_value(compute_done), 0);
        assert!(fx.drain().is_empty());

        fx.tracker.fence_signal(5, upload_done, 1);
        assert_eq!(fx.drain(), vec!["compute", "direct"]);
        assert_eq!(fx.tracker.fence_value(compute_done), 1);
    }

    #[test]
    fn ready_order_follows_queue_then_submission_order() {
        let mut fx = Fixture::new();
        let first = fx.queues.allocate();
        let second = fx.queues.allocate();
        let fence = fx.fences.allocate();

        fx.tracker.command_queue_wait(0, second, fence, 1);
        fx.tracker.command_queue_wait(1, first, fence, 1);
        fx.tracker.execute(2, second, "s0");
        fx.tracker.execute(3, first, "f0");
        fx.tracker.execute(4, second, "s1");

        fx.tracker.fence_signal(5, fence, 1);
        assert_eq!(fx.drain(), vec!["f0", "s0", "s1"]);
    }

    #[test]
    fn later_wait_stays_blocked_after_first_is_released() {
        let mut fx = Fixture::new();
        let queue = fx.queues.allocate();
        let fence = fx.fences.allocate();

        fx.tracker.command_queue_wait(0, queue, fence, 1);
        fx.tracker.execute(1, queue, "a");
        fx.tracker.command_queue_wait(2, queue, fence, 2);
        fx.tracker.execute(3, queue, "b");

        fx.tracker.fence_signal(4, fence, 1);
        assert_eq!(fx.drain(), vec!["a"]);
        assert!(fx.tracker.is_waiting(queue));

        fx.tracker.fence_signal(5, fence, 2);
        assert_eq!(fx.drain(), vec!["b"]);
    }

    #[test]
    fn ready_executables_carry_call_and_queue() {
        let mut fx = Fixture::new();
        let queue = fx.queues.allocate();
        let fence = fx.fences.allocate();
        fx.tracker.command_queue_wait(10, queue, fence, 1);
        fx.tracker.execute(11, queue, "a");
        fx.tracker.fence_signal(12, fence, 1);

        assert_eq!(
            fx.tracker.get_ready_executables(),
            vec![ReadyExecutable {
                call: 11,
                queue,
                payload: "a"
            }]
        );
    }

    #[test]
    fn destroyed_queue_drops_pending_work() {
        let mut fx = Fixture::new();
        let queue = fx.queues.allocate();
        let fence = fx.fences.allocate();
        fx.tracker.create_fence(fence, 0);

        fx.tracker.command_queue_wait(0, queue, fence, 1);
        fx.tracker.execute(1, queue, "a");
        fx.tracker.destroy_queue(queue);
        assert_eq!(fx.tracker.pending_count(queue), 0);

        fx.tracker.fence_signal(2, fence, 1);
        assert!(fx.drain().is_empty());
    }
}
