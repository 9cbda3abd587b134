//! Debounce-then-throttle for rapid user input, e.g. dragging the volume slider.
//!
//! Every submitted value restarts a timer of `debounce`. When the timer fires, the pending value is
//! emitted only if at least `throttle` has passed since the last emission, otherwise it is dropped.
//! Values are never queued: only the latest one is ever pending.

use std::time::Duration;

use tokio::{
    sync::mpsc::{self, UnboundedSender},
    task::JoinHandle,
    time::Instant,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoalescerState<T> {
    Idle,
    Pending { deadline: Instant, value: T },
}

/// The timer-less state machine. Time is always passed in, which makes it trivially testable.
#[derive(Debug, Clone)]
pub struct Coalescer<T> {
    debounce: Duration,
    throttle: Duration,
    state: CoalescerState<T>,
    last_sent: Option<Instant>,
}

impl<T> Coalescer<T> {
    pub fn new(debounce: Duration, throttle: Duration) -> Self {
        Self { debounce, throttle, state: CoalescerState::Idle, last_sent: None }
    }

    pub fn state(&self) -> &CoalescerState<T> {
        &self.state
    }

    /// Replace any pending value and restart the debounce timer.
    pub fn submit(&mut self, value: T, now: Instant) {
        self.state = CoalescerState::Pending { deadline: now + self.debounce, value };
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            CoalescerState::Idle => None,
            CoalescerState::Pending { deadline, .. } => Some(deadline),
        }
    }

    /// Called when the timer fires. Returns the value to send, if it is due and outside the throttle window.
    pub fn fire(&mut self, now: Instant) -> Option<T> {
        match self.deadline() {
            Some(deadline) if deadline <= now => {}
            _ => return None,
        }
        let CoalescerState::Pending { value, .. } = std::mem::replace(&mut self.state, CoalescerState::Idle) else {
            return None;
        };
        match self.last_sent {
            Some(last_sent) if now.duration_since(last_sent) < self.throttle => None,
            _ => {
                self.last_sent = Some(now);
                Some(value)
            }
        }
    }

    pub fn cancel(&mut self) {
        self.state = CoalescerState::Idle;
    }
}

/// Handle to a running coalescer task. Dropping it stops the task and discards any pending value.
#[derive(Debug)]
pub struct CoalescerHandle<T> {
    value_send: UnboundedSender<T>,
    task: JoinHandle<()>,
}

impl<T> CoalescerHandle<T> {
    pub fn submit(&self, value: T) {
        crate::print_result_err!("while submitting value to coalescer", self.value_send.send(value).map_err(|_| "coalescer stopped"));
    }
}

impl<T> Drop for CoalescerHandle<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start a coalescer task on the current runtime, calling `sink` with every value that makes it through.
pub fn spawn<T, F>(debounce: Duration, throttle: Duration, mut sink: F) -> CoalescerHandle<T>
where
    T: std::fmt::Debug + Send + 'static,
    F: FnMut(T) + Send + 'static,
{
    let (value_send, mut value_recv) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        let mut coalescer = Coalescer::new(debounce, throttle);
        loop {
            let deadline = coalescer.deadline();
            tokio::select! {
                value = value_recv.recv() => match value {
                    Some(value) => coalescer.submit(value, Instant::now()),
                    None => break,
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    match coalescer.fire(Instant::now()) {
                        Some(value) => sink(value),
                        None => log::debug!("Dropping coalesced value, still within throttle window"),
                    }
                }
            }
        }
    });
    CoalescerHandle { value_send, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    const D: Duration = Duration::from_millis(200);
    const T: Duration = Duration::from_millis(200);

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_only_settled_value_is_sent() {
        let start = Instant::now();
        let mut coalescer = Coalescer::new(D, T);
        coalescer.submit(10, start);
        coalescer.submit(20, start + ms(20));
        coalescer.submit(30, start + ms(40));

        assert_eq!(coalescer.fire(start + ms(200)), None);
        assert_eq!(coalescer.deadline(), Some(start + ms(240)));
        assert_eq!(coalescer.fire(start + ms(240)), Some(30));
        assert_eq!(coalescer.state(), &CoalescerState::Idle);
        assert_eq!(coalescer.fire(start + ms(1000)), None);
    }

    #[test]
    fn test_throttled_value_is_dropped_not_queued() {
        let start = Instant::now();
        let mut coalescer = Coalescer::new(ms(100), T);
        coalescer.submit(10, start);
        assert_eq!(coalescer.fire(start + ms(100)), Some(10));

        coalescer.submit(20, start + ms(150));
        assert_eq!(coalescer.fire(start + ms(250)), None);
        assert_eq!(coalescer.state(), &CoalescerState::Idle);
        assert_eq!(coalescer.fire(start + ms(2000)), None);

        coalescer.submit(40, start + ms(3000));
        assert_eq!(coalescer.fire(start + ms(3100)), Some(40));
    }

    #[test]
    fn test_cancel() {
        let start = Instant::now();
        let mut coalescer = Coalescer::new(D, T);
        coalescer.submit(1, start);
        coalescer.cancel();
        assert_eq!(coalescer.deadline(), None);
        assert_eq!(coalescer.fire(start + ms(500)), None);
    }

    fn recording_sink() -> (Arc<Mutex<Vec<u8>>>, impl FnMut(u8) + Send + 'static) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let sent = sent.clone();
            move |value: u8| sent.lock().unwrap().push(value)
        };
        (sent, sink)
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_coalesces_rapid_values() {
        let (sent, sink) = recording_sink();
        let handle = spawn(D, T, sink);

        handle.submit(10);
        tokio::time::sleep(ms(20)).await;
        handle.submit(20);
        tokio::time::sleep(ms(20)).await;
        handle.submit(30);
        tokio::time::sleep(ms(1000)).await;

        assert_eq!(*sent.lock().unwrap(), vec![30]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_drops_value_inside_throttle_window() {
        let (sent, sink) = recording_sink();
        let handle = spawn(ms(100), T, sink);

        handle.submit(10);
        tokio::time::sleep(ms(150)).await;
        handle.submit(20);
        tokio::time::sleep(ms(1000)).await;

        assert_eq!(*sent.lock().unwrap(), vec![10]);
    }
}
