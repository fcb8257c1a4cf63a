//! Single-route playback: reveals a route one point at a time so the map can
//! draw it as if it were being ridden.
//!
//! Ticks run on the current thread's [`tokio::task::LocalSet`]; an animator
//! must be started from inside one.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::AnimationPacing;
use crate::route::{Coordinate, Route};

/// Receives the revealed prefix of the route on every tick.
pub type Sink = Rc<dyn Fn(&[Coordinate])>;
/// Called once when a run reveals its last point.
pub type OnComplete = Rc<dyn Fn()>;

/// State of one run, shared between the animator and its task.
#[derive(Default)]
struct RunState {
    cancelled: Cell<bool>,
    finished: Cell<bool>,
    revealed: Cell<usize>,
}

impl RunState {
    fn is_live(&self) -> bool {
        !self.cancelled.get() && !self.finished.get()
    }
}

/// Owned handle to a scheduled run. Cancelling (or dropping) it guarantees the
/// run never calls its sink or completion callback again.
pub struct AnimationTask {
    state: Rc<RunState>,
    handle: JoinHandle<()>,
}

impl AnimationTask {
    pub fn cancel(&self) {
        if !self.state.cancelled.replace(true) {
            self.handle.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.is_live()
    }

    pub fn revealed(&self) -> usize {
        self.state.revealed.get()
    }
}

impl Drop for AnimationTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub struct RouteAnimator {
    route: Route,
    pacing: AnimationPacing,
    sink: Sink,
    on_complete: Option<OnComplete>,
    task: Option<AnimationTask>,
}

impl RouteAnimator {
    pub fn new(route: Route, pacing: AnimationPacing, sink: Sink) -> Self {
        Self {
            route,
            pacing,
            sink,
            on_complete: None,
            task: None,
        }
    }

    pub fn on_complete(mut self, callback: OnComplete) -> Self {
        self.on_complete = Some(callback);
        self
    }

    /// Start revealing the route from its first segment, cancelling any run
    /// already in progress. Routes with fewer than two points are ignored.
    pub fn start(&mut self) {
        self.stop();

        let n = self.route.len();
        if n < 2 {
            debug!("Not animating a route of {n} point(s)");
            return;
        }

        let delay = self.pacing.step_delay(n);
        debug!("Animating {n} points, one every {delay:?}");

        let state = Rc::new(RunState::default());
        let handle = tokio::task::spawn_local(run(
            self.route.clone(),
            delay,
            self.sink.clone(),
            self.on_complete.clone(),
            state.clone(),
        ));
        self.task = Some(AnimationTask { state, handle });
    }

    /// Cancel the current run, if any. Completion is not reported.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            if task.is_active() {
                debug!("Stopped animation after {} points", task.revealed());
            }
            task.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(AnimationTask::is_active)
    }
}

impl Drop for RouteAnimator {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(
    route: Route,
    delay: Duration,
    sink: Sink,
    on_complete: Option<OnComplete>,
    state: Rc<RunState>,
) {
    let n = route.len();
    for i in 1..n {
        if state.cancelled.get() {
            return;
        }
        sink(&route[..=i]);
        state.revealed.set(i + 1);

        // The sink may have stopped us.
        if state.cancelled.get() {
            return;
        }
        if i + 1 < n {
            tokio::time::sleep(delay).await;
        }
    }

    state.finished.set(true);
    debug!("Animation finished: {n} points");
    if let Some(callback) = on_complete {
        callback();
    }
}
