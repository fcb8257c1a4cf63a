use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info};

use crate::animator::{OnComplete, RouteAnimator, Sink};
use crate::config::AnimationPacing;
use crate::route::{Coordinate, Route, RouteCollection, RouteKey, RunEndpoints};

/// Drives the single-run playback for whatever the map currently shows.
///
/// Auto-plays when a new single run appears, replays on request, and makes
/// sure an old animation is stopped before a new one starts.
pub struct RoutePlayer {
    pacing: AnimationPacing,
    animated: Rc<RefCell<Vec<Coordinate>>>,
    animator: Rc<RefCell<Option<RouteAnimator>>>,
    single_run: Option<Route>,
    last_key: Option<RouteKey>,
    on_frame: Option<Sink>,
    on_complete: Option<OnComplete>,
}

impl RoutePlayer {
    pub fn new(pacing: AnimationPacing) -> Self {
        Self {
            pacing,
            animated: Rc::default(),
            animator: Rc::default(),
            single_run: None,
            last_key: None,
            on_frame: None,
            on_complete: None,
        }
    }

    /// Also forward every animation frame to `sink`.
    pub fn on_frame(mut self, sink: Sink) -> Self {
        self.on_frame = Some(sink);
        self
    }

    pub fn on_complete(mut self, callback: OnComplete) -> Self {
        self.on_complete = Some(callback);
        self
    }

    /// Update the displayed routes.
    pub fn show(&mut self, routes: &RouteCollection) {
        let Some(route) = routes.single_run() else {
            if self.single_run.take().is_some() {
                debug!("{} routes shown, leaving single-run mode", routes.routes.len());
            }
            self.last_key = None;
            self.stop();
            self.animated.borrow_mut().clear();
            return;
        };

        self.single_run = Some(route.clone());
        let key = route.key();
        if self.last_key != Some(key) {
            info!("New route {key}, playing");
            self.last_key = Some(key);
            self.play();
        }
    }

    /// Replay the current single run from the beginning, e.g. on a map click.
    pub fn replay(&mut self) {
        if self.single_run.is_some() {
            self.play();
        }
    }

    /// External replay trigger; any positive counter value restarts playback.
    pub fn trigger(&mut self, counter: u64) {
        if counter > 0 {
            self.replay();
        }
    }

    pub fn stop(&mut self) {
        let current = self.animator.borrow_mut().take();
        if let Some(mut animator) = current {
            animator.stop();
        }
    }

    pub fn is_animating(&self) -> bool {
        self.animator
            .borrow()
            .as_ref()
            .is_some_and(RouteAnimator::is_running)
    }

    pub fn is_single_run(&self) -> bool {
        self.single_run.is_some()
    }

    /// The part of the single run drawn so far.
    pub fn animated_points(&self) -> Vec<Coordinate> {
        self.animated.borrow().clone()
    }

    pub fn single_run_endpoints(&self) -> Option<RunEndpoints> {
        self.single_run.as_ref()?.endpoints()
    }

    fn play(&mut self) {
        let Some(route) = self.single_run.clone() else {
            return;
        };
        self.stop();
        self.animated.borrow_mut().clear();
        if route.len() < 2 {
            return;
        }

        let animated = self.animated.clone();
        let on_frame = self.on_frame.clone();
        let sink: Sink = Rc::new(move |prefix: &[Coordinate]| {
            {
                let mut points = animated.borrow_mut();
                points.clear();
                points.extend_from_slice(prefix);
            }
            if let Some(on_frame) = &on_frame {
                on_frame(prefix);
            }
        });

        // Weak: the animator lives in the slot it clears.
        let slot = Rc::downgrade(&self.animator);
        let on_complete = self.on_complete.clone();
        let completed: OnComplete = Rc::new(move || {
            if let Some(slot) = slot.upgrade() {
                let finished = slot.borrow_mut().take();
                drop(finished);
            }
            debug!("Playback complete");
            if let Some(on_complete) = &on_complete {
                on_complete();
            }
        });

        let mut animator = RouteAnimator::new(route, self.pacing, sink).on_complete(completed);
        animator.start();
        *self.animator.borrow_mut() = Some(animator);
    }
}

impl Drop for RoutePlayer {
    fn drop(&mut self) {
        self.stop();
    }
}
