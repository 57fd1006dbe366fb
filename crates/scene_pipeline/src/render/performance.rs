//! Frame-rate driven quality scaling
//!
//! Listeners register with a priority. When the average frame rate drops
//! below the configured window they are asked to downgrade, lowest priority
//! first, until one accepts. Above the window they are asked to upgrade,
//! highest priority first. After any change a few evaluation windows are
//! skipped so the new frame rate can settle.

use std::time::Duration;

use log::{debug, info};

use crate::config::PerformanceConfig;
use crate::error::PipelineError;
use crate::foundation::time::Timer;

/// Something that can trade quality for speed
pub trait PerformanceListener: Send {
    /// Lower quality. Returns true if anything changed (stops forwarding).
    fn downgrade(&mut self) -> bool;

    /// Raise quality. Returns true if anything changed (stops forwarding).
    fn upgrade(&mut self) -> bool;
}

/// Handle of a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Outcome of an evaluation window that changed quality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityChange {
    /// The listener with this id lowered its quality
    Downgraded(ListenerId),
    /// The listener with this id raised its quality
    Upgraded(ListenerId),
}

struct Registration {
    id: ListenerId,
    priority: i32,
    listener: Box<dyn PerformanceListener>,
}

/// Samples frame times and notifies listeners
pub struct PerformanceMonitor {
    config: PerformanceConfig,
    listeners: Vec<Registration>,
    next_id: u64,
    timer: Timer,
    window_time: Duration,
    window_frames: u32,
    cooldown: u32,
}

impl PerformanceMonitor {
    /// Create a monitor for a validated frame-rate window
    pub fn new(config: PerformanceConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            config,
            listeners: Vec::new(),
            next_id: 0,
            timer: Timer::new(),
            window_time: Duration::ZERO,
            window_frames: 0,
            cooldown: 0,
        })
    }

    /// Register a listener. Equal priorities keep registration order.
    pub fn add_listener(&mut self, listener: Box<dyn PerformanceListener>, priority: i32) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        let position = self.listeners.partition_point(|r| r.priority <= priority);
        self.listeners.insert(position, Registration { id, priority, listener });
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|r| r.id != id);
        self.listeners.len() != before
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Mark the end of a frame using the internal timer
    pub fn mark_frame(&mut self) -> Option<QualityChange> {
        let elapsed = self.timer.tick();
        self.record_frame_time(elapsed)
    }

    /// Account for one frame that took `frame_time`
    pub fn record_frame_time(&mut self, frame_time: Duration) -> Option<QualityChange> {
        self.window_time += frame_time;
        self.window_frames += 1;
        if self.window_frames < self.config.sample_frames {
            return None;
        }

        let fps = self.average_fps();
        self.window_time = Duration::ZERO;
        self.window_frames = 0;

        if self.cooldown > 0 {
            self.cooldown -= 1;
            return None;
        }

        let change = if fps < self.config.min_fps {
            self.request_downgrade()
        } else if fps > self.config.max_fps {
            self.request_upgrade()
        } else {
            None
        };

        if let Some(change) = change {
            info!("Average frame rate {:.1} fps, quality change: {:?}", fps, change);
            self.cooldown = self.config.cooldown_samples;
        }
        change
    }

    #[allow(clippy::cast_precision_loss)]
    fn average_fps(&self) -> f32 {
        let seconds = self.window_time.as_secs_f32();
        if seconds <= 0.0 {
            return f32::INFINITY;
        }
        self.window_frames as f32 / seconds
    }

    fn request_downgrade(&mut self) -> Option<QualityChange> {
        let accepted = self
            .listeners
            .iter_mut()
            .find_map(|r| r.listener.downgrade().then_some(r.id));
        if accepted.is_none() {
            debug!("No listener could downgrade further");
        }
        accepted.map(QualityChange::Downgraded)
    }

    fn request_upgrade(&mut self) -> Option<QualityChange> {
        self.listeners
            .iter_mut()
            .rev()
            .find_map(|r| r.listener.upgrade().then_some(r.id))
            .map(QualityChange::Upgraded)
    }
}
