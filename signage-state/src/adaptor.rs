//! Performance policy for the device a display runs on
//!
//! Pure computation. The session reclassifies the device when the display's
//! `low_power` hint changes or the presentation layer reports frame counts,
//! and hands the resulting [`PerformancePolicy`] to the scheduler and
//! presentation layer.

use serde::{Deserialize, Serialize};
use signage_model::{PlaylistItem, Transition, TransitionKind};

const LOW_POWER_MAX_CORES: usize = 2;
const LOW_POWER_MAX_MEMORY_BYTES: u64 = 1024 * 1024 * 1024;
const LOW_POWER_DROPPED_FRAME_RATIO: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    #[default]
    Standard,
    LowPower,
}

/// What is known about the device's capacity
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RuntimeMetrics {
    pub cpu_cores: Option<usize>,
    pub total_memory_bytes: Option<u64>,
    pub frames_rendered: u64,
    pub frames_dropped: u64,
}

impl RuntimeMetrics {
    /// Probe the host for core count and installed memory
    pub fn detect() -> Self {
        let cpu_cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .ok();

        let mut system = sysinfo::System::new();
        system.refresh_memory();
        let total_memory_bytes = Some(system.total_memory()).filter(|&bytes| bytes > 0);

        Self {
            cpu_cores,
            total_memory_bytes,
            frames_rendered: 0,
            frames_dropped: 0,
        }
    }

    pub fn with_frames(mut self, rendered: u64, dropped: u64) -> Self {
        self.frames_rendered = rendered;
        self.frames_dropped = dropped;
        self
    }

    /// Share of frames dropped; `None` until any frames are reported
    pub fn dropped_frame_ratio(&self) -> Option<f64> {
        let total = self.frames_rendered + self.frames_dropped;
        (total > 0).then(|| self.frames_dropped as f64 / total as f64)
    }
}

/// Classify the device.
///
/// An explicit hint from the display settings wins. Without one, the device is
/// low power when it has at most two cores, at most 1 GiB of memory, or drops
/// more than a tenth of its frames.
pub fn classify(hint: Option<bool>, metrics: &RuntimeMetrics) -> DeviceClass {
    match hint {
        Some(true) => return DeviceClass::LowPower,
        Some(false) => return DeviceClass::Standard,
        None => {}
    }

    let constrained = metrics.cpu_cores.is_some_and(|c| c <= LOW_POWER_MAX_CORES)
        || metrics
            .total_memory_bytes
            .is_some_and(|m| m <= LOW_POWER_MAX_MEMORY_BYTES)
        || metrics
            .dropped_frame_ratio()
            .is_some_and(|r| r > LOW_POWER_DROPPED_FRAME_RATIO);

    if constrained {
        DeviceClass::LowPower
    } else {
        DeviceClass::Standard
    }
}

/// Rendering limits for one device class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformancePolicy {
    pub class: DeviceClass,
    /// Highest [`TransitionKind::complexity`] allowed
    pub max_transition_complexity: u8,
    /// Longest transition allowed, in seconds
    pub transition_duration_cap: Option<f64>,
    /// Upcoming items to preload
    pub preload_count: usize,
    pub loading_indicator_enabled: bool,
}

impl PerformancePolicy {
    pub fn for_class(class: DeviceClass) -> Self {
        match class {
            DeviceClass::Standard => Self {
                class,
                max_transition_complexity: TransitionKind::Flip.complexity(),
                transition_duration_cap: None,
                preload_count: 2,
                loading_indicator_enabled: true,
            },
            DeviceClass::LowPower => Self {
                class,
                max_transition_complexity: TransitionKind::Fade.complexity(),
                transition_duration_cap: Some(0.5),
                preload_count: 1,
                loading_indicator_enabled: false,
            },
        }
    }

    pub fn detect(hint: Option<bool>) -> Self {
        Self::for_class(classify(hint, &RuntimeMetrics::detect()))
    }

    /// The transition to actually render for `item`
    pub fn effective_transition(&self, item: &PlaylistItem) -> Transition {
        let requested = item.transition;

        let kind = if requested.kind.complexity() > self.max_transition_complexity {
            TransitionKind::Fade
        } else {
            requested.kind
        };
        let duration = match self.transition_duration_cap {
            Some(cap) => requested.duration.min(cap),
            None => requested.duration,
        };

        Transition::new(kind, duration)
    }
}

impl Default for PerformancePolicy {
    fn default() -> Self {
        Self::for_class(DeviceClass::Standard)
    }
}
