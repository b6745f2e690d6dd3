// src/stats.rs
// Rolling frame-time telemetry. Output-only: nothing in the render
// path depends on these numbers.

use std::collections::VecDeque;

const DEFAULT_WINDOW: usize = 120;

/// Rolling window of frame times used to report an FPS sample.
#[derive(Debug)]
pub struct FrameTimings {
    window: usize,
    samples_ms: VecDeque<f32>,
}

impl Default for FrameTimings {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl FrameTimings {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            samples_ms: VecDeque::new(),
        }
    }

    pub fn push(&mut self, frame_ms: f32) {
        if self.samples_ms.len() == self.window {
            self.samples_ms.pop_front();
        }
        self.samples_ms.push_back(frame_ms.max(0.0));
    }

    pub fn average_ms(&self) -> f32 {
        if self.samples_ms.is_empty() {
            return 0.0;
        }
        self.samples_ms.iter().sum::<f32>() / self.samples_ms.len() as f32
    }

    pub fn fps(&self) -> f32 {
        let avg = self.average_ms();
        if avg <= f32::EPSILON {
            0.0
        } else {
            1000.0 / avg
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples_ms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_evicts_oldest() {
        let mut timings = FrameTimings::new(2);
        timings.push(10.0);
        timings.push(20.0);
        timings.push(30.0);
        assert_eq!(timings.sample_count(), 2);
        assert!((timings.average_ms() - 25.0).abs() < 1.0e-5);
    }

    #[test]
    fn fps_from_average() {
        let mut timings = FrameTimings::default();
        timings.push(16.0);
        assert!((timings.fps() - 62.5).abs() < 1.0e-3);
    }
}
