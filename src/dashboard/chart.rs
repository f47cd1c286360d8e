use chrono::{DateTime, Local};
use std::collections::VecDeque;

pub const MAX_CHART_POINTS: usize = 20;

/// One chart sample: the value of every phase at the moment of the append.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub timestamp: DateTime<Local>,
    pub phases: [f64; 3],
}

impl ChartPoint {
    /// X-axis label, wall-clock `HH:MM:SS`.
    pub fn label(&self) -> String {
        self.timestamp.format("%H:%M:%S").to_string()
    }
}

/// Bounded FIFO of chart points; the oldest point is dropped once capacity is exceeded.
#[derive(Debug, Clone)]
pub struct ChartWindow {
    points: VecDeque<ChartPoint>,
    capacity: usize,
}

impl Default for ChartWindow {
    fn default() -> Self {
        Self::with_capacity(MAX_CHART_POINTS)
    }
}

impl ChartWindow {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn push(&mut self, timestamp: DateTime<Local>, phases: [f64; 3]) {
        self.points.push_back(ChartPoint { timestamp, phases });
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = &ChartPoint> {
        self.points.iter()
    }

    pub fn latest(&self) -> Option<&ChartPoint> {
        self.points.back()
    }

    /// Values of one phase, oldest first.
    pub fn series(&self, phase_index: usize) -> Vec<f64> {
        self.points
            .iter()
            .filter_map(|p| p.phases.get(phase_index).copied())
            .collect()
    }

    pub fn labels(&self) -> Vec<String> {
        self.points.iter().map(ChartPoint::label).collect()
    }
}
