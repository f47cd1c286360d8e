//! Render port: the narrow interface between dashboard state and whatever draws it.

use crate::dashboard::appliances::AffordabilityState;
use crate::dashboard::chart::ChartWindow;
use crate::dashboard::phases::PhaseView;
use crate::power::Phase;
use std::io::Write;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    /// The element a view should be drawn into does not exist.
    #[error("render target missing: {0}")]
    MissingTarget(String),

    #[error("render output failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Reconnecting,
    Error,
}

impl ConnectionStatus {
    pub fn text(self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Reconnecting => "Reconnecting...",
            ConnectionStatus::Error => "Connection error",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplianceView {
    pub name: String,
    pub phase: Phase,
    pub consumption: String,
    pub state: AffordabilityState,
}

#[cfg_attr(test, mockall::automock)]
pub trait RenderPort {
    fn render_phase(&mut self, view: &PhaseView) -> Result<(), RenderError>;

    fn render_totals(&mut self, total_watts: f64, available_solar_watts: f64)
        -> Result<(), RenderError>;

    fn render_appliance(&mut self, view: &ApplianceView) -> Result<(), RenderError>;

    fn render_chart(&mut self, window: &ChartWindow) -> Result<(), RenderError>;

    fn render_connection(&mut self, status: ConnectionStatus) -> Result<(), RenderError>;

    /// Called once at the end of every update tick.
    fn present(&mut self) -> Result<(), RenderError>;
}

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Draws the whole dashboard as a text frame on every `present`.
pub struct TerminalRenderer<W: Write> {
    out: W,
    clear_screen: bool,
    status: Option<ConnectionStatus>,
    phases: [Option<PhaseView>; 3],
    totals: Option<(f64, f64)>,
    appliances: Vec<ApplianceView>,
    chart: Vec<String>,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W, clear_screen: bool) -> Self {
        Self {
            out,
            clear_screen,
            status: None,
            phases: [None, None, None],
            totals: None,
            appliances: Vec::new(),
            chart: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn frame(&self) -> String {
        let mut lines = Vec::new();

        let status = self.status.map(ConnectionStatus::text).unwrap_or("Connecting...");
        lines.push(format!("Solar relay dashboard  [{}]", status));
        lines.push(String::new());

        for (index, view) in self.phases.iter().enumerate() {
            match view {
                Some(v) => lines.push(format!("{}  {:<22} {:>10}", v.phase, v.label, v.display)),
                None => lines.push(format!("F{}  {:<22} {:>10}", index, "waiting", "-")),
            }
        }

        if let Some((total, solar)) = self.totals {
            lines.push(format!(
                "Total {:.1} W   Available solar {:.1} W",
                total, solar
            ));
        }

        if !self.appliances.is_empty() {
            lines.push(String::new());
            lines.push("Appliances".to_string());
            for a in &self.appliances {
                lines.push(format!(
                    "  {:<14} {} {:<20} {:<12} {}",
                    a.state.css_class(),
                    a.phase,
                    a.name,
                    a.consumption,
                    a.state.message()
                ));
            }
        }

        if !self.chart.is_empty() {
            lines.push(String::new());
            lines.extend(self.chart.iter().cloned());
        }

        lines.join("\n")
    }
}

impl<W: Write> RenderPort for TerminalRenderer<W> {
    fn render_phase(&mut self, view: &PhaseView) -> Result<(), RenderError> {
        self.phases[view.phase.index()] = Some(view.clone());
        Ok(())
    }

    fn render_totals(
        &mut self,
        total_watts: f64,
        available_solar_watts: f64,
    ) -> Result<(), RenderError> {
        self.totals = Some((total_watts, available_solar_watts));
        Ok(())
    }

    fn render_appliance(&mut self, view: &ApplianceView) -> Result<(), RenderError> {
        match self
            .appliances
            .iter_mut()
            .find(|a| a.name == view.name && a.phase == view.phase)
        {
            Some(existing) => *existing = view.clone(),
            None => self.appliances.push(view.clone()),
        }
        Ok(())
    }

    fn render_chart(&mut self, window: &ChartWindow) -> Result<(), RenderError> {
        self.chart.clear();
        let labels = window.labels();
        let (Some(first), Some(last)) = (labels.first(), labels.last()) else {
            return Ok(());
        };

        let series: Vec<Vec<f64>> = (0..3).map(|i| window.series(i)).collect();
        let lo = series.iter().flatten().copied().fold(f64::INFINITY, f64::min);
        let hi = series.iter().flatten().copied().fold(f64::NEG_INFINITY, f64::max);

        self.chart.push(format!(
            "Chart ({} points, {} .. {})",
            window.len(),
            first,
            last
        ));
        for (index, values) in series.iter().enumerate() {
            self.chart
                .push(format!("  F{} {}", index, sparkline(values, lo, hi)));
        }
        Ok(())
    }

    fn render_connection(&mut self, status: ConnectionStatus) -> Result<(), RenderError> {
        self.status = Some(status);
        Ok(())
    }

    fn present(&mut self) -> Result<(), RenderError> {
        let frame = self.frame();
        if self.clear_screen {
            write!(self.out, "\x1b[2J\x1b[H")?;
        }
        writeln!(self.out, "{}", frame)?;
        self.out.flush()?;
        Ok(())
    }
}

fn sparkline(values: &[f64], lo: f64, hi: f64) -> String {
    let span = hi - lo;
    values
        .iter()
        .map(|v| {
            if span <= 0.0 {
                return SPARK_LEVELS[0];
            }
            let level = ((v - lo) / span * (SPARK_LEVELS.len() - 1) as f64).round() as usize;
            SPARK_LEVELS[level.min(SPARK_LEVELS.len() - 1)]
        })
        .collect()
}
