//! Dashboard client: local phase state, derived views and the render glue.

pub mod appliances;
pub mod chart;
pub mod events;
pub mod phases;
pub mod render;
pub mod socket;

use crate::power::{PowerDelta, PowerSnapshot};
use appliances::{AffordabilityState, Appliance};
use chart::ChartWindow;
use chrono::{DateTime, Local};
use phases::PhaseState;
use render::{ApplianceView, ConnectionStatus, RenderError, RenderPort};
use tracing::{debug, warn};

pub use events::{EventKind, EventRegistry, SocketEvent};

pub struct Dashboard<R: RenderPort> {
    phases: PhaseState,
    chart: ChartWindow,
    appliances: Vec<Appliance>,
    affordability: Vec<AffordabilityState>,
    connection: ConnectionStatus,
    renderer: R,
}

impl<R: RenderPort> Dashboard<R> {
    pub fn new(appliances: Vec<Appliance>, renderer: R) -> Self {
        let affordability = vec![AffordabilityState::NoSolar; appliances.len()];
        Self {
            phases: PhaseState::default(),
            chart: ChartWindow::default(),
            appliances,
            affordability,
            connection: ConnectionStatus::Disconnected,
            renderer,
        }
    }

    /// Merge a snapshot or update frame and redraw every derived view.
    ///
    /// Returns `false` when the frame carried no phase value.
    pub fn apply(&mut self, delta: &PowerDelta, now: DateTime<Local>) -> bool {
        if delta.is_empty() {
            debug!("Ignoring frame without phase values");
            return false;
        }

        for view in self.phases.merge(delta) {
            let result = self.renderer.render_phase(&view);
            skip_on_error("phase", result);
        }

        let result = self
            .renderer
            .render_totals(self.phases.total(), self.phases.total_solar());
        skip_on_error("totals", result);

        let surplus = self.phases.solar_surplus();
        for (appliance, state) in self.appliances.iter().zip(self.affordability.iter_mut()) {
            *state = appliance.affordability(&surplus);
            let view = ApplianceView {
                name: appliance.name.clone(),
                phase: appliance.phase,
                consumption: appliance.consumption_text(),
                state: *state,
            };
            let result = self.renderer.render_appliance(&view);
            skip_on_error("appliance", result);
        }

        self.chart.push(now, self.phases.snapshot().values());
        let result = self.renderer.render_chart(&self.chart);
        skip_on_error("chart", result);

        let result = self.renderer.present();
        skip_on_error("frame", result);
        true
    }

    pub fn set_connection(&mut self, status: ConnectionStatus) {
        self.connection = status;
        let result = self.renderer.render_connection(status);
        skip_on_error("connection status", result);
        let result = self.renderer.present();
        skip_on_error("frame", result);
    }

    /// Route a transport event into the dashboard.
    pub fn handle_event(&mut self, event: &SocketEvent) {
        match event {
            SocketEvent::Data(delta) => {
                self.apply(delta, Local::now());
            }
            SocketEvent::Connected => self.set_connection(ConnectionStatus::Connected),
            SocketEvent::Disconnected => self.set_connection(ConnectionStatus::Disconnected),
            SocketEvent::Reconnecting => self.set_connection(ConnectionStatus::Reconnecting),
            SocketEvent::Error(_) => self.set_connection(ConnectionStatus::Error),
        }
    }

    pub fn snapshot(&self) -> PowerSnapshot {
        self.phases.snapshot()
    }

    pub fn chart(&self) -> &ChartWindow {
        &self.chart
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    /// Current state of every appliance, in catalogue order.
    pub fn affordability(&self) -> impl Iterator<Item = (&Appliance, AffordabilityState)> {
        self.appliances
            .iter()
            .zip(self.affordability.iter().copied())
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }
}

fn skip_on_error(target: &str, result: Result<(), RenderError>) {
    match result {
        Ok(()) => {}
        Err(RenderError::MissingTarget(what)) => {
            debug!("Skipping {} render, target missing: {}", target, what);
        }
        Err(e) => warn!("Failed to render {}: {}", target, e),
    }
}
