use log::debug;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::models::config::DisplayOptions;
use crate::models::packet::Packet;

/// Message shown when a dump file cannot be loaded
pub const LOAD_ERROR_MESSAGE: &str = "Error loading packets from file";

/// How a refresh changes the current selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "id", rename_all = "lowercase")]
pub enum Selection {
    /// Leave the current selection alone
    Keep,
    /// Select the packet with this id
    Select(u64),
    /// Nothing is selected
    Clear,
}

/// The visible part of the capture, as pushed after each refresh
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketView {
    pub packets: Vec<Packet>,
    pub removed_packets: u64,
    pub selection: Selection,
}

/// A non-fatal error shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadFailure {
    pub message: String,
    pub details: String,
}

impl LoadFailure {
    pub fn new(details: impl ToString) -> Self {
        Self {
            message: LOAD_ERROR_MESSAGE.to_string(),
            details: details.to_string(),
        }
    }
}

/// The presentation layer as seen by the capture store.
///
/// The store only ever reads the current selection; everything else flows
/// from the store to the presenter.
pub trait Presenter {
    /// Id of the currently selected packet
    fn selected_packet(&self) -> Option<u64>;

    fn show_view(&mut self, view: PacketView);

    fn apply_options(&mut self, options: DisplayOptions);

    fn report_error(&mut self, error: LoadFailure);
}

/// Updates broadcast to subscribers of a [`SharedPresenter`]
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PresenterUpdate {
    View(PacketView),
    Options { options: DisplayOptions },
    Error { error: LoadFailure },
}

/// Latest state held by a [`SharedPresenter`]
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationState {
    pub packets: Vec<Packet>,
    pub removed_packets: u64,
    pub selected_packet: Option<u64>,
    pub options: DisplayOptions,
    pub error: Option<LoadFailure>,
}

/// Presenter shared between the capture service and the API layer
#[derive(Clone)]
pub struct SharedPresenter {
    state: Arc<RwLock<PresentationState>>,
    updates: broadcast::Sender<PresenterUpdate>,
}

impl SharedPresenter {
    pub fn new(options: DisplayOptions) -> Self {
        let (updates, _) = broadcast::channel(64);
        let state = PresentationState {
            options,
            ..Default::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
            updates,
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> PresentationState {
        self.state.read().clone()
    }

    /// Set or clear the selection from the UI side
    pub fn select(&self, id: Option<u64>) {
        self.state.write().selected_packet = id;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PresenterUpdate> {
        self.updates.subscribe()
    }

    fn publish(&self, update: PresenterUpdate) {
        // No subscribers is fine; the state above is the source of truth
        if self.updates.send(update).is_err() {
            debug!("No presenter subscribers");
        }
    }
}

impl Presenter for SharedPresenter {
    fn selected_packet(&self) -> Option<u64> {
        self.state.read().selected_packet
    }

    fn show_view(&mut self, view: PacketView) {
        {
            let mut state = self.state.write();
            state.packets = view.packets.clone();
            state.removed_packets = view.removed_packets;
            state.error = None;
            match view.selection {
                Selection::Keep => {}
                Selection::Select(id) => state.selected_packet = Some(id),
                Selection::Clear => state.selected_packet = None,
            }
        }
        self.publish(PresenterUpdate::View(view));
    }

    fn apply_options(&mut self, options: DisplayOptions) {
        self.state.write().options = options;
        self.publish(PresenterUpdate::Options { options });
    }

    fn report_error(&mut self, error: LoadFailure) {
        self.state.write().error = Some(error.clone());
        self.publish(PresenterUpdate::Error { error });
    }
}
