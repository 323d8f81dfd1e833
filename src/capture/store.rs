use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;

use crate::capture::codec::{self, CaptureSession};
use crate::capture::events::{CachedKind, IngestEvent, PacketCache};
use crate::capture::filter::filter_packets;
use crate::capture::presenter::{LoadFailure, PacketView, Presenter, Selection};
use crate::capture::scheduler::{Refresh, RefreshScheduler};
use crate::models::config::{AppConfig, DisplayOptions};
use crate::models::packet::{Packet, PacketBody, WirePacket};
use crate::models::stats::TrafficSummary;
use crate::utils::error::AppResult;

/// Session-level lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// Nothing ingested since creation or the last clear
    Idle,
    Capturing,
}

/// Owns the capture session and keeps the presenter up to date.
///
/// All mutations go through `&mut self`, one event at a time. Refreshes
/// caused by live traffic are debounced; loads, clears and synthetic
/// entries refresh immediately.
pub struct CaptureStore<P> {
    session: CaptureSession,
    packet_limit: usize,
    phase: SessionPhase,
    scheduler: RefreshScheduler,
    presenter: P,
}

impl<P: Presenter> CaptureStore<P> {
    pub fn new(config: &AppConfig, presenter: P) -> Self {
        Self {
            session: CaptureSession::new(),
            packet_limit: config.packet_limit,
            phase: SessionPhase::Idle,
            scheduler: RefreshScheduler::new(config.refresh_timeout()),
            presenter,
        }
    }

    /// Dispatch one ingestion event by kind.
    ///
    /// Only send/receive payload errors are returned; load failures are
    /// reported through the presenter.
    pub fn handle_event(&mut self, event: IngestEvent) -> AppResult<()> {
        debug!("Ingesting {} ({} bytes)", event.name(), event.data().len());

        match event {
            IngestEvent::InitOptions(data) => self.on_options_changed(&data),
            IngestEvent::InitPacketList(data) => self.on_initial_cache(&data),
            IngestEvent::SendPacket(data) => self.on_send(&data),
            IngestEvent::ReceivePacket(data) => self.on_receive(&data),
            IngestEvent::LoadedPacketListFile(data) => {
                self.on_file_loaded(&data);
                Ok(())
            }
        }
    }

    /// Update the display toggles. The buffer is left alone.
    pub fn on_options_changed(&mut self, data: &str) -> AppResult<()> {
        let options: DisplayOptions = serde_json::from_str(data)?;
        self.phase = SessionPhase::Capturing;
        info!(
            "Display options: inline details {}, packet cache {}",
            options.show_inline_details, options.packet_cache_enabled
        );
        self.presenter.apply_options(options);
        Ok(())
    }

    /// Import the transport's packet cache when attaching to a running capture
    pub fn on_initial_cache(&mut self, data: &str) -> AppResult<()> {
        let cache: PacketCache = serde_json::from_str(data)?;
        self.phase = SessionPhase::Capturing;

        self.session
            .buffer
            .set_removed_packets(cache.removed_packets.unwrap_or(0));

        let packets = match cache.packets {
            Some(packets) if !packets.is_empty() => packets,
            _ => return Ok(()),
        };

        info!("Importing {} cached packets", packets.len());
        for cached in packets {
            let size = serde_json::to_string(&cached.packet)?.len();
            let wire = WirePacket::new(cached.packet, size);
            let body = match cached.kind {
                CachedKind::Send => PacketBody::Send(wire),
                CachedKind::Receive => PacketBody::Receive(wire),
            };
            self.append_packet(cached.time, body, false);
        }

        self.append_summary();
        Ok(())
    }

    pub fn on_send(&mut self, raw: &str) -> AppResult<()> {
        let packet: Value = serde_json::from_str(raw)?;
        let body = PacketBody::Send(WirePacket::new(packet, raw.len()));
        self.append_packet(Utc::now(), body, false);
        Ok(())
    }

    pub fn on_receive(&mut self, raw: &str) -> AppResult<()> {
        let packet: Value = serde_json::from_str(raw)?;
        let body = PacketBody::Receive(WirePacket::new(packet, raw.len()));
        self.append_packet(Utc::now(), body, false);
        Ok(())
    }

    /// Replace the session with a dump file's contents.
    ///
    /// On failure the current session stays as it was and the error is
    /// handed to the presenter.
    pub fn on_file_loaded(&mut self, text: &str) {
        match codec::decode(text) {
            Ok(session) => {
                info!(
                    "Loaded {} packets from file ({} removed)",
                    session.buffer.len(),
                    session.buffer.removed_packets()
                );
                self.session = session;
                self.phase = SessionPhase::Capturing;
                self.request_refresh(true);
            }
            Err(e) => {
                warn!("Failed to load packets from file: {}", e);
                self.presenter.report_error(LoadFailure::new(e));
            }
        }
    }

    /// Drop everything and start over with id 1
    pub fn clear(&mut self) {
        info!("Clearing capture session");
        self.session = CaptureSession::new();
        self.phase = SessionPhase::Idle;
        self.request_refresh(true);
    }

    /// Insert a free-form note into the list
    pub fn append_message(&mut self, message: impl Into<Value>) {
        let body = PacketBody::Message {
            message: message.into(),
        };
        self.append_packet(Utc::now(), body, true);
    }

    /// Insert a snapshot of the traffic totals into the list
    pub fn append_summary(&mut self) {
        let snapshot = self.session.summary;
        self.append_packet(Utc::now(), PacketBody::Summary(snapshot), true);
    }

    /// Change the capacity limit; takes effect on the next append
    pub fn set_packet_limit(&mut self, limit: usize) {
        info!("Packet limit set to {}", limit);
        self.packet_limit = limit;
    }

    /// Filter the buffer and push the result to the presenter
    pub fn compute_view(&mut self) {
        let packets: Vec<Packet> = filter_packets(self.session.buffer.packets())
            .into_iter()
            .cloned()
            .collect();

        let selection = match packets.first() {
            None => Selection::Clear,
            Some(first) if self.presenter.selected_packet().is_none() => Selection::Select(first.id),
            Some(_) => Selection::Keep,
        };

        debug!(
            "Refreshing view: {} of {} packets visible",
            packets.len(),
            self.session.buffer.len()
        );

        self.presenter.show_view(PacketView {
            packets,
            removed_packets: self.session.buffer.removed_packets(),
            selection,
        });
    }

    /// Run the deferred refresh if its window has passed.
    /// Returns whether a refresh happened.
    pub fn flush_due(&mut self) -> bool {
        if self.scheduler.fire_if_due() {
            self.compute_view();
            return true;
        }
        false
    }

    /// When the pending deferred refresh is due, if any
    pub fn refresh_deadline(&self) -> Option<Instant> {
        self.scheduler.deadline()
    }

    pub fn encode_session(&self) -> AppResult<String> {
        codec::encode(&self.session)
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn summary(&self) -> TrafficSummary {
        self.session.summary
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn packet_limit(&self) -> usize {
        self.packet_limit
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    fn append_packet(&mut self, time: chrono::DateTime<Utc>, body: PacketBody, immediate: bool) {
        self.phase = SessionPhase::Capturing;

        let kind = body.kind();
        let mut summary = self.session.summary;
        summary.record(&body);

        match self.session.buffer.append(time, body, self.packet_limit) {
            Some(id) => {
                self.session.summary = summary;
                debug!("Appended {} packet {}", kind, id);
                self.request_refresh(immediate);
            }
            None => warn!("Dropped {} packet, no ids left", kind),
        }
    }

    fn request_refresh(&mut self, immediate: bool) {
        match self.scheduler.request_refresh(immediate) {
            Refresh::Now => self.compute_view(),
            Refresh::Deferred(_) => {}
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::advance;

    /// Presenter that records every push
    #[derive(Default)]
    pub(crate) struct RecordingPresenter {
        pub selected: Option<u64>,
        pub views: Vec<PacketView>,
        pub options: Vec<DisplayOptions>,
        pub errors: Vec<LoadFailure>,
    }

    impl Presenter for RecordingPresenter {
        fn selected_packet(&self) -> Option<u64> {
            self.selected
        }

        fn show_view(&mut self, view: PacketView) {
            match view.selection {
                Selection::Keep => {}
                Selection::Select(id) => self.selected = Some(id),
                Selection::Clear => self.selected = None,
            }
            self.views.push(view);
        }

        fn apply_options(&mut self, options: DisplayOptions) {
            self.options.push(options);
        }

        fn report_error(&mut self, error: LoadFailure) {
            self.errors.push(error);
        }
    }

    fn store_with_limit(limit: usize) -> CaptureStore<RecordingPresenter> {
        let config = AppConfig {
            packet_limit: limit,
            ..Default::default()
        };
        CaptureStore::new(&config, RecordingPresenter::default())
    }

    fn buffer_ids(store: &CaptureStore<RecordingPresenter>) -> Vec<u64> {
        store.session().buffer.packets().iter().map(|p| p.id).collect()
    }

    fn last_view(store: &CaptureStore<RecordingPresenter>) -> &PacketView {
        store.presenter().views.last().expect("a view was pushed")
    }

    #[test]
    fn test_send_and_receive_update_buffer_and_totals() {
        let mut store = store_with_limit(10);
        let sent = r#"{"to":"root","type":"listTabs"}"#;
        let received = r#"{"from":"root","tabs":[]}"#;

        store.on_send(sent).unwrap();
        store.on_receive(received).unwrap();

        assert_eq!(buffer_ids(&store), vec![1, 2]);
        let summary = store.summary();
        assert_eq!(summary.data.sent, sent.len() as u64);
        assert_eq!(summary.data.received, received.len() as u64);
        assert_eq!(summary.packets.sent, 1);
        assert_eq!(summary.packets.received, 1);
        assert_eq!(store.phase(), SessionPhase::Capturing);
    }

    #[test]
    fn test_invalid_send_payload_records_nothing() {
        let mut store = store_with_limit(10);

        assert!(store.on_send("{to: root").is_err());
        assert!(store
            .handle_event(IngestEvent::ReceivePacket("nope".to_string()))
            .is_err());

        assert!(store.session().buffer.is_empty());
        assert_eq!(store.summary(), TrafficSummary::default());
        assert_eq!(store.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_capacity_evicts_and_totals_survive() {
        let mut store = store_with_limit(2);
        for _ in 0..3 {
            store.on_send(r#"{"to":"root"}"#).unwrap();
        }

        assert_eq!(buffer_ids(&store), vec![2, 3]);
        assert_eq!(store.session().buffer.removed_packets(), 1);
        assert_eq!(store.summary().packets.sent, 3);
    }

    #[test]
    fn test_limit_change_applies_on_next_append() {
        let mut store = store_with_limit(10);
        for _ in 0..4 {
            store.on_send(r#"{"to":"root"}"#).unwrap();
        }

        store.set_packet_limit(1);
        assert_eq!(store.session().buffer.len(), 4);

        store.append_message("limit lowered");
        assert_eq!(buffer_ids(&store), vec![5]);
        assert_eq!(store.session().buffer.removed_packets(), 4);
    }

    #[test]
    fn test_clear_resets_session_and_restarts_ids() {
        let mut store = store_with_limit(10);
        store.on_send(r#"{"to":"root"}"#).unwrap();
        store.on_send(r#"{"to":"root"}"#).unwrap();

        store.clear();
        assert!(store.session().buffer.is_empty());
        assert_eq!(store.session().buffer.unique_id(), 0);
        assert_eq!(store.summary(), TrafficSummary::default());
        assert_eq!(store.phase(), SessionPhase::Idle);
        assert_eq!(last_view(&store).selection, Selection::Clear);

        store.on_receive(r#"{"from":"root"}"#).unwrap();
        assert_eq!(buffer_ids(&store), vec![1]);
    }

    #[test]
    fn test_synthetic_entries_refresh_immediately() {
        let mut store = store_with_limit(10);
        store.on_send(r#"{"to":"root"}"#).unwrap();
        assert!(store.presenter().views.is_empty());

        store.append_summary();
        let view = last_view(&store);
        assert_eq!(view.packets.len(), 2);
        match &view.packets[1].body {
            PacketBody::Summary(snapshot) => assert_eq!(snapshot.packets.sent, 1),
            other => panic!("expected summary, got {:?}", other),
        }

        store.append_message(json!({"note": "hello"}));
        assert_eq!(store.presenter().views.len(), 2);
        assert!(store.refresh_deadline().is_none());
    }

    #[test]
    fn test_view_hides_registration_handshake() {
        let mut store = store_with_limit(10);
        store
            .on_send(r#"{"to":"A","type":"registerActor","rdpInspectorInternals":true}"#)
            .unwrap();
        store.on_receive(r#"{"from":"A"}"#).unwrap();
        store.on_receive(r#"{"from":"A","type":"tabNavigated"}"#).unwrap();

        store.compute_view();

        let view = last_view(&store);
        assert_eq!(view.packets.iter().map(|p| p.id).collect::<Vec<_>>(), vec![3]);
        assert_eq!(store.session().buffer.len(), 3);
    }

    #[test]
    fn test_default_selection_rules() {
        let mut store = store_with_limit(10);
        store.on_send(r#"{"to":"root"}"#).unwrap();
        store.on_send(r#"{"to":"tab1"}"#).unwrap();

        store.compute_view();
        assert_eq!(last_view(&store).selection, Selection::Select(1));

        store.presenter_mut().selected = Some(2);
        store.compute_view();
        assert_eq!(last_view(&store).selection, Selection::Keep);
        assert_eq!(store.presenter().selected, Some(2));

        store.clear();
        assert_eq!(last_view(&store).selection, Selection::Clear);
        assert_eq!(store.presenter().selected, None);
    }

    #[test]
    fn test_options_are_forwarded_without_touching_buffer() {
        let mut store = store_with_limit(10);
        store
            .handle_event(IngestEvent::InitOptions(
                r#"{"showInlineDetails":true,"packetCacheEnabled":false}"#.to_string(),
            ))
            .unwrap();

        assert_eq!(
            store.presenter().options,
            vec![DisplayOptions {
                show_inline_details: true,
                packet_cache_enabled: false,
            }]
        );
        assert!(store.session().buffer.is_empty());
        assert!(store.presenter().views.is_empty());
        assert_eq!(store.phase(), SessionPhase::Capturing);
    }

    #[test]
    fn test_rejected_options_leave_session_idle() {
        let mut store = store_with_limit(10);
        assert!(store
            .handle_event(IngestEvent::InitOptions("{oops".to_string()))
            .is_err());
        assert_eq!(store.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_initial_cache_replays_packets_and_appends_summary() {
        let mut store = store_with_limit(2);
        let cache = json!({
            "packets": [
                {"type": "send", "packet": {"to": "root"}, "time": 1_433_868_530_000_i64},
                {"type": "receive", "packet": {"from": "root"}, "time": 1_433_868_530_100_i64},
                {"type": "send", "packet": {"to": "tab1"}, "time": "2015-06-09T16:48:50.200Z"}
            ],
            "removedPackets": 5
        });

        store.on_initial_cache(&cache.to_string()).unwrap();

        // three replayed packets plus the summary, capped at two
        assert_eq!(buffer_ids(&store), vec![3, 4]);
        assert_eq!(store.session().buffer.removed_packets(), 5 + 2);
        let summary = store.summary();
        assert_eq!(summary.packets.sent, 2);
        assert_eq!(summary.packets.received, 1);
        let root_size = r#"{"to":"root"}"#.len() as u64;
        let tab_size = r#"{"to":"tab1"}"#.len() as u64;
        assert_eq!(summary.data.sent, root_size + tab_size);

        let view = last_view(&store);
        assert!(matches!(view.packets[1].body, PacketBody::Summary(_)));
    }

    #[test]
    fn test_empty_initial_cache_only_sets_removed_count() {
        let mut store = store_with_limit(10);
        store
            .on_initial_cache(r#"{"packets":[],"removedPackets":3}"#)
            .unwrap();

        assert!(store.session().buffer.is_empty());
        assert_eq!(store.session().buffer.removed_packets(), 3);
        assert!(store.presenter().views.is_empty());
        assert_eq!(store.phase(), SessionPhase::Capturing);
    }

    #[test]
    fn test_file_load_replaces_session() {
        let mut source = store_with_limit(10);
        source.on_send(r#"{"to":"root"}"#).unwrap();
        source.on_receive(r#"{"from":"root"}"#).unwrap();
        source.append_message("saved");
        let dump = source.encode_session().unwrap();

        let mut store = store_with_limit(10);
        store.on_send(r#"{"to":"other"}"#).unwrap();
        store.on_file_loaded(&dump);

        assert_eq!(store.session(), source.session());
        assert_eq!(store.phase(), SessionPhase::Capturing);
        assert_eq!(last_view(&store).packets.len(), 3);
        assert!(store.refresh_deadline().is_none());

        // ids continue after the restored counter
        store.on_send(r#"{"to":"root"}"#).unwrap();
        assert_eq!(buffer_ids(&store), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_file_load_with_exhausted_counter_drops_new_packets() {
        let mut store = store_with_limit(10);
        let dump = json!({
            "!format!": codec::DUMP_FORMAT_VERSION,
            "packets": [{"type": "message", "message": "end", "time": 0, "id": u64::MAX}],
            "summary": {"data": {"sent": 0, "received": 0}, "packets": {"sent": 0, "received": 0}},
            "uniqueId": u64::MAX,
            "removedPackets": 0
        });
        store.on_file_loaded(&dump.to_string());
        assert!(store.presenter().errors.is_empty());

        store.on_send(r#"{"to":"root"}"#).unwrap();

        assert_eq!(buffer_ids(&store), vec![u64::MAX]);
        assert_eq!(store.summary(), TrafficSummary::default());
        assert!(store.refresh_deadline().is_none());
    }

    #[test]
    fn test_file_load_rejects_ids_ahead_of_counter() {
        let mut store = store_with_limit(10);
        store.on_send(r#"{"to":"root"}"#).unwrap();
        let dump = json!({
            "!format!": codec::DUMP_FORMAT_VERSION,
            "packets": [{"type": "send", "packet": {"to": "root"}, "size": 13, "time": 0, "id": 5}],
            "summary": {"data": {"sent": 13, "received": 0}, "packets": {"sent": 1, "received": 0}},
            "uniqueId": 0,
            "removedPackets": 0
        });

        store.on_file_loaded(&dump.to_string());
        store.on_send(r#"{"to":"root"}"#).unwrap();

        assert_eq!(store.presenter().errors.len(), 1);
        assert_eq!(buffer_ids(&store), vec![1, 2]);
    }

    #[test]
    fn test_failed_file_load_keeps_state_and_reports_error() {
        let mut store = store_with_limit(10);
        store.on_send(r#"{"to":"root"}"#).unwrap();
        let before = store.session().clone();

        store.on_file_loaded(r#"{"!format!":"wrong"}"#);
        store.on_file_loaded("not json at all");

        assert_eq!(store.session(), &before);
        let errors = &store.presenter().errors;
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "Error loading packets from file");
        assert!(errors[0].details.contains("wrong"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_sends_produces_one_refresh() {
        let mut store = store_with_limit(10);

        for _ in 0..3 {
            store
                .handle_event(IngestEvent::SendPacket(r#"{"to":"root"}"#.to_string()))
                .unwrap();
            advance(Duration::from_millis(50)).await;
            assert!(!store.flush_due());
        }
        assert!(store.presenter().views.is_empty());

        advance(Duration::from_millis(150)).await;
        assert!(store.flush_due());
        assert!(!store.flush_due());

        assert_eq!(store.presenter().views.len(), 1);
        assert_eq!(last_view(&store).packets.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_refresh_cancels_pending_one() {
        let mut store = store_with_limit(10);
        store.on_send(r#"{"to":"root"}"#).unwrap();
        assert!(store.refresh_deadline().is_some());

        store.clear();
        assert!(store.refresh_deadline().is_none());

        advance(Duration::from_secs(1)).await;
        assert!(!store.flush_due());
        assert_eq!(store.presenter().views.len(), 1);
    }
}
