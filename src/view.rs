use crate::store::{RecordStore, StoreError, StoredRecord};
use crate::validate::FieldIssue;
use serde::Serialize;

/// Whether a view is still waiting on its first fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewPhase {
    Loading,
    List,
}

/// What sits on top of the list: the audits view swaps to a full form, the
/// access and spare-parts views overlay a modal without leaving the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Overlay {
    None,
    Form(Option<String>),
    Modal(Option<String>),
}

#[derive(Debug)]
pub struct ViewState {
    pub phase: ViewPhase,
    pub overlay: Overlay,
}

impl ViewState {
    pub fn new() -> ViewState {
        ViewState {
            phase: ViewPhase::Loading,
            overlay: Overlay::None,
        }
    }

    pub fn finish_load(&mut self) {
        self.phase = ViewPhase::List;
    }

    pub fn open_form(&mut self, record_id: Option<String>) {
        if self.phase == ViewPhase::List {
            self.overlay = Overlay::Form(record_id);
        }
    }

    pub fn open_modal(&mut self, record_id: Option<String>) {
        if self.phase == ViewPhase::List {
            self.overlay = Overlay::Modal(record_id);
        }
    }

    /// Save-success and cancel both land here; the caller re-fetches.
    pub fn close_overlay(&mut self) {
        self.overlay = Overlay::None;
    }
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState::new()
    }
}

/// Injected confirmation capability; destructive flows never call a global
/// dialog directly.
pub trait ConfirmDialog {
    fn confirm(&self, message: &str) -> bool;
}

/// Result of a form submit after synchronous validation.
#[derive(Debug)]
pub enum SaveOutcome<R> {
    /// Field issues; no store call was made.
    Invalid(Vec<FieldIssue>),
    /// The write landed and the source list was re-fetched.
    Saved { record: R, refreshed: Vec<R> },
}

/// Insert-or-update on the record's id, then re-fetch the whole collection.
/// Validation issues short-circuit before any store round trip.
pub fn submit_record<R, S>(
    store: &mut S,
    record: R,
    issues: Vec<FieldIssue>,
) -> Result<SaveOutcome<R>, StoreError>
where
    R: StoredRecord,
    S: RecordStore<R>,
{
    if !issues.is_empty() {
        return Ok(SaveOutcome::Invalid(issues));
    }
    let saved = if record.record_id().is_empty() {
        store.insert(record)?
    } else {
        let id = record.record_id().to_string();
        store.update(id.as_str(), record)?
    };
    let refreshed = store.list()?;
    Ok(SaveOutcome::Saved {
        record: saved,
        refreshed,
    })
}

/// Confirm-gated delete: declined means zero store calls, confirmed means
/// exactly one delete followed by one re-fetch.
pub fn delete_with_confirm<R, S>(
    dialog: &dyn ConfirmDialog,
    store: &mut S,
    id: &str,
    message: &str,
) -> Result<Option<Vec<R>>, StoreError>
where
    R: StoredRecord,
    S: RecordStore<R>,
{
    if !dialog.confirm(message) {
        return Ok(None);
    }
    store.delete(id)?;
    Ok(Some(store.list()?))
}

/// Request sequencing for list fetches: every fetch takes a ticket, and only
/// the newest ticket may publish its response. Stale responses are dropped
/// instead of overwriting the source list out of order.
#[derive(Debug, Default)]
pub struct FetchGate {
    latest: u64,
}

impl FetchGate {
    pub fn new() -> FetchGate {
        FetchGate::default()
    }

    pub fn begin(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    pub fn accept(&self, ticket: u64) -> bool {
        ticket == self.latest
    }
}

/// Side effects of the external-launch flow, injected so the flow is testable
/// without a desktop environment.
pub trait LaunchPort {
    fn copy_to_clipboard(&mut self, text: &str);
    fn open_url(&mut self, url: &str);
}

/// Opens a URL in an external browser. The legacy-compatibility path first
/// asks for confirmation, copies the URL, and only then hands off to the
/// launcher; declining does nothing. Returns whether a launch happened.
pub fn launch_external(
    dialog: &dyn ConfirmDialog,
    port: &mut dyn LaunchPort,
    url: &str,
    legacy_profile: bool,
) -> bool {
    if !legacy_profile {
        port.open_url(url);
        return true;
    }
    let message = format!("Copy {url} and open it in the external browser profile?");
    if !dialog.confirm(message.as_str()) {
        return false;
    }
    port.copy_to_clipboard(url);
    port.open_url(url);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SparePartRecord;
    use crate::store::testing::MemStore;
    use crate::validate::validate_part;

    struct Always(bool);

    impl ConfirmDialog for Always {
        fn confirm(&self, _message: &str) -> bool {
            self.0
        }
    }

    fn part(id: &str, name: &str) -> SparePartRecord {
        SparePartRecord {
            id: id.to_string(),
            name: name.to_string(),
            part_number: format!("PN-{id}"),
            ..SparePartRecord::default()
        }
    }

    #[test]
    fn declined_delete_makes_no_store_calls() {
        let mut store = MemStore::with(vec![part("p1", "Filtro")]);
        let result =
            delete_with_confirm::<SparePartRecord, _>(&Always(false), &mut store, "p1", "Delete?")
                .unwrap();
        assert!(result.is_none());
        assert_eq!(store.delete_calls, 0);
        assert_eq!(store.list_calls, 0);
        assert_eq!(store.records.len(), 1);
    }

    #[test]
    fn confirmed_delete_is_one_delete_then_one_refetch() {
        let mut store = MemStore::with(vec![part("p1", "Filtro"), part("p2", "Correa")]);
        let result =
            delete_with_confirm::<SparePartRecord, _>(&Always(true), &mut store, "p1", "Delete?")
                .unwrap();
        let refreshed = result.expect("confirmed delete returns the refreshed list");
        assert_eq!(store.delete_calls, 1);
        assert_eq!(store.list_calls, 1);
        assert_eq!(refreshed.len(), 1);
        assert_eq!(refreshed[0].id, "p2");
    }

    #[test]
    fn invalid_submit_never_reaches_the_store() {
        let mut store = MemStore::with(Vec::new());
        let record = SparePartRecord {
            name: "Filtro".to_string(),
            part_number: "F-1".to_string(),
            quantity: -1,
            ..SparePartRecord::default()
        };
        let issues = validate_part(&record);
        let outcome = submit_record(&mut store, record, issues).unwrap();
        assert!(matches!(outcome, SaveOutcome::Invalid(_)));
        assert_eq!(store.insert_calls, 0);
        assert_eq!(store.update_calls, 0);
    }

    #[test]
    fn valid_submit_inserts_then_refetches() {
        let mut store = MemStore::with(Vec::new());
        let record = part("", "Filtro");
        let issues = validate_part(&record);
        let outcome = submit_record(&mut store, record, issues).unwrap();
        match outcome {
            SaveOutcome::Saved { record, refreshed } => {
                assert!(!record.id.is_empty());
                assert_eq!(refreshed.len(), 1);
            }
            other => panic!("expected Saved, got {other:?}"),
        }
        assert_eq!(store.insert_calls, 1);
        assert_eq!(store.list_calls, 1);
    }

    #[test]
    fn existing_id_routes_to_update() {
        let mut store = MemStore::with(vec![part("p1", "Filtro")]);
        let mut edited = part("p1", "Filtro de aceite");
        edited.quantity = 9;
        let outcome = submit_record(&mut store, edited, Vec::new()).unwrap();
        assert!(matches!(outcome, SaveOutcome::Saved { .. }));
        assert_eq!(store.update_calls, 1);
        assert_eq!(store.insert_calls, 0);
        assert_eq!(store.records[0].quantity, 9);
    }

    #[test]
    fn view_transitions_follow_mount_then_overlay_cycle() {
        let mut view = ViewState::new();
        assert_eq!(view.phase, ViewPhase::Loading);
        // Overlays cannot open while loading.
        view.open_modal(Some("p1".to_string()));
        assert_eq!(view.overlay, Overlay::None);

        view.finish_load();
        view.open_modal(Some("p1".to_string()));
        assert_eq!(view.overlay, Overlay::Modal(Some("p1".to_string())));
        view.close_overlay();
        assert_eq!(view.overlay, Overlay::None);

        view.open_form(None);
        assert_eq!(view.overlay, Overlay::Form(None));
    }

    #[test]
    fn stale_fetch_responses_are_dropped() {
        let mut gate = FetchGate::new();
        let first = gate.begin();
        let second = gate.begin();
        // The slower first response arrives after the second fetch started.
        assert!(!gate.accept(first));
        assert!(gate.accept(second));
    }

    struct RecordingPort {
        copied: Vec<String>,
        opened: Vec<String>,
    }

    impl LaunchPort for RecordingPort {
        fn copy_to_clipboard(&mut self, text: &str) {
            self.copied.push(text.to_string());
        }
        fn open_url(&mut self, url: &str) {
            self.opened.push(url.to_string());
        }
    }

    #[test]
    fn direct_launch_skips_clipboard_and_dialog() {
        let mut port = RecordingPort {
            copied: Vec::new(),
            opened: Vec::new(),
        };
        assert!(launch_external(
            &Always(false),
            &mut port,
            "https://mtc.example.com",
            false,
        ));
        assert!(port.copied.is_empty());
        assert_eq!(port.opened, vec!["https://mtc.example.com".to_string()]);
    }

    #[test]
    fn legacy_launch_copies_after_confirmation_only() {
        let mut port = RecordingPort {
            copied: Vec::new(),
            opened: Vec::new(),
        };
        assert!(!launch_external(
            &Always(false),
            &mut port,
            "https://mtc.example.com",
            true,
        ));
        assert!(port.copied.is_empty());
        assert!(port.opened.is_empty());

        assert!(launch_external(
            &Always(true),
            &mut port,
            "https://mtc.example.com",
            true,
        ));
        assert_eq!(port.copied.len(), 1);
        assert_eq!(port.opened.len(), 1);
    }
}
