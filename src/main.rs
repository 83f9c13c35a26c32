#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod crypto;
mod export;
mod models;
mod pipeline;
mod stats;
mod store;
mod validate;
mod view;

use models::{score_tier, AccessRecord, AuditRecord, SparePartRecord};
use pipeline::{run_table_query, TableQuery};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use store::{now_string, FileStore, RecordStore, StoreError};
use tauri::{AppHandle, Manager, Window};
use tauri_plugin_clipboard_manager::ClipboardExt;
use tauri_plugin_opener::OpenerExt;
use validate::{
    check_name_available, validate_access, validate_audit, validate_part, DebounceGate,
    FieldStatus,
};
use view::{
    delete_with_confirm, launch_external, submit_record, ConfirmDialog, LaunchPort, SaveOutcome,
};

const APP_DIR: &str = "FacilityDesk";

#[derive(Deserialize)]
struct AuthSetupRequest {
    password: String,
    iterations: Option<u32>,
}

#[derive(Deserialize)]
struct AuthVerifyRequest {
    password: String,
}

#[derive(Deserialize)]
struct AuthChangeRequest {
    current: String,
    next: String,
    iterations: Option<u32>,
}

#[derive(Deserialize)]
struct ClipboardWriteRequest {
    text: String,
}

#[derive(Deserialize)]
struct OpenExternalRequest {
    url: String,
}

#[derive(Deserialize)]
struct OpenExternalLegacyRequest {
    url: String,
    #[serde(default)]
    confirmed: bool,
}

#[derive(Deserialize)]
struct ListRequest {
    password: String,
}

#[derive(Deserialize)]
struct AuditSaveRequest {
    password: String,
    record: AuditRecord,
}

#[derive(Deserialize)]
struct AccessSaveRequest {
    password: String,
    record: AccessRecord,
}

#[derive(Deserialize)]
struct PartSaveRequest {
    password: String,
    record: SparePartRecord,
}

#[derive(Deserialize)]
struct DeleteRequest {
    password: String,
    id: String,
    #[serde(default)]
    confirmed: bool,
}

#[derive(Deserialize)]
struct TableRequest {
    password: String,
    #[serde(flatten)]
    query: TableQuery,
}

#[derive(Deserialize)]
struct AccessCheckNameRequest {
    password: String,
    name: String,
    #[serde(default)]
    exclude_id: Option<String>,
}

#[derive(Deserialize)]
struct ExportCsvRequest {
    filename: String,
    columns: serde_json::Value,
    rows: serde_json::Value,
}

#[derive(Serialize)]
struct SaveCsvResult {
    ok: bool,
    canceled: bool,
    filename: String,
    path: Option<String>,
    error: Option<String>,
}

#[derive(Serialize)]
struct StorageInfoResult {
    ok: bool,
    path_label: String,
}

/// The frontend already asked the user; the flow still goes through the
/// injected confirmation seam.
struct PreconfirmedDialog(bool);

impl ConfirmDialog for PreconfirmedDialog {
    fn confirm(&self, _message: &str) -> bool {
        self.0
    }
}

struct AppLaunchPort<'a> {
    app: &'a AppHandle,
    error: Option<String>,
}

impl LaunchPort for AppLaunchPort<'_> {
    fn copy_to_clipboard(&mut self, text: &str) {
        if let Err(err) = self.app.clipboard().write_text(text.to_string()) {
            self.error = Some(err.to_string());
        }
    }

    fn open_url(&mut self, url: &str) {
        if let Err(err) = self
            .app
            .opener()
            .open_url(url.to_string(), Option::<String>::None)
        {
            self.error = Some(err.to_string());
        }
    }
}

fn storage_root(app: &AppHandle) -> Result<PathBuf, String> {
    static RESOLVED_ROOT: OnceLock<PathBuf> = OnceLock::new();
    if let Some(root) = RESOLVED_ROOT.get() {
        return Ok(root.clone());
    }
    let base = app.path().app_data_dir().map_err(|err| err.to_string())?;
    let root = base.join(APP_DIR);
    fs::create_dir_all(root.as_path()).map_err(|err| err.to_string())?;
    let _ = RESOLVED_ROOT.set(root.clone());
    Ok(root)
}

fn open_store(app: &AppHandle, password: &str) -> Result<FileStore, String> {
    let root = storage_root(app)?;
    Ok(FileStore::new(root.as_path(), password))
}

fn failure(err: &StoreError) -> serde_json::Value {
    tracing::warn!(code = err.code(), "store call failed: {err}");
    json!({ "ok": false, "code": err.code(), "error": err.to_string() })
}

fn check_gate() -> &'static Mutex<DebounceGate> {
    static GATE: OnceLock<Mutex<DebounceGate>> = OnceLock::new();
    GATE.get_or_init(|| Mutex::new(DebounceGate::new()))
}

#[tauri::command]
fn app_version(app: AppHandle) -> String {
    app.package_info().version.to_string()
}

#[tauri::command]
fn platform_name() -> String {
    match std::env::consts::OS {
        "windows" => "win32",
        "macos" => "darwin",
        "android" => "android",
        _ => "linux",
    }
    .to_string()
}

#[tauri::command]
fn storage_info(app: AppHandle) -> Result<StorageInfoResult, String> {
    let root = storage_root(&app)?;
    Ok(StorageInfoResult {
        ok: true,
        path_label: root.to_string_lossy().to_string(),
    })
}

#[tauri::command]
fn auth_read(app: AppHandle) -> Result<Option<crypto::AuthRecord>, String> {
    let root = storage_root(&app)?;
    crypto::read_auth_record(root.as_path())
}

#[tauri::command]
fn auth_setup(app: AppHandle, payload: AuthSetupRequest) -> Result<crypto::AuthRecord, String> {
    let root = storage_root(&app)?;
    crypto::setup_auth(root.as_path(), payload.password.as_str(), payload.iterations)
}

#[tauri::command]
fn auth_verify(app: AppHandle, payload: AuthVerifyRequest) -> Result<bool, String> {
    let root = storage_root(&app)?;
    crypto::verify_auth(root.as_path(), payload.password.as_str())
}

#[tauri::command]
fn auth_change(app: AppHandle, payload: AuthChangeRequest) -> Result<bool, String> {
    let root = storage_root(&app)?;
    crypto::change_auth(
        root.as_path(),
        payload.current.as_str(),
        payload.next.as_str(),
        payload.iterations,
    )
}

#[tauri::command]
fn clipboard_write(app: AppHandle, payload: ClipboardWriteRequest) -> Result<bool, String> {
    app.clipboard()
        .write_text(payload.text)
        .map_err(|err| err.to_string())?;
    Ok(true)
}

#[tauri::command]
fn open_external(app: AppHandle, payload: OpenExternalRequest) -> Result<bool, String> {
    app.opener()
        .open_url(payload.url, Option::<String>::None)
        .map_err(|err| err.to_string())?;
    Ok(true)
}

/// Legacy-profile launch: confirm, copy the URL, then hand off to the external
/// browser.
#[tauri::command]
fn open_external_legacy(
    app: AppHandle,
    payload: OpenExternalLegacyRequest,
) -> Result<serde_json::Value, String> {
    let dialog = PreconfirmedDialog(payload.confirmed);
    let mut port = AppLaunchPort {
        app: &app,
        error: None,
    };
    let launched = launch_external(&dialog, &mut port, payload.url.as_str(), true);
    if let Some(error) = port.error {
        return Ok(json!({ "ok": false, "launched": false, "error": error }));
    }
    Ok(json!({ "ok": true, "launched": launched }))
}

#[tauri::command]
fn window_minimize(window: Window) -> Result<(), String> {
    window.minimize().map_err(|err| err.to_string())
}

#[tauri::command]
fn window_toggle_maximize(window: Window) -> Result<(), String> {
    if window.is_maximized().map_err(|err| err.to_string())? {
        window.unmaximize().map_err(|err| err.to_string())
    } else {
        window.maximize().map_err(|err| err.to_string())
    }
}

#[tauri::command]
fn window_is_maximized(window: Window) -> Result<bool, String> {
    window.is_maximized().map_err(|err| err.to_string())
}

#[tauri::command]
fn window_close(window: Window) -> Result<(), String> {
    window.close().map_err(|err| err.to_string())
}

#[tauri::command]
fn locations_list(app: AppHandle, payload: ListRequest) -> Result<serde_json::Value, String> {
    let store = open_store(&app, payload.password.as_str())?;
    match store.locations() {
        Ok(locations) => Ok(json!({ "ok": true, "records": locations })),
        Err(err) => Ok(failure(&err)),
    }
}

fn location_names(store: &FileStore) -> HashMap<String, String> {
    store
        .locations()
        .unwrap_or_default()
        .into_iter()
        .map(|location| (location.id, location.name))
        .collect()
}

fn audit_row(audit: &AuditRecord, locations: &HashMap<String, String>) -> serde_json::Value {
    let mut row = serde_json::to_value(audit).unwrap_or_else(|_| json!({}));
    if let Some(obj) = row.as_object_mut() {
        let location_name = audit
            .location_id
            .as_deref()
            .and_then(|id| locations.get(id).cloned())
            .unwrap_or_default();
        obj.insert("location_name".to_string(), json!(location_name));
        obj.insert(
            "score_tier".to_string(),
            json!(score_tier(audit.score).to_string()),
        );
    }
    row
}

#[tauri::command]
fn audits_list(app: AppHandle, payload: ListRequest) -> Result<serde_json::Value, String> {
    let mut store = open_store(&app, payload.password.as_str())?;
    let audits: Result<Vec<AuditRecord>, StoreError> = store.list();
    match audits {
        Ok(audits) => {
            let locations = location_names(&store);
            let rows: Vec<serde_json::Value> = audits
                .iter()
                .map(|audit| audit_row(audit, &locations))
                .collect();
            Ok(json!({ "ok": true, "records": rows }))
        }
        Err(err) => Ok(failure(&err)),
    }
}

#[tauri::command]
fn audit_save(app: AppHandle, payload: AuditSaveRequest) -> Result<serde_json::Value, String> {
    let mut store = open_store(&app, payload.password.as_str())?;
    let record = payload.record;
    let issues = validate_audit(&record);
    match submit_record(&mut store, record, issues) {
        Ok(SaveOutcome::Invalid(issues)) => {
            Ok(json!({ "ok": false, "code": "validation", "issues": issues }))
        }
        Ok(SaveOutcome::Saved { record, refreshed }) => {
            let locations = location_names(&store);
            let rows: Vec<serde_json::Value> = refreshed
                .iter()
                .map(|audit| audit_row(audit, &locations))
                .collect();
            Ok(json!({
                "ok": true,
                "record": audit_row(&record, &locations),
                "records": rows,
            }))
        }
        Err(err) => Ok(failure(&err)),
    }
}

#[tauri::command]
fn audit_delete(app: AppHandle, payload: DeleteRequest) -> Result<serde_json::Value, String> {
    let mut store = open_store(&app, payload.password.as_str())?;
    let dialog = PreconfirmedDialog(payload.confirmed);
    let outcome = delete_with_confirm::<AuditRecord, _>(
        &dialog,
        &mut store,
        payload.id.as_str(),
        "Delete this audit?",
    );
    match outcome {
        Ok(None) => Ok(json!({
            "ok": false,
            "code": "cancelled",
            "error": "Deletion was not confirmed.",
        })),
        Ok(Some(refreshed)) => {
            let locations = location_names(&store);
            let rows: Vec<serde_json::Value> = refreshed
                .iter()
                .map(|audit| audit_row(audit, &locations))
                .collect();
            Ok(json!({ "ok": true, "records": rows }))
        }
        Err(err) => Ok(failure(&err)),
    }
}

#[tauri::command]
fn audits_table(app: AppHandle, payload: TableRequest) -> Result<serde_json::Value, String> {
    let mut store = open_store(&app, payload.password.as_str())?;
    let audits: Result<Vec<AuditRecord>, StoreError> = store.list();
    match audits {
        Ok(audits) => {
            let locations = location_names(&store);
            let rows: Vec<serde_json::Value> = run_table_query(audits.as_slice(), &payload.query)
                .iter()
                .map(|audit| audit_row(audit, &locations))
                .collect();
            Ok(json!({ "ok": true, "rows": rows }))
        }
        Err(err) => Ok(failure(&err)),
    }
}

#[tauri::command]
fn audits_stats(app: AppHandle, payload: ListRequest) -> Result<serde_json::Value, String> {
    let mut store = open_store(&app, payload.password.as_str())?;
    let audits: Result<Vec<AuditRecord>, StoreError> = store.list();
    match audits {
        Ok(audits) => Ok(json!({
            "ok": true,
            "stats": stats::audit_stats(audits.as_slice()),
        })),
        Err(err) => Ok(failure(&err)),
    }
}

fn stamp_timestamps(id: &str, created_at: &mut String, updated_at: &mut String) {
    let now = now_string();
    if id.is_empty() || created_at.trim().is_empty() {
        *created_at = now.clone();
    }
    *updated_at = now;
}

#[tauri::command]
fn access_list(app: AppHandle, payload: ListRequest) -> Result<serde_json::Value, String> {
    let mut store = open_store(&app, payload.password.as_str())?;
    let records: Result<Vec<AccessRecord>, StoreError> = store.list();
    match records {
        Ok(records) => Ok(json!({ "ok": true, "records": records })),
        Err(err) => Ok(failure(&err)),
    }
}

#[tauri::command]
fn access_save(app: AppHandle, payload: AccessSaveRequest) -> Result<serde_json::Value, String> {
    let mut store = open_store(&app, payload.password.as_str())?;
    let mut record = payload.record;
    let id = record.id.clone();
    stamp_timestamps(id.as_str(), &mut record.created_at, &mut record.updated_at);
    let issues = validate_access(&record);
    match submit_record(&mut store, record, issues) {
        Ok(SaveOutcome::Invalid(issues)) => {
            Ok(json!({ "ok": false, "code": "validation", "issues": issues }))
        }
        Ok(SaveOutcome::Saved { record, refreshed }) => Ok(json!({
            "ok": true,
            "record": record,
            "records": refreshed,
        })),
        Err(err) => Ok(failure(&err)),
    }
}

#[tauri::command]
fn access_delete(app: AppHandle, payload: DeleteRequest) -> Result<serde_json::Value, String> {
    let mut store = open_store(&app, payload.password.as_str())?;
    let dialog = PreconfirmedDialog(payload.confirmed);
    let outcome = delete_with_confirm::<AccessRecord, _>(
        &dialog,
        &mut store,
        payload.id.as_str(),
        "Delete this access?",
    );
    match outcome {
        Ok(None) => Ok(json!({
            "ok": false,
            "code": "cancelled",
            "error": "Deletion was not confirmed.",
        })),
        Ok(Some(refreshed)) => Ok(json!({ "ok": true, "records": refreshed })),
        Err(err) => Ok(failure(&err)),
    }
}

#[tauri::command]
fn access_table(app: AppHandle, payload: TableRequest) -> Result<serde_json::Value, String> {
    let mut store = open_store(&app, payload.password.as_str())?;
    let records: Result<Vec<AccessRecord>, StoreError> = store.list();
    match records {
        Ok(records) => Ok(json!({
            "ok": true,
            "rows": run_table_query(records.as_slice(), &payload.query),
        })),
        Err(err) => Ok(failure(&err)),
    }
}

#[tauri::command]
fn access_stats(app: AppHandle, payload: ListRequest) -> Result<serde_json::Value, String> {
    let mut store = open_store(&app, payload.password.as_str())?;
    let records: Result<Vec<AccessRecord>, StoreError> = store.list();
    match records {
        Ok(records) => {
            let now_ms = now_string().parse::<i64>().unwrap_or(0);
            Ok(json!({
                "ok": true,
                "stats": stats::access_stats(records.as_slice(), now_ms),
            }))
        }
        Err(err) => Ok(failure(&err)),
    }
}

/// Debounced uniqueness probe for the access name field. The frontend waits
/// 500 ms after the last keystroke before invoking this; a check superseded
/// while its lookup ran reports itself stale instead of publishing a result.
#[tauri::command]
fn access_check_name(
    app: AppHandle,
    payload: AccessCheckNameRequest,
) -> Result<serde_json::Value, String> {
    let ticket = {
        let mut gate = check_gate()
            .lock()
            .map_err(|_| "State lock poisoned.".to_string())?;
        gate.begin("access.name")
    };
    let mut store = open_store(&app, payload.password.as_str())?;
    let available = match check_name_available(
        &mut store,
        payload.name.as_str(),
        payload.exclude_id.as_deref(),
    ) {
        Ok(available) => available,
        Err(err) => return Ok(failure(&err)),
    };
    let gate = check_gate()
        .lock()
        .map_err(|_| "State lock poisoned.".to_string())?;
    if !gate.is_current("access.name", ticket) {
        return Ok(json!({
            "ok": true,
            "stale": true,
            "status": FieldStatus::Unchecked,
        }));
    }
    let status = if available {
        FieldStatus::Valid
    } else {
        FieldStatus::Invalid
    };
    Ok(json!({
        "ok": true,
        "stale": false,
        "available": available,
        "status": status,
    }))
}

fn part_row(part: &SparePartRecord) -> serde_json::Value {
    let mut row = serde_json::to_value(part).unwrap_or_else(|_| json!({}));
    if let Some(obj) = row.as_object_mut() {
        obj.insert("low_stock".to_string(), json!(part.is_low_stock()));
    }
    row
}

#[tauri::command]
fn parts_list(app: AppHandle, payload: ListRequest) -> Result<serde_json::Value, String> {
    let mut store = open_store(&app, payload.password.as_str())?;
    let parts: Result<Vec<SparePartRecord>, StoreError> = store.list();
    match parts {
        Ok(parts) => {
            let rows: Vec<serde_json::Value> = parts.iter().map(part_row).collect();
            Ok(json!({ "ok": true, "records": rows }))
        }
        Err(err) => Ok(failure(&err)),
    }
}

#[tauri::command]
fn part_save(app: AppHandle, payload: PartSaveRequest) -> Result<serde_json::Value, String> {
    let mut store = open_store(&app, payload.password.as_str())?;
    let mut record = payload.record;
    let id = record.id.clone();
    stamp_timestamps(id.as_str(), &mut record.created_at, &mut record.updated_at);
    let issues = validate_part(&record);
    match submit_record(&mut store, record, issues) {
        Ok(SaveOutcome::Invalid(issues)) => {
            Ok(json!({ "ok": false, "code": "validation", "issues": issues }))
        }
        Ok(SaveOutcome::Saved { record, refreshed }) => {
            let rows: Vec<serde_json::Value> = refreshed.iter().map(part_row).collect();
            Ok(json!({
                "ok": true,
                "record": part_row(&record),
                "records": rows,
            }))
        }
        Err(err) => Ok(failure(&err)),
    }
}

#[tauri::command]
fn part_delete(app: AppHandle, payload: DeleteRequest) -> Result<serde_json::Value, String> {
    let mut store = open_store(&app, payload.password.as_str())?;
    let dialog = PreconfirmedDialog(payload.confirmed);
    let outcome = delete_with_confirm::<SparePartRecord, _>(
        &dialog,
        &mut store,
        payload.id.as_str(),
        "Delete this spare part?",
    );
    match outcome {
        Ok(None) => Ok(json!({
            "ok": false,
            "code": "cancelled",
            "error": "Deletion was not confirmed.",
        })),
        Ok(Some(refreshed)) => {
            let rows: Vec<serde_json::Value> = refreshed.iter().map(part_row).collect();
            Ok(json!({ "ok": true, "records": rows }))
        }
        Err(err) => Ok(failure(&err)),
    }
}

#[tauri::command]
fn parts_table(app: AppHandle, payload: TableRequest) -> Result<serde_json::Value, String> {
    let mut store = open_store(&app, payload.password.as_str())?;
    let parts: Result<Vec<SparePartRecord>, StoreError> = store.list();
    match parts {
        Ok(parts) => {
            let rows: Vec<serde_json::Value> = run_table_query(parts.as_slice(), &payload.query)
                .iter()
                .map(part_row)
                .collect();
            Ok(json!({ "ok": true, "rows": rows }))
        }
        Err(err) => Ok(failure(&err)),
    }
}

#[tauri::command]
fn parts_stats(app: AppHandle, payload: ListRequest) -> Result<serde_json::Value, String> {
    let mut store = open_store(&app, payload.password.as_str())?;
    let parts: Result<Vec<SparePartRecord>, StoreError> = store.list();
    match parts {
        Ok(parts) => Ok(json!({
            "ok": true,
            "stats": stats::part_stats(parts.as_slice()),
        })),
        Err(err) => Ok(failure(&err)),
    }
}

fn save_csv_dialog(filename: String, content: String) -> Result<SaveCsvResult, String> {
    let path = rfd::FileDialog::new()
        .set_file_name(filename.as_str())
        .save_file();

    let Some(path) = path else {
        return Ok(SaveCsvResult {
            ok: false,
            canceled: true,
            filename,
            path: None,
            error: None,
        });
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| err.to_string())?;
    }
    fs::write(path.as_path(), content).map_err(|err| err.to_string())?;
    Ok(SaveCsvResult {
        ok: true,
        canceled: false,
        filename,
        path: Some(path.to_string_lossy().to_string()),
        error: None,
    })
}

#[tauri::command]
fn table_export_csv(payload: ExportCsvRequest) -> Result<SaveCsvResult, String> {
    let filename = export::export_filename(payload.filename.as_str());
    let mut columns = export::export_columns(&payload.columns);
    let mut rows = payload.rows.as_array().cloned().unwrap_or_default();
    if rows.len() > export::EXPORT_ROW_CAP {
        rows.truncate(export::EXPORT_ROW_CAP);
    }
    if columns.is_empty() {
        if let Some(first_row) = rows.first().and_then(|row| row.as_object()) {
            for key in first_row.keys() {
                if key == "__rowId" {
                    continue;
                }
                let safe = export::clamp_text(key.as_str(), 80, true);
                if !safe.is_empty() {
                    columns.push(safe);
                }
            }
        }
    }
    let csv = export::rows_to_csv(columns.as_slice(), rows.as_slice());
    save_csv_dialog(filename, csv)
}

#[tauri::command]
fn vacations_status() -> Result<serde_json::Value, String> {
    Ok(json!({
        "available": false,
        "message": "Vacations module is not available yet.",
    }))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    tracing::info!("starting FacilityDesk runtime");

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_clipboard_manager::init())
        .invoke_handler(tauri::generate_handler![
            app_version,
            platform_name,
            storage_info,
            auth_read,
            auth_setup,
            auth_verify,
            auth_change,
            clipboard_write,
            open_external,
            open_external_legacy,
            window_minimize,
            window_toggle_maximize,
            window_is_maximized,
            window_close,
            locations_list,
            audits_list,
            audit_save,
            audit_delete,
            audits_table,
            audits_stats,
            access_list,
            access_save,
            access_delete,
            access_table,
            access_stats,
            access_check_name,
            parts_list,
            part_save,
            part_delete,
            parts_table,
            parts_stats,
            table_export_csv,
            vacations_status
        ])
        .run(tauri::generate_context!())
        .expect("failed to run FacilityDesk");
}
