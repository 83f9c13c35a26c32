use crate::crypto::{
    decrypt_envelope_with_key, derive_key, encrypt_with_key, password_fingerprint, CryptoEnvelope,
    DEFAULT_PBKDF2_ITERATIONS,
};
use crate::models::{AccessRecord, AuditRecord, LocationRecord, SparePartRecord};
use aes_gcm::aead::{rand_core::RngCore, OsRng};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub const DATA_FILE: &str = "facilitydesk.enc";
const STORE_VERSION: u8 = 1;

/// Failure of a single store round trip. Never retried; the caller surfaces
/// the message next to the acting control and leaves the previous list intact.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Invalid password.")]
    Locked,
    #[error("Storage failure: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "not_found",
            StoreError::Conflict(_) => "conflict",
            StoreError::Locked => "locked",
            StoreError::Storage(_) => "storage",
        }
    }
}

pub fn now_string() -> String {
    let ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    ms.to_string()
}

pub fn new_id() -> String {
    let mut bytes = [0_u8; 10];
    OsRng.fill_bytes(&mut bytes);
    let mut hex = String::new();
    for b in bytes {
        hex.push_str(format!("{:02x}", b).as_str());
    }
    format!("id-{}-{hex}", now_string())
}

/// Everything persisted for the dashboard, one document per installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default = "default_store_version")]
    pub version: u8,
    #[serde(default)]
    pub audits: Vec<AuditRecord>,
    #[serde(default)]
    pub access: Vec<AccessRecord>,
    #[serde(default)]
    pub spare_parts: Vec<SparePartRecord>,
    #[serde(default)]
    pub locations: Vec<LocationRecord>,
}

fn default_store_version() -> u8 {
    STORE_VERSION
}

impl Default for StoreData {
    fn default() -> Self {
        StoreData {
            version: STORE_VERSION,
            audits: Vec::new(),
            access: Vec::new(),
            spare_parts: Vec::new(),
            locations: default_locations(),
        }
    }
}

fn default_locations() -> Vec<LocationRecord> {
    ["Sucursal Centro", "Sucursal Norte", "Almacen Central"]
        .iter()
        .enumerate()
        .map(|(idx, name)| LocationRecord {
            id: format!("loc-{}", idx + 1),
            name: name.to_string(),
        })
        .collect()
}

/// Binds a record type to its slot in the data document.
pub trait StoredRecord: Clone + Serialize + DeserializeOwned {
    fn collection() -> &'static str;
    fn record_id(&self) -> &str;
    fn set_record_id(&mut self, id: String);
    fn slot(data: &StoreData) -> &Vec<Self>;
    fn slot_mut(data: &mut StoreData) -> &mut Vec<Self>;
    /// Field under a store-enforced uniqueness constraint, if any.
    fn unique_name(&self) -> Option<&str> {
        None
    }
}

impl StoredRecord for AuditRecord {
    fn collection() -> &'static str {
        "audits"
    }
    fn record_id(&self) -> &str {
        self.id.as_str()
    }
    fn set_record_id(&mut self, id: String) {
        self.id = id;
    }
    fn slot(data: &StoreData) -> &Vec<Self> {
        &data.audits
    }
    fn slot_mut(data: &mut StoreData) -> &mut Vec<Self> {
        &mut data.audits
    }
}

impl StoredRecord for AccessRecord {
    fn collection() -> &'static str {
        "access"
    }
    fn record_id(&self) -> &str {
        self.id.as_str()
    }
    fn set_record_id(&mut self, id: String) {
        self.id = id;
    }
    fn slot(data: &StoreData) -> &Vec<Self> {
        &data.access
    }
    fn slot_mut(data: &mut StoreData) -> &mut Vec<Self> {
        &mut data.access
    }
    fn unique_name(&self) -> Option<&str> {
        Some(self.name.as_str())
    }
}

impl StoredRecord for SparePartRecord {
    fn collection() -> &'static str {
        "spare_parts"
    }
    fn record_id(&self) -> &str {
        self.id.as_str()
    }
    fn set_record_id(&mut self, id: String) {
        self.id = id;
    }
    fn slot(data: &StoreData) -> &Vec<Self> {
        &data.spare_parts
    }
    fn slot_mut(data: &mut StoreData) -> &mut Vec<Self> {
        &mut data.spare_parts
    }
}

/// One collection's CRUD surface: single round trip per call, no batching,
/// no transactions. The file store is the final authority on constraints.
pub trait RecordStore<R: StoredRecord> {
    fn list(&mut self) -> Result<Vec<R>, StoreError>;
    fn insert(&mut self, record: R) -> Result<R, StoreError>;
    fn update(&mut self, id: &str, record: R) -> Result<R, StoreError>;
    fn delete(&mut self, id: &str) -> Result<(), StoreError>;
}

struct StoreCache {
    key: Option<String>,
    data: Option<StoreData>,
    salt: Option<Vec<u8>>,
    cipher_key: Option<[u8; 32]>,
}

fn store_cache() -> &'static Mutex<StoreCache> {
    static CACHE: OnceLock<Mutex<StoreCache>> = OnceLock::new();
    CACHE.get_or_init(|| {
        Mutex::new(StoreCache {
            key: None,
            data: None,
            salt: None,
            cipher_key: None,
        })
    })
}

pub struct FileStore {
    root: PathBuf,
    password: String,
}

impl FileStore {
    pub fn new(root: &Path, password: &str) -> FileStore {
        FileStore {
            root: root.to_path_buf(),
            password: password.to_string(),
        }
    }

    fn data_path(&self) -> PathBuf {
        self.root.join(DATA_FILE)
    }

    fn cache_key(&self) -> String {
        format!(
            "{}|{}",
            self.root.to_string_lossy(),
            password_fingerprint(self.password.as_str())
        )
    }

    fn cached_data(&self) -> Option<StoreData> {
        let cache = store_cache().lock().ok()?;
        if cache.key.as_deref() == Some(self.cache_key().as_str()) {
            cache.data.clone()
        } else {
            None
        }
    }

    fn cached_crypto(&self) -> Option<(Vec<u8>, [u8; 32])> {
        let cache = store_cache().lock().ok()?;
        if cache.key.as_deref() != Some(self.cache_key().as_str()) {
            return None;
        }
        match (cache.salt.as_ref(), cache.cipher_key) {
            (Some(salt), Some(key)) => Some((salt.clone(), key)),
            _ => None,
        }
    }

    fn remember(&self, data: &StoreData, salt: &[u8], key: [u8; 32]) {
        if let Ok(mut cache) = store_cache().lock() {
            cache.key = Some(self.cache_key());
            cache.data = Some(data.clone());
            cache.salt = Some(salt.to_vec());
            cache.cipher_key = Some(key);
        }
    }

    pub fn load(&self) -> Result<StoreData, StoreError> {
        if let Some(data) = self.cached_data() {
            return Ok(data);
        }
        let path = self.data_path();
        if !path.exists() {
            return Ok(StoreData::default());
        }
        let raw = fs::read_to_string(path).map_err(|err| StoreError::Storage(err.to_string()))?;
        let envelope: CryptoEnvelope =
            serde_json::from_str(raw.as_str()).map_err(|err| StoreError::Storage(err.to_string()))?;
        let salt = crate::crypto::decode_b64(envelope.salt.as_str())
            .map_err(StoreError::Storage)?;
        let key = match self.cached_crypto() {
            Some((cached_salt, cached_key)) if cached_salt == salt => cached_key,
            _ => derive_key(
                self.password.as_str(),
                salt.as_slice(),
                DEFAULT_PBKDF2_ITERATIONS,
            ),
        };
        let plain = decrypt_envelope_with_key(&envelope, key).map_err(StoreError::Storage)?;
        let Some(plain) = plain else {
            return Err(StoreError::Locked);
        };
        let mut data: StoreData =
            serde_json::from_str(plain.as_str()).map_err(|err| StoreError::Storage(err.to_string()))?;
        data.version = STORE_VERSION;
        if data.locations.is_empty() {
            data.locations = default_locations();
        }
        self.remember(&data, salt.as_slice(), key);
        Ok(data)
    }

    pub fn save(&self, data: &StoreData) -> Result<(), StoreError> {
        let content =
            serde_json::to_string(data).map_err(|err| StoreError::Storage(err.to_string()))?;
        let (salt, key) = match self.cached_crypto() {
            Some(entry) => entry,
            None => {
                let mut salt = vec![0u8; 16];
                OsRng.fill_bytes(salt.as_mut_slice());
                let key = derive_key(
                    self.password.as_str(),
                    salt.as_slice(),
                    DEFAULT_PBKDF2_ITERATIONS,
                );
                (salt, key)
            }
        };
        let envelope = encrypt_with_key(content.as_str(), salt.as_slice(), key)
            .map_err(StoreError::Storage)?;
        let serialized = serde_json::to_string_pretty(&envelope)
            .map_err(|err| StoreError::Storage(err.to_string()))?;
        if let Some(parent) = self.data_path().parent() {
            fs::create_dir_all(parent).map_err(|err| StoreError::Storage(err.to_string()))?;
        }
        fs::write(self.data_path(), serialized)
            .map_err(|err| StoreError::Storage(err.to_string()))?;
        self.remember(data, salt.as_slice(), key);
        Ok(())
    }

    pub fn locations(&self) -> Result<Vec<LocationRecord>, StoreError> {
        Ok(self.load()?.locations)
    }
}

fn name_conflict<R: StoredRecord>(records: &[R], candidate: &R, skip_id: Option<&str>) -> bool {
    let Some(name) = candidate.unique_name() else {
        return false;
    };
    let name = name.trim();
    records.iter().any(|existing| {
        if Some(existing.record_id()) == skip_id {
            return false;
        }
        existing
            .unique_name()
            .is_some_and(|other| other.trim().eq_ignore_ascii_case(name))
    })
}

impl<R: StoredRecord> RecordStore<R> for FileStore {
    fn list(&mut self) -> Result<Vec<R>, StoreError> {
        let data = self.load()?;
        Ok(R::slot(&data).clone())
    }

    fn insert(&mut self, mut record: R) -> Result<R, StoreError> {
        let mut data = self.load()?;
        if record.record_id().is_empty() {
            record.set_record_id(new_id());
        }
        let records = R::slot_mut(&mut data);
        if records
            .iter()
            .any(|existing| existing.record_id() == record.record_id())
        {
            return Err(StoreError::Conflict(format!(
                "A record with this id already exists in {}.",
                R::collection()
            )));
        }
        if name_conflict(records.as_slice(), &record, None) {
            return Err(StoreError::Conflict(
                "A record with this name already exists.".to_string(),
            ));
        }
        records.push(record.clone());
        self.save(&data)?;
        Ok(record)
    }

    fn update(&mut self, id: &str, mut record: R) -> Result<R, StoreError> {
        let mut data = self.load()?;
        let records = R::slot_mut(&mut data);
        let index = records
            .iter()
            .position(|existing| existing.record_id() == id)
            .ok_or_else(|| {
                StoreError::NotFound(format!("Record not found in {}.", R::collection()))
            })?;
        record.set_record_id(id.to_string());
        if name_conflict(records.as_slice(), &record, Some(id)) {
            return Err(StoreError::Conflict(
                "A record with this name already exists.".to_string(),
            ));
        }
        records[index] = record.clone();
        self.save(&data)?;
        Ok(record)
    }

    fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        let mut data = self.load()?;
        let records = R::slot_mut(&mut data);
        let before = records.len();
        records.retain(|existing| existing.record_id() != id);
        if records.len() == before {
            return Err(StoreError::NotFound(format!(
                "Record not found in {}.",
                R::collection()
            )));
        }
        self.save(&data)?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccessRecord, SparePartRecord};

    fn store_in(dir: &Path, password: &str) -> FileStore {
        FileStore::new(dir, password)
    }

    #[test]
    fn file_store_round_trips_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path(), "clave");

        let part = SparePartRecord {
            name: "Filtro de aire".to_string(),
            part_number: "FA-220".to_string(),
            quantity: 4,
            min_quantity: 2,
            unit_price: 12.5,
            ..SparePartRecord::default()
        };
        let created = store.insert(part).unwrap();
        assert!(!created.id.is_empty());

        let listed: Vec<SparePartRecord> = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].part_number, "FA-220");

        RecordStore::<SparePartRecord>::delete(&mut store, created.id.as_str()).unwrap();
        let listed: Vec<SparePartRecord> = store.list().unwrap();
        assert!(listed.is_empty());
    }

    #[test]
    fn wrong_password_is_reported_as_locked() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path(), "correcta");
        store
            .insert(AccessRecord {
                name: "Portal MTC".to_string(),
                url: "https://mtc.example.com".to_string(),
                ..AccessRecord::default()
            })
            .unwrap();

        let wrong = store_in(dir.path(), "incorrecta");
        match wrong.load() {
            Err(StoreError::Locked) => {}
            other => panic!("expected Locked, got {other:?}"),
        }
    }

    #[test]
    fn access_name_constraint_is_enforced_at_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path(), "clave");
        store
            .insert(AccessRecord {
                name: "Portal MTC".to_string(),
                url: "https://mtc.example.com".to_string(),
                ..AccessRecord::default()
            })
            .unwrap();

        let duplicate = store.insert(AccessRecord {
            name: "portal mtc".to_string(),
            url: "https://other.example.com".to_string(),
            ..AccessRecord::default()
        });
        match duplicate {
            Err(StoreError::Conflict(_)) => {}
            other => panic!("expected Conflict, got {other:?}"),
        }

        // Updating a record keeping its own name is not a conflict.
        let listed: Vec<AccessRecord> = store.list().unwrap();
        let mut kept = listed[0].clone();
        kept.notes = "rotated".to_string();
        store.update(listed[0].id.as_str(), kept).unwrap();
    }

    #[test]
    fn update_and_delete_missing_records_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path(), "clave");
        let missing: Result<AccessRecord, _> =
            store.update("nope", AccessRecord::default());
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
        let gone: Result<(), _> = RecordStore::<AccessRecord>::delete(&mut store, "nope");
        assert!(matches!(gone, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn missing_file_loads_seeded_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), "clave");
        let data = store.load().unwrap();
        assert!(data.audits.is_empty());
        assert_eq!(data.locations.len(), 3);
    }
}
