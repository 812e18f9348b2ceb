//! File-backed WhatsApp session store
//!
//! Implements the `wacore` storage traits on top of two MessagePack
//! files in the session directory: `creds.bin` holds the paired device
//! record, `keys.bin` holds everything else (signal keys, app-state
//! sync material, device registry). Deleting the directory resets the
//! pairing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use wacore::appstate::hash::HashState;
use wacore::appstate::processor::AppStateMutationMAC;
use wacore::store::error::{Result, StoreError};
use wacore::store::traits::{
    AppStateSyncKey, AppSyncStore, DeviceListRecord, DeviceStore, LidPnMappingEntry, ProtocolStore,
    SignalStore,
};
use wacore::store::Device;

const CREDS_FILE: &str = "creds.bin";
const KEYS_FILE: &str = "keys.bin";

fn io_err(e: std::io::Error) -> StoreError {
    StoreError::Connection(e.to_string())
}

fn ser_err<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Serialization(e.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MutationMacRow {
    name: String,
    version: u64,
    index_mac: Vec<u8>,
    value_mac: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LidMappingRow {
    lid: String,
    phone_number: String,
    created_at: i64,
    updated_at: i64,
    learning_source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BaseKeyRow {
    address: String,
    message_id: String,
    base_key: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SyncKeyRow {
    key_id: Vec<u8>,
    // AppStateSyncKey as JSON, same shape for every structured value below
    data: String,
}

/// Everything except the device record, persisted as one MessagePack blob.
#[derive(Debug, Default, Serialize, Deserialize)]
struct KeyFile {
    identities: HashMap<String, Vec<u8>>,
    sessions: HashMap<String, Vec<u8>>,
    prekeys: HashMap<u32, (Vec<u8>, bool)>,
    signed_prekeys: HashMap<u32, Vec<u8>>,
    sender_keys: HashMap<String, Vec<u8>>,
    sync_keys: Vec<SyncKeyRow>,
    versions: HashMap<String, String>,
    mutation_macs: Vec<MutationMacRow>,
    skdm_recipients: HashMap<String, Vec<String>>,
    lid_mappings: HashMap<String, LidMappingRow>,
    base_keys: Vec<BaseKeyRow>,
    device_registry: HashMap<String, String>,
    forget_marks: Vec<(String, String)>,
}

/// File-backed storage for `whatsapp-rust`.
pub struct FsStore {
    creds_path: PathBuf,
    keys_path: PathBuf,
    keys: RwLock<KeyFile>,
}

impl FsStore {
    /// Open (or create) the store in the given session directory.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(io_err)?;
        let keys_path = dir.join(KEYS_FILE);

        let keys = match std::fs::read(&keys_path) {
            Ok(bytes) => match rmp_serde::from_slice(&bytes) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!("Key file unreadable ({e}), starting with empty key state");
                    KeyFile::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => KeyFile::default(),
            Err(e) => return Err(io_err(e)),
        };

        Ok(Self {
            creds_path: dir.join(CREDS_FILE),
            keys_path,
            keys: RwLock::new(keys),
        })
    }

    fn flush(&self, keys: &KeyFile) -> Result<()> {
        let bytes = rmp_serde::to_vec(keys).map_err(ser_err)?;
        std::fs::write(&self.keys_path, bytes).map_err(io_err)
    }

    /// Check if a paired device record exists (valid MessagePack data).
    pub fn device_exists_on_disk(&self) -> bool {
        match std::fs::read(&self.creds_path) {
            Ok(bytes) => rmp_serde::from_slice::<Device>(&bytes).is_ok(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl SignalStore for FsStore {
    async fn put_identity(&self, address: &str, key: [u8; 32]) -> Result<()> {
        let mut keys = self.keys.write().await;
        keys.identities.insert(address.to_string(), key.to_vec());
        self.flush(&keys)
    }

    async fn load_identity(&self, address: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.keys.read().await.identities.get(address).cloned())
    }

    async fn delete_identity(&self, address: &str) -> Result<()> {
        let mut keys = self.keys.write().await;
        keys.identities.remove(address);
        self.flush(&keys)
    }

    async fn get_session(&self, address: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.keys.read().await.sessions.get(address).cloned())
    }

    async fn put_session(&self, address: &str, session: &[u8]) -> Result<()> {
        let mut keys = self.keys.write().await;
        keys.sessions.insert(address.to_string(), session.to_vec());
        self.flush(&keys)
    }

    async fn delete_session(&self, address: &str) -> Result<()> {
        let mut keys = self.keys.write().await;
        keys.sessions.remove(address);
        self.flush(&keys)
    }

    async fn store_prekey(&self, id: u32, record: &[u8], uploaded: bool) -> Result<()> {
        let mut keys = self.keys.write().await;
        keys.prekeys.insert(id, (record.to_vec(), uploaded));
        self.flush(&keys)
    }

    async fn load_prekey(&self, id: u32) -> Result<Option<Vec<u8>>> {
        Ok(self
            .keys
            .read()
            .await
            .prekeys
            .get(&id)
            .map(|(record, _)| record.clone()))
    }

    async fn remove_prekey(&self, id: u32) -> Result<()> {
        let mut keys = self.keys.write().await;
        keys.prekeys.remove(&id);
        self.flush(&keys)
    }

    async fn store_signed_prekey(&self, id: u32, record: &[u8]) -> Result<()> {
        let mut keys = self.keys.write().await;
        keys.signed_prekeys.insert(id, record.to_vec());
        self.flush(&keys)
    }

    async fn load_signed_prekey(&self, id: u32) -> Result<Option<Vec<u8>>> {
        Ok(self.keys.read().await.signed_prekeys.get(&id).cloned())
    }

    async fn load_all_signed_prekeys(&self) -> Result<Vec<(u32, Vec<u8>)>> {
        Ok(self
            .keys
            .read()
            .await
            .signed_prekeys
            .iter()
            .map(|(id, record)| (*id, record.clone()))
            .collect())
    }

    async fn remove_signed_prekey(&self, id: u32) -> Result<()> {
        let mut keys = self.keys.write().await;
        keys.signed_prekeys.remove(&id);
        self.flush(&keys)
    }

    async fn put_sender_key(&self, address: &str, record: &[u8]) -> Result<()> {
        let mut keys = self.keys.write().await;
        keys.sender_keys.insert(address.to_string(), record.to_vec());
        self.flush(&keys)
    }

    async fn get_sender_key(&self, address: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.keys.read().await.sender_keys.get(address).cloned())
    }

    async fn delete_sender_key(&self, address: &str) -> Result<()> {
        let mut keys = self.keys.write().await;
        keys.sender_keys.remove(address);
        self.flush(&keys)
    }
}

#[async_trait]
impl AppSyncStore for FsStore {
    async fn get_sync_key(&self, key_id: &[u8]) -> Result<Option<AppStateSyncKey>> {
        let keys = self.keys.read().await;
        match keys.sync_keys.iter().find(|row| row.key_id == key_id) {
            Some(row) => Ok(Some(serde_json::from_str(&row.data).map_err(ser_err)?)),
            None => Ok(None),
        }
    }

    async fn set_sync_key(&self, key_id: &[u8], key: AppStateSyncKey) -> Result<()> {
        let data = serde_json::to_string(&key).map_err(ser_err)?;
        let mut keys = self.keys.write().await;
        match keys.sync_keys.iter_mut().find(|row| row.key_id == key_id) {
            Some(row) => row.data = data,
            None => keys.sync_keys.push(SyncKeyRow {
                key_id: key_id.to_vec(),
                data,
            }),
        }
        self.flush(&keys)
    }

    async fn get_version(&self, name: &str) -> Result<HashState> {
        let keys = self.keys.read().await;
        match keys.versions.get(name) {
            Some(json) => serde_json::from_str(json).map_err(ser_err),
            None => Ok(HashState::default()),
        }
    }

    async fn set_version(&self, name: &str, state: HashState) -> Result<()> {
        let json = serde_json::to_string(&state).map_err(ser_err)?;
        let mut keys = self.keys.write().await;
        keys.versions.insert(name.to_string(), json);
        self.flush(&keys)
    }

    async fn put_mutation_macs(
        &self,
        name: &str,
        version: u64,
        mutations: &[AppStateMutationMAC],
    ) -> Result<()> {
        let mut keys = self.keys.write().await;
        for m in mutations {
            keys.mutation_macs.push(MutationMacRow {
                name: name.to_string(),
                version,
                index_mac: m.index_mac.clone(),
                value_mac: m.value_mac.clone(),
            });
        }
        self.flush(&keys)
    }

    async fn get_mutation_mac(&self, name: &str, index_mac: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .keys
            .read()
            .await
            .mutation_macs
            .iter()
            .find(|row| row.name == name && row.index_mac == index_mac)
            .map(|row| row.value_mac.clone()))
    }

    async fn delete_mutation_macs(&self, name: &str, index_macs: &[Vec<u8>]) -> Result<()> {
        let mut keys = self.keys.write().await;
        keys.mutation_macs
            .retain(|row| row.name != name || !index_macs.contains(&row.index_mac));
        self.flush(&keys)
    }
}

#[async_trait]
impl ProtocolStore for FsStore {
    async fn get_skdm_recipients(&self, group_jid: &str) -> Result<Vec<String>> {
        Ok(self
            .keys
            .read()
            .await
            .skdm_recipients
            .get(group_jid)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_skdm_recipients(&self, group_jid: &str, device_jids: &[String]) -> Result<()> {
        let mut keys = self.keys.write().await;
        let recipients = keys
            .skdm_recipients
            .entry(group_jid.to_string())
            .or_default();
        for jid in device_jids {
            if !recipients.contains(jid) {
                recipients.push(jid.clone());
            }
        }
        self.flush(&keys)
    }

    async fn clear_skdm_recipients(&self, group_jid: &str) -> Result<()> {
        let mut keys = self.keys.write().await;
        keys.skdm_recipients.remove(group_jid);
        self.flush(&keys)
    }

    async fn get_lid_mapping(&self, lid: &str) -> Result<Option<LidPnMappingEntry>> {
        Ok(self
            .keys
            .read()
            .await
            .lid_mappings
            .get(lid)
            .map(row_to_entry))
    }

    async fn get_pn_mapping(&self, phone: &str) -> Result<Option<LidPnMappingEntry>> {
        Ok(self
            .keys
            .read()
            .await
            .lid_mappings
            .values()
            .find(|row| row.phone_number == phone)
            .map(row_to_entry))
    }

    async fn put_lid_mapping(&self, entry: &LidPnMappingEntry) -> Result<()> {
        let mut keys = self.keys.write().await;
        keys.lid_mappings.insert(
            entry.lid.clone(),
            LidMappingRow {
                lid: entry.lid.clone(),
                phone_number: entry.phone_number.clone(),
                created_at: entry.created_at,
                updated_at: entry.updated_at,
                learning_source: entry.learning_source.clone(),
            },
        );
        self.flush(&keys)
    }

    async fn get_all_lid_mappings(&self) -> Result<Vec<LidPnMappingEntry>> {
        Ok(self
            .keys
            .read()
            .await
            .lid_mappings
            .values()
            .map(row_to_entry)
            .collect())
    }

    async fn save_base_key(&self, address: &str, message_id: &str, base_key: &[u8]) -> Result<()> {
        let mut keys = self.keys.write().await;
        match keys
            .base_keys
            .iter_mut()
            .find(|row| row.address == address && row.message_id == message_id)
        {
            Some(row) => row.base_key = base_key.to_vec(),
            None => keys.base_keys.push(BaseKeyRow {
                address: address.to_string(),
                message_id: message_id.to_string(),
                base_key: base_key.to_vec(),
            }),
        }
        self.flush(&keys)
    }

    async fn has_same_base_key(
        &self,
        address: &str,
        message_id: &str,
        current_base_key: &[u8],
    ) -> Result<bool> {
        Ok(self
            .keys
            .read()
            .await
            .base_keys
            .iter()
            .any(|row| {
                row.address == address
                    && row.message_id == message_id
                    && row.base_key == current_base_key
            }))
    }

    async fn delete_base_key(&self, address: &str, message_id: &str) -> Result<()> {
        let mut keys = self.keys.write().await;
        keys.base_keys
            .retain(|row| row.address != address || row.message_id != message_id);
        self.flush(&keys)
    }

    async fn update_device_list(&self, record: DeviceListRecord) -> Result<()> {
        let json = serde_json::to_string(&record).map_err(ser_err)?;
        let mut keys = self.keys.write().await;
        keys.device_registry.insert(record.user.clone(), json);
        self.flush(&keys)
    }

    async fn get_devices(&self, user: &str) -> Result<Option<DeviceListRecord>> {
        let keys = self.keys.read().await;
        match keys.device_registry.get(user) {
            Some(json) => Ok(Some(serde_json::from_str(json).map_err(ser_err)?)),
            None => Ok(None),
        }
    }

    async fn mark_forget_sender_key(&self, group_jid: &str, participant: &str) -> Result<()> {
        let mut keys = self.keys.write().await;
        let mark = (group_jid.to_string(), participant.to_string());
        if !keys.forget_marks.contains(&mark) {
            keys.forget_marks.push(mark);
        }
        self.flush(&keys)
    }

    async fn consume_forget_marks(&self, group_jid: &str) -> Result<Vec<String>> {
        let mut keys = self.keys.write().await;
        let (consumed, kept): (Vec<_>, Vec<_>) = keys
            .forget_marks
            .drain(..)
            .partition(|(group, _)| group == group_jid);
        keys.forget_marks = kept;
        if consumed.is_empty() {
            return Ok(Vec::new());
        }
        self.flush(&keys)?;
        Ok(consumed.into_iter().map(|(_, participant)| participant).collect())
    }
}

fn row_to_entry(row: &LidMappingRow) -> LidPnMappingEntry {
    LidPnMappingEntry {
        lid: row.lid.clone(),
        phone_number: row.phone_number.clone(),
        created_at: row.created_at,
        updated_at: row.updated_at,
        learning_source: row.learning_source.clone(),
    }
}

#[async_trait]
impl DeviceStore for FsStore {
    async fn save(&self, device: &Device) -> Result<()> {
        let bytes = rmp_serde::to_vec(device).map_err(ser_err)?;
        std::fs::write(&self.creds_path, bytes).map_err(io_err)
    }

    async fn load(&self) -> Result<Option<Device>> {
        let bytes = match std::fs::read(&self.creds_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(e)),
        };
        match rmp_serde::from_slice(&bytes) {
            Ok(device) => Ok(Some(device)),
            Err(_) => {
                // Incompatible credentials can't roundtrip; drop them so
                // the client re-pairs cleanly.
                tracing::warn!("Clearing unreadable device credentials, re-pair required");
                let _ = std::fs::remove_file(&self.creds_path);
                Ok(None)
            }
        }
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.creds_path.exists())
    }

    async fn create(&self) -> Result<i32> {
        Ok(1)
    }
}
