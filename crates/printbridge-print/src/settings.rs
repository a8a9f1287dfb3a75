// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Global settings service: remote credentials, client identity and the
// role-to-printer mapping.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use printbridge_core::error::{BridgeError, Result};
use printbridge_core::types::{GlobalSettings, GlobalSettingsUpdate, PrinterId, PrinterRole};

use crate::events::{BridgeEvent, EventBus};
use crate::store::Store;

pub const DEFAULT_SERVER_URL: &str = "https://example.com";
pub const DEFAULT_API_KEY: &str = "default-api-key";

const CLIENT_ID_PREFIX: &str = "bridge-";
const CLIENT_ID_LEN: usize = 12;
const MACHINE_ID_PATHS: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// Stable client id for this machine: `bridge-` plus the first 12
/// characters of the machine id, or of a random UUID when the machine id is
/// unknown. Ids already registered with the queue use this exact form.
pub fn generate_client_id(machine_id: Option<&str>) -> String {
    let source = match machine_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => uuid::Uuid::new_v4().simple().to_string(),
    };
    let suffix: String = source.chars().take(CLIENT_ID_LEN).collect();
    format!("{CLIENT_ID_PREFIX}{suffix}")
}

pub struct SettingsService {
    store: Arc<dyn Store>,
    events: EventBus,
    machine_id_paths: Vec<PathBuf>,
}

impl SettingsService {
    pub fn new(store: Arc<dyn Store>, events: EventBus) -> Self {
        Self {
            store,
            events,
            machine_id_paths: MACHINE_ID_PATHS.iter().map(PathBuf::from).collect(),
        }
    }

    /// Read the machine id from `paths` instead of the system locations.
    pub fn with_machine_id_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.machine_id_paths = paths;
        self
    }

    fn machine_id(&self) -> Option<String> {
        self.machine_id_paths
            .iter()
            .find_map(|path| std::fs::read_to_string(path).ok())
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
    }

    /// Create default settings if none exist and return the current ones.
    #[instrument(skip(self))]
    pub fn initialize(&self) -> Result<GlobalSettings> {
        if let Some(existing) = self.store.load_global_settings()? {
            info!(client_id = %existing.client_id, "Settings loaded");
            return Ok(existing);
        }

        let machine_id = self.machine_id();
        if machine_id.is_none() {
            warn!("No machine id available, using a random client id");
        }
        let now = Utc::now();
        let settings = GlobalSettings {
            server_url: DEFAULT_SERVER_URL.into(),
            api_key: DEFAULT_API_KEY.into(),
            client_id: generate_client_id(machine_id.as_deref()),
            label_printer_id: None,
            receipt_printer_id: None,
            regular_printer_id: None,
            created_at: now,
            updated_at: now,
        };
        self.store.save_global_settings(&settings)?;
        warn!(client_id = %settings.client_id, "No settings found, created defaults");
        Ok(settings)
    }

    pub fn load(&self) -> Result<GlobalSettings> {
        self.store
            .load_global_settings()?
            .ok_or_else(|| BridgeError::NotFound("global settings".into()))
    }

    /// Apply `update`, persist it and publish `SettingsUpdated`.
    #[instrument(skip(self, update))]
    pub fn update(&self, update: GlobalSettingsUpdate) -> Result<GlobalSettings> {
        let mut settings = self.load()?;

        if let Some(server_url) = update.server_url {
            settings.server_url = server_url.trim().to_string();
        }
        if let Some(api_key) = update.api_key {
            settings.api_key = api_key.trim().to_string();
        }
        if let Some(client_id) = update.client_id {
            settings.client_id = client_id.trim().to_string();
        }
        if let Some(id) = update.label_printer_id {
            self.check_role(PrinterRole::Label, id)?;
            settings.label_printer_id = id;
        }
        if let Some(id) = update.receipt_printer_id {
            self.check_role(PrinterRole::Receipt, id)?;
            settings.receipt_printer_id = id;
        }
        if let Some(id) = update.regular_printer_id {
            self.check_role(PrinterRole::Regular, id)?;
            settings.regular_printer_id = id;
        }
        settings.updated_at = Utc::now();

        self.store.save_global_settings(&settings)?;
        info!("Settings updated");
        self.events.emit(BridgeEvent::SettingsUpdated);
        Ok(settings)
    }

    /// A role may only point at an existing printer of the matching type.
    fn check_role(&self, role: PrinterRole, id: Option<PrinterId>) -> Result<()> {
        let Some(id) = id else {
            return Ok(());
        };
        let printer = self
            .store
            .get_printer(id)?
            .ok_or_else(|| BridgeError::NotFound(format!("printer {id}")))?;
        if printer.printer_type != role.printer_type() {
            return Err(BridgeError::Validation(format!(
                "{} is a {} printer and cannot be the {role} printer",
                printer.name, printer.printer_type
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use printbridge_core::settings::PrinterSettings;
    use printbridge_core::types::PrinterType;

    use super::*;
    use crate::store::SqliteStore;

    fn service() -> (Arc<SqliteStore>, EventBus, SettingsService) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let events = EventBus::default();
        let service = SettingsService::new(store.clone(), events.clone());
        (store, events, service)
    }

    #[test]
    fn client_id_is_derived_from_the_machine_id() {
        let a = generate_client_id(Some("4c4c4544004d3510"));
        assert_eq!(a, "bridge-4c4c4544004d");
        assert_eq!(a, generate_client_id(Some(" 4c4c4544004d3510\n")));
        assert_eq!(generate_client_id(Some("abc")), "bridge-abc");
        assert_eq!(generate_client_id(Some("  ")).len(), a.len());

        let random = generate_client_id(None);
        assert_eq!(random.len(), a.len());
        assert_ne!(random, generate_client_id(None));
    }

    #[test]
    fn initialize_creates_defaults_once() {
        let dir = tempfile::tempdir().unwrap();
        let machine_id = dir.path().join("machine-id");
        std::fs::write(&machine_id, "0123456789abcdef\n").unwrap();

        let (_store, _events, service) = service();
        let service = service.with_machine_id_paths(vec![machine_id]);

        let first = service.initialize().unwrap();
        assert_eq!(first.server_url, DEFAULT_SERVER_URL);
        assert_eq!(first.api_key, DEFAULT_API_KEY);
        assert_eq!(first.client_id, "bridge-0123456789ab");

        let second = service.initialize().unwrap();
        assert_eq!(second.client_id, first.client_id);
    }

    #[test]
    fn update_publishes_and_persists() {
        let (store, events, service) = service();
        service.initialize().unwrap();
        let mut rx = events.subscribe();

        let updated = service
            .update(GlobalSettingsUpdate {
                server_url: Some(" https://queue.test ".into()),
                api_key: Some("k-1".into()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(updated.server_url, "https://queue.test");
        assert_eq!(rx.try_recv().unwrap(), BridgeEvent::SettingsUpdated);
        assert_eq!(store.load_global_settings().unwrap().unwrap().api_key, "k-1");
    }

    #[test]
    fn roles_must_match_printer_types() {
        let (store, _events, service) = service();
        service.initialize().unwrap();
        let receipt = store
            .create_printer(
                "XP-80C",
                PrinterType::Receipt,
                None,
                &PrinterSettings::defaults_for(PrinterType::Receipt),
            )
            .unwrap();

        let err = service
            .update(GlobalSettingsUpdate {
                label_printer_id: Some(Some(receipt.id)),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, BridgeError::Validation(_)));

        let ok = service
            .update(GlobalSettingsUpdate {
                receipt_printer_id: Some(Some(receipt.id)),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(ok.printer_for(PrinterRole::Receipt), Some(receipt.id));

        let cleared = service
            .update(GlobalSettingsUpdate {
                receipt_printer_id: Some(None),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(cleared.receipt_printer_id, None);
    }

    #[test]
    fn load_without_initialize_is_not_found() {
        let (_store, _events, service) = service();
        assert!(matches!(service.load(), Err(BridgeError::NotFound(_))));
    }
}
