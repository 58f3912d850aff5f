//! Certificate state storage contract and in-memory reference store.
//!
//! The lifecycle manager only ever talks to [`CertStateStore`]; file or
//! relational backends implement the same contract outside this crate.
//! Rows are stamped on revocation, never deleted.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{CertificateMetadata, SerialNumber};

/// Roles with at most one active certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SingletonRole {
    /// The certificate authority.
    Ca,
    /// The RADIUS server certificate.
    Server,
}

impl std::fmt::Display for SingletonRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ca => write!(f, "certificate authority"),
            Self::Server => write!(f, "server certificate"),
        }
    }
}

/// A persisted certificate row: raw encoded bytes plus cached metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedCertificate {
    /// BER/DER certificate bytes.
    pub cert_ber: Vec<u8>,
    /// PKCS#8 private key bytes, absent for imported public certificates.
    pub private_key_ber: Option<Vec<u8>>,
    /// Cached metadata for lookup without parsing.
    pub metadata: CertificateMetadata,
    /// Set exactly once on revocation.
    pub revoked_at: Option<DateTime<Utc>>,
}

impl PersistedCertificate {
    /// True if the row has not been revoked.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }
}

/// Storage contract consumed by the lifecycle manager.
///
/// Implementations must make each method atomic: a concurrent pair of
/// `set_singleton` calls for the same role must not both succeed, and
/// readers must never observe a row mid-write.
pub trait CertStateStore: Send + Sync {
    /// Returns the active (non-revoked) certificate for a singleton role.
    fn get_singleton(&self, role: SingletonRole) -> Result<Option<PersistedCertificate>>;

    /// Persists a new singleton certificate.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::AlreadyExists`] when an active row for the
    /// role is present, or [`Error::Storage`] on a duplicate serial.
    fn set_singleton(&self, role: SingletonRole, record: PersistedCertificate) -> Result<()>;

    /// Stamps `revoked_at` on the singleton row with the given serial.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NotFound`] when no such serial exists for the
    /// role, or [`Error::AlreadyRevoked`] when already stamped.
    fn revoke_singleton(&self, role: SingletonRole, serial: SerialNumber) -> Result<()>;

    /// Returns every non-revoked client certificate.
    fn list_clients(&self) -> Result<Vec<PersistedCertificate>>;

    /// Persists a new client certificate.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Storage`] on a duplicate serial.
    fn create_client(&self, record: PersistedCertificate) -> Result<()>;

    /// Returns the client row with the given serial, revoked or not.
    /// Callers filter by [`PersistedCertificate::is_active`] as needed.
    fn get_client(&self, serial: SerialNumber) -> Result<Option<PersistedCertificate>>;

    /// Stamps `revoked_at` on the client row with the given serial.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NotFound`] / [`Error::AlreadyRevoked`].
    fn revoke_client(&self, serial: SerialNumber) -> Result<()>;
}

#[derive(Default)]
struct StoreInner {
    /// Full singleton history per role, newest last.
    singletons: HashMap<SingletonRole, Vec<PersistedCertificate>>,
    clients: Vec<PersistedCertificate>,
}

impl StoreInner {
    fn serial_exists(&self, serial: SerialNumber) -> bool {
        self.singletons
            .values()
            .flatten()
            .chain(self.clients.iter())
            .any(|row| row.metadata.serial_number == serial)
    }
}

/// In-memory reference implementation of [`CertStateStore`].
///
/// All checks and writes for one call happen under a single write
/// guard, which closes the check-then-act race.
#[derive(Default)]
pub struct MemoryCertStore {
    inner: RwLock<StoreInner>,
}

impl MemoryCertStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CertStateStore for MemoryCertStore {
    fn get_singleton(&self, role: SingletonRole) -> Result<Option<PersistedCertificate>> {
        let inner = self.inner.read();
        Ok(inner
            .singletons
            .get(&role)
            .and_then(|rows| rows.iter().find(|row| row.is_active()))
            .cloned())
    }

    fn set_singleton(&self, role: SingletonRole, record: PersistedCertificate) -> Result<()> {
        let mut inner = self.inner.write();

        let rows = inner.singletons.entry(role).or_default();
        if rows.iter().any(PersistedCertificate::is_active) {
            return Err(Error::AlreadyExists(role.to_string()));
        }
        let serial = record.metadata.serial_number;
        if inner.serial_exists(serial) {
            return Err(Error::Storage(format!("duplicate serial number: {serial}")));
        }

        debug!("Persisting {} with serial: {}", role, serial);
        inner.singletons.entry(role).or_default().push(record);
        Ok(())
    }

    fn revoke_singleton(&self, role: SingletonRole, serial: SerialNumber) -> Result<()> {
        let mut inner = self.inner.write();
        let row = inner
            .singletons
            .get_mut(&role)
            .and_then(|rows| {
                rows.iter_mut()
                    .find(|row| row.metadata.serial_number == serial)
            })
            .ok_or_else(|| Error::NotFound(serial.to_string()))?;

        if row.revoked_at.is_some() {
            return Err(Error::AlreadyRevoked(serial.to_string()));
        }
        row.revoked_at = Some(Utc::now());
        debug!("Revoked {} with serial: {}", role, serial);
        Ok(())
    }

    fn list_clients(&self) -> Result<Vec<PersistedCertificate>> {
        let inner = self.inner.read();
        Ok(inner
            .clients
            .iter()
            .filter(|row| row.is_active())
            .cloned()
            .collect())
    }

    fn create_client(&self, record: PersistedCertificate) -> Result<()> {
        let mut inner = self.inner.write();
        let serial = record.metadata.serial_number;
        if inner.serial_exists(serial) {
            return Err(Error::Storage(format!("duplicate serial number: {serial}")));
        }
        debug!("Persisting client certificate with serial: {}", serial);
        inner.clients.push(record);
        Ok(())
    }

    fn get_client(&self, serial: SerialNumber) -> Result<Option<PersistedCertificate>> {
        let inner = self.inner.read();
        Ok(inner
            .clients
            .iter()
            .find(|row| row.metadata.serial_number == serial)
            .cloned())
    }

    fn revoke_client(&self, serial: SerialNumber) -> Result<()> {
        let mut inner = self.inner.write();
        let row = inner
            .clients
            .iter_mut()
            .find(|row| row.metadata.serial_number == serial)
            .ok_or_else(|| Error::NotFound(serial.to_string()))?;

        if row.revoked_at.is_some() {
            return Err(Error::AlreadyRevoked(serial.to_string()));
        }
        row.revoked_at = Some(Utc::now());
        debug!("Revoked client certificate with serial: {}", serial);
        Ok(())
    }
}

impl std::fmt::Debug for MemoryCertStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("MemoryCertStore")
            .field(
                "singleton_count",
                &inner.singletons.values().map(Vec::len).sum::<usize>(),
            )
            .field("client_count", &inner.clients.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Rdn;

    fn record(cn: &str) -> PersistedCertificate {
        let now = Utc::now();
        PersistedCertificate {
            cert_ber: vec![1, 2, 3],
            private_key_ber: Some(vec![4, 5, 6]),
            metadata: CertificateMetadata {
                subject: Rdn::new(cn, "Example").unwrap(),
                issuer: Rdn::new("Example Root CA", "Example").unwrap(),
                serial_number: SerialNumber::generate(),
                not_before: now,
                not_after: now + chrono::Duration::days(365),
            },
            revoked_at: None,
        }
    }

    #[test]
    fn singleton_starts_absent() {
        let store = MemoryCertStore::new();
        assert!(store.get_singleton(SingletonRole::Ca).unwrap().is_none());
    }

    #[test]
    fn set_singleton_then_get() {
        let store = MemoryCertStore::new();
        let row = record("Example Root CA");
        let serial = row.metadata.serial_number;

        store.set_singleton(SingletonRole::Ca, row).unwrap();

        let got = store.get_singleton(SingletonRole::Ca).unwrap().unwrap();
        assert_eq!(got.metadata.serial_number, serial);
    }

    #[test]
    fn second_active_singleton_rejected() {
        let store = MemoryCertStore::new();
        store
            .set_singleton(SingletonRole::Ca, record("ca-1"))
            .unwrap();

        let result = store.set_singleton(SingletonRole::Ca, record("ca-2"));
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
    }

    #[test]
    fn singleton_roles_are_independent() {
        let store = MemoryCertStore::new();
        store
            .set_singleton(SingletonRole::Ca, record("ca"))
            .unwrap();
        store
            .set_singleton(SingletonRole::Server, record("server"))
            .unwrap();
    }

    #[test]
    fn revoked_singleton_not_returned_but_history_retained() {
        let store = MemoryCertStore::new();
        let row = record("ca");
        let serial = row.metadata.serial_number;
        store.set_singleton(SingletonRole::Ca, row).unwrap();

        store.revoke_singleton(SingletonRole::Ca, serial).unwrap();
        assert!(store.get_singleton(SingletonRole::Ca).unwrap().is_none());

        // A replacement can be created after revocation.
        store
            .set_singleton(SingletonRole::Ca, record("ca-2"))
            .unwrap();
    }

    #[test]
    fn revoke_singleton_is_not_idempotent() {
        let store = MemoryCertStore::new();
        let row = record("ca");
        let serial = row.metadata.serial_number;
        store.set_singleton(SingletonRole::Ca, row).unwrap();

        store.revoke_singleton(SingletonRole::Ca, serial).unwrap();
        let result = store.revoke_singleton(SingletonRole::Ca, serial);
        assert!(matches!(result, Err(Error::AlreadyRevoked(_))));
    }

    #[test]
    fn revoke_unknown_singleton_serial() {
        let store = MemoryCertStore::new();
        let result = store.revoke_singleton(SingletonRole::Ca, SerialNumber::generate());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn list_clients_filters_revoked() {
        let store = MemoryCertStore::new();
        let a = record("client-a");
        let b = record("client-b");
        let serial_a = a.metadata.serial_number;

        store.create_client(a).unwrap();
        store.create_client(b).unwrap();
        assert_eq!(store.list_clients().unwrap().len(), 2);

        store.revoke_client(serial_a).unwrap();
        let remaining = store.list_clients().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].metadata.subject.common_name, "client-b");
    }

    #[test]
    fn get_client_returns_revoked_rows() {
        let store = MemoryCertStore::new();
        let row = record("client-a");
        let serial = row.metadata.serial_number;
        store.create_client(row).unwrap();
        store.revoke_client(serial).unwrap();

        let got = store.get_client(serial).unwrap().unwrap();
        assert!(got.revoked_at.is_some());
    }

    #[test]
    fn duplicate_serial_rejected_across_roles() {
        let store = MemoryCertStore::new();
        let row = record("ca");
        let mut dup = record("client");
        dup.metadata.serial_number = row.metadata.serial_number;

        store.set_singleton(SingletonRole::Ca, row).unwrap();
        let result = store.create_client(dup);
        assert!(matches!(result, Err(Error::Storage(_))));
    }

    #[test]
    fn revoke_unknown_client_serial() {
        let store = MemoryCertStore::new();
        let result = store.revoke_client(SerialNumber::generate());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
