//! Certificate lifecycle management for the RADIUS deployment.
//!
//! One CA signs one server certificate and any number of client
//! certificates. The CA and server are singletons: at most one active
//! instance each, enforced under a single-writer critical section so
//! two concurrent creates cannot both succeed.

use std::sync::Arc;

use parking_lot::Mutex;
use radcert_pkcs12::PfxBuilder;
use tracing::{debug, info};

use crate::builder::CertificateBuilder;
use crate::error::{Error, Result};
use crate::storage::{CertStateStore, PersistedCertificate, SingletonRole};
use crate::types::{Certificate, CertificateRole, KeyParams, PrivateKey, Rdn, SerialNumber};

/// Orchestrates issuance, lookup, revocation, and PKCS#12 export over a
/// shared certificate state store.
pub struct CertificateManager {
    store: Arc<dyn CertStateStore>,
    /// Serializes all state-changing operations.
    write_lock: Mutex<()>,
}

impl CertificateManager {
    /// Creates a manager over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn CertStateStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Creates the self-signed certificate authority.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] when an active CA is present.
    pub fn create_certificate_authority(
        &self,
        subject: Rdn,
        validity_days: u32,
        key_params: KeyParams,
    ) -> Result<Certificate> {
        let _guard = self.write_lock.lock();
        info!("Creating certificate authority: {}", subject);

        if self.store.get_singleton(SingletonRole::Ca)?.is_some() {
            return Err(Error::AlreadyExists(SingletonRole::Ca.to_string()));
        }

        let cert = CertificateBuilder::new(subject)
            .key_params(key_params)
            .key_usages(CertificateRole::Ca.key_usages())
            .validity_days(validity_days)
            .self_signed()?;

        self.store
            .set_singleton(SingletonRole::Ca, persist(&cert))?;

        debug!("Certificate authority created: {}", cert.serial_number());
        Ok(cert)
    }

    /// Creates the server certificate, signed by the active CA.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingDependency`] without persisting anything
    /// when no usable CA exists, [`Error::AlreadyExists`] when an
    /// active server certificate is present.
    pub fn create_server_certificate(
        &self,
        subject: Rdn,
        validity_days: u32,
        key_params: KeyParams,
    ) -> Result<Certificate> {
        let _guard = self.write_lock.lock();
        info!("Creating server certificate: {}", subject);

        let ca = self.require_ca()?;
        if self.store.get_singleton(SingletonRole::Server)?.is_some() {
            return Err(Error::AlreadyExists(SingletonRole::Server.to_string()));
        }

        let cert = CertificateBuilder::new(subject)
            .key_params(key_params)
            .key_usages(CertificateRole::Server.key_usages())
            .extended_key_usages(CertificateRole::Server.extended_key_usages())
            .validity_days(validity_days)
            .signed_by(&ca)?;

        self.store
            .set_singleton(SingletonRole::Server, persist(&cert))?;

        debug!("Server certificate created: {}", cert.serial_number());
        Ok(cert)
    }

    /// Creates a client certificate, signed by the active CA.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingDependency`] without persisting anything
    /// when no usable CA exists.
    pub fn create_client_certificate(
        &self,
        subject: Rdn,
        validity_days: u32,
        key_params: KeyParams,
    ) -> Result<Certificate> {
        let _guard = self.write_lock.lock();
        info!("Creating client certificate: {}", subject);

        let ca = self.require_ca()?;

        let cert = CertificateBuilder::new(subject)
            .key_params(key_params)
            .key_usages(CertificateRole::Client.key_usages())
            .extended_key_usages(CertificateRole::Client.extended_key_usages())
            .validity_days(validity_days)
            .signed_by(&ca)?;

        self.store.create_client(persist(&cert))?;

        debug!("Client certificate created: {}", cert.serial_number());
        Ok(cert)
    }

    /// Returns the active (non-revoked) certificate authority.
    ///
    /// # Errors
    ///
    /// Returns an error only on storage failure; absence is `None`.
    pub fn certificate_authority(&self) -> Result<Option<Certificate>> {
        Ok(self
            .store
            .get_singleton(SingletonRole::Ca)?
            .map(reconstruct))
    }

    /// Returns the active (non-revoked) server certificate.
    ///
    /// # Errors
    ///
    /// Returns an error only on storage failure; absence is `None`.
    pub fn server_certificate(&self) -> Result<Option<Certificate>> {
        Ok(self
            .store
            .get_singleton(SingletonRole::Server)?
            .map(reconstruct))
    }

    /// Returns every non-revoked client certificate.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn client_certificates(&self) -> Result<Vec<Certificate>> {
        Ok(self
            .store
            .list_clients()?
            .into_iter()
            .map(reconstruct)
            .collect())
    }

    /// Returns the non-revoked client certificate with the given serial.
    ///
    /// # Errors
    ///
    /// Returns an error only on storage failure; absent and revoked
    /// rows are both `None`.
    pub fn client_by_serial(&self, serial: SerialNumber) -> Result<Option<Certificate>> {
        Ok(self
            .store
            .get_client(serial)?
            .filter(PersistedCertificate::is_active)
            .map(reconstruct))
    }

    /// Revokes the certificate authority by serial.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] / [`Error::AlreadyRevoked`].
    pub fn revoke_certificate_authority(&self, serial: SerialNumber) -> Result<()> {
        let _guard = self.write_lock.lock();
        info!("Revoking certificate authority: {}", serial);
        self.store.revoke_singleton(SingletonRole::Ca, serial)
    }

    /// Revokes the server certificate by serial.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] / [`Error::AlreadyRevoked`].
    pub fn revoke_server_certificate(&self, serial: SerialNumber) -> Result<()> {
        let _guard = self.write_lock.lock();
        info!("Revoking server certificate: {}", serial);
        self.store.revoke_singleton(SingletonRole::Server, serial)
    }

    /// Revokes a client certificate by serial.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] / [`Error::AlreadyRevoked`].
    pub fn revoke_client_certificate(&self, serial: SerialNumber) -> Result<()> {
        let _guard = self.write_lock.lock();
        info!("Revoking client certificate: {}", serial);
        self.store.revoke_client(serial)
    }

    /// Exports the client certificate with the given serial as a
    /// password-protected PKCS#12 bundle. The CA certificate and, when
    /// present, the active server certificate ride along as trust
    /// anchors so supplicants can install the full chain in one import.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown or revoked serial,
    /// [`Error::MissingPrivateKey`] when only the public certificate is
    /// held, [`Error::MissingDependency`] when no CA exists.
    pub fn export_client_pkcs12(
        &self,
        serial: SerialNumber,
        password: &str,
    ) -> Result<Vec<u8>> {
        info!("Exporting client certificate as PKCS#12: {}", serial);

        let client = self
            .client_by_serial(serial)?
            .ok_or_else(|| Error::NotFound(serial.to_string()))?;
        let key = client
            .private_key()
            .ok_or_else(|| Error::MissingPrivateKey(client.subject().to_string()))?;
        let ca = self
            .certificate_authority()?
            .ok_or_else(|| Error::MissingDependency(SingletonRole::Ca.to_string()))?;

        let mut builder = PfxBuilder::new(client.der().to_vec(), key.der().to_vec())
            .trust_anchor(ca.der().to_vec());
        if let Some(server) = self.server_certificate()? {
            builder = builder.trust_anchor(server.der().to_vec());
        }

        Ok(builder.build(password)?)
    }

    /// Exports the active server certificate as a password-protected
    /// PKCS#12 bundle with the CA as trust anchor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no active server certificate
    /// exists, [`Error::MissingPrivateKey`] / [`Error::MissingDependency`]
    /// as for client export.
    pub fn export_server_pkcs12(&self, password: &str) -> Result<Vec<u8>> {
        info!("Exporting server certificate as PKCS#12");

        let server = self
            .server_certificate()?
            .ok_or_else(|| Error::NotFound(SingletonRole::Server.to_string()))?;
        let key = server
            .private_key()
            .ok_or_else(|| Error::MissingPrivateKey(server.subject().to_string()))?;
        let ca = self
            .certificate_authority()?
            .ok_or_else(|| Error::MissingDependency(SingletonRole::Ca.to_string()))?;

        let builder = PfxBuilder::new(server.der().to_vec(), key.der().to_vec())
            .trust_anchor(ca.der().to_vec());
        Ok(builder.build(password)?)
    }

    /// Loads the active CA and requires its private key for signing.
    fn require_ca(&self) -> Result<Certificate> {
        let row = self
            .store
            .get_singleton(SingletonRole::Ca)?
            .ok_or_else(|| Error::MissingDependency(SingletonRole::Ca.to_string()))?;
        if row.private_key_ber.is_none() {
            return Err(Error::MissingPrivateKey(SingletonRole::Ca.to_string()));
        }
        Ok(reconstruct(row))
    }
}

impl std::fmt::Debug for CertificateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateManager").finish_non_exhaustive()
    }
}

/// Projects a certificate into its persisted row.
fn persist(cert: &Certificate) -> PersistedCertificate {
    PersistedCertificate {
        cert_ber: cert.der().to_vec(),
        private_key_ber: cert.private_key().map(|key| key.der().to_vec()),
        metadata: cert.metadata(),
        revoked_at: None,
    }
}

/// Rebuilds a certificate value from its persisted row.
fn reconstruct(row: PersistedCertificate) -> Certificate {
    Certificate::new(
        row.cert_ber,
        row.metadata.subject,
        row.metadata.issuer,
        row.metadata.serial_number,
        row.metadata.not_before,
        row.metadata.not_after,
        row.private_key_ber.map(PrivateKey::new),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryCertStore;
    use crate::validation;

    fn manager() -> CertificateManager {
        CertificateManager::new(Arc::new(MemoryCertStore::new()))
    }

    fn rdn(cn: &str) -> Rdn {
        Rdn::new(cn, "Example").unwrap()
    }

    fn with_ca(mgr: &CertificateManager) -> Certificate {
        mgr.create_certificate_authority(rdn("Example Root CA"), 3650, KeyParams::EcdsaP256)
            .unwrap()
    }

    #[test]
    fn ca_lifecycle() {
        let mgr = manager();
        assert!(mgr.certificate_authority().unwrap().is_none());

        let ca = with_ca(&mgr);
        assert_eq!(ca.subject(), ca.issuer());

        let loaded = mgr.certificate_authority().unwrap().unwrap();
        assert_eq!(loaded.serial_number(), ca.serial_number());
        assert!(loaded.has_private_key());
    }

    #[test]
    fn second_ca_rejected_while_active() {
        let mgr = manager();
        with_ca(&mgr);

        let result =
            mgr.create_certificate_authority(rdn("Another CA"), 3650, KeyParams::EcdsaP256);
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
    }

    #[test]
    fn revoked_ca_not_returned_but_replaceable() {
        let mgr = manager();
        let ca = with_ca(&mgr);

        mgr.revoke_certificate_authority(ca.serial_number()).unwrap();
        assert!(mgr.certificate_authority().unwrap().is_none());

        // History is retained; a fresh CA can be created.
        with_ca(&mgr);
    }

    #[test]
    fn revoke_ca_twice_fails() {
        let mgr = manager();
        let ca = with_ca(&mgr);

        mgr.revoke_certificate_authority(ca.serial_number()).unwrap();
        let result = mgr.revoke_certificate_authority(ca.serial_number());
        assert!(matches!(result, Err(Error::AlreadyRevoked(_))));
    }

    #[test]
    fn server_requires_ca_and_leaves_no_orphan() {
        let mgr = manager();
        let result =
            mgr.create_server_certificate(rdn("radius.example.org"), 365, KeyParams::EcdsaP256);
        assert!(matches!(result, Err(Error::MissingDependency(_))));
        assert!(mgr.server_certificate().unwrap().is_none());
    }

    #[test]
    fn client_requires_ca() {
        let mgr = manager();
        let result = mgr.create_client_certificate(rdn("client-1"), 365, KeyParams::EcdsaP256);
        assert!(matches!(result, Err(Error::MissingDependency(_))));
        assert!(mgr.client_certificates().unwrap().is_empty());
    }

    #[test]
    fn server_chains_to_ca() {
        let mgr = manager();
        let ca = with_ca(&mgr);
        let server = mgr
            .create_server_certificate(rdn("radius.example.org"), 365, KeyParams::EcdsaP256)
            .unwrap();

        assert_eq!(server.issuer(), ca.subject());
        validation::validate_chain(&[server, ca]).unwrap();
    }

    #[test]
    fn second_server_rejected_while_active() {
        let mgr = manager();
        with_ca(&mgr);
        mgr.create_server_certificate(rdn("radius.example.org"), 365, KeyParams::EcdsaP256)
            .unwrap();

        let result =
            mgr.create_server_certificate(rdn("radius2.example.org"), 365, KeyParams::EcdsaP256);
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
    }

    #[test]
    fn clients_are_unbounded_and_listable() {
        let mgr = manager();
        let ca = with_ca(&mgr);

        for i in 0..3 {
            let client = mgr
                .create_client_certificate(rdn(&format!("client-{i}")), 365, KeyParams::EcdsaP256)
                .unwrap();
            assert_eq!(client.issuer(), ca.subject());
        }

        assert_eq!(mgr.client_certificates().unwrap().len(), 3);
    }

    #[test]
    fn client_lookup_by_serial_filters_revoked() {
        let mgr = manager();
        with_ca(&mgr);
        let client = mgr
            .create_client_certificate(rdn("client-1"), 365, KeyParams::EcdsaP256)
            .unwrap();
        let serial = client.serial_number();

        assert!(mgr.client_by_serial(serial).unwrap().is_some());

        mgr.revoke_client_certificate(serial).unwrap();
        assert!(mgr.client_by_serial(serial).unwrap().is_none());
        assert!(mgr.client_certificates().unwrap().is_empty());

        let result = mgr.revoke_client_certificate(serial);
        assert!(matches!(result, Err(Error::AlreadyRevoked(_))));
    }

    #[test]
    fn revoke_unknown_serial() {
        let mgr = manager();
        with_ca(&mgr);
        let result = mgr.revoke_client_certificate(SerialNumber::generate());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn export_client_bundle_contains_chain() {
        let mgr = manager();
        with_ca(&mgr);
        mgr.create_server_certificate(rdn("radius.example.org"), 365, KeyParams::EcdsaP256)
            .unwrap();
        let client = mgr
            .create_client_certificate(rdn("client-1"), 365, KeyParams::EcdsaP256)
            .unwrap();

        let pfx = mgr
            .export_client_pkcs12(client.serial_number(), "test1234")
            .unwrap();

        let contents = radcert_pkcs12::parse_pfx(&pfx, "test1234").unwrap();
        // client leaf first, then CA and server anchors
        assert_eq!(contents.certificates.len(), 3);
        assert_eq!(contents.certificates[0], client.der());
        assert_eq!(contents.private_keys.len(), 1);
    }

    #[test]
    fn export_server_bundle() {
        let mgr = manager();
        with_ca(&mgr);
        let server = mgr
            .create_server_certificate(rdn("radius.example.org"), 365, KeyParams::EcdsaP256)
            .unwrap();

        let pfx = mgr.export_server_pkcs12("test1234").unwrap();
        let contents = radcert_pkcs12::parse_pfx(&pfx, "test1234").unwrap();
        assert_eq!(contents.certificates.len(), 2);
        assert_eq!(contents.certificates[0], server.der());
    }

    #[test]
    fn export_unknown_client_serial() {
        let mgr = manager();
        with_ca(&mgr);
        let result =
            mgr.export_client_pkcs12(SerialNumber::generate(), "test1234");
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn export_server_without_server() {
        let mgr = manager();
        with_ca(&mgr);
        let result = mgr.export_server_pkcs12("test1234");
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
