//! X.509 certificate construction and signing.

use chrono::{DateTime, Duration, Utc};
use rcgen::{
    BasicConstraints, BmpString, CertificateParams, CustomExtension, DnType, DnValue, IsCa,
    KeyPair, KeyUsagePurpose,
};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{
    Certificate, ExtendedKeyUsages, KeyParams, KeyUsages, PrivateKey, Rdn, SerialNumber,
};

/// id-ce-extKeyUsage. Emitted as a custom extension so it can be marked
/// critical; the stock extension is always non-critical.
const OID_EXT_KEY_USAGE: &[u64] = &[2, 5, 29, 37];

/// Builds and signs X.509 v3 certificates.
///
/// Key usages and extended key usages are emitted as critical
/// extensions with exact bit positions; subject and issuer names are
/// BMPString-encoded `{CN, O}` pairs as 802.1X supplicants expect.
pub struct CertificateBuilder {
    subject: Rdn,
    key_params: KeyParams,
    key_usages: KeyUsages,
    extended_key_usages: ExtendedKeyUsages,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
}

impl CertificateBuilder {
    /// Creates a builder for the given subject with a one-year validity
    /// window (starting one hour in the past for clock skew) and no
    /// usages set.
    #[must_use]
    pub fn new(subject: Rdn) -> Self {
        let now = Utc::now();
        Self {
            subject,
            key_params: KeyParams::EcdsaP256,
            key_usages: KeyUsages::default(),
            extended_key_usages: ExtendedKeyUsages::default(),
            not_before: now - Duration::hours(1),
            not_after: now + Duration::days(365),
        }
    }

    /// Sets the key generation parameters.
    #[must_use]
    pub const fn key_params(mut self, params: KeyParams) -> Self {
        self.key_params = params;
        self
    }

    /// Sets the KeyUsage flags.
    #[must_use]
    pub const fn key_usages(mut self, usages: KeyUsages) -> Self {
        self.key_usages = usages;
        self
    }

    /// Sets the ExtendedKeyUsage flags.
    #[must_use]
    pub const fn extended_key_usages(mut self, usages: ExtendedKeyUsages) -> Self {
        self.extended_key_usages = usages;
        self
    }

    /// Sets an explicit validity window.
    #[must_use]
    pub const fn validity(mut self, not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> Self {
        self.not_before = not_before;
        self.not_after = not_after;
        self
    }

    /// Sets the window to `[now - 1h, now + days]`.
    #[must_use]
    pub fn validity_days(mut self, days: u32) -> Self {
        let now = Utc::now();
        self.not_before = now - Duration::hours(1);
        self.not_after = now + Duration::days(i64::from(days));
        self
    }

    /// Builds and self-signs a CA certificate (`BasicConstraints cA=TRUE`).
    ///
    /// # Errors
    ///
    /// Returns an error on invalid validity window, key generation
    /// failure, or signing failure.
    pub fn self_signed(self) -> Result<Certificate> {
        info!("Building self-signed certificate for: {}", self.subject);

        let key_pair = generate_key_pair(self.key_params)?;
        let mut params = self.params(IsCa::Ca(BasicConstraints::Unconstrained))?;
        let serial = SerialNumber::generate();
        params.serial_number = Some(rcgen::SerialNumber::from(serial.as_bytes().to_vec()));

        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| Error::Signing(format!("failed to self-sign certificate: {e}")))?;

        debug!("Self-signed certificate built for: {}", self.subject);

        Ok(Certificate::new(
            cert.der().to_vec(),
            self.subject.clone(),
            self.subject,
            serial,
            self.not_before,
            self.not_after,
            Some(PrivateKey::new(key_pair.serialize_der())),
        ))
    }

    /// Builds an end-entity certificate signed by `issuer`, which must
    /// hold its private key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingPrivateKey`] if the issuer certificate
    /// carries no key, or any build/sign failure.
    pub fn signed_by(self, issuer: &Certificate) -> Result<Certificate> {
        info!(
            "Building certificate for: {} signed by: {}",
            self.subject,
            issuer.subject()
        );

        let issuer_key_der = issuer
            .private_key()
            .ok_or_else(|| Error::MissingPrivateKey(issuer.subject().to_string()))?
            .der()
            .to_vec();
        let issuer_key = KeyPair::try_from(issuer_key_der.as_slice())
            .map_err(|e| Error::Parse(format!("failed to parse issuer key: {e}")))?;
        let issuer_cert = rebuild_issuer(issuer, &issuer_key)?;

        let key_pair = generate_key_pair(self.key_params)?;
        let mut params = self.params(IsCa::ExplicitNoCa)?;
        let serial = SerialNumber::generate();
        params.serial_number = Some(rcgen::SerialNumber::from(serial.as_bytes().to_vec()));
        params.use_authority_key_identifier_extension = true;

        let cert = params
            .signed_by(&key_pair, &issuer_cert, &issuer_key)
            .map_err(|e| Error::Signing(format!("failed to sign certificate: {e}")))?;

        debug!("Certificate built for: {}", self.subject);

        Ok(Certificate::new(
            cert.der().to_vec(),
            self.subject,
            issuer.subject().clone(),
            serial,
            self.not_before,
            self.not_after,
            Some(PrivateKey::new(key_pair.serialize_der())),
        ))
    }

    /// Assembles the shared certificate parameters.
    fn params(&self, is_ca: IsCa) -> Result<CertificateParams> {
        if self.not_before > self.not_after {
            return Err(Error::Validation(format!(
                "notBefore {} is after notAfter {}",
                self.not_before, self.not_after
            )));
        }

        let mut params = CertificateParams::default();
        push_bmp_dn(&mut params, &self.subject)?;
        params.is_ca = is_ca;
        params.key_usages = key_usage_purposes(self.key_usages);
        if !self.extended_key_usages.is_empty() {
            params
                .custom_extensions
                .push(critical_eku_extension(self.extended_key_usages));
        }
        params.not_before = to_rcgen_time(self.not_before)?;
        params.not_after = to_rcgen_time(self.not_after)?;

        Ok(params)
    }
}

/// Generates a key pair for the given parameters. EC keys come from
/// rcgen's ring backend; RSA keys are generated with the `rsa` crate
/// and imported through PKCS#8.
fn generate_key_pair(params: KeyParams) -> Result<KeyPair> {
    match params {
        KeyParams::EcdsaP256 => KeyPair::generate()
            .map_err(|e| Error::Generation(format!("failed to generate P-256 key: {e}"))),
        KeyParams::EcdsaP384 => KeyPair::generate_for(&rcgen::PKCS_ECDSA_P384_SHA384)
            .map_err(|e| Error::Generation(format!("failed to generate P-384 key: {e}"))),
        KeyParams::Rsa2048 => generate_rsa_key_pair(2048),
        KeyParams::Rsa3072 => generate_rsa_key_pair(3072),
    }
}

fn generate_rsa_key_pair(bits: usize) -> Result<KeyPair> {
    use rsa::pkcs8::EncodePrivateKey;

    let mut rng = rand::thread_rng();
    let key = rsa::RsaPrivateKey::new(&mut rng, bits)
        .map_err(|e| Error::Generation(format!("failed to generate RSA-{bits} key: {e}")))?;
    let der = key
        .to_pkcs8_der()
        .map_err(|e| Error::Generation(format!("failed to encode RSA key: {e}")))?;
    KeyPair::try_from(der.as_bytes())
        .map_err(|e| Error::Generation(format!("failed to import RSA key: {e}")))
}

/// Rebuilds the issuer's rcgen certificate from its stored identity so
/// the issuer name in the signed certificate matches the CA's subject
/// encoding byte for byte.
fn rebuild_issuer(issuer: &Certificate, issuer_key: &KeyPair) -> Result<rcgen::Certificate> {
    let mut params = CertificateParams::default();
    push_bmp_dn(&mut params, issuer.subject())?;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = key_usage_purposes(crate::types::CertificateRole::Ca.key_usages());
    params.not_before = to_rcgen_time(issuer.not_before())?;
    params.not_after = to_rcgen_time(issuer.not_after())?;

    params
        .self_signed(issuer_key)
        .map_err(|e| Error::Signing(format!("failed to rebuild issuer certificate: {e}")))
}

/// Pushes the `{CN, O}` pair as BMPString attribute values.
fn push_bmp_dn(params: &mut CertificateParams, rdn: &Rdn) -> Result<()> {
    let cn = BmpString::try_from(rdn.common_name.as_str())
        .map_err(|e| Error::Validation(format!("invalid common name: {e}")))?;
    let org = BmpString::try_from(rdn.organization_name.as_str())
        .map_err(|e| Error::Validation(format!("invalid organization name: {e}")))?;
    params
        .distinguished_name
        .push(DnType::CommonName, DnValue::BmpString(cn));
    params
        .distinguished_name
        .push(DnType::OrganizationName, DnValue::BmpString(org));
    Ok(())
}

fn key_usage_purposes(usages: KeyUsages) -> Vec<KeyUsagePurpose> {
    let mut purposes = Vec::new();
    if usages.digital_signature {
        purposes.push(KeyUsagePurpose::DigitalSignature);
    }
    if usages.content_commitment {
        purposes.push(KeyUsagePurpose::ContentCommitment);
    }
    if usages.key_encipherment {
        purposes.push(KeyUsagePurpose::KeyEncipherment);
    }
    if usages.key_cert_sign {
        purposes.push(KeyUsagePurpose::KeyCertSign);
    }
    if usages.crl_sign {
        purposes.push(KeyUsagePurpose::CrlSign);
    }
    purposes
}

/// Encodes ExtendedKeyUsage as a critical custom extension, since the
/// stock extension cannot be marked critical.
fn critical_eku_extension(usages: ExtendedKeyUsages) -> CustomExtension {
    let content = yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            for oid in usages.oids() {
                writer
                    .next()
                    .write_oid(&yasna::models::ObjectIdentifier::from_slice(oid));
            }
        });
    });
    let mut ext = CustomExtension::from_oid_content(OID_EXT_KEY_USAGE, content);
    ext.set_criticality(true);
    ext
}

/// Converts a chrono `DateTime` to rcgen's `OffsetDateTime`.
fn to_rcgen_time(dt: DateTime<Utc>) -> Result<time::OffsetDateTime> {
    time::OffsetDateTime::from_unix_timestamp(dt.timestamp())
        .map_err(|e| Error::Generation(format!("invalid timestamp: {e}")))
}
