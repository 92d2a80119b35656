//! Extraction of the gitolite principal from an OpenSSH user certificate.
//!
//! Only the fields leading up to and including `valid principals` are read.
//! The signature is not checked, sshd has already accepted the certificate by
//! the time we look at it. The wire format is described in
//! [PROTOCOL.certkeys](https://cvsweb.openbsd.org/src/usr.bin/ssh/PROTOCOL.certkeys).

use crate::buffer::{ByteBuffer, OutOfBounds};
use std::fmt;

/// Principals carrying this prefix name a gitolite user.
pub const PRINCIPAL_PREFIX: &[u8] = b"gitolite:";

/// uint64 serial followed by uint32 type.
const SERIAL_AND_TYPE_LEN: usize = 12;
const LENGTH_PREFIX_LEN: usize = 4;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// A field is truncated or claims more bytes than the certificate holds.
    MalformedCertificate { field: &'static str },
    /// The leading type tag is not one of the certificate types we know of.
    UnsupportedCertificateType { tag: ByteBuffer },
    /// The part of a gitolite principal after the prefix is not valid UTF-8.
    InvalidPrincipal,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedCertificate { field } => {
                write!(f, "malformed certificate: field '{field}' is truncated")
            }
            Error::UnsupportedCertificateType { tag } => {
                write!(f, "certificate type '{}' not supported", tag.to_string_lossy())
            }
            Error::InvalidPrincipal => write!(f, "gitolite principal is not valid UTF-8"),
        }
    }
}

impl std::error::Error for Error {}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CertificateType {
    Rsa,
    Dsa,
    EcdsaP256,
    EcdsaP384,
    EcdsaP521,
    Ed25519,
}

impl CertificateType {
    pub const ALL: [CertificateType; 6] = [
        CertificateType::Rsa,
        CertificateType::Dsa,
        CertificateType::EcdsaP256,
        CertificateType::EcdsaP384,
        CertificateType::EcdsaP521,
        CertificateType::Ed25519,
    ];

    pub fn tag(self) -> &'static [u8] {
        match self {
            CertificateType::Rsa => b"ssh-rsa-cert-v01@openssh.com",
            CertificateType::Dsa => b"ssh-dss-cert-v01@openssh.com",
            CertificateType::EcdsaP256 => b"ecdsa-sha2-nistp256-cert-v01@openssh.com",
            CertificateType::EcdsaP384 => b"ecdsa-sha2-nistp384-cert-v01@openssh.com",
            CertificateType::EcdsaP521 => b"ecdsa-sha2-nistp521-cert-v01@openssh.com",
            CertificateType::Ed25519 => b"ssh-ed25519-cert-v01@openssh.com",
        }
    }

    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    /// The length-prefixed fields between the type tag and the serial.
    /// `mpint` fields have the same shape as strings and are skipped the same way.
    fn preamble(self) -> &'static [&'static str] {
        match self {
            CertificateType::Rsa => &["nonce", "e", "n"],
            CertificateType::Dsa => &["nonce", "p", "q", "g", "y"],
            CertificateType::EcdsaP256 | CertificateType::EcdsaP384 | CertificateType::EcdsaP521 => {
                &["nonce", "curve", "public_key"]
            }
            CertificateType::Ed25519 => &["nonce", "pk"],
        }
    }
}

impl fmt::Display for CertificateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.tag()))
    }
}

pub fn is_supported_certificate_type(tag: &[u8]) -> bool {
    CertificateType::from_tag(tag).is_some()
}

/// Walks length-prefixed fields front to back. Every read is bounds checked
/// against the underlying buffer before the cursor moves.
struct FieldReader<'a> {
    data: &'a ByteBuffer,
    offset: usize,
}

impl<'a> FieldReader<'a> {
    fn new(data: &'a ByteBuffer) -> Self {
        FieldReader { data, offset: 0 }
    }

    fn is_finished(&self) -> bool {
        self.offset >= self.data.len()
    }

    fn read_length(&self, field: &'static str) -> Result<usize> {
        let prefix = self
            .data
            .slice(self.offset, LENGTH_PREFIX_LEN)
            .map_err(|_| Error::MalformedCertificate { field })?;
        let mut be = [0_u8; LENGTH_PREFIX_LEN];
        be.copy_from_slice(prefix.as_bytes());
        usize::try_from(u32::from_be_bytes(be)).map_err(|_| Error::MalformedCertificate { field })
    }

    fn read_string(&mut self, field: &'static str) -> Result<ByteBuffer> {
        let len = self.read_length(field)?;
        let start = self.offset + LENGTH_PREFIX_LEN;
        let value = self
            .data
            .slice(start, len)
            .map_err(|_: OutOfBounds| Error::MalformedCertificate { field })?;
        self.offset = start + len;
        Ok(value)
    }

    fn skip_string(&mut self, field: &'static str) -> Result<()> {
        self.read_string(field).map(drop)
    }

    fn skip_bytes(&mut self, len: usize, field: &'static str) -> Result<()> {
        self.data
            .slice(self.offset, len)
            .map_err(|_| Error::MalformedCertificate { field })?;
        self.offset += len;
        Ok(())
    }
}

/// Locates the `valid principals` field of a decoded certificate.
///
/// Returns the certificate type together with the raw field, which is a
/// concatenation of length-prefixed strings.
pub fn valid_principals(certificate: &ByteBuffer) -> Result<(CertificateType, ByteBuffer)> {
    let mut reader = FieldReader::new(certificate);
    let tag = reader.read_string("type")?;
    let cert_type = CertificateType::from_tag(tag.as_bytes())
        .ok_or_else(|| Error::UnsupportedCertificateType { tag: tag.compact() })?;

    for &field in cert_type.preamble() {
        reader.skip_string(field)?;
    }
    reader.skip_bytes(SERIAL_AND_TYPE_LEN, "serial")?;
    reader.skip_string("key id")?;
    let principals = reader.read_string("valid principals")?;
    Ok((cert_type, principals))
}

/// Iterator over the principals in a `valid principals` field.
///
/// Yields an error and then stops if a principal runs past the end of the
/// field.
pub struct Principals<'a> {
    reader: FieldReader<'a>,
    failed: bool,
}

impl<'a> Principals<'a> {
    pub fn new(field: &'a ByteBuffer) -> Self {
        Principals {
            reader: FieldReader::new(field),
            failed: false,
        }
    }
}

impl Iterator for Principals<'_> {
    type Item = Result<ByteBuffer>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.reader.is_finished() {
            return None;
        }
        let principal = self.reader.read_string("principal");
        self.failed = principal.is_err();
        Some(principal)
    }
}

/// Returns the user name of the first `gitolite:` principal in the
/// certificate, or `None` if there is no such principal.
///
/// Principals consisting of only the prefix are skipped.
pub fn extract_principal(certificate: &ByteBuffer) -> Result<Option<String>> {
    let (_, field) = valid_principals(certificate)?;
    let prefix = ByteBuffer::from_bytes(PRINCIPAL_PREFIX);
    for principal in Principals::new(&field) {
        let principal = principal?;
        if principal.len() > prefix.len() && principal.starts_with(&prefix) {
            let user = principal
                .slice(prefix.len(), principal.len() - prefix.len())
                .map_err(|_| Error::MalformedCertificate { field: "principal" })?;
            let user = user.to_str().map_err(|_| Error::InvalidPrincipal)?;
            return Ok(Some(user.to_owned()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use crate::buffer::ByteBuffer;
    use crate::certificate::{
        extract_principal, is_supported_certificate_type, valid_principals, CertificateType,
        Error, Principals,
    };
    use crate::test::{cert_blob, CertBuilder};

    #[test]
    fn test_rsa() -> anyhow::Result<()> {
        let cert = CertBuilder::new(CertificateType::Rsa)
            .principal("gitolite:alice")
            .build();
        assert_eq!(Some("alice".to_string()), extract_principal(&cert)?);
        Ok(())
    }

    #[test]
    fn test_all_types() -> anyhow::Result<()> {
        for cert_type in CertificateType::ALL {
            let cert = CertBuilder::new(cert_type)
                .principal("admin")
                .principal("gitolite:carol")
                .build();
            let (found_type, _) = valid_principals(&cert)?;
            assert_eq!(cert_type, found_type);
            assert_eq!(
                Some("carol".to_string()),
                extract_principal(&cert)?,
                "{cert_type}"
            );
        }
        Ok(())
    }

    #[test]
    fn test_real_certificates() -> anyhow::Result<()> {
        for (name, cert_type, user) in [
            ("id_rsa-cert.pub", CertificateType::Rsa, "alice"),
            ("id_dsa-cert.pub", CertificateType::Dsa, "alice"),
            ("id_ecdsa-256-cert.pub", CertificateType::EcdsaP256, "alice"),
            ("id_ecdsa-384-cert.pub", CertificateType::EcdsaP384, "alice"),
            ("id_ecdsa-521-cert.pub", CertificateType::EcdsaP521, "alice"),
            ("id_ed25519-cert.pub", CertificateType::Ed25519, "bob"),
        ] {
            let cert = cert_blob(name)?;
            let (found_type, field) = valid_principals(&cert)?;
            assert_eq!(cert_type, found_type, "{name}");
            let principals: Vec<ByteBuffer> = Principals::new(&field).collect::<Result<_, _>>()?;
            assert_eq!(2, principals.len(), "{name}");
            assert_eq!(b"admin", principals[0].as_bytes());
            assert_eq!(Some(user.to_string()), extract_principal(&cert)?, "{name}");
        }
        Ok(())
    }

    #[test]
    fn test_no_gitolite_principal() -> anyhow::Result<()> {
        let cert = CertBuilder::new(CertificateType::Ed25519)
            .principal("someone-else")
            .build();
        assert_eq!(None, extract_principal(&cert)?);

        let cert = cert_blob("id_nogitolite-cert.pub")?;
        assert_eq!(None, extract_principal(&cert)?);
        Ok(())
    }

    #[test]
    fn test_empty_principals() -> anyhow::Result<()> {
        let cert = CertBuilder::new(CertificateType::EcdsaP384).build();
        let (_, field) = valid_principals(&cert)?;
        assert!(field.is_empty());
        assert_eq!(None, extract_principal(&cert)?);
        Ok(())
    }

    #[test]
    fn test_bare_prefix_is_skipped() -> anyhow::Result<()> {
        let cert = CertBuilder::new(CertificateType::Ed25519)
            .principal("gitolite:")
            .principal("gitolite")
            .principal("gitolite:dave")
            .principal("gitolite:erin")
            .build();
        assert_eq!(Some("dave".to_string()), extract_principal(&cert)?);
        Ok(())
    }

    #[test]
    fn test_invalid_utf8_principal() {
        let cert = CertBuilder::new(CertificateType::Ed25519)
            .principal_bytes(b"gitolite:\xff\xfe")
            .build();
        assert_eq!(Err(Error::InvalidPrincipal), extract_principal(&cert));
    }

    #[test]
    fn test_unsupported_type() {
        let cert = CertBuilder::with_tag(b"ssh-rsa")
            .principal("gitolite:alice")
            .build();
        let err = extract_principal(&cert).unwrap_err();
        assert_eq!(
            Error::UnsupportedCertificateType {
                tag: ByteBuffer::from_bytes(b"ssh-rsa")
            },
            err
        );
        assert_eq!("certificate type 'ssh-rsa' not supported", err.to_string());
    }

    #[test]
    fn test_truncated_field() {
        let cert = CertBuilder::new(CertificateType::Rsa)
            .principal("gitolite:alice")
            .build();
        // Every strict prefix of a certificate that ends right after the
        // principals must be rejected, whichever field the cut lands in.
        for len in 0..cert.len() {
            let truncated = cert.slice(0, len).expect("prefix");
            assert!(
                matches!(
                    extract_principal(&truncated),
                    Err(Error::MalformedCertificate { .. })
                ),
                "prefix of length {len} was accepted"
            );
        }
    }

    #[test]
    fn test_oversized_lengths() {
        let cert = CertBuilder::new(CertificateType::Ed25519)
            .raw_nonce(&[0xff, 0xff, 0xff, 0xff])
            .principal("gitolite:alice")
            .build();
        assert_eq!(
            Err(Error::MalformedCertificate { field: "nonce" }),
            extract_principal(&cert)
        );

        let cert = CertBuilder::new(CertificateType::Ed25519)
            .raw_principal(&[0, 0, 0, 20, b'x'])
            .principal("gitolite:alice")
            .build();
        assert_eq!(
            Err(Error::MalformedCertificate { field: "principal" }),
            extract_principal(&cert)
        );
    }

    #[test]
    fn test_principals_iterator_stops_after_error() {
        let field = ByteBuffer::from_bytes(b"\0\0\0\x01a\0\0\0\x09b");
        let mut principals = Principals::new(&field);
        assert_eq!(Some(Ok(ByteBuffer::from_bytes(b"a"))), principals.next());
        assert!(matches!(principals.next(), Some(Err(_))));
        assert_eq!(None, principals.next());
    }

    #[test]
    fn test_idempotent() -> anyhow::Result<()> {
        let cert = cert_blob("id_ecdsa-521-cert.pub")?;
        assert_eq!(extract_principal(&cert)?, extract_principal(&cert)?);
        Ok(())
    }

    #[test]
    fn test_is_supported_certificate_type() {
        for cert_type in CertificateType::ALL {
            assert!(is_supported_certificate_type(cert_type.tag()));
            assert_eq!(Some(cert_type), CertificateType::from_tag(cert_type.tag()));
        }
        assert!(!is_supported_certificate_type(b"ssh-ed25519"));
        assert!(!is_supported_certificate_type(b"ssh-rsa"));
        assert!(!is_supported_certificate_type(b"ssh-ed25519-cert-v01@openssh.co"));
        assert!(!is_supported_certificate_type(b""));
    }
}
