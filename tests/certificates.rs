use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use gitolite_wrapper::certificate::{valid_principals, CertificateType, Principals};
use gitolite_wrapper::{extract_principal, ByteBuffer};
use ssh_key::Certificate;

// Generated with `ssh-keygen -s user_ca_key -V '-10m:+520w' -I 'abcdef' -z 1 -n admin,gitolite:alice id_rsa.pub`
// and the same for the other key types. The ed25519 certificate is for gitolite:bob.
const CERTIFICATES: [(&str, CertificateType); 6] = [
    (include_str!("data/id_rsa-cert.pub"), CertificateType::Rsa),
    (include_str!("data/id_dsa-cert.pub"), CertificateType::Dsa),
    (include_str!("data/id_ecdsa-256-cert.pub"), CertificateType::EcdsaP256),
    (include_str!("data/id_ecdsa-384-cert.pub"), CertificateType::EcdsaP384),
    (include_str!("data/id_ecdsa-521-cert.pub"), CertificateType::EcdsaP521),
    (include_str!("data/id_ed25519-cert.pub"), CertificateType::Ed25519),
];

fn blob(openssh: &str) -> anyhow::Result<ByteBuffer> {
    let encoded = openssh
        .split_whitespace()
        .nth(1)
        .ok_or(anyhow::anyhow!("no key data"))?;
    Ok(ByteBuffer::from_vec(BASE64_STANDARD.decode(encoded)?))
}

/// The principals we find must be exactly the ones ssh-key finds.
#[test]
fn test_principals_match_ssh_key() -> anyhow::Result<()> {
    for (openssh, cert_type) in CERTIFICATES {
        let reference = Certificate::from_openssh(openssh)?;
        let cert = blob(openssh)?;

        let (found_type, field) = valid_principals(&cert)?;
        assert_eq!(cert_type, found_type);

        let principals = Principals::new(&field)
            .map(|p| Ok(p?.to_str()?.to_string()))
            .collect::<anyhow::Result<Vec<String>>>()?;
        assert_eq!(reference.valid_principals(), principals.as_slice());

        let expected = reference
            .valid_principals()
            .iter()
            .find_map(|p| p.strip_prefix("gitolite:"))
            .map(str::to_string);
        assert_eq!(expected, extract_principal(&cert)?);
    }
    Ok(())
}

#[test]
fn test_no_gitolite_principal() -> anyhow::Result<()> {
    let openssh = include_str!("data/id_nogitolite-cert.pub");
    let reference = Certificate::from_openssh(openssh)?;
    assert_eq!(
        vec!["admin".to_string(), "someone-else".to_string()],
        reference.valid_principals()
    );
    assert_eq!(None, extract_principal(&blob(openssh)?)?);
    Ok(())
}
