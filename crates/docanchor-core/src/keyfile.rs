//! PEM key files.
//!
//! Private keys are stored as PKCS#8 PEM, public keys as SubjectPublicKeyInfo
//! PEM, for both supported curves.

use k256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::crypto::{Curve, Keypair, PublicKey};
use crate::error::{CoreError, Result};

/// Generate a key pair on `curve` and persist it to the two paths.
///
/// The public key is written first. If the private key cannot be written the
/// public key file is removed again, so a failed call leaves no half pair.
pub fn generate_key_pair(curve: Curve, public_path: &Path, private_path: &Path) -> Result<Keypair> {
    let keypair = Keypair::generate(curve);
    let public_pem = public_key_pem(&keypair)?;
    let private_pem = private_key_pem(&keypair)?;

    write_file(public_path, public_pem.as_bytes(), false)?;
    if let Err(e) = write_file(private_path, private_pem.as_bytes(), true) {
        let _ = fs::remove_file(public_path);
        return Err(e);
    }

    tracing::debug!(
        curve = %curve,
        public = %public_path.display(),
        private = %private_path.display(),
        "generated key pair"
    );
    Ok(keypair)
}

/// Write the private key of `keypair` to `path`.
pub fn write_private_key(keypair: &Keypair, path: &Path) -> Result<()> {
    write_file(path, private_key_pem(keypair)?.as_bytes(), true)
}

/// Write the public key of `keypair` to `path`.
pub fn write_public_key(keypair: &Keypair, path: &Path) -> Result<()> {
    write_file(path, public_key_pem(keypair)?.as_bytes(), false)
}

/// Read a PKCS#8 PEM private key for `curve`.
pub fn read_private_key(path: &Path, curve: Curve) -> Result<Keypair> {
    let pem = read_file(path)?;
    match curve {
        Curve::Secp256k1 => k256::ecdsa::SigningKey::from_pkcs8_pem(&pem)
            .map(Keypair::from_secp256k1)
            .map_err(|e| CoreError::InvalidKey(format!("{}: {}", path.display(), e))),
        Curve::Ed25519 => ed25519_dalek::SigningKey::from_pkcs8_pem(&pem)
            .map(Keypair::from_ed25519)
            .map_err(|e| CoreError::InvalidKey(format!("{}: {}", path.display(), e))),
    }
}

/// Read a SubjectPublicKeyInfo PEM public key for `curve`.
pub fn read_public_key(path: &Path, curve: Curve) -> Result<PublicKey> {
    let pem = read_file(path)?;
    match curve {
        Curve::Secp256k1 => k256::ecdsa::VerifyingKey::from_public_key_pem(&pem)
            .map(|key| PublicKey::from_secp256k1(&key))
            .map_err(|e| CoreError::InvalidKey(format!("{}: {}", path.display(), e))),
        Curve::Ed25519 => ed25519_dalek::VerifyingKey::from_public_key_pem(&pem)
            .map(|key| PublicKey {
                curve: Curve::Ed25519,
                bytes: key.to_bytes().to_vec(),
            })
            .map_err(|e| CoreError::InvalidKey(format!("{}: {}", path.display(), e))),
    }
}

fn private_key_pem(keypair: &Keypair) -> Result<String> {
    let pem = match (keypair.secp256k1(), keypair.ed25519()) {
        (Some(key), _) => key.to_pkcs8_pem(LineEnding::LF),
        (_, Some(key)) => key.to_pkcs8_pem(LineEnding::LF),
        (None, None) => return Err(CoreError::InvalidKey("empty key pair".into())),
    };
    pem.map(|s| s.as_str().to_owned())
        .map_err(|e| CoreError::InvalidKey(e.to_string()))
}

fn public_key_pem(keypair: &Keypair) -> Result<String> {
    let pem = match (keypair.secp256k1(), keypair.ed25519()) {
        (Some(key), _) => key.verifying_key().to_public_key_pem(LineEnding::LF),
        (_, Some(key)) => key.verifying_key().to_public_key_pem(LineEnding::LF),
        (None, None) => return Err(CoreError::InvalidKey("empty key pair".into())),
    };
    pem.map_err(|e| CoreError::InvalidKey(e.to_string()))
}

fn write_file(path: &Path, contents: &[u8], private: bool) -> Result<()> {
    let key_file_err = |source| CoreError::KeyFile {
        path: path.to_path_buf(),
        source,
    };

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if private {
            options.mode(0o600);
        }
    }
    #[cfg(not(unix))]
    let _ = private;

    let mut file = options.open(path).map_err(key_file_err)?;
    file.write_all(contents).map_err(key_file_err)?;
    file.sync_all().map_err(key_file_err)
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| CoreError::KeyFile {
        path: path.to_path_buf(),
        source,
    })
}
