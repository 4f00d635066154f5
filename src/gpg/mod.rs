//! # OpenPGP signature verification
//!
//! The subset of OpenPGP needed to check a detached signature over a release
//! checksum manifest against a namespace's registered public keys:
//!
//! * ASCII armored or binary input
//! * v4 public keys and subkeys using RSA or EdDSA (Ed25519)
//! * v4 binary-document signatures hashed with SHA-256, SHA-384 or SHA-512
//!
//! A key verifies a signature when its primary key or any of its subkeys
//! does. Key fingerprints follow RFC 4880 section 12.2.

mod armor;
mod packet;

use ed25519_dalek::{Verifier, VerifyingKey};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Pkcs1v15Sign, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use thiserror::Error;

pub use armor::{dearmor, is_armored};
use packet::{Reader, TAG_PUBLIC_KEY, TAG_PUBLIC_SUBKEY, TAG_SIGNATURE, parse_packets};

const ALGO_RSA: u8 = 1;
const ALGO_RSA_SIGN_ONLY: u8 = 3;
const ALGO_EDDSA: u8 = 22;

const HASH_SHA256: u8 = 8;
const HASH_SHA384: u8 = 9;
const HASH_SHA512: u8 = 10;

const SIGNATURE_BINARY_DOCUMENT: u8 = 0x00;

/// DER encoding of OID 1.3.6.1.4.1.11591.15.1 (Ed25519 for legacy EdDSA)
const ED25519_OID: &[u8] = &[0x2B, 0x06, 0x01, 0x04, 0x01, 0xDA, 0x47, 0x0F, 0x01];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GpgError {
    #[error("invalid ASCII armor: {0}")]
    Armor(String),
    #[error("malformed OpenPGP packet: {0}")]
    Packet(String),
    #[error("unsupported OpenPGP feature: {0}")]
    Unsupported(String),
    #[error("no public key packet found")]
    MissingPublicKey,
    #[error("no signature packet found")]
    MissingSignature,
    #[error("invalid key material: {0}")]
    InvalidKey(String),
}

#[derive(Debug, Clone)]
enum KeyMaterial {
    Rsa(RsaPublicKey),
    Ed25519(VerifyingKey),
    /// Algorithms we can parse around but never verify with
    Unsupported(u8),
}

#[derive(Debug, Clone)]
struct KeyPacket {
    material: KeyMaterial,
    fingerprint: String,
}

impl KeyPacket {
    fn parse(body: &[u8]) -> Result<Self, GpgError> {
        let mut reader = Reader::new(body);
        let version = reader.u8()?;
        if version != 4 {
            return Err(GpgError::Unsupported(format!("v{version} public keys")));
        }
        let _created = reader.u32()?;
        let algorithm = reader.u8()?;

        let material = match algorithm {
            ALGO_RSA | ALGO_RSA_SIGN_ONLY => {
                let n = reader.mpi()?;
                let e = reader.mpi()?;
                let key = RsaPublicKey::new(BigUint::from_bytes_be(n), BigUint::from_bytes_be(e))
                    .map_err(|e| GpgError::InvalidKey(e.to_string()))?;
                KeyMaterial::Rsa(key)
            }
            ALGO_EDDSA => {
                let oid_len = usize::from(reader.u8()?);
                let oid = reader.take(oid_len)?;
                if oid != ED25519_OID {
                    KeyMaterial::Unsupported(algorithm)
                } else {
                    let point = reader.mpi()?;
                    // Native point format: 0x40 prefix followed by 32 bytes
                    let raw = point
                        .strip_prefix(&[0x40])
                        .and_then(|rest| <[u8; 32]>::try_from(rest).ok())
                        .ok_or_else(|| {
                            GpgError::InvalidKey("malformed Ed25519 public point".to_string())
                        })?;
                    let key = VerifyingKey::from_bytes(&raw)
                        .map_err(|e| GpgError::InvalidKey(e.to_string()))?;
                    KeyMaterial::Ed25519(key)
                }
            }
            other => KeyMaterial::Unsupported(other),
        };

        Ok(Self {
            material,
            fingerprint: fingerprint(body)?,
        })
    }

    fn verify(&self, signature: &DetachedSignature, digest: &[u8]) -> bool {
        match (&self.material, &signature.material) {
            (KeyMaterial::Rsa(key), SignatureMaterial::Rsa(value)) => {
                // The MPI drops leading zero bytes; PKCS#1 wants the full key width
                let size = key.size();
                if value.len() > size {
                    return false;
                }
                let mut padded = vec![0u8; size - value.len()];
                padded.extend_from_slice(value);
                let scheme = match signature.hash_algorithm {
                    HASH_SHA256 => Pkcs1v15Sign::new::<Sha256>(),
                    HASH_SHA384 => Pkcs1v15Sign::new::<Sha384>(),
                    HASH_SHA512 => Pkcs1v15Sign::new::<Sha512>(),
                    _ => return false,
                };
                key.verify(scheme, digest, &padded).is_ok()
            }
            (KeyMaterial::Ed25519(key), SignatureMaterial::EdDsa { r, s }) => {
                let (Some(r), Some(s)) = (left_pad::<32>(r), left_pad::<32>(s)) else {
                    return false;
                };
                let mut bytes = [0u8; 64];
                bytes[..32].copy_from_slice(&r);
                bytes[32..].copy_from_slice(&s);
                let sig = ed25519_dalek::Signature::from_bytes(&bytes);
                key.verify(digest, &sig).is_ok()
            }
            _ => false,
        }
    }
}

fn left_pad<const N: usize>(value: &[u8]) -> Option<[u8; N]> {
    if value.len() > N {
        return None;
    }
    let mut out = [0u8; N];
    out[N - value.len()..].copy_from_slice(value);
    Some(out)
}

/// Uppercase hex SHA-1 over `0x99 || len(body) || body`. The v4 format
/// frames the body with a two-octet length, so larger bodies are rejected.
fn fingerprint(body: &[u8]) -> Result<String, GpgError> {
    let length = u16::try_from(body.len()).map_err(|_| {
        GpgError::InvalidKey(format!("key packet of {} octets is too large", body.len()))
    })?;
    let mut hasher = Sha1::new();
    hasher.update([0x99u8]);
    hasher.update(length.to_be_bytes());
    hasher.update(body);
    Ok(hex::encode_upper(hasher.finalize()))
}

/// A transferable public key: a primary key and its subkeys.
#[derive(Debug, Clone)]
pub struct PublicKey {
    primary: KeyPacket,
    subkeys: Vec<KeyPacket>,
}

impl PublicKey {
    /// Parses an ASCII-armored public key block.
    pub fn from_armored(text: &str) -> Result<Self, GpgError> {
        Self::from_bytes(&dearmor(text)?)
    }

    /// Parses binary key packets. Subkeys with unsupported versions are skipped.
    pub fn from_bytes(data: &[u8]) -> Result<Self, GpgError> {
        let packets = parse_packets(data)?;
        let mut primary = None;
        let mut subkeys = Vec::new();

        for packet in packets {
            match packet.tag {
                TAG_PUBLIC_KEY if primary.is_none() => {
                    primary = Some(KeyPacket::parse(packet.body)?);
                }
                TAG_PUBLIC_SUBKEY => {
                    if let Ok(subkey) = KeyPacket::parse(packet.body) {
                        subkeys.push(subkey);
                    }
                }
                _ => {}
            }
        }

        let primary = primary.ok_or(GpgError::MissingPublicKey)?;
        Ok(Self { primary, subkeys })
    }

    pub fn fingerprint(&self) -> &str {
        &self.primary.fingerprint
    }

    /// Long key id: the low 64 bits of the fingerprint.
    pub fn key_id(&self) -> &str {
        &self.primary.fingerprint[self.primary.fingerprint.len().saturating_sub(16)..]
    }

    pub fn subkey_fingerprints(&self) -> Vec<&str> {
        self.subkeys.iter().map(|k| k.fingerprint.as_str()).collect()
    }

    /// Checks `signature` over exactly `data` with the primary key or any subkey.
    pub fn verify(&self, data: &[u8], signature: &DetachedSignature) -> bool {
        let Some(digest) = signature.digest(data) else {
            return false;
        };
        if digest[..2] != signature.left16 {
            return false;
        }
        std::iter::once(&self.primary)
            .chain(self.subkeys.iter())
            .any(|key| key.verify(signature, &digest))
    }
}

#[derive(Debug, Clone)]
enum SignatureMaterial {
    Rsa(Vec<u8>),
    EdDsa { r: Vec<u8>, s: Vec<u8> },
    Unsupported,
}

/// A parsed v4 detached signature.
#[derive(Debug, Clone)]
pub struct DetachedSignature {
    signature_type: u8,
    public_key_algorithm: u8,
    hash_algorithm: u8,
    /// Version through the end of the hashed subpackets, fed to the hash
    hashed_section: Vec<u8>,
    left16: [u8; 2],
    material: SignatureMaterial,
}

impl DetachedSignature {
    /// Parses a signature given either armored text or binary packets.
    pub fn parse(data: &[u8]) -> Result<Self, GpgError> {
        if is_armored(data) {
            let text = std::str::from_utf8(data)
                .map_err(|_| GpgError::Armor("armored signature is not UTF-8".to_string()))?;
            Self::from_binary(&dearmor(text)?)
        } else {
            Self::from_binary(data)
        }
    }

    fn from_binary(data: &[u8]) -> Result<Self, GpgError> {
        let packets = parse_packets(data)?;
        let body = packets
            .into_iter()
            .find(|packet| packet.tag == TAG_SIGNATURE)
            .map(|packet| packet.body)
            .ok_or(GpgError::MissingSignature)?;

        let mut reader = Reader::new(body);
        let version = reader.u8()?;
        if version != 4 {
            return Err(GpgError::Unsupported(format!("v{version} signatures")));
        }
        let signature_type = reader.u8()?;
        let public_key_algorithm = reader.u8()?;
        let hash_algorithm = reader.u8()?;
        let hashed_len = usize::from(reader.u16()?);
        reader.take(hashed_len)?;
        let hashed_section = body[..reader.position()].to_vec();
        let unhashed_len = usize::from(reader.u16()?);
        reader.take(unhashed_len)?;
        let left = reader.take(2)?;
        let left16 = [left[0], left[1]];

        let material = match public_key_algorithm {
            ALGO_RSA | ALGO_RSA_SIGN_ONLY => SignatureMaterial::Rsa(reader.mpi()?.to_vec()),
            ALGO_EDDSA => {
                let r = reader.mpi()?.to_vec();
                let s = reader.mpi()?.to_vec();
                SignatureMaterial::EdDsa { r, s }
            }
            _ => SignatureMaterial::Unsupported,
        };

        Ok(Self {
            signature_type,
            public_key_algorithm,
            hash_algorithm,
            hashed_section,
            left16,
            material,
        })
    }

    pub fn signature_type(&self) -> u8 {
        self.signature_type
    }

    pub fn public_key_algorithm(&self) -> u8 {
        self.public_key_algorithm
    }

    /// Digest over data and signature trailer, or `None` for unsupported
    /// hashes and non-document signatures.
    fn digest(&self, data: &[u8]) -> Option<Vec<u8>> {
        if self.signature_type != SIGNATURE_BINARY_DOCUMENT {
            return None;
        }
        let mut trailer = Vec::with_capacity(6);
        trailer.extend_from_slice(&[0x04, 0xFF]);
        trailer.extend_from_slice(&(self.hashed_section.len() as u32).to_be_bytes());

        match self.hash_algorithm {
            HASH_SHA256 => Some(hash_with::<Sha256>(data, &self.hashed_section, &trailer)),
            HASH_SHA384 => Some(hash_with::<Sha384>(data, &self.hashed_section, &trailer)),
            HASH_SHA512 => Some(hash_with::<Sha512>(data, &self.hashed_section, &trailer)),
            _ => None,
        }
    }
}

fn hash_with<D: Digest>(data: &[u8], hashed_section: &[u8], trailer: &[u8]) -> Vec<u8> {
    let mut hasher = D::new();
    hasher.update(data);
    hasher.update(hashed_section);
    hasher.update(trailer);
    hasher.finalize().to_vec()
}

/// Verifies a detached signature (armored or binary) over `data` with an
/// armored public key.
pub fn verify_detached(armored_key: &str, data: &[u8], signature: &[u8]) -> Result<bool, GpgError> {
    let key = PublicKey::from_armored(armored_key)?;
    let signature = DetachedSignature::parse(signature)?;
    Ok(key.verify(data, &signature))
}
