//! secp256k1 signature recovery for `personal_sign` (EIP-191) messages.

use crate::auth::address::{keccak256, Address};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("Invalid signature encoding: {0}")]
    Encoding(String),

    #[error("Invalid signature length: expected 65 bytes, got {0}")]
    Length(usize),

    #[error("Invalid recovery id: {0}")]
    RecoveryId(u8),

    #[error("Signature recovery failed: {0}")]
    Recovery(String),

    #[error("Invalid private key: {0}")]
    PrivateKey(String),
}

/// Recovers the address that produced a signature over a message.
///
/// Implementations are pure: no state, no side effects.
pub trait SignatureVerifier: Send + Sync {
    fn recover(&self, message: &str, signature: &[u8]) -> Result<Address, SignatureError>;
}

/// Wallet `personal_sign` recovery (what MetaMask and friends produce).
#[derive(Debug, Clone, Copy, Default)]
pub struct PersonalSignVerifier;

impl SignatureVerifier for PersonalSignVerifier {
    fn recover(&self, message: &str, signature: &[u8]) -> Result<Address, SignatureError> {
        recover_personal_sign(message.as_bytes(), signature)
    }
}

/// EIP-191 version 0x45 digest: `keccak256("\x19Ethereum Signed Message:\n" ++ len ++ message)`.
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut data = format!("\x19Ethereum Signed Message:\n{}", message.len()).into_bytes();
    data.extend_from_slice(message);
    keccak256(&data)
}

/// Recover the signer of a 65-byte `r || s || v` signature.
///
/// `v` may be given either as 27/28 or as the raw recovery id 0/1. High-S
/// signatures are accepted like `ecrecover` does: `s` is folded into the
/// lower half and the recovery id's y-parity flipped, which recovers the
/// same key.
pub fn recover_personal_sign(message: &[u8], signature: &[u8]) -> Result<Address, SignatureError> {
    if signature.len() != 65 {
        return Err(SignatureError::Length(signature.len()));
    }

    let v = signature[64];
    let recovery_byte = match v {
        27 | 28 => v - 27,
        0 | 1 => v,
        other => return Err(SignatureError::RecoveryId(other)),
    };
    let recovery_id = RecoveryId::from_byte(recovery_byte).ok_or(SignatureError::RecoveryId(v))?;

    let mut signature = Signature::from_slice(&signature[..64])
        .map_err(|e| SignatureError::Recovery(e.to_string()))?;
    let mut recovery_id = recovery_id;
    if let Some(normalized) = signature.normalize_s() {
        signature = normalized;
        recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    }

    let digest = personal_message_hash(message);
    let key = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id)
        .map_err(|e| SignatureError::Recovery(e.to_string()))?;

    Ok(address_of(&key))
}

/// Account address of a public key: last 20 bytes of keccak256(X || Y).
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address::from_bytes(bytes)
}

/// Decode a hex signature, with or without a `0x` prefix.
pub fn decode_signature_hex(input: &str) -> Result<Vec<u8>, SignatureError> {
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    hex::decode(digits).map_err(|e| SignatureError::Encoding(e.to_string()))
}

/// Sign a message the way a wallet's `personal_sign` does.
///
/// Returns the `0x`-prefixed hex of `r || s || v` with `v` in {27, 28}.
pub fn sign_message(private_key_hex: &str, message: &str) -> Result<String, SignatureError> {
    let digits = private_key_hex
        .strip_prefix("0x")
        .unwrap_or(private_key_hex);
    let key_bytes = hex::decode(digits).map_err(|e| SignatureError::PrivateKey(e.to_string()))?;
    let signing_key =
        SigningKey::from_slice(&key_bytes).map_err(|e| SignatureError::PrivateKey(e.to_string()))?;

    let digest = personal_message_hash(message.as_bytes());
    let (signature, recovery_id) = signing_key
        .sign_prehash_recoverable(&digest)
        .map_err(|e| SignatureError::Recovery(e.to_string()))?;

    let mut bytes = signature.to_bytes().to_vec();
    bytes.push(recovery_id.to_byte() + 27);
    Ok(format!("0x{}", hex::encode(bytes)))
}
