//! Signature authorization for swap creation.
//!
//! A sender authorizes a swap by signing the Keccak-256 hash of the tightly packed
//! swap parameters together with the sequence id the swap is about to receive,
//! wrapped in the `"\x19Ethereum Signed Message:\n32"` prefix. Binding the sequence
//! id makes a signature valid for exactly one ledger position.
//!
//! Recovery never fails loudly: anything malformed recovers to [`Address::ZERO`],
//! and the caller compares the result against the expected signer.

use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha3::{Digest, Keccak256};

use crate::model::{SequenceId, SwapParams};
use crate::Address;

/// Length of an `r || s || v` signature.
pub const SIGNATURE_LEN: usize = 65;

const SIGNED_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Half of the secp256k1 group order. Larger `s` values are the malleable twin of a
/// canonical signature.
const HALF_ORDER: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b,
    0x20, 0xa0,
];

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Hash of the packed swap parameters and sequence id. The sender is left out since
/// it is the expected signer.
pub fn swap_message_hash(params: &SwapParams, sequence_id: SequenceId) -> [u8; 32] {
    let mut packed = Vec::with_capacity(20 * 3 + 32 * 3);
    packed.extend_from_slice(params.in_asset.as_bytes());
    packed.extend_from_slice(params.out_asset.as_bytes());
    packed.extend_from_slice(&params.amount_in.to_be_word());
    packed.extend_from_slice(&params.amount_out.to_be_word());
    packed.extend_from_slice(params.receiver.as_bytes());
    let mut id_word = [0u8; 32];
    id_word[24..].copy_from_slice(&sequence_id.to_be_bytes());
    packed.extend_from_slice(&id_word);
    keccak256(&packed)
}

/// Apply the signed-message domain prefix to a 32-byte hash.
pub fn to_signed_message_hash(hash: &[u8; 32]) -> [u8; 32] {
    let mut prefixed = Vec::with_capacity(SIGNED_MESSAGE_PREFIX.len() + 32);
    prefixed.extend_from_slice(SIGNED_MESSAGE_PREFIX);
    prefixed.extend_from_slice(hash);
    keccak256(&prefixed)
}

/// Digest the sender must sign to authorize `params` at `sequence_id`.
pub fn authorization_digest(params: &SwapParams, sequence_id: SequenceId) -> [u8; 32] {
    to_signed_message_hash(&swap_message_hash(params, sequence_id))
}

/// Account identifier of a public key: last 20 bytes of the Keccak-256 hash of the
/// uncompressed key without its prefix byte.
pub fn address_of(public_key: &PublicKey) -> Address {
    let uncompressed = public_key.serialize_uncompressed();
    let hash = keccak256(&uncompressed[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address::new(bytes)
}

/// Recover the account that signed `digest`, or [`Address::ZERO`] when recovery is
/// not defined for the input.
pub fn recover_signer(signature: &[u8], digest: &[u8; 32]) -> Address {
    if signature.len() != SIGNATURE_LEN {
        return Address::ZERO;
    }

    let mut v = signature[64];
    if v < 27 {
        v += 27;
    }
    if v != 27 && v != 28 {
        return Address::ZERO;
    }

    // s is big-endian, so byte order comparison is numeric comparison
    if signature[32..64] > HALF_ORDER[..] {
        return Address::ZERO;
    }

    let Ok(recovery_id) = RecoveryId::from_i32(i32::from(v - 27)) else {
        return Address::ZERO;
    };
    let Ok(recoverable) = RecoverableSignature::from_compact(&signature[..64], recovery_id)
    else {
        return Address::ZERO;
    };

    let secp = Secp256k1::verification_only();
    let message = Message::from_digest(*digest);
    match secp.recover_ecdsa(&message, &recoverable) {
        Ok(public_key) => address_of(&public_key),
        Err(_) => Address::ZERO,
    }
}

/// Sign a raw 32-byte digest, producing `r || s || v` with `v` in {27, 28}.
pub fn sign_digest(secret_key: &SecretKey, digest: &[u8; 32]) -> [u8; SIGNATURE_LEN] {
    let secp = Secp256k1::signing_only();
    let message = Message::from_digest(*digest);
    let (recovery_id, compact) = secp
        .sign_ecdsa_recoverable(&message, secret_key)
        .serialize_compact();

    let mut signature = [0u8; SIGNATURE_LEN];
    signature[..64].copy_from_slice(&compact);
    signature[64] = 27 + recovery_id.to_i32() as u8;
    signature
}

/// Produce the signature a sender hands to an operator for a swap at `sequence_id`.
pub fn sign_swap(
    secret_key: &SecretKey,
    params: &SwapParams,
    sequence_id: SequenceId,
) -> [u8; SIGNATURE_LEN] {
    sign_digest(secret_key, &authorization_digest(params, sequence_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Amount;

    fn key(byte: u8) -> (SecretKey, Address) {
        let secret = SecretKey::from_slice(&[byte; 32]).unwrap();
        let public = PublicKey::from_secret_key(&Secp256k1::new(), &secret);
        (secret, address_of(&public))
    }

    fn params(sender: Address) -> SwapParams {
        SwapParams {
            in_asset: Address::repeat_byte(0xa1),
            out_asset: Address::repeat_byte(0xb2),
            amount_in: Amount::new(200),
            amount_out: Amount::new(100),
            sender,
            receiver: Address::repeat_byte(0xc3),
        }
    }

    /// n - s over big-endian 32-byte words
    fn negate_scalar(s: &[u8]) -> [u8; 32] {
        const ORDER: [u8; 32] = [
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
            0xff, 0xfe, 0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c,
            0xd0, 0x36, 0x41, 0x41,
        ];
        let mut out = [0u8; 32];
        let mut borrow = 0i16;
        for i in (0..32).rev() {
            let mut diff = ORDER[i] as i16 - s[i] as i16 - borrow;
            borrow = if diff < 0 {
                diff += 256;
                1
            } else {
                0
            };
            out[i] = diff as u8;
        }
        out
    }

    #[test]
    fn keccak_of_empty_input() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn known_key_address() {
        // private key 1 is the generator point
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        let secret = SecretKey::from_slice(&bytes).unwrap();
        let public = PublicKey::from_secret_key(&Secp256k1::new(), &secret);
        assert_eq!(
            address_of(&public).to_string(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn sign_then_recover_returns_signer() {
        let (secret, signer) = key(0x11);
        let params = params(signer);
        let signature = sign_swap(&secret, &params, 0);
        let digest = authorization_digest(&params, 0);
        assert_eq!(recover_signer(&signature, &digest), signer);
    }

    #[test]
    fn recovery_id_without_offset_is_accepted() {
        let (secret, signer) = key(0x12);
        let digest = authorization_digest(&params(signer), 3);
        let mut signature = sign_digest(&secret, &digest);
        signature[64] -= 27;
        assert_eq!(recover_signer(&signature, &digest), signer);
    }

    #[test]
    fn signature_is_bound_to_sequence_id() {
        let (secret, signer) = key(0x13);
        let params = params(signer);
        let signature = sign_swap(&secret, &params, 0);
        let recovered = recover_signer(&signature, &authorization_digest(&params, 1));
        assert_ne!(recovered, signer);
    }

    #[test]
    fn sender_is_not_part_of_the_message() {
        let (_, signer) = key(0x14);
        let mut other = params(signer);
        other.sender = Address::repeat_byte(0xee);
        assert_eq!(
            swap_message_hash(&params(signer), 5),
            swap_message_hash(&other, 5)
        );
    }

    #[test]
    fn every_other_field_changes_the_message() {
        let base = params(Address::repeat_byte(1));
        let hash = swap_message_hash(&base, 0);

        let mut changed = base.clone();
        changed.amount_out = Amount::new(101);
        assert_ne!(swap_message_hash(&changed, 0), hash);

        let mut changed = base.clone();
        changed.receiver = Address::repeat_byte(0xdd);
        assert_ne!(swap_message_hash(&changed, 0), hash);

        let mut changed = base.clone();
        changed.in_asset = changed.out_asset;
        assert_ne!(swap_message_hash(&changed, 0), hash);
    }

    #[test]
    fn prefixed_digest_differs_from_raw_hash() {
        let hash = swap_message_hash(&params(Address::repeat_byte(1)), 0);
        assert_ne!(to_signed_message_hash(&hash), hash);
    }

    #[test]
    fn wrong_length_recovers_zero() {
        let (secret, signer) = key(0x15);
        let digest = authorization_digest(&params(signer), 0);
        let signature = sign_digest(&secret, &digest);
        assert_eq!(recover_signer(&signature[..64], &digest), Address::ZERO);
        assert_eq!(recover_signer(&[], &digest), Address::ZERO);
        let mut long = signature.to_vec();
        long.push(0);
        assert_eq!(recover_signer(&long, &digest), Address::ZERO);
    }

    #[test]
    fn unknown_recovery_byte_recovers_zero() {
        let (secret, signer) = key(0x16);
        let digest = authorization_digest(&params(signer), 0);
        let mut signature = sign_digest(&secret, &digest);
        signature[64] = 29;
        assert_eq!(recover_signer(&signature, &digest), Address::ZERO);
        signature[64] = 2;
        assert_eq!(recover_signer(&signature, &digest), Address::ZERO);
    }

    #[test]
    fn high_s_twin_recovers_zero() {
        let (secret, signer) = key(0x17);
        let digest = authorization_digest(&params(signer), 0);
        let signature = sign_digest(&secret, &digest);

        // (r, n - s, flipped v) recovers the same key on a permissive verifier
        let mut twin = signature;
        twin[32..64].copy_from_slice(&negate_scalar(&signature[32..64]));
        twin[64] = if signature[64] == 27 { 28 } else { 27 };
        assert_eq!(recover_signer(&twin, &digest), Address::ZERO);
    }

    #[test]
    fn zeroed_signature_recovers_zero() {
        let digest = [7u8; 32];
        let mut signature = [0u8; SIGNATURE_LEN];
        signature[64] = 27;
        assert_eq!(recover_signer(&signature, &digest), Address::ZERO);
    }
}
