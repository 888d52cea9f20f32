//! secp256k1 public key recovery from 65-byte `r || s || v` signatures.
//!
//! Given a digest `e` and a signature `(r, s, v)` the signer's key is
//! `Q = r⁻¹ · (s·R − e·G)`, where `R` is the curve point whose x-coordinate is
//! `r` (or `r + n` when bit 1 of the recovery id is set) and whose y parity is
//! bit 0 of the recovery id. Field and scalar arithmetic come from `k256`.

use crate::crypto::ethereum::{hash_personal_message, Address};
use crate::error::RecoveryError;
use k256::elliptic_curve::bigint::{Encoding, U256};
use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::point::DecompressPoint;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::subtle::Choice;
use k256::{AffinePoint, FieldBytes, ProjectivePoint, Scalar};

/// Order `n` of the secp256k1 base point
pub const CURVE_ORDER: U256 =
    U256::from_be_hex("FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141");

/// Prime `p` of the secp256k1 base field
pub const FIELD_PRIME: U256 =
    U256::from_be_hex("FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEFFFFFC2F");

/// A decoded compact signature
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    r: U256,
    s: U256,
    recovery_id: u8,
}

impl std::fmt::Debug for RecoverableSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoverableSignature")
            .field("r", &hex::encode(self.r.to_be_bytes()))
            .field("s", &hex::encode(self.s.to_be_bytes()))
            .field("recovery_id", &self.recovery_id)
            .finish()
    }
}

impl RecoverableSignature {
    /// Decode a `0x`-prefixed, 130 hex digit signature
    ///
    /// Surrounding whitespace is ignored and hex digits may be in either case.
    pub fn from_hex(signature: &str) -> Result<Self, RecoveryError> {
        let trimmed = signature.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or(RecoveryError::BadPrefix)?;
        if digits.len() != 130 {
            return Err(RecoveryError::BadSignatureLength(digits.len()));
        }

        let mut bytes = [0u8; 65];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| RecoveryError::BadEncoding(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Decode `r || s || v` and range-check every component
    ///
    /// `v` values of 27 and above are treated as legacy encodings and have 27
    /// subtracted.
    pub fn from_bytes(bytes: &[u8; 65]) -> Result<Self, RecoveryError> {
        let v = bytes[64];
        let recovery_id = if v >= 27 { v - 27 } else { v };
        if recovery_id > 3 {
            return Err(RecoveryError::InvalidRecoveryId(v));
        }

        let r = U256::from_be_slice(&bytes[..32]);
        let s = U256::from_be_slice(&bytes[32..64]);
        if r >= CURVE_ORDER || s >= CURVE_ORDER || r == U256::ZERO || s == U256::ZERO {
            return Err(RecoveryError::OutOfRangeScalar);
        }

        Ok(Self { r, s, recovery_id })
    }

    pub fn r(&self) -> [u8; 32] {
        self.r.to_be_bytes()
    }

    pub fn s(&self) -> [u8; 32] {
        self.s.to_be_bytes()
    }

    /// Normalized recovery id in `0..=3`
    pub fn recovery_id(&self) -> u8 {
        self.recovery_id
    }

    /// Recover the uncompressed public key coordinates `x || y` that produced
    /// this signature over `digest`
    pub fn recover_public_key(&self, digest: &[u8; 32]) -> Result<[u8; 64], RecoveryError> {
        let big_r = self.recover_r_point()?;

        let r = <Scalar as Reduce<U256>>::reduce(self.r);
        let s = <Scalar as Reduce<U256>>::reduce(self.s);
        let e = <Scalar as Reduce<U256>>::reduce(U256::from_be_slice(digest));

        let r_inv =
            Option::<Scalar>::from(r.invert()).ok_or(RecoveryError::OutOfRangeScalar)?;
        let u1 = -(e * r_inv);
        let u2 = s * r_inv;

        let q = ProjectivePoint::GENERATOR * u1 + ProjectivePoint::from(big_r) * u2;
        if q == ProjectivePoint::IDENTITY {
            return Err(RecoveryError::EmptyResult);
        }

        let encoded = q.to_affine().to_encoded_point(false);
        let mut xy = [0u8; 64];
        xy.copy_from_slice(&encoded.as_bytes()[1..65]);
        Ok(xy)
    }

    /// Ethereum address of the key that produced this signature over `digest`
    pub fn recover_address(&self, digest: &[u8; 32]) -> Result<Address, RecoveryError> {
        let xy = self.recover_public_key(digest)?;
        Ok(Address::from_public_key_coordinates(&xy))
    }

    fn recover_r_point(&self) -> Result<AffinePoint, RecoveryError> {
        let x = if self.recovery_id & 2 != 0 {
            let shifted = self.r.wrapping_add(&CURVE_ORDER);
            // r + n overflowed 256 bits, so it is certainly beyond p
            if shifted < self.r {
                return Err(RecoveryError::UnrecoverablePoint);
            }
            shifted
        } else {
            self.r
        };
        if x >= FIELD_PRIME {
            return Err(RecoveryError::UnrecoverablePoint);
        }

        let x_bytes = FieldBytes::from(x.to_be_bytes());
        let y_is_odd = Choice::from(self.recovery_id & 1);
        Option::<AffinePoint>::from(AffinePoint::decompress(&x_bytes, y_is_odd))
            .ok_or(RecoveryError::UnrecoverablePoint)
    }
}

/// Recover the address that signed `message` with `personal_sign`
///
/// This is the only hashing convention accepted for authentication.
///
/// # Example
/// ```rust
/// use siwe_auth::crypto::recovery::recover_address;
/// use siwe_auth::RecoveryError;
///
/// let result = recover_address(b"hello", "not-hex");
/// assert_eq!(result, Err(RecoveryError::BadPrefix));
/// ```
pub fn recover_address(message: &[u8], signature: &str) -> Result<Address, RecoveryError> {
    let signature = RecoverableSignature::from_hex(signature)?;
    signature.recover_address(&hash_personal_message(message))
}

/// Recover the signer of an already computed 32-byte digest
pub fn recover_address_from_hash(
    digest: &[u8; 32],
    signature: &str,
) -> Result<Address, RecoveryError> {
    RecoverableSignature::from_hex(signature)?.recover_address(digest)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use k256::ecdsa::{SigningKey, VerifyingKey};

    /// Sign `message` with `personal_sign` semantics, returning `0x` + 130 hex digits with `v` in {27, 28}
    pub(crate) fn personal_sign(key: &SigningKey, message: &[u8]) -> String {
        let digest = hash_personal_message(message);
        let (signature, recovery_id) = key.sign_prehash_recoverable(&digest).unwrap();
        let mut bytes = [0u8; 65];
        bytes[..64].copy_from_slice(&signature.to_bytes());
        bytes[64] = recovery_id.to_byte() + 27;
        format!("0x{}", hex::encode(bytes))
    }

    pub(crate) fn address_of(key: &SigningKey) -> Address {
        let point = VerifyingKey::from(key).to_encoded_point(false);
        let mut xy = [0u8; 64];
        xy.copy_from_slice(&point.as_bytes()[1..]);
        Address::from_public_key_coordinates(&xy)
    }

    fn key_one() -> SigningKey {
        let mut secret = [0u8; 32];
        secret[31] = 1;
        SigningKey::from_bytes(&secret.into()).unwrap()
    }

    fn signature_hex(r: &[u8; 32], s: &[u8; 32], v: u8) -> String {
        format!("0x{}{}{:02x}", hex::encode(r), hex::encode(s), v)
    }

    #[test]
    fn test_known_key_address() {
        assert_eq!(
            address_of(&key_one()).to_string(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_sign_then_recover() {
        let key = key_one();
        let message = b"example.com wants you to sign in with your Ethereum account:";
        let signature = personal_sign(&key, message);

        let recovered = recover_address(message, &signature).unwrap();
        assert_eq!(recovered, address_of(&key));
    }

    #[test]
    fn test_recover_with_random_keys() {
        let mut rng = rand::thread_rng();
        for _ in 0..8 {
            let key = SigningKey::random(&mut rng);
            let signature = personal_sign(&key, b"random key round");
            assert_eq!(
                recover_address(b"random key round", &signature).unwrap(),
                address_of(&key)
            );
        }
    }

    #[test]
    fn test_recover_matches_libsecp256k1() {
        let secret = libsecp256k1::SecretKey::parse(&[0x42u8; 32]).unwrap();
        let public = libsecp256k1::PublicKey::from_secret_key(&secret);
        let serialized = public.serialize();
        let mut xy = [0u8; 64];
        xy.copy_from_slice(&serialized[1..]);
        let expected = Address::from_public_key_coordinates(&xy);

        let digest = hash_personal_message(b"cross-checked");
        let (signature, recovery_id) =
            libsecp256k1::sign(&libsecp256k1::Message::parse(&digest), &secret);
        let mut bytes = [0u8; 65];
        bytes[..64].copy_from_slice(&signature.serialize());
        bytes[64] = recovery_id.serialize();

        let sig_hex = format!("0x{}", hex::encode(bytes));
        assert_eq!(recover_address(b"cross-checked", &sig_hex).unwrap(), expected);
    }

    #[test]
    fn test_recover_matches_k256_verifying_key() {
        let key = SigningKey::random(&mut rand::thread_rng());
        let digest = hash_personal_message(b"prehash");
        let (signature, recovery_id) = key.sign_prehash_recoverable(&digest).unwrap();
        let expected =
            VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id).unwrap();

        let mut bytes = [0u8; 65];
        bytes[..64].copy_from_slice(&signature.to_bytes());
        bytes[64] = recovery_id.to_byte();
        let xy = RecoverableSignature::from_bytes(&bytes)
            .unwrap()
            .recover_public_key(&digest)
            .unwrap();

        assert_eq!(&xy[..], &expected.to_encoded_point(false).as_bytes()[1..]);
    }

    #[test]
    fn test_legacy_and_raw_v_agree() {
        let key = key_one();
        let legacy = personal_sign(&key, b"v encoding");
        let v: u8 = u8::from_str_radix(&legacy[130..], 16).unwrap();
        let raw = format!("{}{:02x}", &legacy[..130], v - 27);

        assert_eq!(
            recover_address(b"v encoding", &legacy).unwrap(),
            recover_address(b"v encoding", &raw).unwrap()
        );
    }

    #[test]
    fn test_uppercase_and_padded_signature() {
        let key = key_one();
        let signature = personal_sign(&key, b"case");
        let shouted = format!("  0x{}\n", signature[2..].to_uppercase());
        assert_eq!(recover_address(b"case", &shouted).unwrap(), address_of(&key));
    }

    #[test]
    fn test_wrong_message_recovers_other_address() {
        let key = key_one();
        let signature = personal_sign(&key, b"original");
        let recovered = recover_address(b"tampered", &signature).unwrap();
        assert_ne!(recovered, address_of(&key));
    }

    #[test]
    fn test_bad_prefix_and_length() {
        let body = "ab".repeat(65);
        assert_eq!(recover_address(b"m", &body), Err(RecoveryError::BadPrefix));
        assert_eq!(
            recover_address(b"m", "0xabcd"),
            Err(RecoveryError::BadSignatureLength(4))
        );
        assert_eq!(
            recover_address(b"m", &format!("0x{}", "ab".repeat(66))),
            Err(RecoveryError::BadSignatureLength(132))
        );
        assert!(matches!(
            recover_address(b"m", &format!("0x{}", "zz".repeat(65))),
            Err(RecoveryError::BadEncoding(_))
        ));
    }

    #[test]
    fn test_out_of_range_scalars() {
        let order = CURVE_ORDER.to_be_bytes();
        let one = {
            let mut b = [0u8; 32];
            b[31] = 1;
            b
        };
        let max = [0xffu8; 32];

        for (r, s) in [(order, one), (one, order), (max, one), (one, max), ([0u8; 32], one)] {
            let sig = signature_hex(&r, &s, 27);
            assert_eq!(
                recover_address(b"m", &sig),
                Err(RecoveryError::OutOfRangeScalar)
            );
        }
    }

    #[test]
    fn test_invalid_recovery_id() {
        let mut one = [0u8; 32];
        one[31] = 1;
        assert_eq!(
            recover_address(b"m", &signature_hex(&one, &one, 4)),
            Err(RecoveryError::InvalidRecoveryId(4))
        );
        assert_eq!(
            recover_address(b"m", &signature_hex(&one, &one, 31)),
            Err(RecoveryError::InvalidRecoveryId(31))
        );
    }

    #[test]
    fn test_high_recovery_id_beyond_field_prime() {
        // r = n - 1 with recovery id 2 puts x = r + n far above p
        let r = CURVE_ORDER.wrapping_sub(&U256::ONE).to_be_bytes();
        let mut s = [0u8; 32];
        s[31] = 7;
        assert_eq!(
            recover_address(b"m", &signature_hex(&r, &s, 29)),
            Err(RecoveryError::UnrecoverablePoint)
        );
    }

    #[test]
    fn test_x_not_on_curve() {
        // x = 5: 5^3 + 7 = 132 is not a square modulo p
        let mut r = [0u8; 32];
        r[31] = 5;
        let mut s = [0u8; 32];
        s[31] = 9;
        assert_eq!(
            recover_address(b"m", &signature_hex(&r, &s, 0)),
            Err(RecoveryError::UnrecoverablePoint)
        );
    }

    #[test]
    fn test_recovered_point_at_infinity() {
        // r = Gx with even y gives R = G; s = e = 1 makes sR - eG the identity
        let r: [u8; 32] =
            hex::decode("79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798")
                .unwrap()
                .try_into()
                .unwrap();
        let mut s = [0u8; 32];
        s[31] = 1;
        let mut digest = [0u8; 32];
        digest[31] = 1;
        assert_eq!(
            recover_address_from_hash(&digest, &signature_hex(&r, &s, 27)),
            Err(RecoveryError::EmptyResult)
        );
    }

    #[test]
    fn test_recover_from_hash() {
        let key = key_one();
        let signature = personal_sign(&key, b"digest path");
        let digest = hash_personal_message(b"digest path");
        assert_eq!(
            recover_address_from_hash(&digest, &signature).unwrap(),
            address_of(&key)
        );
    }
}
