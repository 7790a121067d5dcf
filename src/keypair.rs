use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha512};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{KeygenError, Result};

pub const SEED_LEN: usize = 32;
pub const PUBLIC_KEY_LEN: usize = 32;
pub const PRIVATE_KEY_LEN: usize = 64;

/// An Ed25519 keypair in the MeshCore firmware encoding.
///
/// `private_key` is the expanded form the firmware imports:
/// bytes 0..32 hold the clamped secret scalar, bytes 32..64 hold the
/// upper half of SHA-512(seed) used as the signing nonce prefix.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    pub public_key: [u8; PUBLIC_KEY_LEN],
    pub private_key: [u8; PRIVATE_KEY_LEN],
}

impl KeyPair {
    /// Upper-case hex of the public key (64 chars)
    pub fn public_key_hex(&self) -> String {
        to_upper_hex(&self.public_key)
    }

    /// Upper-case hex of the expanded private key (128 chars)
    pub fn private_key_hex(&self) -> String {
        to_upper_hex(&self.private_key)
    }

    /// The clamped scalar half of the private key
    pub fn scalar_bytes(&self) -> [u8; 32] {
        let mut scalar = [0u8; 32];
        scalar.copy_from_slice(&self.private_key[..32]);
        scalar
    }

    /// Parse a keypair from hex strings in either case
    pub fn from_hex(public_hex: &str, private_hex: &str) -> Result<Self> {
        let mut public_key = [0u8; PUBLIC_KEY_LEN];
        hex::decode_to_slice(public_hex.trim(), &mut public_key)
            .map_err(|e| KeygenError::InvalidKey(format!("public key: {}", e)))?;

        let mut private_key = [0u8; PRIVATE_KEY_LEN];
        hex::decode_to_slice(private_hex.trim(), &mut private_key)
            .map_err(|e| KeygenError::InvalidKey(format!("private key: {}", e)))?;

        Ok(Self {
            public_key,
            private_key,
        })
    }

    /// Check that the scalar half is clamped and reproduces the public key
    pub fn verify(&self) -> Result<()> {
        let mut scalar = self.scalar_bytes();
        let clamped = is_clamped(&scalar);
        let public_key = public_key_from_scalar(&scalar);
        scalar.zeroize();

        if !clamped {
            return Err(KeygenError::InvalidKey(
                "private scalar is not clamped".to_string(),
            ));
        }
        if public_key != self.public_key {
            return Err(KeygenError::InvalidKey(
                "public key does not match private key".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_hex())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Apply RFC 8032 clamping to a raw scalar in place
#[inline(always)]
pub fn clamp_scalar(scalar: &mut [u8; 32]) {
    scalar[0] &= 0b1111_1000;
    scalar[31] &= 0b0111_1111;
    scalar[31] |= 0b0100_0000;
}

/// Whether a scalar satisfies all three clamp conditions
pub fn is_clamped(scalar: &[u8; 32]) -> bool {
    scalar[0] & 0b0000_0111 == 0
        && scalar[31] & 0b1000_0000 == 0
        && scalar[31] & 0b0100_0000 == 0b0100_0000
}

/// Multiply the base point by an already-clamped little-endian scalar
/// and return the compressed encoding.
///
/// Reducing mod the group order does not change the product since the
/// base point has prime order l.
fn public_key_from_scalar(clamped: &[u8; 32]) -> [u8; PUBLIC_KEY_LEN] {
    let scalar = Scalar::from_bytes_mod_order(*clamped);
    EdwardsPoint::mul_base(&scalar).compress().to_bytes()
}

/// Derive a keypair from a 32-byte seed.
///
/// The process:
/// 1. SHA-512 the seed into a 64-byte digest
/// 2. Clamp the first 32 bytes (exactly once) to get the secret scalar
/// 3. Multiply the base point by the scalar and compress the result
/// 4. Private key = clamped scalar || digest[32..64]
pub fn derive_from_seed(seed: &[u8; SEED_LEN]) -> KeyPair {
    let mut digest = Sha512::digest(seed);

    let mut scalar = [0u8; 32];
    scalar.copy_from_slice(&digest[..32]);
    clamp_scalar(&mut scalar);

    let public_key = public_key_from_scalar(&scalar);

    let mut private_key = [0u8; PRIVATE_KEY_LEN];
    private_key[..32].copy_from_slice(&scalar);
    private_key[32..].copy_from_slice(&digest[32..]);

    scalar.zeroize();
    digest.as_mut_slice().zeroize();

    KeyPair {
        public_key,
        private_key,
    }
}

/// Encode bytes as upper-case hex
pub fn to_upper_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// Keypair generator drawing a fresh seed from an injected random source
/// for every derivation.
pub struct KeyDeriver<R = OsRng> {
    rng: R,
    /// Seed drawn by the startup check, consumed by the first derivation
    first_seed: Option<Zeroizing<[u8; SEED_LEN]>>,
}

impl KeyDeriver<OsRng> {
    /// Deriver backed by the operating system CSPRNG
    pub fn from_os_rng() -> Result<Self> {
        Self::new(OsRng)
    }
}

impl<R: RngCore + CryptoRng> KeyDeriver<R> {
    /// Take ownership of a random source after drawing one seed from it.
    ///
    /// A source that cannot produce a seed here is reported as fatal. The
    /// drawn seed is not discarded: it becomes the first derivation, so the
    /// n-th key produced always comes from the n-th seed of the source.
    pub fn new(mut rng: R) -> Result<Self> {
        let mut seed = Zeroizing::new([0u8; SEED_LEN]);
        rng.try_fill_bytes(&mut seed[..])
            .map_err(|e| KeygenError::RandomnessUnavailable(e.to_string()))?;
        Ok(Self {
            rng,
            first_seed: Some(seed),
        })
    }

    /// Generate one keypair from a fresh random seed
    #[inline]
    pub fn derive(&mut self) -> Result<KeyPair> {
        if let Some(seed) = self.first_seed.take() {
            return Ok(derive_from_seed(&seed));
        }

        let mut seed = [0u8; SEED_LEN];
        self.rng
            .try_fill_bytes(&mut seed)
            .map_err(|e| KeygenError::Derivation(e.to_string()))?;
        let pair = derive_from_seed(&seed);
        seed.zeroize();
        Ok(pair)
    }
}
