// Diffie-Hellman key agreement
use crate::{DhError, Group, Result};

use num_bigint::{BigUint, RandBigInt};
use rand::{rngs::StdRng, RngCore, SeedableRng};
use sha1::{Digest, Sha1};

pub const KEY_LEN: usize = 16;

pub type SymmetricKey = [u8; KEY_LEN];

/// One side of a key agreement. Holds the private exponent, so it is never
/// shared between connections.
#[derive(Clone)]
pub struct Session {
    group: Group,
    priv_key: BigUint,
    pub_key: BigUint,
    peer_key: Option<BigUint>,
    key: Option<SymmetricKey>,
}

impl Session {
    pub fn new<R: RngCore + ?Sized>(group: Group, rng: &mut R) -> Result<Self> {
        group.validate()?;
        let upper = &group.p - 1u32;
        let priv_key = rng.gen_biguint_range(&BigUint::from(1u32), &upper);
        let pub_key = group.g.modpow(&priv_key, &group.p);
        Ok(Self {
            group,
            priv_key,
            pub_key,
            peer_key: None,
            key: None,
        })
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    pub fn public_key(&self) -> &BigUint {
        &self.pub_key
    }

    pub fn key(&self) -> Option<&SymmetricKey> {
        self.key.as_ref()
    }

    /// `peer_key ^ d mod p`. A peer value congruent to zero (e.g. `p` itself)
    /// always gives zero.
    pub fn shared_secret(&self, peer_key: &BigUint) -> BigUint {
        peer_key.modpow(&self.priv_key, &self.group.p)
    }

    /// Agrees a key with the given peer value. Repeating the call with the
    /// same value returns the same key; a different value is rejected.
    pub fn derive_key(&mut self, peer_key: &BigUint) -> Result<SymmetricKey> {
        match (&self.peer_key, self.key) {
            (Some(agreed), Some(key)) if agreed == peer_key => return Ok(key),
            (Some(_), _) => {
                return Err(DhError::State(
                    "session has already agreed a key with a different peer".to_string(),
                ))
            }
            _ => {}
        }
        let key = key_from_secret(&self.shared_secret(peer_key));
        self.peer_key = Some(peer_key.clone());
        self.key = Some(key);
        Ok(key)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("group", &self.group)
            .field("pub_key", &self.pub_key)
            .field("has_key", &self.key.is_some())
            .finish_non_exhaustive()
    }
}

/// First 16 bytes of SHA1 over the big-endian encoding of the secret.
pub fn key_from_secret(secret: &BigUint) -> SymmetricKey {
    let digest = Sha1::digest(secret.to_bytes_be());
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&digest[..KEY_LEN]);
    key
}

/// Seeds an independent generator from `rng`, so each connection owns its
/// own random source and a seeded parent stays reproducible.
pub fn fork_rng<R: RngCore + ?Sized>(rng: &mut R) -> StdRng {
    let mut seed = [0u8; 32];
    rng.fill_bytes(&mut seed);
    StdRng::from_seed(seed)
}
