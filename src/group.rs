use crate::{DhError, Result};

use num_bigint::BigUint;
use num_traits::Num;
use serde::{Deserialize, Serialize};

const MODP_1536_PRIME: &str = "ffffffffffffffffc90fdaa22168c234c4c6628b80dc1cd129024\
    e088a67cc74020bbea63b139b22514a08798e3404ddef9519b3cd\
    3a431b302b0a6df25f14374fe1356d6d51c245e485b576625e7ec\
    6f44c42e9a637ed6b0bff5cb6f406b7edee386bfb5a899fa5ae9f\
    24117c4b1fe649286651ece45b3dc2007cb8a163bf0598da48361\
    c55d39a69163fa8fd24cf5f83655d23dca3ad961c62f356208552\
    bb9ed529077096966d670c354e4abc9804f1746c08ca237327fff\
    fffffffffffff";

/// Diffie-Hellman group: a prime modulus `p` and generator `g`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub p: BigUint,
    pub g: BigUint,
}

impl Group {
    pub fn new(p: BigUint, g: BigUint) -> Self {
        Self { p, g }
    }

    /// The 1536-bit MODP group with generator 2.
    pub fn modp1536() -> Self {
        let p = BigUint::from_str_radix(MODP_1536_PRIME, 16).unwrap();
        Self::new(p, BigUint::from(2u64))
    }

    /// Toy group, small enough to reason about by hand.
    pub fn small() -> Self {
        Self::new(BigUint::from(37u64), BigUint::from(5u64))
    }

    /// Checks the modulus leaves room for a private exponent in `[1, p - 1)`.
    ///
    /// Generators are accepted as given; a peer may hand us anything.
    pub fn validate(&self) -> Result<()> {
        if self.p <= BigUint::from(2u64) {
            return Err(DhError::Domain(format!(
                "modulus must be greater than 2, got {}",
                self.p
            )));
        }
        Ok(())
    }
}
