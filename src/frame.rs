//! Wire format.
//!
//! ```text
//! +--------+----------------+------------------+
//! | type   | length (u32 BE)| payload (bincode)|
//! +--------+----------------+------------------+
//! ```
//!
//! Encrypted payloads carry the ciphertext with the IV appended.
use crate::{
    cipher::{decrypt_aes_128_cbc, encrypt_aes_128_cbc, BLOCK_SIZE},
    DhError, Group, Result, SymmetricKey,
};

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

pub const FRAME_HEADER_LEN: usize = 5;
pub const MAX_PAYLOAD_LEN: usize = 1 << 20;
/// Largest ciphertext-plus-IV that fits a payload after bincode's length prefix.
pub const MAX_SEALED_LEN: usize = MAX_PAYLOAD_LEN - 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Exchange = 0x01,
    Encrypted = 0x02,
}

impl TryFrom<u8> for MessageType {
    type Error = DhError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(MessageType::Exchange),
            0x02 => Ok(MessageType::Encrypted),
            _ => Err(DhError::Decode(format!("unknown message type 0x{:02x}", value))),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::Exchange => write!(f, "EXCHANGE"),
            MessageType::Encrypted => write!(f, "ENCRYPTED"),
        }
    }
}

/// Handshake leg: the group and the sender's public value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub group: Group,
    pub public_key: BigUint,
}

/// Ciphertext with the IV appended, exactly as it travels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedMessage(Vec<u8>);

impl EncryptedMessage {
    pub fn seal(plaintext: &[u8], key: &SymmetricKey, iv: [u8; BLOCK_SIZE]) -> Self {
        let mut sealed = encrypt_aes_128_cbc(plaintext, key, &iv);
        sealed.extend_from_slice(&iv);
        Self(sealed)
    }

    pub fn open(&self, key: &SymmetricKey) -> Result<Vec<u8>> {
        let (ciphertext, iv) = self.split()?;
        decrypt_aes_128_cbc(ciphertext, key, iv)
    }

    pub fn ciphertext(&self) -> Result<&[u8]> {
        Ok(self.split()?.0)
    }

    pub fn iv(&self) -> Result<&[u8; BLOCK_SIZE]> {
        Ok(self.split()?.1)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn split(&self) -> Result<(&[u8], &[u8; BLOCK_SIZE])> {
        let at = self.0.len().checked_sub(BLOCK_SIZE).ok_or_else(|| {
            DhError::Decrypt(format!(
                "encrypted payload of {} bytes is shorter than the IV",
                self.0.len()
            ))
        })?;
        let (ciphertext, iv) = self.0.split_at(at);
        let iv = iv
            .try_into()
            .map_err(|_| DhError::Decrypt("malformed IV".to_string()))?;
        Ok((ciphertext, iv))
    }
}

impl From<Vec<u8>> for EncryptedMessage {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Exchange(Exchange),
    Encrypted(EncryptedMessage),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Exchange(_) => MessageType::Exchange,
            Message::Encrypted(_) => MessageType::Encrypted,
        }
    }

    pub fn to_frame(&self) -> Result<Vec<u8>> {
        let payload = match self {
            Message::Exchange(exchange) => bincode::serialize(exchange)?,
            Message::Encrypted(sealed) => bincode::serialize(sealed)?,
        };
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(DhError::State(format!(
                "cannot send a payload of {} bytes, the limit is {}",
                payload.len(),
                MAX_PAYLOAD_LEN
            )));
        }
        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
        frame.push(self.message_type() as u8);
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    pub fn from_payload(message_type: MessageType, payload: &[u8]) -> Result<Self> {
        Ok(match message_type {
            MessageType::Exchange => Message::Exchange(bincode::deserialize(payload)?),
            MessageType::Encrypted => Message::Encrypted(bincode::deserialize(payload)?),
        })
    }
}
