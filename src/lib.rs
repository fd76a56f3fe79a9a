mod channel;
mod cipher;
mod config;
mod error;
mod frame;
mod group;
mod roles;
mod session;

pub use channel::{ChannelState, StreamChannel};
pub use cipher::{decrypt_aes_128_cbc, encrypt_aes_128_cbc, BLOCK_SIZE};
pub use config::{Config, DEFAULT_MESSAGE};
pub use error::{DhError, Result};
pub use frame::{EncryptedMessage, Exchange, Message, MessageType, MAX_PAYLOAD_LEN, MAX_SEALED_LEN};
pub use group::Group;
pub use roles::{
    accept_initiator, open_responder, respond, spawn_relay, spawn_responder, Direction, Initiator,
    Interception, Relay, RelayLegs, Responder,
};
pub use session::{fork_rng, key_from_secret, Session, SymmetricKey, KEY_LEN};
