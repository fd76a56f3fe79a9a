use crate::{
    cipher::BLOCK_SIZE,
    frame::{EncryptedMessage, Exchange, Message, MessageType, MAX_PAYLOAD_LEN, MAX_SEALED_LEN},
    DhError, Result, Session, SymmetricKey,
};

use rand::RngCore;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    AwaitingExchange,
    KeyEstablished,
    ExchangingEncrypted,
    Closed,
}

/// Typed frames over a duplex byte stream. Encrypted traffic uses the key of
/// the session handed over by [`StreamChannel::establish`].
pub struct StreamChannel<S, R> {
    stream: S,
    rng: R,
    session: Option<Session>,
    state: ChannelState,
}

impl<S, R> StreamChannel<S, R>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: RngCore,
{
    pub fn new(stream: S, rng: R) -> Self {
        Self {
            stream,
            rng,
            session: None,
            state: ChannelState::AwaitingExchange,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Binds a session whose key has already been derived.
    pub fn establish(&mut self, session: Session) -> Result<()> {
        if self.state != ChannelState::AwaitingExchange {
            return Err(DhError::State(format!(
                "cannot establish a key in state {:?}",
                self.state
            )));
        }
        if session.key().is_none() {
            return Err(DhError::State(
                "session has not derived a key".to_string(),
            ));
        }
        self.session = Some(session);
        self.state = ChannelState::KeyEstablished;
        Ok(())
    }

    pub async fn send(&mut self, message: &Message) -> Result<()> {
        self.ensure_open()?;
        if message.message_type() == MessageType::Encrypted
            && self.state == ChannelState::AwaitingExchange
        {
            return Err(DhError::State(
                "cannot send an encrypted frame before a key is established".to_string(),
            ));
        }
        let frame = message.to_frame()?;
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        debug!(kind = %message.message_type(), len = frame.len(), "sent frame");
        Ok(())
    }

    /// Reads one frame, failing if the stream closes first.
    pub async fn receive(&mut self, expected: MessageType) -> Result<Message> {
        self.try_receive(expected).await?.ok_or_else(|| {
            DhError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("stream closed while awaiting {} frame", expected),
            ))
        })
    }

    /// Reads one frame, or `None` when the peer closed cleanly between frames.
    pub async fn try_receive(&mut self, expected: MessageType) -> Result<Option<Message>> {
        self.ensure_open()?;
        let mut tag = [0u8; 1];
        if self.stream.read(&mut tag).await? == 0 {
            return Ok(None);
        }
        let actual = MessageType::try_from(tag[0])?;
        if actual == MessageType::Encrypted && self.state == ChannelState::AwaitingExchange {
            return Err(DhError::Protocol {
                expected: MessageType::Exchange,
                actual,
            });
        }
        let len = self.stream.read_u32().await? as usize;
        if len > MAX_PAYLOAD_LEN {
            return Err(DhError::Decode(format!(
                "payload of {} bytes exceeds the {} byte limit",
                len, MAX_PAYLOAD_LEN
            )));
        }
        if actual != expected {
            return Err(DhError::Protocol { expected, actual });
        }
        let mut payload = vec![0u8; len];
        self.stream.read_exact(&mut payload).await?;
        debug!(kind = %actual, len, "received frame");
        Message::from_payload(actual, &payload).map(Some)
    }

    pub async fn send_exchange(&mut self, exchange: Exchange) -> Result<()> {
        self.send(&Message::Exchange(exchange)).await
    }

    pub async fn receive_exchange(&mut self) -> Result<Exchange> {
        match self.receive(MessageType::Exchange).await? {
            Message::Exchange(exchange) => Ok(exchange),
            Message::Encrypted(_) => Err(DhError::Protocol {
                expected: MessageType::Exchange,
                actual: MessageType::Encrypted,
            }),
        }
    }

    pub async fn send_encrypted(&mut self, plaintext: &[u8]) -> Result<()> {
        let key = *self.key()?;
        // Padding adds up to one block and the IV another.
        if plaintext.len() + 2 * BLOCK_SIZE > MAX_SEALED_LEN {
            return Err(DhError::State(format!(
                "plaintext of {} bytes is too large to send",
                plaintext.len()
            )));
        }
        let mut iv = [0u8; BLOCK_SIZE];
        self.rng.fill_bytes(&mut iv);
        self.forward(EncryptedMessage::seal(plaintext, &key, iv)).await
    }

    pub async fn receive_encrypted(&mut self) -> Result<Vec<u8>> {
        let sealed = self.receive_sealed().await?;
        self.open(&sealed)
    }

    /// Like [`StreamChannel::receive_encrypted`], but `None` on a clean close.
    pub async fn try_receive_encrypted(&mut self) -> Result<Option<Vec<u8>>> {
        match self.try_receive_sealed().await? {
            Some(sealed) => self.open(&sealed).map(Some),
            None => Ok(None),
        }
    }

    /// Receives an encrypted frame without decrypting it.
    pub async fn receive_sealed(&mut self) -> Result<EncryptedMessage> {
        self.key()?;
        match self.receive(MessageType::Encrypted).await? {
            Message::Encrypted(sealed) => Ok(sealed),
            Message::Exchange(_) => Err(DhError::Protocol {
                expected: MessageType::Encrypted,
                actual: MessageType::Exchange,
            }),
        }
    }

    pub async fn try_receive_sealed(&mut self) -> Result<Option<EncryptedMessage>> {
        self.key()?;
        match self.try_receive(MessageType::Encrypted).await? {
            Some(Message::Encrypted(sealed)) => Ok(Some(sealed)),
            Some(Message::Exchange(_)) => Err(DhError::Protocol {
                expected: MessageType::Encrypted,
                actual: MessageType::Exchange,
            }),
            None => Ok(None),
        }
    }

    /// Sends an already encrypted message as is.
    pub async fn forward(&mut self, sealed: EncryptedMessage) -> Result<()> {
        self.key()?;
        self.send(&Message::Encrypted(sealed)).await?;
        self.state = ChannelState::ExchangingEncrypted;
        Ok(())
    }

    /// Decrypts with this channel's key.
    pub fn open(&mut self, sealed: &EncryptedMessage) -> Result<Vec<u8>> {
        let plaintext = sealed.open(self.key()?)?;
        self.state = ChannelState::ExchangingEncrypted;
        Ok(plaintext)
    }

    pub async fn close(&mut self) -> Result<()> {
        if self.state == ChannelState::Closed {
            return Ok(());
        }
        self.state = ChannelState::Closed;
        self.stream.shutdown().await?;
        Ok(())
    }

    fn key(&self) -> Result<&SymmetricKey> {
        self.ensure_open()?;
        self.session
            .as_ref()
            .and_then(Session::key)
            .ok_or_else(|| DhError::State("no key has been derived yet".to_string()))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == ChannelState::Closed {
            return Err(DhError::State("channel is closed".to_string()));
        }
        Ok(())
    }
}
