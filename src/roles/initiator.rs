use crate::{Exchange, Group, Result, Session, StreamChannel};

use rand::RngCore;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpStream, ToSocketAddrs},
};
use tracing::{info, warn};

/// Opens the exchange: proposes the group, then talks over the agreed key.
pub struct Initiator<R> {
    group: Group,
    rng: R,
}

impl<R: RngCore> Initiator<R> {
    pub fn new(group: Group, rng: R) -> Self {
        Self { group, rng }
    }

    /// Runs the handshake and hands back a channel ready for encrypted traffic.
    pub async fn handshake<S>(mut self, stream: S) -> Result<StreamChannel<S, R>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut session = Session::new(self.group.clone(), &mut self.rng)?;
        let mut channel = StreamChannel::new(stream, self.rng);
        channel
            .send_exchange(Exchange {
                group: self.group,
                public_key: session.public_key().clone(),
            })
            .await?;

        let reply = channel.receive_exchange().await?;
        session.derive_key(&reply.public_key)?;
        channel.establish(session)?;
        info!("initiator agreed a session key");
        Ok(channel)
    }

    /// Sends `message` and returns the responder's reply.
    pub async fn run<S>(self, stream: S, message: &[u8]) -> Result<Vec<u8>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut channel = self.handshake(stream).await?;
        channel.send_encrypted(message).await?;
        let reply = channel.receive_encrypted().await?;
        if let Err(e) = channel.close().await {
            warn!(error = %e, "failed to shut down connection after reply");
        }
        Ok(reply)
    }

    pub async fn connect(self, address: impl ToSocketAddrs, message: &[u8]) -> Result<Vec<u8>> {
        let stream = TcpStream::connect(address).await?;
        self.run(stream, message).await
    }
}
