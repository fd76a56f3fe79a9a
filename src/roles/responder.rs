use crate::{fork_rng, Exchange, Result, Session, StreamChannel};

use rand::{rngs::StdRng, RngCore};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, ToSocketAddrs},
};
use tracing::{error, info, info_span, warn, Instrument};

use std::net::SocketAddr;

/// Answers a handshake over whatever group the initiator proposes, then
/// echoes every encrypted message until the initiator closes.
///
/// Returns the number of messages echoed.
pub async fn respond<S, R>(stream: S, mut rng: R) -> Result<usize>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: RngCore,
{
    let mut session_rng = fork_rng(&mut rng);
    let mut channel = StreamChannel::new(stream, rng);
    let exchange = channel.receive_exchange().await?;

    let mut session = Session::new(exchange.group.clone(), &mut session_rng)?;
    session.derive_key(&exchange.public_key)?;
    let reply = Exchange {
        group: exchange.group,
        public_key: session.public_key().clone(),
    };
    channel.establish(session)?;
    channel.send_exchange(reply).await?;

    let mut echoed = 0;
    while let Some(message) = channel.try_receive_encrypted().await? {
        info!(len = message.len(), "echoing message");
        channel.send_encrypted(&message).await?;
        echoed += 1;
    }
    channel.close().await?;
    Ok(echoed)
}

/// Accept loop. Each connection runs in its own task with its own random
/// source; a failed connection is logged and never stops the loop.
pub struct Responder {
    rng: StdRng,
}

impl Responder {
    pub fn new(rng: StdRng) -> Self {
        Self { rng }
    }

    pub async fn serve(mut self, listener: TcpListener) {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "failed to accept connection");
                    continue;
                }
            };
            let rng = fork_rng(&mut self.rng);
            let span = info_span!("responder", %peer);
            tokio::spawn(
                async move {
                    info!("connection accepted");
                    match respond(stream, rng).await {
                        Ok(echoed) => info!(echoed, "connection closed"),
                        Err(e) => error!(error = %e, "connection failed"),
                    }
                }
                .instrument(span),
            );
        }
    }
}

/// Binds `address` and serves in the background, returning the bound address.
pub async fn spawn_responder(address: impl ToSocketAddrs, rng: StdRng) -> Result<SocketAddr> {
    let listener = TcpListener::bind(address).await?;
    let addr = listener.local_addr()?;
    info!(%addr, "responder listening");
    tokio::spawn(Responder::new(rng).serve(listener));
    Ok(addr)
}
