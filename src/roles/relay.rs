// Implement a MITM key-fixing attack on Diffie-Hellman with parameter injection
//
// Both honest parties are handed `p` as the other side's public value, so each
// computes s = p^x mod p = 0 and the key is SHA1(0)[..16], known in advance.
use crate::{fork_rng, Exchange, Result, Session, StreamChannel};

use rand::{rngs::StdRng, RngCore};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, TcpStream, ToSocketAddrs},
};
use tracing::{error, info, info_span, warn, Instrument};

use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    InitiatorToResponder,
    ResponderToInitiator,
}

/// A plaintext recovered while relaying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interception {
    pub direction: Direction,
    pub plaintext: Vec<u8>,
}

/// Leg facing the real initiator. Receives its exchange and answers with the
/// modulus in place of a public value.
///
/// Returns the forged exchange to pass on to the responder.
pub async fn accept_initiator<S, R>(
    stream: S,
    rng: &mut R,
) -> Result<(StreamChannel<S, StdRng>, Exchange)>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: RngCore,
{
    let mut channel = StreamChannel::new(stream, fork_rng(rng));
    let exchange = channel.receive_exchange().await?;
    info!(public_key = %exchange.public_key, "intercepted initiator public value");

    let mut session = Session::new(exchange.group.clone(), rng)?;
    session.derive_key(&exchange.group.p)?;
    channel.establish(session)?;

    let forged = Exchange {
        public_key: exchange.group.p.clone(),
        group: exchange.group,
    };
    channel.send_exchange(forged.clone()).await?;
    Ok((channel, forged))
}

/// Leg facing the real responder. Sends the forged exchange and throws away
/// the responder's public value; the key is already fixed.
pub async fn open_responder<S, R>(
    stream: S,
    forged: Exchange,
    rng: &mut R,
) -> Result<StreamChannel<S, StdRng>>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: RngCore,
{
    let mut channel = StreamChannel::new(stream, fork_rng(rng));
    let mut session = Session::new(forged.group.clone(), rng)?;
    session.derive_key(&forged.group.p)?;
    channel.send_exchange(forged).await?;

    let reply = channel.receive_exchange().await?;
    info!(public_key = %reply.public_key, "discarding responder public value");
    channel.establish(session)?;
    Ok(channel)
}

/// Both legs of one intercepted connection, each a channel bound to its own
/// fixed-key session.
pub struct RelayLegs<A, B> {
    initiator: StreamChannel<A, StdRng>,
    responder: StreamChannel<B, StdRng>,
}

impl<A, B> RelayLegs<A, B>
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(initiator: StreamChannel<A, StdRng>, responder: StreamChannel<B, StdRng>) -> Self {
        Self {
            initiator,
            responder,
        }
    }

    pub fn initiator(&self) -> &StreamChannel<A, StdRng> {
        &self.initiator
    }

    pub fn responder(&self) -> &StreamChannel<B, StdRng> {
        &self.responder
    }

    /// Passes ciphertext between the legs unchanged, decrypting each message
    /// on the way to record it. Ends when the initiator closes.
    pub async fn relay(&mut self) -> Result<Vec<Interception>> {
        let mut transcript = Vec::new();
        while let Some(sealed) = self.initiator.try_receive_sealed().await? {
            transcript.push(observe(
                self.initiator.open(&sealed)?,
                Direction::InitiatorToResponder,
            ));
            self.responder.forward(sealed).await?;

            let sealed = self.responder.receive_sealed().await?;
            transcript.push(observe(
                self.responder.open(&sealed)?,
                Direction::ResponderToInitiator,
            ));
            self.initiator.forward(sealed).await?;
        }
        self.responder.close().await?;
        self.initiator.close().await?;
        Ok(transcript)
    }
}

fn observe(plaintext: Vec<u8>, direction: Direction) -> Interception {
    info!(
        ?direction,
        plaintext = %String::from_utf8_lossy(&plaintext),
        "decrypted relayed message"
    );
    Interception {
        direction,
        plaintext,
    }
}

/// Accept loop that places itself between initiators and the responder at
/// `upstream`. Every accepted connection dials its own upstream connection.
pub struct Relay {
    upstream: SocketAddr,
    rng: StdRng,
}

impl Relay {
    pub fn new(upstream: SocketAddr, rng: StdRng) -> Self {
        Self { upstream, rng }
    }

    /// Runs the attack over one initiator connection. Both legs are dropped,
    /// and so closed, whichever way this returns.
    pub async fn intercept(
        upstream: SocketAddr,
        stream: TcpStream,
        mut rng: StdRng,
    ) -> Result<Vec<Interception>> {
        let (initiator, forged) = accept_initiator(stream, &mut rng).await?;
        let upstream = TcpStream::connect(upstream).await?;
        let responder = open_responder(upstream, forged, &mut rng).await?;
        RelayLegs::new(initiator, responder).relay().await
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
            let upstream = self.upstream;
            let span = info_span!("relay", %peer, %upstream);
            tokio::spawn(
                async move {
                    match Self::intercept(upstream, stream, rng).await {
                        Ok(transcript) => info!(messages = transcript.len(), "legs closed"),
                        Err(e) => error!(error = %e, "relay torn down"),
                    }
                }
                .instrument(span),
            );
        }
    }
}

/// Binds `address` and relays to `upstream` in the background, returning the
/// bound address.
pub async fn spawn_relay(
    address: impl ToSocketAddrs,
    upstream: SocketAddr,
    rng: StdRng,
) -> Result<SocketAddr> {
    let listener = TcpListener::bind(address).await?;
    let addr = listener.local_addr()?;
    info!(%addr, %upstream, "relay listening");
    tokio::spawn(Relay::new(upstream, rng).serve(listener));
    Ok(addr)
}
