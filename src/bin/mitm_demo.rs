use dh_mitm::{spawn_relay, spawn_responder, Config, Initiator};

use rand::{rngs::StdRng, SeedableRng};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).unwrap();

    let config = Config::from_env().unwrap();
    let responder = spawn_responder(config.responder_addr, StdRng::from_entropy())
        .await
        .unwrap();
    let relay = spawn_relay(config.relay_addr, responder, StdRng::from_entropy())
        .await
        .unwrap();

    let initiator = Initiator::new(config.group, StdRng::from_entropy());
    let reply = initiator
        .connect(relay, config.message.as_bytes())
        .await
        .unwrap();
    info!(reply = %String::from_utf8_lossy(&reply), "initiator received echo");
}
