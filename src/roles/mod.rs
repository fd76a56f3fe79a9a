// Diffie-Hellman echo protocol and its man-in-the-middle
mod initiator;
mod relay;
mod responder;

pub use initiator::Initiator;
pub use relay::{
    accept_initiator, open_responder, spawn_relay, Direction, Interception, Relay, RelayLegs,
};
pub use responder::{respond, spawn_responder, Responder};

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{key_from_secret, ChannelState, DhError, Exchange, Group, MessageType};

    use num_bigint::BigUint;
    use num_traits::Zero;
    use rand::{rngs::StdRng, SeedableRng};
    use tokio::io::{duplex, AsyncWriteExt};

    const SECRET_MESSAGE: &[u8] = b"Go Ninja, Go Ninja, GO: Go Ninja, Go Ninja, GO!";

    #[tokio::test]
    async fn initiator_and_responder_agree_on_a_key() {
        let (a, b) = duplex(8192);
        let initiator = Initiator::new(Group::modp1536(), StdRng::from_seed([101; 32]));

        let (alice, bob) = tokio::join!(initiator.handshake(a), async {
            let mut channel = crate::StreamChannel::new(b, StdRng::from_seed([102; 32]));
            let exchange = channel.receive_exchange().await?;
            let mut rng = StdRng::from_seed([103; 32]);
            let mut session = crate::Session::new(exchange.group.clone(), &mut rng)?;
            session.derive_key(&exchange.public_key)?;
            channel
                .send_exchange(Exchange {
                    group: exchange.group,
                    public_key: session.public_key().clone(),
                })
                .await?;
            Ok::<_, DhError>(session)
        });

        let alice = alice.unwrap();
        let bob = bob.unwrap();
        assert_eq!(alice.state(), ChannelState::KeyEstablished);
        assert_eq!(alice.session().unwrap().key(), bob.key());
    }

    #[tokio::test]
    async fn responder_echoes_initiator_message() {
        let (a, b) = duplex(8192);
        let initiator = Initiator::new(Group::small(), StdRng::seed_from_u64(1));

        let (reply, echoed) = tokio::join!(
            initiator.run(a, SECRET_MESSAGE),
            respond(b, StdRng::seed_from_u64(2)),
        );

        assert_eq!(reply.unwrap(), SECRET_MESSAGE);
        assert_eq!(echoed.unwrap(), 1);
    }

    #[tokio::test]
    async fn responder_returns_protocol_error_given_encrypted_frame_first() {
        let (mut raw, b) = duplex(8192);
        let sealed = crate::EncryptedMessage::seal(b"no key yet", &[0u8; 16], [0u8; 16]);
        raw.write_all(&crate::Message::Encrypted(sealed).to_frame().unwrap())
            .await
            .unwrap();

        let result = respond(b, StdRng::seed_from_u64(2)).await;

        assert!(matches!(
            result,
            Err(DhError::Protocol {
                expected: MessageType::Exchange,
                actual: MessageType::Encrypted,
            })
        ));
    }

    #[tokio::test]
    async fn encrypted_frame_before_exchange_derives_no_key() {
        let (mut raw, b) = duplex(8192);
        let mut bob = crate::StreamChannel::new(b, StdRng::seed_from_u64(2));
        let sealed = crate::EncryptedMessage::seal(SECRET_MESSAGE, &[0u8; 16], [0u8; 16]);
        raw.write_all(&crate::Message::Encrypted(sealed).to_frame().unwrap())
            .await
            .unwrap();

        let result = bob.receive_exchange().await;
        let decrypted = bob.receive_encrypted().await;

        assert!(matches!(result, Err(DhError::Protocol { .. })));
        assert!(bob.session().is_none());
        assert_eq!(bob.state(), ChannelState::AwaitingExchange);
        assert!(matches!(decrypted, Err(DhError::State(_))));
    }

    #[tokio::test]
    async fn responder_returns_domain_error_given_degenerate_group() {
        let (a, b) = duplex(8192);
        let mut alice = crate::StreamChannel::new(a, StdRng::seed_from_u64(1));
        alice
            .send_exchange(Exchange {
                group: Group::new(BigUint::from(2u32), BigUint::from(1u32)),
                public_key: BigUint::from(1u32),
            })
            .await
            .unwrap();

        let result = respond(b, StdRng::seed_from_u64(2)).await;

        assert!(matches!(result, Err(DhError::Domain(_))));
    }

    #[tokio::test]
    async fn relay_decrypts_both_directions_without_breaking_the_echo() {
        let (alice_stream, eve_down) = duplex(8192);
        let (eve_up, bob_stream) = duplex(8192);
        let initiator = Initiator::new(Group::modp1536(), StdRng::seed_from_u64(1));
        let mut eve_rng = StdRng::seed_from_u64(3);

        let eve = async {
            let (down, forged) = accept_initiator(eve_down, &mut eve_rng).await?;
            let up = open_responder(eve_up, forged, &mut eve_rng).await?;
            let mut legs = RelayLegs::new(down, up);
            let transcript = legs.relay().await?;
            let keys = (
                *legs.initiator().session().unwrap().key().unwrap(),
                *legs.responder().session().unwrap().key().unwrap(),
            );
            Ok::<_, DhError>((transcript, keys))
        };
        let (reply, eve, echoed) = tokio::join!(
            initiator.run(alice_stream, SECRET_MESSAGE),
            eve,
            respond(bob_stream, StdRng::seed_from_u64(2)),
        );

        assert_eq!(reply.unwrap(), SECRET_MESSAGE);
        assert_eq!(echoed.unwrap(), 1);
        let (transcript, (down_key, up_key)) = eve.unwrap();
        assert_eq!(
            transcript,
            vec![
                Interception {
                    direction: Direction::InitiatorToResponder,
                    plaintext: SECRET_MESSAGE.to_vec(),
                },
                Interception {
                    direction: Direction::ResponderToInitiator,
                    plaintext: SECRET_MESSAGE.to_vec(),
                },
            ]
        );
        assert_eq!(down_key, up_key);
        assert_eq!(down_key, key_from_secret(&BigUint::zero()));
    }

    #[tokio::test]
    async fn relay_hands_both_parties_the_modulus_as_public_value() {
        let (a, eve_down) = duplex(8192);
        let (eve_up, b) = duplex(8192);
        let group = Group::small();
        let mut eve_rng = StdRng::seed_from_u64(3);
        let mut alice = crate::StreamChannel::new(a, StdRng::seed_from_u64(1));
        let mut bob = crate::StreamChannel::new(b, StdRng::seed_from_u64(2));

        alice
            .send_exchange(Exchange {
                group: group.clone(),
                public_key: BigUint::from(8u32),
            })
            .await
            .unwrap();
        let (_down, forged) = accept_initiator(eve_down, &mut eve_rng).await.unwrap();
        let to_alice = alice.receive_exchange().await.unwrap();
        bob.send_exchange(Exchange {
            group: group.clone(),
            public_key: BigUint::from(23u32),
        })
        .await
        .unwrap();
        let _up = open_responder(eve_up, forged, &mut eve_rng).await.unwrap();
        let to_bob = bob.receive_exchange().await.unwrap();

        assert_eq!(to_alice.public_key, BigUint::from(37u32));
        assert_eq!(to_bob.public_key, BigUint::from(37u32));
        assert_eq!(to_bob.group, group);
    }

    #[tokio::test]
    async fn relay_returns_decrypt_error_given_corrupted_ciphertext() {
        let (a, eve_down) = duplex(8192);
        let (eve_up, b) = duplex(8192);
        let initiator = Initiator::new(Group::small(), StdRng::seed_from_u64(1));
        let mut eve_rng = StdRng::seed_from_u64(3);

        let alice = async {
            let mut channel = initiator.handshake(a).await?;
            channel
                .forward(crate::EncryptedMessage::from(vec![0u8; 15 + 16]))
                .await?;
            Ok::<_, DhError>(channel)
        };
        let eve = async {
            let (down, forged) = accept_initiator(eve_down, &mut eve_rng).await?;
            let up = open_responder(eve_up, forged, &mut eve_rng).await?;
            RelayLegs::new(down, up).relay().await
        };
        let (alice, eve, bob) = tokio::join!(alice, eve, respond(b, StdRng::seed_from_u64(2)));

        assert!(alice.is_ok());
        assert!(matches!(eve, Err(DhError::Decrypt(_))));
        // Bob's leg is dropped with Eve, which he sees as a clean close.
        assert_eq!(bob.unwrap(), 0);
    }

    #[tokio::test]
    async fn attack_works_over_tcp() {
        let responder = spawn_responder("127.0.0.1:0", StdRng::seed_from_u64(2))
            .await
            .unwrap();
        let relay = spawn_relay("127.0.0.1:0", responder, StdRng::seed_from_u64(3))
            .await
            .unwrap();
        let initiator = Initiator::new(Group::modp1536(), StdRng::seed_from_u64(1));

        let reply = initiator.connect(relay, SECRET_MESSAGE).await.unwrap();

        assert_eq!(reply, SECRET_MESSAGE);
    }

    #[tokio::test]
    async fn responder_keeps_serving_after_a_bad_connection() {
        let addr = spawn_responder("127.0.0.1:0", StdRng::seed_from_u64(2))
            .await
            .unwrap();
        let mut bad = tokio::net::TcpStream::connect(addr).await.unwrap();
        bad.write_all(&[0xde, 0xad, 0xbe, 0xef]).await.unwrap();
        drop(bad);

        let clients = (0..4u64).map(|seed| {
            Initiator::new(Group::small(), StdRng::seed_from_u64(seed))
                .connect(addr, SECRET_MESSAGE)
        });
        let replies = futures::future::join_all(clients).await;

        for reply in replies {
            assert_eq!(reply.unwrap(), SECRET_MESSAGE);
        }
    }
}
