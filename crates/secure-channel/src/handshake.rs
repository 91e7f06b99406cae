//! Public key exchange and session key derivation
//!
//! ```text
//! Initiator                              Responder
//!   | Init                                 Init |
//!   |------------- public key ---------------->|
//!   | KeySent                           KeyReceived
//!   |<------------ public key -----------------|
//!   | KeyReceived                               |
//!   |                                           |
//!   |  [Both hash the ECDH secret into a key]   |
//!   | Established                   Established |
//! ```
//!
//! Each key travels as one transport write with no length prefix. The
//! receiver reads exactly the key length of the configured encoding. There
//! are no retries: the first error fails the handshake for good.

use std::sync::Arc;

use channel_protocol::{ChannelConfig, ChannelState, PublicKeyBytes, Role, SessionId};
use crypto_session::{KeyPair, SymmetricCipher, SymmetricKey, fingerprint};
use net_transport::TransportAdapter;
use tracing::info_span;

use crate::{
    ChannelError, ChannelEvent, ChannelObserver, ChannelResult, SecureChannel, TracingObserver,
};

/// Handshake in progress over one transport
pub struct ChannelHandshake<T: TransportAdapter> {
    session_id: SessionId,
    role: Role,
    config: ChannelConfig,
    transport: T,
    keypair: KeyPair,
    state: ChannelState,
    key_sent: bool,
    session_key: Option<SymmetricKey>,
    observer: Arc<dyn ChannelObserver>,
}

impl<T: TransportAdapter> ChannelHandshake<T> {
    /// Validate the config, apply transport timeouts and generate the
    /// ephemeral key pair
    pub fn new(mut transport: T, role: Role, config: ChannelConfig) -> ChannelResult<Self> {
        config.validate()?;
        transport.set_read_timeout(config.read_timeout())?;
        transport.set_write_timeout(config.write_timeout())?;

        Ok(Self {
            session_id: SessionId::new(),
            role,
            config,
            transport,
            keypair: KeyPair::generate(),
            state: ChannelState::Init,
            key_sent: false,
            session_key: None,
            observer: Arc::new(TracingObserver),
        })
    }

    /// Start a handshake that sends its key first
    pub fn initiator(transport: T, config: ChannelConfig) -> ChannelResult<Self> {
        Self::new(transport, Role::Initiator, config)
    }

    /// Start a handshake that waits for the peer's key
    pub fn responder(transport: T, config: ChannelConfig) -> ChannelResult<Self> {
        Self::new(transport, Role::Responder, config)
    }

    pub fn with_observer(mut self, observer: Arc<dyn ChannelObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Our encoded public key
    pub fn public_bytes(&self) -> ChannelResult<PublicKeyBytes> {
        Ok(self.keypair.public_bytes(self.config.key_encoding)?)
    }

    /// Run every step in role order
    pub fn run(mut self) -> ChannelResult<SecureChannel<T>> {
        let span = info_span!(
            "handshake",
            session = %self.session_id.short(),
            role = ?self.role,
            peer = %self.transport.peer_label()
        );
        let _guard = span.enter();

        if self.role.sends_first() {
            self.send_public_key()?;
            self.receive_public_key()?;
        } else {
            self.receive_public_key()?;
            self.send_public_key()?;
        }

        self.establish()
    }

    /// Write our public key as one transport write
    pub fn send_public_key(&mut self) -> ChannelResult<()> {
        let result = self.try_send_public_key();
        self.guard(result)
    }

    fn try_send_public_key(&mut self) -> ChannelResult<()> {
        match (self.role, self.state) {
            (Role::Initiator, ChannelState::Init) => {}
            (Role::Responder, ChannelState::KeyReceived) if !self.key_sent => {}
            (_, from) => return Err(Self::out_of_order(from, ChannelState::KeySent)),
        }

        let public = self.public_bytes()?;
        self.transport.send(public.as_bytes())?;
        self.key_sent = true;
        self.emit(ChannelEvent::PublicKeySent {
            bytes: public.len(),
        });

        if self.role == Role::Initiator {
            self.set_state(ChannelState::KeySent)?;
        }
        Ok(())
    }

    /// Read the peer's public key and derive the session key from it
    pub fn receive_public_key(&mut self) -> ChannelResult<()> {
        let result = self.try_receive_public_key();
        self.guard(result)
    }

    fn try_receive_public_key(&mut self) -> ChannelResult<()> {
        match (self.role, self.state) {
            (Role::Initiator, ChannelState::KeySent) | (Role::Responder, ChannelState::Init) => {}
            (_, from) => return Err(Self::out_of_order(from, ChannelState::KeyReceived)),
        }

        // Read no further than the key so a message sent right behind it
        // stays on the stream for the channel
        let encoding = self.config.key_encoding;
        let max = self.config.max_handshake_size.min(encoding.encoded_len());
        let data = self.transport.receive(max)?;
        let peer = PublicKeyBytes::new(encoding, data);

        self.emit(ChannelEvent::PublicKeyReceived {
            bytes: peer.len(),
            fingerprint: fingerprint(peer.as_bytes()),
        });

        self.session_key = Some(self.keypair.compute_shared_secret(&peer)?);
        self.set_state(ChannelState::KeyReceived)
    }

    /// Finish the handshake and hand the transport to a ready channel.
    ///
    /// The ephemeral key pair is dropped here.
    pub fn establish(mut self) -> ChannelResult<SecureChannel<T>> {
        let result = self.try_establish();
        let key = self.guard(result)?;

        Ok(SecureChannel::new(
            self.session_id,
            self.role,
            self.config,
            self.transport,
            SymmetricCipher::new(key),
            self.observer,
        ))
    }

    fn try_establish(&mut self) -> ChannelResult<SymmetricKey> {
        if self.state != ChannelState::KeyReceived || !self.key_sent {
            return Err(Self::out_of_order(self.state, ChannelState::Established));
        }

        let key = self
            .session_key
            .take()
            .ok_or(ChannelError::NotEstablished(self.state))?;

        self.set_state(ChannelState::Established)?;
        self.emit(ChannelEvent::Established {
            key_fingerprint: key.fingerprint(),
        });
        Ok(key)
    }

    fn out_of_order(from: ChannelState, to: ChannelState) -> ChannelError {
        channel_protocol::ProtocolError::InvalidStateTransition { from, to }.into()
    }

    fn set_state(&mut self, next: ChannelState) -> ChannelResult<()> {
        let from = self.state;
        self.state = from.transition(next)?;
        self.emit(ChannelEvent::StateChanged {
            from,
            to: self.state,
        });
        Ok(())
    }

    /// Any handshake error is terminal: mark failed and close the transport
    fn guard<R>(&mut self, result: ChannelResult<R>) -> ChannelResult<R> {
        if let Err(e) = &result {
            if !self.state.is_terminal() {
                let reason = e.to_string();
                let _ = self.set_state(ChannelState::Failed);
                self.emit(ChannelEvent::Failed { reason });
                self.transport.close();
            }
        }
        result
    }

    fn emit(&self, event: ChannelEvent) {
        self.observer.on_event(self.session_id, &event);
    }
}

/// Run a full handshake with the default observer
pub fn establish<T: TransportAdapter>(
    transport: T,
    role: Role,
    config: ChannelConfig,
) -> ChannelResult<SecureChannel<T>> {
    ChannelHandshake::new(transport, role, config)?.run()
}

#[cfg(test)]
mod tests {
    use std::thread;

    use channel_protocol::KeyEncoding;
    use net_transport::MemoryTransport;

    use super::*;
    use crate::NoopObserver;

    #[test]
    fn test_handshake_states() {
        let (a, b) = MemoryTransport::pair();

        let mut initiator = ChannelHandshake::initiator(a, ChannelConfig::default()).unwrap();
        let mut responder = ChannelHandshake::responder(b, ChannelConfig::default()).unwrap();
        assert_eq!(initiator.state(), ChannelState::Init);

        initiator.send_public_key().unwrap();
        assert_eq!(initiator.state(), ChannelState::KeySent);

        responder.receive_public_key().unwrap();
        assert_eq!(responder.state(), ChannelState::KeyReceived);
        responder.send_public_key().unwrap();
        assert_eq!(responder.state(), ChannelState::KeyReceived);

        initiator.receive_public_key().unwrap();
        assert_eq!(initiator.state(), ChannelState::KeyReceived);

        let initiator = initiator.establish().unwrap();
        let responder = responder.establish().unwrap();
        assert_eq!(initiator.state(), ChannelState::Established);
        assert_eq!(responder.state(), ChannelState::Established);
    }

    #[test]
    fn test_run_both_roles() {
        let (a, b) = MemoryTransport::pair();

        let server = thread::spawn(move || establish(a, Role::Initiator, ChannelConfig::default()));
        let client = establish(b, Role::Responder, ChannelConfig::default()).unwrap();
        let server = server.join().unwrap().unwrap();

        assert_eq!(client.role(), Role::Responder);
        assert_eq!(server.role(), Role::Initiator);
        assert_ne!(client.session_id(), server.session_id());
    }

    #[test]
    fn test_out_of_order_step_fails_handshake() {
        let (a, _b) = MemoryTransport::pair();
        let mut initiator = ChannelHandshake::initiator(a, ChannelConfig::default()).unwrap();

        let err = initiator.receive_public_key().unwrap_err();
        assert!(matches!(err, ChannelError::Protocol(_)));
        assert_eq!(initiator.state(), ChannelState::Failed);

        // Terminal: further steps are rejected too
        assert!(initiator.send_public_key().is_err());
        assert_eq!(initiator.state(), ChannelState::Failed);
    }

    #[test]
    fn test_garbage_public_key_is_decode_error() {
        let (a, mut b) = MemoryTransport::pair();
        let mut responder = ChannelHandshake::responder(a, ChannelConfig::default()).unwrap();

        b.send(&[0x04; 65]).unwrap();

        let err = responder.receive_public_key().unwrap_err();
        assert!(err.is_decode());
        assert_eq!(responder.state(), ChannelState::Failed);
    }

    #[test]
    fn test_receive_stops_at_key_length() {
        let (a, mut b) = MemoryTransport::pair();
        let mut initiator = ChannelHandshake::initiator(a, ChannelConfig::default()).unwrap();
        initiator.send_public_key().unwrap();

        // Peer replies with its key and its first message in a single write
        let peer = KeyPair::generate();
        let ours = b.receive(4096).unwrap();
        let key = peer
            .compute_shared_secret(&PublicKeyBytes::new(KeyEncoding::Sec1, ours))
            .unwrap();
        let mut wire = peer.public_bytes(KeyEncoding::Sec1).unwrap().as_bytes().to_vec();
        wire.extend_from_slice(&SymmetricCipher::new(key).encrypt(b"right behind").unwrap().to_bytes());
        b.send(&wire).unwrap();

        initiator.receive_public_key().unwrap();
        let mut channel = initiator.establish().unwrap();
        assert_eq!(channel.receive().unwrap(), b"right behind");
    }

    #[test]
    fn test_bad_key_prefix_rejected() {
        let (a, mut b) = MemoryTransport::pair();
        let mut responder = ChannelHandshake::responder(a, ChannelConfig::default()).unwrap();

        // Only the first 65 bytes are taken as the key, and they are not a point
        let mut bytes = vec![0x04u8; 66];
        bytes[1] = 0xff;
        b.send(&bytes).unwrap();

        assert!(responder.receive_public_key().unwrap_err().is_decode());
        assert_eq!(responder.state(), ChannelState::Failed);
    }

    #[test]
    fn test_run_with_noop_observer() {
        let (a, b) = MemoryTransport::pair();

        let server = thread::spawn(move || {
            ChannelHandshake::initiator(a, ChannelConfig::default())?
                .with_observer(Arc::new(NoopObserver))
                .run()
        });
        let client = ChannelHandshake::responder(b, ChannelConfig::default())
            .unwrap()
            .with_observer(Arc::new(NoopObserver))
            .run()
            .unwrap();

        assert_eq!(server.join().unwrap().unwrap().state(), ChannelState::Established);
        assert_eq!(client.state(), ChannelState::Established);
    }

    #[test]
    fn test_public_bytes_follow_config() {
        let (a, _b) = MemoryTransport::pair();
        let config = ChannelConfig {
            key_encoding: KeyEncoding::Pem,
            ..Default::default()
        };
        let handshake = ChannelHandshake::initiator(a, config).unwrap();

        let public = handshake.public_bytes().unwrap();
        assert_eq!(public.encoding(), KeyEncoding::Pem);
        assert!(public.as_bytes().starts_with(b"-----BEGIN PUBLIC KEY-----"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (a, _b) = MemoryTransport::pair();
        let config = ChannelConfig {
            max_message_size: 8,
            ..Default::default()
        };

        assert!(matches!(
            ChannelHandshake::initiator(a, config),
            Err(ChannelError::Protocol(_))
        ));
    }
}
