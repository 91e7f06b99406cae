//! Established channel: encrypted send/receive over the transport
//!
//! One logical message is one transport write matched by one transport read
//! of at most `max_message_size` bytes. Only one message may be in flight;
//! there is no length prefix to split messages that arrive together.

use std::sync::Arc;

use channel_protocol::{ChannelConfig, ChannelState, Ciphertext, Role, SessionId};
use crypto_session::SymmetricCipher;
use net_transport::{TransportAdapter, TransportError};

use crate::{ChannelError, ChannelEvent, ChannelObserver, ChannelResult};

/// Channel ready for application traffic
pub struct SecureChannel<T: TransportAdapter> {
    session_id: SessionId,
    role: Role,
    config: ChannelConfig,
    transport: T,
    cipher: SymmetricCipher,
    state: ChannelState,
    observer: Arc<dyn ChannelObserver>,
    sent: u64,
    received: u64,
}

impl<T: TransportAdapter> SecureChannel<T> {
    pub(crate) fn new(
        session_id: SessionId,
        role: Role,
        config: ChannelConfig,
        transport: T,
        cipher: SymmetricCipher,
        observer: Arc<dyn ChannelObserver>,
    ) -> Self {
        Self {
            session_id,
            role,
            config,
            transport,
            cipher,
            state: ChannelState::Established,
            observer,
            sent: 0,
            received: 0,
        }
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

    pub fn peer_label(&self) -> String {
        self.transport.peer_label()
    }

    pub fn messages_sent(&self) -> u64 {
        self.sent
    }

    pub fn messages_received(&self) -> u64 {
        self.received
    }

    /// Encrypt and write one message.
    ///
    /// Any write failure ends the session, a timeout included, since part of
    /// the message may already be on the stream.
    pub fn send(&mut self, plaintext: &[u8]) -> ChannelResult<()> {
        self.ensure_established()?;

        let wire_len = Ciphertext::wire_len_for(plaintext.len());
        if wire_len > self.config.max_message_size {
            return Err(ChannelError::MessageTooLarge {
                size: wire_len,
                max: self.config.max_message_size,
            });
        }

        let ciphertext = match self.cipher.encrypt(plaintext) {
            Ok(ciphertext) => ciphertext,
            Err(e) => return Err(self.fail(e.into())),
        };

        match self.transport.send(&ciphertext.to_bytes()) {
            Ok(()) => {}
            Err(e) if e.is_retryable() => return Err(self.fail(ChannelError::SendTimeout)),
            Err(e) => return Err(self.fail(e.into())),
        }

        self.sent += 1;
        self.emit(ChannelEvent::MessageSent {
            sequence: self.sent,
            plaintext_len: plaintext.len(),
            wire_len,
        });
        Ok(())
    }

    /// Read one message and decrypt it.
    ///
    /// A timeout leaves the channel established. Any other error, including
    /// bad padding, ends the session.
    pub fn receive(&mut self) -> ChannelResult<Vec<u8>> {
        self.ensure_established()?;

        let data = match self.transport.receive(self.config.max_message_size) {
            Ok(data) => data,
            Err(e) if e.is_retryable() => {
                self.emit(ChannelEvent::Timeout);
                return Err(e.into());
            }
            Err(e) => return Err(self.fail(e.into())),
        };

        let plaintext = match self.cipher.decrypt(&data) {
            Ok(plaintext) => plaintext,
            Err(e) => return Err(self.fail(e.into())),
        };

        self.received += 1;
        self.emit(ChannelEvent::MessageReceived {
            sequence: self.received,
            plaintext_len: plaintext.len(),
            wire_len: data.len(),
        });
        Ok(plaintext)
    }

    /// Close the transport. The session cannot be resumed.
    pub fn close(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.transport.close();
        self.set_state(ChannelState::Closed);
        self.emit(ChannelEvent::Closed);
    }

    fn ensure_established(&self) -> ChannelResult<()> {
        match self.state {
            ChannelState::Established => Ok(()),
            ChannelState::Closed => Err(TransportError::ConnectionClosed(format!(
                "session {} was closed",
                self.session_id.short()
            ))
            .into()),
            state => Err(ChannelError::NotEstablished(state)),
        }
    }

    /// End the session on `error` and hand it back
    fn fail(&mut self, error: ChannelError) -> ChannelError {
        if error.is_closed() {
            self.transport.close();
            self.set_state(ChannelState::Closed);
            self.emit(ChannelEvent::Closed);
        } else {
            self.transport.close();
            self.set_state(ChannelState::Failed);
            self.emit(ChannelEvent::Failed {
                reason: error.to_string(),
            });
        }
        error
    }

    fn set_state(&mut self, next: ChannelState) {
        let from = self.state;
        if let Ok(to) = from.transition(next) {
            self.state = to;
            self.emit(ChannelEvent::StateChanged { from, to });
        }
    }

    fn emit(&self, event: ChannelEvent) {
        self.observer.on_event(self.session_id, &event);
    }
}
