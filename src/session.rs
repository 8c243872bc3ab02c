use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::{appresult::ChatError, db::Account, reputation::Reputation, rooms::ServerFrame};

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("outbox is full")]
    Full,
    #[error("stream is closed")]
    Closed,
}

/// Server-side sending half of one attached chat stream.
///
/// Enqueueing never waits; the stream's writer task drains the queue into the socket.
#[derive(Debug)]
pub struct StreamHandle {
    id: Uuid,
    tx: mpsc::Sender<ServerFrame>,
}

impl StreamHandle {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ServerFrame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { id: Uuid::now_v7(), tx }, rx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn deliver(&self, frame: ServerFrame) -> Result<(), DeliveryError> {
        self.tx.try_send(frame).map_err(|err| match err {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Presence {
    Online,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerStatus {
    pub username: String,
    pub status: Presence,
}

/// Everything the server knows about one logged-in user.
#[derive(Debug)]
struct Session {
    token: String,
    stream: Option<StreamHandle>,
    reputation: Reputation,
}

/// Per-user session records. Having an entry means being logged in,
/// so an attached stream always implies a login.
#[derive(Debug, Default)]
pub struct Sessions {
    by_user: HashMap<String, Session>,
}

impl Sessions {
    /// Runs `validate` unless `username` is already logged in, then opens a
    /// fresh session and returns its token.
    pub fn login<F>(&mut self, username: &str, validate: F) -> Result<String, ChatError>
    where
        F: FnOnce() -> Result<(), ChatError>,
    {
        if self.is_logged_in(username) {
            return Err(ChatError::AlreadyAuthenticated(username.to_owned()));
        }

        validate()?;

        let token = new_token();
        self.by_user.insert(username.to_owned(), Session {
            token: token.clone(),
            stream: None,
            reputation: Reputation::fresh(),
        });
        Ok(token)
    }

    pub fn attach(&mut self, username: &str, handle: StreamHandle) -> Result<(), ChatError> {
        let Some(session) = self.by_user.get_mut(username) else {
            return Err(ChatError::Unauthenticated(format!(
                "Unlogged in user {username} is not permitted to chat!"
            )));
        };

        if session.stream.is_some() {
            return Err(ChatError::AlreadyAuthenticated(username.to_owned()));
        }

        session.stream = Some(handle);
        Ok(())
    }

    /// Ends the session owned by stream `stream_id`. Returns false when that
    /// stream is no longer the one registered for `username`.
    pub fn detach(&mut self, username: &str, stream_id: Uuid) -> bool {
        let owned = self
            .by_user
            .get(username)
            .and_then(|session| session.stream.as_ref())
            .is_some_and(|handle| handle.id == stream_id);

        if owned {
            self.by_user.remove(username);
        }
        owned
    }

    pub fn is_logged_in(&self, username: &str) -> bool {
        self.by_user.contains_key(username)
    }

    pub fn is_online(&self, username: &str) -> bool {
        self.stream(username).is_some()
    }

    pub fn token_matches(&self, username: &str, token: &str) -> bool {
        self.by_user
            .get(username)
            .is_some_and(|session| session.token == token)
    }

    pub fn stream(&self, username: &str) -> Option<&StreamHandle> {
        self.by_user.get(username)?.stream.as_ref()
    }

    pub fn streams(&self) -> impl Iterator<Item = (&str, &StreamHandle)> {
        self.by_user
            .iter()
            .filter_map(|(username, session)| Some((username.as_str(), session.stream.as_ref()?)))
    }

    pub fn reputation(&self, username: &str) -> Option<&Reputation> {
        self.by_user.get(username).map(|session| &session.reputation)
    }

    pub fn reputation_mut(&mut self, username: &str) -> Option<&mut Reputation> {
        self.by_user.get_mut(username).map(|session| &mut session.reputation)
    }

    /// Every registered user except `requester`, in registration order.
    pub fn list_known(&self, accounts: &[Account], requester: &str) -> Vec<PeerStatus> {
        accounts
            .iter()
            .filter(|account| account.username != requester)
            .map(|account| PeerStatus {
                username: account.username.clone(),
                status: if self.is_online(&account.username) {
                    Presence::Online
                } else {
                    Presence::Offline
                },
            })
            .collect()
    }
}

fn new_token() -> String {
    let bytes: [u8; 16] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok() -> Result<(), ChatError> {
        Ok(())
    }

    #[test]
    fn second_login_is_rejected_without_touching_first() {
        let mut sessions = Sessions::default();
        let token = sessions.login("alice", ok).unwrap();

        let err = sessions.login("alice", ok).unwrap_err();
        assert!(matches!(err, ChatError::AlreadyAuthenticated(_)));
        assert!(sessions.token_matches("alice", &token));
    }

    #[test]
    fn failed_validation_creates_nothing() {
        let mut sessions = Sessions::default();
        let err = sessions
            .login("alice", || Err(ChatError::Unauthenticated("wrong password".into())))
            .unwrap_err();
        assert!(matches!(err, ChatError::Unauthenticated(_)));
        assert!(!sessions.is_logged_in("alice"));
    }

    #[test]
    fn attach_requires_login() {
        let mut sessions = Sessions::default();
        let (handle, _rx) = StreamHandle::channel(4);
        assert!(matches!(
            sessions.attach("ghost", handle),
            Err(ChatError::Unauthenticated(_))
        ));
    }

    #[test]
    fn only_owning_stream_detaches() {
        let mut sessions = Sessions::default();
        sessions.login("alice", ok).unwrap();
        let (first, _rx1) = StreamHandle::channel(4);
        let first_id = first.id();
        sessions.attach("alice", first).unwrap();
        assert!(sessions.is_online("alice"));

        let (second, _rx2) = StreamHandle::channel(4);
        let second_id = second.id();
        assert!(sessions.attach("alice", second).is_err());

        assert!(!sessions.detach("alice", second_id));
        assert!(sessions.is_online("alice"));

        assert!(sessions.detach("alice", first_id));
        assert!(!sessions.is_online("alice"));
        assert!(!sessions.is_logged_in("alice"));
    }

    #[test]
    fn full_outbox_is_a_delivery_error() {
        let (handle, rx) = StreamHandle::channel(1);
        handle.deliver(ServerFrame::system("one")).unwrap();
        assert!(matches!(handle.deliver(ServerFrame::system("two")), Err(DeliveryError::Full)));

        drop(rx);
        assert!(matches!(handle.deliver(ServerFrame::system("three")), Err(DeliveryError::Closed)));
    }
}
