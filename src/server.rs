//! The chat engine: one owner for accounts and sessions behind a single lock.
//!
//! Every unary call and every chat stream goes through [`ChatServer`]. The lock
//! is held for map reads/writes and for a broadcast fan-out; fan-out only
//! enqueues onto bounded outboxes, so it never waits on a socket.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    appresult::{ChatError, Status},
    config::Config,
    db::{Account, AccountStore, PublicProfile, StoreError},
    reputation::LikeOutcome,
    rooms::{ClientFrame, ServerFrame, SERVER_SENDER},
    session::{PeerStatus, Sessions, StreamHandle},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
    pub username: String,
    pub status: Status,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: String,
    pub timestamp: i64,
    pub status: Status,
}

impl Receipt {
    fn new(sender: &str, status: Status) -> Self {
        let timestamp = OffsetDateTime::now_utc().unix_timestamp();
        Self {
            id: format!("{timestamp}-{sender}"),
            timestamp,
            status,
        }
    }
}

/// What happened to a room message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    /// Broadcast; `delivered` recipients accepted the frame.
    Broadcast { delivered: usize },
    /// The gate held it back and the poster was told to get more likes.
    NeedMoreLikes,
}

/// A stream that made it past identity: it is registered and owns `outbox`.
#[derive(Debug)]
pub struct Joined {
    pub username: String,
    pub stream_id: Uuid,
    pub outbox: mpsc::Receiver<ServerFrame>,
}

struct Shared {
    accounts: AccountStore,
    sessions: Sessions,
}

pub struct ChatServer {
    shared: Mutex<Shared>,
    outbox_capacity: usize,
    send_timeout: Duration,
}

impl ChatServer {
    pub fn new(accounts: AccountStore, outbox_capacity: usize, send_timeout: Duration) -> Self {
        Self {
            shared: Mutex::new(Shared {
                accounts,
                sessions: Sessions::default(),
            }),
            outbox_capacity,
            send_timeout,
        }
    }

    pub async fn open(config: &Config) -> Result<Self, StoreError> {
        let accounts = AccountStore::load(&config.accounts_path).await?;
        info!(
            "loaded {} accounts from {}",
            accounts.accounts().len(),
            accounts.path().display()
        );
        Ok(Self::new(accounts, config.outbox_capacity, config.send_timeout))
    }

    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    pub async fn register(&self, account: Account) -> Result<AuthResult, ChatError> {
        info!("register request from {}", account.username);

        if account.username.trim().is_empty() || account.password.is_empty() {
            return Err(ChatError::InvalidInput(
                "Blank username or password is not allowed!".to_owned(),
            ));
        }
        if account.username.trim().eq_ignore_ascii_case(SERVER_SENDER) {
            return Err(ChatError::InvalidInput(format!(
                "Username {SERVER_SENDER} is reserved!"
            )));
        }

        let mut shared = self.shared.lock().await;
        if shared.accounts.contains(&account.username) {
            warn!("username {} is already taken", account.username);
            return Err(ChatError::DuplicateUsername(account.username));
        }

        let username = account.username.clone();
        if let Err(err) = shared.accounts.append(account).await {
            error!("register of {username} failed, accounts are not being persisted: {err}");
            return Err(err.into());
        }

        info!("{username} was registered successfully");
        Ok(AuthResult {
            message: format!("{username} was registered successfully!"),
            username,
            status: Status::Ok,
            token: None,
        })
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<AuthResult, ChatError> {
        info!("login request from {username}");

        let mut guard = self.shared.lock().await;
        let Shared { accounts, sessions } = &mut *guard;

        let token = sessions.login(username, || match accounts.find(username) {
            None => Err(ChatError::Unauthenticated(format!(
                "Failed to login as {username}: user not found!"
            ))),
            Some(account) if account.password != password => Err(ChatError::Unauthenticated(
                format!("Failed to login as {username}: wrong password!"),
            )),
            Some(_) => Ok(()),
        });

        let token = match token {
            Ok(token) => token,
            Err(err) => {
                warn!("{err}");
                return Err(err);
            }
        };

        let message = format!("User {username} has logged in successfully!");
        info!("{message}");
        broadcast(sessions, &ServerFrame::system(&message), None);

        Ok(AuthResult {
            username: username.to_owned(),
            status: Status::Ok,
            message,
            token: Some(token),
        })
    }

    /// Turns a stream's first frame into a registered session stream.
    /// Rejections leave every map untouched.
    pub async fn join(&self, hello: &ClientFrame) -> Result<Joined, ChatError> {
        let username = hello.sender.as_str();
        info!("user {username} requests to join the chat room");

        let mut shared = self.shared.lock().await;
        let sessions = &mut shared.sessions;

        if !sessions.is_logged_in(username) {
            return Err(ChatError::Unauthenticated(format!(
                "Unlogged in user {username} is not permitted to chat!"
            )));
        }
        if let Some(token) = hello.token.as_deref() {
            if !sessions.token_matches(username, token) {
                return Err(ChatError::Unauthenticated(format!(
                    "Session token of {username} does not match"
                )));
            }
        }

        let (handle, outbox) = StreamHandle::channel(self.outbox_capacity);
        let stream_id = handle.id();
        // queue is empty, this cannot be full
        let _ = handle.deliver(ServerFrame::system(format!("Welcome to the chat room {username}!")));
        sessions.attach(username, handle)?;

        info!("user {username} joined the chat room");
        Ok(Joined {
            username: username.to_owned(),
            stream_id,
            outbox,
        })
    }

    /// A room message from `username`, gated on their likes.
    pub async fn post(&self, username: &str, text: &str) -> Result<PostOutcome, ChatError> {
        info!("room chat request from {username}: {text}");

        let mut shared = self.shared.lock().await;
        let sessions = &mut shared.sessions;

        let Some(reputation) = sessions.reputation(username) else {
            return Err(ChatError::Unauthenticated(format!("{username} is not logged in")));
        };

        if !reputation.can_post() {
            info!("user {username} has not enough likes to send a new message to the room");
            if let Some(handle) = sessions.stream(username) {
                if let Err(err) = handle.deliver(ServerFrame::system(
                    "Get more likes to send messages to the room!",
                )) {
                    warn!("error sending notice to {username}: {err}");
                }
            }
            return Ok(PostOutcome::NeedMoreLikes);
        }

        let delivered = broadcast(sessions, &ServerFrame::chat(username, text), Some(username));
        if let Some(reputation) = sessions.reputation_mut(username) {
            reputation.on_posted();
        }

        Ok(PostOutcome::Broadcast { delivered })
    }

    /// Ends the session owned by `stream_id`, whatever closed the stream.
    pub async fn leave(&self, username: &str, stream_id: Uuid) {
        let mut shared = self.shared.lock().await;
        if shared.sessions.detach(username, stream_id) {
            info!("user {username} left the chat room and was logged out");
        }
    }

    pub async fn like(&self, liker: &str, target: &str) -> Result<Receipt, ChatError> {
        if liker == target {
            return Err(ChatError::InvalidInput(format!("{liker} cannot like their own message")));
        }

        let mut shared = self.shared.lock().await;
        let sessions = &mut shared.sessions;

        if !sessions.is_logged_in(liker) {
            return Err(ChatError::Unauthenticated(format!("{liker} is not logged in")));
        }
        let Some(reputation) = sessions.reputation_mut(target) else {
            return Err(ChatError::NotFound(format!("User {target} not found or offline!")));
        };

        let (status, notice) = match reputation.like(liker) {
            LikeOutcome::Accepted => {
                info!("user {liker} just liked the message of {target}");
                (Status::Ok, format!("{liker} just liked the message of {target}"))
            }
            LikeOutcome::AlreadyLiked => {
                let err = ChatError::AlreadyLiked {
                    liker: liker.to_owned(),
                    target: target.to_owned(),
                };
                warn!("{err}");
                (
                    err.status(),
                    format!("{liker} requested to like the message of {target} but was rejected"),
                )
            }
        };

        broadcast(sessions, &ServerFrame::system(notice), None);
        Ok(Receipt::new(liker, status))
    }

    pub async fn send_private(
        &self,
        sender: &str,
        recipient: &str,
        text: &str,
    ) -> Result<Receipt, ChatError> {
        info!("{sender} sends a private message to {recipient}");

        let shared = self.shared.lock().await;
        if !shared.sessions.is_logged_in(sender) {
            return Err(ChatError::Unauthenticated(format!("{sender} is not logged in")));
        }
        let Some(handle) = shared.sessions.stream(recipient) else {
            return Err(ChatError::NotFound(format!("User {recipient} not found!")));
        };

        if let Err(err) = handle.deliver(ServerFrame::private(sender, text)) {
            warn!("failed sending message from {sender} to {recipient}: {err}");
            return Err(ChatError::NotFound(format!(
                "Message to {recipient} could not be delivered: {err}"
            )));
        }

        info!("message sent from {sender} to {recipient} successfully");
        Ok(Receipt::new(sender, Status::Ok))
    }

    pub async fn connected_peers(&self, requester: &str) -> Vec<PeerStatus> {
        info!("{requester} requested the connected users list");
        let shared = self.shared.lock().await;
        shared.sessions.list_known(shared.accounts.accounts(), requester)
    }

    pub async fn peer_info(&self, requester: &str, target: &str) -> Result<PublicProfile, ChatError> {
        info!("{requester} requested information about {target}");
        let shared = self.shared.lock().await;
        shared
            .accounts
            .find(target)
            .map(PublicProfile::from)
            .ok_or_else(|| ChatError::NotFound(format!("User {target} not found!")))
    }

    pub async fn is_online(&self, username: &str) -> bool {
        self.shared.lock().await.sessions.is_online(username)
    }

    pub async fn eligible_count(&self, username: &str) -> Option<u32> {
        let shared = self.shared.lock().await;
        shared.sessions.reputation(username).map(|rep| rep.eligible_count())
    }
}

/// Best-effort fan-out to every attached stream except `except`.
/// Returns how many recipients took the frame.
fn broadcast(sessions: &Sessions, frame: &ServerFrame, except: Option<&str>) -> usize {
    let mut delivered = 0;
    for (recipient, handle) in sessions.streams() {
        if Some(recipient) == except {
            continue;
        }
        match handle.deliver(frame.clone()) {
            Ok(()) => delivered += 1,
            Err(err) => warn!("error sending message to {recipient}: {err}"),
        }
    }
    delivered
}
