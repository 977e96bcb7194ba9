//! Local callback listener for the interactive login.
//!
//! Spotify redirects the browser to a loopback URI after the user grants
//! access. For the implicit grant the access token is only present in the URL
//! fragment, which browsers never send to a server, so the listener answers
//! `/redirect` with a small bridge page that re-navigates to `/token` with the
//! fragment promoted into the query string.
//!
//! ```text
//! Listening --GET /redirect--> ServedBridgePage --GET /token?access_token=..--> Captured --> Stopped
//! ```
//!
//! The first capture is delivered to the owner over a one-shot channel; the
//! owner then signals graceful shutdown. Later hits never replace it.

use std::{io, net::SocketAddr, sync::Arc, time::Duration};

use axum::{Extension, Router, routing::get};
use tokio::{
    net::TcpListener,
    sync::{Mutex, oneshot},
    task::JoinHandle,
};

use crate::{api, spotify::ApiError, types::AuthorizationEvent, warning};

/// Loopback address registered as redirect target with Spotify.
pub const CALLBACK_ADDR: &str = "127.0.0.1:43019";

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackMode {
    /// `/redirect` bridge page plus `/token` capture.
    Implicit,
    /// `/callback?code=..` capture.
    AuthorizationCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Listening,
    ServedBridgePage,
    Captured,
    Stopped,
}

/// Either the captured event or the error reported by the authorization server.
pub type CallbackOutcome = Result<AuthorizationEvent, String>;

pub type SharedCallbackState = Arc<Mutex<CallbackState>>;

pub struct CallbackState {
    state: ListenerState,
    expected_state: Option<String>,
    sender: Option<oneshot::Sender<CallbackOutcome>>,
}

impl CallbackState {
    pub fn new(expected_state: Option<String>, sender: oneshot::Sender<CallbackOutcome>) -> Self {
        Self {
            state: ListenerState::Listening,
            expected_state,
            sender: Some(sender),
        }
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    pub fn state_matches(&self, received: Option<&str>) -> bool {
        match &self.expected_state {
            Some(expected) => received == Some(expected.as_str()),
            None => true,
        }
    }

    pub fn bridge_served(&mut self) {
        if self.state == ListenerState::Listening {
            self.state = ListenerState::ServedBridgePage;
        }
    }

    /// Hands the outcome to the owner. Returns `false` if one was already
    /// delivered, in which case `outcome` is dropped.
    pub fn deliver(&mut self, outcome: CallbackOutcome) -> bool {
        let Some(sender) = self.sender.take() else {
            return false;
        };

        self.state = if outcome.is_ok() {
            ListenerState::Captured
        } else {
            ListenerState::Stopped
        };
        // the receiver is gone only when the owner already gave up waiting
        let _ = sender.send(outcome);
        true
    }

    fn stop(&mut self) {
        self.sender = None;
        self.state = ListenerState::Stopped;
    }
}

pub fn router(mode: CallbackMode, state: SharedCallbackState) -> Router {
    let routes = match mode {
        CallbackMode::Implicit => Router::new()
            .route("/redirect", get(api::redirect))
            .route("/token", get(api::token)),
        CallbackMode::AuthorizationCode => Router::new().route("/callback", get(api::callback)),
    };

    routes.layer(Extension(state))
}

/// A bound, not yet serving, callback listener.
pub struct CallbackListener {
    listener: TcpListener,
    mode: CallbackMode,
    expected_state: Option<String>,
}

impl CallbackListener {
    /// Binds [`CALLBACK_ADDR`].
    pub async fn bind(mode: CallbackMode, expected_state: Option<String>) -> io::Result<Self> {
        let listener = TcpListener::bind(CALLBACK_ADDR).await?;
        Ok(Self::from_listener(listener, mode, expected_state))
    }

    pub fn from_listener(
        listener: TcpListener,
        mode: CallbackMode,
        expected_state: Option<String>,
    ) -> Self {
        Self {
            listener,
            mode,
            expected_state,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves requests until one authorization attempt completes, then stops.
    ///
    /// # Errors
    ///
    /// [`ApiError::AuthorizationFailed`] when the server reports an error
    /// redirect, the HTTP server itself fails, or `timeout` elapses first.
    pub async fn wait(self, timeout: Duration) -> Result<AuthorizationEvent, ApiError> {
        let (event_tx, event_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let state: SharedCallbackState =
            Arc::new(Mutex::new(CallbackState::new(self.expected_state, event_tx)));
        let app = router(self.mode, Arc::clone(&state));

        let listener = self.listener;
        let mut server: JoinHandle<io::Result<()>> = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let (outcome, server_done) = tokio::select! {
            received = tokio::time::timeout(timeout, event_rx) => {
                let outcome = match received {
                    Ok(Ok(outcome)) => outcome.map_err(|e| {
                        ApiError::AuthorizationFailed(format!("Spotify returned `{}`", e))
                    }),
                    Ok(Err(_)) => Err(ApiError::AuthorizationFailed(
                        "callback listener stopped before authorization completed".to_string(),
                    )),
                    Err(_) => Err(ApiError::AuthorizationFailed(format!(
                        "no authorization received within {}s",
                        timeout.as_secs()
                    ))),
                };
                (outcome, false)
            }
            finished = &mut server => {
                let reason = match finished {
                    Ok(Ok(())) => "callback listener stopped unexpectedly".to_string(),
                    Ok(Err(e)) => format!("callback listener failed: {}", e),
                    Err(e) => format!("callback listener crashed: {}", e),
                };
                (Err(ApiError::AuthorizationFailed(reason)), true)
            }
        };

        state.lock().await.stop();
        let _ = shutdown_tx.send(());

        if !server_done {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
                Ok(Ok(Err(e))) => warning!("Callback listener shut down with an error: {}", e),
                Ok(_) => {}
                Err(_) => server.abort(),
            }
        }

        outcome
    }
}
