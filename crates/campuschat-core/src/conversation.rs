use tokio::task::JoinHandle;
use tracing::debug;

use crate::{
    backend::FALLBACK_REPLY,
    session::{ChatSession, SessionError},
};

/// Sends `text` as the user's next message.
///
/// The user message is on the timeline before this returns; the backend call
/// runs on a spawned task that appends exactly one bot message when it
/// resolves. Blank input is ignored and yields `Ok(None)`.
///
/// Overlapping submissions run concurrently. Each reply lands after its own
/// user message, but replies are appended in completion order.
///
/// # Panics
///
/// Panics if called outside a Tokio runtime.
pub fn submit(session: &ChatSession, text: &str) -> Result<Option<JoinHandle<()>>, SessionError> {
    if text.trim().is_empty() {
        return Ok(None);
    }

    let ticket = session.begin_exchange(text)?;
    let session = session.clone();
    let message = text.to_owned();

    Ok(Some(tokio::spawn(async move {
        let reply = session.backend().send(&message).await;
        debug!(status = ?reply.status, "backend reply received");
        let content = if reply.is_success() || !reply.text.trim().is_empty() {
            reply.text
        } else {
            FALLBACK_REPLY.to_owned()
        };
        session.finish_exchange(ticket, content);
    })))
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use async_trait::async_trait;
    use tokio::sync::{Mutex, Notify, oneshot};

    use super::submit;
    use crate::{
        backend::{BackendClient, FALLBACK_REPLY},
        session::{
            Authenticator, ChatSession, LocalAuthenticator, SessionError, SessionPhase,
            welcome_message,
        },
        types::{BackendReply, Sender, UserInfo},
    };

    /// Replies with the message text reversed.
    struct ReversingBackend;

    #[async_trait]
    impl BackendClient for ReversingBackend {
        async fn send(&self, message: &str) -> BackendReply {
            BackendReply::success(message.chars().rev().collect::<String>())
        }
    }

    struct FailingBackend {
        text: &'static str,
    }

    #[async_trait]
    impl BackendClient for FailingBackend {
        async fn send(&self, _message: &str) -> BackendReply {
            BackendReply::error(self.text)
        }
    }

    /// Holds every reply until the test releases it.
    #[derive(Default)]
    struct ManualBackend {
        waiting: Mutex<Vec<(String, oneshot::Sender<()>)>>,
    }

    impl ManualBackend {
        async fn release(&self, message: &str) {
            let mut waiting = self.waiting.lock().await;
            let index = waiting
                .iter()
                .position(|(pending, _)| pending == message)
                .expect("message should be pending");
            let (_, release) = waiting.remove(index);
            let _ = release.send(());
        }

        async fn pending(&self) -> usize {
            self.waiting.lock().await.len()
        }
    }

    #[async_trait]
    impl BackendClient for ManualBackend {
        async fn send(&self, message: &str) -> BackendReply {
            let (release, wait) = oneshot::channel();
            self.waiting.lock().await.push((message.to_owned(), release));
            let _ = wait.await;
            BackendReply::success(format!("re: {message}"))
        }
    }

    struct GatedAuthenticator {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl Authenticator for GatedAuthenticator {
        async fn verify(&self, _identity: &UserInfo) -> anyhow::Result<()> {
            self.gate.notified().await;
            Ok(())
        }
    }

    fn faculty() -> UserInfo {
        UserInfo::Faculty {
            name: "Dr. Mehta".into(),
            reg_number: "09cse123456".into(),
        }
    }

    async fn signed_in(backend: Arc<dyn BackendClient>) -> ChatSession {
        let session = ChatSession::new(backend, Arc::new(LocalAuthenticator::default()));
        session
            .set_user_info(faculty())
            .expect("identity should commit");
        session
            .authenticate()
            .expect("authenticate should start")
            .await
            .expect("handshake task should finish");
        session.reset_chat();
        session
    }

    async fn wait_for_pending(backend: &ManualBackend, count: usize) {
        for _ in 0..200 {
            if backend.pending().await == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("backend never saw {count} pending messages");
    }

    #[tokio::test]
    async fn appends_user_message_before_returning_and_bot_reply_after() {
        let session = signed_in(Arc::new(ReversingBackend)).await;

        let pending = submit(&session, "hello")
            .expect("submit should succeed")
            .expect("non-empty text should start an exchange");

        let messages = session.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender, Sender::User);
        assert_eq!(messages[0].content, "hello");
        assert!(session.is_typing());

        pending.await.expect("reply task should finish");

        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].sender, Sender::Bot);
        assert_eq!(messages[1].content, "olleh");
        assert!(!session.is_typing());
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let session = signed_in(Arc::new(ReversingBackend)).await;

        for text in ["", "   ", "\n\t"] {
            let pending = submit(&session, text).expect("blank submit should not fail");
            assert!(pending.is_none());
        }
        assert!(session.messages().is_empty());
        assert!(!session.is_typing());
    }

    #[tokio::test]
    async fn submit_requires_authentication() {
        let session = ChatSession::new(
            Arc::new(ReversingBackend),
            Arc::new(LocalAuthenticator::default()),
        );

        let error = submit(&session, "hello").expect_err("anonymous submit should fail");
        assert_eq!(error, SessionError::NotAuthenticated);
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn backend_error_appends_its_fallback_text() {
        let session = signed_in(Arc::new(FailingBackend {
            text: FALLBACK_REPLY,
        }))
        .await;

        session
            .send_message("are you there?")
            .expect("submit should succeed")
            .expect("exchange should start")
            .await
            .expect("reply task should finish");

        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].sender, Sender::Bot);
        assert_eq!(messages[1].content, FALLBACK_REPLY);
        assert!(!session.is_typing());

        session
            .send_message("still usable")
            .expect("conversation should remain usable")
            .expect("exchange should start")
            .await
            .expect("reply task should finish");
        assert_eq!(session.messages().len(), 4);
    }

    #[tokio::test]
    async fn blank_error_reply_uses_default_fallback() {
        let session = signed_in(Arc::new(FailingBackend { text: "" })).await;

        session
            .send_message("hi")
            .expect("submit should succeed")
            .expect("exchange should start")
            .await
            .expect("reply task should finish");

        assert_eq!(session.messages()[1].content, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn overlapping_submissions_keep_per_call_order() {
        let backend = Arc::new(ManualBackend::default());
        let session = signed_in(backend.clone()).await;

        let first = submit(&session, "first")
            .expect("submit should succeed")
            .expect("exchange should start");
        let second = submit(&session, "second")
            .expect("submit should succeed")
            .expect("exchange should start");
        wait_for_pending(&backend, 2).await;

        backend.release("second").await;
        second.await.expect("reply task should finish");
        assert!(session.is_typing());

        backend.release("first").await;
        first.await.expect("reply task should finish");
        assert!(!session.is_typing());

        let contents = session
            .messages()
            .into_iter()
            .map(|message| message.content)
            .collect::<Vec<_>>();
        assert_eq!(contents, ["first", "second", "re: second", "re: first"]);
    }

    #[tokio::test]
    async fn replies_after_logout_are_dropped() {
        let backend = Arc::new(ManualBackend::default());
        let session = signed_in(backend.clone()).await;

        let pending = submit(&session, "bye")
            .expect("submit should succeed")
            .expect("exchange should start");
        wait_for_pending(&backend, 1).await;

        session.logout();
        backend.release("bye").await;
        pending.await.expect("reply task should finish");

        assert!(session.messages().is_empty());
        assert!(!session.is_typing());
    }

    #[tokio::test]
    async fn reset_drops_pending_reply_and_later_submits_still_get_answers() {
        let backend = Arc::new(ManualBackend::default());
        let session = signed_in(backend.clone()).await;

        let stale = submit(&session, "ping")
            .expect("submit should succeed")
            .expect("exchange should start");
        wait_for_pending(&backend, 1).await;

        session.reset_chat();
        assert!(session.messages().is_empty());
        assert!(!session.is_typing());

        backend.release("ping").await;
        stale.await.expect("reply task should finish");
        assert!(session.messages().is_empty());
        assert!(!session.is_typing());

        let fresh = submit(&session, "again")
            .expect("submit after reset should succeed")
            .expect("exchange should start");
        wait_for_pending(&backend, 1).await;
        backend.release("again").await;
        fresh.await.expect("reply task should finish");

        let contents = session
            .messages()
            .into_iter()
            .map(|message| message.content)
            .collect::<Vec<_>>();
        assert_eq!(contents, ["again", "re: again"]);
        assert!(!session.is_typing());
    }

    #[tokio::test]
    async fn reset_during_handshake_keeps_the_sign_in() {
        let gate = Arc::new(Notify::new());
        let session = ChatSession::new(
            Arc::new(ReversingBackend),
            Arc::new(GatedAuthenticator { gate: gate.clone() }),
        );
        session
            .set_user_info(faculty())
            .expect("identity should commit");

        let handshake = session.authenticate().expect("authenticate should start");
        session.reset_chat();
        assert_eq!(session.state(), SessionPhase::Authenticating);

        gate.notify_one();
        handshake.await.expect("handshake task should finish");

        assert_eq!(session.state(), SessionPhase::Authenticated);
        let messages = session.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender, Sender::Bot);
        assert_eq!(messages[0].content, welcome_message("Dr. Mehta"));
    }

    #[tokio::test]
    async fn replies_after_back_are_dropped() {
        let backend = Arc::new(ManualBackend::default());
        let session = signed_in(backend.clone()).await;

        let pending = submit(&session, "where is the admin block?")
            .expect("submit should succeed")
            .expect("exchange should start");
        wait_for_pending(&backend, 1).await;

        session.back();
        backend.release("where is the admin block?").await;
        pending.await.expect("reply task should finish");

        assert_eq!(session.state(), SessionPhase::Anonymous);
        assert!(session.messages().is_empty());
        assert!(!session.is_typing());
    }
}
