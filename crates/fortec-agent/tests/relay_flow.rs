//! End-to-end relay flow against mocked upstream HTTP services.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fortec_agent::dispatch::image_ack;
use fortec_agent::{
    ChatClient, DeliveryError, DispatchOutcome, DispatchSettings, Dispatcher, ImageClient,
    MessageRef, Outbound, RetryPolicy, RetryingCaller, TextFormat,
};
use fortec_core::config::{ChatConfig, ImageConfig};
use fortec_core::{Role, UserId};
use fortec_sessions::SessionTable;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct Inbox {
    messages: Mutex<Vec<String>>,
    next: Mutex<i64>,
}

impl Inbox {
    fn push(&self, entry: String) -> MessageRef {
        self.messages.lock().unwrap().push(entry);
        let mut next = self.next.lock().unwrap();
        *next += 1;
        MessageRef(*next)
    }

    fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Outbound for Inbox {
    async fn send_text(
        &self,
        _recipient: &str,
        text: &str,
        _format: TextFormat,
    ) -> Result<MessageRef, DeliveryError> {
        Ok(self.push(format!("text:{text}")))
    }

    async fn send_image(&self, _recipient: &str, url: &str) -> Result<MessageRef, DeliveryError> {
        Ok(self.push(format!("image:{url}")))
    }

    async fn delete_message(&self, _recipient: &str, message: MessageRef) -> Result<(), DeliveryError> {
        self.push(format!("delete:{}", message.0));
        Ok(())
    }
}

async fn relay(server: &MockServer, inbox: Arc<Inbox>) -> Dispatcher {
    let caller = RetryingCaller::new(RetryPolicy::new(3, Duration::from_millis(1)));
    let chat = ChatClient::new(
        &ChatConfig {
            endpoint: format!("{}/v1/openai/chat/completions", server.uri()),
            ..ChatConfig::default()
        },
        caller.clone(),
    );
    let images = ImageClient::new(
        &ImageConfig {
            endpoint: format!("{}/v1/openai/images/generations", server.uri()),
            ..ImageConfig::default()
        },
        caller,
    );
    Dispatcher::new(
        Arc::new(SessionTable::new("You are Fortec AI.")),
        Arc::new(chat),
        Arc::new(images),
        inbox,
        DispatchSettings::default(),
    )
}

#[tokio::test]
async fn reset_chat_then_image_builds_expected_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/openai/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Hello there!"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/openai/images/generations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"url": "https://img.example/sunset.png"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let inbox = Arc::new(Inbox::default());
    let dispatcher = relay(&server, inbox.clone()).await;
    let user = UserId::from(42_i64);

    let fresh = dispatcher.sessions().reset(&user).await;
    assert_eq!(fresh.len(), 1);

    let outcome = dispatcher.handle_text(&user, "42", "hello").await;
    assert!(matches!(outcome, DispatchOutcome::Replied(r) if r.sent == 1));

    let outcome = dispatcher.handle_text(&user, "42", "draw a sunset").await;
    assert_eq!(outcome, DispatchOutcome::Illustrated { delivered: 1 });

    let transcript = dispatcher.sessions().get_or_create(&user).await;
    let roles: Vec<Role> = transcript.turns().iter().map(|t| t.role).collect();
    assert_eq!(
        roles,
        vec![Role::System, Role::User, Role::Assistant, Role::User, Role::Assistant]
    );
    assert_eq!(transcript.turns()[2].content, "Hello there!");
    assert_eq!(transcript.turns()[4].content, image_ack("a sunset", 1));

    let messages = inbox.messages();
    assert_eq!(messages[0], "text:Hello there!");
    assert!(messages[1].starts_with("text:"));
    assert_eq!(messages[2], "delete:2");
    assert_eq!(messages[3], "image:https://img.example/sunset.png");
}

#[tokio::test]
async fn transient_upstream_failures_are_retried_before_replying() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "Recovered."}}]
        })))
        .mount(&server)
        .await;

    let inbox = Arc::new(Inbox::default());
    let dispatcher = relay(&server, inbox.clone()).await;

    let outcome = dispatcher
        .handle_text(&UserId::from("7"), "7", "are you there?")
        .await;

    assert!(matches!(outcome, DispatchOutcome::Replied(_)));
    assert_eq!(inbox.messages(), vec!["text:Recovered."]);
    assert_eq!(server.received_requests().await.map(|r| r.len()), Some(3));
}

#[tokio::test]
async fn users_do_not_share_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "ok"}}]
        })))
        .mount(&server)
        .await;

    let dispatcher = Arc::new(relay(&server, Arc::new(Inbox::default())).await);
    let a = UserId::from("a");
    let b = UserId::from("b");

    let (d1, d2) = (dispatcher.clone(), dispatcher.clone());
    let (ua, ub) = (a.clone(), b.clone());
    let t1 = tokio::spawn(async move { d1.handle_text(&ua, "a", "from a").await });
    let t2 = tokio::spawn(async move { d2.handle_text(&ub, "b", "from b").await });
    t1.await.unwrap();
    t2.await.unwrap();

    let ta = dispatcher.sessions().get_or_create(&a).await;
    let tb = dispatcher.sessions().get_or_create(&b).await;
    assert_eq!(ta.turns()[1].content, "from a");
    assert_eq!(tb.turns()[1].content, "from b");
    assert_eq!(ta.len(), 3);
    assert_eq!(tb.len(), 3);
}
