//! End-to-end conversations through the message bus

use chrono::Duration;
use josephine_core::bus::events::META_FROM_ME;
use josephine_core::bus::{InboundMessage, MessageBus, OutboundMessage};
use josephine_core::session::{Branch, CorrespondentId, SessionStore, Step};
use josephine_dialogue::{DialogueLoop, EngineSettings, ManualClock, SessionEngine};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tokio_test::assert_ok;

const ALICE: &str = "255700000001@s.whatsapp.net";
const BOB: &str = "255700000003@s.whatsapp.net";
const OWNER: &str = "255700000002@s.whatsapp.net";

struct Harness {
    bus: MessageBus,
    outbound: UnboundedReceiver<OutboundMessage>,
    engine: Arc<SessionEngine>,
    clock: Arc<ManualClock>,
}

impl Harness {
    async fn start() -> Self {
        let bus = MessageBus::new();
        let clock = Arc::new(ManualClock::starting_now());
        let engine = Arc::new(
            SessionEngine::new(SessionStore::new(), EngineSettings::default())
                .unwrap()
                .with_clock(clock.clone()),
        );
        let outbound = bus.take_outbound_receiver().await.unwrap();

        let mut dialogue = DialogueLoop::new(bus.clone(), engine.clone())
            .with_operator(Some(OWNER.to_string()));
        tokio::spawn(async move { dialogue.run().await });

        Self {
            bus,
            outbound,
            engine,
            clock,
        }
    }

    fn say(&self, chat: &str, text: &str) {
        let sender = CorrespondentId::new(chat).user_part().to_string();
        assert_ok!(self
            .bus
            .publish_inbound(InboundMessage::new("whatsapp", sender, chat, text)));
    }

    fn say_as_owner(&self, chat: &str, text: &str) {
        let msg = InboundMessage::new("whatsapp", chat, chat, text).with_metadata(META_FROM_ME, true);
        assert_ok!(self.bus.publish_inbound(msg));
    }

    async fn next(&mut self) -> OutboundMessage {
        timeout(std::time::Duration::from_secs(2), self.outbound.recv())
            .await
            .expect("timed out waiting for a reply")
            .expect("outbound queue closed")
    }

    async fn replies(&mut self, count: usize) -> Vec<OutboundMessage> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.next().await);
        }
        out
    }

    async fn assert_silent(&mut self) {
        let waited = timeout(std::time::Duration::from_millis(200), self.outbound.recv()).await;
        assert!(waited.is_err(), "unexpected reply: {:?}", waited);
    }
}

#[tokio::test]
async fn test_full_business_conversation() {
    let mut h = Harness::start().await;

    h.say(ALICE, "Hello");
    let greeting = h.replies(2).await;
    assert!(greeting[0].content.starts_with("👋 Greetings!"));
    assert!(greeting.iter().all(|m| m.chat_id == ALICE && m.channel == "whatsapp"));

    for reply in ["yes", "yep", "YES"] {
        h.say(ALICE, reply);
        h.next().await;
    }

    h.say(ALICE, "Business");
    let track = h.next().await;
    assert!(track.content.starts_with("📊 A strategic choice!"));

    for _ in 0..11 {
        h.say(ALICE, "yes");
        h.next().await;
    }
    h.say(ALICE, "thanks");
    let farewell = h.next().await;
    assert!(farewell.content.starts_with("🙏 Thank you for your time!"));

    let session = h.engine.store().get(&CorrespondentId::new(ALICE)).await;
    assert_eq!(session.step, Step::Greeting);
    assert_eq!(session.branch, Branch::Unset);
    assert!(session.cooldown_until.is_some());

    h.say(ALICE, "one more thing");
    h.assert_silent().await;

    h.clock.advance(Duration::hours(2));
    h.say(ALICE, "hi again");
    assert!(h.next().await.content.starts_with("👋 Greetings!"));
}

#[tokio::test]
async fn test_operator_takeover_ignores_echoes() {
    let mut h = Harness::start().await;

    h.say(ALICE, "Hello");
    let greeting = h.replies(2).await;

    // The bridge reports our own sends back to us.
    for sent in &greeting {
        h.say_as_owner(ALICE, &sent.content);
    }
    h.say(ALICE, "yes");
    assert!(h.next().await.content.starts_with("🎉 Excellent choice!"));

    h.say_as_owner(ALICE, "Hi, Yopinto here, let me help");
    let paused = h.next().await;
    assert!(paused.content.contains("paused Josephine"));

    h.say(ALICE, "yes");
    h.say_as_owner(ALICE, "resume");
    let resumed = h.next().await;
    assert_eq!(
        resumed.content,
        "▶️ Josephine is back online! How can I assist you now?"
    );

    h.say(ALICE, "yes");
    assert!(h.next().await.content.starts_with("🙌 Thank you for your interest!"));
}

#[tokio::test]
async fn test_invalid_replies_reorient() {
    let mut h = Harness::start().await;

    h.say(ALICE, "Hello");
    h.replies(2).await;

    h.say(ALICE, "what?");
    assert!(h.next().await.content.contains("respond with ‘yes’"));
    h.say(ALICE, "huh");
    h.next().await;
    h.say(ALICE, "no");
    assert!(h.next().await.content.starts_with("🤔 It seems we’re not quite aligned!"));

    let session = h.engine.store().get(&CorrespondentId::new(ALICE)).await;
    assert_eq!(session.step, Step::Welcome);
    assert_eq!(session.invalid_reply_count, 0);
}

#[tokio::test]
async fn test_correspondents_progress_independently() {
    let mut h = Harness::start().await;

    h.say(ALICE, "Hello");
    h.replies(2).await;
    h.say(BOB, "Hello");
    h.replies(2).await;

    h.say(ALICE, "wait");
    let deferred = h.next().await;
    assert_eq!(deferred.chat_id, ALICE);

    h.say(BOB, "yes");
    let bob = h.next().await;
    assert_eq!(bob.chat_id, BOB);
    assert!(bob.content.starts_with("🎉 Excellent choice!"));

    h.say(ALICE, "yes");
    h.assert_silent().await;
}

#[tokio::test]
async fn test_group_messages_are_ignored() {
    let mut h = Harness::start().await;

    h.say("120363041234567890@g.us", "Hello");
    h.say("status@broadcast", "Hello");
    h.assert_silent().await;
    assert!(h.engine.store().is_empty());
}
