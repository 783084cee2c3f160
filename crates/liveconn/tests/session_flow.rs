//! End-to-end client flows over the loopback transport

use anyhow::Result;
use async_trait::async_trait;
use liveconn::proto::{Message, MessageKind, MouseMove};
use liveconn::transport::{
    AreaBootstrap, CloseInfo, IdentityStore, LoopbackConnector, LoopbackPeer, MemoryStore,
    TransportError,
};
use liveconn::{
    AuthError, Client, ClientConfig, Handlers, LiveConnError, PointerPosition, SessionState, User,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Bootstrap answering from fixed values and recording every call
#[derive(Default)]
struct FakeBootstrap {
    calls: Mutex<Vec<String>>,
}

impl FakeBootstrap {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl AreaBootstrap for FakeBootstrap {
    async fn create_area(&self) -> Result<String, TransportError> {
        self.record("create".to_string());
        Ok("area1".to_string())
    }

    async fn join_area(&self, area: &str) -> Result<String, TransportError> {
        self.record(format!("join {}", area));
        Ok("user1".to_string())
    }

    async fn list_users(&self, area: &str) -> Result<String, TransportError> {
        self.record(format!("list {}", area));
        Ok("user1".to_string())
    }
}

struct Harness {
    client: Client,
    bootstrap: Arc<FakeBootstrap>,
    store: Arc<MemoryStore>,
    peers: mpsc::UnboundedReceiver<LoopbackPeer>,
}

fn harness(config: ClientConfig) -> Harness {
    let (connector, peers) = LoopbackConnector::new();
    let bootstrap = Arc::new(FakeBootstrap::default());
    let store = Arc::new(MemoryStore::new());
    let client = Client::new(config, Arc::new(connector), bootstrap.clone(), store.clone());
    Harness {
        client,
        bootstrap,
        store,
        peers,
    }
}

fn config() -> ClientConfig {
    ClientConfig::default().with_host("loopback").with_secure(false)
}

#[tokio::test]
async fn test_identity_for_new_area() -> Result<()> {
    let Harness { client, bootstrap, store, .. } = harness(config());

    let identity = client.resolve_identity(None).await?;

    assert_eq!(identity.user, User::new("area1", "user1"));
    assert!(!identity.restored);
    assert_eq!(bootstrap.calls(), vec!["create", "join area1"]);
    assert_eq!(store.get("area1"), Some("user1".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_identity_reused_from_store() -> Result<()> {
    let Harness { client, bootstrap, store, .. } = harness(config());
    store.set("abc", "known")?;

    let identity = client.resolve_identity(Some("abc")).await?;

    assert_eq!(identity.user, User::new("abc", "known"));
    assert!(identity.restored);
    assert_eq!(bootstrap.calls(), vec!["list abc"]);
    Ok(())
}

#[tokio::test]
async fn test_identity_for_existing_area_without_user() -> Result<()> {
    let Harness { client, bootstrap, store, .. } = harness(config());

    let identity = client.resolve_identity(Some("abc")).await?;

    assert_eq!(identity.user, User::new("abc", "user1"));
    assert!(!identity.restored);
    assert_eq!(bootstrap.calls(), vec!["join abc"]);
    assert_eq!(store.get("abc"), Some("user1".to_string()));

    // A second resolution reuses the stored user
    let again = client.resolve_identity(Some("abc")).await?;
    assert!(again.restored);
    assert_eq!(bootstrap.calls(), vec!["join abc", "list abc"]);
    Ok(())
}

#[tokio::test]
async fn test_authenticate_move_and_close() -> Result<()> {
    let Harness { client, mut peers, .. } = harness(config());
    let (acks_tx, mut acks) = mpsc::unbounded_channel();
    let (moves_tx, mut moves) = mpsc::unbounded_channel();
    let handlers = Handlers::new()
        .on(MessageKind::AuthOk, move |message: Message| {
            let _ = acks_tx.send(message);
        })
        .on(MessageKind::MouseMove, move |message: Message| {
            let _ = moves_tx.send(message);
        });

    let (connected, peer) = tokio::join!(client.connect(User::new("abc", "xy"), handlers), async {
        let peer = peers.recv().await.expect("peer");
        peer.open();
        peer
    });
    let (mut session, mut events) = connected?;
    let mut peer = peer;

    assert_eq!(peer.url(), "ws://loopback/ws");
    assert_eq!(session.state(), SessionState::Authenticating);
    assert_eq!(
        peer.next_sent().await,
        Some(Message::AuthUser(liveconn::proto::AuthUser::new("abc", "xy")).to_frame()?)
    );

    let (pointer_tx, mut pointer) = mpsc::channel(8);
    let server = async {
        peer.deliver(Message::AuthOk("ok".to_string()).to_frame()?);
        assert_eq!(acks.recv().await, Some(Message::AuthOk("ok".to_string())));

        pointer_tx.send(PointerPosition::new(1.5, 2.25)).await?;
        let sent = peer.next_sent().await;
        assert_eq!(sent, Some(Message::MouseMove(MouseMove::new("xy", 1.5, 2.25)).to_frame()?));

        peer.deliver(Message::MouseMove(MouseMove::new("other", 3.0, 4.0)).to_frame()?);
        assert_eq!(
            moves.recv().await,
            Some(Message::MouseMove(MouseMove::new("other", 3.0, 4.0)))
        );

        peer.close(CloseInfo::clean(Some(1000), ""));
        anyhow::Ok(())
    };

    let (state, script) = tokio::join!(client.run(&mut session, &mut events, &mut pointer), server);
    script?;

    assert_eq!(state?, SessionState::Closed);
    assert!(session.user().is_authenticated());
    Ok(())
}

#[tokio::test]
async fn test_pointer_events_throttled() -> Result<()> {
    let config = config().with_pointer_interval(Duration::from_secs(60));
    let Harness { client, mut peers, .. } = harness(config);
    let mut user = User::new("abc", "xy");
    user.accept_auth_ok("ok");

    let (connected, peer) = tokio::join!(client.connect(user, Handlers::new()), async {
        let peer = peers.recv().await.expect("peer");
        peer.open();
        peer
    });
    let (mut session, mut events) = connected?;
    let mut peer = peer;
    peer.next_sent().await;

    let (pointer_tx, mut pointer) = mpsc::channel(8);
    pointer_tx.send(PointerPosition::new(1.0, 1.0)).await?;
    pointer_tx.send(PointerPosition::new(2.0, 2.0)).await?;
    pointer_tx.send(PointerPosition::new(3.0, 3.0)).await?;
    drop(pointer_tx);

    let server = async {
        let first = peer.next_sent().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(peer.try_next_sent().is_none());
        peer.close(CloseInfo::clean(Some(1000), ""));
        first
    };

    let (state, first) = tokio::join!(client.run(&mut session, &mut events, &mut pointer), server);

    assert_eq!(first, Some(Message::MouseMove(MouseMove::new("xy", 1.0, 1.0)).to_frame()?));
    assert_eq!(state?, SessionState::Closed);
    Ok(())
}

#[tokio::test]
async fn test_auth_timeout_rejects() -> Result<()> {
    let config = config().with_auth_timeout(Duration::from_millis(50));
    let Harness { client, mut peers, .. } = harness(config);

    let connect = client.connect(User::new("abc", "xy"), Handlers::new());
    let (connected, peer) = tokio::join!(connect, async {
        let peer = peers.recv().await.expect("peer");
        peer.open();
        peer
    });
    let (mut session, mut events) = connected?;
    let (_pointer_tx, mut pointer) = mpsc::channel(1);

    let result = client.run(&mut session, &mut events, &mut pointer).await;

    assert!(matches!(
        result,
        Err(LiveConnError::Auth(AuthError::Rejected { waited }))
            if waited == Duration::from_millis(50)
    ));
    assert_eq!(session.state(), SessionState::Authenticating);
    drop(peer);
    Ok(())
}

#[tokio::test]
async fn test_connect_fails_when_server_closes() -> Result<()> {
    let Harness { client, mut peers, .. } = harness(config());

    let connect = client.connect(User::new("abc", "xy"), Handlers::new());
    let (connected, _peer) = tokio::join!(connect, async {
        let peer = peers.recv().await.expect("peer");
        peer.close(CloseInfo::unclean());
        peer
    });

    assert!(matches!(connected, Err(LiveConnError::Connection(_))));
    Ok(())
}
