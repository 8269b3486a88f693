//! Client engine
//!
//! The engine task owns all mutable client state; [`AgentClient`] handles
//! talk to it through commands and read it through snapshots.

mod client;
mod core;
mod snapshot;

pub use client::AgentClient;
pub use snapshot::ClientSnapshot;

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::connection::{ConnectionStatus, UNREACHABLE_MESSAGE};
    use crate::session::PermissionMode;
    use crate::transport::{ChannelConnector, Outbound, ReceivedCall, ServerEnd};
    use crate::types::{ClientConfig, ClientError};

    const ADDRESS: &str = "mem://server";

    fn test_config() -> ClientConfig {
        ClientConfig {
            client_name: "test-client".to_string(),
            client_version: "9.9.9".to_string(),
            ..ClientConfig::default()
        }
    }

    struct Harness {
        client: AgentClient,
        servers: mpsc::UnboundedReceiver<ServerEnd>,
    }

    impl Harness {
        fn new(config: ClientConfig) -> Self {
            let (connector, servers) = ChannelConnector::new();
            let client = AgentClient::spawn(config, Arc::new(connector));
            Self { client, servers }
        }

        /// Connect and complete the handshake
        async fn connected(config: ClientConfig) -> (Self, ServerEnd) {
            let mut harness = Self::new(config);
            let connect = harness.spawn_connect(ADDRESS);
            let mut server = harness.servers.recv().await.unwrap();
            server.accept().await.unwrap();
            connect.await.unwrap().unwrap();
            (harness, server)
        }

        fn spawn_connect(&self, address: &str) -> JoinHandle<Result<(), ClientError>> {
            let client = self.client.clone();
            let address = address.to_string();
            tokio::spawn(async move { client.connect_and_wait(address).await })
        }

        /// Create session `thread_id` through a scripted thread/start
        async fn create_session(&self, server: &mut ServerEnd, thread_id: &str) {
            let client = self.client.clone();
            let create =
                tokio::spawn(async move { client.create_session("/work", PermissionMode::Default).await });
            let call = expect_call(server, "thread/start").await;
            server.respond(call.id, json!({"thread_id": thread_id}));
            create.await.unwrap().unwrap();
        }

        async fn wait_session<F>(&self, thread_id: &str, mut predicate: F)
        where
            F: FnMut(&crate::session::Session) -> bool,
        {
            let wait = self.client.wait_for(|snapshot| {
                snapshot
                    .session(thread_id)
                    .is_some_and(|session| predicate(session.as_ref()))
            });
            tokio::time::timeout(Duration::from_secs(5), wait)
                .await
                .expect("session condition not reached")
                .unwrap();
        }
    }

    async fn expect_call(server: &mut ServerEnd, method: &str) -> ReceivedCall {
        let call = server.next_call().await.expect("connection closed");
        assert_eq!(call.method, method);
        call
    }

    #[tokio::test]
    async fn test_handshake_connects() {
        let mut harness = Harness::new(test_config());
        assert_eq!(harness.client.status(), ConnectionStatus::Disconnected);

        let connect = harness.spawn_connect(ADDRESS);
        let mut server = harness.servers.recv().await.unwrap();
        assert_eq!(server.address(), ADDRESS);

        server.open();
        let call = expect_call(&mut server, "initialize").await;
        assert_eq!(
            call.params,
            json!({"client": {"name": "test-client", "version": "9.9.9"}})
        );
        assert_eq!(harness.client.status(), ConnectionStatus::Connecting);

        server.respond(call.id, json!({"server": "test"}));
        connect.await.unwrap().unwrap();
        assert_eq!(harness.client.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_handshake_rejection_fails_fast() {
        let mut harness = Harness::new(test_config());
        let connect = harness.spawn_connect(ADDRESS);
        let mut server = harness.servers.recv().await.unwrap();

        server.open();
        let call = expect_call(&mut server, "initialize").await;
        server.respond_error(call.id, json!({"code": -32600, "message": "unsupported client"}));

        let err = connect.await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::ConnectionFailed(ref m) if m.contains("unsupported client")));
        assert!(matches!(
            harness.client.status(),
            ConnectionStatus::Error { ref message } if message.starts_with("Handshake failed")
        ));

        // transport was closed, later calls fail without reaching the server
        assert_eq!(server.next_frame().await, Some(Outbound::Close));
        let err = harness.client.call("turn/interrupt", json!({})).await.unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_timeout() {
        let config = test_config().with_handshake_timeout(Duration::from_secs(2));
        let mut harness = Harness::new(config);
        let connect = harness.spawn_connect(ADDRESS);
        let mut server = harness.servers.recv().await.unwrap();

        server.open();
        expect_call(&mut server, "initialize").await;

        let err = connect.await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::ConnectionFailed(ref m) if m.contains("timed out")));
        assert!(
            harness
                .client
                .status()
                .error_message()
                .is_some_and(|m| m.contains("initialize"))
        );
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let mut harness = Harness::new(test_config());
        let connect = harness.spawn_connect(ADDRESS);
        let server = harness.servers.recv().await.unwrap();

        server.close(1006, "");
        let err = connect.await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::ConnectionFailed(ref m) if m == UNREACHABLE_MESSAGE));
    }

    #[tokio::test]
    async fn test_call_while_disconnected_rejects_immediately() {
        let harness = Harness::new(test_config());
        let err = harness
            .client
            .call("thread/start", json!({"cwd": "/"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
    }

    #[tokio::test]
    async fn test_streaming_turn_scenario() {
        let (harness, mut server) = Harness::connected(test_config()).await;
        harness.create_session(&mut server, "t1").await;

        let session = harness.client.session("t1").unwrap();
        assert!(session.messages.is_empty());

        let client = harness.client.clone();
        let send = tokio::spawn(async move { client.send_message("t1", "hi", None).await });
        let call = expect_call(&mut server, "turn/start").await;
        assert_eq!(call.params, json!({"thread_id": "t1", "content": "hi"}));

        // optimistic append is visible before the server answers
        let session = harness.client.session("t1").unwrap();
        assert_eq!(session.messages.len(), 1);
        assert!(session.messages[0].is_user());

        server.respond(call.id, json!({"turn_id": "r1"}));
        assert_eq!(send.await.unwrap().unwrap().turn_id, "r1");

        server.notify("initialized", Value::Null);
        server.notify("turn/started", json!({"turn_id": "r1", "thread_id": "t1"}));
        server.notify("item/progress", json!({"turn_id": "r1", "delta": {"type": "text", "text": "He"}}));
        server.notify("item/progress", json!({"turn_id": "r1", "delta": {"type": "text", "text": "llo"}}));
        harness
            .wait_session("t1", |s| {
                s.messages
                    .last()
                    .and_then(|m| m.as_assistant())
                    .and_then(|m| m.streaming_text())
                    == Some("Hello")
            })
            .await;
        assert_eq!(
            harness.client.session("t1").unwrap().active_turn_id.as_deref(),
            Some("r1")
        );

        server.notify("turn/completed", json!({"thread_id": "t1"}));
        harness.wait_session("t1", |s| s.completed_turns == 1).await;

        let session = harness.client.session("t1").unwrap();
        assert!(session.active_turn_id.is_none());
        assert!(!session.is_streaming());
        assert_eq!(session.assistant_text(), "Hello");
    }

    #[tokio::test]
    async fn test_permission_denial_and_approval() {
        let (harness, mut server) = Harness::connected(test_config()).await;
        harness.create_session(&mut server, "t1").await;

        let client = harness.client.clone();
        let send = tokio::spawn(async move { client.send_message("t1", "clean up", None).await });
        let call = expect_call(&mut server, "turn/start").await;
        server.respond(call.id, json!({"turn_id": "r1"}));
        send.await.unwrap().unwrap();

        server.notify(
            "turn/permission_denied",
            json!({
                "thread_id": "t1",
                "denials": [{"tool_name": "Bash", "tool_use_id": "x", "tool_input": {"command": "rm -rf /"}}]
            }),
        );
        harness.wait_session("t1", |s| s.has_permission_denial).await;
        assert_eq!(harness.client.session("t1").unwrap().pending_denials().len(), 1);

        let client = harness.client.clone();
        let approve = tokio::spawn(async move {
            client
                .approve_permission("t1", PermissionMode::AcceptEdits)
                .await
        });
        let call = expect_call(&mut server, "approval/respond").await;
        assert_eq!(
            call.params,
            json!({"thread_id": "t1", "approved": true, "permission_mode": "acceptEdits"})
        );
        server.respond(call.id, json!({}));
        approve.await.unwrap().unwrap();

        let session = harness.client.session("t1").unwrap();
        assert!(!session.has_permission_denial);
        assert!(session.permission_denials.is_none());
        assert_eq!(session.permission_mode, PermissionMode::AcceptEdits);
        // approval keeps the blocked content for a retry
        assert_eq!(session.last_blocked_content.as_deref(), Some("clean up"));

        let client = harness.client.clone();
        let retry = tokio::spawn(async move { client.retry_blocked("t1", None).await });
        let call = expect_call(&mut server, "turn/start").await;
        assert_eq!(call.params["content"], "clean up");
        server.respond(call.id, json!({"turn_id": "r2"}));
        assert_eq!(retry.await.unwrap().unwrap().turn_id, "r2");
    }

    #[tokio::test]
    async fn test_mode_changes_swallow_rpc_errors() {
        let (harness, mut server) = Harness::connected(test_config()).await;
        harness.create_session(&mut server, "t1").await;

        let client = harness.client.clone();
        let change = tokio::spawn(async move {
            client
                .change_permission_mode("t1", PermissionMode::DontAsk)
                .await
        });
        let call = expect_call(&mut server, "approval/respond").await;
        server.respond_error(call.id, json!({"code": -32000, "message": "no pending approval"}));
        change.await.unwrap().unwrap();
        assert_eq!(
            harness.client.session("t1").unwrap().permission_mode,
            PermissionMode::DontAsk
        );

        let client = harness.client.clone();
        let approve = tokio::spawn(async move {
            client
                .approve_permission("t1", PermissionMode::BypassPermissions)
                .await
        });
        let call = expect_call(&mut server, "approval/respond").await;
        server.respond_error(call.id, json!("nope"));
        approve.await.unwrap().unwrap();
        assert_eq!(
            harness.client.session("t1").unwrap().permission_mode,
            PermissionMode::BypassPermissions
        );
    }

    #[tokio::test]
    async fn test_dismiss_and_retry_without_content() {
        let (harness, mut server) = Harness::connected(test_config()).await;
        harness.create_session(&mut server, "t1").await;

        let err = harness.client.retry_blocked("t1", None).await.unwrap_err();
        assert!(matches!(err, ClientError::NothingToRetry(_)));

        server.notify(
            "turn/permission_denied",
            json!({"thread_id": "t1", "denials": [{"tool_name": "Write", "tool_use_id": "w"}]}),
        );
        harness.wait_session("t1", |s| s.has_permission_denial).await;

        harness.client.dismiss_permission("t1").await.unwrap();
        let session = harness.client.session("t1").unwrap();
        assert!(!session.has_permission_denial);
        assert!(session.permission_denials.is_none());
        assert_eq!(session.permission_mode, PermissionMode::Default);
    }

    #[tokio::test]
    async fn test_send_failure_keeps_optimistic_message() {
        let (harness, mut server) = Harness::connected(test_config()).await;
        harness.create_session(&mut server, "t1").await;

        let client = harness.client.clone();
        let send = tokio::spawn(async move { client.send_message("t1", "hello?", None).await });
        let call = expect_call(&mut server, "turn/start").await;
        server.respond_error(call.id, json!({"code": -32000, "message": "thread busy"}));

        let err = send.await.unwrap().unwrap_err();
        assert_eq!(err.rpc_error().unwrap().message(), "thread busy");

        let session = harness.client.session("t1").unwrap();
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].as_user().unwrap().content, "hello?");
    }

    #[tokio::test]
    async fn test_send_to_unknown_session() {
        let (harness, _server) = Harness::connected(test_config()).await;
        let err = harness
            .client
            .send_message("ghost", "hi", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_create_session_rejection_and_duplicate() {
        let (harness, mut server) = Harness::connected(test_config()).await;

        let client = harness.client.clone();
        let create = tokio::spawn(async move {
            client
                .create_session("/nope", PermissionMode::AcceptEdits)
                .await
        });
        let call = expect_call(&mut server, "thread/start").await;
        assert_eq!(
            call.params,
            json!({"cwd": "/nope", "permission_mode": "acceptEdits"})
        );
        server.respond_error(call.id, json!({"code": -32602, "message": "no such directory"}));
        let err = create.await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::Rpc(_)));
        assert!(harness.client.sessions().is_empty());

        harness.create_session(&mut server, "t1").await;
        let client = harness.client.clone();
        let create =
            tokio::spawn(async move { client.create_session("/work", PermissionMode::Default).await });
        let call = expect_call(&mut server, "thread/start").await;
        server.respond(call.id, json!({"thread_id": "t1"}));
        let err = create.await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::SessionAlreadyExists(_)));
        assert_eq!(harness.client.sessions().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_thread_start_result_rejects_call() {
        let (harness, mut server) = Harness::connected(test_config()).await;

        let client = harness.client.clone();
        let create =
            tokio::spawn(async move { client.create_session("/work", PermissionMode::Default).await });
        let call = expect_call(&mut server, "thread/start").await;
        server.respond(call.id, json!({"id": 42}));

        let err = create.await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::Json(_)));
        assert_eq!(harness.client.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_delete_session_interrupts_best_effort() {
        let (harness, mut server) = Harness::connected(test_config()).await;
        harness.create_session(&mut server, "t1").await;
        server.notify("turn/started", json!({"turn_id": "r1", "thread_id": "t1"}));
        harness.wait_session("t1", |s| s.is_active()).await;

        let client = harness.client.clone();
        let delete = tokio::spawn(async move { client.delete_session("t1").await });
        let call = expect_call(&mut server, "turn/interrupt").await;
        assert_eq!(call.params, json!({"thread_id": "t1"}));
        server.respond_error(call.id, json!({"message": "already stopped"}));

        delete.await.unwrap().unwrap();
        assert!(harness.client.session("t1").is_none());

        let err = harness.client.delete_session("t1").await.unwrap_err();
        assert!(matches!(err, ClientError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_interrupt_is_pass_through() {
        let (harness, mut server) = Harness::connected(test_config()).await;
        harness.create_session(&mut server, "t1").await;
        server.notify("turn/started", json!({"turn_id": "r1", "thread_id": "t1"}));
        harness.wait_session("t1", |s| s.is_active()).await;

        let client = harness.client.clone();
        let interrupt = tokio::spawn(async move { client.interrupt_turn("t1").await });
        let call = expect_call(&mut server, "turn/interrupt").await;
        server.respond(call.id, Value::Null);
        interrupt.await.unwrap().unwrap();

        // still active until the server says otherwise
        assert!(harness.client.session("t1").unwrap().is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_timeout() {
        let config = test_config().with_call_timeout(Duration::from_millis(500));
        let (harness, mut server) = Harness::connected(config).await;

        let client = harness.client.clone();
        let call = tokio::spawn(async move { client.call("turn/interrupt", json!({"thread_id": "t"})).await });
        let received = expect_call(&mut server, "turn/interrupt").await;

        match call.await.unwrap() {
            Err(ClientError::Timeout { method, elapsed_ms }) => {
                assert_eq!(method, "turn/interrupt");
                assert!(elapsed_ms >= 500);
            }
            other => panic!("unexpected: {other:?}"),
        }

        // a late response is ignored and the connection stays usable
        server.respond(received.id, json!({}));
        let client = harness.client.clone();
        let next = tokio::spawn(async move { client.call("turn/interrupt", json!({})).await });
        let received = expect_call(&mut server, "turn/interrupt").await;
        server.respond(received.id, json!({"ok": true}));
        assert_eq!(next.await.unwrap().unwrap(), json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_server_close_rejects_pending_and_keeps_sessions() {
        let (harness, mut server) = Harness::connected(test_config()).await;
        harness.create_session(&mut server, "t1").await;

        let client = harness.client.clone();
        let call = tokio::spawn(async move { client.call("turn/interrupt", json!({})).await });
        expect_call(&mut server, "turn/interrupt").await;

        server.close(4001, "");
        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::ConnectionClosed(_)));

        assert_eq!(
            harness.client.status(),
            ConnectionStatus::error("Connection closed (code 4001)")
        );
        assert!(harness.client.session("t1").is_some());

        let err = harness.client.call("turn/interrupt", json!({})).await.unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
    }

    #[tokio::test]
    async fn test_normal_close_disconnects() {
        let (harness, server) = Harness::connected(test_config()).await;
        server.close(1000, "bye");
        harness
            .client
            .wait_for(|s| s.status == ConnectionStatus::Disconnected)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_connect_same_address_is_noop() {
        let mut harness = Harness::new(test_config());
        harness.client.connect(ADDRESS).await.unwrap();
        harness.client.connect(ADDRESS).await.unwrap();

        let _server = harness.servers.recv().await.unwrap();
        assert!(harness.servers.try_recv().is_err());
        assert_eq!(harness.client.status(), ConnectionStatus::Connecting);
    }

    #[tokio::test]
    async fn test_reconnect_rejects_old_calls() {
        let (mut harness, mut old_server) = Harness::connected(test_config()).await;

        let client = harness.client.clone();
        let call = tokio::spawn(async move { client.call("turn/interrupt", json!({})).await });
        let stale = expect_call(&mut old_server, "turn/interrupt").await;

        let connect = harness.spawn_connect("mem://other");
        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::ConnectionClosed(_)));

        // frames from the replaced connection never reach the client
        assert_eq!(old_server.next_frame().await, Some(Outbound::Close));
        assert!(!old_server.respond(stale.id, json!({})));

        let mut server = harness.servers.recv().await.unwrap();
        assert_eq!(server.address(), "mem://other");
        server.accept().await.unwrap();
        connect.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_clears_sessions() {
        let (harness, mut server) = Harness::connected(test_config()).await;
        harness.create_session(&mut server, "t1").await;

        let client = harness.client.clone();
        let call = tokio::spawn(async move { client.call("turn/interrupt", json!({})).await });
        expect_call(&mut server, "turn/interrupt").await;

        harness.client.disconnect().await.unwrap();
        assert!(matches!(
            call.await.unwrap(),
            Err(ClientError::ConnectionClosed(_))
        ));
        assert_eq!(harness.client.status(), ConnectionStatus::Disconnected);
        assert!(harness.client.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_rejects_session_creation_in_flight() {
        let (harness, mut server) = Harness::connected(test_config()).await;

        let client = harness.client.clone();
        let create =
            tokio::spawn(async move { client.create_session("/work", PermissionMode::Default).await });
        let call = expect_call(&mut server, "thread/start").await;

        harness.client.disconnect().await.unwrap();
        assert!(!server.respond(call.id, json!({"thread_id": "t1"})));

        let err = create.await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::ConnectionClosed(_)));
        assert!(harness.client.sessions().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_session_created_around_disconnect_never_survives_it() {
        for round in 0..50 {
            let (harness, mut server) = Harness::connected(test_config()).await;

            let client = harness.client.clone();
            let create = tokio::spawn(async move {
                client.create_session("/work", PermissionMode::Default).await
            });
            let call = expect_call(&mut server, "thread/start").await;
            server.respond(call.id, json!({"thread_id": "t1"}));
            for _ in 0..round % 4 {
                tokio::task::yield_now().await;
            }
            harness.client.disconnect().await.unwrap();

            match create.await.unwrap() {
                Ok(session) => assert_eq!(session.thread_id, "t1"),
                Err(err) => assert!(matches!(err, ClientError::ConnectionClosed(_))),
            }
            assert!(harness.client.sessions().is_empty(), "round {round}");
            assert_eq!(harness.client.status(), ConnectionStatus::Disconnected);
            harness.client.shutdown();
        }
    }

    #[tokio::test]
    async fn test_approval_for_unknown_session_sends_nothing() {
        let (harness, mut server) = Harness::connected(test_config()).await;

        let err = harness
            .client
            .approve_permission("ghost", PermissionMode::AcceptEdits)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::SessionNotFound(_)));
        let err = harness
            .client
            .change_permission_mode("ghost", PermissionMode::DontAsk)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::SessionNotFound(_)));

        // the next frame on the wire is this call, not an approval
        let client = harness.client.clone();
        let next = tokio::spawn(async move { client.call("turn/interrupt", json!({})).await });
        let call = expect_call(&mut server, "turn/interrupt").await;
        server.respond(call.id, json!({}));
        next.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_garbage_frames_are_discarded() {
        let (harness, mut server) = Harness::connected(test_config()).await;
        harness.create_session(&mut server, "t1").await;

        server.send_raw("not json");
        server.send_raw(r#"{"jsonrpc":"2.0"}"#);
        server.send_raw(r#"{"jsonrpc":"2.0","id":"srv-1","method":"fs/read","params":{}}"#);
        server.send_raw(r#"{"jsonrpc":"2.0","id":999999,"result":{}}"#);
        server.notify("thread/archived", json!({"thread_id": "t1"}));
        server.notify("turn/started", json!({"thread_id": 7}));
        server.notify("turn/started", json!({"turn_id": "r1", "thread_id": "t1"}));

        harness.wait_session("t1", |s| s.is_active()).await;
        assert_eq!(harness.client.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_shutdown_stops_everything() {
        let (harness, mut server) = Harness::connected(test_config()).await;

        let client = harness.client.clone();
        let call = tokio::spawn(async move { client.call("turn/interrupt", json!({})).await });
        expect_call(&mut server, "turn/interrupt").await;

        harness.client.shutdown();
        assert!(matches!(
            call.await.unwrap(),
            Err(ClientError::ConnectionClosed(_))
        ));

        let err = harness.client.call("turn/interrupt", json!({})).await.unwrap_err();
        assert!(matches!(err, ClientError::EngineStopped));
        let err = harness.client.connect(ADDRESS).await.unwrap_err();
        assert!(matches!(err, ClientError::EngineStopped));
    }

    #[tokio::test]
    async fn test_updates_stream() {
        let mut harness = Harness::new(test_config());
        let mut updates = Box::pin(harness.client.updates());

        let first = updates.next().await.unwrap();
        assert_eq!(first.status, ConnectionStatus::Disconnected);

        harness.client.connect(ADDRESS).await.unwrap();
        let next = updates.next().await.unwrap();
        assert_eq!(next.status, ConnectionStatus::Connecting);

        let mut server = harness.servers.recv().await.unwrap();
        server.accept().await.unwrap();
        let connected = loop {
            let snapshot = updates.next().await.unwrap();
            if snapshot.status.is_connected() {
                break snapshot;
            }
        };
        assert!(connected.sessions.is_empty());
    }
}
