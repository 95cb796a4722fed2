//! Cross-subsystem integration tests: gateway, lifecycle registry, and the
//! graph executor working together against a local WebSocket server.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use weft_core::{GraphId, NodeId, ReconnectPolicy, RunId, SessionKey, WireMessage};
use weft_gateway::{GatewayClient, GatewayConfig};
use weft_graph::{
    GraphDefinition, GraphExecutor, JsonFileRunStore, NodeFailure, NodeHandler, NodeInvocation,
    RunStatus,
};
use weft_lifecycle::{
    CleanupPolicy, CompletionHook, HookAction, HookEvent, RunDescriptor, RunRegistry,
};

type ServerSocket = WebSocketStream<TcpStream>;

async fn spawn_server<F, Fut>(session: F) -> String
where
    F: Fn(ServerSocket) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let session = Arc::new(session);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let ws = accept_async(stream).await.unwrap();
            let session = Arc::clone(&session);
            tokio::spawn(async move { session(ws).await });
        }
    });
    format!("ws://{addr}")
}

fn test_config(url: &str) -> GatewayConfig {
    GatewayConfig::new(url)
        .with_request_timeout(Duration::from_millis(500))
        .with_reconnect(ReconnectPolicy {
            initial_ms: 20,
            max_ms: 100,
            factor: 2.0,
            jitter: 0.0,
        })
}

struct CountingHook {
    events: Mutex<Vec<HookEvent>>,
    notify: mpsc::UnboundedSender<()>,
}

impl CountingHook {
    fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                events: Mutex::new(Vec::new()),
                notify: tx,
            }),
            rx,
        )
    }
}

impl CompletionHook for CountingHook {
    fn on_run_complete(&self, event: &HookEvent) {
        self.events.lock().unwrap().push(event.clone());
        self.notify.send(()).ok();
    }
}

/// A run's end event beats a never-resolving `agent.wait` poll; the hook
/// fires exactly once.
#[tokio::test]
async fn live_gateway_end_event_wins_and_hook_fires_once() {
    let url = spawn_server(|mut ws: ServerSocket| async move {
        // Push the lifecycle end event, then swallow everything (the
        // agent.wait request never gets an answer).
        let end = WireMessage::event(
            "agent.run",
            json!({
                "runId": "run-1",
                "data": {"phase": "end", "startedAt": 1_000, "endedAt": 6_000}
            }),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        ws.send(WsMessage::Text(end.to_json().unwrap())).await.ok();
        while ws.next().await.is_some() {}
    })
    .await;

    let client = GatewayClient::new(test_config(&url));
    client.connect().await.unwrap();

    let (hook, mut fired) = CountingHook::new();
    let registry = RunRegistry::new(Arc::new(client.clone()), hook.clone());
    registry.attach(&client);

    registry.register_run(RunDescriptor {
        run_id: RunId::new_unchecked("run-1"),
        child_session_key: SessionKey::new_unchecked("agent.child"),
        requester_session_key: SessionKey::new_unchecked("main"),
        task: "integration".to_string(),
        cleanup: CleanupPolicy::Keep,
        expects_completion_message: true,
    });

    tokio::time::timeout(Duration::from_secs(2), fired.recv())
        .await
        .expect("hook should fire")
        .unwrap();
    // Give the losing wait path room to misbehave if it were going to.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let events = hook.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, HookAction::Complete);
    assert_eq!(events[0].runtime_ms, Some(5_000));

    drop(events);
    client.disconnect().await;
}

/// The wait path reports completion when no lifecycle event ever arrives.
#[tokio::test]
async fn live_gateway_wait_resolution_completes_run() {
    let url = spawn_server(|mut ws: ServerSocket| async move {
        while let Some(Ok(message)) = ws.next().await {
            if let WsMessage::Text(text) = message
                && let Ok(WireMessage::Req { id, method, .. }) = WireMessage::from_json(&text)
                && method == "agent.wait"
            {
                let res = WireMessage::Res {
                    id,
                    ok: true,
                    payload: Some(json!({
                        "status": "ok",
                        "startedAt": 1_000,
                        "endedAt": 3_000,
                    })),
                    error: None,
                };
                ws.send(WsMessage::Text(res.to_json().unwrap())).await.ok();
            }
        }
    })
    .await;

    let client = GatewayClient::new(test_config(&url));
    client.connect().await.unwrap();

    let (hook, mut fired) = CountingHook::new();
    let registry = RunRegistry::new(Arc::new(client.clone()), hook.clone());
    registry.attach(&client);

    registry.register_run(RunDescriptor {
        run_id: RunId::new_unchecked("run-2"),
        child_session_key: SessionKey::new_unchecked("agent.child"),
        requester_session_key: SessionKey::new_unchecked("main"),
        task: "integration".to_string(),
        cleanup: CleanupPolicy::Delete,
        expects_completion_message: true,
    });

    tokio::time::timeout(Duration::from_secs(2), fired.recv())
        .await
        .expect("hook should fire")
        .unwrap();

    let events = hook.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, HookAction::Complete);
    assert_eq!(events[0].runtime_ms, Some(2_000));
    drop(events);

    assert!(!registry.is_tracked(&RunId::new_unchecked("run-2")));
    client.disconnect().await;
}

/// Graph nodes may perform RPC through the gateway while the executor
/// persists their progress.
#[tokio::test]
async fn graph_nodes_rpc_through_the_gateway() {
    let url = spawn_server(|mut ws: ServerSocket| async move {
        while let Some(Ok(message)) = ws.next().await {
            if let WsMessage::Text(text) = message
                && let Ok(WireMessage::Req { id, method, params }) = WireMessage::from_json(&text)
            {
                let payload = match method.as_str() {
                    "agent.fetch" => json!({"rows": 3}),
                    "agent.render" => json!({"report": format!("{} rows", params["rows"])}),
                    _ => json!(null),
                };
                let res = WireMessage::Res {
                    id,
                    ok: true,
                    payload: Some(payload),
                    error: None,
                };
                ws.send(WsMessage::Text(res.to_json().unwrap())).await.ok();
            }
        }
    })
    .await;

    let client = GatewayClient::new(test_config(&url));
    client.connect().await.unwrap();

    struct RpcNode {
        client: GatewayClient,
        method: &'static str,
    }

    #[async_trait]
    impl NodeHandler for RpcNode {
        async fn run(&self, invocation: NodeInvocation<'_>) -> Result<Value, NodeFailure> {
            let params = invocation
                .dep_outputs
                .values()
                .next()
                .cloned()
                .unwrap_or(json!({}));
            self.client
                .request(self.method, params)
                .await
                .map_err(|error| NodeFailure::msg(error.to_string()))
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileRunStore::new(dir.path()).unwrap());
    let graph = GraphDefinition::new(GraphId::new_unchecked("report"), "v1")
        .node(
            "fetch",
            Vec::<String>::new(),
            Arc::new(RpcNode {
                client: client.clone(),
                method: "agent.fetch",
            }),
        )
        .node(
            "render",
            ["fetch"],
            Arc::new(RpcNode {
                client: client.clone(),
                method: "agent.render",
            }),
        )
        .build()
        .unwrap();

    let executor = GraphExecutor::new(store.clone());
    let report = executor
        .execute(&graph, &RunId::new_unchecked("run-1"), &json!({}))
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Succeeded);
    assert_eq!(
        report.node_outputs[&NodeId::new_unchecked("render")],
        json!({"report": "3 rows"})
    );

    // A second execution replays both nodes from the file store without
    // touching the gateway again.
    client.disconnect().await;
    let replay = executor
        .execute(&graph, &RunId::new_unchecked("run-1"), &json!({}))
        .await
        .unwrap();
    assert_eq!(replay.status, RunStatus::Succeeded);
    assert_eq!(replay.replayed.len(), 2);
    assert!(replay.executed.is_empty());
    assert_eq!(replay.node_outputs, report.node_outputs);
}

/// A crash between two nodes resumes without re-running the completed
/// prefix, across separate executor instances and store handles.
#[tokio::test]
async fn file_store_resume_survives_process_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let graph_id = GraphId::new_unchecked("etl");
    let run_id = RunId::new_unchecked("nightly-1");

    struct StaticNode(Value);

    #[async_trait]
    impl NodeHandler for StaticNode {
        async fn run(&self, _invocation: NodeInvocation<'_>) -> Result<Value, NodeFailure> {
            Ok(self.0.clone())
        }
    }

    // "Process one" runs only the extract step, then dies.
    {
        let store = Arc::new(JsonFileRunStore::new(dir.path()).unwrap());
        let graph = GraphDefinition::new(graph_id.clone(), "v1")
            .node(
                "extract",
                Vec::<String>::new(),
                Arc::new(StaticNode(json!({"rows": 10}))),
            )
            .build()
            .unwrap();
        let report = GraphExecutor::new(store)
            .execute(&graph, &run_id, &json!({"day": "2026-08-07"}))
            .await
            .unwrap();
        assert_eq!(report.status, RunStatus::Succeeded);
    }

    // "Process two" declares the full pipeline over the same run id.
    let store = Arc::new(JsonFileRunStore::new(dir.path()).unwrap());
    let graph = GraphDefinition::new(graph_id, "v1")
        .node(
            "extract",
            Vec::<String>::new(),
            Arc::new(StaticNode(json!({"rows": 10}))),
        )
        .node("load", ["extract"], Arc::new(StaticNode(json!("loaded"))))
        .build()
        .unwrap();
    let report = GraphExecutor::new(store)
        .execute(&graph, &run_id, &json!({"day": "2026-08-07"}))
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Succeeded);
    assert_eq!(report.replayed, vec![NodeId::new_unchecked("extract")]);
    assert_eq!(report.executed, vec![NodeId::new_unchecked("load")]);
}
