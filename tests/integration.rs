//! Integration tests for account-rpc.
//!
//! A mock node sits on the far end of a duplex stream, a TCP socket or an
//! HTTP listener and answers requests the way a DREP node would.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use account_rpc::protocol::{Request, Response};
use account_rpc::AccountApi;
use account_rpc::{
    Client, ClientConfig, Encoding, Error, MethodDescriptor, RequestManager, RpcError,
};
use serde_json::{json, Value};
use tokio::io::{
    duplex, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
    DuplexStream,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

/// Server side of a JSON-lines connection.
struct MockNode<S> {
    stream: BufReader<S>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> MockNode<S> {
    fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    async fn next_request(&mut self) -> Option<Request> {
        let mut line = String::new();
        match self.stream.read_line(&mut line).await.unwrap() {
            0 => None,
            _ => Some(serde_json::from_str(&line).unwrap()),
        }
    }

    async fn reply(&mut self, response: &Response) {
        let mut bytes = serde_json::to_vec(response).unwrap();
        bytes.push(b'\n');
        self.stream.get_mut().write_all(&bytes).await.unwrap();
    }

    /// Answer every request with `answer` until the client goes away.
    async fn serve<F>(mut self, answer: F)
    where
        F: Fn(&Request) -> Response,
    {
        while let Some(req) = self.next_request().await {
            let response = answer(&req);
            self.reply(&response).await;
        }
    }
}

fn connected() -> (Client, MockNode<DuplexStream>) {
    let (client, server) = duplex(64 * 1024);
    (Client::builder().connect_stream(client), MockNode::new(server))
}

/// Answers like a node with an open wallet.
fn wallet_node(req: &Request) -> Response {
    match req.method.as_str() {
        "account_sign" => Response::success(req.id, json!(format!("sig({})", req.params[1]))),
        "account_addressList" => Response::success(req.id, json!(["0xA", "0xB"])),
        "account_gasPrice" => Response::success(req.id, json!(3)),
        "account_transfer" => Response::success(req.id, json!("0xTxHash")),
        other => Response::failure(
            req.id,
            RpcError {
                code: -32601,
                message: format!("method {} not found", other),
                data: None,
            },
        ),
    }
}

#[tokio::test]
async fn test_sign_future_and_callback() {
    let (client, node) = connected();
    tokio::spawn(node.serve(wallet_node));

    let sig = client.account().sign("0xAddr", "msgHash").unwrap().await.unwrap();
    assert_eq!(sig, json!("sig(\"msgHash\")"));

    let (tx, rx) = oneshot::channel();
    let sign = client.account().facade().method("sign").unwrap().clone();
    sign.call_with(vec![json!("0xAddr"), json!("other")], move |outcome| {
        let _ = tx.send(outcome);
    })
    .unwrap();
    assert_eq!(rx.await.unwrap().unwrap(), json!("sig(\"other\")"));
}

#[tokio::test]
async fn test_replies_out_of_order() {
    let (client, mut node) = connected();
    let account = client.account();

    let calls: Vec<_> = (0..8)
        .map(|i| account.get_code(format!("0x{}", i)).unwrap())
        .collect();

    let mut requests = Vec::new();
    for _ in 0..8 {
        requests.push(node.next_request().await.unwrap());
    }
    assert_eq!(client.manager().pending_ids(), (1..=8).collect::<Vec<u64>>());

    // answer in a permuted order, echoing the argument back
    for i in [5, 0, 7, 2, 1, 6, 3, 4] {
        let req = &requests[i];
        node.reply(&Response::success(req.id, req.params[0].clone())).await;
    }

    for (i, call) in calls.into_iter().enumerate() {
        assert_eq!(call.await.unwrap(), json!(format!("0x{}", i)));
    }
    assert_eq!(client.manager().outstanding(), 0);
}

#[tokio::test]
async fn test_disconnect_fails_every_outstanding_call() {
    let (client, mut node) = connected();

    let first = client.account().gas_price().unwrap();
    let second = client.account().suggest_key().unwrap();
    node.next_request().await.unwrap();
    node.next_request().await.unwrap();

    let fired = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = oneshot::channel();
    let counter = fired.clone();
    client
        .account()
        .facade()
        .method("lockWallet")
        .unwrap()
        .call_with(vec![], move |outcome| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(outcome);
        })
        .unwrap();
    node.next_request().await.unwrap();

    drop(node);

    assert!(matches!(first.await, Err(Error::TransportClosed)));
    assert!(matches!(second.await, Err(Error::TransportClosed)));
    assert!(matches!(rx.await.unwrap(), Err(Error::TransportClosed)));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(client.is_closed());

    // later calls fail without reaching the wire
    let late = client.account().gas_price().unwrap();
    assert_eq!(late.id(), None);
    assert!(matches!(late.await, Err(Error::TransportClosed)));
}

#[tokio::test]
async fn test_arity_mismatch_leaves_transport_untouched() {
    let (client, mut node) = connected();
    let facade = client.account().facade();

    assert!(matches!(
        facade.call("transfer", vec![json!("0xFrom"), json!("0xTo")]),
        Err(Error::ArityMismatch { expected: 3, got: 2, .. })
    ));
    assert!(matches!(
        facade.call("gasPrice", vec![json!(1)]),
        Err(Error::ArityMismatch { expected: 0, got: 1, .. })
    ));
    assert_eq!(client.manager().outstanding(), 0);
    assert_eq!(client.manager().pending_frames(), 0);

    let call = client.account().transfer("0xFrom", "0xTo", "100").unwrap();
    let req = node.next_request().await.unwrap();
    assert_eq!(req.id, 1);
    assert_eq!(req.method, "account_transfer");
    assert_eq!(req.params, vec![json!("0xFrom"), json!("0xTo"), json!("100")]);
    node.reply(&Response::success(req.id, json!("0xTxHash"))).await;
    assert_eq!(call.await.unwrap(), json!("0xTxHash"));
}

#[tokio::test]
async fn test_account_surface_wire_names() {
    let (client, mut node) = connected();
    let api = client.account();

    let calls = vec![
        (api.address_list().unwrap(), "account_addressList", 0),
        (api.call_contract("0xF", "0xT", "0xIn", "0", true).unwrap(), "account_call", 5),
        (api.close_wallet().unwrap(), "account_closeWallet", 0),
        (api.create_code("0xF", "0xT", "0x6060").unwrap(), "account_createCode", 3),
        (api.create_wallet("pw").unwrap(), "account_createWallet", 1),
        (api.dump_privkey("0xA").unwrap(), "account_dumpPrivkey", 1),
        (api.gas_price().unwrap(), "account_gasPrice", 0),
        (api.get_code("0xA").unwrap(), "account_getCode", 1),
        (api.lock_wallet().unwrap(), "account_lockWallet", 0),
        (api.open_wallet("pw").unwrap(), "account_openWallet", 1),
        (
            api.register_account([json!("0xA"), json!("name"), json!("0xKey"), json!(1)])
                .unwrap(),
            "account_registerAccount",
            4,
        ),
        (api.sign("0xA", "hash").unwrap(), "account_sign", 2),
        (api.suggest_key().unwrap(), "account_suggestKey", 0),
        (api.transfer("0xF", "0xT", "1").unwrap(), "account_transfer", 3),
        (api.unlock_wallet("pw").unwrap(), "account_unLockWallet", 1),
    ];

    let mut pending = Vec::new();
    for (call, wire, arity) in calls {
        let req = node.next_request().await.unwrap();
        assert_eq!(Some(req.id), call.id());
        assert_eq!(req.method, wire);
        assert_eq!(req.params.len(), arity);
        pending.push((call, req.id));
    }

    for (_, id) in &pending {
        node.reply(&Response::success(*id, json!(id))).await;
    }
    for (call, id) in pending {
        assert_eq!(call.await.unwrap(), json!(id));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_from_many_threads() {
    const CALLERS: usize = 64;

    let (client, mut node) = connected();

    let node = tokio::spawn(async move {
        let mut requests = Vec::with_capacity(CALLERS);
        for _ in 0..CALLERS {
            requests.push(node.next_request().await.unwrap());
        }
        // deterministic shuffle
        requests.sort_by_key(|req| (req.id * 7919) % 97);
        for req in &requests {
            let response = Response::success(req.id, req.params[0].clone());
            node.reply(&response).await;
            // a repeated reply must not resolve anything twice
            node.reply(&response).await;
        }
        node
    });

    let callers: Vec<_> = (0..CALLERS)
        .map(|i| {
            let api: AccountApi = client.account().clone();
            tokio::spawn(async move {
                let call = api.get_code(format!("0x{:04}", i)).unwrap();
                let id = call.id().unwrap();
                (i, id, call.await)
            })
        })
        .collect();

    let mut ids = Vec::with_capacity(CALLERS);
    for caller in callers {
        let (i, id, outcome) = caller.await.unwrap();
        assert_eq!(outcome.unwrap(), json!(format!("0x{:04}", i)));
        ids.push(id);
    }
    let _node = node.await.unwrap();

    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), CALLERS);
    assert_eq!(client.manager().outstanding(), 0);
}

#[tokio::test]
async fn test_remote_error_surfaces() {
    let (client, node) = connected();
    tokio::spawn(node.serve(wallet_node));

    match client.account().dump_privkey("0xA").unwrap().await {
        Err(Error::Remote(err)) => {
            assert_eq!(err.code, -32601);
            assert!(err.message.contains("account_dumpPrivkey"));
        }
        other => panic!("unexpected {:?}", other),
    }

    // the connection survives a remote error
    let list: Vec<String> = client.account().address_list().unwrap().typed().await.unwrap();
    assert_eq!(list, ["0xA", "0xB"]);
}

#[tokio::test]
async fn test_custom_namespace_shares_connection() {
    let (client, node) = connected();
    tokio::spawn(node.serve(|req| Response::success(req.id, json!(req.method))));

    let chain = client
        .bind(vec![
            MethodDescriptor::new("getBalance", "chain_getBalance", 1),
            MethodDescriptor::new("getMaxHeight", "chain_getMaxHeight", 0),
        ])
        .unwrap();

    let height = chain.call("getMaxHeight", vec![]).unwrap();
    let gas = client.account().gas_price().unwrap();
    assert_eq!(height.await.unwrap(), json!("chain_getMaxHeight"));
    assert_eq!(gas.await.unwrap(), json!("account_gasPrice"));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_then_late_reply() {
    let (client, server) = duplex(64 * 1024);
    let client = Client::builder()
        .request_timeout(Duration::from_millis(500))
        .connect_stream(client);
    let mut node = MockNode::new(server);

    let call = client.account().gas_price().unwrap();
    let req = node.next_request().await.unwrap();

    match call.await {
        Err(Error::Timeout { id, method }) => {
            assert_eq!(id, req.id);
            assert_eq!(method, "account_gasPrice");
        }
        other => panic!("unexpected {:?}", other),
    }

    // the late reply is dropped and the next call still works
    node.reply(&Response::success(req.id, json!(1))).await;
    let next = client.account().gas_price().unwrap();
    let req = node.next_request().await.unwrap();
    node.reply(&Response::success(req.id, json!(2))).await;
    assert_eq!(next.await.unwrap(), json!(2));
}

#[tokio::test]
async fn test_msgpack_length_prefixed() {
    let (client, mut server) = duplex(64 * 1024);
    let config = ClientConfig {
        encoding: Encoding::MsgPack,
        ..ClientConfig::default()
    };
    let manager = RequestManager::from_stream(client, &config);
    let api = AccountApi::new(manager);

    let call = api.sign("0xAddr", "msgHash").unwrap();

    let len = server.read_u32().await.unwrap() as usize;
    let mut body = vec![0u8; len];
    server.read_exact(&mut body).await.unwrap();
    let req: Request = rmp_serde::from_slice(&body).unwrap();
    assert_eq!(req.method, "account_sign");

    let reply = rmp_serde::to_vec_named(&Response::success(req.id, json!("0xSig"))).unwrap();
    server.write_u32(reply.len() as u32).await.unwrap();
    server.write_all(&reply).await.unwrap();

    assert_eq!(call.await.unwrap(), Value::from("0xSig"));
}

#[tokio::test]
async fn test_connect_over_tcp() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        MockNode::new(socket).serve(wallet_node).await;
    });

    let client = Client::builder().tcp(addr).connect().await.unwrap();
    assert_eq!(client.account().gas_price().unwrap().await.unwrap(), json!(3));
    assert_eq!(client.close(), 0);
}

type HttpAnswer = Arc<dyn Fn(&Request) -> Option<Response> + Send + Sync>;

/// Minimal HTTP node: one request per connection. `None` answers 500.
/// Returns the URL and the request heads seen so far.
async fn http_node(answer: HttpAnswer) -> (String, Arc<parking_lot::Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let heads = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let seen = heads.clone();
    tokio::spawn(async move {
        loop {
            let (socket, _) = listener.accept().await.unwrap();
            let answer = answer.clone();
            let seen = seen.clone();
            tokio::spawn(async move {
                answer_http(socket, answer, seen).await;
            });
        }
    });

    (url, heads)
}

async fn answer_http(
    mut socket: TcpStream,
    answer: HttpAnswer,
    seen: Arc<parking_lot::Mutex<Vec<String>>>,
) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let len = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .map(|(_, value)| value.trim().parse::<usize>().unwrap())
        .unwrap_or(0);

    while buf.len() < head_end + len {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "body cut short");
        buf.extend_from_slice(&chunk[..n]);
    }
    let request: Request = serde_json::from_slice(&buf[head_end..head_end + len]).unwrap();
    seen.lock().push(head);

    let (status, body) = match answer(&request) {
        Some(response) => ("200 OK", serde_json::to_vec(&response).unwrap()),
        None => ("500 Internal Server Error", b"node exploded".to_vec()),
    };
    let reply = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n{}",
        status,
        body.len(),
        "Connection: close\r\n\r\n"
    );
    socket.write_all(reply.as_bytes()).await.unwrap();
    socket.write_all(&body).await.unwrap();
    let _ = socket.shutdown().await;
}

#[tokio::test]
async fn test_http_posts_each_request() {
    let (url, heads) = http_node(Arc::new(|req: &Request| Some(wallet_node(req)))).await;
    let client = Client::builder().http(url).connect().await.unwrap();

    assert_eq!(client.account().gas_price().unwrap().await.unwrap(), json!(3));
    let sig = client.account().sign("0xAddr", "msgHash").unwrap().await.unwrap();
    assert_eq!(sig, json!("sig(\"msgHash\")"));
    match client.account().lock_wallet().unwrap().await {
        Err(Error::Remote(err)) => assert_eq!(err.code, -32601),
        other => panic!("unexpected {:?}", other),
    }

    let heads = heads.lock().clone();
    assert_eq!(heads.len(), 3);
    for head in &heads {
        assert!(head.starts_with("POST / HTTP/1.1\r\n"), "{}", head);
        assert!(head.to_ascii_lowercase().contains("content-type: application/json"));
    }
    assert_eq!(client.manager().outstanding(), 0);
}

#[tokio::test]
async fn test_http_concurrent_calls_correlate() {
    let echo: HttpAnswer =
        Arc::new(|req: &Request| Some(Response::success(req.id, req.params[0].clone())));
    let (url, _heads) = http_node(echo).await;
    let client = Client::builder().http(url).connect().await.unwrap();

    let calls: Vec<_> = (0..16)
        .map(|i| client.account().dump_privkey(format!("0x{}", i)).unwrap())
        .collect();
    for (i, call) in calls.into_iter().enumerate() {
        assert_eq!(call.await.unwrap(), json!(format!("0x{}", i)));
    }
    assert_eq!(client.manager().pending_frames(), 0);
}

#[tokio::test]
async fn test_http_failures_fail_only_their_call() {
    let (url, _heads) = http_node(Arc::new(|req: &Request| match req.method.as_str() {
        "account_gasPrice" => None,
        "account_suggestKey" => Some(Response::success(req.id + 1000, json!("0xKey"))),
        _ => Some(Response::success(req.id, json!("ok"))),
    }))
    .await;
    let client = Client::builder().http(url).connect().await.unwrap();

    match client.account().gas_price().unwrap().await {
        Err(Error::HttpStatus { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "node exploded");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(
        client.account().suggest_key().unwrap().await,
        Err(Error::Protocol(_))
    ));

    // no connection to lose: the next call goes through
    assert!(!client.is_closed());
    assert_eq!(client.account().close_wallet().unwrap().await.unwrap(), json!("ok"));
}

#[tokio::test]
async fn test_http_close_fails_later_calls() {
    let (url, _heads) = http_node(Arc::new(|req: &Request| Some(wallet_node(req)))).await;
    let client = Client::builder().http(url).connect().await.unwrap();

    assert_eq!(client.close(), 0);
    let call = client.account().gas_price().unwrap();
    assert_eq!(call.id(), None);
    assert!(matches!(call.await, Err(Error::TransportClosed)));
}
