//! In-process Starknet JSON-RPC node for driving the client over HTTP.

#![allow(dead_code)]

use actix_web::{
    App,
    HttpServer,
    dev::ServerHandle,
    web,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use luck3_client::{
    Account,
    Call,
    Felt,
    felt::selector,
};
use serde_json::{
    Value,
    json,
};
use std::{
    collections::HashMap,
    net::TcpListener,
    sync::{
        Arc,
        Mutex,
    },
    thread::JoinHandle,
};

#[derive(Clone)]
enum Reply {
    Result(Value),
    Error { code: i64, message: String, data: Value },
}

#[derive(Default)]
struct Script {
    exact: HashMap<(Felt, Vec<Felt>), Reply>,
    by_selector: HashMap<Felt, Reply>,
    receipts: HashMap<Felt, Value>,
    methods: Vec<String>,
}

type SharedScript = Arc<Mutex<Script>>;

pub struct FakeNode {
    base_url: String,
    script: SharedScript,
    server_handle: ServerHandle,
    server_thread: Option<JoinHandle<()>>,
}

impl FakeNode {
    pub fn start() -> Self {
        let script: SharedScript = Arc::default();
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let server_script = script.clone();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(server_script.clone()))
                .route("/", web::post().to(handle_rpc))
        })
        .workers(1)
        .listen(listener)
        .unwrap()
        .run();

        let server_handle = server.handle();
        let server_thread = std::thread::spawn(move || {
            let sys = actix_web::rt::System::new();
            let _ = sys.block_on(server);
        });

        Self {
            base_url,
            script,
            server_handle,
            server_thread: Some(server_thread),
        }
    }

    pub fn url(&self) -> &str {
        &self.base_url
    }

    pub fn on_call(&self, entrypoint: &str, calldata: Vec<Felt>, result: Value) {
        self.script
            .lock()
            .unwrap()
            .exact
            .insert((selector(entrypoint), calldata), Reply::Result(result));
    }

    pub fn on_any_call(&self, entrypoint: &str, result: Value) {
        self.script
            .lock()
            .unwrap()
            .by_selector
            .insert(selector(entrypoint), Reply::Result(result));
    }

    pub fn revert_call(&self, entrypoint: &str, calldata: Vec<Felt>, reason: &str) {
        self.script.lock().unwrap().exact.insert(
            (selector(entrypoint), calldata),
            Reply::Error {
                code: 40,
                message: "Contract error".into(),
                data: json!({ "revert_error": reason }),
            },
        );
    }

    pub fn revert_any(&self, entrypoint: &str, reason: &str) {
        self.script.lock().unwrap().by_selector.insert(
            selector(entrypoint),
            Reply::Error {
                code: 40,
                message: "Contract error".into(),
                data: json!({ "revert_error": reason }),
            },
        );
    }

    pub fn confirm(&self, hash: Felt, execution_status: &str) {
        self.script.lock().unwrap().receipts.insert(
            hash,
            json!({
                "type": "INVOKE",
                "transaction_hash": hash,
                "execution_status": execution_status,
                "finality_status": "ACCEPTED_ON_L2",
            }),
        );
    }

    pub fn methods(&self) -> Vec<String> {
        self.script.lock().unwrap().methods.clone()
    }
}

impl Drop for FakeNode {
    fn drop(&mut self) {
        let _ = self.server_handle.stop(true);
        if let Some(thread) = self.server_thread.take() {
            let _ = thread.join();
        }
    }
}

async fn handle_rpc(
    script: web::Data<SharedScript>,
    body: web::Json<Value>,
) -> web::Json<Value> {
    let id = body["id"].clone();
    let method = body["method"].as_str().unwrap_or_default().to_string();
    let reply = {
        let mut script = script.lock().unwrap();
        script.methods.push(method.clone());
        match method.as_str() {
            "starknet_call" => lookup_call(&script, &body["params"]),
            "starknet_getTransactionReceipt" => {
                let hash: Option<Felt> =
                    serde_json::from_value(body["params"]["transaction_hash"].clone()).ok();
                match hash.and_then(|h| script.receipts.get(&h).cloned()) {
                    Some(receipt) => Reply::Result(receipt),
                    None => Reply::Error {
                        code: 29,
                        message: "Transaction hash not found".into(),
                        data: Value::Null,
                    },
                }
            }
            _ => Reply::Error {
                code: -32601,
                message: "Method not found".into(),
                data: Value::Null,
            },
        }
    };
    let body = match reply {
        Reply::Result(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Reply::Error {
            code,
            message,
            data: Value::Null,
        } => json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } }),
        Reply::Error {
            code,
            message,
            data,
        } => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": code, "message": message, "data": data },
        }),
    };
    web::Json(body)
}

fn lookup_call(script: &Script, params: &Value) -> Reply {
    let request = &params["request"];
    let parsed: Option<(Felt, Vec<Felt>)> = serde_json::from_value(request["entry_point_selector"].clone())
        .ok()
        .zip(serde_json::from_value(request["calldata"].clone()).ok());
    let Some((entry_point, calldata)) = parsed else {
        return Reply::Error {
            code: -32602,
            message: "Invalid params".into(),
            data: Value::Null,
        };
    };
    script
        .exact
        .get(&(entry_point, calldata))
        .or_else(|| script.by_selector.get(&entry_point))
        .cloned()
        .unwrap_or(Reply::Error {
            code: 21,
            message: "Invalid message selector".into(),
            data: Value::Null,
        })
}

/// Account that "signs" by handing back a fixed hash and remembering the
/// calls it was asked to submit.
#[derive(Clone)]
pub struct RecordingAccount {
    address: Felt,
    hash: Felt,
    submitted: Arc<Mutex<Vec<Vec<Call>>>>,
    reject_with: Option<String>,
}

impl RecordingAccount {
    pub fn new(address: Felt, hash: Felt) -> Self {
        Self {
            address,
            hash,
            submitted: Arc::default(),
            reject_with: None,
        }
    }

    pub fn rejecting(mut self, message: &str) -> Self {
        self.reject_with = Some(message.to_string());
        self
    }

    pub fn submitted(&self) -> Vec<Vec<Call>> {
        self.submitted.lock().unwrap().clone()
    }
}

impl Account for RecordingAccount {
    fn address(&self) -> Felt {
        self.address
    }

    async fn execute(&self, calls: Vec<Call>) -> Result<Felt> {
        if let Some(message) = &self.reject_with {
            return Err(eyre!("{message}"));
        }
        self.submitted.lock().unwrap().push(calls);
        Ok(self.hash)
    }
}

/// Raw felt tuple of `get_round_info`.
pub fn raw_round(id: u64, end_time: u64, prize_pool: u64, tickets: u64, winning: Option<u8>) -> Value {
    json!([
        Felt::from(id),
        Felt::from(end_time),
        Felt::from(prize_pool),
        Felt::ZERO,
        Felt::from(tickets),
        Felt::from(u64::from(winning.unwrap_or(0))),
        Felt::from(winning.is_some()),
    ])
}
