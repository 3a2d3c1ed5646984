//! `EvmChainAccessor` against an in-process JSON-RPC node
//!
//! The node answers `eth_getCode`, `eth_call` and `eth_getBlockByNumber` with
//! canned replies, which covers the contract-wallet (ERC-1271) branch and the
//! head-block lookup without a real chain.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use alloy::primitives::{Address, B256};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use claims_rs::{
    build_message, encode_interoperable_address, ChainAccessor, ChainRegistry, ClaimSigner,
    EvmChainAccessor, LocalClaimSigner, VerificationClaim, VerificationEngine, VerifyError,
    CLAIM_DOMAIN,
};
use serde_json::{json, Value};

// Anvil account #0
const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const SUBJECT: &str = "did:plc:ewvi7nxzyoun6zhxrhs64oiz";
const CHAIN_ID: u64 = 31337;

/// Deployed bytecode stub; only its non-emptiness matters
const WALLET_CODE: &str = "0x6080604052";

#[derive(Clone, Copy)]
enum CallReply {
    MagicValue,
    WrongValue,
    Revert,
    HttpFailure,
}

#[derive(Clone)]
struct MockNode {
    code: &'static str,
    call_reply: CallReply,
    latest_block: Value,
    eth_calls: Arc<AtomicUsize>,
}

impl MockNode {
    fn new(code: &'static str, call_reply: CallReply) -> Self {
        Self {
            code,
            call_reply,
            latest_block: sample_block(),
            eth_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

fn rpc_result(id: &Value, result: Value) -> Response {
    Json(json!({ "jsonrpc": "2.0", "id": id, "result": result })).into_response()
}

fn rpc_error(id: &Value, code: i64, message: &str) -> Response {
    Json(json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message, "data": "0x" }
    }))
    .into_response()
}

/// A `bytes4` return value, left-aligned in one ABI word
fn bytes4_word(selector: &str) -> String {
    format!("0x{}{}", selector, "00".repeat(28))
}

async fn handle_rpc(State(node): State<MockNode>, Json(request): Json<Value>) -> Response {
    let id = request["id"].clone();
    match request["method"].as_str().unwrap_or_default() {
        "eth_getCode" => rpc_result(&id, json!(node.code)),
        "eth_getBlockByNumber" => rpc_result(&id, node.latest_block.clone()),
        "eth_call" => {
            node.eth_calls.fetch_add(1, Ordering::SeqCst);
            match node.call_reply {
                CallReply::MagicValue => rpc_result(&id, json!(bytes4_word("1626ba7e"))),
                CallReply::WrongValue => rpc_result(&id, json!(bytes4_word("deadbeef"))),
                CallReply::Revert => rpc_error(&id, 3, "execution reverted"),
                CallReply::HttpFailure => {
                    (StatusCode::SERVICE_UNAVAILABLE, "upstream unavailable").into_response()
                }
            }
        }
        _ => rpc_error(&id, -32601, "method not found"),
    }
}

async fn spawn_node(node: MockNode) -> String {
    let app = Router::new()
        .route("/", post(handle_rpc))
        .with_state(node);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn zero_word() -> String {
    format!("0x{}", "00".repeat(32))
}

fn sample_block_hash() -> B256 {
    B256::repeat_byte(0xab)
}

fn sample_block() -> Value {
    json!({
        "hash": sample_block_hash().to_string(),
        "parentHash": zero_word(),
        "sha3Uncles": zero_word(),
        "miner": format!("0x{}", "00".repeat(20)),
        "stateRoot": zero_word(),
        "transactionsRoot": zero_word(),
        "receiptsRoot": zero_word(),
        "logsBloom": format!("0x{}", "00".repeat(256)),
        "difficulty": "0x0",
        "number": "0x10",
        "gasLimit": "0x1c9c380",
        "gasUsed": "0x0",
        "timestamp": "0x6553f100",
        "extraData": "0x",
        "mixHash": zero_word(),
        "nonce": "0x0000000000000000",
        "baseFeePerGas": "0x7",
        "totalDifficulty": "0x0",
        "size": "0x220",
        "uncles": [],
        "transactions": []
    })
}

/// Contract wallet address; never the signer's own EOA
fn wallet() -> Address {
    Address::repeat_byte(0x77)
}

async fn signed_for(address: Address) -> (VerificationClaim, Vec<u8>) {
    let signer = LocalClaimSigner::from_private_key(TEST_KEY).unwrap();
    let encoded = encode_interoperable_address(address, CHAIN_ID);
    let claim = build_message(SUBJECT, &encoded, sample_block_hash());
    let signature = signer.sign_claim(&CLAIM_DOMAIN, &claim).await.unwrap();
    (claim, signature.to_vec())
}

async fn accessor_for(node: MockNode) -> EvmChainAccessor {
    let url = spawn_node(node).await;
    EvmChainAccessor::new("mock", CHAIN_ID, &url).unwrap()
}

#[tokio::test]
async fn test_eoa_signature_needs_no_rpc() {
    // Nothing listens on the discard port; ecrecover must decide alone
    let accessor = EvmChainAccessor::new("offline", CHAIN_ID, "http://127.0.0.1:9").unwrap();
    let signer = LocalClaimSigner::from_private_key(TEST_KEY).unwrap();
    let (claim, signature) = signed_for(signer.address()).await;

    let valid = accessor
        .verify_signature(signer.address(), &CLAIM_DOMAIN, &claim, &signature)
        .await
        .unwrap();
    assert!(valid);
}

#[tokio::test]
async fn test_contract_wallet_magic_value_accepted() {
    let node = MockNode::new(WALLET_CODE, CallReply::MagicValue);
    let calls = node.eth_calls.clone();
    let accessor = accessor_for(node).await;
    let (claim, signature) = signed_for(wallet()).await;

    let valid = accessor
        .verify_signature(wallet(), &CLAIM_DOMAIN, &claim, &signature)
        .await
        .unwrap();
    assert!(valid);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_contract_wallet_wrong_value_rejected() {
    let accessor = accessor_for(MockNode::new(WALLET_CODE, CallReply::WrongValue)).await;
    let (claim, signature) = signed_for(wallet()).await;

    let valid = accessor
        .verify_signature(wallet(), &CLAIM_DOMAIN, &claim, &signature)
        .await
        .unwrap();
    assert!(!valid);
}

#[tokio::test]
async fn test_contract_wallet_revert_is_invalid_not_error() {
    let accessor = accessor_for(MockNode::new(WALLET_CODE, CallReply::Revert)).await;
    let (claim, signature) = signed_for(wallet()).await;

    let result = accessor
        .verify_signature(wallet(), &CLAIM_DOMAIN, &claim, &signature)
        .await;
    assert_eq!(result, Ok(false));
}

#[tokio::test]
async fn test_contract_call_transport_failure_is_reported() {
    let accessor = accessor_for(MockNode::new(WALLET_CODE, CallReply::HttpFailure)).await;
    let (claim, signature) = signed_for(wallet()).await;

    let result = accessor
        .verify_signature(wallet(), &CLAIM_DOMAIN, &claim, &signature)
        .await;
    assert!(matches!(result, Err(VerifyError::Transport(_))));
}

#[tokio::test]
async fn test_address_without_code_skips_erc1271() {
    let node = MockNode::new("0x", CallReply::MagicValue);
    let calls = node.eth_calls.clone();
    let accessor = accessor_for(node).await;
    let (claim, signature) = signed_for(wallet()).await;

    let valid = accessor
        .verify_signature(wallet(), &CLAIM_DOMAIN, &claim, &signature)
        .await
        .unwrap();
    assert!(!valid);
    assert_eq!(calls.load(Ordering::SeqCst), 0, "eth_call must not be made");
}

#[tokio::test]
async fn test_unreachable_node_is_transport_error() {
    let accessor = EvmChainAccessor::new("offline", CHAIN_ID, "http://127.0.0.1:9").unwrap();
    let (claim, signature) = signed_for(wallet()).await;

    let result = accessor
        .verify_signature(wallet(), &CLAIM_DOMAIN, &claim, &signature)
        .await;
    assert!(matches!(result, Err(VerifyError::Transport(_))));
    assert!(matches!(
        accessor.latest_block_hash().await,
        Err(VerifyError::Transport(_))
    ));
}

#[tokio::test]
async fn test_latest_block_hash() {
    let accessor = accessor_for(MockNode::new("0x", CallReply::MagicValue)).await;
    assert_eq!(accessor.latest_block_hash().await.unwrap(), sample_block_hash());
}

#[tokio::test]
async fn test_missing_latest_block_falls_back_to_zero_hash() {
    let mut node = MockNode::new("0x", CallReply::MagicValue);
    node.latest_block = Value::Null;
    let accessor = accessor_for(node).await;

    assert_eq!(accessor.latest_block_hash().await.unwrap(), B256::ZERO);
}

#[tokio::test]
async fn test_engine_verifies_contract_wallet_claim() {
    let accessor = accessor_for(MockNode::new(WALLET_CODE, CallReply::MagicValue)).await;
    let engine = VerificationEngine::new(ChainRegistry::new().with(Arc::new(accessor)));
    let (claim, signature) = signed_for(wallet()).await;

    let outcome = engine
        .verify_detailed(SUBJECT, &claim.address, claim.blockHash.as_slice(), &signature)
        .await;
    assert!(outcome.is_valid());
}

#[tokio::test]
async fn test_engine_reports_transport_reason() {
    let accessor = accessor_for(MockNode::new(WALLET_CODE, CallReply::HttpFailure)).await;
    let engine = VerificationEngine::new(ChainRegistry::new().with(Arc::new(accessor)));
    let (claim, signature) = signed_for(wallet()).await;

    let outcome = engine
        .verify_detailed(SUBJECT, &claim.address, claim.blockHash.as_slice(), &signature)
        .await;
    assert!(!outcome.is_valid());
    assert_eq!(outcome.reason().map(VerifyError::kind), Some("transport"));
}
