//! HTTP provider against a mock JSON-RPC node.

use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ledger_tx_engine::config::RpcConfig;
use ledger_tx_engine::ledger::provider::{HttpProvider, LedgerProvider, VmLogFilter};
use ledger_tx_engine::ledger::rpc::LedgerRpc;
use ledger_tx_engine::ledger::types::LedgerError;

mod common;
use common::{addr, BOB};

fn rpc_config() -> RpcConfig {
    RpcConfig {
        timeout_secs: 2,
        subscription_poll_ms: 50,
    }
}

#[tokio::test]
async fn test_typed_calls_over_http() {
    let addr_ = common::start_rpc_backend(|method, params| async move {
        match method.as_str() {
            "ledger_getSnapshotChainHeight" => Ok(json!("4821")),
            "ledger_getAccountBlockByHash" => Ok(json!({
                "blockType": 4,
                "hash": params[0],
                "address": BOB,
                "data": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
                "confirmedHash": "snap"
            })),
            _ => Err((-32601, format!("method {} not found", method))),
        }
    })
    .await;
    let provider = HttpProvider::new(&format!("http://{}", addr_), &rpc_config()).unwrap();

    assert_eq!(provider.snapshot_chain_height().await.unwrap(), 4821);

    let block = provider.account_block_by_hash("abc").await.unwrap().unwrap();
    assert_eq!(block.hash.as_deref(), Some("abc"));
    assert!(block.is_confirmed());
    assert_eq!(block.payload().unwrap().unwrap().len(), 33);

    let err = provider.quota(&addr(BOB)).await.unwrap_err();
    assert!(matches!(err, LedgerError::Rpc { code: -32601, .. }));
}

#[tokio::test]
async fn test_subscription_delivers_and_unsubscribes() {
    let polls = Arc::new(AtomicU32::new(0));
    let uninstalls = Arc::new(AtomicU32::new(0));
    let (p, u) = (polls.clone(), uninstalls.clone());
    let backend = common::start_rpc_backend(move |method, _params| {
        let (p, u) = (p.clone(), u.clone());
        async move {
            match method.as_str() {
                "subscribe_createVmlogFilter" => Ok(json!("0xfilter")),
                "subscribe_getChangesByFilterId" => {
                    if p.fetch_add(1, Ordering::SeqCst) == 0 {
                        Ok(json!({
                            "result": [{
                                "vmlog": { "topics": ["t0"], "data": "AQ==" },
                                "accountBlockHash": "h1",
                                "removed": false
                            }]
                        }))
                    } else {
                        Ok(json!({ "result": [] }))
                    }
                }
                "subscribe_uninstallFilter" => {
                    u.fetch_add(1, Ordering::SeqCst);
                    Ok(Value::Bool(true))
                }
                other => Err((-32601, format!("method {} not found", other))),
            }
        }
    })
    .await;
    let provider = HttpProvider::new(&format!("http://{}", backend), &rpc_config()).unwrap();

    let mut subscription = provider
        .subscribe(VmLogFilter::for_contract(&addr(BOB)))
        .await
        .unwrap();
    assert_eq!(subscription.id, "0xfilter");
    assert_eq!(provider.subscription_count(), 1);

    let event = tokio::time::timeout(Duration::from_secs(5), subscription.events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.account_block_hash.as_deref(), Some("h1"));
    assert_eq!(event.vmlog.topics, vec!["t0".to_string()]);

    provider.unsubscribe_all().await;
    assert_eq!(provider.subscription_count(), 0);
    assert_eq!(uninstalls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_slow_node_hits_request_timeout() {
    let backend = common::start_rpc_backend(|_, _| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(json!(1))
    })
    .await;
    let provider = HttpProvider::new(&format!("http://{}", backend), &rpc_config()).unwrap();

    let err = provider.snapshot_chain_height().await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::RequestTimeout { .. } | LedgerError::Transport { .. }
    ));
}
