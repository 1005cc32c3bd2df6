//! Session tests: account views, queries and contract subscriptions.

use serde_json::{json, Value};
use std::sync::Arc;

use ledger_tx_engine::ledger::types::Network;
use ledger_tx_engine::routing::NetworkRouter;
use ledger_tx_engine::{DeployInfo, Session};

mod common;
use common::{addr, ScriptedFactory, ScriptedSender, ALICE, BOB, CAROL};

fn session(factory: Arc<ScriptedFactory>) -> Session {
    let mut config = common::config();
    config.nodes.push(common::node("public", Network::TestNet));
    let router = Arc::new(NetworkRouter::with_factory(
        config.nodes.clone(),
        config.bridge.backend_network,
        factory,
    ));
    Session::with_router(config, router, common::keystore(), ScriptedSender::new())
}

fn contract(address: &str, network: Network) -> DeployInfo {
    DeployInfo {
        contract_name: "Counter".into(),
        address: addr(address),
        abi: Value::Null,
        network,
    }
}

#[tokio::test]
async fn test_bridge_addresses_merge_while_connected() {
    let session = session(ScriptedFactory::new());

    assert_eq!(session.account_addresses(Network::Debug), vec![addr(ALICE)]);
    assert_eq!(
        session.account_addresses(Network::Bridge),
        vec![addr(CAROL), addr(ALICE)]
    );

    session.connect_bridge().unwrap();
    assert_eq!(
        session.account_addresses(Network::Debug),
        vec![addr(ALICE), addr(CAROL)]
    );
    assert!(session.account_addresses(Network::TestNet).is_empty());
}

#[tokio::test]
async fn test_account_summaries() {
    let factory = ScriptedFactory::new();
    let local = factory.ledger("local");
    local.returns(
        "contract_getQuotaByAccount",
        json!({ "currentQuota": "21000", "maxQuota": "42000", "stakeAmount": "0" }),
    );
    local.on("ledger_getAccountInfoByAddress", |params, _| {
        if params[0] == ALICE {
            Ok(json!({
                "blockCount": "4",
                "balanceInfoMap": {
                    "tti_5649544520544f4b454e6e40": { "balance": "2500000000000000000" }
                }
            }))
        } else {
            Ok(Value::Null)
        }
    });
    let session = session(factory);
    session.connect_bridge().unwrap();

    let summaries = session.account_summaries(Network::Debug).await.unwrap();

    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].address, addr(ALICE));
    assert_eq!(summaries[0].balance, "2");
    assert_eq!(summaries[0].quota, "21000");
    assert_eq!(summaries[1].address, addr(CAROL));
    assert_eq!(summaries[1].balance, "0");
}

#[tokio::test(start_paused = true)]
async fn test_query_polls_until_data() {
    let factory = ScriptedFactory::new();
    factory.ledger("local").on("contract_query", |params, seen| {
        assert_eq!(params[0]["data"], "AQI=");
        if seen < 2 {
            Ok(Value::Null)
        } else {
            Ok(json!("3q0="))
        }
    });
    let session = session(factory.clone());

    let result = session
        .query(Network::Bridge, &addr(BOB), &[1, 2])
        .await
        .unwrap();

    assert_eq!(result, vec![0xde, 0xad]);
    assert_eq!(factory.ledger("local").count("contract_query"), 3);
}

#[tokio::test]
async fn test_network_switch_clears_contracts() {
    let factory = ScriptedFactory::new();
    let session = session(factory.clone());

    assert!(session
        .load_contract(contract(BOB, Network::Debug))
        .await
        .unwrap()
        .is_some());
    // already loaded
    assert!(session
        .load_contract(contract(BOB, Network::Debug))
        .await
        .unwrap()
        .is_none());
    assert_eq!(session.contracts().await.len(), 1);
    assert_eq!(factory.ledger("local").unsubscribes(), 0);

    let subscription = session
        .load_contract(contract(CAROL, Network::TestNet))
        .await
        .unwrap();
    assert!(subscription.is_some());
    assert_eq!(session.current_network().await, Some(Network::TestNet));
    assert_eq!(factory.ledger("local").unsubscribes(), 1);

    let contracts = session.contracts().await;
    assert_eq!(contracts.len(), 1);
    assert_eq!(contracts[0].address, addr(CAROL));
}

#[tokio::test]
async fn test_shutdown_closes_handles() {
    let factory = ScriptedFactory::new();
    let session = session(factory.clone());
    session
        .load_contract(contract(BOB, Network::Debug))
        .await
        .unwrap();
    assert_eq!(session.router().handle_count(), 1);

    session.shutdown().await;

    assert_eq!(session.router().handle_count(), 0);
    assert_eq!(factory.ledger("local").unsubscribes(), 1);
    assert!(session.contracts().await.is_empty());
    assert!(session.current_network().await.is_none());
    assert!(session.cancellation().is_cancelled());
}

#[tokio::test]
async fn test_stake_list_pages_through_entries() {
    let factory = ScriptedFactory::new();
    factory.ledger("local").on("contract_getStakeList", |params, _| {
        assert_eq!(params[0], ALICE);
        let (index, count) = (params[1].as_u64().unwrap(), params[2].as_u64().unwrap());
        let entries: Vec<Value> = (index * count..(index * count + count).min(5))
            .map(|i| json!({ "stakeAmount": i.to_string(), "expirationHeight": "100" }))
            .collect();
        Ok(json!({
            "totalStakeAmount": "10",
            "totalStakeCount": 5,
            "stakeList": entries
        }))
    });
    let session = session(factory.clone());

    let first = session
        .stake_list(Network::Bridge, &addr(ALICE), 0, 2)
        .await
        .unwrap();
    let last = session
        .stake_list(Network::Bridge, &addr(ALICE), 2, 2)
        .await
        .unwrap();

    assert_eq!(first.total_stake_count, 5);
    assert_eq!(first.stake_list.len(), 2);
    assert_eq!(last.stake_list.len(), 1);
    assert_eq!(last.stake_list[0].stake_amount, "4");
    assert_eq!(factory.ledger("local").count("contract_getStakeList"), 2);
}
