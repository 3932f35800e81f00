//! Provisioning and staking scenarios: wallet generation, per-unit
//! failures that do not abort the batch, the inter-transaction delay, and
//! batch re-entry on an existing session.

mod common;

use common::{key_json_with_mnemonic, test_config, test_context, tx_ok, Reply, ScriptedRunner};
use tokio_test::assert_ok;

use shannon_core::command::Network;
use shannon_core::error::CoreError;
use shannon_core::orchestration::{
    ProvisionRequest, ServiceEndpoint, StakeProvisioningService, SupplierService,
};
use shannon_core::session::{ArtifactKind, SessionKind, SessionParams, SessionStore};
use shannon_core::state_machine::UnitStatus;

const OWNER_ADDR: &str = "pokt1qqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqq";

fn request(node_count: u32) -> ProvisionRequest {
    ProvisionRequest {
        owner_identity: "owner-op".to_string(),
        owner_address: OWNER_ADDR.to_string(),
        node_count,
        network: Network::Beta,
        stake_amount: "60005000000upokt".to_string(),
        services: vec![SupplierService {
            service_id: "relay".to_string(),
            endpoints: vec![ServiceEndpoint {
                publicly_exposed_url: "https://relay.example.com".to_string(),
                rpc_type: "JSON_RPC".to_string(),
            }],
        }],
    }
}

fn owner_rules(runner: &ScriptedRunner) {
    runner.on(
        "keys list",
        vec![Reply::Stdout(
            r#"[{"name":"owner-op","address":"pokt1owneroperator"}]"#.to_string(),
        )],
    );
}

fn wallet_rules(runner: &ScriptedRunner, nodes: u32) {
    for index in 0..nodes {
        let name = format!("node{}", index + 1);
        let mnemonic = format!("phrase for {name}");
        runner.on(
            format!("keys add {name}"),
            vec![Reply::Stdout(key_json_with_mnemonic(
                &name,
                &format!("pokt1{name}"),
                &mnemonic,
            ))],
        );
    }
}

#[tokio::test(start_paused = true)]
async fn failed_unit_does_not_abort_batch_and_delay_separates_units() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new();
    owner_rules(&runner);
    wallet_rules(&runner, 3);
    // node2's stake fails with a chain business error; the specific rule
    // must precede the generic stake-supplier rule.
    runner
        .on(
            "stake_node2.yaml",
            vec![Reply::NonZero {
                exit_code: 1,
                stderr: "spendable balance too low: insufficient funds".to_string(),
            }],
        )
        .on("stake-supplier", vec![Reply::Stdout(tx_ok("STAKEHASH"))]);

    let mut config = test_config(dir.path());
    config.delays.inter_tx_seconds = 30;
    let service = StakeProvisioningService::new(test_context(config, runner.clone()));

    let started = tokio::time::Instant::now();
    let outcome = service.provision(request(3)).await.expect("batch completes");

    // K units, one failed with its error preserved, siblings succeeded.
    assert_eq!(outcome.report.units.len(), 3);
    assert_eq!(outcome.report.succeeded, 2);
    assert_eq!(outcome.report.failed, 1);
    let failed = &outcome.report.units[1];
    assert_eq!(failed.name, "node2");
    assert_eq!(failed.status, UnitStatus::Failed);
    assert_eq!(failed.attempts, 1);
    assert!(failed.error.as_deref().unwrap().contains("insufficient funds"));
    for index in [0usize, 2] {
        assert_eq!(outcome.report.units[index].status, UnitStatus::Succeeded);
        assert_eq!(
            outcome.report.units[index].tx_hash.as_deref(),
            Some("STAKEHASH")
        );
    }

    // (K-1) inter-transaction delays.
    assert!(started.elapsed() >= std::time::Duration::from_secs(60));

    // Every stake signs with the session owner.
    assert!(outcome
        .report
        .units
        .iter()
        .all(|u| u.signer == "owner-op"));
}

#[tokio::test]
async fn provisioning_writes_wallets_stake_files_and_mnemonics() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let runner = ScriptedRunner::new();
    owner_rules(&runner);
    wallet_rules(&runner, 2);
    runner.on("stake-supplier", vec![Reply::Stdout(tx_ok("STAKEHASH"))]);

    let service = StakeProvisioningService::new(test_context(test_config(dir.path()), runner.clone()));
    let outcome = service.provision(request(2)).await?;

    assert_eq!(outcome.wallets.len(), 2);
    assert_eq!(outcome.wallets[0].address, "pokt1node1");

    // Each wallet is generated in its own per-unit keyring home.
    let add_node1 = runner
        .invocations_matching("keys add node1")
        .pop()
        .expect("wallet generation recorded");
    let home_value = add_node1
        .args
        .iter()
        .position(|a| a == "--home")
        .and_then(|i| add_node1.args.get(i + 1))
        .expect("--home present");
    assert!(home_value.ends_with("wallets/node1"));

    // Mnemonics live only in the sanctioned file, never in argv.
    assert!(outcome.mnemonics_path.exists());
    let mnemonics = std::fs::read_to_string(&outcome.mnemonics_path).unwrap();
    assert!(mnemonics.contains("phrase for node1"));
    assert!(mnemonics.contains("phrase for node2"));
    assert!(!runner.all_recorded_args().contains("phrase for"));

    // Stake descriptors embed the generated operator addresses.
    let store = SessionStore::new(dir.path());
    let session = store.get_session(&outcome.session_id).unwrap();
    let stake1 = store
        .read_artifact(&session, 0, ArtifactKind::StakeConfig)
        .unwrap();
    let yaml = String::from_utf8(stake1)?;
    assert!(yaml.contains("operator_address: pokt1node1"));
    assert!(yaml.contains(&format!("owner_address: {OWNER_ADDR}")));
    Ok(())
}

#[tokio::test]
async fn stake_session_reenters_prepared_session() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new();
    runner.on("stake-supplier", vec![Reply::Stdout(tx_ok("AGAIN"))]);

    let config = test_config(dir.path());
    let store = SessionStore::new(dir.path());
    let session = store
        .create_session(
            SessionKind::StakeProvisioning,
            SessionParams {
                network: Network::Beta,
                owner_address: Some(OWNER_ADDR.to_string()),
                unit_count: 2,
            },
        )
        .unwrap();
    for index in 0..2 {
        store
            .record_artifact(&session, index, ArtifactKind::StakeConfig, b"owner_address: x")
            .unwrap();
    }

    let service = StakeProvisioningService::new(test_context(config, runner.clone()));
    let report =
        assert_ok!(service.stake_session(&session.id, "owner-op", Network::Beta).await);

    assert_eq!(report.units.len(), 2);
    assert_eq!(report.succeeded, 2);
    assert_eq!(runner.invocations_matching("stake-supplier").len(), 2);
}

#[tokio::test]
async fn empty_session_is_a_precondition_failure() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new();
    let config = test_config(dir.path());
    let store = SessionStore::new(dir.path());
    let session = store
        .create_session(
            SessionKind::StakeProvisioning,
            SessionParams {
                network: Network::Beta,
                owner_address: None,
                unit_count: 0,
            },
        )
        .unwrap();

    let service = StakeProvisioningService::new(test_context(config, runner.clone()));
    let err = service
        .stake_session(&session.id, "owner-op", Network::Beta)
        .await
        .expect_err("no stake files present");
    match err {
        CoreError::EmptySession { reason, .. } => assert!(reason.contains("no stake files")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(runner.invocations_matching("stake-supplier").is_empty());
}

#[tokio::test]
async fn missing_owner_identity_aborts_before_wallet_generation() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new();
    runner.on("keys list", vec![Reply::Stdout("[]".to_string())]);

    let service = StakeProvisioningService::new(test_context(test_config(dir.path()), runner.clone()));
    let err = service.provision(request(2)).await.expect_err("must abort");
    assert!(matches!(err, CoreError::AccountNotFound { .. }));
    assert!(runner.invocations_matching("keys add").is_empty());
}

#[tokio::test]
async fn cancellation_is_honored_at_unit_boundaries() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new();
    runner.on("stake-supplier", vec![Reply::Stdout(tx_ok("NEVER"))]);

    let config = test_config(dir.path());
    let store = SessionStore::new(dir.path());
    let session = store
        .create_session(
            SessionKind::StakeProvisioning,
            SessionParams {
                network: Network::Beta,
                owner_address: None,
                unit_count: 2,
            },
        )
        .unwrap();
    for index in 0..2 {
        store
            .record_artifact(&session, index, ArtifactKind::StakeConfig, b"owner_address: x")
            .unwrap();
    }

    let service = StakeProvisioningService::new(test_context(config, runner.clone()));
    service.orchestrator().cancel_flag().cancel();

    let report = service
        .stake_session(&session.id, "owner-op", Network::Beta)
        .await
        .expect("cancellation yields a report, not an error");
    assert!(report.cancelled);
    assert!(report
        .units
        .iter()
        .all(|u| u.status == UnitStatus::Pending));
    assert!(runner.invocations_matching("stake-supplier").is_empty());
}
