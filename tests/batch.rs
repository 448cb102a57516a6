use mocknet_runtime::{Backend, BatchResult, Instantiate, MocknetConfig, MocknetError};
use serde_json::json;

use crate::common::{TestData, SENDER};

mod common;

/// Later messages of a batch observe the state written by earlier ones, including a contract created in the same
/// batch.
#[test]
fn test_batch_ordering() {
    let backend = TestData::backend();
    let code = backend.upload(&TestData::get_test_contract_code("counter"));

    let mut batch = backend.batch();
    batch
        .init(SENDER, Instantiate::new(code.code_id.clone(), "counter", json!({})))
        .exec_instantiated(SENDER, 0, json!({"increment": {}}), vec![])
        .push_json(json!({"migrate": {}}))
        .exec_instantiated(SENDER, 0, json!({"increment": {}}), vec![]);
    let results = batch.submit().unwrap();

    let contract = match &results[0] {
        Some(BatchResult::Instantiated(contract)) => contract.clone(),
        other => panic!("unexpected result {other:?}"),
    };
    assert_eq!(contract.label, "counter");
    assert_eq!(
        results[1..],
        [
            Some(BatchResult::Executed(json!({"messages": []}))),
            None,
            Some(BatchResult::Executed(json!({"messages": []}))),
        ]
    );
    assert_eq!(backend.query(&contract, &json!({})).unwrap(), json!(2));

    // the count written by init is what the first exec incremented
    let mut batch = backend.batch();
    batch
        .init(SENDER, Instantiate::new(code.code_id, "second", json!({})))
        .exec_instantiated(SENDER, 0, json!({"increment": {}}), vec![]);
    let Some(Some(BatchResult::Instantiated(second))) = batch.submit().unwrap().into_iter().next() else {
        panic!("expected an instantiation");
    };
    assert_eq!(
        backend.storage_snapshot(&second.address).unwrap().get(b"count".as_slice()),
        Some(&vec![1u8])
    );
}

#[test]
fn test_batch_json_targets_earlier_init() {
    let backend = TestData::backend();
    let code = backend.upload(&TestData::get_test_contract_code("counter"));

    let mut batch = backend.batch();
    batch
        .push_json(json!({"init": {"sender": SENDER, "code_id": code.code_id, "label": "counter", "msg": {}}}))
        .push_json(json!({"exec": {"sender": SENDER, "contract": {"instantiated": 0}, "msg": {"increment": {}}}}));
    let results = batch.submit().unwrap();
    let Some(BatchResult::Instantiated(contract)) = &results[0] else {
        panic!("expected an instantiation");
    };
    assert_eq!(backend.query(contract, &json!({})).unwrap(), json!(1));
}

/// Init and exec messages are run or rejected, never skipped.
#[test]
fn test_batch_tagged_messages_are_not_skipped() {
    let backend = TestData::backend();
    let code = backend.upload(&TestData::get_test_contract_code("counter"));

    let mut batch = backend.batch();
    batch.push_json(json!({"init": {"sender": SENDER, "code_id": code.code_id, "msg": {}}}));
    let results = batch.submit().unwrap();
    assert!(matches!(&results[..], [Some(BatchResult::Instantiated(contract))] if contract.label.is_empty()));
    assert_eq!(backend.contracts().len(), 1);

    let mut batch = backend.batch();
    batch.push_json(json!({"init": {"code_id": code.code_id, "label": "no sender", "msg": {}}}));
    match batch.submit() {
        Err(MocknetError::BatchAborted { index, source }) => {
            assert_eq!(index, 0);
            assert!(matches!(*source, MocknetError::MalformedPayload { .. }));
        }
        other => panic!("unexpected result {other:?}"),
    }
    assert_eq!(backend.contracts().len(), 1);
}

#[test]
fn test_batch_from_json() {
    let backend = TestData::backend();
    let code = backend.upload(&TestData::get_test_contract_code("counter"));

    let mut batch = backend.batch();
    batch.push_json(json!({"init": {
        "sender": SENDER, "codeId": code.code_id, "codeHash": code.code_hash, "label": "counter", "msg": {}
    }}));
    let results = batch.submit().unwrap();
    let Some(Some(BatchResult::Instantiated(contract))) = results.into_iter().next() else {
        panic!("expected an instantiation");
    };

    let mut batch = backend.batch();
    batch.push_json(json!({"exec": {
        "sender": SENDER, "contract": contract.address, "msg": {"increment": {}}, "funds": []
    }}));
    assert_eq!(batch.len(), 1);
    batch.submit().unwrap();
    assert_eq!(backend.query(&contract, &json!({})).unwrap(), json!(1));
}

#[test]
fn test_batch_aborts_on_error() {
    let backend = TestData::backend();
    let code = backend.upload(&TestData::get_test_contract_code("counter"));
    let contract = backend
        .instantiate(SENDER, Instantiate::new(code.code_id, "counter", json!({})))
        .unwrap();

    let mut batch = backend.batch();
    batch
        .exec(SENDER, &contract, json!({"increment": {}}), vec![])
        .exec(SENDER, &contract, json!([1]), vec![])
        .exec(SENDER, &contract, json!({"increment": {}}), vec![]);
    match batch.submit() {
        Err(MocknetError::BatchAborted { index, source }) => {
            assert_eq!(index, 1);
            assert!(matches!(*source, MocknetError::ContractError { .. }));
        }
        other => panic!("unexpected result {other:?}"),
    }
    // the first message is not rolled back, the third never ran
    assert_eq!(backend.query(&contract, &json!({})).unwrap(), json!(1));
}

#[test]
fn test_strict_batch_rejects_unknown_messages() {
    TestData::init_tracing();
    let backend = Backend::new(MocknetConfig::strict());
    let code = backend.upload(&TestData::get_test_contract_code("counter"));
    let contract = backend
        .instantiate(SENDER, Instantiate::new(code.code_id, "counter", json!({})))
        .unwrap();

    let mut batch = backend.batch();
    batch
        .exec(SENDER, &contract, json!({"increment": {}}), vec![])
        .push_json(json!({"migrate": {}}));
    assert_eq!(batch.submit(), Err(MocknetError::UnknownBatchMessage { index: 1 }));
    assert_eq!(backend.query(&contract, &json!({})).unwrap(), json!(1));
}

#[test]
fn test_batch_cannot_be_saved() {
    let backend = TestData::backend();
    let mut batch = backend.batch();
    batch.push_json(json!({"exec": {"sender": SENDER, "contract": "mocknet1x", "msg": {}}}));
    assert_eq!(batch.save("deployment"), Err(MocknetError::BatchSaveUnsupported));
}
