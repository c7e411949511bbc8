//! End-to-end behaviour of the agent: isolation, submit, device sync and
//! naming, against the in-memory device.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use cfgsync::agent::{Agent, AgentConfig};
use cfgsync::customizers::{BRIDGE_DOMAIN_CONTEXT, LOCATOR_SET_CONTEXT};
use cfgsync::data::{DataNode, DataPath};
use cfgsync::naming::NamingContext;
use cfgsync::transaction::LogicalDatastoreType::{Configuration, Operational};
use cfgsync::transaction::TransactionError;
use cfgsync::translate::{WriteFailed, WritePhase};
use cfgsync::vpp::{FakeVpp, LISP_ADD_DEL_LOCATOR_SET, RETVAL_UNSPECIFIED};

fn open(dir: &TempDir) -> (Agent, Arc<FakeVpp>) {
    let vpp = Arc::new(FakeVpp::new());
    let agent = Agent::open_with_device(AgentConfig::new(dir.path()), vpp.clone()).unwrap();
    (agent, vpp)
}

fn ls_path(name: &str) -> DataPath {
    DataPath::root()
        .child("lisp")
        .and_then(|p| p.child("locator-sets"))
        .and_then(|p| p.entry("locator-set", name))
        .unwrap()
}

fn bd_path(name: &str) -> DataPath {
    format!("/vpp/bridge-domains/bridge-domain={}", name).parse().unwrap()
}

fn put(agent: &Agent, path: &DataPath, node: &DataNode) {
    let mut tx = agent.broker().new_write_only_transaction().unwrap();
    tx.put(Configuration, path, node).unwrap();
    tx.submit().unwrap();
}

fn delete(agent: &Agent, path: &DataPath) {
    let mut tx = agent.broker().new_write_only_transaction().unwrap();
    tx.delete(Configuration, path).unwrap();
    tx.submit().unwrap();
}

#[test]
fn test_readers_keep_their_snapshot() {
    let dir = TempDir::new().unwrap();
    let (agent, _vpp) = open(&dir);
    let path = ls_path("ls1");

    let reader = agent.broker().new_read_only_transaction().unwrap();
    put(&agent, &path, &DataNode::new().with("name", "ls1"));

    assert_eq!(reader.read(Configuration, &path).unwrap(), None);
    let fresh = agent.broker().new_read_only_transaction().unwrap();
    assert!(fresh.read(Configuration, &path).unwrap().is_some());
}

#[test]
fn test_disjoint_commit_leaves_other_paths_alone() {
    let dir = TempDir::new().unwrap();
    let (agent, _vpp) = open(&dir);
    let kept: DataPath = "/settings/ntp".parse().unwrap();
    put(&agent, &kept, &DataNode::new().with("server", "10.0.0.1"));

    let before = agent.tree().take_snapshot().unwrap();
    put(&agent, &"/settings/dns".parse().unwrap(), &DataNode::new().with("server", "10.0.0.53"));
    let after = agent.tree().take_snapshot().unwrap();

    assert_ne!(before.commit_id(), after.commit_id());
    assert_eq!(before.read(&kept).unwrap(), after.read(&kept).unwrap());
    assert!(before.read(&"/settings/dns".parse().unwrap()).unwrap().is_none());
}

#[test]
fn test_written_data_reads_back_before_and_after_submit() {
    let dir = TempDir::new().unwrap();
    let (agent, _vpp) = open(&dir);
    let path = bd_path("bd1");
    let node = DataNode::new()
        .with("name", "bd1")
        .with("flood", true)
        .with("learn", true);

    let mut tx = agent.broker().new_write_only_transaction().unwrap();
    tx.put(Configuration, &path, &node).unwrap();
    assert_eq!(tx.read(Configuration, &path).unwrap(), Some(node.clone()));
    tx.submit().unwrap();

    assert_eq!(agent.read(Configuration, &path).unwrap(), Some(node));
}

#[test]
fn test_created_bridge_domain_reads_back_from_device() {
    let dir = TempDir::new().unwrap();
    let (agent, vpp) = open(&dir);
    let node = DataNode::new()
        .with("name", "bd1")
        .with("flood", true)
        .with("forward", true)
        .with("arp-termination", true);

    put(&agent, &bd_path("bd1"), &node);

    let devices = vpp.bridge_domains();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].bd_id, 1);
    assert_eq!(devices[0].arp_term, 1);
    assert_eq!(devices[0].learn, 0);

    let oper = agent.read(Operational, &bd_path("bd1")).unwrap().unwrap();
    assert_eq!(oper.get_str("name"), Some("bd1"));
    assert!(oper.get_bool("flood"));
    assert!(oper.get_bool("forward"));
    assert!(oper.get_bool("arp-termination"));
    assert!(!oper.get_bool("learn"));
}

#[test]
fn test_naming_indices_are_distinct_and_stable() {
    let dir = TempDir::new().unwrap();
    let (agent, _vpp) = open(&dir);
    let context = NamingContext::new("test-context").unwrap();

    let mut modification = agent.tree().take_snapshot().unwrap().new_modification();
    let mut indices = Vec::new();
    for i in 0..5 {
        let name = format!("item{}", i);
        let index = context.allocate_index(&modification).unwrap();
        context.add_name(&mut modification, index, &name).unwrap();
        indices.push(index);
    }
    assert_eq!(indices, vec![1, 2, 3, 4, 5]);
    for (i, index) in indices.iter().enumerate() {
        let name = format!("item{}", i);
        assert_eq!(context.get_index(&modification, &name).unwrap(), Some(*index));
        assert_eq!(context.get_index(&modification, &name).unwrap(), Some(*index));
        assert_eq!(context.get_name(&modification, *index).unwrap(), Some(name));
    }
    assert!(!context.contains_name(&modification, "item9").unwrap());
}

#[test]
fn test_freed_index_is_reused_only_after_commit() {
    let dir = TempDir::new().unwrap();
    let (agent, _vpp) = open(&dir);
    let node = |name: &str| DataNode::new().with("name", name);

    put(&agent, &ls_path("a"), &node("a"));
    put(&agent, &ls_path("b"), &node("b"));

    // delete and create in one transaction: index 1 is still committed to "a"
    let mut tx = agent.broker().new_write_only_transaction().unwrap();
    tx.delete(Configuration, &ls_path("a")).unwrap();
    tx.put(Configuration, &ls_path("c"), &node("c")).unwrap();
    tx.submit().unwrap();

    let mappings = agent.mappings(LOCATOR_SET_CONTEXT).unwrap();
    assert_eq!(mappings.get("a"), None);
    assert_eq!(mappings.get("c"), Some(&3));

    put(&agent, &ls_path("d"), &node("d"));
    assert_eq!(agent.mappings(LOCATOR_SET_CONTEXT).unwrap().get("d"), Some(&1));
}

#[test]
fn test_second_submit_from_same_base_conflicts() {
    let dir = TempDir::new().unwrap();
    let (agent, vpp) = open(&dir);

    let mut first = agent.broker().new_write_only_transaction().unwrap();
    let mut second = agent.broker().new_write_only_transaction().unwrap();
    first
        .put(Configuration, &ls_path("first"), &DataNode::new().with("name", "first"))
        .unwrap();
    second
        .put(Configuration, &ls_path("second"), &DataNode::new().with("name", "second"))
        .unwrap();

    let committed = first.submit().unwrap();
    let err = second.submit().unwrap_err();
    assert!(matches!(err, TransactionError::Conflict { .. }));

    assert_eq!(agent.tree().head().unwrap(), committed.final_commit());
    assert!(agent.read(Configuration, &ls_path("first")).unwrap().is_some());
    assert!(agent.read(Configuration, &ls_path("second")).unwrap().is_none());
    assert_eq!(vpp.locator_sets().len(), 1);
}

#[test]
fn test_locator_set_end_to_end() {
    let dir = TempDir::new().unwrap();
    let (agent, vpp) = open(&dir);

    put(&agent, &ls_path("loc-set"), &DataNode::new().with("name", "loc-set"));

    assert_eq!(vpp.calls(), vec![LISP_ADD_DEL_LOCATOR_SET.to_string()]);
    let devices = vpp.locator_sets();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].ls_index, 1);
    assert_eq!(devices[0].ls_name, "loc-set");

    let mappings = agent.mappings(LOCATOR_SET_CONTEXT).unwrap();
    assert_eq!(mappings.into_iter().collect::<Vec<_>>(), vec![("loc-set".to_string(), 1)]);

    let list: DataPath = "/lisp/locator-sets".parse().unwrap();
    let oper = agent.read(Operational, &list).unwrap().unwrap();
    let keys: Vec<String> = oper
        .children()
        .keys()
        .filter_map(|arg| arg.key().map(|k| k.as_str().to_string()))
        .collect();
    assert_eq!(keys, vec!["loc-set".to_string()]);

    let entry = agent.read(Operational, &ls_path("loc-set")).unwrap().unwrap();
    assert_eq!(entry.get_str("name"), Some("loc-set"));
}

#[test]
fn test_device_failure_leaves_configuration_untouched() {
    let dir = TempDir::new().unwrap();
    let (agent, vpp) = open(&dir);
    let before = agent.tree().head().unwrap();
    vpp.fail_next(LISP_ADD_DEL_LOCATOR_SET, RETVAL_UNSPECIFIED);

    let mut tx = agent.broker().new_write_only_transaction().unwrap();
    tx.put(Configuration, &ls_path("ls1"), &DataNode::new().with("name", "ls1"))
        .unwrap();
    let err = tx.submit().unwrap_err();

    assert_eq!(err.phase(), Some(WritePhase::Create));
    assert!(!err.is_retryable());
    match &err {
        TransactionError::Write { source, applied } => {
            assert!(applied.is_empty());
            assert_eq!(source.device_error().retval(), Some(RETVAL_UNSPECIFIED));
            match source {
                WriteFailed::Create { path, data, .. } => {
                    assert_eq!(path, &ls_path("ls1"));
                    assert_eq!(data.get_str("name"), Some("ls1"));
                }
                other => panic!("unexpected failure: {}", other),
            }
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(agent.tree().head().unwrap(), before);
    assert_eq!(agent.read(Configuration, &ls_path("ls1")).unwrap(), None);
    assert!(agent.mappings(LOCATOR_SET_CONTEXT).unwrap().is_empty());
    assert!(vpp.locator_sets().is_empty());
}

#[test]
fn test_mappings_are_not_user_writable() {
    let dir = TempDir::new().unwrap();
    let (agent, vpp) = open(&dir);
    put(&agent, &ls_path("a"), &DataNode::new().with("name", "a"));

    let mut tx = agent.broker().new_write_only_transaction().unwrap();
    let err = tx.delete(Configuration, &"/contexts".parse().unwrap()).unwrap_err();
    assert!(matches!(err, TransactionError::ReservedRegion { .. }));
    tx.submit().unwrap();

    assert_eq!(agent.mappings(LOCATOR_SET_CONTEXT).unwrap().get("a"), Some(&1));
    delete(&agent, &ls_path("a"));
    assert!(vpp.locator_sets().is_empty());
    assert!(agent.mappings(LOCATOR_SET_CONTEXT).unwrap().is_empty());
}

#[test]
fn test_delete_removes_device_object_and_mapping() {
    let dir = TempDir::new().unwrap();
    let (agent, vpp) = open(&dir);
    put(&agent, &bd_path("bd1"), &DataNode::new().with("name", "bd1"));
    assert_eq!(vpp.bridge_domains().len(), 1);

    delete(&agent, &bd_path("bd1"));

    assert!(vpp.bridge_domains().is_empty());
    assert!(agent.mappings(BRIDGE_DOMAIN_CONTEXT).unwrap().is_empty());
    assert_eq!(agent.read(Operational, &bd_path("bd1")).unwrap(), None);
}

#[test]
fn test_configuration_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let node = DataNode::new().with("name", "bd1").with("learn", true);
    {
        let (agent, _vpp) = open(&dir);
        put(&agent, &bd_path("bd1"), &node);
    }

    let (agent, _vpp) = open(&dir);
    assert_eq!(agent.read(Configuration, &bd_path("bd1")).unwrap(), Some(node));
    assert_eq!(agent.mappings(BRIDGE_DOMAIN_CONTEXT).unwrap().get("bd1"), Some(&1));
    assert_eq!(agent.history(None).unwrap().len(), 2);
}
