//! Translation between the data model and the device.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────────┐
//!                 │  CustomizerRegistry  │  SchemaPath -> Customizer
//!                 └──────────────────────┘
//!                    │               │
//!          ┌─────────┘               └─────────┐
//!          ▼                                   ▼
//!  ┌────────────────────┐             ┌────────────────────┐
//!  │ OperationalReader  │             │  WriteDispatcher   │
//!  │ (read: compose     │             │ (submit: diff and  │
//!  │  reader output)    │             │  ordered CRUD)     │
//!  └────────────────────┘             └────────────────────┘
//!          │                                   │
//!          └──────────── customizers ──────────┘
//!                             │
//!                             ▼
//!                          device
//! ```

mod context;
mod error;
mod reader;
mod registry;
mod spi;
mod writer;

pub use context::{ReadCache, ReadContext, WriteContext};
pub use error::{DeviceError, DispatchError, ReadFailed, RegistryError, WriteFailed, WritePhase};
pub use reader::OperationalReader;
pub use registry::{CustomizerRegistry, ReaderKind, RegistryBuilder, WriterKind};
pub use spi::{
    Customizer, ListReaderCustomizer, ListWriterCustomizer, ReaderCustomizer, WriterCustomizer,
};
pub use writer::{AppliedChange, ChangeKind, NodeChange, WriteDispatcher, WriterChanges};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use crate::data::{DataNode, DataPath, ListKey, SchemaPath};
    use crate::datatree::{ModifiableDataTree, ReadableDataTree};
    use crate::storage::GitSignature;
    use crate::vpp::VppError;

    fn path(s: &str) -> DataPath {
        s.parse().unwrap()
    }

    fn schema(s: &str) -> SchemaPath {
        s.parse().unwrap()
    }

    fn setup() -> (TempDir, ModifiableDataTree) {
        let dir = TempDir::new().unwrap();
        let tree = ModifiableDataTree::open_or_init(dir.path(), GitSignature::agent()).unwrap();
        (dir, tree)
    }

    /// A list on the "device", dumped through the read cache.
    struct StaticList {
        entries: Vec<(String, i64)>,
        dumps: AtomicUsize,
    }

    impl StaticList {
        fn new(entries: &[(&str, i64)]) -> Self {
            Self {
                entries: entries.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
                dumps: AtomicUsize::new(0),
            }
        }

        fn dump(&self, ctx: &mut ReadContext) -> Vec<(String, i64)> {
            let result: Result<_, ReadFailed> = ctx.cache().get_or_try_insert_with("static", || {
                self.dumps.fetch_add(1, Ordering::SeqCst);
                Ok(self.entries.clone())
            });
            result.unwrap()
        }
    }

    impl ReaderCustomizer for StaticList {
        fn read_current_attributes(
            &self,
            path: &DataPath,
            builder: &mut DataNode,
            ctx: &mut ReadContext,
        ) -> Result<(), ReadFailed> {
            let key = path.last().and_then(|a| a.key()).unwrap().as_str().to_string();
            if let Some((name, value)) = self.dump(ctx).into_iter().find(|(k, _)| *k == key) {
                builder.set("name", name);
                builder.set("value", value);
            }
            Ok(())
        }
    }

    impl ListReaderCustomizer for StaticList {
        fn get_all_ids(&self, _parent: &DataPath, ctx: &mut ReadContext) -> Result<Vec<ListKey>, ReadFailed> {
            Ok(self
                .dump(ctx)
                .into_iter()
                .map(|(k, _)| ListKey::new(k).unwrap())
                .collect())
        }
    }

    struct Version;

    impl ReaderCustomizer for Version {
        fn read_current_attributes(
            &self,
            _path: &DataPath,
            builder: &mut DataNode,
            _ctx: &mut ReadContext,
        ) -> Result<(), ReadFailed> {
            builder.set("version", "1.0");
            Ok(())
        }
    }

    struct Broken;

    impl ReaderCustomizer for Broken {
        fn read_current_attributes(
            &self,
            path: &DataPath,
            _builder: &mut DataNode,
            _ctx: &mut ReadContext,
        ) -> Result<(), ReadFailed> {
            Err(ReadFailed::new(path, VppError::Disconnected))
        }
    }

    /// Records every call as "<op> <path>"; fails on `fail_on`.
    struct Recorder {
        log: Arc<Mutex<Vec<String>>>,
        fail_on: Option<DataPath>,
    }

    impl Recorder {
        fn check(&self, op: &str, path: &DataPath) -> Result<(), VppError> {
            if self.fail_on.as_ref() == Some(path) {
                return Err(VppError::Invocation {
                    method: op.to_string(),
                    context: 1,
                    retval: -1,
                });
            }
            self.log.lock().push(format!("{} {}", op, path));
            Ok(())
        }
    }

    impl WriterCustomizer for Recorder {
        fn write_current_attributes(
            &self,
            path: &DataPath,
            after: &DataNode,
            _ctx: &mut WriteContext<'_>,
        ) -> Result<(), WriteFailed> {
            self.check("create", path)
                .map_err(|e| WriteFailed::create(path, after, e))
        }

        fn update_current_attributes(
            &self,
            path: &DataPath,
            before: &DataNode,
            after: &DataNode,
            _ctx: &mut WriteContext<'_>,
        ) -> Result<(), WriteFailed> {
            self.check("update", path)
                .map_err(|e| WriteFailed::update(path, before, after, e))
        }

        fn delete_current_attributes(
            &self,
            path: &DataPath,
            before: &DataNode,
            _ctx: &mut WriteContext<'_>,
        ) -> Result<(), WriteFailed> {
            self.check("delete", path)
                .map_err(|e| WriteFailed::delete(path, before, e))
        }
    }

    impl ListWriterCustomizer for Recorder {}

    fn reader_registry() -> Arc<CustomizerRegistry> {
        Arc::new(
            CustomizerRegistry::builder()
                .add(
                    schema("/dev/items/item"),
                    Customizer::ListReader(Arc::new(StaticList::new(&[("a", 1), ("b", 2)]))),
                )
                .unwrap()
                .add(schema("/dev/version"), Customizer::ContainerReader(Arc::new(Version)))
                .unwrap()
                .build(),
        )
    }

    fn writer_registry(
        log: &Arc<Mutex<Vec<String>>>,
        fail_on: Option<DataPath>,
    ) -> Arc<CustomizerRegistry> {
        let parent = Recorder {
            log: log.clone(),
            fail_on: fail_on.clone(),
        };
        let child = Recorder {
            log: log.clone(),
            fail_on,
        };
        Arc::new(
            CustomizerRegistry::builder()
                .add(schema("/top/item"), Customizer::ListWriter(Arc::new(parent)))
                .unwrap()
                .add(schema("/top/item/sub"), Customizer::ListWriter(Arc::new(child)))
                .unwrap()
                .build(),
        )
    }

    #[test]
    fn test_read_composes_structural_containers() {
        let (_dir, tree) = setup();
        let reader = OperationalReader::new(reader_registry(), tree);

        let root = reader.read(&DataPath::root()).unwrap().unwrap();
        let dev = root.child(&"dev".parse().unwrap()).unwrap();
        assert_eq!(dev.children().len(), 2);

        let version = reader.read(&path("/dev/version")).unwrap().unwrap();
        assert_eq!(version.get_str("version"), Some("1.0"));

        let items = reader.read(&path("/dev/items")).unwrap().unwrap();
        let item_a = items.child(&"item=a".parse().unwrap()).unwrap();
        assert_eq!(item_a, &DataNode::new().with("name", "a").with("value", 1));
    }

    #[test]
    fn test_read_list_entry_presence() {
        let (_dir, tree) = setup();
        let reader = OperationalReader::new(reader_registry(), tree);

        assert!(reader.read(&path("/dev/items/item=b")).unwrap().is_some());
        assert!(reader.read(&path("/dev/items/item=zzz")).unwrap().is_none());
        // keyless path to a list type addresses nothing
        assert!(reader.read(&path("/dev/items/item")).unwrap().is_none());
        // nothing registered there
        assert!(reader.read(&path("/other")).unwrap().is_none());
    }

    #[test]
    fn test_read_shares_dump_within_one_read() {
        let (_dir, tree) = setup();
        let list = Arc::new(StaticList::new(&[("a", 1), ("b", 2), ("c", 3)]));
        let registry = Arc::new(
            CustomizerRegistry::builder()
                .add(schema("/items/item"), Customizer::ListReader(list.clone()))
                .unwrap()
                .build(),
        );
        let reader = OperationalReader::new(registry, tree);

        reader.read(&path("/items")).unwrap();
        assert_eq!(list.dumps.load(Ordering::SeqCst), 1);

        reader.read(&path("/items")).unwrap();
        assert_eq!(list.dumps.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_read_failure_propagates() {
        let (_dir, tree) = setup();
        let registry = Arc::new(
            CustomizerRegistry::builder()
                .add(schema("/dev/state"), Customizer::ContainerReader(Arc::new(Broken)))
                .unwrap()
                .build(),
        );
        let reader = OperationalReader::new(registry, tree);

        let err = reader.read(&path("/dev")).unwrap_err();
        assert_eq!(err.path, path("/dev/state"));
    }

    #[test]
    fn test_registry_rejects_bad_registrations() {
        let reader = || Customizer::ContainerReader(Arc::new(Version));
        let writer = || {
            Customizer::ListWriter(Arc::new(Recorder {
                log: Arc::default(),
                fail_on: None,
            }))
        };

        assert!(matches!(
            CustomizerRegistry::builder().add(SchemaPath::root(), reader()),
            Err(RegistryError::Root)
        ));
        assert!(matches!(
            CustomizerRegistry::builder()
                .add(schema("/a"), reader())
                .unwrap()
                .add(schema("/a"), reader()),
            Err(RegistryError::Duplicate { role: "reader", .. })
        ));
        assert!(matches!(
            CustomizerRegistry::builder()
                .add(schema("/a/b"), writer())
                .unwrap()
                .add(schema("/a"), writer()),
            Err(RegistryError::OutOfOrder { .. })
        ));

        // a reader and a writer may share a type
        let registry = CustomizerRegistry::builder()
            .add(schema("/a"), reader())
            .unwrap()
            .add(schema("/a"), writer())
            .unwrap()
            .build();
        assert!(registry.reader(&schema("/a")).is_some());
        assert!(registry.writer(&schema("/a")).is_some());
    }

    #[test]
    fn test_plan_uses_own_data() {
        let log = Arc::default();
        let dispatcher = WriteDispatcher::new(writer_registry(&log, None));

        let before = DataNode::from_json(serde_json::json!({
            "top": { "item=x": { "v": 1, "sub=s": { "w": 1 } } }
        }))
        .unwrap();
        let after = DataNode::from_json(serde_json::json!({
            "top": { "item=x": { "v": 1, "sub=s": { "w": 2 } } }
        }))
        .unwrap();

        let plan = dispatcher.plan(&before, &after);
        assert_eq!(plan.len(), 2);
        assert!(plan[0].changes.is_empty(), "parent unchanged: {:?}", plan[0]);
        assert_eq!(plan[1].changes.len(), 1);
        assert_eq!(plan[1].changes[0].kind(), ChangeKind::Updated);
        assert_eq!(plan[1].changes[0].path(), &path("/top/item=x/sub=s"));
    }

    #[test]
    fn test_apply_orders_parents_and_children() {
        let (_dir, tree) = setup();
        let log: Arc<Mutex<Vec<String>>> = Arc::default();
        let dispatcher = WriteDispatcher::new(writer_registry(&log, None));

        let mut modification = tree.take_snapshot().unwrap().new_modification();
        modification
            .write(
                &path("/top/item=x"),
                &DataNode::from_json(serde_json::json!({ "v": 1, "sub=s": { "w": 1 } })).unwrap(),
            )
            .unwrap();
        let applied = dispatcher.apply(&mut modification, "t1").unwrap();
        assert_eq!(applied.len(), 2);
        tree.commit(modification, "t1").unwrap();

        let mut modification = tree.take_snapshot().unwrap().new_modification();
        modification.delete(&path("/top")).unwrap();
        dispatcher.apply(&mut modification, "t2").unwrap();

        assert_eq!(
            *log.lock(),
            vec![
                "create /top/item=x".to_string(),
                "create /top/item=x/sub=s".to_string(),
                "delete /top/item=x/sub=s".to_string(),
                "delete /top/item=x".to_string(),
            ]
        );
    }

    #[test]
    fn test_apply_stops_at_first_failure() {
        let (_dir, tree) = setup();
        let log: Arc<Mutex<Vec<String>>> = Arc::default();
        let dispatcher = WriteDispatcher::new(writer_registry(&log, Some(path("/top/item=b"))));

        let mut modification = tree.take_snapshot().unwrap().new_modification();
        for key in ["a", "b", "c"] {
            modification
                .write(&path(&format!("/top/item={}", key)), &DataNode::new().with("v", 1))
                .unwrap();
        }

        let err = dispatcher.apply(&mut modification, "t").unwrap_err();
        match err {
            DispatchError::Write { source, applied } => {
                assert_eq!(source.phase(), WritePhase::Create);
                assert_eq!(source.path(), &path("/top/item=b"));
                assert_eq!(source.device_error().retval(), Some(-1));
                assert_eq!(applied.len(), 1);
                assert_eq!(applied[0].path, path("/top/item=a"));
            }
            other => panic!("unexpected error: {}", other),
        }
        // c was never attempted
        assert_eq!(*log.lock(), vec!["create /top/item=a".to_string()]);
    }
}
