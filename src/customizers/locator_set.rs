//! LISP locator sets: `/lisp/locator-sets/locator-set=<name>`.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::data::{DataNode, DataPath, ListKey};
use crate::naming::NamingContext;
use crate::translate::{
    DeviceError, ListReaderCustomizer, ListWriterCustomizer, ReadContext, ReadFailed,
    ReaderCustomizer, WriteContext, WriteFailed, WriterCustomizer,
};
use crate::vpp::{
    check_reply, LispAddDelLocatorSet, LispLocatorSetDetails, LispLocatorSetDump, VppApi,
    LISP_ADD_DEL_LOCATOR_SET,
};

pub const LOCATOR_SET_PATH: &str = "/lisp/locator-sets/locator-set";
pub const LOCATOR_SET_CONTEXT: &str = "locator-set-context";

const ENTRY: &str = "locator-set";
const DUMP_CACHE_KEY: &str = "locator-set-dump";
const NAME: &str = "name";

fn entry_name(path: &DataPath) -> Result<String, DeviceError> {
    path.first_key_of(ENTRY)
        .map(|key| key.as_str().to_string())
        .ok_or_else(|| DeviceError::InvalidData(format!("{} is not a locator set entry", path)))
}

/// Pushes locator sets to the device.
pub struct LocatorSetWriter {
    vpp: Arc<dyn VppApi>,
    context: NamingContext,
}

impl LocatorSetWriter {
    pub fn new(vpp: Arc<dyn VppApi>, context: NamingContext) -> Self {
        Self { vpp, context }
    }

    fn add_del(&self, is_add: u8, ls_index: u32, name: &str) -> Result<(), DeviceError> {
        let request = LispAddDelLocatorSet {
            is_add,
            ls_index,
            locator_set_name: name.to_string(),
        };
        self.vpp
            .lisp_add_del_locator_set(request)
            .and_then(|reply| check_reply(LISP_ADD_DEL_LOCATOR_SET, reply))?;
        Ok(())
    }

    fn create(&self, path: &DataPath, ctx: &mut WriteContext<'_>) -> Result<(), DeviceError> {
        let name = entry_name(path)?;
        let index = self.context.allocate_index(ctx.after())?;
        self.add_del(1, index, &name)?;
        self.context.add_name(ctx.after_mut(), index, &name)?;
        debug!("locator set {} (index={}) created", name, index);
        Ok(())
    }

    fn delete(&self, path: &DataPath, ctx: &mut WriteContext<'_>) -> Result<(), DeviceError> {
        let name = entry_name(path)?;
        let index = self
            .context
            .get_index(ctx.after(), &name)?
            .ok_or_else(|| DeviceError::MissingMapping {
                context: self.context.name().to_string(),
                name: name.clone(),
            })?;
        self.add_del(0, index, &name)?;
        self.context.remove_name(ctx.after_mut(), &name)?;
        debug!("locator set {} (index={}) deleted", name, index);
        Ok(())
    }
}

impl WriterCustomizer for LocatorSetWriter {
    fn write_current_attributes(
        &self,
        path: &DataPath,
        after: &DataNode,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), WriteFailed> {
        self.create(path, ctx).map_err(|e| {
            warn!("failed to create locator set {}: {}", path, e);
            WriteFailed::create(path, after, e)
        })
    }

    fn update_current_attributes(
        &self,
        path: &DataPath,
        _before: &DataNode,
        _after: &DataNode,
        _ctx: &mut WriteContext<'_>,
    ) -> Result<(), WriteFailed> {
        // only the name reaches the device, and the name is the key
        debug!("locator set {} has nothing to update on the device", path);
        Ok(())
    }

    fn delete_current_attributes(
        &self,
        path: &DataPath,
        before: &DataNode,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), WriteFailed> {
        self.delete(path, ctx).map_err(|e| {
            warn!("failed to delete locator set {}: {}", path, e);
            WriteFailed::delete(path, before, e)
        })
    }
}

impl ListWriterCustomizer for LocatorSetWriter {}

/// Lists locator sets present on the device.
pub struct LocatorSetReader {
    vpp: Arc<dyn VppApi>,
}

impl LocatorSetReader {
    pub fn new(vpp: Arc<dyn VppApi>) -> Self {
        Self { vpp }
    }

    fn dump(&self, path: &DataPath, ctx: &mut ReadContext) -> Result<Vec<LispLocatorSetDetails>, ReadFailed> {
        ctx.cache().get_or_try_insert_with(DUMP_CACHE_KEY, || {
            self.vpp
                .lisp_locator_set_dump(LispLocatorSetDump)
                .map_err(|e| ReadFailed::new(path, e))
        })
    }
}

impl ReaderCustomizer for LocatorSetReader {
    fn read_current_attributes(
        &self,
        path: &DataPath,
        builder: &mut DataNode,
        ctx: &mut ReadContext,
    ) -> Result<(), ReadFailed> {
        let Some(key) = path.first_key_of(ENTRY) else {
            return Ok(());
        };
        if self.dump(path, ctx)?.iter().any(|ls| ls.ls_name == key.as_str()) {
            builder.set(NAME, key.as_str());
        }
        Ok(())
    }
}

impl ListReaderCustomizer for LocatorSetReader {
    fn get_all_ids(&self, parent: &DataPath, ctx: &mut ReadContext) -> Result<Vec<ListKey>, ReadFailed> {
        self.dump(parent, ctx)?
            .into_iter()
            .map(|ls| {
                ListKey::new(ls.ls_name)
                    .map_err(|e| ReadFailed::new(parent, DeviceError::InvalidData(e.to_string())))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatree::ModifiableDataTree;
    use crate::storage::GitSignature;
    use crate::vpp::FakeVpp;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn path(name: &str) -> DataPath {
        format!("/lisp/locator-sets/locator-set={}", name).parse().unwrap()
    }

    #[test]
    fn test_create_then_read_back() {
        let dir = TempDir::new().unwrap();
        let tree = ModifiableDataTree::open_or_init(dir.path(), GitSignature::agent()).unwrap();
        let vpp = Arc::new(FakeVpp::new());
        let context = NamingContext::new(LOCATOR_SET_CONTEXT).unwrap();
        let writer = LocatorSetWriter::new(vpp.clone(), context.clone());

        let mut modification = tree.take_snapshot().unwrap().new_modification();
        let mut ctx = WriteContext::new(&mut modification, "t1");
        writer
            .write_current_attributes(&path("loc-set"), &DataNode::new().with(NAME, "loc-set"), &mut ctx)
            .unwrap();
        assert_eq!(vpp.calls(), vec![LISP_ADD_DEL_LOCATOR_SET.to_string()]);
        assert_eq!(context.get_index(&modification, "loc-set").unwrap(), Some(1));
        tree.commit(modification, "t1").unwrap();

        let reader = LocatorSetReader::new(vpp.clone());
        let mut ctx = ReadContext::new(tree.take_snapshot().unwrap());
        let ids = reader
            .get_all_ids(&"/lisp/locator-sets".parse().unwrap(), &mut ctx)
            .unwrap();
        assert_eq!(ids, vec![ListKey::new("loc-set").unwrap()]);

        let mut node = DataNode::new();
        reader
            .read_current_attributes(&path("loc-set"), &mut node, &mut ctx)
            .unwrap();
        assert_eq!(node.get_str(NAME), Some("loc-set"));
    }

    #[test]
    fn test_update_is_noop_and_delete_unmaps() {
        let dir = TempDir::new().unwrap();
        let tree = ModifiableDataTree::open_or_init(dir.path(), GitSignature::agent()).unwrap();
        let vpp = Arc::new(FakeVpp::new());
        let context = NamingContext::new(LOCATOR_SET_CONTEXT).unwrap();
        let writer = LocatorSetWriter::new(vpp.clone(), context.clone());
        let data = DataNode::new().with(NAME, "ls");

        let mut modification = tree.take_snapshot().unwrap().new_modification();
        let mut ctx = WriteContext::new(&mut modification, "t1");
        writer
            .write_current_attributes(&path("ls"), &data, &mut ctx)
            .unwrap();
        writer
            .update_current_attributes(&path("ls"), &data, &data, &mut ctx)
            .unwrap();
        assert_eq!(vpp.calls().len(), 1);

        writer
            .delete_current_attributes(&path("ls"), &data, &mut ctx)
            .unwrap();
        assert!(vpp.locator_sets().is_empty());
        assert!(!context.contains_name(&modification, "ls").unwrap());
    }

    #[test]
    fn test_delete_of_unknown_set_fails() {
        let dir = TempDir::new().unwrap();
        let tree = ModifiableDataTree::open_or_init(dir.path(), GitSignature::agent()).unwrap();
        let vpp = Arc::new(FakeVpp::new());
        let writer = LocatorSetWriter::new(vpp.clone(), NamingContext::new(LOCATOR_SET_CONTEXT).unwrap());

        let mut modification = tree.take_snapshot().unwrap().new_modification();
        let mut ctx = WriteContext::new(&mut modification, "t1");
        let err = writer
            .delete_current_attributes(&path("ghost"), &DataNode::new(), &mut ctx)
            .unwrap_err();
        assert!(matches!(err, WriteFailed::Delete { .. }));
        assert!(matches!(
            err.device_error(),
            DeviceError::MissingMapping { name, .. } if name == "ghost"
        ));
        assert!(vpp.calls().is_empty());
    }

    #[test]
    fn test_device_rejection_of_delete_keeps_mapping() {
        let dir = TempDir::new().unwrap();
        let tree = ModifiableDataTree::open_or_init(dir.path(), GitSignature::agent()).unwrap();
        let vpp = Arc::new(FakeVpp::new());
        let context = NamingContext::new(LOCATOR_SET_CONTEXT).unwrap();
        let writer = LocatorSetWriter::new(vpp.clone(), context.clone());
        let data = DataNode::new().with(NAME, "ls");

        let mut modification = tree.take_snapshot().unwrap().new_modification();
        let mut ctx = WriteContext::new(&mut modification, "t1");
        writer
            .write_current_attributes(&path("ls"), &data, &mut ctx)
            .unwrap();
        vpp.fail_next(LISP_ADD_DEL_LOCATOR_SET, crate::vpp::RETVAL_NO_SUCH_ENTRY);
        let err = writer
            .delete_current_attributes(&path("ls"), &data, &mut ctx)
            .unwrap_err();

        assert_eq!(err.device_error().retval(), Some(crate::vpp::RETVAL_NO_SUCH_ENTRY));
        assert_eq!(context.get_index(&modification, "ls").unwrap(), Some(1));
        assert_eq!(vpp.locator_sets().len(), 1);
    }
}
