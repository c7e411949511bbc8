//! Bridge domains: `/vpp/bridge-domains/bridge-domain=<name>`.
//!
//! The device knows bridge domains by numeric id only. Ids are picked by the
//! agent on create and kept in the bridge domain naming context.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::data::{DataNode, DataPath, ListKey};
use crate::naming::NamingContext;
use crate::translate::{
    DeviceError, ListReaderCustomizer, ListWriterCustomizer, ReadContext, ReadFailed,
    ReaderCustomizer, WriteContext, WriteFailed, WriterCustomizer,
};
use crate::vpp::{
    check_reply, BridgeDomainAddDel, BridgeDomainDetails, BridgeDomainDump, VppApi, ALL,
    BRIDGE_DOMAIN_ADD_DEL,
};

/// Schema path of a bridge domain entry.
pub const BRIDGE_DOMAIN_PATH: &str = "/vpp/bridge-domains/bridge-domain";
/// Default naming context for bridge domain ids.
pub const BRIDGE_DOMAIN_CONTEXT: &str = "bridge-domain-context";

const ENTRY: &str = "bridge-domain";
const DUMP_CACHE_KEY: &str = "bridge-domain-dump";

pub const NAME: &str = "name";
pub const FLOOD: &str = "flood";
pub const FORWARD: &str = "forward";
pub const LEARN: &str = "learn";
pub const UNKNOWN_UNICAST_FLOOD: &str = "unknown-unicast-flood";
pub const ARP_TERMINATION: &str = "arp-termination";

const ADD_OR_UPDATE: u8 = 1;
const DELETE: u8 = 0;

fn flag(node: &DataNode, attribute: &str) -> u8 {
    u8::from(node.get_bool(attribute))
}

/// The entry key, which must agree with a `name` attribute if one is set.
fn entry_name(path: &DataPath, data: &DataNode) -> Result<String, DeviceError> {
    let key = path
        .first_key_of(ENTRY)
        .ok_or_else(|| DeviceError::InvalidData(format!("{} is not a bridge domain entry", path)))?;
    match data.get_str(NAME) {
        Some(name) if name != key.as_str() => Err(DeviceError::InvalidData(format!(
            "name '{}' does not match key '{}'",
            name, key
        ))),
        _ => Ok(key.as_str().to_string()),
    }
}

/// Pushes bridge domains to the device.
pub struct BridgeDomainWriter {
    vpp: Arc<dyn VppApi>,
    context: NamingContext,
}

impl BridgeDomainWriter {
    pub fn new(vpp: Arc<dyn VppApi>, context: NamingContext) -> Self {
        Self { vpp, context }
    }

    fn add_or_update(&self, bd_id: u32, name: &str, data: &DataNode) -> Result<(), DeviceError> {
        let request = BridgeDomainAddDel {
            bd_id,
            flood: flag(data, FLOOD),
            uu_flood: flag(data, UNKNOWN_UNICAST_FLOOD),
            forward: flag(data, FORWARD),
            learn: flag(data, LEARN),
            arp_term: flag(data, ARP_TERMINATION),
            is_add: ADD_OR_UPDATE,
        };
        let reply = self.vpp.bridge_domain_add_del(request);
        match reply.and_then(|r| check_reply(BRIDGE_DOMAIN_ADD_DEL, r)) {
            Ok(_) => {
                debug!("bridge domain {} (id={}) add/update successful", name, bd_id);
                Ok(())
            }
            Err(e) => {
                warn!("bridge domain {} (id={}) add/update failed", name, bd_id);
                Err(e.into())
            }
        }
    }

    fn mapped_index(&self, ctx: &WriteContext<'_>, name: &str) -> Result<u32, DeviceError> {
        self.context
            .get_index(ctx.after(), name)?
            .ok_or_else(|| DeviceError::MissingMapping {
                context: self.context.name().to_string(),
                name: name.to_string(),
            })
    }

    fn create(&self, path: &DataPath, after: &DataNode, ctx: &mut WriteContext<'_>) -> Result<(), DeviceError> {
        let name = entry_name(path, after)?;
        let bd_id = self.context.allocate_index(ctx.after())?;
        self.add_or_update(bd_id, &name, after)?;
        self.context.add_name(ctx.after_mut(), bd_id, &name)?;
        Ok(())
    }

    fn update(
        &self,
        path: &DataPath,
        before: &DataNode,
        after: &DataNode,
        ctx: &WriteContext<'_>,
    ) -> Result<(), DeviceError> {
        let name = entry_name(path, after)?;
        if before.get_str(NAME).is_some_and(|old| old != name) {
            return Err(DeviceError::InvalidData(
                "bridge domain name changed, delete and create it instead".to_string(),
            ));
        }
        let bd_id = self.mapped_index(ctx, &name)?;
        self.add_or_update(bd_id, &name, after)
    }

    fn delete(&self, path: &DataPath, before: &DataNode, ctx: &mut WriteContext<'_>) -> Result<(), DeviceError> {
        let name = entry_name(path, before)?;
        let bd_id = self.mapped_index(ctx, &name)?;

        let request = BridgeDomainAddDel {
            bd_id,
            flood: 0,
            uu_flood: 0,
            forward: 0,
            learn: 0,
            arp_term: 0,
            is_add: DELETE,
        };
        if let Err(e) = self
            .vpp
            .bridge_domain_add_del(request)
            .and_then(|r| check_reply(BRIDGE_DOMAIN_ADD_DEL, r))
        {
            warn!("bridge domain {} (id={}) delete failed", name, bd_id);
            return Err(e.into());
        }
        debug!("bridge domain {} (id={}) deleted", name, bd_id);

        self.context.remove_name(ctx.after_mut(), &name)?;
        Ok(())
    }
}

impl WriterCustomizer for BridgeDomainWriter {
    fn write_current_attributes(
        &self,
        path: &DataPath,
        after: &DataNode,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), WriteFailed> {
        debug!("tx {}: create {}", ctx.tx_id(), path);
        self.create(path, after, ctx)
            .map_err(|e| WriteFailed::create(path, after, e))
    }

    fn update_current_attributes(
        &self,
        path: &DataPath,
        before: &DataNode,
        after: &DataNode,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), WriteFailed> {
        debug!("tx {}: update {}", ctx.tx_id(), path);
        self.update(path, before, after, ctx)
            .map_err(|e| WriteFailed::update(path, before, after, e))
    }

    fn delete_current_attributes(
        &self,
        path: &DataPath,
        before: &DataNode,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), WriteFailed> {
        debug!("tx {}: delete {}", ctx.tx_id(), path);
        self.delete(path, before, ctx)
            .map_err(|e| WriteFailed::delete(path, before, e))
    }
}

impl ListWriterCustomizer for BridgeDomainWriter {}

/// Reads bridge domains back from the device.
pub struct BridgeDomainReader {
    vpp: Arc<dyn VppApi>,
    context: NamingContext,
}

impl BridgeDomainReader {
    pub fn new(vpp: Arc<dyn VppApi>, context: NamingContext) -> Self {
        Self { vpp, context }
    }

    fn dump(&self, path: &DataPath, ctx: &mut ReadContext) -> Result<Vec<BridgeDomainDetails>, ReadFailed> {
        ctx.cache().get_or_try_insert_with(DUMP_CACHE_KEY, || {
            self.vpp
                .bridge_domain_dump(BridgeDomainDump { bd_id: ALL })
                .map_err(|e| ReadFailed::new(path, e))
        })
    }

    /// The configured name of `bd_id`, or a generated one for domains the
    /// agent did not create.
    fn name_of(&self, path: &DataPath, bd_id: u32, ctx: &ReadContext) -> Result<String, ReadFailed> {
        let name = self
            .context
            .get_name(ctx.mappings(), bd_id)
            .map_err(|e| ReadFailed::new(path, e))?;
        Ok(name.unwrap_or_else(|| format!("bd-{}", bd_id)))
    }
}

impl ReaderCustomizer for BridgeDomainReader {
    fn read_current_attributes(
        &self,
        path: &DataPath,
        builder: &mut DataNode,
        ctx: &mut ReadContext,
    ) -> Result<(), ReadFailed> {
        let Some(key) = path.first_key_of(ENTRY) else {
            return Ok(());
        };
        let details = self.dump(path, ctx)?;

        for bd in details {
            if self.name_of(path, bd.bd_id, ctx)? != key.as_str() {
                continue;
            }
            builder.set(NAME, key.as_str());
            builder.set(FLOOD, bd.flood != 0);
            builder.set(FORWARD, bd.forward != 0);
            builder.set(LEARN, bd.learn != 0);
            builder.set(UNKNOWN_UNICAST_FLOOD, bd.uu_flood != 0);
            builder.set(ARP_TERMINATION, bd.arp_term != 0);
            return Ok(());
        }
        Ok(())
    }
}

impl ListReaderCustomizer for BridgeDomainReader {
    fn get_all_ids(&self, parent: &DataPath, ctx: &mut ReadContext) -> Result<Vec<ListKey>, ReadFailed> {
        let details = self.dump(parent, ctx)?;
        details
            .iter()
            .map(|bd| {
                let name = self.name_of(parent, bd.bd_id, ctx)?;
                ListKey::new(name).map_err(|e| {
                    ReadFailed::new(parent, DeviceError::InvalidData(e.to_string()))
                })
            })
            .collect()
    }
}
