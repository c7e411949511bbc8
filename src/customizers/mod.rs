//! Translation units for the supported device objects.

mod bridge_domain;
mod locator_set;

use std::sync::Arc;

pub use bridge_domain::{
    BridgeDomainReader, BridgeDomainWriter, ARP_TERMINATION, BRIDGE_DOMAIN_CONTEXT,
    BRIDGE_DOMAIN_PATH, FLOOD, FORWARD, LEARN, NAME, UNKNOWN_UNICAST_FLOOD,
};
pub use locator_set::{LocatorSetReader, LocatorSetWriter, LOCATOR_SET_CONTEXT, LOCATOR_SET_PATH};

use crate::data::SchemaPath;
use crate::naming::NamingContext;
use crate::translate::{Customizer, CustomizerRegistry, RegistryError};
use crate::vpp::VppApi;

fn schema(path: &str) -> Result<SchemaPath, RegistryError> {
    path.parse().map_err(RegistryError::InvalidPath)
}

/// The registry of every customizer this agent ships, talking to `vpp`.
pub fn default_registry(
    vpp: Arc<dyn VppApi>,
    bridge_domains: NamingContext,
    locator_sets: NamingContext,
) -> Result<CustomizerRegistry, RegistryError> {
    let bd = schema(BRIDGE_DOMAIN_PATH)?;
    let ls = schema(LOCATOR_SET_PATH)?;

    let registry = CustomizerRegistry::builder()
        .add(
            bd.clone(),
            Customizer::ListWriter(Arc::new(BridgeDomainWriter::new(
                vpp.clone(),
                bridge_domains.clone(),
            ))),
        )?
        .add(
            bd,
            Customizer::ListReader(Arc::new(BridgeDomainReader::new(vpp.clone(), bridge_domains))),
        )?
        .add(
            ls.clone(),
            Customizer::ListWriter(Arc::new(LocatorSetWriter::new(vpp.clone(), locator_sets))),
        )?
        .add(ls, Customizer::ListReader(Arc::new(LocatorSetReader::new(vpp))))?
        .build();

    Ok(registry)
}
