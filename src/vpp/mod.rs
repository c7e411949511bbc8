//! Device API collaborator.
//!
//! Customizers receive an `Arc<dyn VppApi>` at construction and are the only
//! code that talks to the device. [`FakeVpp`] stands in for a real device
//! connection in the binary and in tests.

mod api;
mod fake;

pub use api::{
    check_reply, BridgeDomainAddDel, BridgeDomainDetails, BridgeDomainDump, LispAddDelLocatorSet,
    LispLocatorSetDetails, LispLocatorSetDump, Reply, VppApi, VppError, VppResult, ALL,
    BRIDGE_DOMAIN_ADD_DEL, BRIDGE_DOMAIN_DUMP, LISP_ADD_DEL_LOCATOR_SET, LISP_LOCATOR_SET_DUMP,
};
pub use fake::{FakeVpp, RETVAL_INVALID_VALUE, RETVAL_NO_SUCH_ENTRY, RETVAL_UNSPECIFIED};
