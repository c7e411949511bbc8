//! Device API messages and the client trait.
//!
//! Messages mirror the VPP binary API: every request carries its own fields,
//! every add/del call answers with a [`Reply`] holding the correlation
//! `context` and a signed `retval` (negative means failure). Dumps answer
//! with a list of details records.

use thiserror::Error;

pub const BRIDGE_DOMAIN_ADD_DEL: &str = "bridge_domain_add_del";
pub const BRIDGE_DOMAIN_DUMP: &str = "bridge_domain_dump";
pub const LISP_ADD_DEL_LOCATOR_SET: &str = "lisp_add_del_locator_set";
pub const LISP_LOCATOR_SET_DUMP: &str = "lisp_locator_set_dump";

/// Dump selector meaning "all entries".
pub const ALL: u32 = u32::MAX;

/// Errors a device call can end with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VppError {
    /// The device answered with a negative return code.
    #[error("{method} failed with retval {retval} (context {context})")]
    Invocation {
        method: String,
        context: u32,
        retval: i32,
    },

    #[error("{method} timed out after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    #[error("device connection lost")]
    Disconnected,
}

impl VppError {
    /// The device return code, if the device answered at all.
    pub fn retval(&self) -> Option<i32> {
        match self {
            VppError::Invocation { retval, .. } => Some(*retval),
            _ => None,
        }
    }
}

pub type VppResult<T> = Result<T, VppError>;

/// Generic add/del reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub context: u32,
    pub retval: i32,
}

/// Turn a negative `retval` into an error, keeping the reply otherwise.
pub fn check_reply(method: &str, reply: Reply) -> VppResult<Reply> {
    if reply.retval < 0 {
        return Err(VppError::Invocation {
            method: method.to_string(),
            context: reply.context,
            retval: reply.retval,
        });
    }
    Ok(reply)
}

/// Add-or-update (`is_add = 1`) or delete (`is_add = 0`) a bridge domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeDomainAddDel {
    pub bd_id: u32,
    pub flood: u8,
    pub uu_flood: u8,
    pub forward: u8,
    pub learn: u8,
    pub arp_term: u8,
    pub is_add: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeDomainDump {
    /// [`ALL`] dumps every bridge domain.
    pub bd_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeDomainDetails {
    pub bd_id: u32,
    pub flood: u8,
    pub uu_flood: u8,
    pub forward: u8,
    pub learn: u8,
    pub arp_term: u8,
}

/// Add (`is_add = 1`) or delete (`is_add = 0`) a LISP locator set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LispAddDelLocatorSet {
    pub is_add: u8,
    pub ls_index: u32,
    pub locator_set_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LispLocatorSetDump;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LispLocatorSetDetails {
    pub ls_index: u32,
    pub ls_name: String,
}

/// Request/reply client for the device.
///
/// Calls block until the reply arrives. A client with an asynchronous
/// transport waits for the reply inside the call; a timeout surfaces as
/// [`VppError::Timeout`].
pub trait VppApi: Send + Sync {
    fn bridge_domain_add_del(&self, request: BridgeDomainAddDel) -> VppResult<Reply>;

    fn bridge_domain_dump(&self, request: BridgeDomainDump) -> VppResult<Vec<BridgeDomainDetails>>;

    fn lisp_add_del_locator_set(&self, request: LispAddDelLocatorSet) -> VppResult<Reply>;

    fn lisp_locator_set_dump(
        &self,
        request: LispLocatorSetDump,
    ) -> VppResult<Vec<LispLocatorSetDetails>>;
}
