//! In-memory device.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use tracing::debug;

use crate::vpp::api::{
    BridgeDomainAddDel, BridgeDomainDetails, BridgeDomainDump, LispAddDelLocatorSet,
    LispLocatorSetDetails, LispLocatorSetDump, Reply, VppApi, VppError, VppResult, ALL,
    BRIDGE_DOMAIN_ADD_DEL, BRIDGE_DOMAIN_DUMP, LISP_ADD_DEL_LOCATOR_SET, LISP_LOCATOR_SET_DUMP,
};

/// Generic failure.
pub const RETVAL_UNSPECIFIED: i32 = -1;
/// Entry to delete does not exist.
pub const RETVAL_NO_SUCH_ENTRY: i32 = -6;
/// Index out of the accepted range.
pub const RETVAL_INVALID_VALUE: i32 = -73;

/// A device that keeps what it is told in memory.
///
/// Every call is recorded (method names, in order). Failures can be injected
/// per method: the next call to that method answers with the given `retval`
/// without touching state. Add/del calls carry it in their [`Reply`], dumps
/// fail with [`VppError::Invocation`].
#[derive(Debug, Default)]
pub struct FakeVpp {
    state: Mutex<FakeState>,
}

#[derive(Debug, Default)]
struct FakeState {
    bridge_domains: BTreeMap<u32, BridgeDomainDetails>,
    locator_sets: BTreeMap<u32, String>,
    calls: Vec<String>,
    failures: HashMap<String, i32>,
    disconnected: bool,
    next_context: u32,
}

/// How the device answers a call that got through.
enum Admission {
    Proceed(u32),
    Fail(Reply),
}

impl FakeState {
    /// record the call and decide whether it gets through
    fn begin(&mut self, method: &str) -> VppResult<Admission> {
        self.calls.push(method.to_string());
        self.next_context = self.next_context.wrapping_add(1);
        let context = self.next_context;

        if self.disconnected {
            return Err(VppError::Disconnected);
        }
        if let Some(retval) = self.failures.remove(method) {
            debug!("{} (context {}): injected retval {}", method, context, retval);
            return Ok(Admission::Fail(Reply { context, retval }));
        }
        Ok(Admission::Proceed(context))
    }

    /// dumps have no reply to carry a retval
    fn begin_dump(&mut self, method: &str) -> VppResult<()> {
        match self.begin(method)? {
            Admission::Proceed(_) => Ok(()),
            Admission::Fail(reply) => Err(VppError::Invocation {
                method: method.to_string(),
                context: reply.context,
                retval: reply.retval,
            }),
        }
    }
}

impl FakeVpp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call to `method` answer with `retval`.
    pub fn fail_next(&self, method: &str, retval: i32) {
        self.state.lock().failures.insert(method.to_string(), retval);
    }

    /// Simulate a lost connection: every call fails until reconnected.
    pub fn set_disconnected(&self, disconnected: bool) {
        self.state.lock().disconnected = disconnected;
    }

    /// Methods called so far, oldest first.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn bridge_domains(&self) -> Vec<BridgeDomainDetails> {
        self.state.lock().bridge_domains.values().cloned().collect()
    }

    pub fn locator_sets(&self) -> Vec<LispLocatorSetDetails> {
        self.state
            .lock()
            .locator_sets
            .iter()
            .map(|(index, name)| LispLocatorSetDetails {
                ls_index: *index,
                ls_name: name.clone(),
            })
            .collect()
    }
}

impl VppApi for FakeVpp {
    fn bridge_domain_add_del(&self, request: BridgeDomainAddDel) -> VppResult<Reply> {
        let mut state = self.state.lock();
        let context = match state.begin(BRIDGE_DOMAIN_ADD_DEL)? {
            Admission::Proceed(context) => context,
            Admission::Fail(reply) => return Ok(reply),
        };
        debug!("{} (context {}): {:?}", BRIDGE_DOMAIN_ADD_DEL, context, request);

        let retval = if request.bd_id == 0 || request.bd_id == ALL {
            RETVAL_INVALID_VALUE
        } else if request.is_add != 0 {
            state.bridge_domains.insert(
                request.bd_id,
                BridgeDomainDetails {
                    bd_id: request.bd_id,
                    flood: request.flood,
                    uu_flood: request.uu_flood,
                    forward: request.forward,
                    learn: request.learn,
                    arp_term: request.arp_term,
                },
            );
            0
        } else if state.bridge_domains.remove(&request.bd_id).is_some() {
            0
        } else {
            RETVAL_NO_SUCH_ENTRY
        };

        Ok(Reply { context, retval })
    }

    fn bridge_domain_dump(&self, request: BridgeDomainDump) -> VppResult<Vec<BridgeDomainDetails>> {
        let mut state = self.state.lock();
        state.begin_dump(BRIDGE_DOMAIN_DUMP)?;

        Ok(state
            .bridge_domains
            .values()
            .filter(|bd| request.bd_id == ALL || bd.bd_id == request.bd_id)
            .cloned()
            .collect())
    }

    fn lisp_add_del_locator_set(&self, request: LispAddDelLocatorSet) -> VppResult<Reply> {
        let mut state = self.state.lock();
        let context = match state.begin(LISP_ADD_DEL_LOCATOR_SET)? {
            Admission::Proceed(context) => context,
            Admission::Fail(reply) => return Ok(reply),
        };
        debug!("{} (context {}): {:?}", LISP_ADD_DEL_LOCATOR_SET, context, request);

        let retval = if request.locator_set_name.is_empty() {
            RETVAL_UNSPECIFIED
        } else if request.is_add != 0 {
            state
                .locator_sets
                .insert(request.ls_index, request.locator_set_name);
            0
        } else {
            let found = state
                .locator_sets
                .iter()
                .find(|(_, name)| **name == request.locator_set_name)
                .map(|(index, _)| *index);
            match found {
                Some(index) => {
                    state.locator_sets.remove(&index);
                    0
                }
                None => RETVAL_NO_SUCH_ENTRY,
            }
        };

        Ok(Reply { context, retval })
    }

    fn lisp_locator_set_dump(
        &self,
        _request: LispLocatorSetDump,
    ) -> VppResult<Vec<LispLocatorSetDetails>> {
        let mut state = self.state.lock();
        state.begin_dump(LISP_LOCATOR_SET_DUMP)?;

        Ok(state
            .locator_sets
            .iter()
            .map(|(index, name)| LispLocatorSetDetails {
                ls_index: *index,
                ls_name: name.clone(),
            })
            .collect())
    }
}
