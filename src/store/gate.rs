use crate::domain::{Address, SuretyError, SuretyResult};

/// Operational flag plus the owner and authorized-caller identities.
#[derive(Debug, Clone)]
pub struct Gate {
    owner: Address,
    authorized_caller: Option<Address>,
    operational: bool,
}

impl Gate {
    /// Open gate with no authorized caller bound yet.
    pub fn new(owner: Address) -> Self {
        Gate {
            owner,
            authorized_caller: None,
            operational: true,
        }
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    pub fn authorized_caller(&self) -> Option<&Address> {
        self.authorized_caller.as_ref()
    }

    pub fn is_operational(&self) -> bool {
        self.operational
    }

    pub fn require_operational(&self) -> SuretyResult<()> {
        if self.operational {
            Ok(())
        } else {
            Err(SuretyError::Operational)
        }
    }

    pub(crate) fn set_operational(&mut self, mode: bool) {
        self.operational = mode;
    }

    pub(crate) fn set_authorized_caller(&mut self, caller: Address) {
        self.authorized_caller = Some(caller);
    }
}
