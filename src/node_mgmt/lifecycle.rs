//! Device instance lifecycle
//!
//! Setup, unload and reload are explicit transitions; the transport handle is
//! opened on entering `Connecting` and released on entering `Unloading`.

use std::fmt;

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Unconfigured,
    Connecting,
    Active,
    Unloading,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Unconfigured => "unconfigured",
            LifecycleState::Connecting => "connecting",
            LifecycleState::Active => "active",
            LifecycleState::Unloading => "unloading",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("invalid lifecycle transition {from} -> {to}")]
pub struct LifecycleError {
    pub from: LifecycleState,
    pub to: LifecycleState,
}

#[derive(Debug)]
pub struct Lifecycle {
    state: LifecycleState,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Lifecycle {
            state: LifecycleState::Unconfigured,
        }
    }
}

impl Lifecycle {
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == LifecycleState::Active
    }

    pub fn transition(&mut self, to: LifecycleState) -> Result<(), LifecycleError> {
        use LifecycleState::*;

        let allowed = matches!(
            (self.state, to),
            (Unconfigured, Connecting)
                | (Connecting, Active)
                // setup failed
                | (Connecting, Unconfigured)
                // reload
                | (Active, Connecting)
                | (Active, Unloading)
                | (Connecting, Unloading)
                | (Unloading, Unconfigured)
        );
        if !allowed {
            return Err(LifecycleError {
                from: self.state,
                to,
            });
        }

        log::debug!("Lifecycle {} -> {}", self.state, to);
        self.state = to;
        Ok(())
    }
}
