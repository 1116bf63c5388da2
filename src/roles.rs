//! Buffer-role resolution
//!
//! Given a transform kind, placement, and direction, work out which buffer
//! roles this invocation needs before anything touches an engine. Role sets
//! are ephemeral per-call values and are never cached.

use crate::error::{Error, Result};
use crate::problem::{Direction, TransformKind};
use std::fmt;

/// A slot a device buffer can fill in one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferRole {
    /// Single buffer transformed in place
    Primary,
    /// Out-of-place source
    Input,
    /// Out-of-place destination
    Output,
    /// Intermediate workspace
    Scratch,
}

impl fmt::Display for BufferRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BufferRole::Primary => "primary",
            BufferRole::Input => "input",
            BufferRole::Output => "output",
            BufferRole::Scratch => "scratch",
        };
        write!(f, "{}", name)
    }
}

/// How strongly a role is needed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Not used at all
    Unused,
    /// Used if supplied, engine provides its own otherwise
    Optional,
    /// Invocation fails without it
    Mandatory,
}

/// The resolved role set for one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleSet {
    /// In-place: one primary buffer serves as both source and destination
    pub primary: bool,
    /// Out-of-place: a distinct output buffer must be supplied
    pub output_required: bool,
    /// Whether a scratch buffer is needed
    pub scratch: Requirement,
}

/// Resolve the role set for a (kind, placement, direction) combination.
///
/// The half-spectrum-to-real backward case cannot write through its own input
/// out of place, so it routes through a scratch buffer. Engines that allocate
/// their own intermediate downgrade that scratch to optional.
pub fn resolve(
    kind: TransformKind,
    in_place: bool,
    direction: Direction,
    engine_allocates_scratch: bool,
) -> RoleSet {
    if in_place {
        return RoleSet {
            primary: true,
            output_required: false,
            scratch: Requirement::Unused,
        };
    }
    let scratch = if kind == TransformKind::C2R && direction == Direction::Backward {
        if engine_allocates_scratch {
            Requirement::Optional
        } else {
            Requirement::Mandatory
        }
    } else {
        Requirement::Unused
    };
    RoleSet {
        primary: false,
        output_required: true,
        scratch,
    }
}

impl RoleSet {
    /// Check the caller's supplied buffers against the mandatory roles.
    pub fn check(&self, op: &'static str, has_output: bool, has_scratch: bool) -> Result<()> {
        if self.output_required && !has_output {
            return Err(Error::missing_buffer(BufferRole::Output, op));
        }
        if self.scratch == Requirement::Mandatory && !has_scratch {
            return Err(Error::missing_buffer(BufferRole::Scratch, op));
        }
        Ok(())
    }

    /// Roles that must be filled for the invocation to proceed
    pub fn required_roles(&self) -> Vec<BufferRole> {
        if self.primary {
            return vec![BufferRole::Primary];
        }
        let mut roles = vec![BufferRole::Input, BufferRole::Output];
        if self.scratch == Requirement::Mandatory {
            roles.push(BufferRole::Scratch);
        }
        roles
    }
}
