// Roles and parties
// A role is a logical participant category; a party is a concrete participant
// filling a role within one pipeline run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical participant category in a multi-party computation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The task-initiating party; holds labelled data.
    Guest,
    /// Data-providing collaborator without labels.
    Host,
    /// Neutral coordinator for joint computations.
    Arbiter,
}

impl Role {
    /// All roles, in canonical order.
    pub const ALL: [Role; 3] = [Role::Guest, Role::Host, Role::Arbiter];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Host => "host",
            Role::Arbiter => "arbiter",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque identifier of a concrete participant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PartyId(pub u32);

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Party ids per role. A pipeline's role set is the set of roles with at
/// least one party; it is fixed once bound to a builder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleTable {
    #[serde(default)]
    pub guest: Vec<PartyId>,
    #[serde(default)]
    pub host: Vec<PartyId>,
    #[serde(default)]
    pub arbiter: Vec<PartyId>,
}

impl RoleTable {
    pub fn parties(&self, role: Role) -> &[PartyId] {
        match role {
            Role::Guest => &self.guest,
            Role::Host => &self.host,
            Role::Arbiter => &self.arbiter,
        }
    }

    pub fn contains(&self, role: Role) -> bool {
        !self.parties(role).is_empty()
    }

    /// Roles with at least one party, in canonical order.
    pub fn roles(&self) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|r| self.contains(*r))
            .collect()
    }

    /// Every (role, party) pair, in canonical role order then declaration
    /// order within a role.
    pub fn members(&self) -> Vec<(Role, PartyId)> {
        let mut members = Vec::new();
        for role in Role::ALL {
            for party in self.parties(role) {
                members.push((role, *party));
            }
        }
        members
    }

    pub fn is_empty(&self) -> bool {
        self.guest.is_empty() && self.host.is_empty() && self.arbiter.is_empty()
    }
}
