//! Party registry
//!
//! Holds the two channel identities of a session. Left is bound to
//! channel 0 and right to channel 1.

use labeler_types::{Channel, Party, PartyRole};

/// The two fixed parties of a session
#[derive(Debug, Clone, PartialEq)]
pub struct PartyRegistry {
    left: Party,
    right: Party,
    revision: u64,
}

impl Default for PartyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PartyRegistry {
    /// Registry with the default agent (left) and customer (right) parties
    pub fn new() -> Self {
        Self {
            left: Party {
                id: "party-1".to_string(),
                role: PartyRole::Agent,
                name: Some("Agent".to_string()),
                uri: None,
            },
            right: Party {
                id: "party-2".to_string(),
                role: PartyRole::Customer,
                name: Some("Customer".to_string()),
                uri: None,
            },
            revision: 0,
        }
    }

    pub fn party(&self, channel: Channel) -> &Party {
        match channel {
            Channel::Left => &self.left,
            Channel::Right => &self.right,
        }
    }

    pub fn left(&self) -> &Party {
        &self.left
    }

    pub fn right(&self) -> &Party {
        &self.right
    }

    /// Both parties in channel order
    pub fn to_vec(&self) -> Vec<Party> {
        vec![self.left.clone(), self.right.clone()]
    }

    /// Look up a party by id
    pub fn find(&self, id: &str) -> Option<&Party> {
        [&self.left, &self.right].into_iter().find(|p| p.id == id)
    }

    /// Edit the name/role/uri of one side, keeping its id
    pub fn update(
        &mut self,
        channel: Channel,
        name: Option<String>,
        role: PartyRole,
        uri: Option<String>,
    ) {
        let party = match channel {
            Channel::Left => &mut self.left,
            Channel::Right => &mut self.right,
        };
        party.name = name;
        party.role = role;
        party.uri = uri;
        self.revision += 1;
    }

    /// Replace both parties wholesale
    pub fn replace(&mut self, left: Party, right: Party) {
        self.left = left;
        self.right = right;
        self.revision += 1;
    }

    /// Bumped on every mutation; used to invalidate cached projections
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Display label of a party: name, else role, else id
    pub fn display_name(party: &Party) -> String {
        match party.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ if party.role != PartyRole::Unknown => party.role.to_string(),
            _ => party.id.clone(),
        }
    }

    /// Display label for an annotation target (party id), falling back to the channel
    pub fn label_for(&self, target: Option<&str>, channel: Option<Channel>) -> String {
        if let Some(party) = target.and_then(|id| self.find(id)) {
            return Self::display_name(party);
        }
        match channel {
            Some(channel) => Self::display_name(self.party(channel)),
            None => target.unwrap_or("-").to_string(),
        }
    }
}
