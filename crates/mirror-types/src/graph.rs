//! Node and edge kinds that downstream graph builders derive from the mirror.
//!
//! The declaration is built once and only handed out by shared reference.
//! Addresses are a fixed root, then the entity kind, then the entity's local
//! ids, so every mirrored row maps to exactly one node address.

use std::fmt;
use std::sync::LazyLock;

use crate::models::Reaction;
use crate::snowflake::Snowflake;

pub const ADDRESS_ROOT: [&str; 2] = ["guild-mirror", "discord"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(Vec<String>);

impl Address {
    fn under_root(kind: &str, parts: &[&str]) -> Self {
        let mut all: Vec<String> = ADDRESS_ROOT.iter().map(|s| s.to_string()).collect();
        all.push(kind.to_string());
        all.extend(parts.iter().map(|s| s.to_string()));
        Self(all)
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    /// True if `prefix` is a leading run of this address' parts.
    pub fn has_prefix(&self, prefix: &Address) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeWeight {
    pub forwards: f64,
    pub backwards: f64,
}

#[derive(Debug, Clone)]
pub struct NodeType {
    name: &'static str,
    plural_name: &'static str,
    prefix: Address,
    default_weight: f64,
    description: &'static str,
}

impl NodeType {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn plural_name(&self) -> &'static str {
        self.plural_name
    }

    pub fn prefix(&self) -> &Address {
        &self.prefix
    }

    pub fn default_weight(&self) -> f64 {
        self.default_weight
    }

    pub fn description(&self) -> &'static str {
        self.description
    }
}

#[derive(Debug, Clone)]
pub struct EdgeType {
    forward_name: &'static str,
    backward_name: &'static str,
    prefix: Address,
    default_weight: EdgeWeight,
    description: &'static str,
}

impl EdgeType {
    pub fn forward_name(&self) -> &'static str {
        self.forward_name
    }

    pub fn backward_name(&self) -> &'static str {
        self.backward_name
    }

    pub fn prefix(&self) -> &Address {
        &self.prefix
    }

    pub fn default_weight(&self) -> EdgeWeight {
        self.default_weight
    }

    pub fn description(&self) -> &'static str {
        self.description
    }
}

#[derive(Debug)]
pub struct Declaration {
    name: &'static str,
    node_types: Vec<NodeType>,
    edge_types: Vec<EdgeType>,
}

impl Declaration {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn node_types(&self) -> &[NodeType] {
        &self.node_types
    }

    pub fn edge_types(&self) -> &[EdgeType] {
        &self.edge_types
    }

    pub fn node_type(&self, name: &str) -> Option<&NodeType> {
        self.node_types.iter().find(|t| t.name == name)
    }

    pub fn edge_type(&self, forward_name: &str) -> Option<&EdgeType> {
        self.edge_types.iter().find(|t| t.forward_name == forward_name)
    }
}

pub const MEMBER: &str = "member";
pub const MESSAGE: &str = "message";
pub const REACTION: &str = "reaction";

pub const AUTHORS_MESSAGE: &str = "authors-message";
pub const ADDS_REACTION: &str = "adds-reaction";
pub const REACTS_TO: &str = "reacts-to";
pub const MENTIONS: &str = "mentions";

static DECLARATION: LazyLock<Declaration> = LazyLock::new(|| Declaration {
    name: "Discord",
    node_types: vec![
        NodeType {
            name: "Member",
            plural_name: "Members",
            prefix: Address::under_root(MEMBER, &[]),
            default_weight: 0.0,
            description: "A member of the guild",
        },
        NodeType {
            name: "Message",
            plural_name: "Messages",
            prefix: Address::under_root(MESSAGE, &[]),
            default_weight: 0.0,
            description: "A message posted in a text channel",
        },
        NodeType {
            name: "Reaction",
            plural_name: "Reactions",
            prefix: Address::under_root(REACTION, &[]),
            default_weight: 1.0,
            description: "One member's emoji reaction to a message",
        },
    ],
    edge_types: vec![
        EdgeType {
            forward_name: "authors",
            backward_name: "is authored by",
            prefix: Address::under_root(AUTHORS_MESSAGE, &[]),
            default_weight: EdgeWeight {
                forwards: 1.0 / 4.0,
                backwards: 1.0,
            },
            description: "Connects a member to a message they wrote",
        },
        EdgeType {
            forward_name: "adds reaction",
            backward_name: "reaction added by",
            prefix: Address::under_root(ADDS_REACTION, &[]),
            default_weight: EdgeWeight {
                forwards: 1.0,
                backwards: 1.0 / 16.0,
            },
            description: "Connects a member to a reaction they added",
        },
        EdgeType {
            forward_name: "reacts to",
            backward_name: "is reacted to by",
            prefix: Address::under_root(REACTS_TO, &[]),
            default_weight: EdgeWeight {
                forwards: 1.0,
                backwards: 1.0 / 16.0,
            },
            description: "Connects a reaction to the message it is on",
        },
        EdgeType {
            forward_name: "mentions",
            backward_name: "is mentioned by",
            prefix: Address::under_root(MENTIONS, &[]),
            default_weight: EdgeWeight {
                forwards: 1.0,
                backwards: 1.0 / 16.0,
            },
            description: "Connects a message to a member it mentions",
        },
    ],
});

pub fn declaration() -> &'static Declaration {
    &DECLARATION
}

pub fn member_address(user_id: &Snowflake) -> Address {
    Address::under_root(MEMBER, &[user_id.as_str()])
}

pub fn message_address(channel_id: &Snowflake, message_id: &Snowflake) -> Address {
    Address::under_root(MESSAGE, &[channel_id.as_str(), message_id.as_str()])
}

pub fn reaction_address(reaction: &Reaction) -> Address {
    let emoji_ref = reaction.emoji.to_ref();
    Address::under_root(
        REACTION,
        &[
            reaction.channel_id.as_str(),
            reaction.message_id.as_str(),
            reaction.author_id.as_str(),
            &emoji_ref,
        ],
    )
}
