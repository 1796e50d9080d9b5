// ── Core identity types ──
//
// ConfigKind, Location, and Identity form the foundation of every
// engine type. An Identity uniquely names one configuration item
// within a snapshot; two items of different kind may share a name.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── ConfigKind ──────────────────────────────────────────────────────

/// Closed set of configuration kinds the engine understands.
///
/// Kebab-case names match the snapshot wire format and the tenant API's
/// endpoint vocabulary.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ConfigKind {
    Address,
    AddressGroup,
    Service,
    ServiceGroup,
    SecurityProfile,
    ProfileGroup,
    AuthenticationProfile,
    HipObject,
    HipProfile,
    SecurityRule,
    IkeCryptoProfile,
    IpsecCryptoProfile,
    IkeGateway,
    IpsecTunnel,
    ServiceConnection,
}

impl ConfigKind {
    /// Whether this kind lives outside any container ("global"
    /// infrastructure kinds: tunnels, gateways, crypto, connectors).
    pub fn is_global(self) -> bool {
        matches!(
            self,
            Self::IkeCryptoProfile
                | Self::IpsecCryptoProfile
                | Self::IkeGateway
                | Self::IpsecTunnel
                | Self::ServiceConnection
        )
    }

    /// Stable ordering key used to break topological-sort ties.
    ///
    /// Leaf-most kinds sort first so independent items come out in a
    /// create-friendly, reproducible order.
    pub fn push_priority(self) -> u8 {
        match self {
            Self::IkeCryptoProfile => 0,
            Self::IpsecCryptoProfile => 1,
            Self::IkeGateway => 2,
            Self::IpsecTunnel => 3,
            Self::ServiceConnection => 4,
            Self::Address => 5,
            Self::AddressGroup => 6,
            Self::Service => 7,
            Self::ServiceGroup => 8,
            Self::HipObject => 9,
            Self::HipProfile => 10,
            Self::SecurityProfile => 11,
            Self::ProfileGroup => 12,
            Self::AuthenticationProfile => 13,
            Self::SecurityRule => 14,
        }
    }
}

// ── Location ────────────────────────────────────────────────────────

/// Where an item lives: a named container, or global for
/// container-less infrastructure kinds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Location {
    Global,
    Container(String),
}

impl Location {
    pub fn container(name: impl Into<String>) -> Self {
        Self::Container(name.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Global => "global",
            Self::Container(name) => name,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Location {
    fn from(s: &str) -> Self {
        if s == "global" {
            Self::Global
        } else {
            Self::Container(s.to_owned())
        }
    }
}

// Serialized as a bare string: "global" or the container name.
impl Serialize for Location {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Location {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}

// ── Identity ────────────────────────────────────────────────────────

/// `(kind, name, location)` triple uniquely naming one configuration
/// item within a snapshot.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Identity {
    pub kind: ConfigKind,
    pub name: String,
    pub location: Location,
}

impl Identity {
    pub fn new(kind: ConfigKind, name: impl Into<String>, location: Location) -> Self {
        Self {
            kind,
            name: name.into(),
            location,
        }
    }

    /// Global identity shorthand for infrastructure kinds.
    pub fn global(kind: ConfigKind, name: impl Into<String>) -> Self {
        Self::new(kind, name, Location::Global)
    }

    /// Deterministic sort key: kind priority, then name, then location.
    pub fn order_key(&self) -> (u8, &str, &Location) {
        (self.kind.push_priority(), &self.name, &self.location)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind, self.location, self.name)
    }
}

/// Parse error for the `kind:location:name` CLI selector form.
#[derive(Debug, thiserror::Error)]
#[error("invalid identity selector '{input}': expected kind:location:name")]
pub struct ParseIdentityError {
    pub input: String,
}

impl FromStr for Identity {
    type Err = ParseIdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let (Some(kind), Some(location), Some(name)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(ParseIdentityError { input: s.to_owned() });
        };
        let kind = ConfigKind::from_str(kind).map_err(|_| ParseIdentityError {
            input: s.to_owned(),
        })?;
        if name.is_empty() {
            return Err(ParseIdentityError { input: s.to_owned() });
        }
        Ok(Self::new(kind, name, Location::from(location)))
    }
}
