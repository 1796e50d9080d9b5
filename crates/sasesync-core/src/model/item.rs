// ── Configuration items and reference fields ──
//
// A ConfigItem carries its identity plus an opaque JSON payload. The
// engine interprets only the payload subset that constitutes
// references, located by FieldPath.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::identity::{ConfigKind, Identity, Location};

// ── ConfigItem ──────────────────────────────────────────────────────

/// One configuration resource instance from a snapshot.
///
/// `fields` is the raw payload as captured; the engine never interprets
/// it beyond the kind-specific reference extraction rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigItem {
    pub kind: ConfigKind,
    pub name: String,
    pub location: Location,
    #[serde(default)]
    pub fields: serde_json::Value,
}

impl ConfigItem {
    pub fn new(
        kind: ConfigKind,
        name: impl Into<String>,
        location: Location,
        fields: serde_json::Value,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            location,
            fields,
        }
    }

    pub fn identity(&self) -> Identity {
        Identity::new(self.kind, self.name.clone(), self.location.clone())
    }
}

// ── FieldPath ───────────────────────────────────────────────────────

/// One step into a nested JSON payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Path to a value inside a ConfigItem's `fields`, e.g.
/// `autoKey.ikeGateway[0].name`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.0.push(PathSegment::Key(key.into()));
        self
    }

    pub fn index(mut self, idx: usize) -> Self {
        self.0.push(PathSegment::Index(idx));
        self
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Navigate to the value this path names, if present.
    pub fn lookup<'v>(&self, root: &'v serde_json::Value) -> Option<&'v serde_json::Value> {
        let mut current = root;
        for segment in &self.0 {
            current = match segment {
                PathSegment::Key(k) => current.get(k.as_str())?,
                PathSegment::Index(i) => current.get(*i)?,
            };
        }
        Some(current)
    }

    /// Navigate mutably to the value this path names, if present.
    pub fn lookup_mut<'v>(
        &self,
        root: &'v mut serde_json::Value,
    ) -> Option<&'v mut serde_json::Value> {
        let mut current = root;
        for segment in &self.0 {
            current = match segment {
                PathSegment::Key(k) => current.get_mut(k.as_str())?,
                PathSegment::Index(i) => current.get_mut(*i)?,
            };
        }
        Some(current)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(k) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(k)?;
                }
                PathSegment::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

// ── Reference ───────────────────────────────────────────────────────

/// How a reference value is embedded at its field path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefStyle {
    /// The value at the path is exactly the target name.
    Exact,
    /// The target name appears quoted inside a larger expression
    /// string (HIP profile match expressions).
    Quoted,
}

/// One reference field extracted from a ConfigItem.
///
/// `kinds` is an ordered candidate list: group-member fields may name
/// either a nested group or a leaf object, and the first candidate
/// present in the snapshot wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub path: FieldPath,
    pub kinds: Vec<ConfigKind>,
    pub name: String,
    pub style: RefStyle,
}

impl Reference {
    pub fn exact(path: FieldPath, kind: ConfigKind, name: impl Into<String>) -> Self {
        Self {
            path,
            kinds: vec![kind],
            name: name.into(),
            style: RefStyle::Exact,
        }
    }

    pub fn exact_any(
        path: FieldPath,
        kinds: impl Into<Vec<ConfigKind>>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            path,
            kinds: kinds.into(),
            name: name.into(),
            style: RefStyle::Exact,
        }
    }

    pub fn quoted(path: FieldPath, kind: ConfigKind, name: impl Into<String>) -> Self {
        Self {
            path,
            kinds: vec![kind],
            name: name.into(),
            style: RefStyle::Quoted,
        }
    }

    /// The identity a candidate kind resolves to, given the referencing
    /// item's location. Global kinds resolve globally; container kinds
    /// resolve in the referrer's own container.
    pub fn candidate_identity(&self, kind: ConfigKind, referrer: &Location) -> Identity {
        let location = if kind.is_global() {
            Location::Global
        } else {
            referrer.clone()
        };
        Identity::new(kind, self.name.clone(), location)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_path_displays_nested_form() {
        let path = FieldPath::root()
            .key("autoKey")
            .key("ikeGateway")
            .index(0)
            .key("name");
        assert_eq!(path.to_string(), "autoKey.ikeGateway[0].name");
    }

    #[test]
    fn field_path_lookup_walks_maps_and_arrays() {
        let fields = json!({
            "autoKey": { "ikeGateway": [ { "name": "GW-AWS" } ] }
        });
        let path = FieldPath::root()
            .key("autoKey")
            .key("ikeGateway")
            .index(0)
            .key("name");
        assert_eq!(path.lookup(&fields).unwrap(), "GW-AWS");
        assert!(FieldPath::root().key("missing").lookup(&fields).is_none());
    }

    #[test]
    fn candidate_identity_respects_global_kinds() {
        let branch = Location::container("Branch-A");
        let reference = Reference::exact(
            FieldPath::root().key("ipsecTunnel"),
            ConfigKind::IpsecTunnel,
            "T-AWS",
        );
        let id = reference.candidate_identity(ConfigKind::IpsecTunnel, &branch);
        assert_eq!(id.location, Location::Global);

        let member = Reference::exact(
            FieldPath::root().key("static").index(0),
            ConfigKind::Address,
            "web-1",
        );
        let id = member.candidate_identity(ConfigKind::Address, &branch);
        assert_eq!(id.location, branch);
    }

    #[test]
    fn config_item_serde_round_trip() {
        let item = ConfigItem::new(
            ConfigKind::Address,
            "web-1",
            Location::container("Branch-A"),
            json!({ "name": "web-1", "ipNetmask": "10.0.0.1/32" }),
        );
        let text = serde_json::to_string(&item).unwrap();
        let back: ConfigItem = serde_json::from_str(&text).unwrap();
        assert_eq!(back, item);
        assert_eq!(back.identity().to_string(), "address:Branch-A:web-1");
    }
}
