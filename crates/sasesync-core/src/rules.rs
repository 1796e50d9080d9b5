// ── Reference extraction rules ──
//
// Per-kind extraction of reference fields out of an item's opaque
// payload. The rule table is data: each kind maps to a plain function
// returning a fixed reference schema, and callers may register rules
// for new kinds without touching the graph builder.

use std::collections::HashMap;

use serde_json::Value;

use crate::model::{ConfigItem, ConfigKind, FieldPath, Reference};

/// Extracts the reference list from one item's payload.
pub type ExtractorFn = fn(&ConfigItem) -> Vec<Reference>;

/// Decides whether an item can be recreated at another tenant.
/// Returns a reason string when it cannot.
pub type TransferCheckFn = fn(&ConfigItem) -> Option<String>;

// ── RuleSet ─────────────────────────────────────────────────────────

/// Kind-keyed table of extraction and transferability rules.
pub struct RuleSet {
    extractors: HashMap<ConfigKind, ExtractorFn>,
    transfer_checks: Vec<TransferCheckFn>,
}

impl RuleSet {
    /// Empty table; kinds without a rule yield no references.
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
            transfer_checks: Vec::new(),
        }
    }

    /// The shipped rules for every builtin kind.
    pub fn builtin() -> Self {
        let mut rules = Self::new();
        rules.register(ConfigKind::AddressGroup, extract_address_group);
        rules.register(ConfigKind::ServiceGroup, extract_service_group);
        rules.register(ConfigKind::SecurityRule, extract_security_rule);
        rules.register(ConfigKind::ProfileGroup, extract_profile_group);
        rules.register(ConfigKind::HipProfile, extract_hip_profile);
        rules.register(ConfigKind::IkeGateway, extract_ike_gateway);
        rules.register(ConfigKind::IpsecTunnel, extract_ipsec_tunnel);
        rules.register(ConfigKind::ServiceConnection, extract_service_connection);
        rules.register_transfer_check(federated_auth_check);
        rules.register_transfer_check(federated_flag_check);
        rules
    }

    /// Register (or replace) the extractor for a kind.
    pub fn register(&mut self, kind: ConfigKind, extractor: ExtractorFn) {
        self.extractors.insert(kind, extractor);
    }

    /// Register an additional transferability check.
    pub fn register_transfer_check(&mut self, check: TransferCheckFn) {
        self.transfer_checks.push(check);
    }

    /// Extract every reference the item's kind defines.
    pub fn references(&self, item: &ConfigItem) -> Vec<Reference> {
        self.extractors
            .get(&item.kind)
            .map_or_else(Vec::new, |extract| extract(item))
    }

    /// Why the item cannot be transferred, if any check says so.
    pub fn non_transferable_reason(&self, item: &ConfigItem) -> Option<String> {
        self.transfer_checks.iter().find_map(|check| check(item))
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}

// ── Builtin extractors ──────────────────────────────────────────────

const GROUP_MEMBER_SKIP: &[&str] = &["any"];
const SERVICE_SKIP: &[&str] = &["any", "application-default"];

fn extract_address_group(item: &ConfigItem) -> Vec<Reference> {
    member_list_refs(
        item,
        FieldPath::root().key("static"),
        &[ConfigKind::AddressGroup, ConfigKind::Address],
        GROUP_MEMBER_SKIP,
    )
}

fn extract_service_group(item: &ConfigItem) -> Vec<Reference> {
    member_list_refs(
        item,
        FieldPath::root().key("members"),
        &[ConfigKind::ServiceGroup, ConfigKind::Service],
        SERVICE_SKIP,
    )
}

fn extract_profile_group(item: &ConfigItem) -> Vec<Reference> {
    member_list_refs(
        item,
        FieldPath::root().key("members"),
        &[ConfigKind::ProfileGroup, ConfigKind::SecurityProfile],
        GROUP_MEMBER_SKIP,
    )
}

fn extract_security_rule(item: &ConfigItem) -> Vec<Reference> {
    let mut refs = Vec::new();

    for side in ["source", "destination"] {
        for r in address_list_refs(item, FieldPath::root().key(side)) {
            refs.push(r);
        }
    }

    refs.extend(member_list_refs(
        item,
        FieldPath::root().key("service"),
        &[ConfigKind::ServiceGroup, ConfigKind::Service],
        SERVICE_SKIP,
    ));

    refs.extend(member_list_refs(
        item,
        FieldPath::root().key("profileSetting").key("group"),
        &[ConfigKind::ProfileGroup],
        GROUP_MEMBER_SKIP,
    ));

    for side in ["sourceHip", "destinationHip"] {
        refs.extend(member_list_refs(
            item,
            FieldPath::root().key(side),
            &[ConfigKind::HipProfile],
            GROUP_MEMBER_SKIP,
        ));
    }

    refs
}

fn extract_hip_profile(item: &ConfigItem) -> Vec<Reference> {
    // Match expressions embed object names in quotes:
    //   'corp-av' and ('disk-encrypted' or 'host-fw')
    let path = FieldPath::root().key("match");
    let Some(Value::String(expr)) = path.lookup(&item.fields) else {
        return Vec::new();
    };
    quoted_names(expr)
        .into_iter()
        .map(|name| Reference::quoted(path.clone(), ConfigKind::HipObject, name))
        .collect()
}

fn extract_ike_gateway(item: &ConfigItem) -> Vec<Reference> {
    let mut refs = Vec::new();
    for version in ["ikev1", "ikev2"] {
        let path = FieldPath::root()
            .key("protocol")
            .key(version)
            .key("ikeCryptoProfile");
        if let Some(Value::String(name)) = path.lookup(&item.fields) {
            refs.push(Reference::exact(
                path,
                ConfigKind::IkeCryptoProfile,
                name.clone(),
            ));
        }
    }
    refs
}

fn extract_ipsec_tunnel(item: &ConfigItem) -> Vec<Reference> {
    let mut refs = Vec::new();

    let gateways = FieldPath::root().key("autoKey").key("ikeGateway");
    if let Some(Value::Array(entries)) = gateways.lookup(&item.fields) {
        for (i, entry) in entries.iter().enumerate() {
            if let Some(Value::String(name)) = entry.get("name") {
                refs.push(Reference::exact(
                    gateways.clone().index(i).key("name"),
                    ConfigKind::IkeGateway,
                    name.clone(),
                ));
            }
        }
    }

    let crypto = FieldPath::root().key("autoKey").key("ipsecCryptoProfile");
    if let Some(Value::String(name)) = crypto.lookup(&item.fields) {
        refs.push(Reference::exact(
            crypto,
            ConfigKind::IpsecCryptoProfile,
            name.clone(),
        ));
    }

    refs
}

fn extract_service_connection(item: &ConfigItem) -> Vec<Reference> {
    let path = FieldPath::root().key("ipsecTunnel");
    match path.lookup(&item.fields) {
        Some(Value::String(name)) => vec![Reference::exact(
            path,
            ConfigKind::IpsecTunnel,
            name.clone(),
        )],
        _ => Vec::new(),
    }
}

// ── Transferability checks ──────────────────────────────────────────

/// Authentication profiles backed by a federated identity provider
/// cannot be recreated: their trust anchor lives in the source tenant.
fn federated_auth_check(item: &ConfigItem) -> Option<String> {
    if item.kind != ConfigKind::AuthenticationProfile {
        return None;
    }
    let method = item.fields.get("method")?.as_object()?;
    for federated in ["samlIdp", "cloudIdentity", "oidc"] {
        if method.contains_key(federated) {
            return Some(format!(
                "authentication method '{federated}' is bound to the source tenant's identity provider"
            ));
        }
    }
    None
}

/// Generic escape hatch: snapshots may flag any item as
/// federated-identity-backed.
fn federated_flag_check(item: &ConfigItem) -> Option<String> {
    if item.fields.get("federatedIdentity") == Some(&Value::Bool(true)) {
        Some("item is flagged as federated-identity-backed".to_owned())
    } else {
        None
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// References out of a string-list field, one per entry, skipping the
/// listed keywords.
fn member_list_refs(
    item: &ConfigItem,
    list_path: FieldPath,
    kinds: &[ConfigKind],
    skip: &[&str],
) -> Vec<Reference> {
    let Some(Value::Array(entries)) = list_path.lookup(&item.fields) else {
        return Vec::new();
    };
    entries
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| {
            let name = entry.as_str()?;
            if skip.contains(&name) {
                return None;
            }
            Some(Reference::exact_any(
                list_path.clone().index(i),
                kinds.to_vec(),
                name,
            ))
        })
        .collect()
}

/// Address-valued lists additionally skip raw IP / CIDR / range
/// literals, which are not object references.
fn address_list_refs(item: &ConfigItem, list_path: FieldPath) -> Vec<Reference> {
    let Some(Value::Array(entries)) = list_path.lookup(&item.fields) else {
        return Vec::new();
    };
    entries
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| {
            let name = entry.as_str()?;
            if name == "any" || is_address_literal(name) {
                return None;
            }
            Some(Reference::exact_any(
                list_path.clone().index(i),
                vec![ConfigKind::AddressGroup, ConfigKind::Address],
                name,
            ))
        })
        .collect()
}

fn is_address_literal(value: &str) -> bool {
    if value.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }
    if let Some((net, mask)) = value.split_once('/') {
        return net.parse::<std::net::IpAddr>().is_ok() && mask.parse::<u8>().is_ok();
    }
    if let Some((start, end)) = value.split_once('-') {
        return start.parse::<std::net::IpAddr>().is_ok()
            && end.parse::<std::net::IpAddr>().is_ok();
    }
    false
}

/// Pull every 'single' or "double" quoted name out of a match expression.
fn quoted_names(expr: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut chars = expr.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' || c == '"' {
            let quote = c;
            let mut name = String::new();
            for inner in chars.by_ref() {
                if inner == quote {
                    break;
                }
                name.push(inner);
            }
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}
