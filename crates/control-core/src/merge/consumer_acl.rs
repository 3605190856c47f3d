//! Shared algorithm for the consumer-allow-list merge family.
//!
//! key-auth and hmac-auth documents have the same shape (a global
//! `consumers` list plus per-route `allow` rules) and differ only in which
//! field of a consumer entry carries the identifying credential value. The
//! per-plugin modules wrap this implementation with their identity choice
//! and any plugin-specific top-level fields.

use std::collections::{BTreeMap, BTreeSet};

use crate::consumer::PluginKind;
use crate::defaults::{
    default_consumer_entry, DEFAULT_CONSUMER_CREDENTIAL, DEFAULT_CONSUMER_NAME, DEFAULT_ROUTE_NAME,
};
use crate::wire::{AclRule, ConsumerAclDocument, ConsumerEntry};
use crate::{ControlError, Result};

/// Which field of a consumer entry identifies it for this plugin.
#[derive(Debug, Clone, Copy)]
pub(crate) enum AclIdentity {
    /// key-auth: the bare credential string.
    Credential,
    /// hmac-auth: the key of the key/secret pair.
    Key,
}

impl AclIdentity {
    fn of<'a>(&self, entry: &'a ConsumerEntry) -> Option<&'a str> {
        match self {
            AclIdentity::Credential => entry.credential.as_deref(),
            AclIdentity::Key => entry.key.as_deref(),
        }
    }

    fn placeholder_entry(&self) -> ConsumerEntry {
        match self {
            AclIdentity::Credential => default_consumer_entry(PluginKind::KeyAuth),
            AclIdentity::Key => default_consumer_entry(PluginKind::HmacAuth),
        }
    }
}

/// Map-shaped intermediate: `credential value → consumer entry` and
/// `route → allowed consumer names`.
struct Flattened {
    consumers: BTreeMap<String, ConsumerEntry>,
    routes: BTreeMap<String, BTreeSet<String>>,
}

fn flatten(doc: &ConsumerAclDocument, identity: AclIdentity) -> Flattened {
    let mut consumers = BTreeMap::new();
    for entry in &doc.consumers {
        // An entry without identity material cannot be addressed; ignore it
        // rather than failing the whole document.
        if let Some(value) = identity.of(entry) {
            consumers.insert(value.to_string(), entry.clone());
        }
    }

    let mut routes: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for rule in &doc.rules {
        for route in &rule.match_route {
            routes
                .entry(route.clone())
                .or_default()
                .extend(rule.allow.iter().cloned());
        }
    }

    Flattened { consumers, routes }
}

fn rebuild(flat: Flattened) -> ConsumerAclDocument {
    let mut consumers: Vec<ConsumerEntry> = flat.consumers.into_values().collect();
    consumers.sort_by(|a, b| {
        (&a.name, &a.credential, &a.key).cmp(&(&b.name, &b.credential, &b.key))
    });

    let rules = flat
        .routes
        .into_iter()
        .map(|(route, allow)| AclRule {
            match_route: vec![route],
            allow: allow.into_iter().collect(),
        })
        .collect();

    ConsumerAclDocument {
        consumers,
        rules,
        ..ConsumerAclDocument::default()
    }
}

/// Normalization every result goes through: the sentinel consumer/route pair
/// is always present, and a non-default route granted to nobody (or to the
/// sentinel alone) is not emitted.
fn normalize(flat: &mut Flattened, identity: AclIdentity) {
    let has_placeholder = flat
        .consumers
        .values()
        .any(|entry| entry.name == DEFAULT_CONSUMER_NAME);
    if !has_placeholder {
        flat.consumers.insert(
            DEFAULT_CONSUMER_CREDENTIAL.to_string(),
            identity.placeholder_entry(),
        );
    }

    flat.routes
        .entry(DEFAULT_ROUTE_NAME.to_string())
        .or_default()
        .insert(DEFAULT_CONSUMER_NAME.to_string());

    flat.routes.retain(|route, allow| {
        route.as_str() == DEFAULT_ROUTE_NAME
            || !(allow.is_empty() || (allow.len() == 1 && allow.contains(DEFAULT_CONSUMER_NAME)))
    });
}

/// Drop consumer entries that no remaining route allows. The sentinel is
/// exempt; `normalize` re-seats it anyway.
fn collect_garbage(flat: &mut Flattened) {
    let referenced: BTreeSet<String> = flat
        .routes
        .values()
        .flat_map(|allow| allow.iter().cloned())
        .collect();
    flat.consumers
        .retain(|_, entry| entry.name == DEFAULT_CONSUMER_NAME || referenced.contains(&entry.name));
}

pub(crate) fn merge(
    current: &ConsumerAclDocument,
    update: &ConsumerAclDocument,
    identity: AclIdentity,
) -> Result<ConsumerAclDocument> {
    let mut cur = flatten(current, identity);
    let upd = flatten(update, identity);

    // One credential value can only ever belong to one consumer identity.
    for (value, entry) in upd.consumers {
        match cur.consumers.get(&value) {
            Some(existing) if existing.name != entry.name => {
                return Err(ControlError::CredentialConflict {
                    credential: value,
                    existing: existing.name.clone(),
                    incoming: entry.name,
                });
            }
            _ => {
                cur.consumers.insert(value, entry);
            }
        }
    }

    // The update is authoritative for every route it names; routes it does
    // not name keep their current allow-list verbatim.
    for (route, allow) in upd.routes {
        cur.routes.insert(route, allow);
    }

    collect_garbage(&mut cur);
    normalize(&mut cur, identity);

    Ok(rebuild(cur))
}

/// Remove one consumer from every route's allow-list and from the global
/// consumer list, dropping routes that end up with no grants.
pub(crate) fn remove_consumer(
    current: &ConsumerAclDocument,
    consumer_name: &str,
    identity: AclIdentity,
) -> ConsumerAclDocument {
    let mut cur = flatten(current, identity);

    cur.consumers.retain(|_, entry| entry.name != consumer_name);
    for allow in cur.routes.values_mut() {
        allow.remove(consumer_name);
    }

    normalize(&mut cur, identity);
    rebuild(cur)
}

/// Remove the consumer entry carrying one credential value. Allow-lists are
/// left alone: the consumer identity may still hold other credentials or be
/// re-issued one, and a dangling allow name grants nothing by itself.
pub(crate) fn remove_credential(
    current: &ConsumerAclDocument,
    credential_value: &str,
    identity: AclIdentity,
) -> ConsumerAclDocument {
    let mut cur = flatten(current, identity);
    cur.consumers
        .retain(|value, _| value.as_str() != credential_value);
    normalize(&mut cur, identity);
    rebuild(cur)
}
