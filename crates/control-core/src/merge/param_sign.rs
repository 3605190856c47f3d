//! parameter-signature-auth plugin configuration merge.
//!
//! There is no global consumer list: every rule embeds the consumers allowed
//! through its route, plus two request-validation knobs. The knobs merge
//! upward only; once a limit has been raised, an unrelated update can never
//! silently lower it.

use std::collections::BTreeMap;

use tracing::debug;

use super::{max_knob, per_route};
use crate::defaults::{param_sign_default_rule, DEFAULT_CONSUMER_NAME, DEFAULT_ROUTE_NAME};
use crate::wire::{ParamSignDocument, ParamSignRule};

fn flatten(doc: &ParamSignDocument) -> Vec<(String, ParamSignRule)> {
    per_route(
        &doc.rules,
        |rule| &rule.match_route,
        |rule, route| {
            let mut rule = rule.clone();
            rule.match_route = vec![route.to_string()];
            rule
        },
    )
}

fn placeholder_only(rule: &ParamSignRule) -> bool {
    rule.consumers.len() == 1 && rule.consumers[0].name == DEFAULT_CONSUMER_NAME
}

fn rebuild(map: BTreeMap<String, ParamSignRule>) -> ParamSignDocument {
    let rules = map
        .into_values()
        .map(|mut rule| {
            rule.consumers.sort_by(|a, b| a.name.cmp(&b.name));
            rule
        })
        .collect();
    ParamSignDocument { rules }
}

pub fn merge(
    current: &ParamSignDocument,
    update: &ParamSignDocument,
    for_disable: bool,
) -> ParamSignDocument {
    let mut map: BTreeMap<String, ParamSignRule> = flatten(current).into_iter().collect();

    for (route, mut rule) in flatten(update) {
        // An empty consumer list is an explicit removal, as is disabling.
        if for_disable || rule.consumers.is_empty() {
            map.remove(&route);
            continue;
        }
        if route != DEFAULT_ROUTE_NAME && placeholder_only(&rule) {
            // No real grant left for this route.
            map.remove(&route);
            continue;
        }
        if let Some(existing) = map.get(&route) {
            rule.request_body_size_limit =
                max_knob(existing.request_body_size_limit, rule.request_body_size_limit);
            rule.date_offset = max_knob(existing.date_offset, rule.date_offset);
        }
        map.insert(route, rule);
    }

    if map.is_empty() {
        map.insert(
            DEFAULT_ROUTE_NAME.to_string(),
            param_sign_default_rule(DEFAULT_ROUTE_NAME),
        );
    }

    let next = rebuild(map);
    debug!(rules = next.rules.len(), "merged para-sign-auth configuration");
    next
}

/// Drop one consumer from every route's embedded list; routes left with no
/// consumers disappear.
pub fn remove_consumer(current: &ParamSignDocument, consumer_name: &str) -> ParamSignDocument {
    let mut map: BTreeMap<String, ParamSignRule> = BTreeMap::new();
    for (route, mut rule) in flatten(current) {
        rule.consumers.retain(|c| c.name != consumer_name);
        if !rule.consumers.is_empty() {
            map.insert(route, rule);
        }
    }
    if map.is_empty() {
        map.insert(
            DEFAULT_ROUTE_NAME.to_string(),
            param_sign_default_rule(DEFAULT_ROUTE_NAME),
        );
    }
    rebuild(map)
}

/// Drop the consumer entries whose key matches one credential; routes whose
/// embedded list empties disappear.
pub fn remove_credential(current: &ParamSignDocument, credential_key: &str) -> ParamSignDocument {
    let mut map: BTreeMap<String, ParamSignRule> = BTreeMap::new();
    for (route, mut rule) in flatten(current) {
        rule.consumers
            .retain(|c| c.key.as_deref() != Some(credential_key));
        if !rule.consumers.is_empty() {
            map.insert(route, rule);
        }
    }
    if map.is_empty() {
        map.insert(
            DEFAULT_ROUTE_NAME.to_string(),
            param_sign_default_rule(DEFAULT_ROUTE_NAME),
        );
    }
    rebuild(map)
}
