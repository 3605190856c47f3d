//! IP access-control plugin configuration merge.
//!
//! Identity key is the route name; each route carries an address source, an
//! allow/deny mode and a CIDR list.

use std::collections::BTreeMap;

use tracing::debug;

use super::per_route;
use crate::defaults::{ip_acl_default_rule, DEFAULT_ROUTE_NAME};
use crate::wire::{IpAclDocument, IpRule};

fn flatten(doc: &IpAclDocument) -> Vec<(String, IpRule)> {
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

pub fn merge(current: &IpAclDocument, update: &IpAclDocument, for_disable: bool) -> IpAclDocument {
    let mut map: BTreeMap<String, IpRule> = flatten(current).into_iter().collect();

    for (route, rule) in flatten(update) {
        if for_disable {
            map.remove(&route);
        } else {
            map.insert(route, rule);
        }
    }

    if map.is_empty() {
        map.insert(
            DEFAULT_ROUTE_NAME.to_string(),
            ip_acl_default_rule(DEFAULT_ROUTE_NAME),
        );
    }

    let next = IpAclDocument {
        rules: map.into_values().collect(),
    };
    debug!(rules = next.rules.len(), "merged ip-access configuration");
    next
}
