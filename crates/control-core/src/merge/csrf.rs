//! CSRF-protection plugin configuration merge.
//!
//! Identity key is the route name; each route carries one embedded settings
//! record (cookie names, excluded methods, token TTLs).

use std::collections::BTreeMap;

use tracing::debug;

use super::per_route;
use crate::defaults::{csrf_default_rule, DEFAULT_ROUTE_NAME};
use crate::wire::{CsrfDocument, CsrfRule};

fn flatten(doc: &CsrfDocument) -> Vec<(String, CsrfRule)> {
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

pub fn merge(current: &CsrfDocument, update: &CsrfDocument, for_disable: bool) -> CsrfDocument {
    let mut map: BTreeMap<String, CsrfRule> = flatten(current).into_iter().collect();

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
            csrf_default_rule(DEFAULT_ROUTE_NAME),
        );
    }

    let next = CsrfDocument {
        rules: map.into_values().collect(),
    };
    debug!(rules = next.rules.len(), "merged csrf configuration");
    next
}
