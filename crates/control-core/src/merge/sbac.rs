//! Policy-based access-control (SBAC) plugin configuration merge.
//!
//! Identity key is the route name; each route carries the access-control
//! endpoint, the methods and path patterns it guards, and the headers
//! forwarded to the decision endpoint.

use std::collections::BTreeMap;

use tracing::debug;

use super::per_route;
use crate::defaults::{sbac_default_rule, DEFAULT_ROUTE_NAME};
use crate::wire::{SbacDocument, SbacRule};

fn flatten(doc: &SbacDocument) -> Vec<(String, SbacRule)> {
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

pub fn merge(current: &SbacDocument, update: &SbacDocument, for_disable: bool) -> SbacDocument {
    let mut map: BTreeMap<String, SbacRule> = flatten(current).into_iter().collect();

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
            sbac_default_rule(DEFAULT_ROUTE_NAME),
        );
    }

    let next = SbacDocument {
        rules: map.into_values().collect(),
    };
    debug!(rules = next.rules.len(), "merged sbac configuration");
    next
}
