//! Spec comparison used to decide whether an immutable object changed
//!
//! The desired object is rendered from a cluster description and sets only
//! the fields it has an opinion on; the live object carries defaults filled
//! in by webhooks and controllers. [`derivative_eq`] therefore treats unset
//! values on the desired side as "no opinion". That rule is wrong for a few
//! fields where clearing a value is itself a change (taints, kubelet args,
//! snow devices); those get explicit comparisons before falling back to it.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::api::{KubeadmConfigTemplate, NodeRegistrationOptions, Taint};

/// Whether `new` is satisfied by `old`
///
/// * null, `""`, `[]` and `{}` in `new` match anything
/// * arrays match element-wise; `old` may be longer
/// * objects match when every key of `new` matches the same key of `old`
/// * everything else compares exactly
pub fn derivative_eq(new: &Value, old: &Value) -> bool {
    match new {
        Value::Null => true,
        Value::String(s) if s.is_empty() => true,
        Value::Array(items) if items.is_empty() => true,
        Value::Object(map) if map.is_empty() => true,
        Value::Array(items) => match old {
            Value::Array(old_items) => {
                items.len() <= old_items.len()
                    && items.iter().zip(old_items).all(|(n, o)| derivative_eq(n, o))
            }
            _ => false,
        },
        Value::Object(map) => match old {
            Value::Object(old_map) => map
                .iter()
                .all(|(key, value)| derivative_eq(value, old_map.get(key).unwrap_or(&Value::Null))),
            _ => false,
        },
        _ => new == old,
    }
}

/// [`derivative_eq`] over two serializable specs
///
/// A spec that fails to serialize counts as changed.
pub fn spec_derivative_eq<S: Serialize>(new: &S, old: &S) -> bool {
    match (serde_json::to_value(new), serde_json::to_value(old)) {
        (Ok(new), Ok(old)) => derivative_eq(&new, &old),
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "spec does not serialize, treating as changed");
            false
        }
    }
}

/// Taint sets are equal when both are unset or both hold the same taints
///
/// An explicitly empty list differs from an unset one: it clears taints on
/// the nodes. Order is ignored, an empty value equals an unset one and
/// `timeAdded` is not compared, since the API server stamps it on live taints.
pub fn taints_equal(new: Option<&[Taint]>, old: Option<&[Taint]>) -> bool {
    match (new, old) {
        (None, None) => true,
        (Some(new), Some(old)) => new.len() == old.len() && sorted_taints(new) == sorted_taints(old),
        _ => false,
    }
}

fn sorted_taints(taints: &[Taint]) -> Vec<(&str, &str, &str)> {
    let mut keys: Vec<_> = taints
        .iter()
        .map(|t| (t.key.as_str(), t.value.as_deref().unwrap_or(""), t.effect.as_str()))
        .collect();
    keys.sort_unstable();
    keys
}

fn node_registration(kct: &KubeadmConfigTemplate) -> Option<&NodeRegistrationOptions> {
    kct.spec
        .template
        .spec
        .join_configuration
        .as_ref()
        .map(|join| &join.node_registration)
}

/// Whether a KubeadmConfigTemplate can be kept
///
/// Taints and kubelet extra args (which carry node labels) compare exactly;
/// the rest of the spec compares derivatively.
pub fn kubeadm_config_template_equal(new: &KubeadmConfigTemplate, old: &KubeadmConfigTemplate) -> bool {
    let new_registration = node_registration(new);
    let old_registration = node_registration(old);

    let new_taints = new_registration.and_then(|r| r.taints.as_deref());
    let old_taints = old_registration.and_then(|r| r.taints.as_deref());
    if !taints_equal(new_taints, old_taints) {
        return false;
    }

    let new_args = new_registration.and_then(|r| r.kubelet_extra_args.as_ref());
    let old_args = old_registration.and_then(|r| r.kubelet_extra_args.as_ref());
    if new_args != old_args {
        return false;
    }

    spec_derivative_eq(&new.spec, &old.spec)
}
