//! Channel resolution over a pool of published versions.
//!
//! Resolution works one patch at a time, newest patch first. Within a patch every
//! version is assigned to its native channel and then *propagated* down to every
//! lower-priority channel, so a stable release is also visible on `rc`, `beta`
//! and `alpha`. The first patch whose propagated channel map has an entry for the
//! requested channel wins.
//!
//! Consequences worth keeping in mind:
//!
//! - a stable release dominates every channel at its patch;
//! - a patch that only has an alpha never satisfies `rc` or `stable`;
//! - a newer patch without a qualifying entry never hides an older patch that has one.

use super::{ChannelOrder, Group, ParsedVersion, VersionError};
use semver::{Prerelease, Version};
use std::collections::BTreeMap;
use tracing::debug;

/// Resolve the version visible on `channel` for the `group` release line.
///
/// Returns `Ok(None)` when no published version satisfies the request. Errors
/// are reserved for malformed input: an unparsable group, an unknown channel or
/// an unparsable candidate version.
///
/// # Examples
///
/// ```rust
/// use multiwerf::version::{ChannelOrder, resolve};
///
/// let available: Vec<String> = ["1.1.0-alpha.1", "1.1.0-beta.1", "1.1.0-rc.1", "1.1.0", "1.1.1-alpha.1"]
///     .iter()
///     .map(ToString::to_string)
///     .collect();
/// let order = ChannelOrder::default();
///
/// assert_eq!(resolve("1.1", "alpha", &available, &order).unwrap().as_deref(), Some("1.1.1-alpha.1"));
/// assert_eq!(resolve("1.1", "stable", &available, &order).unwrap().as_deref(), Some("1.1.0"));
/// assert_eq!(resolve("1.2", "stable", &available, &order).unwrap(), None);
/// ```
pub fn resolve(
    group: &str,
    channel: &str,
    available: &[String],
    order: &ChannelOrder,
) -> Result<Option<String>, VersionError> {
    let group = Group::parse(group)?;
    let channel = order.parse_channel(channel)?;
    let requested = order.index_of(&channel).ok_or_else(|| VersionError::UnknownChannel {
        name: channel.name().to_string(),
        known: order.names().join(", "),
    })?;

    let mut by_patch: BTreeMap<u64, Vec<ParsedVersion>> = BTreeMap::new();
    for text in available {
        let version = ParsedVersion::parse(text)?;
        if version.in_group(&group) {
            by_patch.entry(version.patch()).or_default().push(version);
        }
    }

    for (patch, versions) in by_patch.iter().rev() {
        let map = channel_map(versions, order)?;
        if let Some(version) = map[requested] {
            debug!(%group, %channel, patch, version = %version, "Resolved channel version");
            return Ok(Some(version.original().to_string()));
        }
        debug!(%group, %channel, patch, "No version for channel at patch");
    }

    Ok(None)
}

/// Build the propagated channel map for the versions of a single patch.
///
/// Slot `i` holds the version visible on the `i`-th channel of `order`.
fn channel_map<'a>(
    versions: &'a [ParsedVersion],
    order: &ChannelOrder,
) -> Result<Vec<Option<&'a ParsedVersion>>, VersionError> {
    let mut keyed = Vec::with_capacity(versions.len());
    for version in versions {
        // A prerelease no channel recognizes is invisible on every channel.
        let Some(native) = order.native_index(version) else {
            continue;
        };
        keyed.push((sort_key(version, native)?, native, version));
    }

    keyed.sort_by(|a, b| a.0.cmp_precedence(&b.0));

    let mut map = vec![None; order.len()];
    for (_, native, version) in keyed {
        for slot in map.iter_mut().take(native + 1) {
            *slot = Some(version);
        }
    }
    Ok(map)
}

/// Sort key placing prereleases in channel priority order below the stable release.
///
/// The prerelease label is prefixed with the one-based channel index, so
/// `alpha.1` becomes `1.alpha.1` and `rc.1` becomes `3.rc.1`.
fn sort_key(version: &ParsedVersion, native: usize) -> Result<Version, VersionError> {
    let mut key = version.semver().clone();
    if version.is_stable() {
        return Ok(key);
    }

    let label = format!("{}.{}", native + 1, version.prerelease());
    key.pre = Prerelease::new(&label).map_err(|source| VersionError::InvalidVersion {
        input: version.original().to_string(),
        source,
    })?;
    Ok(key)
}

/// Return the highest version by semantic version precedence.
///
/// Build metadata does not affect ordering but is preserved in the returned
/// text. Versions with equal precedence are ordered by their text so the result
/// does not depend on input order. Empty input yields `Ok(None)`.
pub fn highest_version(versions: &[String]) -> Result<Option<String>, VersionError> {
    let parsed = versions
        .iter()
        .map(|text| ParsedVersion::parse(text))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(parsed
        .into_iter()
        .max_by(|a, b| a.cmp_precedence(b).then_with(|| a.original().cmp(b.original())))
        .map(|version| version.original().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn versions(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    fn resolve_default(group: &str, channel: &str, items: &[&str]) -> Option<String> {
        resolve(group, channel, &versions(items), &ChannelOrder::default()).unwrap()
    }

    #[test]
    fn test_reference_example() {
        let pool = [
            "1.1.0-alpha.1",
            "1.1.0-beta.1",
            "1.1.0-rc.1",
            "1.1.0",
            "1.1.1-alpha.1",
        ];
        assert_eq!(resolve_default("1.1", "alpha", &pool).as_deref(), Some("1.1.1-alpha.1"));
        assert_eq!(resolve_default("1.1", "beta", &pool).as_deref(), Some("1.1.0"));
        assert_eq!(resolve_default("1.1", "rc", &pool).as_deref(), Some("1.1.0"));
        assert_eq!(resolve_default("1.1", "stable", &pool).as_deref(), Some("1.1.0"));
    }

    #[test]
    fn test_stable_dominates_every_channel_at_its_patch() {
        let pool = ["1.2.3-alpha.5", "1.2.3-beta.2", "1.2.3-rc.9", "1.2.3"];
        for channel in ["alpha", "beta", "rc", "stable"] {
            assert_eq!(resolve_default("1.2", channel, &pool).as_deref(), Some("1.2.3"), "{channel}");
        }
    }

    #[test]
    fn test_alpha_only_patch() {
        let pool = ["1.3.0-alpha.1"];
        assert_eq!(resolve_default("1.3", "alpha", &pool).as_deref(), Some("1.3.0-alpha.1"));
        assert_eq!(resolve_default("1.3", "beta", &pool), None);
        assert_eq!(resolve_default("1.3", "rc", &pool), None);
        assert_eq!(resolve_default("1.3", "stable", &pool), None);
    }

    #[test]
    fn test_higher_patch_without_channel_does_not_mask_lower_patch() {
        let pool = ["1.1.4", "1.1.5-alpha.1", "1.1.6-beta.1"];
        assert_eq!(resolve_default("1.1", "stable", &pool).as_deref(), Some("1.1.4"));
        assert_eq!(resolve_default("1.1", "rc", &pool).as_deref(), Some("1.1.4"));
        assert_eq!(resolve_default("1.1", "beta", &pool).as_deref(), Some("1.1.6-beta.1"));
        assert_eq!(resolve_default("1.1", "alpha", &pool).as_deref(), Some("1.1.6-beta.1"));
    }

    #[test]
    fn test_prefers_highest_qualifying_patch() {
        let pool = ["1.1.1", "1.1.2", "1.1.10", "1.1.3"];
        assert_eq!(resolve_default("1.1", "stable", &pool).as_deref(), Some("1.1.10"));
    }

    #[test]
    fn test_never_leaves_group() {
        let pool = ["1.0.9", "1.2.0", "2.1.0", "0.1.0"];
        assert_eq!(resolve_default("1.1", "alpha", &pool), None);
        assert_eq!(resolve_default("1.0", "alpha", &pool).as_deref(), Some("1.0.9"));
    }

    #[test]
    fn test_latest_prerelease_within_channel() {
        let pool = ["1.1.0-beta.1", "1.1.0-beta.2", "1.1.0-beta.10"];
        assert_eq!(resolve_default("1.1", "beta", &pool).as_deref(), Some("1.1.0-beta.10"));
    }

    #[test]
    fn test_rc_propagates_to_lower_channels_only() {
        let pool = ["1.1.0-alpha.3", "1.1.0-rc.1"];
        assert_eq!(resolve_default("1.1", "alpha", &pool).as_deref(), Some("1.1.0-rc.1"));
        assert_eq!(resolve_default("1.1", "beta", &pool).as_deref(), Some("1.1.0-rc.1"));
        assert_eq!(resolve_default("1.1", "rc", &pool).as_deref(), Some("1.1.0-rc.1"));
        assert_eq!(resolve_default("1.1", "stable", &pool), None);
    }

    #[test]
    fn test_unknown_prerelease_is_ignored() {
        let pool = ["1.1.0-nightly.1", "1.1.0-alpha.1"];
        assert_eq!(resolve_default("1.1", "alpha", &pool).as_deref(), Some("1.1.0-alpha.1"));
    }

    #[test]
    fn test_preserves_original_text() {
        let pool = ["v1.1.0+linux"];
        assert_eq!(resolve_default("1.1", "stable", &pool).as_deref(), Some("v1.1.0+linux"));
    }

    #[test]
    fn test_errors_on_bad_input() {
        let order = ChannelOrder::default();
        assert!(resolve("1", "stable", &versions(&["1.1.0"]), &order).is_err());
        assert!(resolve("1.1", "nightly", &versions(&["1.1.0"]), &order).is_err());
        assert!(resolve("1.1", "stable", &versions(&["1.1.0", "garbage"]), &order).is_err());
    }

    #[test]
    fn test_empty_pool_is_not_found() {
        assert_eq!(resolve_default("1.1", "stable", &[]), None);
    }

    #[test]
    fn test_custom_channel_order() {
        let order = ChannelOrder::new(["ea", "stable"]).unwrap();
        let pool = versions(&["2.0.0-ea.1", "2.0.0-alpha.1"]);
        assert_eq!(
            resolve("2.0", "ea", &pool, &order).unwrap().as_deref(),
            Some("2.0.0-ea.1")
        );
        assert_eq!(resolve("2.0", "stable", &pool, &order).unwrap(), None);
    }

    #[test]
    fn test_highest_version() {
        let pool = versions(&["1.0.0", "1.10.0-rc.1", "1.2.0", "1.10.0-beta.3"]);
        assert_eq!(highest_version(&pool).unwrap().as_deref(), Some("1.10.0-rc.1"));
        assert_eq!(highest_version(&[]).unwrap(), None);
        assert!(highest_version(&versions(&["1.0.0", "oops"])).is_err());
    }

    #[test]
    fn test_highest_version_is_order_independent() {
        let forward = versions(&["1.0.0+b", "0.9.0", "1.0.0+a", "1.0.0-rc.1"]);
        let mut backward = forward.clone();
        backward.reverse();

        let a = highest_version(&forward).unwrap();
        let b = highest_version(&backward).unwrap();
        assert_eq!(a, b);
        assert!(a.unwrap().starts_with("1.0.0+"));
    }

    #[test]
    fn test_highest_version_keeps_build_metadata() {
        let pool = versions(&["1.0.0", "1.0.1+20240101"]);
        assert_eq!(highest_version(&pool).unwrap().as_deref(), Some("1.0.1+20240101"));
    }
}
