use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::endpoint::{Endpoint, EndpointIndex};
use crate::traits::audio_host::AudioHost;

pub const WARNING_NOT_ENOUGH_DEVICES: &str =
    "Not enough audio devices available (capture device and playback device cannot be the same).";
pub const WARNING_SELECT_BOTH: &str = "Select a capture device and a playback device.";
pub const WARNING_SELECT_CAPTURE: &str = "Select a capture device.";
pub const WARNING_SELECT_PLAYBACK: &str = "Select a playback device.";
pub const WARNING_SAME_DEVICE: &str = "Capture device and playback device cannot be the same.";

/// The user's current device choice, by display name. Empty means unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSelection {
    pub loopback_name: String,
    pub playback_name: String,
}

impl RouteSelection {
    pub fn new(loopback_name: impl Into<String>, playback_name: impl Into<String>) -> Self {
        Self {
            loopback_name: loopback_name.into(),
            playback_name: playback_name.into(),
        }
    }

    /// Both names set and different. Says nothing about whether they resolve.
    pub fn is_candidate(&self) -> bool {
        !self.loopback_name.is_empty()
            && !self.playback_name.is_empty()
            && self.loopback_name != self.playback_name
    }
}

/// Immutable snapshot of the host's endpoints, split into loopback and
/// playback sets keyed by display name.
///
/// Name maps keep enumeration order. A repeated name keeps its first
/// position but resolves to the last endpoint enumerated under it.
#[derive(Debug, Clone, Default)]
pub struct DeviceCatalog {
    devices_by_index: BTreeMap<EndpointIndex, Endpoint>,
    loopback_by_name: Vec<(String, EndpointIndex)>,
    playback_by_name: Vec<(String, EndpointIndex)>,
}

impl DeviceCatalog {
    /// Enumerate `host` into a fresh catalog.
    ///
    /// An unavailable host yields an empty catalog rather than an error.
    pub fn enumerate(host: &dyn AudioHost) -> Self {
        let endpoints = match host.enumerate_endpoints() {
            Ok(endpoints) => endpoints,
            Err(e) => {
                log::warn!("Audio device enumeration failed: {}", e);
                Vec::new()
            }
        };
        let catalog = Self::from_endpoints(endpoints);
        log::info!(
            "Found {} loopback device(s) and {} playback device(s)",
            catalog.loopback_by_name.len(),
            catalog.playback_by_name.len()
        );
        catalog
    }

    pub fn from_endpoints(endpoints: impl IntoIterator<Item = Endpoint>) -> Self {
        let mut catalog = Self::default();
        for endpoint in endpoints {
            let index = endpoint.index();
            if endpoint.is_loopback() {
                upsert(&mut catalog.loopback_by_name, endpoint.display_name(), index);
            }
            if endpoint.max_output_channels() > 0 {
                upsert(&mut catalog.playback_by_name, endpoint.name(), index);
            }
            catalog.devices_by_index.insert(index, endpoint);
        }
        catalog
    }

    pub fn loopback_names(&self) -> Vec<String> {
        self.loopback_by_name.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn playback_names(&self) -> Vec<String> {
        self.playback_by_name.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn device(&self, index: EndpointIndex) -> Option<&Endpoint> {
        self.devices_by_index.get(&index)
    }

    pub fn resolve_loopback(&self, display_name: &str) -> Option<&Endpoint> {
        lookup(&self.loopback_by_name, display_name).and_then(|index| self.device(index))
    }

    pub fn resolve_playback(&self, name: &str) -> Option<&Endpoint> {
        lookup(&self.playback_by_name, name).and_then(|index| self.device(index))
    }

    pub fn len(&self) -> usize {
        self.devices_by_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices_by_index.is_empty()
    }

    /// User-facing warning for `selection`, or `""` when it is valid.
    ///
    /// The insufficient-devices check wins over every selection check.
    pub fn device_warning(&self, selection: &RouteSelection) -> &'static str {
        if !self.has_enough_devices() {
            return WARNING_NOT_ENOUGH_DEVICES;
        }
        let loopback = selection.loopback_name.as_str();
        let playback = selection.playback_name.as_str();
        if loopback.is_empty() && playback.is_empty() {
            WARNING_SELECT_BOTH
        } else if loopback.is_empty() {
            WARNING_SELECT_CAPTURE
        } else if playback.is_empty() {
            WARNING_SELECT_PLAYBACK
        } else if loopback == playback {
            WARNING_SAME_DEVICE
        } else {
            ""
        }
    }

    pub fn devices_invalid(&self, selection: &RouteSelection) -> bool {
        !self.device_warning(selection).is_empty()
    }

    /// At least one device on each side and two distinct names overall.
    fn has_enough_devices(&self) -> bool {
        if self.loopback_by_name.is_empty() || self.playback_by_name.is_empty() {
            return false;
        }
        let mut names: Vec<&str> = self
            .loopback_by_name
            .iter()
            .chain(&self.playback_by_name)
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names.dedup();
        names.len() >= 2
    }
}

fn upsert(entries: &mut Vec<(String, EndpointIndex)>, name: &str, index: EndpointIndex) {
    match entries.iter_mut().find(|(existing, _)| existing == name) {
        Some(entry) => entry.1 = index,
        None => entries.push((name.to_string(), index)),
    }
}

fn lookup(entries: &[(String, EndpointIndex)], name: &str) -> Option<EndpointIndex> {
    entries
        .iter()
        .find(|(existing, _)| existing == name)
        .map(|(_, index)| *index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{capture_endpoint, loopback_endpoint, playback_endpoint, MockHost};

    fn default_catalog() -> DeviceCatalog {
        DeviceCatalog::enumerate(&MockHost::with_default_devices())
    }

    #[test]
    fn partitions_loopback_and_playback() {
        let catalog = default_catalog();
        assert_eq!(catalog.loopback_names(), vec!["Speakers", "Headphones"]);
        assert_eq!(catalog.playback_names(), vec!["Speakers", "Headphones"]);
        assert_eq!(catalog.len(), 5);

        let loopback = catalog.resolve_loopback("Speakers").unwrap();
        assert!(loopback.is_loopback());
        assert_eq!(loopback.name(), "Speakers [Loopback]");

        let playback = catalog.resolve_playback("Speakers").unwrap();
        assert!(!playback.is_loopback());
        assert!(catalog.resolve_playback("Microphone").is_none());
        assert!(catalog.resolve_loopback("Microphone").is_none());
    }

    #[test]
    fn names_keep_enumeration_order() {
        let catalog = DeviceCatalog::from_endpoints(vec![
            playback_endpoint(0, "Zeta", 2, 48000),
            playback_endpoint(1, "Alpha", 2, 48000),
            loopback_endpoint(2, "Zeta", 2, 48000),
            loopback_endpoint(3, "Alpha", 2, 48000),
        ]);
        assert_eq!(catalog.playback_names(), vec!["Zeta", "Alpha"]);
        assert_eq!(catalog.loopback_names(), vec!["Zeta", "Alpha"]);
    }

    #[test]
    fn duplicate_names_resolve_to_last() {
        let catalog = DeviceCatalog::from_endpoints(vec![
            playback_endpoint(0, "USB Audio", 2, 48000),
            playback_endpoint(1, "USB Audio", 2, 44100),
        ]);
        assert_eq!(catalog.playback_names(), vec!["USB Audio"]);
        assert_eq!(catalog.resolve_playback("USB Audio").unwrap().index(), EndpointIndex(1));
    }

    #[test]
    fn unavailable_host_gives_empty_catalog() {
        let host = MockHost::with_default_devices();
        host.set_unavailable(true);
        let catalog = DeviceCatalog::enumerate(&host);
        assert!(catalog.is_empty());
        assert_eq!(catalog.device_warning(&RouteSelection::default()), WARNING_NOT_ENOUGH_DEVICES);
    }

    #[test]
    fn warning_precedence() {
        let catalog = default_catalog();
        let cases = [
            (RouteSelection::new("", ""), WARNING_SELECT_BOTH),
            (RouteSelection::new("", "Headphones"), WARNING_SELECT_CAPTURE),
            (RouteSelection::new("Speakers", ""), WARNING_SELECT_PLAYBACK),
            (RouteSelection::new("Speakers", "Speakers"), WARNING_SAME_DEVICE),
            (RouteSelection::new("Speakers", "Headphones"), ""),
        ];
        for (selection, expected) in cases {
            assert_eq!(catalog.device_warning(&selection), expected, "{selection:?}");
            assert_eq!(catalog.devices_invalid(&selection), !expected.is_empty());
        }
    }

    #[test]
    fn not_enough_devices_beats_every_selection_check() {
        // one loopback and one playback sharing a single name
        let single = DeviceCatalog::from_endpoints(vec![
            playback_endpoint(0, "Speakers", 2, 48000),
            loopback_endpoint(1, "Speakers", 2, 48000),
        ]);
        // playback devices only
        let no_loopback = DeviceCatalog::from_endpoints(vec![
            playback_endpoint(0, "Speakers", 2, 48000),
            playback_endpoint(1, "Headphones", 2, 48000),
            capture_endpoint(2, "Microphone", 1, 16000),
        ]);

        for catalog in [single, no_loopback, DeviceCatalog::default()] {
            for selection in [
                RouteSelection::new("", ""),
                RouteSelection::new("Speakers", ""),
                RouteSelection::new("", "Speakers"),
                RouteSelection::new("Speakers", "Speakers"),
                RouteSelection::new("Speakers", "Headphones"),
            ] {
                assert_eq!(catalog.device_warning(&selection), WARNING_NOT_ENOUGH_DEVICES);
            }
        }
    }

    #[test]
    fn valid_warning_does_not_require_resolution() {
        let catalog = default_catalog();
        let selection = RouteSelection::new("Ghost", "Headphones");
        assert_eq!(catalog.device_warning(&selection), "");
        assert!(catalog.resolve_loopback("Ghost").is_none());
    }

    #[test]
    fn selection_candidate() {
        assert!(RouteSelection::new("a", "b").is_candidate());
        assert!(!RouteSelection::new("a", "a").is_candidate());
        assert!(!RouteSelection::new("", "b").is_candidate());
        assert!(!RouteSelection::default().is_candidate());
    }
}
