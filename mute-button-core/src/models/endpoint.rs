use serde::{Deserialize, Serialize};

/// Suffix the host appends to loopback endpoint names.
pub const LOOPBACK_SUFFIX: &str = " [Loopback]";

/// Opaque per-enumeration endpoint identifier.
///
/// Unique within one enumeration pass only; a fresh pass may hand out the
/// same index to a different device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointIndex(pub u32);

/// Data-flow direction of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Capture,
    Playback,
}

/// An audio endpoint as reported by the host during enumeration.
///
/// Frozen once enumerated. Backends construct it through [`Endpoint::new`],
/// which rejects records that cannot describe a usable stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    index: EndpointIndex,
    host_id: String,
    name: String,
    direction: Direction,
    is_loopback: bool,
    max_input_channels: u16,
    max_output_channels: u16,
    default_sample_rate: u32,
}

/// Raw endpoint fields handed over by a backend.
#[derive(Debug, Clone)]
pub struct EndpointInfo {
    pub index: EndpointIndex,
    pub host_id: String,
    pub name: String,
    pub direction: Direction,
    pub is_loopback: bool,
    pub max_input_channels: u16,
    pub max_output_channels: u16,
    pub default_sample_rate: u32,
}

impl Endpoint {
    /// Validate raw backend data into an endpoint.
    ///
    /// Returns `None` for records with a zero sample rate or no channels in
    /// either direction.
    pub fn new(info: EndpointInfo) -> Option<Self> {
        if info.default_sample_rate == 0 {
            return None;
        }
        if info.max_input_channels == 0 && info.max_output_channels == 0 {
            return None;
        }
        Some(Self {
            index: info.index,
            host_id: info.host_id,
            name: info.name,
            direction: info.direction,
            is_loopback: info.is_loopback,
            max_input_channels: info.max_input_channels,
            max_output_channels: info.max_output_channels,
            default_sample_rate: info.default_sample_rate,
        })
    }

    pub fn index(&self) -> EndpointIndex {
        self.index
    }

    /// Backend-specific identifier used to reopen the device.
    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    /// Raw name as reported by the host.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name shown to the user: the raw name without the loopback suffix.
    pub fn display_name(&self) -> &str {
        if self.is_loopback {
            self.name.strip_suffix(LOOPBACK_SUFFIX).unwrap_or(&self.name)
        } else {
            &self.name
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_loopback(&self) -> bool {
        self.is_loopback
    }

    pub fn max_input_channels(&self) -> u16 {
        self.max_input_channels
    }

    pub fn max_output_channels(&self) -> u16 {
        self.max_output_channels
    }

    pub fn default_sample_rate(&self) -> u32 {
        self.default_sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str, is_loopback: bool) -> EndpointInfo {
        EndpointInfo {
            index: EndpointIndex(3),
            host_id: "{0.0.0.00000000}.{abc}".into(),
            name: name.into(),
            direction: Direction::Capture,
            is_loopback,
            max_input_channels: 2,
            max_output_channels: 0,
            default_sample_rate: 48000,
        }
    }

    #[test]
    fn loopback_display_name_strips_suffix() {
        let ep = Endpoint::new(info("Speakers [Loopback]", true)).unwrap();
        assert_eq!(ep.name(), "Speakers [Loopback]");
        assert_eq!(ep.display_name(), "Speakers");
    }

    #[test]
    fn loopback_without_suffix_keeps_name() {
        let ep = Endpoint::new(info("Virtual Cable", true)).unwrap();
        assert_eq!(ep.display_name(), "Virtual Cable");
    }

    #[test]
    fn non_loopback_never_strips() {
        let ep = Endpoint::new(info("Odd [Loopback]", false)).unwrap();
        assert_eq!(ep.display_name(), "Odd [Loopback]");
    }

    #[test]
    fn rejects_zero_rate_and_channelless_records() {
        let mut zero_rate = info("Mic", false);
        zero_rate.default_sample_rate = 0;
        assert!(Endpoint::new(zero_rate).is_none());

        let mut no_channels = info("Mic", false);
        no_channels.max_input_channels = 0;
        assert!(Endpoint::new(no_channels).is_none());
    }
}
