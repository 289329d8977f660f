/// The six tunables the core exposes (§6). Everything else — algorithm
/// choice, message framing, KDF construction — is fixed by the protocol
/// and not configurable.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub min_padding_request: u16,
    pub max_padding_request: u16,
    pub min_padding_created: u16,
    pub max_padding_created: u16,
    pub min_padding_confirmed: u16,
    pub max_padding_confirmed: u16,
    pub clock_skew_tolerance_seconds: u32,
    pub blacklist_duration_seconds: u64,
}

/// A single invalid bound, named so `Config::new`'s caller can tell which
/// pair was wrong.
#[derive(Clone, Copy, PartialEq, Eq, Debug, thiserror::Error)]
#[error("{field}: min ({min}) must not exceed max ({max})")]
pub struct InvalidConfig {
    pub field: &'static str,
    pub min: u16,
    pub max: u16,
}

impl Config {
    pub fn new(
        min_padding_request: u16,
        max_padding_request: u16,
        min_padding_created: u16,
        max_padding_created: u16,
        min_padding_confirmed: u16,
        max_padding_confirmed: u16,
        clock_skew_tolerance_seconds: u32,
        blacklist_duration_seconds: u64,
    ) -> Result<Self, InvalidConfig> {
        let pairs = [
            ("padding_request", min_padding_request, max_padding_request),
            ("padding_created", min_padding_created, max_padding_created),
            ("padding_confirmed", min_padding_confirmed, max_padding_confirmed),
        ];
        for (field, min, max) in pairs {
            if min > max {
                return Err(InvalidConfig { field, min, max });
            }
        }

        Ok(Self {
            min_padding_request,
            max_padding_request,
            min_padding_created,
            max_padding_created,
            min_padding_confirmed,
            max_padding_confirmed,
            clock_skew_tolerance_seconds,
            blacklist_duration_seconds,
        })
    }
}

impl Default for Config {
    /// Matches the bounds `original_source/` pins for a router with no
    /// overridden transport options.
    fn default() -> Self {
        Self::new(0, 64, 0, 64, 0, 64, 60, 600).expect("default bounds are internally consistent")
    }
}
