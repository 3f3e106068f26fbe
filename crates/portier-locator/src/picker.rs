use rand::seq::SliceRandom;

/// Client-side selection among the addresses a locator returned.
pub trait EndpointPicker: Send + Sync {
    /// Pick one address, or `None` when the list is empty.
    fn pick<'a>(&self, addresses: &'a [String]) -> Option<&'a str>;
}

/// Uniform random choice
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPicker;

impl EndpointPicker for RandomPicker {
    fn pick<'a>(&self, addresses: &'a [String]) -> Option<&'a str> {
        addresses.choose(&mut rand::thread_rng()).map(String::as_str)
    }
}

/// Always the first address. Deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstPicker;

impl EndpointPicker for FirstPicker {
    fn pick<'a>(&self, addresses: &'a [String]) -> Option<&'a str> {
        addresses.first().map(String::as_str)
    }
}
