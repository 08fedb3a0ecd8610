use std::fmt;

/// What a multi-range descriptor copy does when the source side holds more
/// descriptors than the destination ranges can take.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum DescriptorCopyPolicy {
    /// Copy until the destination ranges run out, warn, drop the rest.
    #[default]
    Permissive,
    /// Treat the mismatch as a desync and panic.
    Strict,
}

impl fmt::Display for DescriptorCopyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DescriptorCopyPolicy::Permissive => "Permissive",
            DescriptorCopyPolicy::Strict => "Strict",
        };
        f.write_str(s)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct TrackerConfig {
    pub descriptor_copy_policy: DescriptorCopyPolicy,
    /// Whether table resolution skips heap slots already attributed to another
    /// root parameter.
    pub check_retrieved: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            descriptor_copy_policy: DescriptorCopyPolicy::Permissive,
            check_retrieved: true,
        }
    }
}

impl TrackerConfig {
    pub fn descriptor_copy_policy(mut self, policy: DescriptorCopyPolicy) -> Self {
        self.descriptor_copy_policy = policy;
        self
    }

    pub fn check_retrieved(mut self, check: bool) -> Self {
        self.check_retrieved = check;
        self
    }
}
