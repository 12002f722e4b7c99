//! Capability Registry
//!
//! The catalog of protocol features an SDK build can advertise, and the set
//! type the scrubber negotiates against.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// == Capability ==
/// A protocol feature an SDK build can correctly interpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    BucketingV2,
    StickyBucketing,
    Prerequisites,
    SavedGroupReferences,
    Redirects,
    LooseUnmarshalling,
}

impl Capability {
    /// Every known capability, in tag-table order.
    pub const ALL: [Capability; 6] = [
        Capability::BucketingV2,
        Capability::StickyBucketing,
        Capability::Prerequisites,
        Capability::SavedGroupReferences,
        Capability::Redirects,
        Capability::LooseUnmarshalling,
    ];

    /// Wire tag advertised by SDKs.
    pub fn tag(self) -> &'static str {
        match self {
            Capability::BucketingV2 => "bucketingV2",
            Capability::StickyBucketing => "stickyBucketing",
            Capability::Prerequisites => "prerequisites",
            Capability::SavedGroupReferences => "savedGroupReferences",
            Capability::Redirects => "redirects",
            Capability::LooseUnmarshalling => "looseUnmarshalling",
        }
    }

    /// Looks up a capability by wire tag. Unknown tags yield None.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.tag() == tag)
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// == Capability Set ==
/// Order-independent set of capabilities, stored as a bitset.
///
/// Tags from newer SDK versions that this build does not know are dropped
/// on construction rather than rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    /// The empty set: a legacy SDK with no negotiated features.
    pub fn empty() -> Self {
        Self(0)
    }

    /// Every capability this build knows about.
    pub fn all() -> Self {
        Self::ALL_CAPS
    }

    const ALL_CAPS: Self = {
        let mut bits = 0u8;
        let mut i = 0;
        while i < Capability::ALL.len() {
            bits |= 1 << (Capability::ALL[i] as u8);
            i += 1;
        }
        Self(bits)
    };

    /// Builds a set from wire tags, ignoring unknown ones.
    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tags.into_iter()
            .filter_map(|tag| Capability::from_tag(tag.as_ref().trim()))
            .collect()
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0 |= capability.bit();
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.insert(capability);
        self
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterates the members in tag-table order.
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(|c| self.contains(*c))
    }

    // == Named Predicates ==

    pub fn supports_bucketing_v2(&self) -> bool {
        self.contains(Capability::BucketingV2)
    }

    pub fn supports_sticky_bucketing(&self) -> bool {
        self.contains(Capability::StickyBucketing)
    }

    pub fn supports_prerequisites(&self) -> bool {
        self.contains(Capability::Prerequisites)
    }

    /// The SDK resolves `$ingroup`/`$ningroup` against shipped id lists itself.
    pub fn supports_saved_group_references(&self) -> bool {
        self.contains(Capability::SavedGroupReferences)
    }

    pub fn supports_redirects(&self) -> bool {
        self.contains(Capability::Redirects)
    }

    /// The SDK tolerates unknown fields, so field-level pruning can be skipped.
    pub fn supports_loose_unmarshalling(&self) -> bool {
        self.contains(Capability::LooseUnmarshalling)
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        let mut set = Self::empty();
        for capability in iter {
            set.insert(capability);
        }
        set
    }
}

impl Serialize for CapabilitySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(Capability::tag))
    }
}

impl<'de> Deserialize<'de> for CapabilitySet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tags = Vec::<String>::deserialize(deserializer)?;
        Ok(Self::from_tags(tags))
    }
}
