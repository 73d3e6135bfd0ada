//! Capability sets: which optional operation groups an adapter supports.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An operation group an adapter may support.
///
/// `Transform` is the implicit baseline group covering
/// read/write/delete/rename/copy/exists/visibility; the rest are optional.
/// Membership is a static, instance-level property of an adapter. It never
/// changes based on current state or load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Transform,
    Collection,
    Streamable,
    Executable,
    Mountable,
}

impl Capability {
    const ALL: [Capability; 5] = [
        Capability::Transform,
        Capability::Collection,
        Capability::Streamable,
        Capability::Executable,
        Capability::Mountable,
    ];

    fn bit(self) -> u8 {
        match self {
            Capability::Transform => 1 << 0,
            Capability::Collection => 1 << 1,
            Capability::Streamable => 1 << 2,
            Capability::Executable => 1 << 3,
            Capability::Mountable => 1 << 4,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Transform => "transform",
            Capability::Collection => "collection",
            Capability::Streamable => "streamable",
            Capability::Executable => "executable",
            Capability::Mountable => "mountable",
        };
        write!(f, "{}", name)
    }
}

/// The set of operation groups advertised by one adapter instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    /// The empty set.
    pub const EMPTY: CapabilitySet = CapabilitySet(0);

    /// Just the baseline `Transform` group.
    pub fn base() -> Self {
        CapabilitySet(Capability::Transform.bit())
    }

    /// Every operation group.
    pub fn full() -> Self {
        let mut set = CapabilitySet::EMPTY;
        for cap in Capability::ALL {
            set = set.with(cap);
        }
        set
    }

    #[must_use]
    pub fn with(self, cap: Capability) -> Self {
        CapabilitySet(self.0 | cap.bit())
    }

    #[must_use]
    pub fn without(self, cap: Capability) -> Self {
        CapabilitySet(self.0 & !cap.bit())
    }

    pub fn contains(self, cap: Capability) -> bool {
        self.0 & cap.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate over the contained groups.
    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(CapabilitySet::EMPTY, CapabilitySet::with)
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        for cap in self.iter() {
            write!(f, "{}{}", sep, cap)?;
            sep = ",";
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_contains_only_transform() {
        let set = CapabilitySet::base();
        assert!(set.contains(Capability::Transform));
        assert!(!set.contains(Capability::Collection));
        assert!(!set.contains(Capability::Mountable));
    }

    #[test]
    fn full_contains_everything() {
        let set = CapabilitySet::full();
        for cap in Capability::ALL {
            assert!(set.contains(cap), "missing {}", cap);
        }
    }

    #[test]
    fn with_and_without() {
        let set = CapabilitySet::base().with(Capability::Collection);
        assert!(set.contains(Capability::Collection));

        let set = set.without(Capability::Collection);
        assert!(!set.contains(Capability::Collection));
        assert!(set.contains(Capability::Transform));
    }

    #[test]
    fn empty_set() {
        assert!(CapabilitySet::EMPTY.is_empty());
        assert!(!CapabilitySet::base().is_empty());
    }

    #[test]
    fn from_iterator() {
        let set: CapabilitySet = [Capability::Transform, Capability::Streamable]
            .into_iter()
            .collect();
        assert!(set.contains(Capability::Streamable));
        assert!(!set.contains(Capability::Executable));
    }

    #[test]
    fn iter_roundtrips() {
        let set = CapabilitySet::base()
            .with(Capability::Collection)
            .with(Capability::Executable);
        let caps: Vec<Capability> = set.iter().collect();
        assert_eq!(
            caps,
            vec![
                Capability::Transform,
                Capability::Collection,
                Capability::Executable
            ]
        );
    }

    #[test]
    fn display_forms() {
        assert_eq!(Capability::Streamable.to_string(), "streamable");
        let set = CapabilitySet::base().with(Capability::Collection);
        assert_eq!(set.to_string(), "transform,collection");
    }

    #[test]
    fn serde_wire_form() {
        let json = serde_json::to_string(&Capability::Collection).unwrap();
        assert_eq!(json, "\"collection\"");
        let back: Capability = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Capability::Collection);
    }
}
