//! Fixed places on the globe: cities, X-Corp bases, alien outposts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::GeoPosition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SiteKind {
    City,
    XCorpBase,
    AlienOutpost,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub name: String,
    pub kind: SiteKind,
    pub position: GeoPosition,
    /// Terror strikes suffered
    pub terror_attacks: u32,
    /// Infiltration level, 0..=100
    pub infiltration: u32,
    /// Supply runs received (outposts)
    pub supplies: u32,
}

impl Site {
    pub fn new(name: impl Into<String>, kind: SiteKind, position: GeoPosition) -> Self {
        Self {
            name: name.into(),
            kind,
            position,
            terror_attacks: 0,
            infiltration: 0,
            supplies: 0,
        }
    }

    pub fn city(name: impl Into<String>, position: GeoPosition) -> Self {
        Self::new(name, SiteKind::City, position)
    }

    pub fn xcorp_base(name: impl Into<String>, position: GeoPosition) -> Self {
        Self::new(name, SiteKind::XCorpBase, position)
    }

    pub fn outpost(name: impl Into<String>, position: GeoPosition) -> Self {
        Self::new(name, SiteKind::AlienOutpost, position)
    }

    pub fn is_city(&self) -> bool {
        self.kind == SiteKind::City
    }

    pub fn is_base(&self) -> bool {
        self.kind == SiteKind::XCorpBase
    }

    pub fn is_outpost(&self) -> bool {
        self.kind == SiteKind::AlienOutpost
    }

    /// Raise infiltration by `amount`; returns true when it reaches 100
    pub fn infiltrate(&mut self, amount: u32) -> bool {
        self.infiltration = (self.infiltration + amount).min(100);
        self.infiltration >= 100
    }
}

/// Base radar coverage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Radar {
    pub range_km: f64,
}

/// Items held at an X-Corp base
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stores {
    items: BTreeMap<String, u32>,
}

impl Stores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: impl Into<String>, quantity: u32) {
        *self.items.entry(item.into()).or_insert(0) += quantity;
    }

    pub fn quantity(&self, item: &str) -> u32 {
        self.items.get(item).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.items.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infiltration_caps_at_full() {
        let mut city = Site::city("Cairo", GeoPosition::from_degrees(31.2, 30.0));
        assert!(!city.infiltrate(60));
        assert!(city.infiltrate(60));
        assert_eq!(city.infiltration, 100);
    }

    #[test]
    fn test_stores_accumulate() {
        let mut stores = Stores::new();
        stores.add("Avalanche Missile", 6);
        stores.add("Avalanche Missile", 4);
        stores.add("Fuel Cell", 1);
        assert_eq!(stores.quantity("Avalanche Missile"), 10);
        assert_eq!(stores.quantity("Laser Cannon"), 0);
        assert_eq!(stores.iter().count(), 2);
    }
}
