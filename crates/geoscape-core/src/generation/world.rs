//! World generation - the cities on the globe

use hecs::{Entity, World};

use crate::components::{GeoPosition, Site};

/// Spawn every city in the table. Returns them in table order.
pub fn spawn_cities(world: &mut World) -> Vec<Entity> {
    CITIES
        .iter()
        .map(|(name, longitude, latitude)| {
            world.spawn((Site::city(*name, GeoPosition::from_degrees(*longitude, *latitude)),))
        })
        .collect()
}

pub fn city_count() -> usize {
    CITIES.len()
}

/// (name, longitude, latitude) in degrees
static CITIES: &[(&str, f64, f64)] = &[
    ("London", -0.13, 51.51),
    ("Paris", 2.35, 48.86),
    ("Berlin", 13.40, 52.52),
    ("Moscow", 37.62, 55.76),
    ("Istanbul", 28.98, 41.01),
    ("Cairo", 31.24, 30.04),
    ("Lagos", 3.38, 6.52),
    ("Nairobi", 36.82, -1.29),
    ("Johannesburg", 28.05, -26.20),
    ("Dubai", 55.27, 25.20),
    ("Mumbai", 72.88, 19.08),
    ("Delhi", 77.21, 28.61),
    ("Beijing", 116.40, 39.90),
    ("Shanghai", 121.47, 31.23),
    ("Tokyo", 139.69, 35.68),
    ("Seoul", 126.98, 37.57),
    ("Singapore", 103.82, 1.35),
    ("Jakarta", 106.85, -6.21),
    ("Sydney", 151.21, -33.87),
    ("Auckland", 174.76, -36.85),
    ("Los Angeles", -118.24, 34.05),
    ("Mexico City", -99.13, 19.43),
    ("Chicago", -87.63, 41.88),
    ("New York", -74.01, 40.71),
    ("Bogota", -74.07, 4.71),
    ("Lima", -77.04, -12.05),
    ("Sao Paulo", -46.63, -23.55),
    ("Buenos Aires", -58.38, -34.60),
    ("Anchorage", -149.90, 61.22),
    ("Reykjavik", -21.94, 64.15),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_cities() {
        let mut world = World::new();
        let cities = spawn_cities(&mut world);
        assert_eq!(cities.len(), city_count());
        assert!(cities
            .iter()
            .all(|c| world.get::<&Site>(*c).map(|s| s.is_city()).unwrap_or(false)));
    }
}
