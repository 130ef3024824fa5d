//! Globe geometry shared by craft and sites.

use std::f64::consts::{PI, TAU};

use rand::Rng;
use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_KM: f64 = 6_371.0;

/// 3D vector, used for unit-sphere math
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Self) -> Self {
        Self {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn length(&self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len > 0.0 {
            *self * (1.0 / len)
        } else {
            Self::ZERO
        }
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

impl std::ops::Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, scalar: f64) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
            z: self.z * scalar,
        }
    }
}

/// Point on the globe, in radians
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct GeoPosition {
    /// East-west, (-PI, PI]
    pub longitude: f64,
    /// North-south, [-PI/2, PI/2]
    pub latitude: f64,
}

impl GeoPosition {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude: wrap_longitude(longitude),
            latitude: latitude.clamp(-PI / 2.0, PI / 2.0),
        }
    }

    pub fn from_degrees(longitude: f64, latitude: f64) -> Self {
        Self::new(longitude.to_radians(), latitude.to_radians())
    }

    pub fn to_unit(&self) -> Vec3 {
        let (sin_lat, cos_lat) = self.latitude.sin_cos();
        let (sin_lon, cos_lon) = self.longitude.sin_cos();
        Vec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat)
    }

    pub fn from_unit(v: Vec3) -> Self {
        let v = v.normalize();
        Self::new(v.y.atan2(v.x), v.z.clamp(-1.0, 1.0).asin())
    }

    /// Central angle between two points, in radians
    pub fn angle_to(&self, other: &Self) -> f64 {
        let a = self.to_unit();
        let b = other.to_unit();
        a.cross(&b).length().atan2(a.dot(&b))
    }

    /// Great-circle distance
    pub fn distance_km(&self, other: &Self) -> f64 {
        self.angle_to(other) * EARTH_RADIUS_KM
    }

    /// Move up to `km` along the great circle toward `target`.
    /// Returns the new position and whether the target was reached.
    pub fn step_toward(&self, target: &Self, km: f64) -> (Self, bool) {
        let total = self.angle_to(target);
        let step = km.max(0.0) / EARTH_RADIUS_KM;
        if step >= total {
            return (*target, true);
        }

        let a = self.to_unit();
        let b = target.to_unit();
        let sin_total = total.sin();

        let moved = if sin_total.abs() < 1e-9 {
            // Antipodal: any great circle works, pick one through a pole
            let axis = if a.z.abs() < 0.9 {
                Vec3::new(0.0, 0.0, 1.0)
            } else {
                Vec3::new(1.0, 0.0, 0.0)
            };
            let perpendicular = a.cross(&axis).cross(&a).normalize();
            a * step.cos() + perpendicular * step.sin()
        } else {
            // Spherical interpolation
            let t = step / total;
            a * (((1.0 - t) * total).sin() / sin_total) + b * ((t * total).sin() / sin_total)
        };

        (Self::from_unit(moved), false)
    }

    /// The point `km` away along `bearing` (radians clockwise from north)
    pub fn destination(&self, bearing: f64, km: f64) -> Self {
        let delta = km / EARTH_RADIUS_KM;
        let (sin_lat, cos_lat) = self.latitude.sin_cos();
        let (sin_d, cos_d) = delta.sin_cos();

        let lat = (sin_lat * cos_d + cos_lat * sin_d * bearing.cos()).clamp(-1.0, 1.0).asin();
        let lon = self.longitude
            + (bearing.sin() * sin_d * cos_lat).atan2(cos_d - sin_lat * lat.sin());
        Self::new(lon, lat)
    }

    /// Uniformly random point within `radius_km`
    pub fn random_near(&self, rng: &mut impl Rng, radius_km: f64) -> Self {
        let bearing = rng.gen_range(0.0..TAU);
        let km = radius_km.max(0.0) * rng.gen::<f64>().sqrt();
        self.destination(bearing, km)
    }

    /// Uniformly random point on the whole globe
    pub fn random_on_globe(rng: &mut impl Rng) -> Self {
        let longitude = rng.gen_range(-PI..PI);
        let latitude = rng.gen_range(-1.0f64..1.0).asin();
        Self::new(longitude, latitude)
    }
}

fn wrap_longitude(longitude: f64) -> f64 {
    if !longitude.is_finite() {
        return 0.0;
    }
    let wrapped = (longitude + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        PI
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 0.0, 0.0);
        let b = Vec3::new(0.0, 1.0, 0.0);

        assert_eq!(a.cross(&b), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(a.dot(&b), 0.0);
        assert_eq!((a + b - a) * 2.0, Vec3::new(0.0, 2.0, 0.0));
        assert!((Vec3::new(3.0, 4.0, 0.0).normalize().length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_quarter_circumference() {
        let equator = GeoPosition::from_degrees(0.0, 0.0);
        let pole = GeoPosition::from_degrees(0.0, 90.0);
        let expected = EARTH_RADIUS_KM * PI / 2.0;
        assert!((equator.distance_km(&pole) - expected).abs() < 1e-6);
        assert_eq!(equator.distance_km(&equator), 0.0);
    }

    #[test]
    fn test_london_to_paris() {
        let london = GeoPosition::from_degrees(-0.1278, 51.5074);
        let paris = GeoPosition::from_degrees(2.3522, 48.8566);
        let km = london.distance_km(&paris);
        assert!((km - 343.5).abs() < 2.0, "got {km}");
    }

    #[test]
    fn test_step_toward_covers_exact_distance() {
        let from = GeoPosition::from_degrees(10.0, 10.0);
        let to = GeoPosition::from_degrees(40.0, -20.0);
        let total = from.distance_km(&to);

        let (mid, arrived) = from.step_toward(&to, total / 4.0);
        assert!(!arrived);
        assert!((from.distance_km(&mid) - total / 4.0).abs() < 1e-3);
        assert!((mid.distance_km(&to) - total * 0.75).abs() < 1e-3);

        let (end, arrived) = mid.step_toward(&to, total);
        assert!(arrived);
        assert_eq!(end, to);
    }

    #[test]
    fn test_step_toward_antipode() {
        let from = GeoPosition::from_degrees(0.0, 0.0);
        let to = GeoPosition::from_degrees(180.0, 0.0);
        let (next, arrived) = from.step_toward(&to, 1_000.0);
        assert!(!arrived);
        assert!((from.distance_km(&next) - 1_000.0).abs() < 1e-3);
    }

    #[test]
    fn test_random_near_stays_inside_radius() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let centre = GeoPosition::from_degrees(139.69, 35.68);
        for _ in 0..200 {
            let p = centre.random_near(&mut rng, 500.0);
            assert!(centre.distance_km(&p) <= 500.0 + 1e-6);
        }
    }

    #[test]
    fn test_longitude_wraps() {
        let p = GeoPosition::from_degrees(190.0, 0.0);
        assert!((p.longitude.to_degrees() + 170.0).abs() < 1e-9);
        let q = GeoPosition::from_degrees(-180.0, 0.0);
        assert!((q.longitude - PI).abs() < 1e-12);
    }
}
