//! Names for generated craft and bases

use rand::Rng;

/// Call sign for the `index`-th interceptor (0-based), e.g. "Raven-2"
pub fn interceptor_name(index: usize) -> String {
    let sign = CALL_SIGNS[index % CALL_SIGNS.len()];
    format!("{}-{}", sign, index / CALL_SIGNS.len() + 1)
}

/// Random base name
pub fn base_name(rng: &mut impl Rng) -> String {
    let name = BASE_NAMES[rng.gen_range(0..BASE_NAMES.len())];
    format!("Base {}", name)
}

static CALL_SIGNS: &[&str] = &[
    "Eagle", "Raven", "Falcon", "Kestrel", "Osprey", "Harrier", "Condor", "Merlin",
];

static BASE_NAMES: &[&str] = &[
    "Alpha", "Bastion", "Citadel", "Deepwatch", "Everest", "Foxhole", "Granite", "Halcyon",
];

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_interceptor_names_are_unique() {
        let names: std::collections::HashSet<_> = (0..40).map(interceptor_name).collect();
        assert_eq!(names.len(), 40);
        assert_eq!(interceptor_name(0), "Eagle-1");
        assert_eq!(interceptor_name(8), "Eagle-2");
    }

    #[test]
    fn test_base_name() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert!(base_name(&mut rng).starts_with("Base "));
    }
}
