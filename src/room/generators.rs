use rand::{distr::Alphanumeric, Rng};

/// Trait for generating the random local part of room and event ids
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Alphanumeric generator with a fixed output length
pub struct RandomIdGenerator {
    length: usize,
}

impl RandomIdGenerator {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl Default for RandomIdGenerator {
    fn default() -> Self {
        Self::new(16)
    }
}

impl IdGenerator for RandomIdGenerator {
    fn generate(&self) -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_id_generator() {
        let generator = RandomIdGenerator::new(16);
        let id1 = generator.generate();
        let id2 = generator.generate();

        assert_eq!(id1.len(), 16);
        assert_eq!(id2.len(), 16);
        assert!(id1.chars().all(|c| c.is_ascii_alphanumeric()));

        // Collisions are possible in principle, just vanishingly unlikely
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_random_id_generator_length() {
        assert_eq!(RandomIdGenerator::new(4).generate().len(), 4);
        assert_eq!(RandomIdGenerator::default().generate().len(), 16);
    }
}
