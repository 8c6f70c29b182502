//! Human-readable random identifiers ("FuzzyPeach", "ShinyTimidKoi", ...).
//!
//! Used for brawl room keys. Candidates are built from N adjectives and one
//! noun; each adjective tier gets a fixed number of attempts before the
//! generator escalates to a longer name. Running out of tiers is reported as
//! an error instead of retrying forever.

use std::collections::HashSet;
use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;

/// Attempts made at each adjective count before escalating.
const ATTEMPTS_PER_TIER: usize = 10;

/// Adjective count of the first tier.
const MIN_ADJECTIVES: usize = 1;

/// Adjective count of the last tier. With the default vocabularies the last
/// tier alone has ~2.7 billion combinations.
const MAX_ADJECTIVES: usize = 4;

pub const ADJECTIVES: &[&str] = &[
    "Big", "Fuzzy", "Sweet", "Purple", "Green", "Blue", "Strong", "Mighty", "Majestic", "Proud",
    "Determined", "Clever", "Small", "Tiny", "Cute", "Fluffy", "Soothing", "Elegant", "Funny",
    "Happy", "Thoughtful", "Wooden", "Shiny", "Graceful", "Timid", "Aggressive", "Teal",
    "Sapphire", "Ancient", "Lucid", "Healthy", "Misty", "Mysterious", "Red", "Ferocious",
    "Tasteful", "Wondrous", "Brilliant", "Keen", "Energetic", "Mystic", "Dedicated", "True",
    "Generous", "Windy", "Pearly", "Mindful", "Nimble", "Quiet", "Curious", "Humble", "Super",
    "Industrious", "Kind", "Dutiful", "Capable", "Pleasant", "Precious", "Fearless", "Nice",
    "Agreeable", "Judicious", "Timely", "Diligent", "Persistent", "Harmonious", "Reasonable",
    "Rational", "Empathetic", "Cordial", "Tractable", "Great", "Charming", "Handsome",
    "Fatherly", "Daring", "Gifted",
];

pub const NOUNS: &[&str] = &[
    "Sparrow", "Chickadee", "Python", "Jackal", "Axolotl", "Cat", "Goat", "Sloth", "Dinosaur",
    "Momo", "Peach", "Plum", "Bun", "Chickpea", "Nightingale", "Piper", "Pea", "Pearl",
    "Panther", "Songbird", "Ewe", "Hyena", "Meerkat", "Jinx", "Lynx", "Leopard", "Serval",
    "Mako", "Takoyaki", "Onigiri", "Oak", "Lavender", "Lotus", "Sunflower", "Egg", "Pastry",
    "Biscuit", "Lily", "Poodle", "Juniper", "Peanut", "Almond", "Cashew", "Pistachio", "Walnut",
    "Eggplant", "Gourd", "Karp", "Koi", "Salmon", "MustardLeaf", "Roe", "BonitoFlakes",
    "Peacock", "Mage", "Fawn", "Kelp", "Eel", "Onion", "Tomato", "Kangaroo", "Ostrich", "Alpaca",
    "Llama", "Meex", "Poppy", "Snack", "Platypus", "Elf", "Sage", "Monk", "Farmer", "Sower",
    "Leaf", "Petunia", "Gardener", "Artist", "Feather", "Guard", "Traveler", "Adventurer",
    "Pear", "Grape", "MustardSeed", "Frog", "Tadpole", "Painter", "Giraffe",
];

/// Every tier was tried without finding a free identifier.
///
/// This means the vocabularies are too small for the number of identifiers in
/// use, which is a configuration problem rather than bad luck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorExhausted {
    pub attempts: usize,
}

impl fmt::Display for GeneratorExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "identifier vocabulary exhausted after {} attempts",
            self.attempts
        )
    }
}

impl std::error::Error for GeneratorExhausted {}

/// Random adjective+noun identifier generator.
#[derive(Debug, Clone)]
pub struct NameGenerator {
    adjectives: &'static [&'static str],
    nouns: &'static [&'static str],
    min_adjectives: usize,
    max_adjectives: usize,
    attempts_per_tier: usize,
}

impl Default for NameGenerator {
    fn default() -> Self {
        Self::with_vocabulary(ADJECTIVES, NOUNS)
    }
}

impl NameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A generator over custom vocabularies with the default tiers.
    pub fn with_vocabulary(
        adjectives: &'static [&'static str],
        nouns: &'static [&'static str],
    ) -> Self {
        Self {
            adjectives,
            nouns,
            min_adjectives: MIN_ADJECTIVES,
            max_adjectives: MAX_ADJECTIVES,
            attempts_per_tier: ATTEMPTS_PER_TIER,
        }
    }

    /// Override the adjective tiers (inclusive range).
    pub fn with_tiers(mut self, min_adjectives: usize, max_adjectives: usize) -> Self {
        assert!(
            min_adjectives <= max_adjectives,
            "min_adjectives must not exceed max_adjectives"
        );
        self.min_adjectives = min_adjectives;
        self.max_adjectives = max_adjectives;
        self
    }

    /// Build one random candidate with `adjectives` adjective tokens.
    ///
    /// Returns `None` if a vocabulary needed for the candidate is empty.
    pub fn candidate<R: Rng + ?Sized>(&self, rng: &mut R, adjectives: usize) -> Option<String> {
        let mut name = String::new();
        for _ in 0..adjectives {
            name.push_str(self.adjectives.choose(rng)?);
        }
        name.push_str(self.nouns.choose(rng)?);
        Some(name)
    }

    /// Generate an identifier for which `is_taken` returns false.
    pub fn generate_with<F>(&self, is_taken: F) -> Result<String, GeneratorExhausted>
    where
        F: Fn(&str) -> bool,
    {
        let mut rng = rand::thread_rng();
        let mut attempts = 0;

        for adjectives in self.min_adjectives..=self.max_adjectives {
            for _ in 0..self.attempts_per_tier {
                attempts += 1;
                let Some(candidate) = self.candidate(&mut rng, adjectives) else {
                    return Err(GeneratorExhausted { attempts });
                };
                if !is_taken(&candidate) {
                    return Ok(candidate);
                }
            }
        }

        Err(GeneratorExhausted { attempts })
    }

    /// Generate an identifier that is not in `existing`.
    pub fn generate(&self, existing: &HashSet<String>) -> Result<String, GeneratorExhausted> {
        self.generate_with(|candidate| existing.contains(candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static ONE_ADJ: &[&str] = &["Big"];
    static ONE_NOUN: &[&str] = &["Cat"];

    #[test]
    fn generated_name_ends_with_a_noun() {
        let gen = NameGenerator::new();
        let name = gen.generate(&HashSet::new()).unwrap();
        assert!(NOUNS.iter().any(|noun| name.ends_with(noun)), "{name}");
        assert!(ADJECTIVES.iter().any(|adj| name.starts_with(adj)), "{name}");
    }

    #[test]
    fn generated_names_avoid_existing_set() {
        let gen = NameGenerator::new();
        let mut existing = HashSet::new();
        for _ in 0..500 {
            let name = gen.generate(&existing).unwrap();
            assert!(existing.insert(name.clone()), "duplicate name: {name}");
        }
    }

    #[test]
    fn escalates_to_longer_names_when_tier_is_taken() {
        let gen = NameGenerator::with_vocabulary(ONE_ADJ, ONE_NOUN).with_tiers(1, 3);
        let existing: HashSet<String> = ["BigCat".to_string()].into_iter().collect();

        assert_eq!(gen.generate(&existing).unwrap(), "BigBigCat");
    }

    #[test]
    fn exhausted_vocabulary_is_an_error() {
        let gen = NameGenerator::with_vocabulary(ONE_ADJ, ONE_NOUN).with_tiers(1, 2);
        let existing: HashSet<String> = ["BigCat".to_string(), "BigBigCat".to_string()]
            .into_iter()
            .collect();

        let err = gen.generate(&existing).unwrap_err();
        assert_eq!(err.attempts, 2 * ATTEMPTS_PER_TIER);
    }

    #[test]
    fn zero_adjective_tier_uses_bare_nouns() {
        let gen = NameGenerator::with_vocabulary(ONE_ADJ, ONE_NOUN).with_tiers(0, 0);
        assert_eq!(gen.generate(&HashSet::new()).unwrap(), "Cat");
    }

    #[test]
    fn empty_noun_vocabulary_fails_fast() {
        static NO_NOUNS: &[&str] = &[];
        let gen = NameGenerator::with_vocabulary(ONE_ADJ, NO_NOUNS);
        let err = gen.generate_with(|_| false).unwrap_err();
        assert_eq!(err.attempts, 1);
    }
}
