//! UUID v4 generation from the node's seeded RNG.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use crate::datum::Datum;

/// Yields a fresh UUID v4 per `next`. Built from raw RNG bytes rather than
/// the OS entropy source so a fixed seed reproduces the stream.
pub(crate) struct UuidNode {
    rng: StdRng,
    seed: u64,
}

impl UuidNode {
    pub(crate) fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    pub(crate) fn eval(&mut self) -> Datum {
        let mut bytes = [0u8; 16];
        self.rng.fill(&mut bytes);

        // Set version (4) and variant (RFC 4122) bits.
        bytes[6] = (bytes[6] & 0x0f) | 0x40;
        bytes[8] = (bytes[8] & 0x3f) | 0x80;

        Datum::Uuid(Uuid::from_bytes(bytes))
    }

    pub(crate) fn rewind(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
    }
}
