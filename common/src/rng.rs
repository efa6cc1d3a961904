use rand::prelude::{SeedableRng, StdRng};
use uuid::Uuid;

pub fn create_rng_from_uuid(uuid: Uuid) -> StdRng {
    let uuid_bytes: &[u8; 16] = uuid.as_bytes();
    let mut seed = [0; 32];
    seed[..16].clone_from_slice(uuid_bytes);
    seed[16..32].clone_from_slice(uuid_bytes);

    StdRng::from_seed(seed)
}

/// Derives a reproducible stream from a textual seed, salted so that each worker gets its own stream.
pub fn create_rng_from_seed(seed: &str, salt: usize) -> StdRng {
    let name = format!("{}:{}", seed, salt);
    let uuid = Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes());

    create_rng_from_uuid(uuid)
}
