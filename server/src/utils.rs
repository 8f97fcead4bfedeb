use rand::distributions::Alphanumeric;
use rand::Rng;
use shared::{SessionId, ROOM_CODE_ALPHABET, ROOM_CODE_LEN};

const SESSION_ID_LEN: usize = 20;

// Six characters from the unambiguous alphabet
pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..ROOM_CODE_LEN)
        .map(|_| char::from(ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())]))
        .collect()
}

// Opaque document-style id
pub fn generate_session_id<R: Rng + ?Sized>(rng: &mut R) -> SessionId {
    let id: String = (0..SESSION_ID_LEN)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect();
    SessionId(id)
}
