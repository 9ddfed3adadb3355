#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkStats {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub malformed_frames: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl NetworkStats {
    pub fn record_sent(&mut self, bytes: usize) {
        self.frames_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    pub fn record_received(&mut self, bytes: usize) {
        self.frames_received += 1;
        self.bytes_received += bytes as u64;
    }
}

pub fn rand_u64() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u128(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default(),
    );
    hasher.finish()
}

const ROOM_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const ROOM_ID_LEN: usize = 9;

pub fn generate_room_id() -> String {
    let mut seed = rand_u64();
    let mut id = String::with_capacity(ROOM_ID_LEN);
    for _ in 0..ROOM_ID_LEN {
        let index = (seed % ROOM_ID_ALPHABET.len() as u64) as usize;
        id.push(ROOM_ID_ALPHABET[index] as char);
        seed /= ROOM_ID_ALPHABET.len() as u64;
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_ids_are_alphanumeric() {
        let id = generate_room_id();
        assert_eq!(id.len(), ROOM_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn stats_accumulate() {
        let mut stats = NetworkStats::default();
        stats.record_sent(10);
        stats.record_sent(5);
        stats.record_received(3);
        assert_eq!(stats.frames_sent, 2);
        assert_eq!(stats.bytes_sent, 15);
        assert_eq!(stats.frames_received, 1);
        assert_eq!(stats.bytes_received, 3);
    }
}
