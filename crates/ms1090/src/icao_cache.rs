//! Short-TTL, direct-mapped cache of recently validated ICAO addresses,
//! used to validate AP (Address/Parity) recovery on DF0/4/5/16/20/21/24:
//! the declared "CRC" on those formats is actually `CRC XOR ICAO`, so
//! recovering the ICAO and checking cache membership stands in for a
//! real CRC check.

const SLOTS: usize = 1024;
const DEFAULT_TTL_S: u32 = 60;

#[derive(Clone, Copy, Default)]
struct Slot {
    addr: u32,
    seen_epoch_s: u32,
    occupied: bool,
}

pub struct IcaoCache {
    slots: Box<[Slot; SLOTS]>,
    ttl_s: u32,
}

fn hash(addr: u32) -> usize {
    let mut h = (addr >> 16) ^ addr;
    h = h.wrapping_mul(0x45D9F3B);
    h = (h >> 16) ^ h;
    h = h.wrapping_mul(0x45D9F3B);
    h = (h >> 16) ^ h;
    (h & 1023) as usize
}

impl IcaoCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL_S)
    }

    pub fn with_ttl(ttl_s: u32) -> Self {
        Self {
            slots: Box::new([Slot::default(); SLOTS]),
            ttl_s,
        }
    }

    /// Overwrites the slot unconditionally: single-probe, last-writer-
    /// wins. Collisions shorten the effective TTL of the evicted address.
    pub fn add(&mut self, addr: u32, now_epoch_s: u32) {
        let idx = hash(addr);
        self.slots[idx] = Slot {
            addr,
            seen_epoch_s: now_epoch_s,
            occupied: true,
        };
    }

    /// True iff the slot at `H(addr)` matches and is within TTL.
    pub fn recent(&self, addr: u32, now_epoch_s: u32) -> bool {
        let slot = &self.slots[hash(addr)];
        slot.occupied
            && slot.addr == addr
            && now_epoch_s.saturating_sub(slot.seen_epoch_s) <= self.ttl_s
    }
}

impl Default for IcaoCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_recent() {
        let mut cache = IcaoCache::new();
        cache.add(0x4840D6, 1_000);
        assert!(cache.recent(0x4840D6, 1_000));
        assert!(cache.recent(0x4840D6, 1_059));
    }

    #[test]
    fn ttl_expires() {
        let mut cache = IcaoCache::new();
        cache.add(0x4840D6, 1_000);
        assert!(!cache.recent(0x4840D6, 1_061));
    }

    #[test]
    fn unseen_address_is_not_recent() {
        let cache = IcaoCache::new();
        assert!(!cache.recent(0x123456, 0));
    }

    #[test]
    fn collision_overwrites_last_writer_wins() {
        let mut cache = IcaoCache::new();
        cache.add(0x4840D6, 1_000);
        let idx = hash(0x4840D6);
        // Find another address that collides on the same slot.
        let mut other = None;
        for candidate in 0..4096u32 {
            if candidate != 0x4840D6 && hash(candidate) == idx {
                other = Some(candidate);
                break;
            }
        }
        let other = other.expect("a colliding address within the search range");
        cache.add(other, 1_001);
        assert!(!cache.recent(0x4840D6, 1_001));
        assert!(cache.recent(other, 1_001));
    }
}
