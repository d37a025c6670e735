use std::io;

/// Number of buckets a hash input can land in. One bucket covers 1/100 of
/// one percent of traffic, so thresholds and buckets share a unit.
pub const BUCKET_COUNT: u32 = 10_000;

/// Route a throttle key and hash input to a bucket in `[0, BUCKET_COUNT)`.
///
/// The UTF-8 bytes of `key` are hashed first, then `data` is consumed to
/// exhaustion. The mapping is stable across processes and releases;
/// whitelists stored in the flag document depend on that.
///
/// Read errors are swallowed: the bucket is computed over whatever bytes
/// were consumed before the failure.
pub fn bucket(key: &str, mut data: impl io::Read) -> u32 {
    let mut hasher = Fnv32a::new();
    hasher.consume(key.as_bytes());
    drop(io::copy(&mut data, &mut hasher));
    hasher.finish() % BUCKET_COUNT
}

/// FNV-1a hash (32-bit).
struct Fnv32a(u32);

impl Fnv32a {
    fn new() -> Self {
        Fnv32a(0x811c_9dc5)
    }

    fn consume(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 ^= u32::from(byte);
            self.0 = self.0.wrapping_mul(0x0100_0193);
        }
    }

    fn finish(&self) -> u32 {
        self.0
    }
}

// Lets `io::copy` drain a reader straight into the accumulator.
impl io::Write for Fnv32a {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.consume(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
