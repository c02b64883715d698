use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::{BufMut, BytesMut};

use crate::codec::{Decode, Encode, Error, Reader};

/// An absolute point in time
///
/// 64-bit unsigned integer representing seconds since the unix epoch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a new [`Timestamp`] from seconds since the unix epoch
    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Get the timestamp value as seconds since the unix epoch
    pub fn secs(&self) -> u64 {
        self.0
    }

    /// The current system time truncated to whole seconds
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self(secs)
    }
}

impl From<u64> for Timestamp {
    fn from(secs: u64) -> Self {
        Self(secs)
    }
}

impl From<Timestamp> for SystemTime {
    fn from(value: Timestamp) -> Self {
        UNIX_EPOCH + Duration::from_secs(value.0)
    }
}

impl Encode for Timestamp {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u64(self.0);
        Ok(())
    }
}

impl Decode for Timestamp {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        src.get_u64().map(Self)
    }
}
