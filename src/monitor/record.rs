use crate::Error;
use crate::KeyValue;
use crate::LeaseId;
use crate::Result;

/// One lease binding, rebuilt from the store on every refresh.
///
/// The requested ttl is recoverable only from the stored value, so it is
/// encoded as its decimal string and compared on the next refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorRecord {
    pub key: String,
    pub lease_id: LeaseId,
    pub ttl_secs: u64,
}

impl MonitorRecord {
    pub fn new(
        key: impl Into<String>,
        lease_id: LeaseId,
        ttl_secs: u64,
    ) -> Self {
        Self {
            key: key.into(),
            lease_id,
            ttl_secs,
        }
    }

    pub fn from_key_value(kv: KeyValue) -> Result<Self> {
        let ttl_secs = kv.value.parse::<u64>().map_err(|source| Error::MalformedRecord {
            key: kv.key.clone(),
            value: kv.value.clone(),
            source,
        })?;

        Ok(Self {
            key: kv.key,
            lease_id: kv.lease_id,
            ttl_secs,
        })
    }

    /// Value written under the monitor key
    pub fn stored_value(&self) -> String {
        self.ttl_secs.to_string()
    }
}
