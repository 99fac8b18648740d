//! etcd v3 backed [`LeaseStore`].
//!
//! `etcd_client::Client` is a cheap handle over a shared channel; every call
//! clones it because the client API takes `&mut self`.

use etcd_client::Client;
use etcd_client::EventType;
use etcd_client::PutOptions;
use futures::stream;
use futures::StreamExt;
use tracing::debug;
use tracing::warn;

use crate::KeyValue;
use crate::LeaseId;
use crate::LeaseStore;
use crate::StoreConfig;
use crate::StoreError;
use crate::StoreResult;
use crate::WatchEvent;
use crate::WatchStream;

#[derive(Clone)]
pub struct EtcdLeaseStore {
    client: Client,
}

impl EtcdLeaseStore {
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let client = Client::connect(&config.endpoints, None).await?;
        debug!(endpoints = ?config.endpoints, "Connected to etcd");
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

fn utf8(bytes: &[u8]) -> StoreResult<String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| StoreError::Backend(format!("non utf-8 data: {e}")))
}

#[async_trait::async_trait]
impl LeaseStore for EtcdLeaseStore {
    async fn get(
        &self,
        key: &str,
    ) -> StoreResult<Option<KeyValue>> {
        let mut client = self.client.clone();
        let response = client.get(key, None).await?;

        match response.kvs().first() {
            Some(kv) => Ok(Some(KeyValue {
                key: utf8(kv.key())?,
                value: utf8(kv.value())?,
                lease_id: LeaseId(kv.lease()),
            })),
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        key: &str,
        value: &str,
        lease_id: LeaseId,
    ) -> StoreResult<()> {
        let mut client = self.client.clone();
        client
            .put(key, value, Some(PutOptions::new().with_lease(lease_id.0)))
            .await?;
        Ok(())
    }

    async fn grant(
        &self,
        ttl_secs: u64,
    ) -> StoreResult<LeaseId> {
        let ttl = i64::try_from(ttl_secs)
            .ok()
            .filter(|ttl| *ttl > 0)
            .ok_or(StoreError::InvalidTtl(ttl_secs))?;

        let mut client = self.client.clone();
        let response = client.lease_grant(ttl, None).await?;
        Ok(LeaseId(response.id()))
    }

    async fn keep_alive_once(
        &self,
        lease_id: LeaseId,
    ) -> StoreResult<()> {
        let mut client = self.client.clone();
        // Opening the stream sends the first keep-alive request
        let (_keeper, mut responses) = client.lease_keep_alive(lease_id.0).await?;

        match responses.message().await? {
            Some(response) if response.ttl() > 0 => Ok(()),
            _ => Err(StoreError::LeaseNotFound(lease_id)),
        }
    }

    async fn watch(
        &self,
        key: &str,
    ) -> StoreResult<WatchStream> {
        let mut client = self.client.clone();
        let (watcher, responses) = client.watch(key, None).await?;

        // The watcher handle rides along with the stream so the request side
        // stays open for as long as events are consumed
        let events = stream::unfold((watcher, responses), |(watcher, mut responses)| async move {
            match responses.message().await {
                Ok(Some(response)) if !response.canceled() => {
                    let batch: Vec<WatchEvent> = response
                        .events()
                        .iter()
                        .filter_map(|event| {
                            let kv = event.kv()?;
                            let key = String::from_utf8_lossy(kv.key()).into_owned();
                            Some(match event.event_type() {
                                EventType::Put => {
                                    WatchEvent::put(key, String::from_utf8_lossy(kv.value()).into_owned())
                                }
                                EventType::Delete => WatchEvent::delete(key),
                            })
                        })
                        .collect();
                    Some((stream::iter(batch), (watcher, responses)))
                }
                Ok(_) => {
                    debug!(watch_id = watcher.watch_id(), "etcd watch closed");
                    None
                }
                Err(e) => {
                    warn!(watch_id = watcher.watch_id(), "etcd watch failed: {}", e);
                    None
                }
            }
        })
        .flatten();

        Ok(Box::pin(events))
    }
}
