// Stream registry

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use parking_lot::Mutex;
use tokio::sync::mpsc::{error::TrySendError, Sender};

use crate::{rtmp::RtmpPacket, session::RtmpSessionMessage};

/// Message stream ids below this are never handed out
const FIRST_STREAM_ID_BASE: u32 = 64;

/// Player subscribed to a stream
pub struct StreamPlayer {
    /// Message stream used by the player session
    pub play_stream_id: u32,

    /// Writer queue of the player session
    pub sender: Sender<RtmpSessionMessage>,
}

/// What a player needs to start decoding a live stream
#[derive(Default)]
pub struct StreamStartInfo {
    pub metadata: Option<Arc<Vec<u8>>>,
    pub audio_sequence_header: Option<Arc<Vec<u8>>>,
    pub video_sequence_header: Option<Arc<Vec<u8>>>,
}

/// Outcome of a broadcast
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BroadcastResult {
    /// Players that received the packet
    pub delivered: usize,

    /// Players whose queue was full
    pub dropped: usize,
}

#[derive(Default)]
struct StreamMedia {
    start_info: StreamStartInfo,
    players: HashMap<u64, StreamPlayer>,
    closed: bool,
}

/// A published stream
pub struct StreamObject {
    /// Stream name (registry key)
    pub name: String,

    /// Unique ID of the stream
    pub id: u64,

    /// ID of the publishing session. Only an identifier, the registry
    /// does not keep the session alive.
    pub publisher_id: u64,

    /// Message stream the publisher sends media on
    pub publish_stream_id: u32,

    /// Creation time
    pub created_at: DateTime<Utc>,

    media: Mutex<StreamMedia>,
}

impl StreamObject {
    /// Creates a stream object
    ///
    /// # Arguments
    ///
    /// * `name` - Stream name
    /// * `id` - Unique ID of the stream
    /// * `publisher_id` - ID of the publishing session
    /// * `publish_stream_id` - Message stream of the publisher
    pub fn new(name: &str, id: u64, publisher_id: u64, publish_stream_id: u32) -> StreamObject {
        StreamObject {
            name: name.to_string(),
            id,
            publisher_id,
            publish_stream_id,
            created_at: Utc::now(),
            media: Mutex::new(StreamMedia::default()),
        }
    }

    /// Subscribes a player.
    /// Returns the cached start info, or None if the stream already ended.
    pub fn add_player(
        &self,
        session_id: u64,
        play_stream_id: u32,
        sender: Sender<RtmpSessionMessage>,
    ) -> Option<StreamStartInfo> {
        let mut media = self.media.lock();

        if media.closed {
            return None;
        }

        media.players.insert(
            session_id,
            StreamPlayer {
                play_stream_id,
                sender,
            },
        );

        Some(StreamStartInfo {
            metadata: media.start_info.metadata.clone(),
            audio_sequence_header: media.start_info.audio_sequence_header.clone(),
            video_sequence_header: media.start_info.video_sequence_header.clone(),
        })
    }

    /// Unsubscribes a player
    pub fn remove_player(&self, session_id: u64) -> bool {
        self.media.lock().players.remove(&session_id).is_some()
    }

    /// Number of players
    pub fn player_count(&self) -> usize {
        self.media.lock().players.len()
    }

    /// Sends a packet to every player without waiting.
    /// Players with a full queue miss the packet. Players that went away are removed.
    pub fn broadcast(&self, packet: Arc<RtmpPacket>) -> BroadcastResult {
        let mut media = self.media.lock();
        let mut result = BroadcastResult::default();

        media.players.retain(|_, player| {
            match player.sender.try_send(RtmpSessionMessage::PlayPacket {
                stream_id: player.play_stream_id,
                packet: packet.clone(),
            }) {
                Ok(_) => {
                    result.delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    result.dropped += 1;
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            }
        });

        result
    }

    /// Caches the stream metadata (onMetaData payload)
    pub fn set_metadata(&self, metadata: Vec<u8>) {
        self.media.lock().start_info.metadata = Some(Arc::new(metadata));
    }

    /// Caches the audio sequence header
    pub fn set_audio_sequence_header(&self, header: Vec<u8>) {
        self.media.lock().start_info.audio_sequence_header = Some(Arc::new(header));
    }

    /// Caches the video sequence header
    pub fn set_video_sequence_header(&self, header: Vec<u8>) {
        self.media.lock().start_info.video_sequence_header = Some(Arc::new(header));
    }

    /// Ends the stream: no more players can join and every
    /// current player is told the publisher left
    pub fn close(&self) {
        let players = {
            let mut media = self.media.lock();
            media.closed = true;
            std::mem::take(&mut media.players)
        };

        for player in players.into_values() {
            let msg = RtmpSessionMessage::PlayStop {
                stream_id: player.play_stream_id,
            };

            // The stop notice must not be lost to a full queue
            if let Err(TrySendError::Full(msg)) = player.sender.try_send(msg) {
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    let sender = player.sender;
                    handle.spawn(async move {
                        let _ = sender.send(msg).await;
                    });
                }
            }
        }
    }
}

/// Concurrent mapping from stream name to stream object
pub struct StreamRegistry {
    streams: DashMap<String, Arc<StreamObject>>,
    next_stream_id: AtomicU32,
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamRegistry {
    /// Creates an empty registry
    pub fn new() -> StreamRegistry {
        StreamRegistry {
            streams: DashMap::new(),
            next_stream_id: AtomicU32::new(FIRST_STREAM_ID_BASE),
        }
    }

    /// Inserts or replaces the entry for a name.
    /// Returns the replaced entry, if any.
    pub fn put(&self, name: &str, stream: Arc<StreamObject>) -> Option<Arc<StreamObject>> {
        self.streams.insert(name.to_string(), stream)
    }

    /// Inserts the stream only if its name is free.
    /// Returns the current owner of the name otherwise.
    pub fn try_put(&self, stream: Arc<StreamObject>) -> Result<(), Arc<StreamObject>> {
        match self.streams.entry(stream.name.clone()) {
            Entry::Occupied(e) => Err(e.get().clone()),
            Entry::Vacant(e) => {
                e.insert(stream);
                Ok(())
            }
        }
    }

    /// Gets the entry for a name
    pub fn get(&self, name: &str) -> Option<Arc<StreamObject>> {
        self.streams.get(name).map(|s| s.value().clone())
    }

    /// Removes the entry for a name
    pub fn remove(&self, name: &str) -> Option<Arc<StreamObject>> {
        self.streams.remove(name).map(|(_, s)| s)
    }

    /// Removes the entry for a name only if it belongs to the given stream
    pub fn remove_if_owner(&self, name: &str, stream_id: u64) -> Option<Arc<StreamObject>> {
        self.streams
            .remove_if(name, |_, s| s.id == stream_id)
            .map(|(_, s)| s)
    }

    /// Number of streams
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// True if there are no streams
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Allocates a message stream id, unique for the lifetime of the registry
    pub fn next_stream_id(&self) -> u32 {
        self.next_stream_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::thread;

    use crate::rtmp::RTMP_TYPE_AUDIO;

    #[test]
    fn test_concurrent_put_same_name() {
        for _ in 0..50 {
            let registry = Arc::new(StreamRegistry::new());

            let a = Arc::new(StreamObject::new("s", 1, 10, 65));
            let b = Arc::new(StreamObject::new("s", 2, 20, 66));

            let handles: Vec<_> = [a, b]
                .into_iter()
                .map(|obj| {
                    let registry = registry.clone();
                    thread::spawn(move || {
                        registry.put("s", obj);
                    })
                })
                .collect();

            for h in handles {
                h.join().unwrap();
            }

            assert_eq!(registry.len(), 1);

            let winner = registry.get("s").unwrap();
            assert!(winner.id == 1 || winner.id == 2);
        }
    }

    #[test]
    fn test_try_put_and_remove_if_owner() {
        let registry = StreamRegistry::new();

        assert!(registry
            .try_put(Arc::new(StreamObject::new("cam", 1, 10, 65)))
            .is_ok());

        let existing = registry
            .try_put(Arc::new(StreamObject::new("cam", 2, 20, 66)))
            .unwrap_err();
        assert_eq!(existing.id, 1);

        assert!(registry.remove_if_owner("cam", 2).is_none());
        assert!(registry.remove_if_owner("cam", 1).is_some());
        assert!(registry.is_empty());
        assert!(registry.remove("cam").is_none());
    }

    #[test]
    fn test_stream_ids_are_unique() {
        let registry = Arc::new(StreamRegistry::new());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || (0..100).map(|_| registry.next_stream_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut ids: Vec<u32> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();

        ids.sort();
        ids.dedup();

        assert_eq!(ids.len(), 400);
        assert_eq!(ids[0], 65);
    }

    #[tokio::test]
    async fn test_broadcast_and_close() {
        let stream = StreamObject::new("cam", 1, 10, 65);

        let (fast_tx, mut fast_rx) = tokio::sync::mpsc::channel(4);
        let (slow_tx, mut slow_rx) = tokio::sync::mpsc::channel(1);

        stream.set_metadata(vec![1, 2, 3]);

        let info = stream.add_player(20, 70, fast_tx).unwrap();
        assert_eq!(info.metadata.as_deref(), Some(&vec![1, 2, 3]));
        assert!(info.audio_sequence_header.is_none());

        stream.add_player(30, 71, slow_tx).unwrap();

        let packet = Arc::new(RtmpPacket::new(4, RTMP_TYPE_AUDIO, 65, 0, vec![0xAF, 0x01]));

        assert_eq!(
            stream.broadcast(packet.clone()),
            BroadcastResult {
                delivered: 2,
                dropped: 0
            }
        );
        assert_eq!(
            stream.broadcast(packet),
            BroadcastResult {
                delivered: 1,
                dropped: 1
            }
        );

        match fast_rx.recv().await {
            Some(RtmpSessionMessage::PlayPacket { stream_id, .. }) => assert_eq!(stream_id, 70),
            _ => panic!("expected a packet"),
        }

        stream.close();

        assert_eq!(stream.player_count(), 0);
        assert!(stream.add_player(40, 72, tokio::sync::mpsc::channel(1).0).is_none());

        // The slow player still gets the stop notice after draining
        assert!(matches!(
            slow_rx.recv().await,
            Some(RtmpSessionMessage::PlayPacket { .. })
        ));
        assert!(matches!(
            slow_rx.recv().await,
            Some(RtmpSessionMessage::PlayStop { stream_id: 71 })
        ));

        assert!(matches!(
            fast_rx.recv().await,
            Some(RtmpSessionMessage::PlayPacket { .. })
        ));
        assert!(matches!(
            fast_rx.recv().await,
            Some(RtmpSessionMessage::PlayStop { stream_id: 70 })
        ));
    }
}
