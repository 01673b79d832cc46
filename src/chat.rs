//! Channel handle parsing and peer conversion

use grammers_client::types::peer::Peer;
use grammers_tl_types as tl;

/// Strip the decorations people paste around a channel handle.
///
/// Accepts `name`, `@name`, `t.me/name` and `https://t.me/name/123`.
pub fn normalize_handle(handle: &str) -> &str {
    let handle = handle.trim();
    let handle = handle
        .strip_prefix("https://")
        .or_else(|| handle.strip_prefix("http://"))
        .unwrap_or(handle);
    let handle = handle
        .strip_prefix("t.me/")
        .or_else(|| handle.strip_prefix("telegram.me/"))
        .unwrap_or(handle);
    let handle = handle.split('/').next().unwrap_or(handle);
    handle.strip_prefix('@').unwrap_or(handle)
}

/// Convert a Peer to InputPeer for raw API calls.
pub fn peer_to_input(peer: &Peer) -> tl::enums::InputPeer {
    match peer {
        Peer::User(user) => {
            let (user_id, access_hash) = match &user.raw {
                tl::enums::User::User(u) => (u.id, u.access_hash.unwrap_or(0)),
                tl::enums::User::Empty(u) => (u.id, 0),
            };
            tl::enums::InputPeer::User(tl::types::InputPeerUser {
                user_id,
                access_hash,
            })
        }
        Peer::Channel(channel) => tl::enums::InputPeer::Channel(tl::types::InputPeerChannel {
            channel_id: channel.raw.id,
            access_hash: channel.raw.access_hash.unwrap_or(0),
        }),
        Peer::Group(group) => match &group.raw {
            tl::enums::Chat::Chat(c) => {
                tl::enums::InputPeer::Chat(tl::types::InputPeerChat { chat_id: c.id })
            }
            tl::enums::Chat::Channel(c) => {
                tl::enums::InputPeer::Channel(tl::types::InputPeerChannel {
                    channel_id: c.id,
                    access_hash: c.access_hash.unwrap_or(0),
                })
            }
            _ => tl::enums::InputPeer::Empty,
        },
    }
}

/// Get the display name for a peer
pub fn peer_name(peer: &Peer, fallback: &str) -> String {
    peer.name()
        .map(|s| s.to_string())
        .unwrap_or_else(|| fallback.to_string())
}
