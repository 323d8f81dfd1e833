//! Hides the traffic the inspector generates for itself.
//!
//! Registering the inspector actor on the debugging target takes a request
//! (sent) and a reply (received). Both halves are removed from the visible
//! list, along with anything addressed to or coming from the inspector actor.

use std::collections::HashMap;

use crate::models::packet::{Packet, PacketBody, WirePacket};

/// Marker contained in the address of every inspector actor
pub const INSPECTOR_ACTOR_MARKER: &str = "actorInspector";

/// Marker contained in the module path of the inspector's registration request
pub const INSPECTOR_MODULE_MARKER: &str = "rdpinspector-at-getfirebug-dot-com";

/// Flag set on requests the inspector sends while registering its actors
pub const INTERNALS_FLAG: &str = "rdpInspectorInternals";

const REGISTER_ACTOR: &str = "registerActor";

/// Return the visible subset of `packets`, in the original order.
///
/// Suppression counters live only for the duration of one call, so the
/// result depends on nothing but the input.
pub fn filter_packets<'a, I>(packets: I) -> Vec<&'a Packet>
where
    I: IntoIterator<Item = &'a Packet>,
{
    let mut pending: HashMap<&'a str, u32> = HashMap::new();

    packets
        .into_iter()
        .filter(|&packet| {
            let Some(wire) = packet.body.wire() else {
                return true;
            };

            if wire.routing_address().is_some_and(is_inspector_actor) {
                return false;
            }

            match &packet.body {
                PacketBody::Send(wire) if is_internal_request(wire) => {
                    *pending.entry(wire.to().unwrap_or_default()).or_insert(0) += 1;
                    false
                }
                PacketBody::Receive(wire) => {
                    match pending.get_mut(wire.from().unwrap_or_default()) {
                        Some(count) if *count > 0 => {
                            *count -= 1;
                            false
                        }
                        _ => true,
                    }
                }
                _ => true,
            }
        })
        .collect()
}

/// Whether `address` names one of the inspector's own actors.
///
/// Inspector actor ids are always prefixed by the connection id, so the
/// marker at position zero is not a match.
pub fn is_inspector_actor(address: &str) -> bool {
    contains_past_start(address, INSPECTOR_ACTOR_MARKER)
}

/// Whether a sent packet belongs to the inspector's registration handshake
pub fn is_internal_request(wire: &WirePacket) -> bool {
    if wire.bool_field(INTERNALS_FLAG) {
        return true;
    }

    wire.message_type() == Some(REGISTER_ACTOR)
        && wire
            .str_field("filename")
            .is_some_and(|filename| contains_past_start(filename, INSPECTOR_MODULE_MARKER))
}

fn contains_past_start(haystack: &str, needle: &str) -> bool {
    haystack.find(needle).is_some_and(|pos| pos > 0)
}
