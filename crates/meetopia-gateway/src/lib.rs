//! Real-time side of Meetopia: the WebRTC signaling relay, the random-match
//! queue, and ICE server credentials.

pub mod connection;
pub mod dispatcher;
pub mod ice;
pub mod matchmaker;
