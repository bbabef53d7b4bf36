//! Weft is the sans-IO core of a multiplexed streaming RPC runtime.
//!
//! ## Overview
//!
//! A single connection carries many logical streams, one per RPC call.
//! This crate implements everything between raw connection bytes and
//! per-call events, without owning any IO:
//!
//! * Length-prefixed framing with per-stream reassembly
//!   ([`frame::FrameMuxStreamDecoder`])
//! * The per-call stream state machine with half-close semantics
//!   ([`stream::StreamState`])
//! * Independent send/receive flow-control windows with explicit
//!   `WouldBlock` backpressure ([`stream::FlowWindow`])
//! * The message envelope: length prefix plus compression flag, with
//!   resumable decoding and a pre-allocation size limit
//!   ([`envelope::EnvelopeDecoder`])
//! * Ordered multimap metadata with transparent base64 handling for
//!   `-bin` keys ([`metadata::Metadata`])
//! * The canonical terminal [`status::Status`] vocabulary
//! * Per-connection multiplexing and event routing
//!   ([`stream::MuxSession`], [`stream::MuxDispatcher`])
//!
//! Everything here is callback-driven and runtime-agnostic: encoders emit
//! bytes through `FnMut(&[u8])`, decoders deliver [`stream::StreamEvent`]s
//! through a closure. The `weft-rpc-service-*` extension crates build the
//! async call runtime, interceptors, and load balancing on top, and the
//! `weft-tokio-rpc-*` crates bind the whole stack to real transports.

pub mod constants;
pub mod envelope;
pub mod frame;
pub mod metadata;
pub mod status;
pub mod stream;
pub mod utils;
