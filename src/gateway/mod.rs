//! The explicit context object shared by bus callbacks and the main loop.
//!
//! [`GatewayContext`] owns every buffer and flag the protocol needs. It is
//! `Sync` and is passed by reference (or `Arc`) to each entry point.
//!
//! Callback context, which must return promptly and never block:
//!
//! - [`GatewayContext::on_request`]: the responder is polled and writes one
//!   envelope record.
//! - [`GatewayContext::on_receive`]: bytes written by the other side are
//!   decoded and reassembled.
//!
//! Main loop:
//!
//! - [`GatewayContext::submit`] and [`GatewayContext::take_message`] move
//!   application messages in and out.
//! - [`GatewayContext::receive_poll`] lets the initiator pull one response.
//! - [`GatewayContext::transmit`] lets the initiator write its next record.
//! - enable/disable, status queries and [`GatewayContext::reset`].
//!
//! Callback handlers take locks with `try_lock` and skip the cycle on
//! contention. Main-loop operations raise the relevant ring's
//! [`WriteFlag`] while they mutate it, so callbacks can back off without
//! touching the lock at all.

use bytes::{Bytes, BytesMut};
use log::{debug, warn};
use serde_json::Value;
use tokio_util::codec::Decoder;

use crate::{
    buffer::{BoundedFifo, MessageRing, WriteFlag},
    codec::{ChunkCodec, CodecError, EnvelopeLineCodec, JsonLineCodec},
    config::{ConfigError, GatewayConfig, RING_BUFFER_SIZE, SIMPLE_QUEUE_SIZE},
    error::GatewayError,
    fragment::{
        ChunkEnvelope,
        ChunkIndex,
        ChunkStatus,
        Fragmenter,
        JsonObjectDelimiters,
        PayloadValidator,
        Reassembler,
        ReassemblyError,
    },
    message::Message,
    metrics::{self, Direction},
    sync::{AtomicBool, Mutex, Ordering, lock, try_lock},
};

pub mod bus;
pub mod loopback;
pub mod state;

pub use bus::{AddressError, BusWrite, DeviceAddress, PollBus};
pub use loopback::{Loopback, ReceiveSink};
pub use state::{ResponderGate, ResponderState, ServiceGuard};

/// Ring of complete messages, outgoing or received.
pub type MessageBuffer = MessageRing<Message, RING_BUFFER_SIZE>;
/// Queue of encoded envelope records awaiting transport.
pub type ChunkQueue = BoundedFifo<Bytes, SIMPLE_QUEUE_SIZE>;

/// JSON field a responder adds to identify itself in submitted messages.
pub const SLAVE_ID_FIELD: &str = "SlaveID";

/// Why a callback did nothing this cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The responder was disabled or already servicing a request.
    Responder(ResponderState),
    /// Another context holds the state this callback needs.
    Busy,
}

/// Result of servicing one request or transmitting one record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    /// One record was written to the bus.
    Sent { bytes: usize },
    /// There was nothing to send.
    Idle,
    /// The handler backed off without touching any buffer.
    Skipped(SkipReason),
}

/// Result of [`GatewayContext::submit`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The message was buffered.
    Queued,
    /// The message was buffered and the oldest one was evicted to make room.
    Evicted(Message),
    /// Empty messages are not buffered.
    Ignored,
}

/// What happened to one inbound record.
#[derive(Debug)]
pub enum ChunkEvent {
    /// The chunk extended the message in flight.
    Accepted(ChunkIndex),
    /// A new chunk zero arrived while a message was in flight, so the
    /// partial message was thrown away. The new chunk is reported next.
    Abandoned { buffered: usize },
    /// The chunk completed a message, which is now in the inbound ring.
    Completed { len: usize },
    /// The chunk completed a message but the inbound ring was busy, so the
    /// message was dropped.
    Undelivered { len: usize },
    /// The reassembler discarded the partial message.
    Discarded(ReassemblyError),
    /// The record could not be decoded.
    Malformed(CodecError),
}

/// Summary of one batch of inbound bytes.
#[derive(Debug, Default)]
pub struct ReceiveReport {
    /// Per-record outcomes in arrival order.
    pub events: Vec<ChunkEvent>,
    /// Bytes buffered while waiting for a record terminator.
    pub pending_bytes: usize,
    /// The bytes were dropped because the assembly state was busy.
    pub skipped: bool,
}

impl ReceiveReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    /// Number of messages delivered to the inbound ring.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, ChunkEvent::Completed { .. }))
            .count()
    }

    /// Whether any record was malformed or any partial message discarded or
    /// abandoned.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.events.iter().any(|event| {
            matches!(
                event,
                ChunkEvent::Abandoned { .. }
                    | ChunkEvent::Discarded(_)
                    | ChunkEvent::Malformed(_)
            )
        })
    }
}

struct Assembly<C> {
    buffer: BytesMut,
    decoder: EnvelopeLineCodec<C>,
    reassembler: Reassembler,
}

/// Shared protocol state for one bus endpoint.
pub struct GatewayContext<C = JsonLineCodec> {
    config: GatewayConfig,
    address: Option<DeviceAddress>,
    codec: C,
    fragmenter: Fragmenter,
    responder: ResponderGate,
    outgoing: Mutex<MessageBuffer>,
    outgoing_flag: WriteFlag,
    chunks: Mutex<ChunkQueue>,
    assembly: Mutex<Assembly<C>>,
    inbound: Mutex<MessageBuffer>,
    inbound_flag: WriteFlag,
    data_set_complete: AtomicBool,
}

impl GatewayContext<JsonLineCodec> {
    /// Create a context using the JSON line codec and the JSON object
    /// delimiter check.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `config` is inconsistent.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        Self::with_codec(config, JsonLineCodec, JsonObjectDelimiters)
    }
}

impl<C: ChunkCodec + Clone> GatewayContext<C> {
    /// Create a context with a custom record codec and completion check.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `config` is inconsistent.
    pub fn with_codec(
        config: GatewayConfig,
        codec: C,
        validator: impl PayloadValidator + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let outgoing = MessageBuffer::new();
        let outgoing_flag = outgoing.write_flag().clone();
        let inbound = MessageBuffer::new();
        let inbound_flag = inbound.write_flag().clone();
        let assembly = Assembly {
            buffer: BytesMut::with_capacity(config.max_record_len.get()),
            decoder: EnvelopeLineCodec::with_codec(codec.clone(), config.max_record_len.get()),
            reassembler: Reassembler::with_validator(config.max_data_size, validator),
        };
        Ok(Self {
            config,
            address: None,
            codec,
            fragmenter: Fragmenter::new(config.chunk_size).with_record_limit(config.poll_size),
            responder: ResponderGate::new(),
            outgoing: Mutex::new(outgoing),
            outgoing_flag,
            chunks: Mutex::new(ChunkQueue::new()),
            assembly: Mutex::new(assembly),
            inbound: Mutex::new(inbound),
            inbound_flag,
            data_set_complete: AtomicBool::new(false),
        })
    }

    /// Give the context its own bus address.
    ///
    /// A responder with an address tags submitted JSON objects with it.
    #[must_use]
    pub fn with_address(mut self, address: DeviceAddress) -> Self {
        self.address = Some(address);
        self
    }

    /// This endpoint's bus address, if it has one.
    #[must_use]
    pub const fn address(&self) -> Option<DeviceAddress> { self.address }

    /// The limits this context was built with.
    #[must_use]
    pub const fn config(&self) -> &GatewayConfig { &self.config }

    // Callback context.

    /// Service a poll from the initiator by writing at most one record.
    ///
    /// Does nothing unless the responder is `Idle`. When the chunk queue is
    /// empty, the oldest outgoing message is fragmented into it first.
    pub fn on_request(&self, bus: &mut impl BusWrite) -> RequestOutcome {
        let _servicing = match self.responder.begin_service() {
            Ok(guard) => guard,
            Err(state) => {
                debug!("request ignored: responder is {state}");
                return RequestOutcome::Skipped(SkipReason::Responder(state));
            }
        };
        let Some(mut chunks) = try_lock(&self.chunks) else {
            debug!("request ignored: chunk queue busy");
            return RequestOutcome::Skipped(SkipReason::Busy);
        };
        self.send_next(&mut chunks, bus, true)
    }

    /// Decode bytes written by the other side and reassemble them.
    ///
    /// Partial records are kept for the next call. Completed messages go to
    /// the inbound ring unless a main-loop reader holds it, in which case
    /// the message is dropped rather than waited for.
    pub fn on_receive(&self, bytes: &[u8]) -> ReceiveReport {
        let Some(mut assembly) = try_lock(&self.assembly) else {
            warn!("inbound bytes dropped: assembly busy, len={}", bytes.len());
            return ReceiveReport::skipped();
        };
        self.ingest(&mut assembly, bytes, true)
    }

    // Main loop.

    /// Poll the responder at `address` once and process its response.
    ///
    /// Up to `poll_size` bytes are requested. Idle-line filler bytes
    /// (`0x00`, `0xFF`) are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Io`] when the bus transaction fails. Protocol
    /// problems are reported per record in the [`ReceiveReport`].
    pub fn receive_poll(
        &self,
        bus: &mut impl PollBus,
        address: DeviceAddress,
    ) -> Result<ReceiveReport, GatewayError> {
        let max_len = self.config.poll_size.get();
        let mut response = bus.request(address, max_len)?;
        if response.len() > max_len {
            warn!(
                "bus returned {} bytes for a {max_len} byte poll; truncating",
                response.len()
            );
            response.truncate(max_len);
        }
        let bytes: Vec<u8> = response
            .iter()
            .copied()
            .filter(|byte| !matches!(byte, 0x00 | 0xFF))
            .collect();

        let mut assembly = lock(&self.assembly);
        Ok(self.ingest(&mut assembly, &bytes, false))
    }

    /// Write the next outgoing record from the main loop, refilling the
    /// chunk queue from the outgoing ring when it is empty.
    pub fn transmit(&self, bus: &mut impl BusWrite) -> RequestOutcome {
        let mut chunks = lock(&self.chunks);
        self.send_next(&mut chunks, bus, false)
    }

    /// Buffer an application message for sending, evicting the oldest one
    /// when the outgoing ring is full.
    pub fn submit(&self, message: impl Into<Message>) -> SubmitOutcome {
        let message = message.into();
        if message.is_empty() {
            return SubmitOutcome::Ignored;
        }
        let message = self.tag(message);

        let _writing = self.outgoing_flag.begin();
        let mut ring = lock(&self.outgoing);
        match ring.push(message) {
            None => SubmitOutcome::Queued,
            Some(evicted) => {
                warn!(
                    "outgoing ring full; evicted oldest message: bytes={}",
                    evicted.len()
                );
                metrics::inc_evicted();
                SubmitOutcome::Evicted(evicted)
            }
        }
    }

    /// Take the oldest completed inbound message.
    pub fn take_message(&self) -> Option<Message> {
        let _writing = self.inbound_flag.begin();
        lock(&self.inbound).try_pop()
    }

    /// Start answering requests again.
    pub fn enable_response(&self) -> bool { self.responder.enable() }

    /// Stop answering requests.
    pub fn disable_response(&self) -> ResponderState { self.responder.disable() }

    /// Whether the next request would be serviced.
    #[must_use]
    pub fn response_enabled(&self) -> bool { self.responder.state() == ResponderState::Idle }

    /// Current responder state.
    #[must_use]
    pub fn responder_state(&self) -> ResponderState { self.responder.state() }

    /// The responder's re-entrancy gate.
    #[must_use]
    pub const fn responder(&self) -> &ResponderGate { &self.responder }

    /// Whether a message completed since the flag was last reset.
    #[must_use]
    pub fn data_set_complete(&self) -> bool { self.data_set_complete.load(Ordering::Acquire) }

    /// Clear the completion flag.
    pub fn reset_data_set_complete(&self) { self.data_set_complete.store(false, Ordering::Release); }

    /// Records waiting in the chunk queue.
    #[must_use]
    pub fn pending_chunks(&self) -> usize { lock(&self.chunks).len() }

    /// Messages waiting in the outgoing ring.
    #[must_use]
    pub fn outgoing_len(&self) -> usize { lock(&self.outgoing).len() }

    /// Completed messages waiting in the inbound ring.
    #[must_use]
    pub fn inbound_len(&self) -> usize { lock(&self.inbound).len() }

    /// Whether a partial inbound message is being assembled.
    #[must_use]
    pub fn reassembly_in_flight(&self) -> bool { lock(&self.assembly).reassembler.in_flight() }

    /// Return every buffer, flag and automaton to its initial state.
    pub fn reset(&self) {
        let _outgoing = self.outgoing_flag.begin();
        let _inbound = self.inbound_flag.begin();
        lock(&self.outgoing).clear();
        lock(&self.chunks).clear();
        {
            let mut assembly = lock(&self.assembly);
            assembly.buffer.clear();
            assembly.decoder.reset();
            assembly.reassembler.reset();
        }
        lock(&self.inbound).clear();
        self.data_set_complete.store(false, Ordering::Release);
        self.responder.reset();
        debug!("gateway context reset");
    }

    fn send_next(
        &self,
        chunks: &mut ChunkQueue,
        bus: &mut impl BusWrite,
        callback: bool,
    ) -> RequestOutcome {
        if chunks.is_empty() {
            self.refill(chunks, callback);
        }
        let Some(record) = chunks.pop() else {
            return RequestOutcome::Idle;
        };
        debug_assert!(
            record.len() <= self.config.poll_size.get(),
            "the fragmenter bounds records by the poll size"
        );
        let bytes = bus.write(&record);
        if bytes < record.len() {
            warn!("bus accepted {bytes} of {} record bytes", record.len());
        }
        metrics::inc_chunks(Direction::Outbound);
        RequestOutcome::Sent { bytes }
    }

    fn refill(&self, chunks: &mut ChunkQueue, callback: bool) {
        if callback && self.outgoing_flag.is_writing() {
            debug!("outgoing ring busy; refill deferred");
            return;
        }
        let ring = if callback {
            try_lock(&self.outgoing)
        } else {
            Some(lock(&self.outgoing))
        };
        let Some(message) = ring.and_then(|mut ring| ring.try_pop()) else {
            return;
        };
        if let Err(err) = self.fragmenter.enqueue(&message, &self.codec, chunks) {
            warn!("dropping outgoing message: {err}");
        }
    }

    fn ingest(&self, assembly: &mut Assembly<C>, bytes: &[u8], callback: bool) -> ReceiveReport {
        let Assembly {
            buffer,
            decoder,
            reassembler,
        } = assembly;
        buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        loop {
            match decoder.decode(buffer) {
                Ok(Some(envelope)) => {
                    metrics::inc_chunks(Direction::Inbound);
                    if envelope.sequence().is_first() && reassembler.in_flight() {
                        events.push(ChunkEvent::Abandoned {
                            buffered: reassembler.buffered_len(),
                        });
                    }
                    events.push(self.accept(reassembler, envelope, callback));
                }
                Ok(None) => break,
                Err(CodecError::Io(err)) => {
                    events.push(ChunkEvent::Malformed(CodecError::Io(err)));
                    break;
                }
                Err(err) => {
                    warn!("discarding inbound record: {err}");
                    events.push(ChunkEvent::Malformed(err));
                }
            }
        }

        ReceiveReport {
            events,
            pending_bytes: buffer.len(),
            skipped: false,
        }
    }

    fn accept(
        &self,
        reassembler: &mut Reassembler,
        envelope: ChunkEnvelope,
        callback: bool,
    ) -> ChunkEvent {
        let sequence = envelope.sequence();
        match reassembler.on_chunk(envelope) {
            Ok(ChunkStatus::InProgress) => ChunkEvent::Accepted(sequence),
            Ok(ChunkStatus::Completed(message)) => self.deliver(message, callback),
            Err(err) => ChunkEvent::Discarded(err),
        }
    }

    fn deliver(&self, message: Message, callback: bool) -> ChunkEvent {
        let len = message.len();
        if callback && self.inbound_flag.is_writing() {
            warn!("inbound ring busy; completed message dropped: bytes={len}");
            return ChunkEvent::Undelivered { len };
        }
        let ring = if callback {
            try_lock(&self.inbound)
        } else {
            Some(lock(&self.inbound))
        };
        let Some(mut ring) = ring else {
            warn!("inbound ring locked; completed message dropped: bytes={len}");
            return ChunkEvent::Undelivered { len };
        };
        if let Some(evicted) = ring.push(message) {
            warn!(
                "inbound ring full; evicted oldest message: bytes={}",
                evicted.len()
            );
            metrics::inc_evicted();
        }
        self.data_set_complete.store(true, Ordering::Release);
        ChunkEvent::Completed { len }
    }

    fn tag(&self, message: Message) -> Message {
        let Some(address) = self.address else {
            return message;
        };
        match serde_json::from_str::<Value>(message.as_str()) {
            Ok(Value::Object(mut fields)) => {
                fields.insert(SLAVE_ID_FIELD.to_owned(), Value::from(address.get()));
                Message::new(Value::Object(fields).to_string())
            }
            _ => message,
        }
    }
}

impl<C> std::fmt::Debug for GatewayContext<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayContext")
            .field("config", &self.config)
            .field("address", &self.address)
            .field("responder", &self.responder)
            .finish_non_exhaustive()
    }
}
