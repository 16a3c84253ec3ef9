//! The client a host drives
//!
//! A host feeds socket messages into [`Client::receive`], drives the texture
//! loads it hands out, calls [`Client::frame`] on every display refresh and
//! sends whatever [`Client::take_outgoing`] returns.

use crate::command::{self, Progress};
use crate::display::RenderSink;
use crate::error::ProtocolError;
use crate::event::Event;
use crate::input::InputRouter;
use crate::protocol::{ScrollDirection, TouchPhase};
use crate::scene::ElementArena;
use crate::scheduler::FrameScheduler;
use crate::surface::SurfaceRegistry;
use crate::texture::{LoadOutcome, ResourceLoader, TextureCache, TextureLoad};
use crate::wire::WireReader;
use std::collections::VecDeque;

/// Encoded events waiting for the socket
#[derive(Debug)]
pub struct Outbox {
    /// Serial of the last processed command, echoed in every event
    serial: u32,
    /// Host timestamp in milliseconds
    time: u32,
    connected: bool,
    queue: Vec<Vec<u8>>,
}

impl Default for Outbox {
    fn default() -> Self {
        Self {
            serial: 0,
            time: 0,
            connected: true,
            queue: Vec::new(),
        }
    }
}

impl Outbox {
    pub fn set_serial(&mut self, serial: u32) {
        self.serial = serial;
    }

    pub fn set_time(&mut self, time: u32) {
        self.time = time;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Dropped silently once disconnected
    pub fn send(&mut self, event: &Event) {
        if self.connected {
            self.queue.push(event.encode(self.serial, self.time));
        }
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
        self.queue.clear();
    }

    pub fn take(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.queue)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Everything the client knows about the remote display
#[derive(Debug, Default)]
pub struct ClientState {
    pub surfaces: SurfaceRegistry,
    pub textures: TextureCache,
    pub elements: ElementArena,
    pub input: InputRouter,
    pub outbox: Outbox,
}

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A received message and how much of it has been consumed
#[derive(Debug)]
struct Inbound {
    data: Vec<u8>,
    pos: usize,
}

pub struct Client<L> {
    state: ClientState,
    scheduler: FrameScheduler,
    loader: L,
    inbound: VecDeque<Inbound>,
    halted: Option<ProtocolError>,
}

impl<L: ResourceLoader> Client<L> {
    pub fn new(loader: L) -> Self {
        Self {
            state: ClientState::new(),
            scheduler: FrameScheduler::new(),
            loader,
            inbound: VecDeque::new(),
            halted: None,
        }
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn is_connected(&self) -> bool {
        self.state.outbox.is_connected()
    }

    /// The error that stopped processing, if any
    pub fn halted(&self) -> Option<&ProtocolError> {
        self.halted.as_ref()
    }

    /// Queue one inbound message and process as far as possible
    pub fn receive(&mut self, message: Vec<u8>) -> Result<Progress, ProtocolError> {
        if let Some(e) = &self.halted {
            return Err(e.clone());
        }
        if !self.is_connected() {
            return Ok(Progress::Disconnected);
        }
        self.inbound.push_back(Inbound {
            data: message,
            pos: 0,
        });
        self.pump()
    }

    /// Process queued commands until drained or a flush or load is needed
    pub fn pump(&mut self) -> Result<Progress, ProtocolError> {
        if let Some(e) = &self.halted {
            return Err(e.clone());
        }

        while let Some(front) = self.inbound.front_mut() {
            let mut reader = WireReader::at(&front.data, front.pos);
            let result = command::process(
                &mut reader,
                &mut self.state,
                &mut self.scheduler,
                &mut self.loader,
            );
            front.pos = reader.position();

            match result {
                Ok(Progress::Drained) => {
                    self.inbound.pop_front();
                }
                Ok(Progress::Yielded) => return Ok(Progress::Yielded),
                Ok(Progress::Disconnected) => {
                    self.disconnect();
                    return Ok(Progress::Disconnected);
                }
                Err(e) => return Err(self.halt(e)),
            }
        }
        Ok(Progress::Drained)
    }

    fn halt(&mut self, e: ProtocolError) -> ProtocolError {
        log::error!("protocol error, halting: {}", e);
        self.inbound.clear();
        self.halted = Some(e.clone());
        e
    }

    /// Texture decodes started since the last call
    pub fn take_texture_loads(&mut self) -> Vec<TextureLoad> {
        self.scheduler.take_loads()
    }

    /// Report a finished decode and resume processing
    pub fn texture_loaded(&mut self, outcome: LoadOutcome) -> Result<Progress, ProtocolError> {
        self.state.textures.complete(outcome, &mut self.loader);
        self.scheduler.load_settled();
        if !self.is_connected() {
            return Ok(Progress::Disconnected);
        }
        self.pump()
    }

    /// A batch is complete and may be flushed
    pub fn wants_frame(&self) -> bool {
        self.halted.is_none() && self.scheduler.wants_frame()
    }

    /// Display refresh: flush the pending batch, then keep processing
    pub fn frame(&mut self, sink: &mut dyn RenderSink) -> Result<Progress, ProtocolError> {
        if let Some(e) = &self.halted {
            return Err(e.clone());
        }
        if self.scheduler.wants_frame() {
            if let Err(e) = self
                .scheduler
                .flush(sink, &mut self.state.textures, &mut self.loader)
            {
                return Err(self.halt(e));
            }
        }
        if !self.is_connected() {
            return Ok(Progress::Disconnected);
        }
        self.pump()
    }

    /// Host clock in milliseconds, stamped on outgoing events
    pub fn set_time(&mut self, time: u32) {
        self.state.outbox.set_time(time);
    }

    fn send_all(&mut self, events: Vec<Event>) {
        for event in &events {
            self.state.outbox.send(event);
        }
    }

    pub fn pointer_motion(&mut self, x: i32, y: i32, modifiers: u32) {
        let mut events = Vec::new();
        let state = &mut self.state;
        state
            .input
            .pointer_motion(&state.surfaces, x, y, modifiers, &mut events);
        self.send_all(events);
    }

    pub fn button_press(&mut self, x: i32, y: i32, button: u32, modifiers: u32) {
        let mut events = Vec::new();
        let state = &mut self.state;
        state
            .input
            .button_press(&state.surfaces, x, y, button, modifiers, &mut events);
        self.send_all(events);
    }

    pub fn button_release(&mut self, x: i32, y: i32, button: u32, modifiers: u32) {
        let mut events = Vec::new();
        let state = &mut self.state;
        state
            .input
            .button_release(&state.surfaces, x, y, button, modifiers, &mut events);
        self.send_all(events);
    }

    pub fn scroll(&mut self, x: i32, y: i32, direction: ScrollDirection, modifiers: u32) {
        let mut events = Vec::new();
        let state = &mut self.state;
        state
            .input
            .scroll(&state.surfaces, x, y, direction, modifiers, &mut events);
        self.send_all(events);
    }

    pub fn touch(&mut self, phase: TouchPhase, sequence: u32, x: i32, y: i32, modifiers: u32) {
        let mut events = Vec::new();
        let state = &mut self.state;
        state
            .input
            .touch(&state.surfaces, phase, sequence, x, y, modifiers, &mut events);
        self.send_all(events);
    }

    pub fn key_down(&mut self, code: &str, key_code: u32, modifiers: u32) {
        let mut events = Vec::new();
        self.state.input.key_down(code, key_code, modifiers, &mut events);
        self.send_all(events);
    }

    pub fn key_input(&mut self, text: &str) {
        let mut events = Vec::new();
        self.state.input.key_input(text, &mut events);
        self.send_all(events);
    }

    pub fn key_up(&mut self, code: &str, key_code: u32, modifiers: u32) {
        let mut events = Vec::new();
        self.state.input.key_up(code, key_code, modifiers, &mut events);
        self.send_all(events);
    }

    pub fn screen_resized(&mut self, width: u32, height: u32) {
        self.state.outbox.send(&Event::ScreenSize { width, height });
    }

    /// Ask the server to close a surface
    pub fn request_close(&mut self, surface: u16) {
        self.state.outbox.send(&Event::Delete { surface });
    }

    /// Encoded events to write to the socket
    pub fn take_outgoing(&mut self) -> Vec<Vec<u8>> {
        self.state.outbox.take()
    }

    /// Transport gone: stop sending and drop unprocessed commands
    pub fn disconnect(&mut self) {
        self.state.outbox.disconnect();
        self.inbound.clear();
    }
}
