//! Command decoding and processing
//!
//! One inbound message holds any number of commands. [`process`] applies them
//! in order until the message is drained or the current batch has to be
//! flushed first.

use crate::client::ClientState;
use crate::display::DisplayMutation;
use crate::error::ProtocolError;
use crate::event::Event;
use crate::protocol::{opcodes, MOVE_RESIZE_POSITION, MOVE_RESIZE_SIZE};
use crate::scene;
use crate::scheduler::FrameScheduler;
use crate::surface::Surface;
use crate::texture::ResourceLoader;
use crate::wire::{NodeReader, WireReader};

#[derive(Debug, Clone)]
pub enum Command<'a> {
    GrabPointer {
        surface: u16,
        owner_events: bool,
    },
    UngrabPointer,
    NewSurface {
        id: u16,
        x: i16,
        y: i16,
        width: u16,
        height: u16,
        temporary: bool,
    },
    ShowSurface(u16),
    HideSurface(u16),
    RaiseSurface(u16),
    LowerSurface(u16),
    DestroySurface(u16),
    MoveResize {
        id: u16,
        position: Option<(i16, i16)>,
        size: Option<(u16, u16)>,
    },
    SetTransientFor {
        id: u16,
        parent: u16,
    },
    Disconnected,
    SetShowKeyboard(bool),
    UploadTexture {
        id: u32,
        data: &'a [u8],
    },
    ReleaseTexture(u32),
    SetNodes {
        surface: u16,
        nodes: NodeReader<'a>,
    },
    Roundtrip {
        surface: u16,
        tag: u32,
    },
}

impl<'a> Command<'a> {
    /// Decode one command and its serial
    pub fn decode(r: &mut WireReader<'a>) -> Result<(u32, Command<'a>), ProtocolError> {
        let opcode = r.u8()?;
        let serial = r.u32()?;

        let cmd = match opcode {
            opcodes::GRAB_POINTER => Command::GrabPointer {
                surface: r.u16()?,
                owner_events: r.bool()?,
            },
            opcodes::UNGRAB_POINTER => Command::UngrabPointer,
            opcodes::NEW_SURFACE => Command::NewSurface {
                id: r.u16()?,
                x: r.i16()?,
                y: r.i16()?,
                width: r.u16()?,
                height: r.u16()?,
                temporary: r.bool()?,
            },
            opcodes::SHOW_SURFACE => Command::ShowSurface(r.u16()?),
            opcodes::HIDE_SURFACE => Command::HideSurface(r.u16()?),
            opcodes::RAISE_SURFACE => Command::RaiseSurface(r.u16()?),
            opcodes::LOWER_SURFACE => Command::LowerSurface(r.u16()?),
            opcodes::DESTROY_SURFACE => Command::DestroySurface(r.u16()?),
            opcodes::MOVE_RESIZE => {
                let id = r.u16()?;
                let flags = r.u8()?;
                let position = if flags & MOVE_RESIZE_POSITION != 0 {
                    Some((r.i16()?, r.i16()?))
                } else {
                    None
                };
                let size = if flags & MOVE_RESIZE_SIZE != 0 {
                    Some((r.u16()?, r.u16()?))
                } else {
                    None
                };
                Command::MoveResize { id, position, size }
            }
            opcodes::SET_TRANSIENT_FOR => Command::SetTransientFor {
                id: r.u16()?,
                parent: r.u16()?,
            },
            opcodes::DISCONNECTED => Command::Disconnected,
            opcodes::SET_SHOW_KEYBOARD => Command::SetShowKeyboard(r.u16()? != 0),
            opcodes::UPLOAD_TEXTURE => Command::UploadTexture {
                id: r.u32()?,
                data: r.bytes()?,
            },
            opcodes::RELEASE_TEXTURE => Command::ReleaseTexture(r.u32()?),
            opcodes::SET_NODES => Command::SetNodes {
                surface: r.u16()?,
                nodes: r.node_stream()?,
            },
            opcodes::ROUNDTRIP => Command::Roundtrip {
                surface: r.u16()?,
                tag: r.u32()?,
            },
            other => return Err(ProtocolError::UnknownOpcode(other)),
        };
        Ok((serial, cmd))
    }
}

/// How far a processing pass got
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Every command consumed
    Drained,
    /// Stopped at a command boundary; resume after the next flush or load
    Yielded,
    /// Server said goodbye
    Disconnected,
}

/// Apply commands from `r` until drained or a flush is needed first.
///
/// On `Yielded` the reader sits at the start of the refused command.
pub fn process(
    r: &mut WireReader<'_>,
    state: &mut ClientState,
    scheduler: &mut FrameScheduler,
    loader: &mut dyn ResourceLoader,
) -> Result<Progress, ProtocolError> {
    while !r.is_empty() {
        if scheduler.is_waiting_for_textures() {
            return Ok(Progress::Yielded);
        }

        let start = r.position();
        let (serial, cmd) = Command::decode(r)?;

        if let Command::SetNodes { surface, .. } = cmd {
            if scheduler.is_modified(surface) {
                log::trace!("surface {} already updated this frame, yielding", surface);
                r.rewind(start);
                return Ok(Progress::Yielded);
            }
        }

        state.outbox.set_serial(serial);
        log::debug!("command {:?}", Loggable(&cmd));
        if apply(cmd, state, scheduler, loader)? == Progress::Disconnected {
            return Ok(Progress::Disconnected);
        }
    }
    Ok(Progress::Drained)
}

fn apply(
    cmd: Command<'_>,
    state: &mut ClientState,
    scheduler: &mut FrameScheduler,
    loader: &mut dyn ResourceLoader,
) -> Result<Progress, ProtocolError> {
    let mut events = Vec::new();

    match cmd {
        Command::NewSurface {
            id,
            x,
            y,
            width,
            height,
            temporary,
        } => {
            let root = state.elements.alloc_root(id);
            state
                .surfaces
                .create(Surface::new(id, x, y, width, height, temporary, root))?;
            let queue = scheduler.queue();
            queue.push(DisplayMutation::CreateRoot {
                surface: id,
                element: root,
                x,
                y,
                width,
                height,
            });
            queue.push(DisplayMutation::Restack(state.surfaces.stacking_elements()));
            events.push(configure(state.surfaces.require(id)?));
        }
        Command::ShowSurface(id) => {
            let surface = state.surfaces.require_mut(id)?;
            surface.visible = true;
            scheduler.queue().push(DisplayMutation::SetVisible {
                element: surface.root,
                visible: true,
            });
        }
        Command::HideSurface(id) => {
            let surface = state.surfaces.require_mut(id)?;
            surface.visible = false;
            scheduler.queue().push(DisplayMutation::SetVisible {
                element: surface.root,
                visible: false,
            });
            state.input.surface_hidden(&state.surfaces, id, &mut events);
        }
        Command::RaiseSurface(id) => {
            if state.surfaces.raise(id)? {
                restack(state, scheduler);
            }
        }
        Command::LowerSurface(id) => {
            if state.surfaces.lower(id)? {
                restack(state, scheduler);
            }
        }
        Command::DestroySurface(id) => {
            state.surfaces.require(id)?;
            state.input.surface_destroyed(&state.surfaces, id, &mut events);
            let surface = state.surfaces.destroy(id)?;
            let queue = scheduler.queue();
            queue.push(DisplayMutation::Remove(surface.root));
            for element in state.elements.remove_subtree(surface.root) {
                queue.push(DisplayMutation::Discard(element));
            }
        }
        Command::MoveResize { id, position, size } => {
            let surface = state.surfaces.require_mut(id)?;
            if let Some((x, y)) = position {
                surface.x = x;
                surface.y = y;
                scheduler.queue().push(DisplayMutation::Move {
                    element: surface.root,
                    x,
                    y,
                });
            }
            if let Some((width, height)) = size {
                surface.width = width;
                surface.height = height;
                scheduler.queue().push(DisplayMutation::Resize {
                    element: surface.root,
                    width,
                    height,
                });
            }
            events.push(configure(surface));
        }
        Command::SetTransientFor { id, parent } => {
            if state.surfaces.set_transient_for(id, parent)? {
                restack(state, scheduler);
            }
        }
        Command::Disconnected => {
            log::info!("server disconnected");
            return Ok(Progress::Disconnected);
        }
        Command::SetShowKeyboard(show) => {
            scheduler.queue().push(DisplayMutation::ShowKeyboard(show));
        }
        Command::UploadTexture { id, data } => {
            let load = state.textures.upload(id, data.to_vec(), loader)?;
            scheduler.track_load(load);
        }
        Command::ReleaseTexture(id) => {
            state.textures.release(id, loader)?;
        }
        Command::SetNodes { surface, nodes } => {
            let target = state.surfaces.require_mut(surface)?;
            scene::apply_nodes(
                nodes,
                target,
                &mut state.elements,
                &mut state.textures,
                scheduler.queue(),
            )?;
            scheduler.mark_modified(surface);
        }
        Command::Roundtrip { surface, tag } => {
            events.push(Event::Roundtrip { surface, tag });
        }
        Command::GrabPointer {
            surface,
            owner_events,
        } => {
            state
                .input
                .grab_pointer(&state.surfaces, surface, owner_events, &mut events);
            events.push(Event::GrabNotify { status: 0 });
        }
        Command::UngrabPointer => {
            state.input.ungrab_pointer(&state.surfaces, &mut events);
            events.push(Event::UngrabNotify { status: 0 });
        }
    }

    for event in &events {
        state.outbox.send(event);
    }
    Ok(Progress::Drained)
}

fn restack(state: &ClientState, scheduler: &mut FrameScheduler) {
    scheduler
        .queue()
        .push(DisplayMutation::Restack(state.surfaces.stacking_elements()));
}

fn configure(surface: &Surface) -> Event {
    Event::Configure {
        surface: surface.id,
        x: surface.x as i32,
        y: surface.y as i32,
        width: surface.width as u32,
        height: surface.height as u32,
    }
}

/// Debug view that leaves out payload bytes
struct Loggable<'c, 'a>(&'c Command<'a>);

impl std::fmt::Debug for Loggable<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Command::UploadTexture { id, data } => {
                write!(f, "UploadTexture {{ id: {}, len: {} }}", id, data.len())
            }
            Command::SetNodes { surface, nodes } => {
                write!(f, "SetNodes {{ surface: {}, words: {} }}", surface, nodes.len_words())
            }
            other => write!(f, "{:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{png_bytes, CommandStream, NodeStream};
    use crate::texture::HeaderLoader;
    use futures::executor::block_on;

    struct Fixture {
        state: ClientState,
        scheduler: FrameScheduler,
        loader: HeaderLoader,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                state: ClientState::new(),
                scheduler: FrameScheduler::new(),
                loader: HeaderLoader::new(),
            }
        }

        fn run(&mut self, data: &[u8], pos: usize) -> (Result<Progress, ProtocolError>, usize) {
            let mut r = WireReader::at(data, pos);
            let result = process(&mut r, &mut self.state, &mut self.scheduler, &mut self.loader);
            (result, r.position())
        }

        fn settle_loads(&mut self) {
            for load in self.scheduler.take_loads() {
                self.state.textures.complete(block_on(load), &mut self.loader);
                self.scheduler.load_settled();
            }
        }
    }

    #[test]
    fn test_decode_move_resize_flags() {
        let mut c = CommandStream::new();
        c.move_resize(4, Some((-3, 7)), None);
        c.move_resize(4, None, Some((20, 30)));
        let data = c.finish();
        let mut r = WireReader::new(&data);

        let (serial, cmd) = Command::decode(&mut r).unwrap();
        assert_eq!(serial, 1);
        assert!(matches!(
            cmd,
            Command::MoveResize {
                id: 4,
                position: Some((-3, 7)),
                size: None
            }
        ));
        let (_, cmd) = Command::decode(&mut r).unwrap();
        assert!(matches!(
            cmd,
            Command::MoveResize {
                position: None,
                size: Some((20, 30)),
                ..
            }
        ));
        assert!(r.is_empty());
    }

    #[test]
    fn test_unknown_opcode_is_fatal() {
        let data = [11u8, 0, 0, 0, 0];
        let mut fx = Fixture::new();
        assert_eq!(fx.run(&data, 0).0, Err(ProtocolError::UnknownOpcode(11)));
    }

    #[test]
    fn test_second_set_nodes_yields() {
        let mut fx = Fixture::new();
        let mut c = CommandStream::new();
        c.new_surface(1, 0, 0, 50, 50, false);
        let mut first = NodeStream::new();
        first.insert(0, 0).color(1, [0.0; 4], 0xff000000);
        c.set_nodes(1, &first);
        let second_at = c.len();
        let mut second = NodeStream::new();
        second.remove(1);
        c.set_nodes(1, &second);
        let data = c.finish();

        let (result, pos) = fx.run(&data, 0);
        assert_eq!(result, Ok(Progress::Yielded));
        assert_eq!(pos, second_at);
        assert!(fx.scheduler.is_modified(1));

        // nothing more until the batch is flushed
        let (result, pos) = fx.run(&data, pos);
        assert_eq!(result, Ok(Progress::Yielded));
        assert_eq!(pos, second_at);

        let mut sink = crate::display::RecordingSink::new();
        fx.scheduler
            .flush(&mut sink, &mut fx.state.textures, &mut fx.loader)
            .unwrap();
        let (result, pos) = fx.run(&data, pos);
        assert_eq!(result, Ok(Progress::Drained));
        assert_eq!(pos, data.len());
    }

    #[test]
    fn test_other_surfaces_do_not_yield() {
        let mut fx = Fixture::new();
        let mut c = CommandStream::new();
        c.new_surface(1, 0, 0, 10, 10, false);
        c.new_surface(2, 0, 0, 10, 10, false);
        let mut nodes = NodeStream::new();
        nodes.insert(0, 0).color(1, [0.0; 4], 0);
        c.set_nodes(1, &nodes);
        c.set_nodes(2, &nodes);
        let data = c.finish();
        assert_eq!(fx.run(&data, 0).0, Ok(Progress::Drained));
    }

    #[test]
    fn test_upload_stalls_until_loaded() {
        let mut fx = Fixture::new();
        let mut c = CommandStream::new();
        c.upload_texture(5, &png_bytes(1, 1));
        let after_upload = c.len();
        c.roundtrip(0, 1);
        let data = c.finish();

        let (result, pos) = fx.run(&data, 0);
        assert_eq!(result, Ok(Progress::Yielded));
        assert_eq!(pos, after_upload);
        assert!(fx.state.outbox.is_empty());

        fx.settle_loads();
        let (result, _) = fx.run(&data, pos);
        assert_eq!(result, Ok(Progress::Drained));
        assert_eq!(fx.state.outbox.len(), 1);
    }

    #[test]
    fn test_replies_echo_serial() {
        let mut fx = Fixture::new();
        let mut c = CommandStream::new();
        c.new_surface(3, 10, 20, 30, 40, true);
        c.roundtrip(3, 0xbeef);
        let data = c.finish();
        assert_eq!(fx.run(&data, 0).0, Ok(Progress::Drained));

        let sent = fx.state.outbox.take();
        assert_eq!(sent.len(), 2);
        let words = |b: &[u8]| -> Vec<u32> {
            b.chunks(4)
                .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                .collect()
        };
        assert_eq!(words(&sent[0]), vec![b'w' as u32, 1, 0, 3, 10, 20, 30, 40]);
        assert_eq!(words(&sent[1]), vec![b'F' as u32, 2, 0, 3, 0xbeef]);
    }

    #[test]
    fn test_restack_only_on_change() {
        let mut fx = Fixture::new();
        let mut c = CommandStream::new();
        c.new_surface(1, 0, 0, 10, 10, false);
        c.new_surface(2, 0, 0, 10, 10, false);
        c.raise(2);
        c.raise(1);
        let data = c.finish();
        fx.run(&data, 0).0.unwrap();

        let restacks: Vec<_> = fx
            .scheduler
            .pending()
            .iter()
            .filter(|m| matches!(m, DisplayMutation::Restack(_)))
            .collect();
        // two from creation, one from raising 1
        assert_eq!(restacks.len(), 3);
        assert_eq!(fx.state.surfaces.stacking(), &[2, 1]);
    }

    #[test]
    fn test_grab_requests_reply() {
        let mut fx = Fixture::new();
        let mut c = CommandStream::new();
        c.new_surface(1, 0, 0, 10, 10, false);
        c.show(1);
        c.grab_pointer(1, false);
        c.hide(1);
        c.ungrab_pointer();
        let data = c.finish();
        fx.run(&data, 0).0.unwrap();

        let codes: Vec<u8> = fx.state.outbox.take().iter().map(|m| m[3]).collect();
        // hiding the grab surface ungrabs with a leave
        assert_eq!(codes, vec![b'w', b'e', b'g', b'l', b'u']);
        assert!(fx.state.input.grab().is_none());
    }

    #[test]
    fn test_transient_and_keyboard() {
        let mut fx = Fixture::new();
        let mut c = CommandStream::new();
        c.new_surface(1, 0, 0, 10, 10, false);
        c.new_surface(2, 0, 0, 10, 10, true);
        c.new_surface(3, 0, 0, 10, 10, false);
        c.transient_for(1, 3);
        c.lower(3);
        c.show_keyboard(true);
        let data = c.finish();
        fx.run(&data, 0).0.unwrap();

        assert_eq!(fx.state.surfaces.stacking(), &[3, 1, 2]);
        assert_eq!(
            fx.scheduler.pending().last(),
            Some(&DisplayMutation::ShowKeyboard(true))
        );

        let mut c = CommandStream::new();
        c.transient_for(3, 42);
        let data = c.finish();
        assert_eq!(fx.run(&data, 0).0, Err(ProtocolError::UnknownSurface(42)));
    }

    #[test]
    fn test_disconnected_stops() {
        let mut fx = Fixture::new();
        let mut c = CommandStream::new();
        c.disconnected();
        c.new_surface(1, 0, 0, 1, 1, false);
        let data = c.finish();
        assert_eq!(fx.run(&data, 0).0, Ok(Progress::Disconnected));
        assert!(fx.state.surfaces.is_empty());
    }

    #[test]
    fn test_destroy_discards_tree() {
        let mut fx = Fixture::new();
        let mut c = CommandStream::new();
        c.new_surface(1, 0, 0, 10, 10, false);
        let mut nodes = NodeStream::new();
        nodes.insert(0, 0).container(1, 1).color(2, [0.0; 4], 0);
        c.set_nodes(1, &nodes);
        c.destroy(1);
        let data = c.finish();
        fx.run(&data, 0).0.unwrap();

        let discarded = fx
            .scheduler
            .pending()
            .iter()
            .filter(|m| matches!(m, DisplayMutation::Discard(_)))
            .count();
        assert_eq!(discarded, 3);
        assert!(fx.state.elements.is_empty());
        assert!(fx.state.surfaces.get(1).is_none());
    }
}
