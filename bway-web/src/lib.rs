//! bway-web - Broadway client in WebAssembly
//!
//! Connects to a Broadway daemon (directly or through `bway serve`), renders
//! its surfaces as DOM elements and forwards page input. The page calls
//! [`init`] once and routes its DOM events to the `handle_*` exports.

mod input;
mod loader;
mod raf;
mod sink;

use bway::protocol::TouchPhase;
use bway::{Client, Progress, ProtocolError};
use futures::future::join_all;
use js_sys::{ArrayBuffer, Uint8Array};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use web_sys::{BinaryType, KeyboardEvent, MessageEvent, MouseEvent, TouchEvent, WebSocket, WheelEvent};

pub use loader::BlobLoader;
pub use sink::DomSink;

struct App {
    client: Client<BlobLoader>,
    sink: DomSink,
    socket: WebSocket,
    /// The halt has been shown to the user
    halt_reported: bool,
}

impl App {
    fn send_outgoing(&mut self) {
        for msg in self.client.take_outgoing() {
            if let Err(e) = self.socket.send_with_u8_array(&msg) {
                log::warn!("send failed: {:?}", e);
            }
        }
    }
}

/// Global client instance
thread_local! {
    static APP: RefCell<Option<Rc<RefCell<App>>>> = const { RefCell::new(None) };
}

fn now() -> u32 {
    web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now() as u32)
        .unwrap_or(0)
}

/// Run `f` against the client, then push whatever it queued to the socket
fn with_app(f: impl FnOnce(&mut App)) {
    let Some(app) = APP.with(|a| a.borrow().clone()) else {
        return;
    };
    let mut app = app.borrow_mut();
    app.client.set_time(now());
    f(&mut app);
    app.send_outgoing();
}

/// Hand new texture loads to the browser, flush replies
fn settle(app: &Rc<RefCell<App>>, result: Result<Progress, ProtocolError>) {
    let loads = {
        let mut app = app.borrow_mut();
        if let Err(e) = result {
            if !app.halt_reported {
                app.halt_reported = true;
                log::error!("client halted: {}", e);
            }
        }
        app.send_outgoing();
        app.client.take_texture_loads()
    };
    if loads.is_empty() {
        return;
    }

    let app = Rc::clone(app);
    wasm_bindgen_futures::spawn_local(async move {
        for outcome in join_all(loads).await {
            let result = app.borrow_mut().client.texture_loaded(outcome);
            settle(&app, result);
        }
    });
}

fn on_message(app: &Rc<RefCell<App>>, event: MessageEvent) {
    let Ok(buffer) = event.data().dyn_into::<ArrayBuffer>() else {
        log::warn!("ignoring non-binary message");
        return;
    };
    let bytes = Uint8Array::new(&buffer).to_vec();
    let result = {
        let mut app = app.borrow_mut();
        app.client.set_time(now());
        app.client.receive(bytes)
    };
    settle(app, result);
}

fn on_frame(app: &Rc<RefCell<App>>) {
    let result = {
        let mut guard = app.borrow_mut();
        let App { client, sink, .. } = &mut *guard;
        if !client.is_connected() || client.halted().is_some() {
            return;
        }
        client.frame(sink)
    };
    settle(app, result);
}

/// Connect to `url` and render into the element with id `screen_id`
#[wasm_bindgen]
pub async fn init(screen_id: &str, url: &str) -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();

    log::info!("bway-web connecting to {}", url);

    let window = web_sys::window().ok_or("no window")?;
    let document = window.document().ok_or("no document")?;
    let screen = document
        .get_element_by_id(screen_id)
        .ok_or("screen element not found")?
        .dyn_into::<web_sys::HtmlElement>()?;
    let (width, height) = (screen.client_width() as u32, screen.client_height() as u32);

    let socket = WebSocket::new_with_str(url, "broadway")?;
    socket.set_binary_type(BinaryType::Arraybuffer);

    let app = Rc::new(RefCell::new(App {
        client: Client::new(BlobLoader),
        sink: DomSink::new(document, screen),
        socket: socket.clone(),
        halt_reported: false,
    }));

    APP.with(|a| {
        *a.borrow_mut() = Some(Rc::clone(&app));
    });

    let onopen = Closure::<dyn FnMut()>::new(move || {
        log::info!("connected, screen {}x{}", width, height);
        with_app(|app| app.client.screen_resized(width, height));
    });
    socket.set_onopen(Some(onopen.as_ref().unchecked_ref()));
    onopen.forget();

    let message_app = Rc::clone(&app);
    let onmessage = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
        on_message(&message_app, event);
    });
    socket.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
    onmessage.forget();

    let close_app = Rc::clone(&app);
    let onclose = Closure::<dyn FnMut()>::new(move || {
        log::info!("disconnected");
        close_app.borrow_mut().client.disconnect();
    });
    socket.set_onclose(Some(onclose.as_ref().unchecked_ref()));
    onclose.forget();

    raf::start(move |_| on_frame(&app))?;

    Ok(())
}

#[wasm_bindgen]
pub fn handle_mousemove(event: &MouseEvent) {
    with_app(|app| {
        app.client.pointer_motion(
            event.client_x(),
            event.client_y(),
            input::mouse_modifiers(event),
        )
    });
}

#[wasm_bindgen]
pub fn handle_mousedown(event: &MouseEvent) {
    with_app(|app| {
        app.client.button_press(
            event.client_x(),
            event.client_y(),
            input::button(event.button()),
            input::mouse_modifiers(event),
        )
    });
}

#[wasm_bindgen]
pub fn handle_mouseup(event: &MouseEvent) {
    with_app(|app| {
        app.client.button_release(
            event.client_x(),
            event.client_y(),
            input::button(event.button()),
            input::mouse_modifiers(event),
        )
    });
}

#[wasm_bindgen]
pub fn handle_wheel(event: &WheelEvent) {
    let Some(direction) = input::scroll_direction(event) else {
        return;
    };
    with_app(|app| {
        app.client.scroll(
            event.client_x(),
            event.client_y(),
            direction,
            input::mouse_modifiers(event),
        )
    });
}

fn touches(event: &TouchEvent, phase: TouchPhase) {
    let state = input::modifiers(event.shift_key(), event.ctrl_key(), event.alt_key());
    let changed = event.changed_touches();
    with_app(|app| {
        for i in 0..changed.length() {
            if let Some(touch) = changed.get(i) {
                app.client.touch(
                    phase,
                    touch.identifier() as u32,
                    touch.client_x(),
                    touch.client_y(),
                    state,
                );
            }
        }
    });
}

#[wasm_bindgen]
pub fn handle_touchstart(event: &TouchEvent) {
    touches(event, TouchPhase::Begin);
}

#[wasm_bindgen]
pub fn handle_touchmove(event: &TouchEvent) {
    touches(event, TouchPhase::Update);
}

#[wasm_bindgen]
pub fn handle_touchend(event: &TouchEvent) {
    touches(event, TouchPhase::End);
}

#[wasm_bindgen]
pub fn handle_touchcancel(event: &TouchEvent) {
    touches(event, TouchPhase::Cancel);
}

/// Returns true when the page should suppress the browser default
#[wasm_bindgen]
pub fn handle_keydown(event: &KeyboardEvent) -> bool {
    let code = event.code();
    with_app(|app| {
        app.client
            .key_down(&code, event.key_code(), input::key_modifiers(event))
    });
    bway::keysym::function_key(&code).is_some() || event.ctrl_key()
}

/// Character produced by the key just pressed
#[wasm_bindgen]
pub fn handle_keypress(event: &KeyboardEvent) {
    let key = event.key();
    if key.chars().count() == 1 {
        with_app(|app| app.client.key_input(&key));
    }
}

#[wasm_bindgen]
pub fn handle_keyup(event: &KeyboardEvent) {
    with_app(|app| {
        app.client
            .key_up(&event.code(), event.key_code(), input::key_modifiers(event))
    });
}

#[wasm_bindgen]
pub fn handle_resize(width: u32, height: u32) {
    with_app(|app| app.client.screen_resized(width, height));
}

/// Ask the daemon to close a surface
#[wasm_bindgen]
pub fn close_surface(surface: u16) {
    with_app(|app| app.client.request_close(surface));
}
