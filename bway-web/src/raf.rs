//! requestAnimationFrame loop

use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

type Callback = Closure<dyn FnMut(f64)>;

fn request(callback: &Callback) -> Result<i32, JsValue> {
    web_sys::window()
        .ok_or("no window")?
        .request_animation_frame(callback.as_ref().unchecked_ref())
}

/// Call `tick` on every display refresh for the lifetime of the page
pub fn start(mut tick: impl FnMut(f64) + 'static) -> Result<(), JsValue> {
    let slot: Rc<RefCell<Option<Callback>>> = Rc::new(RefCell::new(None));
    let next = Rc::clone(&slot);

    *slot.borrow_mut() = Some(Closure::new(move |time: f64| {
        tick(time);
        if let Some(callback) = next.borrow().as_ref() {
            if let Err(e) = request(callback) {
                log::error!("animation frame request failed: {:?}", e);
            }
        }
    }));

    match slot.borrow().as_ref() {
        Some(callback) => request(callback).map(|_| ()),
        None => Ok(()),
    }
}
