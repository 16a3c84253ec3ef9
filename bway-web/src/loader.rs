//! Texture decoding through Blob object URLs

use bway::{LoadError, LoadFuture, Locator, ResourceLoader};
use futures::future::ready;
use js_sys::{Array, Uint8Array};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Blob, BlobPropertyBag, HtmlImageElement, Url};

/// Elements created in the same batch may still be fetching the URL
const REVOKE_DELAY_MS: i32 = 1000;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// Wraps each upload in a `blob:` URL and waits for the browser to decode it
#[derive(Debug, Default)]
pub struct BlobLoader;

fn js_error(e: JsValue) -> LoadError {
    LoadError::Decode(e.as_string().unwrap_or_else(|| format!("{:?}", e)))
}

fn object_url(bytes: &[u8]) -> Result<String, JsValue> {
    let parts = Array::new();
    parts.push(&Uint8Array::from(bytes));
    let options = BlobPropertyBag::new();
    options.set_type("image/png");
    let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &options)?;
    Url::create_object_url_with_blob(&blob)
}

async fn decode(url: String) -> Result<Locator, LoadError> {
    let image = HtmlImageElement::new().map_err(js_error)?;
    image.set_src(&url);
    if let Err(e) = JsFuture::from(image.decode()).await {
        if let Err(e) = Url::revoke_object_url(&url) {
            log::warn!("revoke {} failed: {:?}", url, e);
        }
        return Err(js_error(e));
    }
    Ok(Locator::new(url))
}

impl ResourceLoader for BlobLoader {
    fn load(&mut self, id: u32, bytes: Vec<u8>) -> LoadFuture {
        if !bytes.starts_with(&PNG_SIGNATURE) {
            return Box::pin(ready(Err(LoadError::NotPng)));
        }
        match object_url(&bytes) {
            Ok(url) => {
                log::debug!("texture {}: {} bytes -> {}", id, bytes.len(), url);
                Box::pin(decode(url))
            }
            Err(e) => Box::pin(ready(Err(js_error(e)))),
        }
    }

    fn release(&mut self, locator: &Locator) {
        let url = locator.as_str().to_string();
        let Some(window) = web_sys::window() else {
            return;
        };
        let revoke = Closure::once_into_js(move || {
            if let Err(e) = Url::revoke_object_url(&url) {
                log::warn!("revoke {} failed: {:?}", url, e);
            }
        });
        if let Err(e) = window.set_timeout_with_callback_and_timeout_and_arguments_0(
            revoke.unchecked_ref(),
            REVOKE_DELAY_MS,
        ) {
            log::warn!("could not schedule revoke: {:?}", e);
        }
    }
}
