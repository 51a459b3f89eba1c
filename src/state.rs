// file: state.rs
// desc: backend selection and one-time model load

use js_sys::Uint8Array;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::Response;

use crate::error::{Error, Result};
use crate::model::{Model, load_model};

pub type Backend = burn::backend::ndarray::NdArray<f32>;

/// Downloads the weight record and builds the model from it.
pub async fn build_and_load_model(url: &str) -> Result<Model<Backend>> {
    let bytes = fetch_bytes(url).await?;
    log::info!("Fetched {} bytes of model weights from {}", bytes.len(), url);

    let device = <Backend as burn::tensor::backend::Backend>::Device::default();
    load_model(bytes, &device)
}

async fn fetch_bytes(url: &str) -> Result<Vec<u8>> {
    let fetch_error = |reason: String| Error::ModelFetch {
        url: url.to_string(),
        reason,
    };

    let window = web_sys::window().ok_or(Error::NoWindow)?;

    let response = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(|e| fetch_error(format!("{e:?}")))?;
    let response: Response = response
        .dyn_into()
        .map_err(|_| fetch_error("not a Response".to_string()))?;

    if !response.ok() {
        return Err(fetch_error(format!("HTTP {}", response.status())));
    }

    let buffer = response
        .array_buffer()
        .map_err(|e| fetch_error(format!("{e:?}")))?;
    let buffer = JsFuture::from(buffer)
        .await
        .map_err(|e| fetch_error(format!("{e:?}")))?;

    Ok(Uint8Array::new(&buffer).to_vec())
}
