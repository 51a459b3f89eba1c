//file: lib.rs
// desc: live handwritten digit recognition in the browser

use leptos::*;
use wasm_bindgen::prelude::*;

pub mod error;
pub mod image;
pub mod inference;
pub mod model;
pub mod state;
mod web;

use crate::image::IMAGE_SIZE;
use crate::web::App;

pub use error::{Error, Result};
pub use inference::{LabelScores, recognize_digit};

const CANVAS_SIZE: f64 = 280.0; // 10x scale for better UX

#[derive(Clone, Copy, Debug)]
pub struct AppConfig {
    /// Where the weight record is served from, relative to the page.
    pub model_url: &'static str,
    pub canvas_size: f64,
    pub pixel_size: f64,
    /// Debounce between the last stroke and running inference.
    pub inference_delay_ms: i32,
    pub num_top_classes: usize,
}

pub const APP_CONFIG: AppConfig = AppConfig {
    model_url: "model/mnist.mpk",
    canvas_size: CANVAS_SIZE,
    pixel_size: CANVAS_SIZE / IMAGE_SIZE as f64,
    inference_delay_ms: 150,
    num_top_classes: 10,
};

#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug).ok();
    leptos::mount_to_body(|| view! { <App config=APP_CONFIG/> });
}
