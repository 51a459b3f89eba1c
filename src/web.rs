// file: web.rs
// desc: drawing canvas, live inference and ranked label output

use leptos::*;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent};
use std::rc::Rc;
use std::cell::RefCell;

use crate::AppConfig;
use crate::error::Error;
use crate::image::{IMAGE_SIZE, InputImage};
use crate::inference::{LabelScores, recognize_digit};
use crate::model::Model;
use crate::state::{Backend, build_and_load_model};

thread_local! {
    static INFERENCE_TIMEOUT: Rc<RefCell<PendingTimeout<Closure<dyn FnMut()>>>> =
        Rc::new(RefCell::new(PendingTimeout::default()));
}

#[derive(Clone)]
enum ModelStatus {
    Loading,
    Ready(Rc<Model<Backend>>),
    Failed(Error),
}

#[component]
fn DrawingCanvas(
    config: AppConfig,
    image: ReadSignal<Option<InputImage>>,
    set_image: WriteSignal<Option<InputImage>>,
) -> impl IntoView {
    let canvas_ref = create_node_ref::<leptos::html::Canvas>();
    let (is_drawing, set_is_drawing) = create_signal(false);
    let (last_pixel, set_last_pixel) = create_signal::<Option<(usize, usize)>>(None);

    let canvas_context = create_memo(move |_| {
        canvas_ref.get().and_then(|canvas| {
            let canvas_element = canvas.unchecked_ref::<HtmlCanvasElement>();
            canvas_element
                .get_context("2d")
                .ok()?
                .and_then(|ctx| ctx.dyn_into::<CanvasRenderingContext2d>().ok())
        })
    });

    create_effect(move |_| {
        let current = image.get();

        if let Some(ctx) = canvas_context.get() {
            ctx.set_fill_style_str("#ffffff");
            ctx.fill_rect(0.0, 0.0, config.canvas_size, config.canvas_size);

            // Stored intensities are inverted; show dark ink on white
            if let Some(current) = current {
                for (y, row) in current.rows().enumerate() {
                    for (x, &value) in row.iter().enumerate() {
                        if value > 0 {
                            let shade = 255 - value;
                            ctx.set_fill_style_str(&format!("rgb({shade}, {shade}, {shade})"));
                            let rect_x = x as f64 * config.pixel_size;
                            let rect_y = y as f64 * config.pixel_size;
                            ctx.fill_rect(rect_x, rect_y, config.pixel_size, config.pixel_size);
                        }
                    }
                }
            }

            ctx.set_stroke_style_str("#e0e0e0");
            ctx.set_line_width(1.0);
            ctx.begin_path();

            for i in 0..=IMAGE_SIZE {
                let pos = i as f64 * config.pixel_size;
                ctx.move_to(pos, 0.0);
                ctx.line_to(pos, config.canvas_size);
                ctx.move_to(0.0, pos);
                ctx.line_to(config.canvas_size, pos);
            }
            ctx.stroke();
        }
    });

    let mouse_to_pixel_coords = move |mouse_event: &MouseEvent| -> Option<(usize, usize)> {
        let canvas = canvas_ref.get()?;
        let canvas_element = canvas.unchecked_ref::<HtmlCanvasElement>();
        let rect = canvas_element.get_bounding_client_rect();

        let canvas_x = mouse_event.client_x() as f64 - rect.left();
        let canvas_y = mouse_event.client_y() as f64 - rect.top();
        if canvas_x < 0.0 || canvas_y < 0.0 {
            return None;
        }

        let pixel_x = (canvas_x / config.pixel_size).floor() as usize;
        let pixel_y = (canvas_y / config.pixel_size).floor() as usize;

        if pixel_x < IMAGE_SIZE && pixel_y < IMAGE_SIZE {
            Some((pixel_x, pixel_y))
        } else {
            None
        }
    };

    let draw_pixel = move |x: usize, y: usize| {
        if last_pixel.get_untracked() == Some((x, y)) {
            return;
        }

        set_image.update(|current| {
            current.get_or_insert_with(InputImage::blank).paint(x, y);
        });
        set_last_pixel.set(Some((x, y)));
    };

    let on_mouse_down = move |e: MouseEvent| {
        if let Some((x, y)) = mouse_to_pixel_coords(&e) {
            set_is_drawing.set(true);
            draw_pixel(x, y);
        }
    };

    let on_mouse_move = move |e: MouseEvent| {
        if is_drawing.get_untracked() {
            if let Some((x, y)) = mouse_to_pixel_coords(&e) {
                draw_pixel(x, y);
            }
        }
    };

    let stop_drawing = move || {
        set_is_drawing.set(false);
        set_last_pixel.set(None);
    };

    let clear_canvas = move |_| {
        set_image.set(None);
        set_last_pixel.set(None);
    };

    view! {
        <div class="drawing-container">
            <div class="controls">
                <button on:click=clear_canvas>"Clear"</button>
            </div>

            <div class="canvas-container">
                <canvas
                    class="drawing-canvas"
                    _ref=canvas_ref
                    width=config.canvas_size.to_string()
                    height=config.canvas_size.to_string()
                    on:mousedown=on_mouse_down
                    on:mousemove=on_mouse_move
                    on:mouseup=move |_| stop_drawing()
                    on:mouseleave=move |_| stop_drawing()
                />
            </div>

            <div class="info">
                <p>"Resolution: " {IMAGE_SIZE} "x" {IMAGE_SIZE} " pixels"</p>
                <p>"Pixels inked: " {move || {
                    image.with(|current| current.as_ref().map_or(0, InputImage::ink_count))
                }}</p>
            </div>
        </div>
    }
}

#[component]
fn LabelOutput(
    prediction: ReadSignal<Option<LabelScores>>,
    num_top_classes: usize,
) -> impl IntoView {
    view! {
        <div class="label-output">
            {move || match prediction.get() {
                None => view! { <p class="placeholder">"--"</p> }.into_view(),
                Some(scores) => {
                    let best = scores
                        .best()
                        .map(|(label, _)| label.to_string())
                        .unwrap_or_default();
                    let rows = scores
                        .top(num_top_classes)
                        .into_iter()
                        .map(|(label, score)| {
                            let percent = score * 100.0;
                            view! {
                                <div class="label-row">
                                    <span class="label-name">{label.to_string()}</span>
                                    <div class="label-bar">
                                        <div class="label-fill" style=format!("width: {percent:.1}%")></div>
                                    </div>
                                    <span class="label-score">{format!("{percent:.1}%")}</span>
                                </div>
                            }
                        })
                        .collect_view();

                    view! {
                        <p class="label-best">"Predicted digit: " {best}</p>
                        {rows}
                    }
                    .into_view()
                }
            }}
        </div>
    }
}

/// A scheduled timer id together with the callback it will invoke.
///
/// The callback is owned here so that a cancelled timer frees it.
struct PendingTimeout<C> {
    slot: Option<(i32, C)>,
}

impl<C> Default for PendingTimeout<C> {
    fn default() -> Self {
        Self { slot: None }
    }
}

impl<C> PendingTimeout<C> {
    fn take(&mut self) -> Option<(i32, C)> {
        self.slot.take()
    }

    fn set(&mut self, timeout_id: i32, callback: C) {
        self.slot = Some((timeout_id, callback));
    }
}

/// Debounces inference: a newer request cancels the pending one.
fn schedule_inference(delay_ms: i32, run: impl FnOnce() + 'static) {
    INFERENCE_TIMEOUT.with(|pending| {
        if let Some((timeout_id, stale)) = pending.borrow_mut().take() {
            window().clear_timeout_with_handle(timeout_id);
            drop(stale);
        }

        let closure = Closure::once(run);
        match window().set_timeout_with_callback_and_timeout_and_arguments_0(
            closure.as_ref().unchecked_ref(),
            delay_ms,
        ) {
            Ok(timeout_id) => pending.borrow_mut().set(timeout_id, closure),
            Err(e) => log::error!("Failed to schedule inference: {:?}", e),
        }
    });
}

#[component]
pub fn App(config: AppConfig) -> impl IntoView {
    let (model_status, set_model_status) = create_signal(ModelStatus::Loading);
    let (image, set_image) = create_signal::<Option<InputImage>>(None);
    let (prediction, set_prediction) = create_signal::<Option<LabelScores>>(None);
    let (inference_error, set_inference_error) = create_signal::<Option<Error>>(None);

    spawn_local(async move {
        log::info!("Loading model from {}", config.model_url);
        match build_and_load_model(config.model_url).await {
            Ok(model) => {
                log::info!("Model ready");
                set_model_status.set(ModelStatus::Ready(Rc::new(model)));
            }
            Err(err) => {
                log::error!("{}", err);
                set_model_status.set(ModelStatus::Failed(err));
            }
        }
    });

    // Live mode: every change to the drawing re-runs the classifier
    create_effect(move |_| {
        let current = image.get();
        let ModelStatus::Ready(model) = model_status.get() else {
            return;
        };

        schedule_inference(config.inference_delay_ms, move || {
            match recognize_digit(&model, current.as_ref()) {
                Ok(scores) => {
                    if let Some((label, score)) = scores.as_ref().and_then(LabelScores::best) {
                        log::debug!("Predicted {} ({:.3})", label, score);
                    }
                    set_prediction.set(scores);
                    set_inference_error.set(None);
                }
                Err(err) => {
                    log::error!("Inference failed: {}", err);
                    set_prediction.set(None);
                    set_inference_error.set(Some(err));
                }
            }
        });
    });

    let status = move || match model_status.get() {
        ModelStatus::Loading => Some("Loading model...".to_string()),
        ModelStatus::Failed(err) => Some(format!("Model unavailable: {err}")),
        ModelStatus::Ready(_) => inference_error
            .get()
            .map(|err| format!("Inference failed: {err}")),
    };

    view! {
        <div class="app">
            <style>
                "
                .app {
                    font-family: Arial, sans-serif;
                    max-width: 720px;
                    margin: 0 auto;
                    padding: 20px;
                }

                .panels {
                    display: flex;
                    gap: 24px;
                    align-items: flex-start;
                }

                .drawing-container {
                    text-align: center;
                    user-select: none;
                }

                .controls {
                    margin-bottom: 10px;
                }

                .controls button {
                    padding: 8px 16px;
                    border: 1px solid #ccc;
                    background: #f9f9f9;
                    cursor: pointer;
                    border-radius: 4px;
                }

                .canvas-container {
                    display: inline-block;
                    border: 2px solid #333;
                    border-radius: 4px;
                }

                .info {
                    margin-top: 15px;
                    color: #666;
                    font-size: 14px;
                }

                .label-output {
                    flex: 1;
                    min-width: 240px;
                }

                .label-best {
                    font-size: 18px;
                    font-weight: bold;
                    color: #2196F3;
                }

                .label-row {
                    display: flex;
                    align-items: center;
                    gap: 8px;
                    margin: 4px 0;
                }

                .label-bar {
                    flex: 1;
                    height: 14px;
                    background: #eee;
                    border-radius: 3px;
                }

                .label-fill {
                    height: 100%;
                    background: #2196F3;
                    border-radius: 3px;
                }

                .status {
                    color: #c62828;
                }
                "
            </style>

            <h1>"Digits-RS"</h1>
            <p>"Draw a digit 0-9. Predictions update as you draw."</p>
            <p class="status">{status}</p>

            <div class="panels">
                <DrawingCanvas config=config image=image set_image=set_image/>
                <LabelOutput prediction=prediction num_top_classes=config.num_top_classes/>
            </div>
        </div>
    }
}

fn window() -> web_sys::Window {
    web_sys::window().expect("no window")
}
