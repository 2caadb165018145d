//! wasm-bindgen exports that run the page controller against the live DOM.
//!
//! Build with `wasm-pack build --target web --no-default-features --features browser`
//! and place the generated `pkg/` directory inside the server's static directory.

use crate::controller::{
    DETAILS_CONTAINER_ID, Direction, HEADER_ERROR_CLASS, PageController, PageSurface, TicketRef,
    Transport, TransportError, TransportResponse, Visibility,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{Document, Element, HtmlElement, Response, Window};

/// [`Transport`] over the browser's `fetch`.
pub struct FetchTransport {
    window: Window,
}

impl Transport for FetchTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        let value = JsFuture::from(self.window.fetch_with_str(url))
            .await
            .map_err(js_error)?;
        let response: Response = value.dyn_into().map_err(js_error)?;
        let status = response.status();
        let text = JsFuture::from(response.text().map_err(js_error)?)
            .await
            .map_err(js_error)?;
        Ok(TransportResponse {
            status,
            body: text.as_string().unwrap_or_default(),
        })
    }
}

fn js_error(value: JsValue) -> TransportError {
    TransportError(value.as_string().unwrap_or_else(|| format!("{value:?}")))
}

/// The listing page's `<header>` and details container, located once.
pub struct DomPage {
    window: Window,
    document: Document,
    header: Element,
    container: HtmlElement,
}

impl DomPage {
    pub fn locate(window: &Window) -> Result<Self, JsValue> {
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("window has no document"))?;
        let header = document
            .query_selector("header")?
            .ok_or_else(|| JsValue::from_str("page has no <header> element"))?;
        let container = document
            .get_element_by_id(DETAILS_CONTAINER_ID)
            .ok_or_else(|| JsValue::from_str("page has no ticket details container"))?
            .dyn_into::<HtmlElement>()
            .map_err(JsValue::from)?;
        Ok(Self {
            window: window.clone(),
            document,
            header,
            container,
        })
    }
}

impl PageSurface for DomPage {
    fn reload(&mut self) {
        if let Err(err) = self.window.location().reload() {
            web_sys::console::error_1(&err);
        }
    }

    fn append_header_error(&mut self, message: &str) {
        let Ok(paragraph) = self.document.create_element("p") else {
            return;
        };
        paragraph.set_class_name(HEADER_ERROR_CLASS);
        paragraph.set_text_content(Some(message));
        if let Err(err) = self.header.append_child(&paragraph) {
            web_sys::console::error_1(&err);
        }
    }

    fn set_details_html(&mut self, html: &str) {
        self.container.set_inner_html(html);
    }

    fn set_details_visibility(&mut self, visibility: Visibility) {
        if let Err(err) = self
            .container
            .style()
            .set_property("display", visibility.css_value())
        {
            web_sys::console::error_1(&err);
        }
    }

    fn log_failure(&mut self, message: &str) {
        web_sys::console::error_1(&JsValue::from_str(message));
    }
}

fn controller() -> Result<PageController<FetchTransport, DomPage>, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no global window"))?;
    let origin = window.location().origin()?;
    let page = DomPage::locate(&window)?;
    Ok(PageController::new(origin, FetchTransport { window }, page))
}

/// Move the listing to the `"prev"` or `"next"` batch.
#[wasm_bindgen]
pub fn navigate(direction: &str) -> Result<(), JsValue> {
    let direction: Direction = direction
        .parse()
        .map_err(|err: crate::controller::DirectionError| JsValue::from_str(&err.to_string()))?;
    let mut controller = controller()?;
    spawn_local(async move {
        controller.navigate(direction).await;
    });
    Ok(())
}

#[wasm_bindgen(js_name = showTicketDetails)]
pub fn show_ticket_details(ticket_url: &str) -> Result<(), JsValue> {
    let ticket = TicketRef::parse(ticket_url).map_err(|err| JsValue::from_str(&err.to_string()))?;
    let mut controller = controller()?;
    spawn_local(async move {
        controller.show_ticket_details(&ticket).await;
    });
    Ok(())
}

#[wasm_bindgen(js_name = closeTicketDetails)]
pub fn close_ticket_details() -> Result<(), JsValue> {
    controller()?.close_ticket_details();
    Ok(())
}
