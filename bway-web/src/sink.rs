//! Render sink over DOM elements
//!
//! Every element is an absolutely positioned `div` (an `img` for textures).
//! Clips get a second, inner `div` shifted back by the clip origin so their
//! children keep surface coordinates.

use bway::scene::{Color, ColorStop, Point, Rect, RoundedRect, Shadow, Transform};
use bway::{ElementId, Locator, RenderSink, Visual};
use std::collections::HashMap;
use wasm_bindgen::prelude::*;
use web_sys::{Document, HtmlElement};

struct Node {
    outer: HtmlElement,
    /// Where children go; same as `outer` except for clips
    inner: HtmlElement,
}

pub struct DomSink {
    document: Document,
    screen: HtmlElement,
    nodes: HashMap<ElementId, Node>,
}

fn report(what: &str, result: Result<(), JsValue>) {
    if let Err(e) = result {
        log::warn!("{}: {:?}", what, e);
    }
}

fn px(v: f32) -> String {
    format!("{}px", v)
}

fn place(el: &HtmlElement, rect: &Rect) -> Result<(), JsValue> {
    let style = el.style();
    style.set_property("left", &px(rect.x))?;
    style.set_property("top", &px(rect.y))?;
    style.set_property("width", &px(rect.width))?;
    style.set_property("height", &px(rect.height))
}

fn radius(outline: &RoundedRect) -> String {
    let [tl, tr, br, bl] = outline.corners;
    format!(
        "{}px {}px {}px {}px / {}px {}px {}px {}px",
        tl.width, tr.width, br.width, bl.width, tl.height, tr.height, br.height, bl.height
    )
}

fn rounded(el: &HtmlElement, outline: &RoundedRect) -> Result<(), JsValue> {
    place(el, &outline.rect)?;
    el.style().set_property("border-radius", &radius(outline))
}

fn box_shadow(color: Color, dx: f32, dy: f32, blur: f32, spread: f32, inset: bool) -> String {
    format!(
        "{}{}px {}px {}px {}px {}",
        if inset { "inset " } else { "" },
        dx,
        dy,
        blur,
        spread,
        color.css()
    )
}

/// CSS angle of the gradient line; 0deg points up
fn gradient_angle(start: Point, end: Point) -> f32 {
    (end.x - start.x).atan2(start.y - end.y).to_degrees()
}

fn linear_gradient(start: Point, end: Point, stops: &[ColorStop]) -> String {
    let stops: Vec<String> = stops
        .iter()
        .map(|s| format!("{} {}%", s.color.css(), s.offset * 100.0))
        .collect();
    format!(
        "linear-gradient({}deg, {})",
        gradient_angle(start, end),
        stops.join(", ")
    )
}

fn drop_shadows(shadows: &[Shadow]) -> String {
    shadows
        .iter()
        .map(|s| format!("drop-shadow({}px {}px {}px {})", s.dx, s.dy, s.radius, s.color.css()))
        .collect::<Vec<_>>()
        .join(" ")
}

impl DomSink {
    pub fn new(document: Document, screen: HtmlElement) -> Self {
        Self {
            document,
            screen,
            nodes: HashMap::new(),
        }
    }

    fn div(&self) -> Result<HtmlElement, JsValue> {
        let el: HtmlElement = self.document.create_element("div")?.dyn_into()?;
        el.style().set_property("position", "absolute")?;
        Ok(el)
    }

    fn build(&self, visual: &Visual, image: Option<&Locator>) -> Result<Node, JsValue> {
        let el = match visual {
            Visual::Texture { rect, .. } => {
                let img: HtmlElement = self.document.create_element("img")?.dyn_into()?;
                img.style().set_property("position", "absolute")?;
                place(&img, rect)?;
                if let Some(locator) = image {
                    img.set_attribute("src", locator.as_str())?;
                }
                img
            }
            Visual::Color { rect, color } => {
                let el = self.div()?;
                place(&el, rect)?;
                el.style().set_property("background-color", &color.css())?;
                el
            }
            Visual::Border {
                outline,
                widths,
                colors,
            } => {
                let el = self.div()?;
                rounded(&el, outline)?;
                let style = el.style();
                style.set_property("box-sizing", "border-box")?;
                style.set_property("border-style", "solid")?;
                style.set_property(
                    "border-width",
                    &format!("{}px {}px {}px {}px", widths[0], widths[1], widths[2], widths[3]),
                )?;
                style.set_property(
                    "border-color",
                    &format!(
                        "{} {} {} {}",
                        colors[0].css(),
                        colors[1].css(),
                        colors[2].css(),
                        colors[3].css()
                    ),
                )?;
                el
            }
            Visual::OutsetShadow {
                outline,
                color,
                dx,
                dy,
                spread,
                blur,
            } => {
                let el = self.div()?;
                rounded(&el, outline)?;
                el.style()
                    .set_property("box-shadow", &box_shadow(*color, *dx, *dy, *blur, *spread, false))?;
                el
            }
            Visual::InsetShadow {
                outline,
                color,
                dx,
                dy,
                spread,
                blur,
            } => {
                let el = self.div()?;
                rounded(&el, outline)?;
                el.style()
                    .set_property("box-shadow", &box_shadow(*color, *dx, *dy, *blur, *spread, true))?;
                el
            }
            Visual::LinearGradient {
                rect,
                start,
                end,
                stops,
            } => {
                let el = self.div()?;
                place(&el, rect)?;
                el.style()
                    .set_property("background-image", &linear_gradient(*start, *end, stops))?;
                el
            }
            Visual::Clip(rect) => return self.clip(rect, None),
            Visual::RoundedClip(outline) => return self.clip(&outline.rect, Some(outline)),
            Visual::Transform(transform) => {
                let el = self.div()?;
                el.style().set_property("transform-origin", "0 0")?;
                el.style().set_property("transform", &transform.css())?;
                el
            }
            Visual::Opacity(opacity) => {
                let el = self.div()?;
                el.style().set_property("opacity", &opacity.to_string())?;
                el
            }
            Visual::Shadow(shadows) => {
                let el = self.div()?;
                el.style().set_property("filter", &drop_shadows(shadows))?;
                el
            }
            Visual::DebugLabel(label) => {
                let el = self.div()?;
                el.set_attribute("data-debug", label)?;
                el
            }
            Visual::Container => self.div()?,
        };
        Ok(Node {
            inner: el.clone(),
            outer: el,
        })
    }

    fn clip(&self, rect: &Rect, outline: Option<&RoundedRect>) -> Result<Node, JsValue> {
        let outer = self.div()?;
        match outline {
            Some(outline) => rounded(&outer, outline)?,
            None => place(&outer, rect)?,
        }
        outer.style().set_property("overflow", "hidden")?;
        let inner = self.div()?;
        inner.style().set_property("left", &px(-rect.x))?;
        inner.style().set_property("top", &px(-rect.y))?;
        outer.append_child(&inner)?;
        Ok(Node { outer, inner })
    }

    fn try_create_root(
        &mut self,
        surface: u16,
        element: ElementId,
        x: i16,
        y: i16,
        width: u16,
        height: u16,
    ) -> Result<(), JsValue> {
        let el = self.div()?;
        el.set_class_name("surface");
        el.set_attribute("data-surface", &surface.to_string())?;
        place(
            &el,
            &Rect {
                x: x as f32,
                y: y as f32,
                width: width as f32,
                height: height as f32,
            },
        )?;
        el.style().set_property("display", "none")?;
        self.screen.append_child(&el)?;
        self.nodes.insert(
            element,
            Node {
                inner: el.clone(),
                outer: el,
            },
        );
        Ok(())
    }

    fn try_insert(
        &self,
        parent: ElementId,
        before: Option<web_sys::Node>,
        child: ElementId,
    ) -> Result<(), JsValue> {
        let (Some(parent), Some(child)) = (self.nodes.get(&parent), self.nodes.get(&child)) else {
            return Err(JsValue::from_str("unknown element"));
        };
        parent
            .inner
            .insert_before(&child.outer, before.as_ref())
            .map(|_| ())
    }
}

impl RenderSink for DomSink {
    fn create_root(&mut self, surface: u16, element: ElementId, x: i16, y: i16, width: u16, height: u16) {
        let result = self.try_create_root(surface, element, x, y, width, height);
        report("create surface", result);
    }

    fn create(&mut self, element: ElementId, visual: &Visual, image: Option<&Locator>) {
        match self.build(visual, image) {
            Ok(node) => {
                self.nodes.insert(element, node);
            }
            Err(e) => log::warn!("create {:?}: {:?}", visual.kind(), e),
        }
    }

    fn append(&mut self, parent: ElementId, child: ElementId) {
        report("append", self.try_insert(parent, None, child));
    }

    fn insert_after(&mut self, parent: ElementId, sibling: Option<ElementId>, child: ElementId) {
        let before = match sibling {
            Some(sibling) => self
                .nodes
                .get(&sibling)
                .and_then(|n| n.outer.next_sibling()),
            None => self.nodes.get(&parent).and_then(|n| n.inner.first_child()),
        };
        report("insert", self.try_insert(parent, before, child));
    }

    fn remove(&mut self, element: ElementId) {
        if let Some(node) = self.nodes.get(&element) {
            node.outer.remove();
        }
    }

    fn discard(&mut self, element: ElementId) {
        if let Some(node) = self.nodes.remove(&element) {
            node.outer.remove();
        }
    }

    fn reposition(&mut self, element: ElementId, x: i16, y: i16) {
        if let Some(node) = self.nodes.get(&element) {
            let style = node.outer.style();
            report("move", style.set_property("left", &format!("{}px", x)));
            report("move", style.set_property("top", &format!("{}px", y)));
        }
    }

    fn resize(&mut self, element: ElementId, width: u16, height: u16) {
        if let Some(node) = self.nodes.get(&element) {
            let style = node.outer.style();
            report("resize", style.set_property("width", &format!("{}px", width)));
            report("resize", style.set_property("height", &format!("{}px", height)));
        }
    }

    fn set_image(&mut self, element: ElementId, image: Option<&Locator>) {
        let Some(node) = self.nodes.get(&element) else {
            return;
        };
        let result = match image {
            Some(locator) => node.outer.set_attribute("src", locator.as_str()),
            None => node.outer.remove_attribute("src"),
        };
        report("set image", result);
    }

    fn set_transform(&mut self, element: ElementId, transform: &Transform) {
        if let Some(node) = self.nodes.get(&element) {
            report(
                "transform",
                node.outer.style().set_property("transform", &transform.css()),
            );
        }
    }

    fn set_visible(&mut self, element: ElementId, visible: bool) {
        if let Some(node) = self.nodes.get(&element) {
            let display = if visible { "block" } else { "none" };
            report("visibility", node.outer.style().set_property("display", display));
        }
    }

    fn restack(&mut self, order: &[ElementId]) {
        for (z, element) in order.iter().enumerate() {
            if let Some(node) = self.nodes.get(element) {
                report(
                    "restack",
                    node.outer.style().set_property("z-index", &z.to_string()),
                );
            }
        }
    }

    fn show_keyboard(&mut self, show: bool) {
        let result = if show {
            self.screen.class_list().add_1("keyboard")
        } else {
            self.screen.class_list().remove_1("keyboard")
        };
        report("keyboard", result);
    }
}
