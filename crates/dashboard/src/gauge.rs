//! Gauge widget bound to one observable field

use crate::field::{ObservableField, SubscriptionId};
use std::cell::RefCell;
use std::rc::Rc;

/// How a gauge presents its field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Decimal digits, zero-padded to at least `padding` characters
    Digits { padding: usize },
    /// Proportional bar, value read as a percentage
    Bar,
}

/// Last rendered state of a gauge
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeFace {
    /// Digit text, set in [`RenderMode::Digits`]
    pub text: String,
    /// Bar width in percent, set in [`RenderMode::Bar`]. Not clamped.
    pub percent: f64,
    /// Renders since binding, including the initial one
    pub renders: u64,
    /// Set by every render, cleared by the drawing surface
    pub dirty: bool,
}

impl GaugeFace {
    fn blank() -> Self {
        Self {
            text: String::new(),
            percent: 0.0,
            renders: 0,
            dirty: false,
        }
    }

    fn render(&mut self, mode: RenderMode, value: f64) {
        match mode {
            RenderMode::Digits { padding } => self.text = zero_pad(value, padding),
            RenderMode::Bar => self.percent = value,
        }
        self.renders += 1;
        self.dirty = true;
    }
}

/// Decimal representation of `value` (truncated toward zero), left-padded
/// with `'0'` to `width` characters. Longer values are never cut.
///
/// A minus sign counts toward the width and stays in front of the zeros.
pub fn zero_pad(value: f64, width: usize) -> String {
    let truncated = value.trunc() as i64;
    format!("{:0width$}", truncated, width = width)
}

/// Display unit re-rendering whenever its bound field changes
///
/// The gauge never owns the field; it only keeps the subscription handle.
pub struct Gauge {
    label: String,
    mode: RenderMode,
    face: Rc<RefCell<GaugeFace>>,
    subscription: SubscriptionId,
}

impl Gauge {
    /// Render from the field's current value and subscribe to its changes
    pub fn bind(label: impl Into<String>, mode: RenderMode, field: &mut ObservableField) -> Self {
        let face = Rc::new(RefCell::new(GaugeFace::blank()));
        face.borrow_mut().render(mode, field.get());

        let target = Rc::clone(&face);
        let subscription = field.subscribe(move |value| target.borrow_mut().render(mode, value));

        Self {
            label: label.into(),
            mode,
            face,
            subscription,
        }
    }

    /// Detach from `field`; the face keeps its last render
    pub fn unbind(&self, field: &mut ObservableField) -> bool {
        field.unsubscribe(self.subscription)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn face(&self) -> GaugeFace {
        self.face.borrow().clone()
    }

    /// Digit text as currently displayed
    pub fn text(&self) -> String {
        self.face.borrow().text.clone()
    }

    /// Bar width as currently displayed
    pub fn percent(&self) -> f64 {
        self.face.borrow().percent
    }

    pub fn render_count(&self) -> u64 {
        self.face.borrow().renders
    }

    /// Whether the gauge rendered since the last call
    pub fn take_dirty(&self) -> bool {
        std::mem::replace(&mut self.face.borrow_mut().dirty, false)
    }
}

impl std::fmt::Debug for Gauge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gauge")
            .field("label", &self.label)
            .field("mode", &self.mode)
            .field("face", &*self.face.borrow())
            .finish()
    }
}
