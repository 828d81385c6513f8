//! X11 backend.
//!
//! The foreground source watches `_NET_ACTIVE_WINDOW` and reports the WM_CLASS
//! instance of the active window as the application identifier. The overlay
//! is an override-redirect window covering the screen, so the window manager
//! never gives it focus and it never shows up as a foreground change itself.

use super::{now_millis, ForegroundEvent, ForegroundSource, HomeScreen, OverlaySurface, SurfaceId};
use crate::db::safe_lock;
use crate::error::AppError;
use crate::monitor::MonitorHandle;
use crate::overlay::{fallback_glyph, ActionButton, Badge, OverlayAction, OverlayContent};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    Atom, AtomEnum, ChangeGCAux, ChangeWindowAttributesAux, ClientMessageEvent,
    ConfigureWindowAux, ConnectionExt, CreateGCAux, CreateWindowAux, EventMask, Font, Gcontext,
    Rectangle, StackMode, Visualid, Window, WindowClass,
};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

const CARD_WIDTH: u16 = 360;
const CARD_HEIGHT: u16 = 240;
const PADDING: u16 = 20;
const BUTTON_WIDTH: u16 = 140;
const BUTTON_HEIGHT: u16 = 36;
/// Advance of the core "fixed" font.
const CHAR_WIDTH: u16 = 6;

const CARD_RGB: u32 = 0x00FF_FFFF;
const TEXT_RGB: u32 = 0x0020_2020;
const BADGE_RGB: u32 = 0x00DD_DDDD;
const BUTTON_RGB: u32 = 0x0033_66CC;
const BUTTON_TEXT_RGB: u32 = 0x00FF_FFFF;
const DISABLED_RGB: u32 = 0x0099_9999;

fn x11_err(e: impl Display) -> AppError {
    AppError::Platform(e.to_string())
}

fn intern(conn: &RustConnection, name: &str) -> Result<Atom, AppError> {
    Ok(conn
        .intern_atom(false, name.as_bytes())
        .map_err(x11_err)?
        .reply()
        .map_err(x11_err)?
        .atom)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub fn contains(&self, px: i16, py: i16) -> bool {
        let (px, py) = (i32::from(px), i32::from(py));
        let (x, y) = (i32::from(self.x), i32::from(self.y));
        px >= x
            && py >= y
            && px < x + i32::from(self.width)
            && py < y + i32::from(self.height)
    }

    fn to_x11(self) -> Rectangle {
        Rectangle {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

/// Where each part of the card sits, in overlay window coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardLayout {
    pub card: Rect,
    pub badge: Rect,
    pub title_y: i16,
    pub message_y: i16,
    pub close: Rect,
    pub grace: Option<Rect>,
}

fn to_i16(v: u16) -> i16 {
    i16::try_from(v).unwrap_or(i16::MAX)
}

fn centered(outer: u16, inner: u16) -> i16 {
    to_i16(outer.saturating_sub(inner) / 2)
}

fn offset(base: i16, by: u16) -> i16 {
    base.saturating_add(to_i16(by))
}

pub fn layout(
    screen_width: u16,
    screen_height: u16,
    icon_size: u16,
    with_grace: bool,
) -> CardLayout {
    let icon_size = icon_size.min(CARD_WIDTH);
    let card = Rect {
        x: centered(screen_width, CARD_WIDTH),
        y: centered(screen_height, CARD_HEIGHT),
        width: CARD_WIDTH,
        height: CARD_HEIGHT,
    };
    let badge = Rect {
        x: offset(card.x, (CARD_WIDTH - icon_size) / 2),
        y: offset(card.y, PADDING),
        width: icon_size,
        height: icon_size,
    };
    let title_y = offset(badge.y, icon_size.saturating_add(24));
    let message_y = offset(title_y, 22);

    let buttons_y = offset(card.y, CARD_HEIGHT - PADDING - BUTTON_HEIGHT);
    let button_at = |x: i16| Rect {
        x,
        y: buttons_y,
        width: BUTTON_WIDTH,
        height: BUTTON_HEIGHT,
    };
    let (close, grace) = if with_grace {
        (
            button_at(offset(card.x, PADDING)),
            Some(button_at(offset(card.x, CARD_WIDTH - PADDING - BUTTON_WIDTH))),
        )
    } else {
        (button_at(offset(card.x, (CARD_WIDTH - BUTTON_WIDTH) / 2)), None)
    };

    CardLayout {
        card,
        badge,
        title_y,
        message_y,
        close,
        grace,
    }
}

/// Which button, if any, a click at (`x`, `y`) pressed. Disabled buttons do nothing.
pub fn hit_test(
    layout: &CardLayout,
    content: &OverlayContent,
    x: i16,
    y: i16,
) -> Option<OverlayAction> {
    if layout.close.contains(x, y) && content.primary.enabled {
        return Some(content.primary.action);
    }
    match (&layout.grace, &content.grace) {
        (Some(rect), Some(button)) if button.enabled && rect.contains(x, y) => Some(button.action),
        _ => None,
    }
}

/// Core fonts only draw Latin-1; anything outside printable ASCII becomes `?`.
fn ascii_text(text: &str, max_chars: u16) -> Vec<u8> {
    text.chars()
        .map(|c| match u8::try_from(c) {
            Ok(b) if b.is_ascii_graphic() || b == b' ' => b,
            Ok(_) | Err(_) => b'?',
        })
        .take(usize::from(max_chars))
        .collect()
}

fn text_x(area: Rect, bytes: &[u8]) -> i16 {
    let len = u16::try_from(bytes.len()).unwrap_or(u16::MAX);
    offset(area.x, area.width.saturating_sub(len.saturating_mul(CHAR_WIDTH)) / 2)
}

#[derive(Debug, Clone, Copy)]
struct ScreenInfo {
    root: Window,
    depth: u8,
    visual: Visualid,
    width: u16,
    height: u16,
}

fn screen_info(conn: &RustConnection, screen_num: usize) -> Result<ScreenInfo, AppError> {
    let screen = conn.setup().roots.get(screen_num).ok_or_else(|| {
        AppError::Platform(format!(
            "invalid screen number {screen_num} ({} screens available)",
            conn.setup().roots.len()
        ))
    })?;
    Ok(ScreenInfo {
        root: screen.root,
        depth: screen.root_depth,
        visual: screen.root_visual,
        width: screen.width_in_pixels,
        height: screen.height_in_pixels,
    })
}

/// Home screen and overlay surface sharing one display connection.
pub struct X11Backend {
    pub home: X11HomeScreen,
    pub surface: X11OverlaySurface,
}

impl X11Backend {
    /// Connect to the display named by `$DISPLAY`. Taps on overlay buttons are
    /// posted to `handle`.
    pub fn connect(handle: &MonitorHandle) -> Result<Self, AppError> {
        let (conn, screen_num) = x11rb::connect(None).map_err(x11_err)?;
        let screen = screen_info(&conn, screen_num)?;
        let showing_desktop = intern(&conn, "_NET_SHOWING_DESKTOP")?;

        let font = conn.generate_id().map_err(x11_err)?;
        conn.open_font(font, b"fixed").map_err(x11_err)?;

        let conn = Arc::new(conn);
        let windows = Arc::new(Mutex::new(HashMap::new()));
        spawn_event_thread(Arc::clone(&conn), Arc::clone(&windows), handle.clone())?;

        Ok(Self {
            home: X11HomeScreen {
                conn: Arc::clone(&conn),
                root: screen.root,
                showing_desktop,
            },
            surface: X11OverlaySurface {
                conn,
                screen,
                font,
                windows,
            },
        })
    }
}

/// Asks the window manager to show the desktop.
pub struct X11HomeScreen {
    conn: Arc<RustConnection>,
    root: Window,
    showing_desktop: Atom,
}

impl X11HomeScreen {
    fn send_show_desktop(&self) -> Result<(), AppError> {
        let event =
            ClientMessageEvent::new(32, self.root, self.showing_desktop, [1u32, 0, 0, 0, 0]);
        self.conn
            .send_event(
                false,
                self.root,
                EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY,
                event,
            )
            .map_err(x11_err)?;
        self.conn.flush().map_err(x11_err)
    }
}

impl HomeScreen for X11HomeScreen {
    fn go_home(&self) {
        if let Err(e) = self.send_show_desktop() {
            warn!("Failed to show desktop: {e}");
        }
    }
}

struct MappedOverlay {
    content: OverlayContent,
    gc: Gcontext,
    layout: CardLayout,
}

type WindowMap = Arc<Mutex<HashMap<Window, MappedOverlay>>>;

pub struct X11OverlaySurface {
    conn: Arc<RustConnection>,
    screen: ScreenInfo,
    font: Font,
    windows: WindowMap,
}

fn window_of(id: SurfaceId) -> Result<Window, AppError> {
    Window::try_from(id.0).map_err(|_| AppError::Platform(format!("{id:?} is not an X11 window")))
}

impl OverlaySurface for X11OverlaySurface {
    fn attach(&mut self, content: &OverlayContent) -> Result<SurfaceId, AppError> {
        let conn = &self.conn;
        let window = conn.generate_id().map_err(x11_err)?;
        // The root visual has no alpha channel, so the dim layer is drawn
        // opaque in its RGB part.
        let aux = CreateWindowAux::new()
            .background_pixel(content.dim_argb & 0x00FF_FFFF)
            .override_redirect(1u32)
            .event_mask(EventMask::EXPOSURE | EventMask::BUTTON_PRESS);
        conn.create_window(
            self.screen.depth,
            window,
            self.screen.root,
            0,
            0,
            self.screen.width,
            self.screen.height,
            0,
            WindowClass::INPUT_OUTPUT,
            self.screen.visual,
            &aux,
        )
        .map_err(x11_err)?;

        let gc = conn.generate_id().map_err(x11_err)?;
        conn.create_gc(gc, window, &CreateGCAux::new().font(self.font))
            .map_err(x11_err)?;

        let mapped = MappedOverlay {
            content: content.clone(),
            gc,
            layout: layout(
                self.screen.width,
                self.screen.height,
                content.icon_size,
                content.grace.is_some(),
            ),
        };
        // Registered before mapping so the first Expose finds it.
        safe_lock(&self.windows, "overlay windows").insert(window, mapped);

        conn.map_window(window).map_err(x11_err)?;
        conn.configure_window(window, &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE))
            .map_err(x11_err)?;
        conn.flush().map_err(x11_err)?;
        debug!("Mapped overlay window {window:#x}");
        Ok(SurfaceId(u64::from(window)))
    }

    fn update(&mut self, id: SurfaceId, content: &OverlayContent) -> Result<(), AppError> {
        let window = window_of(id)?;
        let mut windows = safe_lock(&self.windows, "overlay windows");
        let mapped = windows
            .get_mut(&window)
            .ok_or_else(|| AppError::Platform(format!("overlay window {window:#x} is gone")))?;
        mapped.content = content.clone();
        draw(&self.conn, window, mapped)?;
        self.conn.flush().map_err(x11_err)
    }

    fn release(&mut self, id: SurfaceId) -> Result<(), AppError> {
        let window = window_of(id)?;
        let mapped = safe_lock(&self.windows, "overlay windows")
            .remove(&window)
            .ok_or_else(|| AppError::Platform(format!("overlay window {window:#x} is gone")))?;
        self.conn.free_gc(mapped.gc).map_err(x11_err)?;
        self.conn.destroy_window(window).map_err(x11_err)?;
        self.conn.flush().map_err(x11_err)
    }
}

fn set_colors(conn: &RustConnection, gc: Gcontext, fg: u32, bg: u32) -> Result<(), AppError> {
    conn.change_gc(gc, &ChangeGCAux::new().foreground(fg).background(bg))
        .map_err(x11_err)?;
    Ok(())
}

fn fill(conn: &RustConnection, window: Window, gc: Gcontext, rect: Rect) -> Result<(), AppError> {
    conn.poly_fill_rectangle(window, gc, &[rect.to_x11()])
        .map_err(x11_err)?;
    Ok(())
}

fn text(
    conn: &RustConnection,
    window: Window,
    gc: Gcontext,
    x: i16,
    y: i16,
    bytes: &[u8],
) -> Result<(), AppError> {
    conn.image_text8(window, gc, x, y, bytes).map_err(x11_err)?;
    Ok(())
}

fn draw_button(
    conn: &RustConnection,
    window: Window,
    gc: Gcontext,
    rect: Rect,
    button: &ActionButton,
) -> Result<(), AppError> {
    let bg = if button.enabled { BUTTON_RGB } else { DISABLED_RGB };
    set_colors(conn, gc, bg, bg)?;
    fill(conn, window, gc, rect)?;
    set_colors(conn, gc, BUTTON_TEXT_RGB, bg)?;
    let label = ascii_text(&button.label, rect.width / CHAR_WIDTH);
    text(conn, window, gc, text_x(rect, &label), offset(rect.y, rect.height / 2 + 4), &label)
}

fn draw(conn: &RustConnection, window: Window, mapped: &MappedOverlay) -> Result<(), AppError> {
    let MappedOverlay { content, gc, layout } = mapped;
    let gc = *gc;
    let max_chars = (CARD_WIDTH - 2 * PADDING) / CHAR_WIDTH;

    set_colors(conn, gc, CARD_RGB, CARD_RGB)?;
    fill(conn, window, gc, layout.card)?;

    // Icons need an image decoder; the badge always shows the glyph here.
    let glyph = match &content.badge {
        Badge::Glyph(c) => *c,
        Badge::Icon(_) => fallback_glyph(&content.title),
    };
    set_colors(conn, gc, BADGE_RGB, BADGE_RGB)?;
    fill(conn, window, gc, layout.badge)?;
    set_colors(conn, gc, TEXT_RGB, BADGE_RGB)?;
    let glyph = ascii_text(&glyph.to_string(), 1);
    text(
        conn,
        window,
        gc,
        text_x(layout.badge, &glyph),
        offset(layout.badge.y, layout.badge.height / 2 + 4),
        &glyph,
    )?;

    set_colors(conn, gc, TEXT_RGB, CARD_RGB)?;
    let title = ascii_text(&content.title, max_chars);
    text(conn, window, gc, text_x(layout.card, &title), layout.title_y, &title)?;
    let message = ascii_text(&content.message, max_chars);
    text(conn, window, gc, text_x(layout.card, &message), layout.message_y, &message)?;

    draw_button(conn, window, gc, layout.close, &content.primary)?;
    if let (Some(rect), Some(button)) = (layout.grace, &content.grace) {
        draw_button(conn, window, gc, rect, button)?;
    }
    Ok(())
}

fn spawn_event_thread(
    conn: Arc<RustConnection>,
    windows: WindowMap,
    handle: MonitorHandle,
) -> Result<JoinHandle<()>, AppError> {
    let thread = thread::Builder::new()
        .name("x11-overlay-events".into())
        .spawn(move || run_events(&conn, &windows, &handle))?;
    Ok(thread)
}

#[allow(
    clippy::wildcard_enum_match_arm,
    reason = "only Expose and ButtonPress matter; x11rb has dozens of event variants"
)]
fn run_events(conn: &RustConnection, windows: &WindowMap, handle: &MonitorHandle) {
    loop {
        let event = match conn.wait_for_event() {
            Ok(event) => event,
            Err(e) => {
                warn!("X11 event loop stopped: {e}");
                return;
            }
        };
        match event {
            Event::Expose(e) if e.count == 0 => {
                let windows = safe_lock(windows, "overlay windows");
                if let Some(mapped) = windows.get(&e.window) {
                    let drawn = draw(conn, e.window, mapped)
                        .and_then(|()| conn.flush().map_err(x11_err));
                    if let Err(err) = drawn {
                        warn!("Failed to draw overlay: {err}");
                    }
                }
            }
            Event::ButtonPress(e) => {
                let action = safe_lock(windows, "overlay windows")
                    .get(&e.event)
                    .and_then(|m| hit_test(&m.layout, &m.content, e.event_x, e.event_y));
                if let Some(action) = action {
                    debug!("Overlay button pressed: {action:?}");
                    handle.overlay_action(action);
                }
            }
            _ => {}
        }
    }
}

/// Report a foreground change every time `_NET_ACTIVE_WINDOW` moves to
/// another window.
///
/// Blocks on `PropertyNotify` from the root window over its own display
/// connection. Stopping the returned source sends a client message to a
/// private input-only window, which wakes the thread. It also stops when the
/// monitor queue closes.
#[allow(
    clippy::wildcard_enum_match_arm,
    reason = "only the active window property and the wake message matter"
)]
pub fn spawn_foreground_source(handle: MonitorHandle) -> Result<ForegroundSource, AppError> {
    let (conn, screen_num) = x11rb::connect(None).map_err(x11_err)?;
    let root = screen_info(&conn, screen_num)?.root;
    let active_window = intern(&conn, "_NET_ACTIVE_WINDOW")?;
    let stop_atom = intern(&conn, "_FOCUSGUARD_STOP")?;

    let wake_window = conn.generate_id().map_err(x11_err)?;
    conn.create_window(
        x11rb::COPY_DEPTH_FROM_PARENT,
        wake_window,
        root,
        0,
        0,
        1,
        1,
        0,
        WindowClass::INPUT_ONLY,
        x11rb::COPY_FROM_PARENT,
        &CreateWindowAux::new(),
    )
    .map_err(x11_err)?;
    conn.change_window_attributes(
        root,
        &ChangeWindowAttributesAux::new().event_mask(EventMask::PROPERTY_CHANGE),
    )
    .map_err(x11_err)?;
    conn.flush().map_err(x11_err)?;

    let conn = Arc::new(conn);
    let source_conn = Arc::clone(&conn);
    let thread = thread::Builder::new()
        .name("x11-foreground".into())
        .spawn(move || {
            let conn = source_conn;
            info!("Watching X11 foreground window");
            let mut last_window = None;
            let report = |last_window: &mut Option<Window>| -> bool {
                let Some(window) = active_window_id(&conn, root, active_window) else {
                    *last_window = None;
                    return true;
                };
                if *last_window == Some(window) {
                    return true;
                }
                *last_window = Some(window);
                match wm_class_instance(&conn, window) {
                    Some(app_id) => {
                        handle.foreground(ForegroundEvent::new(&app_id, now_millis()))
                    }
                    None => true,
                }
            };

            let mut open = report(&mut last_window);
            while open {
                match conn.wait_for_event() {
                    Ok(Event::PropertyNotify(e)) if e.atom == active_window => {
                        open = report(&mut last_window);
                    }
                    Ok(Event::ClientMessage(e))
                        if e.window == wake_window && e.type_ == stop_atom =>
                    {
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("X11 foreground source lost its connection: {e}");
                        break;
                    }
                }
            }
            debug!("X11 foreground source stopped");
        })?;

    let wake = move || {
        if let Err(e) = send_stop(&conn, wake_window, stop_atom) {
            warn!("Failed to wake X11 foreground source: {e}");
        }
    };
    Ok(ForegroundSource::new(thread, Box::new(wake)))
}

fn send_stop(conn: &RustConnection, wake_window: Window, stop_atom: Atom) -> Result<(), AppError> {
    let event = ClientMessageEvent::new(32, wake_window, stop_atom, [0u32; 5]);
    conn.send_event(false, wake_window, EventMask::NO_EVENT, event)
        .map_err(x11_err)?;
    conn.flush().map_err(x11_err)
}

fn active_window_id(conn: &RustConnection, root: Window, active_window: Atom) -> Option<Window> {
    let reply = conn
        .get_property(false, root, active_window, AtomEnum::WINDOW, 0, 1)
        .ok()?
        .reply()
        .ok()?;
    let first = reply.value32()?.next();
    first.filter(|w| *w != 0)
}

/// First (instance) half of WM_CLASS.
fn wm_class_instance(conn: &RustConnection, window: Window) -> Option<String> {
    let class = conn
        .get_property(false, window, AtomEnum::WM_CLASS, AtomEnum::STRING, 0, 1024)
        .ok()?
        .reply()
        .ok()?;
    let instance = class.value.split(|b| *b == 0).next()?;
    String::from_utf8(instance.to_vec())
        .ok()
        .filter(|s| !s.trim().is_empty())
}
