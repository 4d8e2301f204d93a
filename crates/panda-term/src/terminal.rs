// SPDX-License-Identifier: MIT
//
// Terminal collaborators: the contract the renderer drives, the real TTY
// behind it, and an in-memory double.
//
// Safety: `ProcessTerminal` necessarily uses `unsafe` for termios
// (tcgetattr, tcsetattr), ioctl (TIOCGWINSZ), isatty, sigaction and raw fd
// writes. These are the standard POSIX interfaces for terminal control.
// Each unsafe block is minimal.
#![allow(unsafe_code)]
//
// The renderer never talks to stdout directly. It writes bytes and asks for
// the size through `Terminal`, and receives input and resize notifications
// through the two callbacks handed to `start`. That keeps the whole render
// pipeline testable against `MemoryTerminal`.
//
// `ProcessTerminal` runs inline, not on the alternate screen: the rendered
// lines become part of the normal scrollback. Starting it enters raw mode,
// turns on bracketed paste and asks whether the terminal speaks the Kitty
// keyboard protocol. The answer (`CSI ? flags u`) arrives through stdin like
// any other input; the demux thread intercepts it, pushes flags 7 and
// never forwards the report to the application.
//
// Two threads sit behind a started `ProcessTerminal`:
//
//   stdin-reader  blocking reads, raw byte chunks over a channel
//   input-demux   reassembles chunks into sequences, flushes a lone ESC
//                 after a quiet tick, notices SIGWINCH, runs the callbacks
//
// The panic hook bypasses Rust's stdout lock, writing a pre-built restore
// sequence directly to fd 1, then restores termios from a global backup.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, Once};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::ansi;
use crate::error::TermError;
use crate::input::{InputBuffer, InputChunk, parse_kitty_flags_response};
use crate::keys;
use crate::reader::StdinReader;

/// Callback receiving one complete input sequence or bracketed paste.
pub type InputHandler = Box<dyn FnMut(String) + Send>;

/// Callback fired after the terminal was resized.
pub type ResizeHandler = Box<dyn FnMut() + Send>;

/// Kitty keyboard flags pushed once the protocol is detected:
/// disambiguate + report event types + report alternate keys.
const KITTY_FLAGS: u8 = 7;

/// How long the demux waits on silence before flushing a partial sequence.
const DEFAULT_TICK: Duration = Duration::from_millis(10);

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    /// Number of columns (width in character cells).
    pub cols: u16,
    /// Number of rows (height in character cells).
    pub rows: u16,
}

impl Size {
    /// Fallback when the OS cannot tell us.
    pub const FALLBACK: Self = Self { cols: 80, rows: 24 };

    /// Width as a column count.
    #[inline]
    #[must_use]
    pub const fn width(self) -> usize {
        self.cols as usize
    }

    /// Height as a row count.
    #[inline]
    #[must_use]
    pub const fn height(self) -> usize {
        self.rows as usize
    }
}

// ─── Contract ───────────────────────────────────────────────────────────────

/// The terminal the renderer paints on.
///
/// Primitive mutations have default implementations in terms of
/// [`write`](Self::write), so an implementor only supplies the five
/// required methods.
pub trait Terminal {
    /// Begin delivering input and resize events.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be put into its interactive
    /// state.
    fn start(&mut self, on_input: InputHandler, on_resize: ResizeHandler) -> Result<(), TermError>;

    /// Stop delivering events and restore the terminal. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if restoring the terminal fails.
    fn stop(&mut self) -> Result<(), TermError>;

    /// Write raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying write fails.
    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Current size in cells.
    fn size(&self) -> Size;

    /// Whether the Kitty keyboard protocol was negotiated.
    fn is_kitty_protocol_active(&self) -> bool;

    /// Move the cursor `lines` rows (negative is up).
    ///
    /// # Errors
    ///
    /// Propagates [`write`](Self::write) failures.
    fn move_by(&mut self, lines: isize) -> io::Result<()> {
        self.write(&encode(|w| ansi::move_by(w, lines))?)
    }

    /// Hide the hardware cursor.
    ///
    /// # Errors
    ///
    /// Propagates [`write`](Self::write) failures.
    fn hide_cursor(&mut self) -> io::Result<()> {
        self.write(&encode(ansi::cursor_hide)?)
    }

    /// Show the hardware cursor.
    ///
    /// # Errors
    ///
    /// Propagates [`write`](Self::write) failures.
    fn show_cursor(&mut self) -> io::Result<()> {
        self.write(&encode(ansi::cursor_show)?)
    }

    /// Erase the cursor's line.
    ///
    /// # Errors
    ///
    /// Propagates [`write`](Self::write) failures.
    fn clear_line(&mut self) -> io::Result<()> {
        self.write(&encode(ansi::clear_line)?)
    }

    /// Erase from the cursor to the end of the screen.
    ///
    /// # Errors
    ///
    /// Propagates [`write`](Self::write) failures.
    fn clear_from_cursor(&mut self) -> io::Result<()> {
        self.write(&encode(ansi::clear_from_cursor)?)
    }

    /// Erase the screen and home the cursor.
    ///
    /// # Errors
    ///
    /// Propagates [`write`](Self::write) failures.
    fn clear_screen(&mut self) -> io::Result<()> {
        self.write(&encode(ansi::clear_screen)?)
    }

    /// Set the window title.
    ///
    /// # Errors
    ///
    /// Propagates [`write`](Self::write) failures.
    fn set_title(&mut self, title: &str) -> io::Result<()> {
        self.write(&encode(|w| ansi::set_title(w, title))?)
    }
}

fn encode(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(16);
    f(&mut buf)?;
    Ok(buf)
}

// ─── Terminal Queries ───────────────────────────────────────────────────────

/// Query the current terminal size via `ioctl(TIOCGWINSZ)`.
///
/// Returns `None` if stdout is not a terminal or the query fails.
#[cfg(unix)]
#[must_use]
pub fn get_size() -> Option<Size> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut ws) };

    if result == 0 && ws.ws_col > 0 && ws.ws_row > 0 {
        Some(Size {
            cols: ws.ws_col,
            rows: ws.ws_row,
        })
    } else {
        None
    }
}

#[cfg(not(unix))]
#[must_use]
pub fn get_size() -> Option<Size> {
    None
}

/// Check whether stdin is connected to a terminal (TTY).
#[cfg(unix)]
#[must_use]
pub fn is_tty() -> bool {
    unsafe { libc::isatty(libc::STDIN_FILENO) != 0 }
}

#[cfg(not(unix))]
#[must_use]
pub fn is_tty() -> bool {
    false
}

// ─── SIGWINCH ────────────────────────────────────────────────────────────────

/// Set by the SIGWINCH handler, drained by the demux thread.
static SIGWINCH_RECEIVED: AtomicBool = AtomicBool::new(false);

static SIGWINCH_INSTALLED: Once = Once::new();

/// Install a handler that only sets [`SIGWINCH_RECEIVED`].
///
/// Storing to an atomic is async-signal-safe.
#[cfg(unix)]
fn install_sigwinch_handler() {
    SIGWINCH_INSTALLED.call_once(|| unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = sigwinch_handler as *const () as usize;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&raw mut sa.sa_mask);
        libc::sigaction(libc::SIGWINCH, &raw const sa, std::ptr::null_mut());
    });
}

#[cfg(unix)]
extern "C" fn sigwinch_handler(_sig: libc::c_int) {
    SIGWINCH_RECEIVED.store(true, Ordering::Relaxed);
}

#[cfg(not(unix))]
fn install_sigwinch_handler() {
    SIGWINCH_INSTALLED.call_once(|| {});
}

// ─── Panic-Safe Terminal Restore ────────────────────────────────────────────

/// Backup of the original termios for the panic hook, which cannot reach
/// the `ProcessTerminal` that owns the primary copy.
#[cfg(unix)]
static TERMIOS_BACKUP: Mutex<Option<libc::termios>> = Mutex::new(None);

#[cfg(unix)]
fn restore_termios_from_backup() {
    if let Ok(guard) = TERMIOS_BACKUP.lock() {
        if let Some(ref original) = *guard {
            unsafe {
                let _ = libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, original);
            }
        }
    }
}

/// End synchronized output, pop Kitty flags, disable bracketed paste,
/// reset SGR, show the cursor.
#[rustfmt::skip]
const EMERGENCY_RESTORE: &[u8] = b"\
    \x1b[?2026l\
    \x1b[<u\
    \x1b[?2004l\
    \x1b[0m\
    \x1b[?25h";

static PANIC_HOOK_INSTALLED: Once = Once::new();

/// Restore the terminal before the original panic handler prints.
fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            emergency_restore();

            #[cfg(unix)]
            restore_termios_from_backup();

            original(info);
        }));
    });
}

/// Write the restore sequence straight to fd 1, skipping the stdout lock
/// in case the panic happened while it was held.
fn emergency_restore() {
    #[cfg(unix)]
    unsafe {
        let _ = libc::write(
            libc::STDOUT_FILENO,
            EMERGENCY_RESTORE.as_ptr().cast::<libc::c_void>(),
            EMERGENCY_RESTORE.len(),
        );
    }

    #[cfg(not(unix))]
    {
        let _ = io::stdout().write_all(EMERGENCY_RESTORE);
        let _ = io::stdout().flush();
    }
}

fn write_stdout(data: &[u8]) -> io::Result<()> {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    lock.write_all(data)?;
    lock.flush()
}

// ─── Process Terminal ───────────────────────────────────────────────────────

/// The controlling TTY of this process.
///
/// Restored automatically on drop, and on panic through the hook installed
/// by [`start`](Terminal::start).
pub struct ProcessTerminal {
    /// Original termios saved before entering raw mode.
    #[cfg(unix)]
    original_termios: Option<libc::termios>,

    /// Last size the OS reported.
    size: Size,

    /// Quiet period after which the demux flushes a partial sequence.
    tick: Duration,

    /// Set by the demux thread once the Kitty report arrives.
    kitty: Arc<AtomicBool>,

    /// Tells the demux thread to exit.
    stop: Arc<AtomicBool>,

    reader: Option<StdinReader>,
    demux: Option<JoinHandle<()>>,
    active: bool,
}

impl ProcessTerminal {
    /// Create a handle and query the current size.
    ///
    /// Does **not** touch the terminal until [`start`](Terminal::start).
    #[must_use]
    pub fn new() -> Self {
        Self {
            #[cfg(unix)]
            original_termios: None,
            size: get_size().unwrap_or(Size::FALLBACK),
            tick: DEFAULT_TICK,
            kitty: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(AtomicBool::new(false)),
            reader: None,
            demux: None,
            active: false,
        }
    }

    /// Override the quiet period used to flush a lone ESC.
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick.max(Duration::from_millis(1));
        self
    }

    /// Whether [`start`](Terminal::start) has run and `stop` has not.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    // ── Raw Mode (termios) ──────────────────────────────────────────

    #[cfg(unix)]
    fn enable_raw_mode(&mut self) -> io::Result<()> {
        use std::os::unix::io::AsRawFd;

        if !is_tty() {
            return Ok(());
        }

        let fd = io::stdin().as_raw_fd();

        unsafe {
            let mut termios: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(fd, &raw mut termios) != 0 {
                return Err(io::Error::last_os_error());
            }

            self.original_termios = Some(termios);
            if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
                *guard = Some(termios);
            }

            // cfmakeraw equivalent.
            termios.c_iflag &= !(libc::IGNBRK
                | libc::BRKINT
                | libc::PARMRK
                | libc::ISTRIP
                | libc::INLCR
                | libc::IGNCR
                | libc::ICRNL
                | libc::IXON);
            termios.c_oflag &= !libc::OPOST;
            termios.c_lflag &=
                !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
            termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
            termios.c_cflag |= libc::CS8;

            termios.c_cc[libc::VMIN] = 1;
            termios.c_cc[libc::VTIME] = 0;

            if libc::tcsetattr(fd, libc::TCSAFLUSH, &raw const termios) != 0 {
                return Err(io::Error::last_os_error());
            }
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn enable_raw_mode(&mut self) -> io::Result<()> {
        Ok(())
    }

    #[cfg(unix)]
    fn disable_raw_mode(&mut self) -> io::Result<()> {
        if let Some(ref original) = self.original_termios {
            use std::os::unix::io::AsRawFd;
            let fd = io::stdin().as_raw_fd();

            unsafe {
                if libc::tcsetattr(fd, libc::TCSAFLUSH, original) != 0 {
                    return Err(io::Error::last_os_error());
                }
            }

            if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
                *guard = None;
            }
            self.original_termios = None;
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn disable_raw_mode(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Default for ProcessTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal for ProcessTerminal {
    fn start(&mut self, on_input: InputHandler, on_resize: ResizeHandler) -> Result<(), TermError> {
        if self.active {
            return Ok(());
        }

        install_panic_hook();
        self.enable_raw_mode().map_err(TermError::RawMode)?;
        install_sigwinch_handler();
        self.size = get_size().unwrap_or(self.size);

        let mut hello = Vec::with_capacity(16);
        ansi::enable_bracketed_paste(&mut hello)?;
        ansi::query_kitty_keyboard(&mut hello)?;
        write_stdout(&hello)?;

        self.stop.store(false, Ordering::Relaxed);
        self.kitty.store(false, Ordering::Relaxed);

        let (reader, rx) = StdinReader::spawn()?;
        self.reader = Some(reader);

        let demux = Demux {
            rx,
            on_input,
            on_resize,
            stop: Arc::clone(&self.stop),
            kitty: Arc::clone(&self.kitty),
            tick: self.tick,
        };
        let handle = thread::Builder::new()
            .name("input-demux".into())
            .spawn(move || demux.run())
            .map_err(|source| TermError::Spawn {
                name: "input-demux",
                source,
            })?;
        self.demux = Some(handle);
        self.active = true;

        tracing::info!(
            target: "terminal",
            cols = self.size.cols,
            rows = self.size.rows,
            tty = is_tty(),
            "terminal_started"
        );
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TermError> {
        if !self.active {
            return Ok(());
        }
        self.active = false;

        self.stop.store(true, Ordering::Relaxed);
        if let Some(mut reader) = self.reader.take() {
            reader.stop();
        }
        if let Some(handle) = self.demux.take() {
            let _ = handle.join();
        }

        let mut bye = Vec::with_capacity(16);
        ansi::disable_bracketed_paste(&mut bye)?;
        if self.kitty.swap(false, Ordering::Relaxed) {
            ansi::disable_kitty_keyboard(&mut bye)?;
            keys::set_kitty_protocol_active(false);
        }
        write_stdout(&bye)?;

        self.disable_raw_mode().map_err(TermError::RawMode)?;
        tracing::info!(target: "terminal", "terminal_stopped");
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        write_stdout(data)
    }

    fn size(&self) -> Size {
        get_size().unwrap_or(self.size)
    }

    fn is_kitty_protocol_active(&self) -> bool {
        self.kitty.load(Ordering::Relaxed)
    }
}

impl Drop for ProcessTerminal {
    fn drop(&mut self) {
        if self.active {
            let _ = Terminal::stop(self);
        }
    }
}

// ─── Input Demux Thread ─────────────────────────────────────────────────────

struct Demux {
    rx: Receiver<Vec<u8>>,
    on_input: InputHandler,
    on_resize: ResizeHandler,
    stop: Arc<AtomicBool>,
    kitty: Arc<AtomicBool>,
    tick: Duration,
}

impl Demux {
    fn run(mut self) {
        let mut buffer = InputBuffer::new();

        while !self.stop.load(Ordering::Relaxed) {
            let chunks = match self.rx.recv_timeout(self.tick) {
                Ok(bytes) => buffer.push(&bytes),
                Err(RecvTimeoutError::Timeout) => buffer.flush(),
                Err(RecvTimeoutError::Disconnected) => break,
            };
            for chunk in chunks {
                self.deliver(chunk);
            }
            if SIGWINCH_RECEIVED.swap(false, Ordering::Relaxed) {
                tracing::debug!(target: "terminal", "resize_signal");
                (self.on_resize)();
            }
        }
    }

    fn deliver(&mut self, chunk: InputChunk) {
        if let InputChunk::Sequence(ref seq) = chunk {
            if let Some(flags) = parse_kitty_flags_response(seq) {
                self.enable_kitty(flags);
                return;
            }
        }
        (self.on_input)(chunk.into_data());
    }

    fn enable_kitty(&self, reported: u16) {
        if self.kitty.load(Ordering::Relaxed) {
            return;
        }
        let mut buf = Vec::with_capacity(8);
        let written = ansi::enable_kitty_keyboard(&mut buf, KITTY_FLAGS).and_then(|()| write_stdout(&buf));
        match written {
            Ok(()) => {
                self.kitty.store(true, Ordering::Relaxed);
                keys::set_kitty_protocol_active(true);
                tracing::info!(target: "terminal", reported, "kitty_protocol_enabled");
            }
            Err(error) => tracing::warn!(target: "terminal", %error, "kitty_enable_failed"),
        }
    }
}

// ─── Memory Terminal ────────────────────────────────────────────────────────

/// An in-memory terminal that records everything written to it.
///
/// Input and resizes are simulated with [`send_input`](Self::send_input)
/// and [`resize`](Self::resize); both run the callbacks registered by
/// [`start`](Terminal::start) synchronously.
pub struct MemoryTerminal {
    output: Vec<u8>,
    size: Size,
    kitty: bool,
    started: bool,
    on_input: Option<InputHandler>,
    on_resize: Option<ResizeHandler>,
}

impl MemoryTerminal {
    /// A stopped terminal of the given size.
    #[must_use]
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            output: Vec::new(),
            size: Size { cols, rows },
            kitty: false,
            started: false,
            on_input: None,
            on_resize: None,
        }
    }

    /// Everything written so far, lossily decoded.
    #[must_use]
    pub fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    /// Return and clear everything written so far.
    pub fn take_output(&mut self) -> String {
        let out = String::from_utf8_lossy(&self.output).into_owned();
        self.output.clear();
        out
    }

    /// Whether `start` has run and `stop` has not.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started
    }

    /// Change the size and fire the resize callback.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.size = Size { cols, rows };
        if let Some(on_resize) = self.on_resize.as_mut() {
            on_resize();
        }
    }

    /// Deliver one input sequence through the input callback.
    ///
    /// Ignored while the terminal is stopped.
    pub fn send_input(&mut self, data: &str) {
        if let Some(on_input) = self.on_input.as_mut() {
            on_input(data.to_owned());
        }
    }

    /// Pretend the Kitty negotiation succeeded or failed.
    pub fn set_kitty_protocol_active(&mut self, active: bool) {
        self.kitty = active;
    }
}

impl Terminal for MemoryTerminal {
    fn start(&mut self, on_input: InputHandler, on_resize: ResizeHandler) -> Result<(), TermError> {
        self.on_input = Some(on_input);
        self.on_resize = Some(on_resize);
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TermError> {
        self.on_input = None;
        self.on_resize = None;
        self.started = false;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.output.extend_from_slice(data);
        Ok(())
    }

    fn size(&self) -> Size {
        self.size
    }

    fn is_kitty_protocol_active(&self) -> bool {
        self.kitty
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
