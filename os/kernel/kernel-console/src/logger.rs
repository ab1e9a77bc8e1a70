use crate::debugcon::DebugCon;
use crate::vga::{CellBuffer, VgaWriter};
use core::fmt::Write;
use core::sync::atomic::{AtomicBool, Ordering};
use kernel_sync::SpinLock;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// `log::Log` implementation writing `[LEVEL] target: message` lines to the
/// VGA text buffer and, if switched on, QEMU's debug console.
pub struct ConsoleLogger<B> {
    max_level: LevelFilter,
    vga: SpinLock<Option<VgaWriter<B>>>,
    debugcon: AtomicBool,
}

impl<B: CellBuffer + Send> ConsoleLogger<B> {
    /// A logger with no sinks attached yet.
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self {
            max_level,
            vga: SpinLock::new(None),
            debugcon: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub const fn max_level(&self) -> LevelFilter {
        self.max_level
    }

    /// Route output to `writer`, replacing any previous one.
    pub fn attach_vga(&self, writer: VgaWriter<B>) {
        self.vga.with_lock(|vga| *vga = Some(writer));
    }

    /// Take the VGA writer back out, e.g. to hand the screen to something else.
    pub fn detach_vga(&self) -> Option<VgaWriter<B>> {
        self.vga.with_lock(Option::take)
    }

    /// Mirror every line to the debug console.
    pub fn set_debugcon(&self, enabled: bool) {
        self.debugcon.store(enabled, Ordering::Relaxed);
    }

    /// Install as the global logger. Call once during early init.
    ///
    /// # Errors
    /// Fails if a logger has already been installed.
    pub fn init(&'static self) -> Result<(), SetLoggerError>
    where
        B: 'static,
    {
        log::set_logger(self)?;
        log::set_max_level(self.max_level);
        Ok(())
    }
}

impl<B: CellBuffer + Send> Log for ConsoleLogger<B> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        if self.debugcon.load(Ordering::Relaxed) {
            let _ = writeln!(
                DebugCon,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            );
        }

        // A log call from inside a log call loses its message instead of
        // spinning forever on its own lock.
        if let Some(mut guard) = self.vga.try_lock()
            && let Some(vga) = guard.as_mut()
        {
            let _ = writeln!(
                vga,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}
