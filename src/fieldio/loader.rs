//! Bitstream loading over the module's configuration port.
//!
//! The module must report configuration mode before anything is sent. The
//! loader then starts configuration, waits for the acknowledge bit, streams
//! every payload byte behind a per-byte ready handshake, waits for the done
//! bit (or the programmed mode code) and pulses the software reset. The
//! slot's interrupt line stays suspended for the whole sequence.

use bitflags::bitflags;

use crate::fieldio::{
    LoadError,
    bus::RegisterBus,
    hexfile::BitstreamRecord,
    time::Delay,
    types::{Region, WordAddress},
};

/// Mode register value while the logic awaits a bitstream.
pub const MODE_CONFIG: u8 = 0x48;
/// Mode register value once the logic is programmed.
pub const MODE_PROGRAMMED: u8 = 0x49;

bitflags! {
    /// Status/control register bits used by the handshake.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ConfigStatus: u16 {
        /// Start request when written, acknowledge when read.
        const ACK = 0x0001;
        /// Both low bits set: ready for the next byte.
        const READY = 0x0003;
        const DONE = 0x0004;
        /// Write-1 pulse.
        const RESET = 0x0080;
    }
}

/// Registers the loader drives.
pub trait ConfigPort {
    fn mode(&self) -> u8;
    fn status(&self) -> u16;
    fn set_status(&self, value: u16);
    fn write_data(&self, byte: u8);
}

impl<T: ConfigPort + ?Sized> ConfigPort for &T {
    fn mode(&self) -> u8 {
        (**self).mode()
    }

    fn status(&self) -> u16 {
        (**self).status()
    }

    fn set_status(&self, value: u16) {
        (**self).set_status(value)
    }

    fn write_data(&self, byte: u8) {
        (**self).write_data(byte)
    }
}

// ID PROM byte 0x0a, I/O words 0 and 1.
const MODE_WORD: WordAddress = WordAddress::new(Region::Id, 0x0a >> 1);
const STATUS_WORD: WordAddress = WordAddress::new(Region::Io, 0);
const DATA_WORD: WordAddress = WordAddress::new(Region::Io, 1);

/// [`ConfigPort`] on the module's ID and I/O windows.
#[derive(Debug)]
pub struct BusConfigPort<B: RegisterBus> {
    bus: B,
}

impl<B: RegisterBus> BusConfigPort<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }
}

impl<B: RegisterBus> ConfigPort for BusConfigPort<B> {
    fn mode(&self) -> u8 {
        (self.bus.read(MODE_WORD) & 0xFF) as u8
    }

    fn status(&self) -> u16 {
        self.bus.read(STATUS_WORD)
    }

    fn set_status(&self, value: u16) {
        self.bus.write(STATUS_WORD, value)
    }

    fn write_data(&self, byte: u8) {
        self.bus.write(DATA_WORD, byte as u16)
    }
}

/// Host interrupt delivery for the module's slot.
pub trait InterruptLine {
    fn disable(&mut self);
    fn enable(&mut self);
}

/// Keeps the line disabled until dropped.
struct Suspended<'l, L: InterruptLine + ?Sized> {
    line: &'l mut L,
}

impl<'l, L: InterruptLine + ?Sized> Suspended<'l, L> {
    fn new(line: &'l mut L) -> Self {
        line.disable();
        Self { line }
    }
}

impl<'l, L: InterruptLine + ?Sized> Drop for Suspended<'l, L> {
    fn drop(&mut self) {
        self.line.enable();
    }
}

/// Poll caps and pacing of the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    pub ack_polls: u32,
    pub ready_polls: u32,
    pub done_polls: u32,
    /// Delay between two status polls.
    pub poll_delay_us: u32,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            ack_polls: 1000,
            ready_polls: 30,
            done_polls: 30,
            poll_delay_us: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    NotStarted,
    AwaitingConfigMode,
    StreamingBytes,
    AwaitingDone,
    Complete,
    Failed,
}

/// Summary of a successful load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadReport {
    /// Non-empty lines consumed, non-data records included.
    pub lines: usize,
    /// Payload bytes written.
    pub bytes: usize,
    /// Most ready polls any one byte needed.
    pub max_wait: u32,
}

pub struct FirmwareLoader<P: ConfigPort, D: Delay> {
    port: P,
    delay: D,
    config: LoaderConfig,
    state: LoadState,
}

impl<P: ConfigPort, D: Delay> FirmwareLoader<P, D> {
    pub fn new(port: P, delay: D) -> Self {
        Self::with_config(port, delay, LoaderConfig::default())
    }

    pub fn with_config(port: P, delay: D, config: LoaderConfig) -> Self {
        Self {
            port,
            delay,
            config,
            state: LoadState::NotStarted,
        }
    }

    #[inline]
    pub fn state(&self) -> LoadState {
        self.state
    }

    #[inline]
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Streams `lines` into the module.
    ///
    /// `line` is disabled for the duration and re-enabled on every exit.
    pub fn load<I>(&mut self, line: &mut impl InterruptLine, lines: I) -> Result<LoadReport, LoadError>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let _suspended = Suspended::new(line);
        let result = self.run(lines);
        match &result {
            Ok(report) => {
                self.state = LoadState::Complete;
                log::info!(
                    "bitstream loaded: {} bytes from {} lines, max ready wait {}",
                    report.bytes,
                    report.lines,
                    report.max_wait
                );
            }
            Err(err) => {
                self.state = LoadState::Failed;
                log::error!("bitstream load failed: {}", err);
            }
        }
        result
    }

    /// Splits a whole image into lines and loads it.
    pub fn load_image(
        &mut self,
        line: &mut impl InterruptLine,
        image: &[u8],
    ) -> Result<LoadReport, LoadError> {
        self.load(line, image.split(|b| *b == b'\n'))
    }

    fn run<I>(&mut self, lines: I) -> Result<LoadReport, LoadError>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        self.state = LoadState::AwaitingConfigMode;
        let mode = self.port.mode();
        if mode != MODE_CONFIG {
            return Err(LoadError::NotInConfigMode { mode });
        }

        self.port
            .set_status(self.port.status() | ConfigStatus::ACK.bits());
        self.wait_for(self.config.ack_polls, ConfigStatus::ACK)
            .map_err(|status| LoadError::AckTimeout { status })?;

        self.state = LoadState::StreamingBytes;
        log::info!("module acknowledged configuration, streaming");
        let mut report = LoadReport::default();
        for (index, raw) in lines.into_iter().enumerate() {
            let line_no = index + 1;
            let text = raw.as_ref().trim_ascii_end();
            if text.is_empty() {
                continue;
            }
            report.lines += 1;
            let record = BitstreamRecord::parse(text)
                .map_err(|_| LoadError::BadRecord { line: line_no })?;
            if !record.is_data() {
                continue;
            }
            for (byte_index, byte) in record.bytes().enumerate() {
                let waited = self
                    .wait_for(self.config.ready_polls, ConfigStatus::READY)
                    .map_err(|status| LoadError::ReadyTimeout {
                        line: line_no,
                        byte_index,
                        total_bytes: report.bytes,
                        status,
                    })?;
                report.max_wait = report.max_wait.max(waited);
                self.port.write_data(byte);
                report.bytes += 1;
            }
        }

        self.state = LoadState::AwaitingDone;
        let mut status = 0;
        let mut mode = self.port.mode();
        for _ in 0..self.config.done_polls {
            status = self.port.status();
            mode = self.port.mode();
            if ConfigStatus::from_bits_retain(status).contains(ConfigStatus::DONE)
                || mode == MODE_PROGRAMMED
            {
                self.port
                    .set_status(self.port.status() | ConfigStatus::RESET.bits());
                return Ok(report);
            }
            self.pause();
        }
        Err(LoadError::DoneTimeout { status, mode })
    }

    /// Polls until `want` is fully set. Returns the polls spent, or the last
    /// status seen when the cap runs out.
    fn wait_for(&mut self, polls: u32, want: ConfigStatus) -> Result<u32, u16> {
        let mut last = 0;
        for attempt in 0..polls {
            last = self.port.status();
            if ConfigStatus::from_bits_retain(last).contains(want) {
                return Ok(attempt);
            }
            self.pause();
        }
        Err(last)
    }

    fn pause(&mut self) {
        if self.config.poll_delay_us > 0 {
            self.delay.delay_us(self.config.poll_delay_us);
        }
    }
}
