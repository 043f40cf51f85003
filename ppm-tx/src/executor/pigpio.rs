/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! pigpio daemon client.
//!
//! `pigpiod` accepts commands on a TCP socket (default port 8888).  Every
//! request is four little-endian `u32` words, optionally followed by an
//! extension payload whose length is carried in the fourth word:
//!
//! ```text
//! request:  cmd | p1 | p2 | p3 (= ext len) | ext bytes…
//! response: cmd | p1 | p2 | result (i32, negative = error code)
//! ```
//!
//! Waveforms are built in two steps: `WVAG` appends pulses to the daemon's
//! scratch waveform, `WVCRE` turns the scratch waveform into a wave id.
//! Pulses are `(gpio_on_mask, gpio_off_mask, delay_us)` triples.  The
//! daemon only empties the scratch waveform after a successful `WVCRE`, so
//! a failed build is followed by `WVNEW`.  `WVCLR` is never used: it also
//! deletes the waveforms already created, the transmitting one included.
//!
//! Socket round trips block.  On a multi-threaded runtime they run through
//! [`tokio::task::block_in_place`] so the other tasks on the worker move
//! elsewhere while the daemon answers.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, info, warn};

use super::{ExecutorError, TransmitMode, WaveExecutor, WaveId};
use crate::pulse::{Level, PulseTrain};

// ── Protocol constants ────────────────────────────────────────────────────────

const CMD_MODES: u32 = 0;
const CMD_WRITE: u32 = 4;
const CMD_WVAG: u32 = 28;
const CMD_WVBSY: u32 = 32;
const CMD_WVHLT: u32 = 33;
const CMD_WVCRE: u32 = 49;
const CMD_WVDEL: u32 = 50;
const CMD_WVNEW: u32 = 53;
const CMD_WVTXM: u32 = 100;

const PI_OUTPUT: u32 = 1;

const WAVE_MODE_ONE_SHOT_SYNC: u32 = 2;
const WAVE_MODE_REPEAT_SYNC: u32 = 3;

/// Error codes that mean "out of waveform resources".
const PI_TOO_MANY_PULSES: i32 = -36;
const PI_TOO_MANY_CBS: i32 = -67;
const PI_TOO_MANY_OOL: i32 = -68;
const PI_NO_WAVEFORM_ID: i32 = -70;

const RESPONSE_LEN: usize = 16;
const IO_TIMEOUT: Duration = Duration::from_secs(1);

// ── Request / response encoding ───────────────────────────────────────────────

/// One daemon command, ready to be encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub code: u32,
    pub name: &'static str,
    pub p1: u32,
    pub p2: u32,
    pub ext: Vec<u8>,
}

impl Command {
    fn new(code: u32, name: &'static str, p1: u32, p2: u32) -> Self {
        Self {
            code,
            name,
            p1,
            p2,
            ext: Vec::new(),
        }
    }

    /// Wire bytes for this command.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16 + self.ext.len());
        buf.extend_from_slice(&self.code.to_le_bytes());
        buf.extend_from_slice(&self.p1.to_le_bytes());
        buf.extend_from_slice(&self.p2.to_le_bytes());
        buf.extend_from_slice(&(self.ext.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.ext);
        buf
    }
}

/// Check the echoed command word and turn the result word into `Ok(value)`
/// or a classified error.
pub fn decode_response(cmd: &Command, resp: &[u8; RESPONSE_LEN]) -> Result<u32, ExecutorError> {
    let word = |i: usize| [resp[i], resp[i + 1], resp[i + 2], resp[i + 3]];
    let echoed = u32::from_le_bytes(word(0));
    if echoed != cmd.code {
        return Err(ExecutorError::Protocol(format!(
            "response for command {echoed} while waiting for {} ({})",
            cmd.code, cmd.name
        )));
    }
    let result = i32::from_le_bytes(word(12));
    if result < 0 {
        return Err(classify(cmd.name, result));
    }
    Ok(result as u32)
}

fn classify(command: &'static str, code: i32) -> ExecutorError {
    match code {
        PI_TOO_MANY_PULSES | PI_TOO_MANY_CBS | PI_TOO_MANY_OOL | PI_NO_WAVEFORM_ID => {
            ExecutorError::ResourceExhausted { code }
        }
        _ => ExecutorError::Rejected { command, code },
    }
}

fn gpio_mask(gpio: u32) -> Result<u32, ExecutorError> {
    1u32.checked_shl(gpio)
        .ok_or_else(|| ExecutorError::Protocol(format!("gpio {gpio} out of range")))
}

/// `WVAG` extension payload for `train` on `gpio`.
pub fn pulses_extension(train: &PulseTrain, gpio: u32) -> Result<Vec<u8>, ExecutorError> {
    let mask = gpio_mask(gpio)?;
    let mut ext = Vec::with_capacity(train.len() * 12);
    for seg in train.segments() {
        let (on, off) = match seg.level {
            Level::High => (mask, 0),
            Level::Low => (0, mask),
        };
        ext.extend_from_slice(&on.to_le_bytes());
        ext.extend_from_slice(&off.to_le_bytes());
        ext.extend_from_slice(&seg.duration_us.to_le_bytes());
    }
    Ok(ext)
}

fn wave_mode(mode: TransmitMode) -> u32 {
    match mode {
        TransmitMode::Once => WAVE_MODE_ONE_SHOT_SYNC,
        TransmitMode::Repeat => WAVE_MODE_REPEAT_SYNC,
    }
}

// ── PigpioExecutor ────────────────────────────────────────────────────────────

/// [`WaveExecutor`] backed by a running `pigpiod`.
#[derive(Debug)]
pub struct PigpioExecutor {
    stream: TcpStream,
}

impl PigpioExecutor {
    /// Connect to the daemon at `host:port`.
    ///
    /// Pulses another client left in the scratch waveform are discarded.
    pub fn connect(host: &str, port: u16) -> Result<Self, ExecutorError> {
        let stream = blocking_io(|| TcpStream::connect((host, port)))?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        stream.set_write_timeout(Some(IO_TIMEOUT))?;
        let mut executor = Self { stream };
        executor.call(Command::new(CMD_WVNEW, "WVNEW", 0, 0))?;
        info!(host, port, "connected to pigpio daemon");
        Ok(executor)
    }

    fn call(&mut self, cmd: Command) -> Result<u32, ExecutorError> {
        let stream = &mut self.stream;
        let resp = blocking_io(|| -> std::io::Result<[u8; RESPONSE_LEN]> {
            stream.write_all(&cmd.encode())?;
            let mut resp = [0u8; RESPONSE_LEN];
            stream.read_exact(&mut resp)?;
            Ok(resp)
        })?;
        decode_response(&cmd, &resp)
    }

    /// Empty the scratch waveform after a failed build.
    fn discard_scratch(&mut self) {
        if let Err(e) = self.call(Command::new(CMD_WVNEW, "WVNEW", 0, 0)) {
            warn!(error = %e, "failed to discard pulses of a failed waveform");
        }
    }
}

/// Run blocking socket I/O, handing the worker's other tasks off first when
/// called from a multi-threaded runtime.
fn blocking_io<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(rt) if rt.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

impl WaveExecutor for PigpioExecutor {
    fn create_waveform(&mut self, train: &PulseTrain, gpio: u32) -> Result<WaveId, ExecutorError> {
        let mut add = Command::new(CMD_WVAG, "WVAG", 0, 0);
        add.ext = pulses_extension(train, gpio)?;
        let created = self
            .call(add)
            .and_then(|_| self.call(Command::new(CMD_WVCRE, "WVCRE", 0, 0)));
        let id = match created {
            Ok(id) => id,
            Err(e) => {
                self.discard_scratch();
                return Err(e);
            }
        };
        debug!(wave_id = id, segments = train.len(), "pigpio waveform created");
        Ok(WaveId(id))
    }

    fn transmit(&mut self, id: WaveId, mode: TransmitMode) -> Result<(), ExecutorError> {
        self.call(Command::new(CMD_WVTXM, "WVTXM", id.0, wave_mode(mode)))?;
        Ok(())
    }

    fn is_transmitting(&mut self) -> Result<bool, ExecutorError> {
        Ok(self.call(Command::new(CMD_WVBSY, "WVBSY", 0, 0))? != 0)
    }

    fn release_waveform(&mut self, id: WaveId) -> Result<(), ExecutorError> {
        self.call(Command::new(CMD_WVDEL, "WVDEL", id.0, 0))?;
        Ok(())
    }

    fn halt(&mut self) -> Result<(), ExecutorError> {
        self.call(Command::new(CMD_WVHLT, "WVHLT", 0, 0))?;
        Ok(())
    }

    fn set_output_level(&mut self, gpio: u32, level: Level) -> Result<(), ExecutorError> {
        self.call(Command::new(CMD_MODES, "MODES", gpio, PI_OUTPUT))?;
        let bit = match level {
            Level::Low => 0,
            Level::High => 1,
        };
        self.call(Command::new(CMD_WRITE, "WRITE", gpio, bit))?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    use crate::pulse::build;

    fn response(cmd: u32, result: i32) -> [u8; RESPONSE_LEN] {
        let mut r = [0u8; RESPONSE_LEN];
        r[0..4].copy_from_slice(&cmd.to_le_bytes());
        r[12..16].copy_from_slice(&result.to_le_bytes());
        r
    }

    fn words(bytes: &[u8]) -> Vec<u32> {
        bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    /// Stand-in daemon on a loopback port.  Answers each command with the
    /// next scripted result and returns the command codes it received.
    fn scripted_daemon(results: Vec<i32>) -> (u16, JoinHandle<Vec<u32>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let worker = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut seen = Vec::new();
            for result in results {
                let mut head = [0u8; 16];
                sock.read_exact(&mut head).unwrap();
                let w = words(&head);
                let mut ext = vec![0u8; w[3] as usize];
                sock.read_exact(&mut ext).unwrap();
                seen.push(w[0]);
                sock.write_all(&response(w[0], result)).unwrap();
            }
            seen
        });
        (port, worker)
    }

    fn train() -> PulseTrain {
        build(&[1_500, 1_500], 100, 10_000).unwrap()
    }

    #[test]
    fn plain_command_is_four_words() {
        let cmd = Command::new(CMD_WVTXM, "WVTXM", 7, WAVE_MODE_REPEAT_SYNC);
        assert_eq!(words(&cmd.encode()), vec![100, 7, 3, 0]);
    }

    #[test]
    fn extension_length_goes_in_fourth_word() {
        let train = build(&[1_500], 100, 5_000).unwrap();
        let mut cmd = Command::new(CMD_WVAG, "WVAG", 0, 0);
        cmd.ext = pulses_extension(&train, 6).unwrap();

        let w = words(&cmd.encode());
        assert_eq!(&w[..4], &[28, 0, 0, 36]);
        // gap low, pulse high, tail low on gpio 6 (mask 0x40)
        assert_eq!(
            &w[4..],
            &[0, 0x40, 100, 0x40, 0, 1_500, 0, 0x40, 3_400]
        );
    }

    #[test]
    fn gpio_out_of_range_is_rejected() {
        let train = build(&[1_500], 100, 5_000).unwrap();
        assert!(matches!(
            pulses_extension(&train, 40),
            Err(ExecutorError::Protocol(_))
        ));
    }

    #[test]
    fn non_negative_result_is_returned() {
        let cmd = Command::new(CMD_WVCRE, "WVCRE", 0, 0);
        assert_eq!(decode_response(&cmd, &response(49, 12)).unwrap(), 12);
    }

    #[test]
    fn resource_codes_map_to_exhaustion() {
        let cmd = Command::new(CMD_WVCRE, "WVCRE", 0, 0);
        for code in [-36, -67, -68, -70] {
            assert!(
                matches!(
                    decode_response(&cmd, &response(49, code)),
                    Err(ExecutorError::ResourceExhausted { code: c }) if c == code
                ),
                "code {code}"
            );
        }
    }

    #[test]
    fn other_negative_codes_are_rejections() {
        let cmd = Command::new(CMD_WVDEL, "WVDEL", 3, 0);
        assert!(matches!(
            decode_response(&cmd, &response(50, -66)),
            Err(ExecutorError::Rejected {
                command: "WVDEL",
                code: -66
            })
        ));
    }

    #[test]
    fn mismatched_echo_is_a_protocol_error() {
        let cmd = Command::new(CMD_WVHLT, "WVHLT", 0, 0);
        assert!(matches!(
            decode_response(&cmd, &response(4, 0)),
            Err(ExecutorError::Protocol(_))
        ));
    }

    #[test]
    fn new_waveform_command_has_no_parameters() {
        let cmd = Command::new(CMD_WVNEW, "WVNEW", 0, 0);
        assert_eq!(words(&cmd.encode()), vec![53, 0, 0, 0]);
    }

    #[test]
    fn create_appends_pulses_then_creates() {
        let (port, daemon) = scripted_daemon(vec![0, 5, 7]);
        let mut pi = PigpioExecutor::connect("127.0.0.1", port).unwrap();

        assert_eq!(pi.create_waveform(&train(), 6).unwrap(), WaveId(7));
        drop(pi);
        assert_eq!(daemon.join().unwrap(), vec![53, 28, 49]);
    }

    #[test]
    fn failed_create_discards_scratch_pulses() {
        let (port, daemon) = scripted_daemon(vec![0, 5, -70, 0]);
        let mut pi = PigpioExecutor::connect("127.0.0.1", port).unwrap();

        assert!(matches!(
            pi.create_waveform(&train(), 6),
            Err(ExecutorError::ResourceExhausted { code: -70 })
        ));
        drop(pi);
        // WVNEW, never WVCLR: the waves already on the daemon stay alive
        assert_eq!(daemon.join().unwrap(), vec![53, 28, 49, 53]);
    }

    #[test]
    fn failed_append_discards_scratch_pulses() {
        let (port, daemon) = scripted_daemon(vec![0, -36, 0]);
        let mut pi = PigpioExecutor::connect("127.0.0.1", port).unwrap();

        assert!(matches!(
            pi.create_waveform(&train(), 6),
            Err(ExecutorError::ResourceExhausted { code: -36 })
        ));
        drop(pi);
        assert_eq!(daemon.join().unwrap(), vec![53, 28, 53]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn socket_calls_from_a_multi_thread_runtime() {
        let (port, daemon) = scripted_daemon(vec![0, 0, 1]);
        let mut pi = PigpioExecutor::connect("127.0.0.1", port).unwrap();

        pi.halt().unwrap();
        assert!(pi.is_transmitting().unwrap());
        drop(pi);
        assert_eq!(daemon.join().unwrap(), vec![53, 33, 32]);
    }

    #[tokio::test]
    async fn socket_calls_from_a_current_thread_runtime() {
        let (port, daemon) = scripted_daemon(vec![0, 0]);
        let mut pi = PigpioExecutor::connect("127.0.0.1", port).unwrap();

        pi.release_waveform(WaveId(4)).unwrap();
        drop(pi);
        assert_eq!(daemon.join().unwrap(), vec![53, 50]);
    }

    #[test]
    fn repeat_uses_sync_mode() {
        assert_eq!(wave_mode(TransmitMode::Repeat), WAVE_MODE_REPEAT_SYNC);
        assert_eq!(wave_mode(TransmitMode::Once), WAVE_MODE_ONE_SHOT_SYNC);
    }
}
