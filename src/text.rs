//! Adaptive order-k text coding for string and payload fields.
//!
//! Text buffers are self-contained: a raw varint of the uncompressed byte
//! length, then one arithmetic-coded symbol per byte. Context models start
//! from a static English byte-frequency seed and are bumped identically on
//! both sides after every coded byte, so no table travels with the stream.
//! The coder is byte-oriented on purpose: the payload heuristic can route
//! non-UTF-8 bytes through it and round-trips must stay exact.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::arith::{Decoder, Encoder};
use crate::error::{Error, Result};
use crate::model::Frequencies;
use crate::varint::{decode_varint, encode_varint};

/// Context depth of the text coder, fixed at profile construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOrder {
    Order0,
    Order1,
    Order2,
}

/// Rescale bound; far above any realistic payload but keeps adaptive totals
/// inside the coder's precision.
const RESCALE_AT: u64 = 1 << 24;

/// Adaptation step per coded byte.
const BUMP: u32 = 32;

/// English prose byte frequencies, used to seed every context model. Every
/// byte keeps weight >= 1 so arbitrary binary stays codable.
static ENGLISH: LazyLock<[u32; 256]> = LazyLock::new(|| {
    let mut table = [1u32; 256];
    let letters: [(u8, u32); 26] = [
        (b'e', 1270),
        (b't', 906),
        (b'a', 817),
        (b'o', 751),
        (b'i', 697),
        (b'n', 675),
        (b's', 633),
        (b'h', 609),
        (b'r', 599),
        (b'd', 425),
        (b'l', 403),
        (b'c', 278),
        (b'u', 276),
        (b'm', 241),
        (b'w', 236),
        (b'f', 223),
        (b'g', 202),
        (b'y', 197),
        (b'p', 193),
        (b'b', 149),
        (b'v', 98),
        (b'k', 77),
        (b'j', 15),
        (b'x', 15),
        (b'q', 10),
        (b'z', 7),
    ];
    for (byte, weight) in letters {
        table[byte as usize] = weight;
        // node names and call signs lean on capitals more than prose does
        table[byte.to_ascii_uppercase() as usize] = weight / 4 + 2;
    }
    table[b' ' as usize] = 1800;
    for digit in b'0'..=b'9' {
        table[digit as usize] = 200;
    }
    for (byte, weight) in [
        (b'.', 120),
        (b',', 100),
        (b'\'', 40),
        (b'"', 20),
        (b'!', 80),
        (b'?', 30),
        (b'-', 80),
        (b'_', 80),
        (b':', 30),
        (b';', 15),
        (b'(', 15),
        (b')', 15),
        (b'/', 25),
        (b'\n', 30),
    ] {
        table[byte as usize] = weight;
    }
    table
});

/// Byte model that learns as it codes.
struct AdaptiveModel {
    weights: [u32; 256],
    total: u64,
}

impl AdaptiveModel {
    fn seeded() -> Self {
        let weights = *ENGLISH;
        let total = weights.iter().map(|&w| u64::from(w)).sum();
        Self { weights, total }
    }

    /// Lighter seed for higher-order contexts: same shape, one eighth the
    /// mass, so per-byte bumps overtake the prior within a few repetitions.
    fn seeded_scaled() -> Self {
        let mut weights = *ENGLISH;
        let mut total = 0u64;
        for weight in &mut weights {
            *weight = (*weight / 8).max(1);
            total += u64::from(*weight);
        }
        Self { weights, total }
    }

    fn bump(&mut self, symbol: usize) {
        self.weights[symbol] += BUMP;
        self.total += u64::from(BUMP);
        if self.total >= RESCALE_AT {
            self.total = 0;
            for weight in &mut self.weights {
                *weight = (*weight >> 1).max(1);
                self.total += u64::from(*weight);
            }
        }
    }
}

impl Frequencies for AdaptiveModel {
    fn total(&self) -> u64 {
        self.total
    }

    fn interval(&self, symbol: usize) -> (u64, u64) {
        let low: u64 = self.weights[..symbol].iter().map(|&w| u64::from(w)).sum();
        (low, low + u64::from(self.weights[symbol]))
    }

    fn pick(&self, scaled: u64) -> usize {
        let mut accumulated = 0u64;
        for (symbol, &weight) in self.weights.iter().enumerate() {
            accumulated += u64::from(weight);
            if scaled < accumulated {
                return symbol;
            }
        }
        255
    }

    fn symbols(&self) -> usize {
        256
    }
}

/// Per-order context store. Higher-order contexts are allocated lazily on
/// first use, identically on both sides.
struct Contexts {
    order: TextOrder,
    order0: AdaptiveModel,
    order1: HashMap<u8, AdaptiveModel>,
    order2: HashMap<[u8; 2], AdaptiveModel>,
    history: [u8; 2],
}

impl Contexts {
    fn new(order: TextOrder) -> Self {
        Self {
            order,
            order0: AdaptiveModel::seeded(),
            order1: HashMap::new(),
            order2: HashMap::new(),
            history: [0; 2],
        }
    }

    fn current(&mut self) -> &mut AdaptiveModel {
        match self.order {
            TextOrder::Order0 => &mut self.order0,
            TextOrder::Order1 => self
                .order1
                .entry(self.history[1])
                .or_insert_with(AdaptiveModel::seeded_scaled),
            TextOrder::Order2 => self
                .order2
                .entry(self.history)
                .or_insert_with(AdaptiveModel::seeded_scaled),
        }
    }

    fn advance(&mut self, byte: u8) {
        self.current().bump(usize::from(byte));
        self.history = [self.history[1], byte];
    }
}

/// Compress `bytes` into a self-contained text buffer.
pub fn encode_text(order: TextOrder, bytes: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(bytes.len() / 2 + 4);
    out.extend_from_slice(&encode_varint(bytes.len() as u64));
    let mut coder = Encoder::new(out);
    let mut contexts = Contexts::new(order);
    for &byte in bytes {
        coder.encode(usize::from(byte), &*contexts.current())?;
        contexts.advance(byte);
    }
    coder.finish()
}

/// Reconstruct the exact bytes of a text buffer.
pub fn decode_text(order: TextOrder, buffer: &[u8]) -> Result<Vec<u8>> {
    let mut consumed = 0usize;
    let length = decode_varint(|_| {
        let byte = buffer
            .get(consumed)
            .copied()
            .ok_or(Error::TextDecode("truncated length prefix"))?;
        consumed += 1;
        Ok(byte)
    })? as usize;

    let mut decoder = Decoder::new(&buffer[consumed..])?;
    let mut contexts = Contexts::new(order);
    let mut out = Vec::with_capacity(length.min(1 << 16));
    for _ in 0..length {
        let byte = decoder.decode(&*contexts.current())? as u8;
        out.push(byte);
        contexts.advance(byte);
    }
    Ok(out)
}

/// Printability rule for untagged payloads: valid UTF-8 and more than 80%
/// of the bytes printable ASCII or common whitespace.
#[must_use]
pub fn looks_like_text(bytes: &[u8]) -> bool {
    if bytes.is_empty() || std::str::from_utf8(bytes).is_err() {
        return false;
    }
    let printable = bytes
        .iter()
        .filter(|&&b| (0x20..=0x7e).contains(&b) || b == b'\n' || b == b'\r' || b == b'\t')
        .count();
    printable as f64 / bytes.len() as f64 > 0.8
}
