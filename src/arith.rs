//! 32-bit integer arithmetic coder.
//!
//! Classic low/high register construction with pending-bit renormalization.
//! Symbols are coded against any [`Frequencies`] table; the decoder must
//! consume the exact model sequence the encoder produced. Bits are packed
//! MSB-first; a decoder that runs off the end of its source reads zero bits,
//! so streams carry no explicit padding.

use std::io::{ErrorKind, Read, Write};

use crate::error::{Error, Result};
use crate::model::Frequencies;

const MASK: u64 = (1 << 32) - 1;
const HALF: u64 = 1 << 31;
const QUARTER: u64 = 1 << 30;

struct BitWriter<W> {
    sink: W,
    byte: u8,
    filled: u8,
}

impl<W: Write> BitWriter<W> {
    fn new(sink: W) -> Self {
        Self {
            sink,
            byte: 0,
            filled: 0,
        }
    }

    fn put(&mut self, bit: u64) -> Result<()> {
        self.byte = (self.byte << 1) | (bit as u8 & 1);
        self.filled += 1;
        if self.filled == 8 {
            self.sink.write_all(&[self.byte]).map_err(Error::Write)?;
            self.byte = 0;
            self.filled = 0;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<W> {
        if self.filled > 0 {
            self.byte <<= 8 - self.filled;
            self.sink.write_all(&[self.byte]).map_err(Error::Write)?;
        }
        Ok(self.sink)
    }
}

struct BitReader<R> {
    source: R,
    byte: u8,
    left: u8,
    exhausted: bool,
}

impl<R: Read> BitReader<R> {
    fn new(source: R) -> Self {
        Self {
            source,
            byte: 0,
            left: 0,
            exhausted: false,
        }
    }

    /// Next bit; an exhausted source yields zeros forever.
    fn take(&mut self) -> Result<u64> {
        if self.left == 0 {
            if self.exhausted {
                return Ok(0);
            }
            let mut buf = [0u8; 1];
            match self.source.read_exact(&mut buf) {
                Ok(()) => {
                    self.byte = buf[0];
                    self.left = 8;
                }
                Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                    self.exhausted = true;
                    return Ok(0);
                }
                Err(err) => return Err(Error::Read(err)),
            }
        }
        self.left -= 1;
        Ok(u64::from((self.byte >> self.left) & 1))
    }
}

/// Arithmetic encoder writing to a byte sink.
pub struct Encoder<W> {
    bits: BitWriter<W>,
    low: u64,
    high: u64,
    pending: u64,
}

impl<W: Write> Encoder<W> {
    pub fn new(sink: W) -> Self {
        Self {
            bits: BitWriter::new(sink),
            low: 0,
            high: MASK,
            pending: 0,
        }
    }

    /// Code one symbol against `model`.
    pub fn encode(&mut self, symbol: usize, model: &impl Frequencies) -> Result<()> {
        let (cum_low, cum_high) = model.interval(symbol);
        if cum_low == cum_high {
            return Err(Error::InvariantViolation("coding a zero-weight symbol"));
        }
        let total = model.total();
        let range = self.high - self.low + 1;
        self.high = self.low + range * cum_high / total - 1;
        self.low += range * cum_low / total;
        loop {
            if self.high < HALF {
                self.shift(0)?;
            } else if self.low >= HALF {
                self.low -= HALF;
                self.high -= HALF;
                self.shift(1)?;
            } else if self.low >= QUARTER && self.high < HALF + QUARTER {
                self.low -= QUARTER;
                self.high -= QUARTER;
                self.pending += 1;
            } else {
                break;
            }
            self.low <<= 1;
            self.high = (self.high << 1) | 1;
        }
        Ok(())
    }

    fn shift(&mut self, bit: u64) -> Result<()> {
        self.bits.put(bit)?;
        while self.pending > 0 {
            self.bits.put(bit ^ 1)?;
            self.pending -= 1;
        }
        Ok(())
    }

    /// Flush the disambiguating tail bits and return the sink.
    pub fn finish(mut self) -> Result<W> {
        self.pending += 1;
        if self.low < QUARTER {
            self.shift(0)?;
        } else {
            self.shift(1)?;
        }
        self.bits.finish()
    }
}

/// Arithmetic decoder reading from a byte source.
pub struct Decoder<R> {
    bits: BitReader<R>,
    low: u64,
    high: u64,
    code: u64,
}

impl<R: Read> Decoder<R> {
    /// Prime the 32-bit code register. Sources shorter than four bytes are
    /// legal; missing bits read as zero.
    pub fn new(source: R) -> Result<Self> {
        let mut bits = BitReader::new(source);
        let mut code = 0;
        for _ in 0..32 {
            code = (code << 1) | bits.take()?;
        }
        Ok(Self {
            bits,
            low: 0,
            high: MASK,
            code,
        })
    }

    /// Read one symbol against `model`.
    pub fn decode(&mut self, model: &impl Frequencies) -> Result<usize> {
        let total = model.total();
        let range = self.high - self.low + 1;
        let scaled = ((self.code - self.low + 1) * total - 1) / range;
        let symbol = model.pick(scaled);
        let (cum_low, cum_high) = model.interval(symbol);
        self.high = self.low + range * cum_high / total - 1;
        self.low += range * cum_low / total;
        loop {
            if self.high < HALF {
                // keep the window as-is
            } else if self.low >= HALF {
                self.low -= HALF;
                self.high -= HALF;
                self.code -= HALF;
            } else if self.low >= QUARTER && self.high < HALF + QUARTER {
                self.low -= QUARTER;
                self.high -= QUARTER;
                self.code -= QUARTER;
            } else {
                break;
            }
            self.low <<= 1;
            self.high = (self.high << 1) | 1;
            self.code = (self.code << 1) | self.bits.take()?;
        }
        Ok(symbol)
    }
}
