//! Command line arguments.

use clap::{Parser, ValueEnum};
use tagbridge_core::constants::{DEFAULT_HOST, DEFAULT_LANGUAGE, DEFAULT_PORT};
use tagbridge_ndef::{EncoderConfig, LengthEncoding};
use tagbridge_network::BridgeConfig;
use tagbridge_rfid::WriterConfig;

/// Reader backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    /// Simulated reader holding an NTAG215, no hardware needed.
    Mock,

    /// PC/SC readers (build with `--features hardware-pcsc`).
    Pcsc,
}

impl Default for TransportKind {
    fn default() -> Self {
        if cfg!(feature = "hardware-pcsc") {
            Self::Pcsc
        } else {
            Self::Mock
        }
    }
}

/// WebSocket bridge between NFC tag readers and browser applications.
#[derive(Parser, Debug)]
#[command(name = "tagbridge")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Interface to listen on
    #[arg(long, env = "TAGBRIDGE_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// WebSocket port
    #[arg(long, env = "TAGBRIDGE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Language tag stored in written text records
    #[arg(long, env = "TAGBRIDGE_LANGUAGE", default_value = DEFAULT_LANGUAGE)]
    pub language: String,

    /// Use the legacy one-byte TLV length (records up to 254 bytes)
    #[arg(long)]
    pub short_length: bool,

    /// Reader backend
    #[arg(long, value_enum, env = "TAGBRIDGE_TRANSPORT", default_value_t)]
    pub transport: TransportKind,

    /// Reader used for writes, in enumeration order
    #[arg(long, default_value_t = 0)]
    pub reader_index: usize,
}

impl Args {
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig::with_address(&self.host, self.port)
    }

    pub fn writer_config(&self) -> WriterConfig {
        WriterConfig {
            reader_index: self.reader_index,
            encoder: EncoderConfig {
                language: self.language.clone(),
                length_encoding: if self.short_length {
                    LengthEncoding::Short
                } else {
                    LengthEncoding::Extended
                },
            },
        }
    }
}
