//! # CMSIS-DAP Protocol Library
//!
//! This crate contains the wire-level definitions of the [CMSIS-DAP](https://arm-software.github.io/CMSIS_5/DAP/html/index.html)
//! v2 debug probe protocol that are shared between probe implementations and host tools.
//!
//! ## Overview
//!
//! CMSIS-DAP is a byte-oriented request/response protocol. A host sends one request packet and
//! waits for the matching response packet. Each packet starts with a command id, followed by the
//! little-endian encoded parameters of that command. This library provides:
//!
//! - The [`Command`] table with every command id understood by the probe
//! - Status bytes, transfer acknowledge bits and the transfer request bit layout
//! - [`Port`], [`InfoId`] and the SWO trace status definitions
//! - A length-prefixed framing used by stream transports such as TCP
//!
//! ## Basic Usage
//!
//! ### Decoding a Command Id
//!
//! ```
//! use dap_protocol::Command;
//!
//! assert_eq!(Command::try_from(0x05), Ok(Command::Transfer));
//! assert_eq!(Command::try_from(0x42), Err(0x42));
//! ```
//!
//! ### Inspecting Transfer Requests
//!
//! ```
//! use dap_protocol::TransferRequest;
//!
//! // AP read of register 0x0c
//! let request = TransferRequest::new(0x0f);
//! assert!(request.is_ap());
//! assert!(request.is_read());
//! assert!(!request.has_match_value());
//! ```
//!
//! ### Framing a Request for TCP
//!
//! ```
//! use dap_protocol::codec;
//!
//! let mut out = Vec::new();
//! codec::write_frame(&mut out, &[0x00, 0x01]).expect("Writing to vector shouldn't fail");
//! assert_eq!(out, b"\x02\x00\x00\x01");
//! ```
//!
//! ## Framing
//!
//! Packet transports (USB bulk endpoints) delimit requests by their natural packet boundaries.
//! Stream transports prefix every request and every response with its length as a 16-bit
//! little-endian integer. See [`codec`] for blocking helpers and, with the `tokio` feature,
//! a [`tokio_util::codec`] implementation.
//!
//! ## Error Handling
//!
//! This library uses the [`error::ReadError`] type for framing errors.

pub mod protocol;
pub use protocol::*;
pub mod codec;
pub mod error;
