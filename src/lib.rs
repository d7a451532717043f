//! A `no_std`, no-alloc driver core for reconfigurable digital I/O modules.
//!
//! The module sits behind a bus bridge that exposes two disjoint windows of the
//! host bus (I/O space and memory space). Logic loaded into the module provides
//! either a seven-register field I/O block with per-bit edge interrupts, or bare
//! 16-bit registers. This crate covers the three parts with real concurrency and
//! protocol concerns:
//!
//! - **Address translation** - component addresses to bus windows
//! - **Interrupt pipeline** - edge interrupts to ordered subscriber notifications,
//!   with storm protection
//! - **Bitstream loading** - the byte handshake that programs the module's logic
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  try_enqueue  ┌────────────┐  receive_with_timeout  ┌──────────────────┐
//! │ on_interrupt()   │──────────────▶│ EventQueue │───────────────────────▶│ reconcile_once() │
//! │ (ISR, no block)  │               └────────────┘   (poll on timeout)    │ (background)     │
//! │                  │                                                     │                  │
//! │ fast paths ◀─────│                                                     │ lastBits         │
//! │ storm protection │──── DisabledMask / pending count ──────────────────▶│ subscriber fanout│
//! └──────────────────┘                                                     └──────────────────┘
//! ```
//!
//! - The **interrupt handler** captures `{bits, edge_mask}`, never blocks and never fails
//! - The **reconciler** is the only writer of the last-known bits and the only dispatcher
//! - **Subscribers** register from any thread and see a consistent snapshot per cycle
//!
//! # Example
//!
//! ```rust,no_run
//! use fieldio_bridge::prelude::*;
//!
//! # fn demo<B: RegisterBus>(bus: B) -> Result<(), DriverError> {
//! let on_change = |value: u16| {
//!     let _ = value;
//! };
//!
//! let address = ComponentAddress::new(0x000010)?;
//! let module = FieldIoBuilder::new(bus)
//!     .address(address)
//!     .rising_mask(0x0010)
//!     .poll_period_ms(100)
//!     .build()?;
//! module.arm();
//!
//! module
//!     .subscribers()
//!     .register(0x0010, Selector::Data, &on_change)?;
//!
//! // ISR: module.on_interrupt();
//! // Background task: module.run(&mut delay);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod fieldio;

pub mod prelude {
    pub use crate::fieldio::prelude::*;
}
