//! # Simulator Configuration Constants
//!
//! This crate is the single source of truth for the fixed geometry of the
//! paging simulator: page and table sizes, the shape of the five-level
//! hierarchy, device limits and the default device sizes used when a
//! configuration file does not name any.
//!
//! ## Overview
//!
//! Every other crate in the workspace agrees on these numbers. Keeping them
//! in one place prevents the page-table codec, the memory devices and the
//! simulator front end from drifting apart.
//!
//! ### Paging Geometry ([`paging`])
//! * **Entry Size**: page-table entries are 32 bits wide
//! * **Table Size**: one table fills exactly one frame
//! * **Hierarchy**: five levels (PGD, P4D, PUD, PMD, PT), nine index bits each
//!
//! ### Device Limits ([`memory`])
//! * **Default Sizes**: RAM and the first swap device
//! * **Swap Slots**: number of swap devices a system may attach
//! * **Frame Limits**: how many frames an entry field can address
//!
//! ```text
//! Virtual address decomposition (five-level walk):
//!
//!  63    57 56    48 47    39 38    30 29    21 20    12 11        0
//! ┌────────┬────────┬────────┬────────┬────────┬────────┬───────────┐
//! │ unused │  PGD   │  P4D   │  PUD   │  PMD   │   PT   │  offset   │
//! └────────┴────────┴────────┴────────┴────────┴────────┴───────────┘
//! ```
//!
//! All limits are compile-time constants with compile-time assertions that
//! keep them consistent with each other.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
pub mod paging;
