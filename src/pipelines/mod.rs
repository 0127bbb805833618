// SPDX-License-Identifier: GPL-3.0-only

//! Processing pipelines for the live session
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌────────────────────┐
//! │ Photo output │ ──▶ │  Photo Pipeline   │ ──▶ │ JPEG bytes / file  │
//! │ Live frames  │     │  - orientation    │     │                    │
//! │              │     │  - encoding       │     │                    │
//! └──────────────┘     └───────────────────┘     └────────────────────┘
//!
//! ┌──────────────┐     ┌───────────────────┐     ┌────────────────────┐
//! │ Movie output │ ──▶ │  Video Pipeline   │ ──▶ │   Movie file       │
//! │ Microphone   │     │  - state machine  │     │                    │
//! │              │     │  - preset ladder  │     │                    │
//! └──────────────┘     └───────────────────┘     └────────────────────┘
//!
//! ┌──────────────┐     ┌───────────────────┐     ┌────────────────────┐
//! │ Live frames  │ ──▶ │ Detection Pipeline│ ──▶ │  barcodeDetected   │
//! │              │     │  - throttle       │     │                    │
//! │              │     │  - decode, map    │     │                    │
//! └──────────────┘     └───────────────────┘     └────────────────────┘
//! ```
//!
//! - [`photo`]: still capture and frame samples
//! - [`video`]: recording state machine and preset negotiation
//! - [`detection`]: barcode scanning on live frames

pub mod detection;
pub mod photo;
pub mod video;
