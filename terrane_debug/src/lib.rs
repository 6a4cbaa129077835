// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording and Chrome trace export for terrane pipeline diagnostics.
//!
//! [`recorder::RecorderSink`] captures trace events as compact fixed-size
//! records; [`chrome::export`] turns a recording into JSON loadable by
//! `chrome://tracing` or Perfetto.

pub mod chrome;
pub mod recorder;
