// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error taxonomy shared by the scheduler crates.

use thiserror::Error;

/// A per-event rejection reported when submitting to an [`EventQueue`](crate::queue::EventQueue).
///
/// These are never fatal: the offending event is dropped and scheduling continues.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ScheduleError {
    /// The event's fire time is at or before the queue's watermark, so the
    /// window it belongs to has already been dispatched.
    #[error("event missed: fire time {fire_time:.6} is at or before watermark {watermark:.6}")]
    MissedEvent {
        /// Fire time of the rejected event.
        fire_time: f64,
        /// Watermark of the queue at submission.
        watermark: f64,
    },
    /// The event's fire time is NaN or infinite and cannot be placed in time.
    #[error("event fire time must be finite, got {0}")]
    NonFiniteFireTime(f64),
}

/// Errors that prevent a scheduler from being built.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    /// The clock source cannot produce a usable time value on this platform.
    #[error("clock unavailable: {0}")]
    ClockUnavailable(String),
    /// A configuration value is out of range.
    #[error("invalid scheduler configuration: {0}")]
    InvalidConfig(String),
}
