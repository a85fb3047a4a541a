// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - shared infrastructure used by the handlers.

pub mod cache;
pub mod media;
pub mod password;
pub mod realtime;

pub use cache::ResponseCache;
pub use media::{MediaError, MediaStore};
pub use password::PasswordHasher;
pub use realtime::{EventKind, Group, GroupEvent, RealtimeHub};
