// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Identification helpers shared by processors and pipelines.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

/// Global monotonically-increasing object ID counter.
static OBJECT_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Per-type instance counters.
static OBJ_COUNTS: OnceLock<Mutex<HashMap<String, u64>>> = OnceLock::new();

/// Generate a process-wide unique identifier.
pub fn obj_id() -> u64 {
    OBJECT_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Return a per-type instance count for the given type name, then increment.
///
/// The first call for a given `type_name` returns 0, the second returns 1, etc.
pub fn obj_count(type_name: &str) -> u64 {
    let mut map = OBJ_COUNTS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let entry = map.entry(type_name.to_string()).or_insert(0);
    let val = *entry;
    *entry += 1;
    val
}

/// Default display name for a new instance of `type_name`, e.g. `SentenceAggregator#0`.
pub fn instance_name(type_name: &str) -> String {
    format!("{}#{}", type_name, obj_count(type_name))
}
